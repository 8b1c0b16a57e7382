use std::fs;
use std::path::Path;

use log::debug;
use serde::Serialize;

use super::kml::format_time;
use super::{ExportConfig, ExportError};
use crate::telemetry::MissionTrack;

pub const HTML_FILE_NAME: &str = "mission_map.html";

/// Everything the map page needs, embedded as one inline JSON object.
#[derive(Serialize)]
struct MapData<'a> {
    path: Vec<[f64; 2]>,
    targets: Vec<[f64; 2]>,
    events: Vec<MapEvent<'a>>,
}

#[derive(Serialize)]
struct MapEvent<'a> {
    lat: f64,
    lon: f64,
    time: String,
    text: &'a str,
    speaker: Option<&'a str>,
    visual: bool,
}

pub fn write_html(
    track: &MissionTrack,
    config: &ExportConfig,
    path: &Path,
) -> Result<(), ExportError> {
    let page = render_html(track, config)?;
    fs::write(path, page)?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Render a self-contained Leaflet map page. All application logic is
/// inline; the only external fetches are the pinned Leaflet assets and the
/// configured tile layer.
pub fn render_html(track: &MissionTrack, config: &ExportConfig) -> Result<String, ExportError> {
    let data = MapData {
        path: track
            .records
            .iter()
            .map(|r| [r.sensor.lat_deg, r.sensor.lon_deg])
            .collect(),
        targets: track
            .target_track()
            .iter()
            .map(|t| [t.lat_deg, t.lon_deg])
            .collect(),
        events: track
            .events
            .iter()
            .filter_map(|event| {
                let geoint = event.geoint.as_ref()?;
                let (lat, lon) = match geoint.target {
                    Some(target) => (target.lat, target.lon),
                    None => (geoint.sensor.lat, geoint.sensor.lon),
                };
                Some(MapEvent {
                    lat,
                    lon,
                    time: format_time(&geoint.timestamp),
                    text: &event.segment.text,
                    speaker: event.segment.speaker.as_deref(),
                    visual: geoint.likely_visual_observation,
                })
            })
            .collect(),
    };
    // A literal "</script>" inside a transcript quote would end the inline
    // script block early; escaping the slash keeps the JSON equivalent.
    let json = serde_json::to_string(&data)?.replace("</", "<\\/");

    Ok(TEMPLATE
        .replace("__DATA__", &json)
        .replace("__TILES__", &config.tile_url))
}

const TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>Mission map</title>
<link rel="stylesheet" href="https://unpkg.com/leaflet@1.9.4/dist/leaflet.css">
<script src="https://unpkg.com/leaflet@1.9.4/dist/leaflet.js"></script>
<style>
  html, body, #map { height: 100%; margin: 0; }
  .event-popup .time { color: #555; font-size: 0.85em; }
</style>
</head>
<body>
<div id="map"></div>
<script>
var DATA = __DATA__;

var map = L.map('map');
L.tileLayer('__TILES__', { maxZoom: 19, attribution: '&copy; OpenStreetMap contributors' }).addTo(map);

if (DATA.path.length > 0) {
  var flight = L.polyline(DATA.path, { color: '#3498db', weight: 3 }).addTo(map);
  map.fitBounds(flight.getBounds(), { padding: [30, 30] });
} else {
  map.setView([0, 0], 2);
}
if (DATA.targets.length > 0) {
  L.polyline(DATA.targets, { color: '#d32f2f', weight: 2, dashArray: '6 4' }).addTo(map);
}

function esc(s) {
  return s.replace(/&/g, '&amp;').replace(/</g, '&lt;').replace(/>/g, '&gt;');
}

DATA.events.forEach(function (ev) {
  var who = ev.speaker ? '<b>' + esc(ev.speaker) + '</b>: ' : '';
  var flag = ev.visual ? ' &#128065;' : '';
  var html = '<div class="event-popup">' + who + esc(ev.text) + flag +
    '<div class="time">' + esc(ev.time) + '</div></div>';
  L.marker([ev.lat, ev.lon]).addTo(map).bindPopup(html);
});
</script>
</body>
</html>
"#;
