use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use log::debug;

use super::{ExportConfig, ExportError};
use crate::telemetry::{MissionTrack, TelemetryTime};

pub const KML_FILE_NAME: &str = "mission.kml";

pub fn write_kml(track: &MissionTrack, config: &ExportConfig, path: &Path) -> Result<(), ExportError> {
    let document = render_kml(track, config);
    fs::write(path, document)?;
    debug!("wrote {}", path.display());
    Ok(())
}

/// Render the mission as a KML 2.2 document: the chronological flight
/// path, the resolved target track, periodic look vectors, and one
/// placemark per enriched transcript event. Output is deterministic for a
/// given track so repeated exports are byte-identical.
pub fn render_kml(track: &MissionTrack, config: &ExportConfig) -> String {
    let mut kml = String::new();
    kml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    kml.push_str("<kml xmlns=\"http://www.opengis.net/kml/2.2\">\n<Document>\n");
    kml.push_str("<name>Mission telemetry</name>\n");
    kml.push_str(
        "<Style id=\"flightPath\"><LineStyle><color>ffdb9834</color><width>3</width></LineStyle></Style>\n",
    );
    kml.push_str(
        "<Style id=\"targetTrack\"><LineStyle><color>ff2f2fd3</color><width>2</width></LineStyle></Style>\n",
    );
    kml.push_str(
        "<Style id=\"lookVector\"><LineStyle><color>7f00d7ff</color><width>1</width></LineStyle></Style>\n",
    );

    let path_coords: Vec<String> = track
        .records
        .iter()
        .map(|r| coord(r.sensor.lon_deg, r.sensor.lat_deg, r.sensor.alt_m))
        .collect();
    if !path_coords.is_empty() {
        line_string(&mut kml, "Flight path", "#flightPath", &path_coords);
    }

    let target_coords: Vec<String> = track
        .target_track()
        .iter()
        .map(|t| coord(t.lon_deg, t.lat_deg, t.elev_m))
        .collect();
    if !target_coords.is_empty() {
        line_string(&mut kml, "Target track", "#targetTrack", &target_coords);
    }

    let stride = config.look_vector_stride.max(1);
    for (index, record) in track.records.iter().enumerate().step_by(stride) {
        let Some(target) = record.target else { continue };
        let coords = [
            coord(record.sensor.lon_deg, record.sensor.lat_deg, record.sensor.alt_m),
            coord(target.lon_deg, target.lat_deg, target.elev_m),
        ];
        line_string(&mut kml, &format!("Look vector {}", index), "#lookVector", &coords);
    }

    for event in &track.events {
        let Some(geoint) = &event.geoint else { continue };
        let (lon, lat, elev) = match geoint.target {
            Some(target) => (target.lon, target.lat, target.elev),
            None => (geoint.sensor.lon, geoint.sensor.lat, geoint.sensor.alt),
        };
        let stamp = format_time(&geoint.timestamp);
        let name = match &event.segment.speaker {
            Some(speaker) => format!("{} @ {}", speaker, stamp),
            None => format!("Event @ {}", stamp),
        };
        let _ = write!(
            kml,
            "<Placemark><name>{}</name><description>{} [{}]</description>\
             <Point><coordinates>{}</coordinates></Point></Placemark>\n",
            xml_escape(&name),
            xml_escape(&event.segment.text),
            xml_escape(&stamp),
            coord(lon, lat, elev),
        );
    }

    kml.push_str("</Document>\n</kml>\n");
    kml
}

fn line_string(kml: &mut String, name: &str, style: &str, coords: &[String]) {
    let _ = write!(
        kml,
        "<Placemark><name>{}</name><styleUrl>{}</styleUrl>\
         <LineString><tessellate>1</tessellate><altitudeMode>absolute</altitudeMode>\
         <coordinates>{}</coordinates></LineString></Placemark>\n",
        xml_escape(name),
        style,
        coords.join(" "),
    );
}

fn coord(lon: f64, lat: f64, alt: f64) -> String {
    format!("{:.6},{:.6},{:.1}", lon, lat, alt)
}

pub(super) fn format_time(time: &TelemetryTime) -> String {
    match time {
        TelemetryTime::Absolute(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        TelemetryTime::Relative(s) => format!("t+{:.1}s", s),
    }
}

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}
