use log::debug;
use regex::Regex;
use serde::Serialize;

use crate::telemetry::{SensorPose, TelemetryRecord, TelemetryTime, MAX_RECORDS};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SubtitleSummary {
    pub cues_seen: usize,
    pub cues_matched: usize,
    pub truncated: bool,
}

#[derive(Debug)]
pub struct SubtitleParseOutput {
    pub records: Vec<TelemetryRecord>,
    pub summary: SubtitleSummary,
}

/// Extracts telemetry burned into consumer-drone subtitle tracks.
///
/// Two manufacturer layouts are recognized: the DJI bracket style
/// (`[latitude: ...] [longitude: ...] [rel_alt: ... abs_alt: ...]`, with an
/// optional gimbal block) and the older `GPS(lon, lat, alt)` caption style
/// also emitted by Autel firmware. A cue matching neither simply produces
/// no record.
pub struct SubtitleTelemetryParser {
    latitude: Regex,
    longitude: Regex,
    abs_alt: Regex,
    rel_alt: Regex,
    gimbal: Regex,
    gps_paren: Regex,
    barometer: Regex,
    max_records: usize,
}

impl Default for SubtitleTelemetryParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SubtitleTelemetryParser {
    pub fn new() -> Self {
        Self {
            latitude: rx(r"\[\s*latitude\s*:\s*(-?\d+(?:\.\d+)?)\s*\]"),
            longitude: rx(r"\[\s*longitude\s*:\s*(-?\d+(?:\.\d+)?)\s*\]"),
            abs_alt: rx(r"(?:abs_alt|altitude)\s*:\s*(-?\d+(?:\.\d+)?)"),
            rel_alt: rx(r"rel_alt\s*:\s*(-?\d+(?:\.\d+)?)"),
            gimbal: rx(
                r"gb_yaw\s*:\s*(-?\d+(?:\.\d+)?)\s+gb_pitch\s*:\s*(-?\d+(?:\.\d+)?)\s+gb_roll\s*:\s*(-?\d+(?:\.\d+)?)",
            ),
            gps_paren: rx(
                r"GPS\s*\(\s*(-?\d+(?:\.\d+)?)\s*,\s*(-?\d+(?:\.\d+)?)(?:\s*,\s*(-?\d+(?:\.\d+)?)\s*M?)?\s*\)",
            ),
            barometer: rx(r"(?i)barometer\s*:\s*(-?\d+(?:\.\d+)?)\s*M"),
            max_records: MAX_RECORDS,
        }
    }

    /// Parse raw SRT-style subtitle text. Cue start times become the
    /// records' relative media times.
    pub fn parse(&self, text: &str) -> SubtitleParseOutput {
        let mut records = Vec::new();
        let mut summary = SubtitleSummary::default();

        for cue in split_cues(text) {
            summary.cues_seen += 1;
            if records.len() >= self.max_records {
                log::warn!(
                    "telemetry record cap ({}) reached, ignoring remaining cues",
                    self.max_records
                );
                summary.truncated = true;
                break;
            }
            if let Some(record) = self.extract(cue.start_s, &cue.text) {
                summary.cues_matched += 1;
                records.push(record);
            }
        }

        debug!(
            "subtitle parse: {} of {} cues carried telemetry",
            summary.cues_matched, summary.cues_seen
        );
        SubtitleParseOutput { records, summary }
    }

    fn extract(&self, start_s: f64, text: &str) -> Option<TelemetryRecord> {
        let (lat_deg, lon_deg, alt_m) = self.position(text)?;
        if !(-90.0..=90.0).contains(&lat_deg) || !(-180.0..=180.0).contains(&lon_deg) {
            return None;
        }

        let mut pose = SensorPose {
            lat_deg,
            lon_deg,
            alt_m,
            heading_deg: None,
            pitch_deg: None,
            roll_deg: None,
        };
        if let Some(caps) = self.gimbal.captures(text) {
            pose.heading_deg = parse_group(&caps, 1);
            pose.pitch_deg = parse_group(&caps, 2);
            pose.roll_deg = parse_group(&caps, 3);
        }

        Some(TelemetryRecord::new(TelemetryTime::Relative(start_s), pose))
    }

    fn position(&self, text: &str) -> Option<(f64, f64, f64)> {
        // DJI bracket layout first; it is the more explicit of the two.
        if let (Some(lat), Some(lon)) = (
            self.latitude.captures(text).and_then(|c| parse_group(&c, 1)),
            self.longitude.captures(text).and_then(|c| parse_group(&c, 1)),
        ) {
            let alt = self
                .abs_alt
                .captures(text)
                .and_then(|c| parse_group(&c, 1))
                .or_else(|| self.rel_alt.captures(text).and_then(|c| parse_group(&c, 1)))
                .unwrap_or(0.0);
            return Some((lat, lon, alt));
        }

        // GPS(lon, lat, alt) caption layout, altitude optionally overridden
        // by a barometer reading.
        let caps = self.gps_paren.captures(text)?;
        let lon = parse_group(&caps, 1)?;
        let lat = parse_group(&caps, 2)?;
        let alt = self
            .barometer
            .captures(text)
            .and_then(|c| parse_group(&c, 1))
            .or_else(|| parse_group(&caps, 3))
            .unwrap_or(0.0);
        Some((lat, lon, alt))
    }
}

fn rx(pattern: &'static str) -> Regex {
    Regex::new(pattern).expect("static subtitle pattern")
}

fn parse_group(caps: &regex::Captures<'_>, index: usize) -> Option<f64> {
    caps.get(index)?.as_str().parse().ok()
}

struct Cue {
    start_s: f64,
    text: String,
}

/// Split SRT text into cues. Only the timing line and payload matter; the
/// numeric index line is ignored where present.
fn split_cues(text: &str) -> Vec<Cue> {
    let normalized = text.replace("\r\n", "\n");
    let mut cues = Vec::new();
    for block in normalized.split("\n\n") {
        let mut start = None;
        let mut payload = Vec::new();
        for line in block.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if start.is_none() {
                if let Some((from, _)) = trimmed.split_once("-->") {
                    start = parse_srt_timestamp(from.trim());
                    continue;
                }
                // Index line or stray text before the timing line.
                continue;
            }
            payload.push(trimmed);
        }
        if let Some(start_s) = start {
            cues.push(Cue {
                start_s,
                text: payload.join(" "),
            });
        }
    }
    cues
}

/// Parse `HH:MM:SS,mmm` (comma or dot millisecond separator) to seconds.
fn parse_srt_timestamp(s: &str) -> Option<f64> {
    let normalized = s.replace(',', ".");
    let parts: Vec<&str> = normalized.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: f64 = parts[0].parse().ok()?;
    let minutes: f64 = parts[1].parse().ok()?;
    let seconds: f64 = parts[2].parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DJI_SRT: &str = "\
1
00:00:01,000 --> 00:00:02,000
F/2.8, SS 120.00, ISO 110, EV 0, DZOOM 1.000
[latitude: 22.5897] [longitude: 113.9876] [rel_alt: 98.300 abs_alt: 132.500]
[gb_yaw: 12.3 gb_pitch: -45.6 gb_roll: 0.0]

2
00:00:02,000 --> 00:00:03,000
[latitude: 22.5899] [longitude: 113.9878] [rel_alt: 98.400 abs_alt: 132.600]
";

    const GPS_SRT: &str = "\
1
00:00:00,000 --> 00:00:01,000
HOME(113.9870,22.5890) 2024.03.01 10:00:00
GPS(113.9876,22.5897,132.5M) BAROMETER:98.3M
";

    #[test]
    fn dji_bracket_layout_parses_position_and_gimbal() {
        let out = SubtitleTelemetryParser::new().parse(DJI_SRT);
        assert_eq!(out.records.len(), 2);
        assert_eq!(out.summary.cues_seen, 2);

        let first = &out.records[0];
        assert_eq!(first.time, TelemetryTime::Relative(1.0));
        assert!((first.sensor.lat_deg - 22.5897).abs() < 1e-9);
        assert!((first.sensor.lon_deg - 113.9876).abs() < 1e-9);
        assert!((first.sensor.alt_m - 132.5).abs() < 1e-9);
        assert_eq!(first.sensor.heading_deg, Some(12.3));
        assert_eq!(first.sensor.pitch_deg, Some(-45.6));

        // Second cue has no gimbal block.
        assert_eq!(out.records[1].sensor.heading_deg, None);
    }

    #[test]
    fn gps_paren_layout_parses_lon_lat_order() {
        let out = SubtitleTelemetryParser::new().parse(GPS_SRT);
        assert_eq!(out.records.len(), 1);

        let record = &out.records[0];
        assert!((record.sensor.lat_deg - 22.5897).abs() < 1e-9);
        assert!((record.sensor.lon_deg - 113.9876).abs() < 1e-9);
        // Barometer overrides the GPS altitude field.
        assert!((record.sensor.alt_m - 98.3).abs() < 1e-9);
    }

    #[test]
    fn unrecognized_cues_yield_no_records() {
        let srt = "\
1
00:00:01,000 --> 00:00:02,000
Just a caption, no telemetry here.
";
        let out = SubtitleTelemetryParser::new().parse(srt);
        assert!(out.records.is_empty());
        assert_eq!(out.summary.cues_seen, 1);
        assert_eq!(out.summary.cues_matched, 0);
    }

    #[test]
    fn implausible_coordinates_are_dropped() {
        let srt = "\
1
00:00:01,000 --> 00:00:02,000
GPS(513.9876,122.5897,10.0M)
";
        let out = SubtitleTelemetryParser::new().parse(srt);
        assert!(out.records.is_empty());
    }

    #[test]
    fn timestamp_accepts_comma_and_dot_millis() {
        assert_eq!(parse_srt_timestamp("00:00:01,500"), Some(1.5));
        assert_eq!(parse_srt_timestamp("00:01:00.250"), Some(60.25));
        assert_eq!(parse_srt_timestamp("nonsense"), None);
    }
}
