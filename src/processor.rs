use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use thiserror::Error;

use crate::correlate::{CorrelationSummary, CorrelatorConfig, GeoCorrelator};
use crate::export::{self, ExportConfig, ExportError, ExportPaths};
use crate::geometry::{ground_intersection, GeometryConfig};
use crate::klv::{KlvParser, KlvSummary, TagRegistry};
use crate::subtitle::{SubtitleSummary, SubtitleTelemetryParser};
use crate::telemetry::{MissionTrack, TelemetryFormat, TelemetryRecord, TranscriptSegment};

#[derive(Debug, Error)]
pub enum GeoIntError {
    #[error("geoint export failed: {0}")]
    Export(#[from] ExportError),
}

/// Outcome of format detection, decided exactly once per job. KLV wins
/// over subtitle telemetry when both inputs yield records.
#[derive(Debug)]
pub enum TelemetrySource {
    Klv(Vec<TelemetryRecord>),
    Subtitle(Vec<TelemetryRecord>),
    None,
}

/// Accounting returned alongside the track: parser counters for whichever
/// format was detected, plus correlation counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessingSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub klv: Option<KlvSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<SubtitleSummary>,
    pub correlation: CorrelationSummary,
}

/// One job's worth of inputs, consumed read-only.
///
/// `media_start_utc` anchors absolute KLV timestamps to the media time
/// axis. It must come from the caller; when absent, absolute-domain
/// correlation is reported unavailable rather than guessed at.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoIntRequest<'a> {
    pub klv: Option<&'a [u8]>,
    pub subtitles: Option<&'a str>,
    pub segments: &'a [TranscriptSegment],
    pub media_start_utc: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct GeoIntResult {
    pub track: MissionTrack,
    pub summary: ProcessingSummary,
}

#[derive(Debug)]
pub struct GeoIntOutput {
    pub track: MissionTrack,
    pub summary: ProcessingSummary,
    pub paths: ExportPaths,
}

/// Orchestrates detection, parsing, target resolution, correlation and
/// export for one input file.
///
/// GEOINT is strictly additive: when no telemetry format is detected the
/// processor returns `None` and the transcript pipeline proceeds
/// unaffected. Per-packet problems are contained in the parsers and show
/// up only as summary counts; the single fatal path is export I/O.
pub struct GeoIntProcessor {
    registry: TagRegistry,
    subtitle_parser: SubtitleTelemetryParser,
    geometry: GeometryConfig,
    correlator: CorrelatorConfig,
    export: ExportConfig,
}

impl Default for GeoIntProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl GeoIntProcessor {
    pub fn new() -> Self {
        Self::with_configs(
            GeometryConfig::default(),
            CorrelatorConfig::default(),
            ExportConfig::default(),
        )
    }

    pub fn with_configs(
        geometry: GeometryConfig,
        correlator: CorrelatorConfig,
        export: ExportConfig,
    ) -> Self {
        Self {
            registry: TagRegistry::st0601(),
            subtitle_parser: SubtitleTelemetryParser::new(),
            geometry,
            correlator,
            export,
        }
    }

    /// Detect, parse and correlate. `None` means no telemetry was found.
    pub fn process(&self, request: &GeoIntRequest<'_>) -> Option<GeoIntResult> {
        let mut summary = ProcessingSummary::default();
        let (format, mut records) = match self.detect(request, &mut summary) {
            TelemetrySource::Klv(records) => (TelemetryFormat::Klv, records),
            TelemetrySource::Subtitle(records) => (TelemetryFormat::Subtitle, records),
            TelemetrySource::None => {
                info!("no telemetry format detected, skipping geoint");
                return None;
            }
        };

        self.resolve_targets(&mut records);

        let correlator = GeoCorrelator::new(self.correlator.clone(), self.geometry.clone());
        let correlation = correlator.correlate(&records, request.segments, request.media_start_utc);
        summary.correlation = correlation.summary;

        info!(
            "geoint: {:?} telemetry, {} records, {} of {} segments enriched",
            format,
            records.len(),
            summary.correlation.segments_enriched,
            request.segments.len()
        );
        Some(GeoIntResult {
            track: MissionTrack {
                format,
                records,
                events: correlation.events,
            },
            summary,
        })
    }

    /// `process` plus KML/HTML export into `out_dir`. Export I/O failure
    /// is fatal for this stage only and surfaces as an `Err`.
    pub fn run(
        &self,
        request: &GeoIntRequest<'_>,
        out_dir: &Path,
    ) -> Result<Option<GeoIntOutput>, GeoIntError> {
        let Some(result) = self.process(request) else {
            return Ok(None);
        };

        fs::create_dir_all(out_dir).map_err(ExportError::from)?;
        let paths = ExportPaths {
            kml: out_dir.join(export::KML_FILE_NAME),
            html: out_dir.join(export::HTML_FILE_NAME),
        };
        export::write_kml(&result.track, &self.export, &paths.kml)?;
        export::write_html(&result.track, &self.export, &paths.html)?;

        Ok(Some(GeoIntOutput {
            track: result.track,
            summary: result.summary,
            paths,
        }))
    }

    fn detect(
        &self,
        request: &GeoIntRequest<'_>,
        summary: &mut ProcessingSummary,
    ) -> TelemetrySource {
        if let Some(data) = request.klv {
            let parsed = KlvParser::new(&self.registry).parse(data);
            let usable = !parsed.records.is_empty();
            summary.klv = Some(parsed.summary);
            if usable {
                return TelemetrySource::Klv(parsed.records);
            }
        }
        if let Some(text) = request.subtitles {
            let parsed = self.subtitle_parser.parse(text);
            let usable = !parsed.records.is_empty();
            summary.subtitle = Some(parsed.summary);
            if usable {
                return TelemetrySource::Subtitle(parsed.records);
            }
        }
        TelemetrySource::None
    }

    /// Fill in a geometry-derived target for records that did not encode
    /// one. Estimates are flagged, and kept even when low-confidence.
    fn resolve_targets(&self, records: &mut [TelemetryRecord]) {
        for record in records.iter_mut().filter(|r| r.target.is_none()) {
            if let Some(solution) = ground_intersection(&record.sensor, &self.geometry) {
                record.target = Some(solution.point);
                record.target_estimated = true;
                record.target_low_confidence = solution.low_confidence;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::klv::{checksum_16, tag, UNIVERSAL_KEY};

    fn field(field_tag: u8, value: &[u8]) -> Vec<u8> {
        let mut out = vec![field_tag, value.len() as u8];
        out.extend_from_slice(value);
        out
    }

    fn klv_packet(lat_deg: f64, micros: u64) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend(field(tag::PRECISION_TIMESTAMP, &micros.to_be_bytes()));
        payload.extend(field(
            tag::SENSOR_LATITUDE,
            &((lat_deg / 90.0 * i32::MAX as f64).round() as i32).to_be_bytes(),
        ));
        payload.extend(field(
            tag::SENSOR_LONGITUDE,
            &((-117.0f64 / 180.0 * i32::MAX as f64).round() as i32).to_be_bytes(),
        ));
        payload.extend(field(
            tag::SENSOR_TRUE_ALTITUDE,
            &(((1000.0f64 + 900.0) / 19_900.0 * u16::MAX as f64).round() as u16).to_be_bytes(),
        ));
        payload.extend(field(
            tag::PLATFORM_HEADING,
            &((90.0f64 / 360.0 * u16::MAX as f64).round() as u16).to_be_bytes(),
        ));
        payload.extend(field(
            tag::PLATFORM_PITCH,
            &((-15.0f64 / 20.0 * i16::MAX as f64).round() as i16).to_be_bytes(),
        ));
        payload.extend_from_slice(&[tag::CHECKSUM, 2, 0, 0]);

        let mut out = UNIVERSAL_KEY.to_vec();
        out.push(payload.len() as u8);
        out.extend_from_slice(&payload);
        let sum = checksum_16(&out[..out.len() - 2]);
        let end = out.len();
        out[end - 2..].copy_from_slice(&sum.to_be_bytes());
        out
    }

    const DJI_SRT: &str = "\
1
00:00:01,000 --> 00:00:02,000
[latitude: 22.5897] [longitude: 113.9876] [abs_alt: 132.500]
";

    #[test]
    fn detection_prefers_klv_over_subtitles() {
        let stream = klv_packet(34.0, 1_700_000_000_000_000);
        let request = GeoIntRequest {
            klv: Some(&stream),
            subtitles: Some(DJI_SRT),
            segments: &[],
            media_start_utc: None,
        };
        let result = GeoIntProcessor::new().process(&request).unwrap();
        assert_eq!(result.track.format, TelemetryFormat::Klv);
        assert!(result.summary.klv.is_some());
        assert!(result.summary.subtitle.is_none());
    }

    #[test]
    fn subtitle_fallback_when_klv_has_no_packets() {
        let garbage = [0u8; 64];
        let request = GeoIntRequest {
            klv: Some(&garbage),
            subtitles: Some(DJI_SRT),
            segments: &[],
            media_start_utc: None,
        };
        let result = GeoIntProcessor::new().process(&request).unwrap();
        assert_eq!(result.track.format, TelemetryFormat::Subtitle);
    }

    #[test]
    fn no_telemetry_at_all_is_none_not_an_error() {
        let request = GeoIntRequest {
            klv: Some(&[1, 2, 3, 4]),
            subtitles: Some("1\n00:00:01,000 --> 00:00:02,000\nplain caption\n"),
            segments: &[],
            media_start_utc: None,
        };
        assert!(GeoIntProcessor::new().process(&request).is_none());
    }

    #[test]
    fn pointing_records_get_estimated_targets() {
        let stream = klv_packet(34.0, 1_700_000_000_000_000);
        let request = GeoIntRequest {
            klv: Some(&stream),
            ..GeoIntRequest::default()
        };
        let result = GeoIntProcessor::new().process(&request).unwrap();

        let record = &result.track.records[0];
        let target = record.target.expect("heading and pitch imply a ground point");
        assert!(record.target_estimated);
        // Looking east at -15 degrees: the footprint sits east of the sensor.
        assert!(target.lon_deg > record.sensor.lon_deg);
        assert!((target.lat_deg - record.sensor.lat_deg).abs() < 1e-6);
    }
}
