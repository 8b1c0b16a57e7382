use serde::{Deserialize, Serialize};

use super::record::TelemetryTime;

/// A transcript segment as produced by the transcription subsystem.
/// Consumed read-only; times are seconds from media start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
}

/// Sensor state serialized into an enriched segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoSensor {
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    pub heading: Option<f64>,
}

/// Target point serialized into an enriched segment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoTarget {
    pub lat: f64,
    pub lon: f64,
    pub elev: f64,
}

/// The geospatial block attached to a segment that matched a telemetry
/// sample. `likely_visual_observation` is advisory, not ground truth.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoAttachment {
    pub timestamp: TelemetryTime,
    pub sensor: GeoSensor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<GeoTarget>,
    pub likely_visual_observation: bool,
}

/// A transcript segment, non-destructively augmented. A segment with no
/// telemetry sample nearby simply has no `geoint` block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoEvent {
    #[serde(flatten)]
    pub segment: TranscriptSegment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geoint: Option<GeoAttachment>,
}
