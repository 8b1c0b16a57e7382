use chrono::{DateTime, Utc};
use serde::Serialize;

/// Time base of a telemetry sample. A single parse run produces records in
/// exactly one domain: KLV streams carry absolute wall-clock stamps,
/// subtitle telemetry only knows its offset from media start.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryTime {
    Absolute(DateTime<Utc>),
    Relative(f64),
}

impl TelemetryTime {
    /// Position of this sample on the media time axis, in seconds.
    ///
    /// Absolute stamps need the wall-clock instant of media t=0; without it
    /// they cannot be placed and `None` is returned.
    pub fn media_seconds(&self, media_start: Option<DateTime<Utc>>) -> Option<f64> {
        match self {
            TelemetryTime::Relative(s) => Some(*s),
            TelemetryTime::Absolute(dt) => {
                let start = media_start?;
                Some((*dt - start).num_microseconds()? as f64 / 1e6)
            }
        }
    }
}

/// Platform position and pointing at one sample instant. Angles are WGS84
/// degrees; altitude is meters above mean sea level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorPose {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub alt_m: f64,
    pub heading_deg: Option<f64>,
    pub pitch_deg: Option<f64>,
    pub roll_deg: Option<f64>,
}

/// A point on the ground the sensor is looking at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub elev_m: f64,
}

/// One sampled platform state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryRecord {
    pub time: TelemetryTime,
    pub sensor: SensorPose,
    pub target: Option<TargetPoint>,
    /// True when `target` was reconstructed by the geometry engine rather
    /// than decoded from the stream.
    pub target_estimated: bool,
    /// True when the geometry solution exceeded the slant-range threshold.
    pub target_low_confidence: bool,
    pub fov_horizontal_deg: Option<f64>,
    pub fov_vertical_deg: Option<f64>,
}

impl TelemetryRecord {
    pub fn new(time: TelemetryTime, sensor: SensorPose) -> Self {
        Self {
            time,
            sensor,
            target: None,
            target_estimated: false,
            target_low_confidence: false,
            fov_horizontal_deg: None,
            fov_vertical_deg: None,
        }
    }
}
