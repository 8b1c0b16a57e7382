use serde::Serialize;

use super::record::{TargetPoint, TelemetryRecord};
use super::segment::GeoEvent;

/// Which source format the telemetry was decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryFormat {
    Klv,
    Subtitle,
}

/// Everything derived from one input file: the ordered sensor records,
/// plus the correlated transcript events. Owned by one processing job and
/// discarded after export.
#[derive(Debug, Clone, Serialize)]
pub struct MissionTrack {
    pub format: TelemetryFormat,
    pub records: Vec<TelemetryRecord>,
    pub events: Vec<GeoEvent>,
}

impl MissionTrack {
    /// Chronological list of resolved target points.
    pub fn target_track(&self) -> Vec<&TargetPoint> {
        self.records.iter().filter_map(|r| r.target.as_ref()).collect()
    }
}
