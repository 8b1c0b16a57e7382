mod record;
mod segment;
mod track;

pub use record::{SensorPose, TargetPoint, TelemetryRecord, TelemetryTime};
pub use segment::{GeoAttachment, GeoEvent, GeoSensor, GeoTarget, TranscriptSegment};
pub use track::{MissionTrack, TelemetryFormat};

/// Hard cap on records kept from one parse run. Hours of 10 Hz telemetry
/// stay well below this; anything past it is dropped with a warning.
pub const MAX_RECORDS: usize = 200_000;
