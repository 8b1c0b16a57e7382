//! GEOINT telemetry extraction for drone video.
//!
//! This crate turns a demuxed MISB ST 0601 KLV byte stream, or telemetry
//! burned into consumer-drone subtitle tracks, into an ordered list of
//! platform states; reconstructs camera-to-ground intersection points when
//! no target is encoded; aligns the result with transcript segments across
//! relative or absolute clock domains; and renders everything as a KML
//! document and a standalone Leaflet map.
//!
//! The subsystem is strictly additive: [`GeoIntProcessor::process`] returns
//! `None` when no telemetry is present, and per-packet corruption is
//! contained as summary counts rather than errors. It performs no network
//! I/O and owns no persistent state; the outer pipeline invokes it once per
//! file.

pub mod correlate;
pub mod export;
pub mod geometry;
pub mod klv;
pub mod processor;
pub mod subtitle;
pub mod telemetry;

pub use correlate::{CorrelatorConfig, GeoCorrelator};
pub use export::{ExportConfig, ExportError, ExportPaths};
pub use geometry::{GeometryConfig, GroundSolution};
pub use klv::{KlvParser, TagRegistry};
pub use processor::{
    GeoIntError, GeoIntOutput, GeoIntProcessor, GeoIntRequest, GeoIntResult, ProcessingSummary,
    TelemetrySource,
};
pub use subtitle::SubtitleTelemetryParser;
pub use telemetry::{
    GeoAttachment, GeoEvent, MissionTrack, SensorPose, TargetPoint, TelemetryFormat,
    TelemetryRecord, TelemetryTime, TranscriptSegment,
};
