use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::geometry::{likely_visual_observation, GeometryConfig};
use crate::telemetry::{
    GeoAttachment, GeoEvent, GeoSensor, GeoTarget, TelemetryRecord, TelemetryTime,
    TranscriptSegment,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatorConfig {
    /// A segment with no sample inside its span still matches the nearest
    /// sample up to this many seconds away.
    pub max_match_gap_s: f64,
    /// Never interpolate between samples further apart than this; a
    /// fabricated position across a long gap is worse than none.
    pub max_interpolation_gap_s: f64,
}

impl Default for CorrelatorConfig {
    fn default() -> Self {
        Self {
            max_match_gap_s: 5.0,
            max_interpolation_gap_s: 10.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CorrelationSummary {
    pub segments_enriched: usize,
    pub segments_unenriched: usize,
}

#[derive(Debug)]
pub struct CorrelationOutput {
    pub events: Vec<GeoEvent>,
    pub summary: CorrelationSummary,
}

/// Aligns ordered telemetry records with ordered transcript segments.
///
/// Records in the relative domain are matched directly on the media time
/// axis. Absolute-domain records need the caller-supplied wall-clock
/// instant of media t=0; without it they cannot be registered and every
/// segment is left unenriched. The offset is never inferred here.
pub struct GeoCorrelator {
    config: CorrelatorConfig,
    geometry: GeometryConfig,
}

impl GeoCorrelator {
    pub fn new(config: CorrelatorConfig, geometry: GeometryConfig) -> Self {
        Self { config, geometry }
    }

    pub fn correlate(
        &self,
        records: &[TelemetryRecord],
        segments: &[TranscriptSegment],
        media_start_utc: Option<DateTime<Utc>>,
    ) -> CorrelationOutput {
        let timeline: Vec<(f64, &TelemetryRecord)> = records
            .iter()
            .filter_map(|r| r.time.media_seconds(media_start_utc).map(|t| (t, r)))
            .collect();

        if timeline.is_empty() && !records.is_empty() {
            warn!(
                "absolute-domain telemetry without a media start anchor; \
                 correlation unavailable"
            );
        }

        let mut summary = CorrelationSummary::default();
        let mut events = Vec::with_capacity(segments.len());
        for segment in segments {
            let geoint = self
                .match_segment(&timeline, segment, media_start_utc)
                .map(|record| self.attach(&record));
            match geoint {
                Some(_) => summary.segments_enriched += 1,
                None => summary.segments_unenriched += 1,
            }
            events.push(GeoEvent {
                segment: segment.clone(),
                geoint,
            });
        }

        debug!(
            "correlated {} segments, {} enriched, {} unenriched",
            segments.len(),
            summary.segments_enriched,
            summary.segments_unenriched
        );
        CorrelationOutput { events, summary }
    }

    /// Pick or synthesize the record for one segment: a sample inside the
    /// segment span wins (nearest the midpoint on ties), then bracketing
    /// samples close enough to interpolate between, then the nearest
    /// sample within the match gap.
    fn match_segment(
        &self,
        timeline: &[(f64, &TelemetryRecord)],
        segment: &TranscriptSegment,
        media_start_utc: Option<DateTime<Utc>>,
    ) -> Option<TelemetryRecord> {
        if timeline.is_empty() {
            return None;
        }
        let midpoint = (segment.start + segment.end) / 2.0;

        let in_window = timeline
            .iter()
            .filter(|(t, _)| *t >= segment.start && *t <= segment.end)
            .min_by(|(a, _), (b, _)| (a - midpoint).abs().total_cmp(&(b - midpoint).abs()));
        if let Some((_, record)) = in_window {
            return Some((*record).clone());
        }

        let before = timeline
            .iter()
            .filter(|(t, _)| *t < segment.start)
            .max_by(|(a, _), (b, _)| a.total_cmp(b));
        let after = timeline
            .iter()
            .filter(|(t, _)| *t > segment.end)
            .min_by(|(a, _), (b, _)| a.total_cmp(b));
        if let (Some((t0, r0)), Some((t1, r1))) = (before, after) {
            if t1 - t0 <= self.config.max_interpolation_gap_s {
                return Some(interpolate((*t0, *r0), (*t1, *r1), midpoint, media_start_utc));
            }
        }

        let nearest = timeline
            .iter()
            .min_by(|(a, _), (b, _)| {
                interval_distance(*a, segment).total_cmp(&interval_distance(*b, segment))
            })
            .filter(|(t, _)| interval_distance(*t, segment) <= self.config.max_match_gap_s);
        nearest.map(|(_, record)| (*record).clone())
    }

    fn attach(&self, record: &TelemetryRecord) -> GeoAttachment {
        GeoAttachment {
            timestamp: record.time,
            sensor: GeoSensor {
                lat: record.sensor.lat_deg,
                lon: record.sensor.lon_deg,
                alt: record.sensor.alt_m,
                heading: record.sensor.heading_deg,
            },
            target: record.target.map(|t| GeoTarget {
                lat: t.lat_deg,
                lon: t.lon_deg,
                elev: t.elev_m,
            }),
            likely_visual_observation: likely_visual_observation(
                record.sensor.pitch_deg,
                record.fov_horizontal_deg,
                &self.geometry,
            ),
        }
    }
}

/// Linear interpolation of position between two bracketing samples,
/// weighted by time distance. Only lat/lon/alt are interpolated; angular
/// fields and FOV are carried from the time-nearer sample, the encoded
/// target is not carried at all.
fn interpolate(
    (t0, r0): (f64, &TelemetryRecord),
    (t1, r1): (f64, &TelemetryRecord),
    at: f64,
    media_start_utc: Option<DateTime<Utc>>,
) -> TelemetryRecord {
    let span = t1 - t0;
    let weight = if span > 0.0 { (at - t0) / span } else { 0.0 };
    let nearer = if at - t0 <= t1 - at { r0 } else { r1 };

    let time = match (r0.time, media_start_utc) {
        (TelemetryTime::Absolute(_), Some(start)) => {
            TelemetryTime::Absolute(start + Duration::microseconds((at * 1e6) as i64))
        }
        _ => TelemetryTime::Relative(at),
    };

    let mut record = TelemetryRecord::new(
        time,
        crate::telemetry::SensorPose {
            lat_deg: lerp(r0.sensor.lat_deg, r1.sensor.lat_deg, weight),
            lon_deg: lerp(r0.sensor.lon_deg, r1.sensor.lon_deg, weight),
            alt_m: lerp(r0.sensor.alt_m, r1.sensor.alt_m, weight),
            heading_deg: nearer.sensor.heading_deg,
            pitch_deg: nearer.sensor.pitch_deg,
            roll_deg: nearer.sensor.roll_deg,
        },
    );
    record.fov_horizontal_deg = nearer.fov_horizontal_deg;
    record.fov_vertical_deg = nearer.fov_vertical_deg;
    record
}

fn lerp(a: f64, b: f64, w: f64) -> f64 {
    a + (b - a) * w
}

/// Distance from a point in time to a segment's span; zero inside it.
fn interval_distance(t: f64, segment: &TranscriptSegment) -> f64 {
    if t < segment.start {
        segment.start - t
    } else if t > segment.end {
        t - segment.end
    } else {
        0.0
    }
}
