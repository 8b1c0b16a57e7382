use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::Serialize;

use super::registry::{tag, TagRegistry, TagValue};
use crate::telemetry::{SensorPose, TargetPoint, TelemetryRecord, TelemetryTime, MAX_RECORDS};

/// The 16-byte MISB ST 0601 UAS Local Set universal key.
pub const UNIVERSAL_KEY: [u8; 16] = [
    0x06, 0x0E, 0x2B, 0x34, 0x02, 0x0B, 0x01, 0x01, 0x0E, 0x01, 0x03, 0x01, 0x01, 0x00, 0x00, 0x00,
];

/// Per-stream accounting. A single corrupt packet never aborts the run;
/// it lands in one of these counters instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KlvSummary {
    pub packets_accepted: usize,
    pub packets_rejected_checksum: usize,
    pub packets_rejected_incomplete: usize,
    pub packets_rejected_malformed: usize,
    pub unknown_tags: usize,
    pub truncated: bool,
}

#[derive(Debug)]
pub struct KlvParseOutput {
    pub records: Vec<TelemetryRecord>,
    pub summary: KlvSummary,
}

/// Scans a demuxed byte stream for ST 0601 packets and decodes them via an
/// injected tag registry.
pub struct KlvParser<'a> {
    registry: &'a TagRegistry,
    max_records: usize,
}

enum RejectReason {
    Malformed,
    Checksum,
    Incomplete,
}

enum PacketOutcome {
    Accepted { record: TelemetryRecord, next: usize },
    Rejected { reason: RejectReason, next: usize },
}

impl<'a> KlvParser<'a> {
    pub fn new(registry: &'a TagRegistry) -> Self {
        Self {
            registry,
            max_records: MAX_RECORDS,
        }
    }

    pub fn with_max_records(registry: &'a TagRegistry, max_records: usize) -> Self {
        Self {
            registry,
            max_records,
        }
    }

    /// Decode every packet in `data`. Records come out in stream order, all
    /// in the absolute time domain.
    pub fn parse(&self, data: &[u8]) -> KlvParseOutput {
        let mut records = Vec::new();
        let mut summary = KlvSummary::default();
        let mut pos = 0usize;

        while let Some(key_at) = find_universal_key(data, pos) {
            if records.len() >= self.max_records {
                warn!(
                    "telemetry record cap ({}) reached, dropping the rest of the stream",
                    self.max_records
                );
                summary.truncated = true;
                break;
            }

            match self.parse_packet(data, key_at, &mut summary) {
                PacketOutcome::Accepted { record, next } => {
                    records.push(record);
                    summary.packets_accepted += 1;
                    pos = next;
                }
                PacketOutcome::Rejected { reason, next } => {
                    match reason {
                        RejectReason::Malformed => {
                            debug!("malformed packet at offset {}, rescanning", key_at);
                            summary.packets_rejected_malformed += 1;
                        }
                        RejectReason::Checksum => {
                            warn!("checksum mismatch in packet at offset {}, discarded", key_at);
                            summary.packets_rejected_checksum += 1;
                        }
                        RejectReason::Incomplete => {
                            debug!(
                                "packet at offset {} lacks position/altitude/timestamp, dropped",
                                key_at
                            );
                            summary.packets_rejected_incomplete += 1;
                        }
                    }
                    pos = next;
                }
            }
        }

        debug!(
            "klv parse: {} accepted, {} checksum, {} incomplete, {} malformed, {} unknown tags",
            summary.packets_accepted,
            summary.packets_rejected_checksum,
            summary.packets_rejected_incomplete,
            summary.packets_rejected_malformed,
            summary.unknown_tags
        );
        KlvParseOutput { records, summary }
    }

    fn parse_packet(&self, data: &[u8], key_at: usize, summary: &mut KlvSummary) -> PacketOutcome {
        // When framing cannot be trusted, resume the key scan right after
        // this key rather than skipping data a bogus length points past.
        let rescan = key_at + UNIVERSAL_KEY.len();

        let Some((payload_len, len_bytes)) = read_ber_length(&data[rescan..]) else {
            return PacketOutcome::Rejected {
                reason: RejectReason::Malformed,
                next: rescan,
            };
        };
        let payload_start = rescan + len_bytes;
        let payload_end = match payload_start.checked_add(payload_len) {
            Some(end) if end <= data.len() => end,
            _ => {
                return PacketOutcome::Rejected {
                    reason: RejectReason::Malformed,
                    next: rescan,
                }
            }
        };
        let payload = &data[payload_start..payload_end];

        let mut fields = PacketFields::default();
        let mut offset = 0usize;
        while offset < payload.len() {
            let field_tag = payload[offset];
            let Some((value_len, value_len_bytes)) = read_ber_length(&payload[offset + 1..]) else {
                return PacketOutcome::Rejected {
                    reason: RejectReason::Malformed,
                    next: rescan,
                };
            };
            let value_start = offset + 1 + value_len_bytes;
            let value_end = match value_start.checked_add(value_len) {
                Some(end) if end <= payload.len() => end,
                _ => {
                    return PacketOutcome::Rejected {
                        reason: RejectReason::Malformed,
                        next: rescan,
                    }
                }
            };
            let value = &payload[value_start..value_end];

            if field_tag == tag::CHECKSUM {
                // The checksum covers everything from the first key byte up
                // to (not including) its own value bytes.
                fields.checksum_covers = Some(payload_start + value_start);
            }

            match self.registry.lookup(field_tag) {
                None => summary.unknown_tags += 1,
                Some(spec) => match (spec.decode)(value) {
                    Some(decoded) => fields.set(field_tag, decoded),
                    None => debug!(
                        "tag {} ({}): {}-byte value failed to decode, skipped",
                        field_tag,
                        spec.name,
                        value.len()
                    ),
                },
            }

            offset = value_end;
        }

        if let (Some(expected), Some(covers)) = (fields.checksum, fields.checksum_covers) {
            let actual = checksum_16(&data[key_at..covers]);
            if actual != expected {
                return PacketOutcome::Rejected {
                    reason: RejectReason::Checksum,
                    next: payload_end,
                };
            }
        }

        match fields.into_record() {
            Some(record) => PacketOutcome::Accepted {
                record,
                next: payload_end,
            },
            None => PacketOutcome::Rejected {
                reason: RejectReason::Incomplete,
                next: payload_end,
            },
        }
    }
}

/// Running 16-bit sum over `bytes`, high/low byte alternating, as ST 0601
/// defines for the local-set checksum.
pub fn checksum_16(bytes: &[u8]) -> u16 {
    bytes.iter().enumerate().fold(0u16, |acc, (i, b)| {
        acc.wrapping_add((*b as u16) << (8 * ((i + 1) % 2)))
    })
}

/// BER length: short form is a single byte < 0x80; long form sets the high
/// bit and encodes a length-of-length followed by big-endian length bytes.
/// Returns (length, bytes consumed).
fn read_ber_length(data: &[u8]) -> Option<(usize, usize)> {
    let first = *data.first()?;
    if first < 0x80 {
        return Some((first as usize, 1));
    }
    let count = (first & 0x7F) as usize;
    if count == 0 || count > 8 || data.len() < 1 + count {
        return None;
    }
    let mut length = 0usize;
    for byte in &data[1..1 + count] {
        length = length.checked_mul(256)?.checked_add(*byte as usize)?;
    }
    Some((length, 1 + count))
}

fn find_universal_key(data: &[u8], from: usize) -> Option<usize> {
    if from >= data.len() {
        return None;
    }
    data[from..]
        .windows(UNIVERSAL_KEY.len())
        .position(|window| window == UNIVERSAL_KEY)
        .map(|i| from + i)
}

/// Accumulates decoded fields of one packet before record assembly.
#[derive(Default)]
struct PacketFields {
    timestamp: Option<DateTime<Utc>>,
    sensor_lat: Option<f64>,
    sensor_lon: Option<f64>,
    sensor_alt: Option<f64>,
    platform_heading: Option<f64>,
    platform_pitch: Option<f64>,
    platform_roll: Option<f64>,
    hfov: Option<f64>,
    vfov: Option<f64>,
    rel_azimuth: Option<f64>,
    rel_elevation: Option<f64>,
    frame_center_lat: Option<f64>,
    frame_center_lon: Option<f64>,
    frame_center_elev: Option<f64>,
    checksum: Option<u16>,
    checksum_covers: Option<usize>,
}

impl PacketFields {
    fn set(&mut self, field_tag: u8, value: TagValue) {
        match field_tag {
            tag::CHECKSUM => {
                if let TagValue::Uint(v) = value {
                    self.checksum = Some(v as u16);
                }
            }
            tag::PRECISION_TIMESTAMP => {
                if let TagValue::Timestamp(dt) = value {
                    self.timestamp = Some(dt);
                }
            }
            tag::MISSION_ID => {
                if let TagValue::Text(id) = value {
                    debug!("mission id: {}", id);
                }
            }
            tag::PLATFORM_HEADING => self.platform_heading = value.as_f64(),
            tag::PLATFORM_PITCH => self.platform_pitch = value.as_f64(),
            tag::PLATFORM_ROLL => self.platform_roll = value.as_f64(),
            tag::SENSOR_LATITUDE => self.sensor_lat = value.as_f64(),
            tag::SENSOR_LONGITUDE => self.sensor_lon = value.as_f64(),
            tag::SENSOR_TRUE_ALTITUDE => self.sensor_alt = value.as_f64(),
            tag::SENSOR_HFOV => self.hfov = value.as_f64(),
            tag::SENSOR_VFOV => self.vfov = value.as_f64(),
            tag::SENSOR_REL_AZIMUTH => self.rel_azimuth = value.as_f64(),
            tag::SENSOR_REL_ELEVATION => self.rel_elevation = value.as_f64(),
            tag::FRAME_CENTER_LATITUDE => self.frame_center_lat = value.as_f64(),
            tag::FRAME_CENTER_LONGITUDE => self.frame_center_lon = value.as_f64(),
            tag::FRAME_CENTER_ELEVATION => self.frame_center_elev = value.as_f64(),
            _ => {}
        }
    }

    /// Position, altitude and timestamp are the minimum a usable record
    /// needs; anything less is dropped upstream.
    fn into_record(self) -> Option<TelemetryRecord> {
        let time = TelemetryTime::Absolute(self.timestamp?);
        let lat_deg = self.sensor_lat?;
        let lon_deg = self.sensor_lon?;
        let alt_m = self.sensor_alt?;

        // Sensor-relative angles ride on top of the platform attitude to
        // give the effective look direction.
        let heading_deg = match (self.platform_heading, self.rel_azimuth) {
            (Some(heading), Some(azimuth)) => Some((heading + azimuth).rem_euclid(360.0)),
            (heading, None) => heading,
            (None, azimuth) => azimuth,
        };
        let pitch_deg = match (self.platform_pitch, self.rel_elevation) {
            (Some(pitch), Some(elevation)) => Some(pitch + elevation),
            (pitch, None) => pitch,
            (None, elevation) => elevation,
        };

        let mut record = TelemetryRecord::new(
            time,
            SensorPose {
                lat_deg,
                lon_deg,
                alt_m,
                heading_deg,
                pitch_deg,
                roll_deg: self.platform_roll,
            },
        );
        if let (Some(target_lat), Some(target_lon)) = (self.frame_center_lat, self.frame_center_lon)
        {
            record.target = Some(TargetPoint {
                lat_deg: target_lat,
                lon_deg: target_lon,
                elev_m: self.frame_center_elev.unwrap_or(0.0),
            });
        }
        record.fov_horizontal_deg = self.hfov;
        record.fov_vertical_deg = self.vfov;
        Some(record)
    }
}
