use chrono::{DateTime, Utc};

/// MISB ST 0601 local-set tag numbers understood by this subsystem.
/// Everything else is skipped and counted.
pub mod tag {
    pub const CHECKSUM: u8 = 1;
    pub const PRECISION_TIMESTAMP: u8 = 2;
    pub const MISSION_ID: u8 = 3;
    pub const PLATFORM_HEADING: u8 = 5;
    pub const PLATFORM_PITCH: u8 = 6;
    pub const PLATFORM_ROLL: u8 = 7;
    pub const SENSOR_LATITUDE: u8 = 13;
    pub const SENSOR_LONGITUDE: u8 = 14;
    pub const SENSOR_TRUE_ALTITUDE: u8 = 15;
    pub const SENSOR_HFOV: u8 = 16;
    pub const SENSOR_VFOV: u8 = 17;
    pub const SENSOR_REL_AZIMUTH: u8 = 18;
    pub const SENSOR_REL_ELEVATION: u8 = 19;
    pub const FRAME_CENTER_LATITUDE: u8 = 40;
    pub const FRAME_CENTER_LONGITUDE: u8 = 41;
    pub const FRAME_CENTER_ELEVATION: u8 = 42;
}

/// Decoded value of a single local-set field.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Float(f64),
    Uint(u64),
    Timestamp(DateTime<Utc>),
    Text(String),
}

impl TagValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Float(v) => Some(*v),
            TagValue::Uint(v) => Some(*v as f64),
            _ => None,
        }
    }
}

/// How to decode one tag: its name for diagnostics and a pure decode
/// function over the raw value bytes. Decoders reject values of the wrong
/// width rather than guessing.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub tag: u8,
    pub name: &'static str,
    pub decode: fn(&[u8]) -> Option<TagValue>,
}

/// Immutable tag table, built once and passed by reference into the
/// parser. Not a mutable global: parsers stay testable and reentrant.
pub struct TagRegistry {
    table: [Option<FieldSpec>; 256],
}

const ST0601_SPECS: &[FieldSpec] = &[
    FieldSpec { tag: tag::CHECKSUM, name: "checksum", decode: dec_u16_raw },
    FieldSpec { tag: tag::PRECISION_TIMESTAMP, name: "precision_time_stamp", decode: dec_timestamp_us },
    FieldSpec { tag: tag::MISSION_ID, name: "mission_id", decode: dec_utf8 },
    FieldSpec { tag: tag::PLATFORM_HEADING, name: "platform_heading_angle", decode: dec_heading_u16 },
    FieldSpec { tag: tag::PLATFORM_PITCH, name: "platform_pitch_angle", decode: dec_pitch_i16 },
    FieldSpec { tag: tag::PLATFORM_ROLL, name: "platform_roll_angle", decode: dec_roll_i16 },
    FieldSpec { tag: tag::SENSOR_LATITUDE, name: "sensor_latitude", decode: dec_lat_i32 },
    FieldSpec { tag: tag::SENSOR_LONGITUDE, name: "sensor_longitude", decode: dec_lon_i32 },
    FieldSpec { tag: tag::SENSOR_TRUE_ALTITUDE, name: "sensor_true_altitude", decode: dec_alt_u16 },
    FieldSpec { tag: tag::SENSOR_HFOV, name: "sensor_horizontal_fov", decode: dec_fov_u16 },
    FieldSpec { tag: tag::SENSOR_VFOV, name: "sensor_vertical_fov", decode: dec_fov_u16 },
    FieldSpec { tag: tag::SENSOR_REL_AZIMUTH, name: "sensor_relative_azimuth", decode: dec_azimuth_u32 },
    FieldSpec { tag: tag::SENSOR_REL_ELEVATION, name: "sensor_relative_elevation", decode: dec_rel_elevation_i32 },
    FieldSpec { tag: tag::FRAME_CENTER_LATITUDE, name: "frame_center_latitude", decode: dec_lat_i32 },
    FieldSpec { tag: tag::FRAME_CENTER_LONGITUDE, name: "frame_center_longitude", decode: dec_lon_i32 },
    FieldSpec { tag: tag::FRAME_CENTER_ELEVATION, name: "frame_center_elevation", decode: dec_alt_u16 },
];

impl TagRegistry {
    /// The ST 0601 subset needed for position, orientation and time.
    pub fn st0601() -> Self {
        let mut table = [None; 256];
        for spec in ST0601_SPECS {
            table[spec.tag as usize] = Some(*spec);
        }
        Self { table }
    }

    pub fn lookup(&self, tag: u8) -> Option<&FieldSpec> {
        self.table[tag as usize].as_ref()
    }
}

fn be_u16(bytes: &[u8]) -> Option<u16> {
    Some(u16::from_be_bytes(bytes.try_into().ok()?))
}

fn be_i16(bytes: &[u8]) -> Option<i16> {
    Some(i16::from_be_bytes(bytes.try_into().ok()?))
}

fn be_u32(bytes: &[u8]) -> Option<u32> {
    Some(u32::from_be_bytes(bytes.try_into().ok()?))
}

fn be_i32(bytes: &[u8]) -> Option<i32> {
    Some(i32::from_be_bytes(bytes.try_into().ok()?))
}

fn be_u64(bytes: &[u8]) -> Option<u64> {
    Some(u64::from_be_bytes(bytes.try_into().ok()?))
}

// Linear maps from the documented integer range to the physical range.

fn dec_lat_i32(bytes: &[u8]) -> Option<TagValue> {
    let raw = be_i32(bytes)?;
    Some(TagValue::Float(raw as f64 / i32::MAX as f64 * 90.0))
}

fn dec_lon_i32(bytes: &[u8]) -> Option<TagValue> {
    let raw = be_i32(bytes)?;
    Some(TagValue::Float(raw as f64 / i32::MAX as f64 * 180.0))
}

fn dec_alt_u16(bytes: &[u8]) -> Option<TagValue> {
    // -900 .. 19000 m
    let raw = be_u16(bytes)?;
    Some(TagValue::Float(raw as f64 / u16::MAX as f64 * 19_900.0 - 900.0))
}

fn dec_heading_u16(bytes: &[u8]) -> Option<TagValue> {
    let raw = be_u16(bytes)?;
    Some(TagValue::Float(raw as f64 / u16::MAX as f64 * 360.0))
}

fn dec_pitch_i16(bytes: &[u8]) -> Option<TagValue> {
    let raw = be_i16(bytes)?;
    Some(TagValue::Float(raw as f64 / i16::MAX as f64 * 20.0))
}

fn dec_roll_i16(bytes: &[u8]) -> Option<TagValue> {
    let raw = be_i16(bytes)?;
    Some(TagValue::Float(raw as f64 / i16::MAX as f64 * 50.0))
}

fn dec_fov_u16(bytes: &[u8]) -> Option<TagValue> {
    let raw = be_u16(bytes)?;
    Some(TagValue::Float(raw as f64 / u16::MAX as f64 * 180.0))
}

fn dec_azimuth_u32(bytes: &[u8]) -> Option<TagValue> {
    let raw = be_u32(bytes)?;
    Some(TagValue::Float(raw as f64 / u32::MAX as f64 * 360.0))
}

fn dec_rel_elevation_i32(bytes: &[u8]) -> Option<TagValue> {
    let raw = be_i32(bytes)?;
    Some(TagValue::Float(raw as f64 / i32::MAX as f64 * 180.0))
}

fn dec_timestamp_us(bytes: &[u8]) -> Option<TagValue> {
    let micros = be_u64(bytes)?;
    let dt = DateTime::from_timestamp_micros(i64::try_from(micros).ok()?)?;
    Some(TagValue::Timestamp(dt))
}

fn dec_u16_raw(bytes: &[u8]) -> Option<TagValue> {
    Some(TagValue::Uint(be_u16(bytes)? as u64))
}

fn dec_utf8(bytes: &[u8]) -> Option<TagValue> {
    Some(TagValue::Text(String::from_utf8(bytes.to_vec()).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latitude_decodes_full_scale() {
        let spec = TagRegistry::st0601().lookup(tag::SENSOR_LATITUDE).unwrap().decode;
        assert_eq!(spec(&i32::MAX.to_be_bytes()), Some(TagValue::Float(90.0)));
        let half = (i32::MAX / 2).to_be_bytes();
        match spec(&half) {
            Some(TagValue::Float(v)) => assert!((v - 45.0).abs() < 1e-6),
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn altitude_offsets_below_sea_level() {
        let spec = TagRegistry::st0601().lookup(tag::SENSOR_TRUE_ALTITUDE).unwrap().decode;
        assert_eq!(spec(&0u16.to_be_bytes()), Some(TagValue::Float(-900.0)));
        assert_eq!(spec(&u16::MAX.to_be_bytes()), Some(TagValue::Float(19_000.0)));
    }

    #[test]
    fn wrong_width_is_rejected() {
        let spec = TagRegistry::st0601().lookup(tag::SENSOR_LATITUDE).unwrap().decode;
        assert_eq!(spec(&[0x01, 0x02]), None);
    }

    #[test]
    fn timestamp_roundtrips_microseconds() {
        let spec = TagRegistry::st0601().lookup(tag::PRECISION_TIMESTAMP).unwrap().decode;
        let micros: u64 = 1_700_000_000_123_456;
        match spec(&micros.to_be_bytes()) {
            Some(TagValue::Timestamp(dt)) => {
                assert_eq!(dt.timestamp_micros(), micros as i64);
            }
            other => panic!("unexpected decode: {:?}", other),
        }
    }

    #[test]
    fn unknown_tag_has_no_spec() {
        assert!(TagRegistry::st0601().lookup(97).is_none());
    }
}
