use serde::{Deserialize, Serialize};

use crate::telemetry::{SensorPose, TargetPoint};

/// Mean earth radius, meters. The flat-earth ENU approximation below is
/// good to well under a meter at drone altitudes and short slant ranges;
/// no ellipsoidal correction is applied.
const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Tunables for ground-intersection and the visual-observation heuristic.
///
/// The heuristic thresholds are advisory and not rigorously specified in
/// available documentation; callers are expected to tune them rather than
/// treat the defaults as ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Assumed height of the sensor above local ground when no target
    /// elevation is encoded, meters.
    pub default_ground_clearance_m: f64,
    /// Solutions with a longer slant range than this are kept but flagged
    /// low-confidence, meters.
    pub low_confidence_slant_range_m: f64,
    /// Minimum depression angle for `likely_visual_observation`, degrees.
    pub min_depression_deg: f64,
    /// Maximum horizontal field of view for `likely_visual_observation`,
    /// degrees.
    pub max_horizontal_fov_deg: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            default_ground_clearance_m: 120.0,
            low_confidence_slant_range_m: 10_000.0,
            min_depression_deg: 20.0,
            max_horizontal_fov_deg: 60.0,
        }
    }
}

/// A reconstructed camera-to-ground intersection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroundSolution {
    pub point: TargetPoint,
    pub slant_range_m: f64,
    pub low_confidence: bool,
}

/// Intersect the sensor's look ray with a flat ground plane.
///
/// Heading and pitch are converted to a unit direction in a local
/// East-North-Up frame centered at the sensor; the ray is intersected with
/// a horizontal plane at the assumed ground elevation and the hit point is
/// mapped back to WGS84 degrees through the same local approximation.
/// Returns `None` when heading or pitch is missing, or when the ray does
/// not point below the horizon.
pub fn ground_intersection(sensor: &SensorPose, config: &GeometryConfig) -> Option<GroundSolution> {
    let heading_rad = sensor.heading_deg?.to_radians();
    let pitch_rad = sensor.pitch_deg?.to_radians();

    let down = -pitch_rad.sin();
    if down <= 0.0 {
        // Level or above the horizon: no ground intersection.
        return None;
    }

    let ground_elev_m = sensor.alt_m - config.default_ground_clearance_m;
    let height_m = sensor.alt_m - ground_elev_m;

    let horizontal = pitch_rad.cos();
    let east = heading_rad.sin() * horizontal;
    let north = heading_rad.cos() * horizontal;

    let slant_range_m = height_m / down;
    let east_m = east * slant_range_m;
    let north_m = north * slant_range_m;

    let lat_rad = sensor.lat_deg.to_radians();
    let lat_deg = sensor.lat_deg + (north_m / EARTH_RADIUS_M).to_degrees();
    let lon_deg = sensor.lon_deg + (east_m / (EARTH_RADIUS_M * lat_rad.cos())).to_degrees();

    Some(GroundSolution {
        point: TargetPoint {
            lat_deg,
            lon_deg,
            elev_m: ground_elev_m,
        },
        slant_range_m,
        low_confidence: slant_range_m > config.low_confidence_slant_range_m,
    })
}

/// Advisory guess at whether the sensor is plausibly staring at a ground
/// target: pointed steeply down with a narrow field of view. Missing pitch
/// or FOV means `false`.
pub fn likely_visual_observation(
    pitch_deg: Option<f64>,
    horizontal_fov_deg: Option<f64>,
    config: &GeometryConfig,
) -> bool {
    let (Some(pitch), Some(hfov)) = (pitch_deg, horizontal_fov_deg) else {
        return false;
    };
    let depression = -pitch;
    depression > config.min_depression_deg && hfov < config.max_horizontal_fov_deg
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(lat: f64, lon: f64, alt: f64, heading: f64, pitch: f64) -> SensorPose {
        SensorPose {
            lat_deg: lat,
            lon_deg: lon,
            alt_m: alt,
            heading_deg: Some(heading),
            pitch_deg: Some(pitch),
            roll_deg: None,
        }
    }

    #[test]
    fn straight_down_hits_the_sensor_footprint() {
        let sensor = pose(35.0, -117.0, 2500.0, 123.0, -90.0);
        let solution = ground_intersection(&sensor, &GeometryConfig::default()).unwrap();
        assert!((solution.point.lat_deg - 35.0).abs() < 1e-9);
        assert!((solution.point.lon_deg - -117.0).abs() < 1e-9);
        assert!((solution.slant_range_m - 120.0).abs() < 1e-6);
        assert!(!solution.low_confidence);
    }

    #[test]
    fn forty_five_degrees_north_offsets_latitude_only() {
        let config = GeometryConfig::default();
        let sensor = pose(35.0, -117.0, 1000.0, 0.0, -45.0);
        let solution = ground_intersection(&sensor, &config).unwrap();

        // At 45 degrees down the horizontal reach equals the height above
        // the assumed ground plane.
        let expected_north_m = config.default_ground_clearance_m;
        let expected_lat = 35.0 + (expected_north_m / super::EARTH_RADIUS_M).to_degrees();
        assert!((solution.point.lat_deg - expected_lat).abs() < 1e-9);
        assert!((solution.point.lon_deg - -117.0).abs() < 1e-9);
    }

    #[test]
    fn level_or_upward_pitch_has_no_solution() {
        let config = GeometryConfig::default();
        assert!(ground_intersection(&pose(35.0, -117.0, 1000.0, 90.0, 0.0), &config).is_none());
        assert!(ground_intersection(&pose(35.0, -117.0, 1000.0, 90.0, 10.0), &config).is_none());
    }

    #[test]
    fn missing_pointing_angles_have_no_solution() {
        let sensor = SensorPose {
            lat_deg: 35.0,
            lon_deg: -117.0,
            alt_m: 1000.0,
            heading_deg: None,
            pitch_deg: Some(-30.0),
            roll_deg: None,
        };
        assert!(ground_intersection(&sensor, &GeometryConfig::default()).is_none());
    }

    #[test]
    fn shallow_grazing_ray_is_flagged_low_confidence() {
        // About 0.5 degrees of depression stretches 120 m of clearance past
        // the 10 km slant-range threshold.
        let sensor = pose(35.0, -117.0, 1000.0, 0.0, -0.5);
        let solution = ground_intersection(&sensor, &GeometryConfig::default()).unwrap();
        assert!(solution.slant_range_m > 10_000.0);
        assert!(solution.low_confidence);
    }

    #[test]
    fn heuristic_matches_threshold_cases() {
        let config = GeometryConfig::default();
        assert!(likely_visual_observation(Some(-85.0), Some(10.0), &config));
        assert!(!likely_visual_observation(Some(-5.0), Some(90.0), &config));
        assert!(!likely_visual_observation(None, Some(10.0), &config));
        assert!(!likely_visual_observation(Some(-85.0), None, &config));
    }
}
