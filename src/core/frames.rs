use std::f64::consts::TAU;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::orbit::OrbitState;

/// WGS-84 equatorial radius, km.
pub const WGS84_A: f64 = 6378.137;
/// WGS-84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;
/// Earth rotation rate, rad/s.
const EARTH_ROTATION: f64 = 7.292_115_146_706_979e-5;

const GEODETIC_TOLERANCE: f64 = 1e-12;
const GEODETIC_MAX_ITERATIONS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeodeticPoint {
    /// Degrees, positive north.
    pub latitude: f64,
    /// Degrees in (-180, 180], positive east.
    pub longitude: f64,
    /// Kilometres above the WGS-84 ellipsoid.
    pub altitude: f64,
    pub time: DateTime<Utc>,
}

pub fn julian_date(time: DateTime<Utc>) -> f64 {
    let secs = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    secs / 86_400.0 + 2_440_587.5
}

/// Greenwich mean sidereal angle (IAU-82) in radians for a UT1 Julian date.
pub(crate) fn gstime(jd_ut1: f64) -> f64 {
    let t = (jd_ut1 - 2_451_545.0) / 36_525.0;
    let seconds = -6.2e-6 * t * t * t
        + 0.093_104 * t * t
        + (876_600.0 * 3600.0 + 8_640_184.812_866) * t
        + 67_310.548_41;
    let angle = (seconds.to_radians() / 240.0) % TAU;
    if angle < 0.0 {
        angle + TAU
    } else {
        angle
    }
}

pub fn gmst(time: DateTime<Utc>) -> f64 {
    gstime(julian_date(time))
}

/// Rotates a TEME vector into the Earth-fixed frame.
pub fn teme_to_ecef(v: [f64; 3], gmst: f64) -> [f64; 3] {
    let (s, c) = gmst.sin_cos();
    [c * v[0] + s * v[1], -s * v[0] + c * v[1], v[2]]
}

/// Earth-fixed velocity (km/s), removing the frame rotation.
pub fn teme_velocity_to_ecef(position: [f64; 3], velocity: [f64; 3], gmst: f64) -> [f64; 3] {
    let r = teme_to_ecef(position, gmst);
    let v = teme_to_ecef(velocity, gmst);
    [v[0] + EARTH_ROTATION * r[1], v[1] - EARTH_ROTATION * r[0], v[2]]
}

/// Iterative conversion from Earth-fixed coordinates (km) to
/// (latitude deg, longitude deg, altitude km).
pub fn ecef_to_geodetic(r: [f64; 3]) -> (f64, f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let p = r[0].hypot(r[1]);
    let mut lat = r[2].atan2(p * (1.0 - e2));
    for _ in 0..GEODETIC_MAX_ITERATIONS {
        let sin_lat = lat.sin();
        let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let next = (r[2] + e2 * n * sin_lat).atan2(p);
        let converged = (next - lat).abs() < GEODETIC_TOLERANCE;
        lat = next;
        if converged {
            break;
        }
    }
    let (sin_lat, cos_lat) = lat.sin_cos();
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let altitude = p * cos_lat + r[2] * sin_lat - n * (1.0 - e2 * sin_lat * sin_lat);
    let longitude = normalize_longitude(r[1].atan2(r[0]).to_degrees());
    (lat.to_degrees(), longitude, altitude)
}

pub fn geodetic_to_ecef(latitude: f64, longitude: f64, altitude: f64) -> [f64; 3] {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let (sin_lat, cos_lat) = latitude.to_radians().sin_cos();
    let (sin_lon, cos_lon) = longitude.to_radians().sin_cos();
    let n = WGS84_A / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    [
        (n + altitude) * cos_lat * cos_lon,
        (n + altitude) * cos_lat * sin_lon,
        (n * (1.0 - e2) + altitude) * sin_lat,
    ]
}

/// Maps any longitude in degrees into (-180, 180].
pub fn normalize_longitude(degrees: f64) -> f64 {
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Sub-satellite point for an inertial state.
pub fn to_geodetic(state: &OrbitState) -> GeodeticPoint {
    let ecef = teme_to_ecef(state.position, gmst(state.time));
    let (latitude, longitude, altitude) = ecef_to_geodetic(ecef);
    GeodeticPoint { latitude, longitude, altitude, time: state.time }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::orbit::{KeplerSettings, Propagator};
    use crate::core::tle::parse_element_set;
    use crate::core::tle::tests::{ISS_L1, ISS_L2};
    use chrono::TimeZone;

    #[test]
    fn sidereal_angle_at_j2000() {
        let j2000 = Utc.with_ymd_and_hms(2000, 1, 1, 12, 0, 0).unwrap();
        assert!((julian_date(j2000) - 2_451_545.0).abs() < 1e-9);
        // 280.46061837 degrees at J2000.0
        assert!((gmst(j2000).to_degrees() - 280.460_618_37).abs() < 1e-6);
    }

    #[test]
    fn geodetic_round_trip() {
        for &(lat, lon, alt) in &[
            (45.0, -75.0, 400.0),
            (-33.9, 151.2, 0.0),
            (89.9, 10.0, 35_786.0),
            (0.0, 180.0, 550.0),
        ] {
            let (lat2, lon2, alt2) = ecef_to_geodetic(geodetic_to_ecef(lat, lon, alt));
            assert!((lat - lat2).abs() < 1e-9, "{lat} vs {lat2}");
            assert!((normalize_longitude(lon) - lon2).abs() < 1e-9, "{lon} vs {lon2}");
            assert!((alt - alt2).abs() < 1e-6, "{alt} vs {alt2}");
        }
    }

    #[test]
    fn poles_do_not_diverge() {
        let (lat, _, alt) = ecef_to_geodetic([0.0, 0.0, 6756.752]);
        assert!((lat - 90.0).abs() < 1e-9);
        assert!((alt - 400.0).abs() < 1e-2);
    }

    #[test]
    fn longitude_range() {
        assert_eq!(normalize_longitude(-180.0), 180.0);
        assert_eq!(normalize_longitude(180.0), 180.0);
        assert_eq!(normalize_longitude(540.0), 180.0);
        assert!((normalize_longitude(-190.0) - 170.0).abs() < 1e-12);
        assert!((normalize_longitude(359.5) + 0.5).abs() < 1e-12);
        for i in -1000..1000 {
            let lon = normalize_longitude(i as f64 * 0.73);
            assert!(lon > -180.0 && lon <= 180.0);
        }
    }

    #[test]
    fn iss_sub_point_at_epoch() {
        let record = parse_element_set(None, ISS_L1, ISS_L2).unwrap();
        let state = Propagator::new(&record)
            .unwrap()
            .propagate_at(record.epoch, &KeplerSettings::default())
            .unwrap();
        let point = to_geodetic(&state);
        assert!((point.latitude - 51.4636).abs() < 1e-3, "{}", point.latitude);
        assert!((point.longitude - 160.1432).abs() < 1e-3, "{}", point.longitude);
        assert!((point.altitude - 355.10).abs() < 0.05, "{}", point.altitude);
        assert_eq!(point.time, record.epoch);
    }

    #[test]
    fn earth_fixed_velocity_is_slower_for_prograde_orbits() {
        let record = parse_element_set(None, ISS_L1, ISS_L2).unwrap();
        let state = Propagator::new(&record)
            .unwrap()
            .propagate_at(record.epoch, &KeplerSettings::default())
            .unwrap();
        let v = teme_velocity_to_ecef(state.position, state.velocity, gmst(state.time));
        let speed = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
        assert!(speed < state.speed());
        assert!(speed > 7.0);
    }
}
