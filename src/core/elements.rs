use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::orbit::brouwer_mean_motion;

/// Orbital period at or above which the deep-space branch is used.
pub const DEEP_SPACE_PERIOD_MINUTES: f64 = 225.0;

const MINUTES_PER_DAY: f64 = 1440.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrbitClass {
    NearEarth,
    DeepSpace,
}

impl OrbitClass {
    /// Classifies an orbit from its un-Kozai'd mean motion in rad/min.
    pub fn from_mean_motion(brouwer_rad_per_min: f64) -> Self {
        if std::f64::consts::TAU / brouwer_rad_per_min >= DEEP_SPACE_PERIOD_MINUTES {
            OrbitClass::DeepSpace
        } else {
            OrbitClass::NearEarth
        }
    }

    pub fn is_deep_space(self) -> bool {
        matches!(self, OrbitClass::DeepSpace)
    }
}

/// One parsed element set. Angles are in degrees, mean motion in rev/day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementRecord {
    pub norad_id: u32,
    pub name: String,
    pub classification: char,
    pub international_designator: String,
    pub epoch: DateTime<Utc>,
    /// First derivative of mean motion divided by two, rev/day².
    pub mean_motion_dot: f64,
    /// Second derivative of mean motion divided by six, rev/day³.
    pub mean_motion_ddot: f64,
    /// B* drag term, inverse earth radii.
    pub drag_term: f64,
    pub ephemeris_type: u8,
    pub element_set_number: u32,
    pub inclination: f64,
    pub right_ascension: f64,
    pub eccentricity: f64,
    pub argument_of_perigee: f64,
    pub mean_anomaly: f64,
    pub mean_motion: f64,
    pub revolution_number: u32,
    pub orbit_class: OrbitClass,
    pub line1: String,
    pub line2: String,
}

impl ElementRecord {
    /// Kozai mean motion converted to rad/min.
    pub fn kozai_mean_motion(&self) -> f64 {
        self.mean_motion * std::f64::consts::TAU / MINUTES_PER_DAY
    }

    /// Nominal orbital period from the published mean motion.
    pub fn orbital_period(&self) -> Duration {
        if self.mean_motion <= 0.0 || !self.mean_motion.is_finite() {
            return Duration::zero();
        }
        Duration::milliseconds((86_400_000.0 / self.mean_motion).round() as i64)
    }

    /// Minutes elapsed from the element epoch to `time` (negative before epoch).
    pub fn minutes_since_epoch(&self, time: DateTime<Utc>) -> f64 {
        let delta = time - self.epoch;
        match delta.num_nanoseconds() {
            Some(ns) => ns as f64 / 60e9,
            None => delta.num_milliseconds() as f64 / 60e3,
        }
    }

    /// Recomputes the period classification from the orbital elements.
    pub fn classify(
        mean_motion_rev_day: f64,
        eccentricity: f64,
        inclination_deg: f64,
    ) -> OrbitClass {
        let kozai = mean_motion_rev_day * std::f64::consts::TAU / MINUTES_PER_DAY;
        let brouwer = brouwer_mean_motion(kozai, eccentricity, inclination_deg.to_radians());
        OrbitClass::from_mean_motion(brouwer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_threshold() {
        assert_eq!(ElementRecord::classify(15.72125391, 0.0006703, 51.6416), OrbitClass::NearEarth);
        assert_eq!(ElementRecord::classify(10.82419157, 0.1859667, 34.2682), OrbitClass::NearEarth);
        assert_eq!(ElementRecord::classify(2.00491383, 0.6877146, 64.1586), OrbitClass::DeepSpace);
        assert_eq!(ElementRecord::classify(1.00271173, 0.0001, 0.05), OrbitClass::DeepSpace);
        // 6.4 rev/day is exactly 225 minutes before the Brouwer correction.
        assert_eq!(ElementRecord::classify(6.0, 0.001, 45.0), OrbitClass::DeepSpace);
        assert_eq!(ElementRecord::classify(6.6, 0.001, 45.0), OrbitClass::NearEarth);
    }
}
