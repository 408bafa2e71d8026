//! Sun direction estimate from the eight photo resistors.
//!
//! Sensor index layout around the body:
//!
//! | index | face | side  |
//! |-------|------|-------|
//! | 0     | Y-   | right |
//! | 1     | Y-   | left  |
//! | 2     | Y+   | left  |
//! | 3     | X+   | left  |
//! | 4     | X+   | right |
//! | 5     | X-   | left  |
//! | 6     | X-   | right |
//! | 7     | Y+   | right |

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::trace;

use crate::{interfaces::LIGHT_SENSOR_COUNT, units::Angle};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
pub struct Calibration {
    pub min: u16,
    pub max: u16,
}

impl Calibration {
    pub const fn nominal() -> Self {
        Calibration { min: 100, max: 65000 }
    }

    /// Raw ADC counts to 0..=100
    pub fn normalize(&self, raw: u16) -> u8 {
        if raw <= self.min {
            0
        } else if raw >= self.max {
            100
        } else {
            let span = u32::from(self.max - self.min);
            ((u32::from(raw - self.min) * 100) / span) as u8
        }
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::nominal()
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub enum Quadrant {
    FrontRight,
    FrontLeft,
    BackRight,
    BackLeft,
}

impl Quadrant {
    pub fn label(self) -> &'static str {
        match self {
            Quadrant::FrontRight => "FR",
            Quadrant::FrontLeft => "FL",
            Quadrant::BackRight => "BR",
            Quadrant::BackLeft => "BL",
        }
    }

    fn sensor_pair(self) -> (usize, usize) {
        match self {
            Quadrant::FrontRight => (4, 1),
            Quadrant::FrontLeft => (3, 7),
            Quadrant::BackRight => (5, 0),
            Quadrant::BackLeft => (6, 2),
        }
    }

    /// Rotation direction for a positive in-quadrant error
    fn positive_action(self) -> i8 {
        match self {
            Quadrant::FrontRight | Quadrant::BackLeft => -1,
            Quadrant::FrontLeft | Quadrant::BackRight => 1,
        }
    }
}

impl fmt::Display for Quadrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct SolarTrackerConfig {
    pub calibration: [Calibration; LIGHT_SENSOR_COUNT],
    pub hysteresis: i32,
}

impl SolarTrackerConfig {
    pub fn nominal() -> Self {
        Self {
            calibration: [Calibration::nominal(); LIGHT_SENSOR_COUNT],
            hysteresis: 3,
        }
    }

    pub fn with_calibration(mut self, index: usize, calibration: Calibration) -> Self {
        if let Some(c) = self.calibration.get_mut(index) {
            *c = calibration;
        }
        self
    }
}

impl Default for SolarTrackerConfig {
    fn default() -> Self {
        Self::nominal()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SolarTrackerState {
    pub normalized: [u8; LIGHT_SENSOR_COUNT],
    /// Sun direction in [0, 360)
    pub angle: Angle,
    /// (front - back, left - right)
    pub vector: (i32, i32),
    /// right - left, fed to the detumbling controller
    pub light_differential: i32,
    pub quadrant: Option<Quadrant>,
    pub quadrant_error: i32,
    /// -1, 0 or +1
    pub action: i8,
}

impl SolarTrackerState {
    pub fn quadrant_label(&self) -> &'static str {
        self.quadrant.map(Quadrant::label).unwrap_or("--")
    }
}

#[derive(Debug, Default)]
pub struct SolarTracker {
    config: SolarTrackerConfig,
    state: SolarTrackerState,
}

impl SolarTracker {
    pub const COMPONENT_NAME: &'static str = "solar_tracker";

    pub fn new(config: SolarTrackerConfig) -> Self {
        Self {
            config,
            state: Default::default(),
        }
    }

    pub fn process(&mut self, raw: &[u16; LIGHT_SENSOR_COUNT]) -> &SolarTrackerState {
        self.state = process_with_hysteresis(raw, &self.config.calibration, self.config.hysteresis);
        trace!(
            angle = ?self.state.angle,
            quadrant = self.state.quadrant_label(),
            action = self.state.action,
            "Solar tracker"
        );
        &self.state
    }

    pub fn state(&self) -> &SolarTrackerState {
        &self.state
    }

    pub fn reset(&mut self) {
        self.state = Default::default();
    }
}

pub fn process(
    raw: &[u16; LIGHT_SENSOR_COUNT],
    calibration: &[Calibration; LIGHT_SENSOR_COUNT],
) -> SolarTrackerState {
    process_with_hysteresis(raw, calibration, SolarTrackerConfig::nominal().hysteresis)
}

fn process_with_hysteresis(
    raw: &[u16; LIGHT_SENSOR_COUNT],
    calibration: &[Calibration; LIGHT_SENSOR_COUNT],
    hysteresis: i32,
) -> SolarTrackerState {
    let mut normalized = [0u8; LIGHT_SENSOR_COUNT];
    for ((n, r), c) in normalized.iter_mut().zip(raw).zip(calibration) {
        *n = c.normalize(*r);
    }
    let n = normalized.map(i32::from);

    let front = n[3] + n[4];
    let back = n[5] + n[6];
    let right = n[0] + n[1];
    let left = n[2] + n[7];
    let vector = (front - back, left - right);

    let angle = Angle::from_radians(f64::from(vector.1).atan2(f64::from(vector.0))).normalized();

    let quadrant = brightest_quadrant(&n);
    let (a, b) = quadrant.sensor_pair();
    let quadrant_error = n[a] - n[b];
    let action = if quadrant_error > hysteresis {
        quadrant.positive_action()
    } else if quadrant_error < -hysteresis {
        -quadrant.positive_action()
    } else {
        0
    };

    SolarTrackerState {
        normalized,
        angle,
        vector,
        light_differential: right - left,
        quadrant: Some(quadrant),
        quadrant_error,
        action,
    }
}

/// Ties go to the earliest quadrant in FR, FL, BR, BL order
fn brightest_quadrant(n: &[i32; LIGHT_SENSOR_COUNT]) -> Quadrant {
    let mut best = Quadrant::FrontRight;
    let mut best_sum = i32::MIN;
    for q in [
        Quadrant::FrontRight,
        Quadrant::FrontLeft,
        Quadrant::BackRight,
        Quadrant::BackLeft,
    ] {
        let (a, b) = q.sensor_pair();
        let sum = n[a] + n[b];
        if sum > best_sum {
            best = q;
            best_sum = sum;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const CAL: [Calibration; LIGHT_SENSOR_COUNT] = [Calibration::nominal(); LIGHT_SENSOR_COUNT];

    #[test]
    fn normalization_bounds() {
        let c = Calibration::nominal();
        assert_eq!(c.normalize(0), 0);
        assert_eq!(c.normalize(100), 0);
        assert_eq!(c.normalize(65000), 100);
        assert_eq!(c.normalize(u16::MAX), 100);
        assert_eq!(c.normalize(32550), 50);

        let mut last = 0;
        for raw in (100..65000).step_by(997) {
            let v = c.normalize(raw);
            assert!(v >= last);
            assert!(v <= 100);
            last = v;
        }
    }

    #[test]
    fn equal_light_points_forward() {
        let s = process(&[30000; 8], &CAL);
        assert_eq!(s.vector, (0, 0));
        assert_relative_eq!(s.angle.as_degrees(), 0.0);
        assert_eq!(s.light_differential, 0);
        // First quadrant wins ties
        assert_eq!(s.quadrant, Some(Quadrant::FrontRight));
        assert_eq!(s.action, 0);
    }

    #[test]
    fn sun_on_the_left() {
        let mut raw = [100; 8];
        raw[2] = 65000;
        raw[7] = 65000;
        let s = process(&raw, &CAL);
        assert_eq!(s.vector, (0, 200));
        assert_relative_eq!(s.angle.as_degrees(), 90.0);
        assert_eq!(s.light_differential, -200);
    }

    #[test]
    fn negative_angles_wrap() {
        let mut raw = [100; 8];
        raw[0] = 65000;
        let s = process(&raw, &CAL);
        assert_eq!(s.vector, (0, -100));
        assert_relative_eq!(s.angle.as_degrees(), 270.0);
        assert!(s.angle.as_degrees() < 360.0);
    }

    #[test]
    fn quadrant_action_and_hysteresis() {
        let cal = [Calibration { min: 0, max: 100 }; LIGHT_SENSOR_COUNT];

        // FR wins, n4 - n1 = +10
        let s = process(&[0, 40, 0, 0, 50, 0, 0, 0], &cal);
        assert_eq!(s.quadrant, Some(Quadrant::FrontRight));
        assert_eq!(s.quadrant_error, 10);
        assert_eq!(s.action, -1);

        // BR wins, n5 - n0 = -20
        let s = process(&[60, 0, 0, 0, 0, 40, 0, 0], &cal);
        assert_eq!(s.quadrant_label(), "BR");
        assert_eq!(s.action, -1);

        // FL wins, within hysteresis
        let s = process(&[0, 0, 0, 50, 0, 0, 0, 47], &cal);
        assert_eq!(s.quadrant, Some(Quadrant::FrontLeft));
        assert_eq!(s.action, 0);

        // BL wins, n6 - n2 = +4
        let s = process(&[0, 0, 40, 0, 0, 0, 44, 0], &cal);
        assert_eq!(s.quadrant, Some(Quadrant::BackLeft));
        assert_eq!(s.action, -1);
    }

    #[test]
    fn tracker_keeps_last_state() {
        let mut t = SolarTracker::new(SolarTrackerConfig::nominal());
        assert_eq!(t.state().quadrant_label(), "--");
        t.process(&[30000; 8]);
        assert_eq!(t.state().quadrant_label(), "FR");
        t.reset();
        assert_eq!(t.state().quadrant_label(), "--");
    }
}
