//! Rate damping on the change in light differential between cycles.

use serde::Serialize;

use super::solar_tracker::SolarTrackerState;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DetumbleConfig {
    pub kd: f64,
    pub dead_zone: f64,
    pub max_torque: f64,
}

impl DetumbleConfig {
    pub fn nominal() -> Self {
        Self {
            kd: 2.0,
            dead_zone: 1.0,
            max_torque: 100.0,
        }
    }
}

impl Default for DetumbleConfig {
    fn default() -> Self {
        Self::nominal()
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Detumble {
    #[serde(skip)]
    config: DetumbleConfig,
    previous: f64,
    rate: f64,
    torque: f64,
    stable: bool,
}

impl Detumble {
    pub const COMPONENT_NAME: &'static str = "detumble";

    pub fn new(config: DetumbleConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Returns the commanded torque, within +/- `max_torque`
    pub fn process(&mut self, current: f64) -> f64 {
        self.rate = current - self.previous;
        self.previous = current;

        if self.rate.abs() < self.config.dead_zone {
            self.torque = 0.0;
            self.stable = true;
        } else {
            self.torque = (-self.config.kd * self.rate)
                .clamp(-self.config.max_torque, self.config.max_torque);
            self.stable = false;
        }
        self.torque
    }

    pub fn process_tracker(&mut self, tracker: &SolarTrackerState) -> f64 {
        self.process(f64::from(tracker.light_differential))
    }

    pub fn reset(&mut self) {
        self.previous = 0.0;
        self.rate = 0.0;
        self.torque = 0.0;
        self.stable = false;
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn torque(&self) -> f64 {
        self.torque
    }

    pub fn is_stable(&self) -> bool {
        self.stable
    }
}
