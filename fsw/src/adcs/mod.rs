pub mod actuator;
pub mod detumble;
pub mod pid;
pub mod solar_tracker;

pub use actuator::{ActuationCoordinator, ActuatorConfig};
pub use detumble::{Detumble, DetumbleConfig};
pub use pid::{Pid, PidConfig};
pub use solar_tracker::{Calibration, Quadrant, SolarTracker, SolarTrackerConfig, SolarTrackerState};

use cdh_types::prelude::OperatingMode;
use serde::Serialize;
use tracing::warn;

use crate::interfaces::{LightSensors, MotorDriver, RateSensor, LIGHT_SENSOR_COUNT};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AdcsConfig {
    pub solar_tracker: SolarTrackerConfig,
    pub detumble: DetumbleConfig,
    pub actuator: ActuatorConfig,
}

impl AdcsConfig {
    pub fn nominal() -> Self {
        Self {
            solar_tracker: SolarTrackerConfig::nominal(),
            detumble: DetumbleConfig::nominal(),
            actuator: ActuatorConfig::nominal(),
        }
    }
}

/// Attitude determination and control. Sun sensing and detumbling
/// estimates only run in the attitude control modes; the actuator runs
/// every cycle so it can stop the wheel on the way out of them.
#[derive(Debug, Default)]
pub struct Adcs {
    light: [u16; LIGHT_SENSOR_COUNT],
    tracker: SolarTracker,
    detumble: Detumble,
    actuator: ActuationCoordinator,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdcsStatus {
    pub sun_angle_degrees: f64,
    pub quadrant: &'static str,
    pub light_differential: i32,
    pub detumble_torque: f64,
    pub detumble_stable: bool,
    pub yaw_rate: f64,
    pub wheel_speed: i16,
    pub wheel_active: bool,
}

impl Adcs {
    pub const COMPONENT_NAME: &'static str = "adcs";

    pub fn new(config: AdcsConfig) -> Self {
        Self {
            light: [0; LIGHT_SENSOR_COUNT],
            tracker: SolarTracker::new(config.solar_tracker),
            detumble: Detumble::new(config.detumble),
            actuator: ActuationCoordinator::new(config.actuator),
        }
    }

    pub fn step(
        &mut self,
        mode: OperatingMode,
        light: &mut dyn LightSensors,
        rate_sensor: &mut dyn RateSensor,
        motor: &mut dyn MotorDriver,
    ) {
        if self.actuator.is_initialized() && mode.is_attitude_control() {
            match light.read() {
                Ok(raw) => self.light = raw,
                Err(e) => warn!(err = %e, "Light sensor read failed, keeping last readings"),
            }
            let state = self.tracker.process(&self.light);
            if mode == OperatingMode::Detumbling {
                self.detumble.process_tracker(state);
            }
        }

        self.actuator.step(mode, rate_sensor, motor);
    }

    pub fn reset(&mut self) {
        self.light = [0; LIGHT_SENSOR_COUNT];
        self.tracker.reset();
        self.detumble.reset();
        self.actuator.reset();
    }

    pub fn tracker(&self) -> &SolarTracker {
        &self.tracker
    }

    pub fn detumble(&self) -> &Detumble {
        &self.detumble
    }

    pub fn actuator(&self) -> &ActuationCoordinator {
        &self.actuator
    }

    pub fn status(&self) -> AdcsStatus {
        let tracker = self.tracker.state();
        AdcsStatus {
            sun_angle_degrees: tracker.angle.as_degrees(),
            quadrant: tracker.quadrant_label(),
            light_differential: tracker.light_differential,
            detumble_torque: self.detumble.torque(),
            detumble_stable: self.detumble.is_stable(),
            yaw_rate: self.actuator.sensors().yaw_rate(),
            wheel_speed: self.actuator.current_speed(),
            wheel_active: self.actuator.is_motor_active(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::SensorError;
    use cdh_types::prelude::ImuSample;
    use na::Vector3;

    struct Lights(Result<[u16; LIGHT_SENSOR_COUNT], SensorError>);

    impl LightSensors for Lights {
        fn read(&mut self) -> Result<[u16; LIGHT_SENSOR_COUNT], SensorError> {
            self.0
        }
    }

    struct Spin(f64);

    impl RateSensor for Spin {
        fn read(&mut self) -> Result<ImuSample, SensorError> {
            Ok(ImuSample::new(Vector3::new(0.0, 0.0, self.0), Vector3::zeros()))
        }
    }

    #[test]
    fn idle_leaves_estimates_alone() {
        let mut adcs = Adcs::new(AdcsConfig::nominal());
        let mut motor: Vec<String> = Vec::new();
        for _ in 0..3 {
            adcs.step(
                OperatingMode::Idle,
                &mut Lights(Ok([65000; 8])),
                &mut Spin(2.0),
                &mut motor,
            );
        }
        assert_eq!(adcs.status().quadrant, "--");
        assert_eq!(motor, vec!["MC1\n"]);
    }

    #[test]
    fn detumbling_tracks_light_and_rate() {
        let mut adcs = Adcs::new(AdcsConfig::nominal());
        let mut motor: Vec<String> = Vec::new();
        let mut raw = [100; 8];
        raw[0] = 65000;

        // Motor selection cycle
        adcs.step(OperatingMode::Detumbling, &mut Lights(Ok(raw)), &mut Spin(2.0), &mut motor);
        adcs.step(OperatingMode::Detumbling, &mut Lights(Ok(raw)), &mut Spin(2.0), &mut motor);

        let status = adcs.status();
        assert_eq!(status.light_differential, 100);
        assert_eq!(status.detumble_torque, -100.0);
        assert!(!status.detumble_stable);
        // -10 falls in the wheel dead zone
        assert_eq!(status.wheel_speed, 0);
        assert_eq!(motor, vec!["MC1\n", "M0\n"]);

        // Stale light readings, no change, so stable
        adcs.step(
            OperatingMode::Detumbling,
            &mut Lights(Err(SensorError::ReadFailed)),
            &mut Spin(20.0),
            &mut motor,
        );
        let status = adcs.status();
        assert!(status.detumble_stable);
        assert_eq!(status.wheel_speed, -50);
        assert!(status.wheel_active);
    }
}
