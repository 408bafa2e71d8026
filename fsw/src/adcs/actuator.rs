//! Reaction wheel commanding, gated on the operating mode.

use cdh_types::prelude::{ImuSample, OperatingMode};
use serde::Serialize;
use std::fmt::Write;
use tracing::{debug, info, warn};

use super::pid::{Pid, PidConfig};
use crate::interfaces::{MotorDriver, RateSensor};

pub const SELECT_MOTOR_COMMAND: &str = "MC1\n";
pub const STOP_COMMAND: &str = "M0\n";

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ActuatorConfig {
    pub pid: PidConfig,
    /// Speeds with magnitude at or below this are sent as zero
    pub dead_zone: i16,
    pub max_speed: i16,
    /// PID output to wheel speed, in ADCS mode
    pub adcs_gain: f64,
    /// Body rate to wheel speed, in detumbling mode
    pub detumble_gain: f64,
    pub detumble_max_speed: i16,
    /// Rad/s below which detumbling is considered done
    pub detumble_stop_threshold: f64,
}

impl ActuatorConfig {
    pub fn nominal() -> Self {
        Self {
            pid: PidConfig::nominal(),
            dead_zone: 10,
            max_speed: 127,
            adcs_gain: 10.0,
            detumble_gain: 5.0,
            detumble_max_speed: 50,
            detumble_stop_threshold: 0.5,
        }
    }

    pub fn with_pid(mut self, pid: PidConfig) -> Self {
        self.pid = pid;
        self
    }
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self::nominal()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct ActuationCoordinator {
    #[serde(skip)]
    config: ActuatorConfig,
    pid: Pid,
    initialized: bool,
    motor_active: bool,
    target_speed: i16,
    current_speed: i16,
    sensors: ImuSample,
}

impl ActuationCoordinator {
    pub const COMPONENT_NAME: &'static str = "actuator";

    pub fn new(config: ActuatorConfig) -> Self {
        Self {
            pid: Pid::new(config.pid),
            config,
            ..Default::default()
        }
    }

    /// One control cycle. The first call only selects the motor.
    pub fn step(
        &mut self,
        mode: OperatingMode,
        rate_sensor: &mut dyn RateSensor,
        motor: &mut dyn MotorDriver,
    ) {
        if !self.initialized {
            self.pid.reset();
            send(motor, SELECT_MOTOR_COMMAND);
            self.initialized = true;
            debug!(component = Self::COMPONENT_NAME, "Motor selected");
            return;
        }

        if !mode.is_attitude_control() {
            if self.motor_active {
                self.stop(motor);
            }
            return;
        }

        match rate_sensor.read() {
            Ok(sample) => self.sensors = sample,
            Err(e) => warn!(err = %e, "Rate sensor read failed, keeping last sample"),
        }
        let rate = self.sensors.yaw_rate();

        match mode {
            OperatingMode::Adcs => {
                let output = self.pid.compute(rate);
                let speed = saturate(output * self.config.adcs_gain);
                self.set_speed(speed, motor);
            }
            OperatingMode::Detumbling => {
                if rate.abs() < self.config.detumble_stop_threshold {
                    if self.motor_active {
                        info!(rate, "Detumbling complete");
                    }
                    self.stop(motor);
                } else {
                    let limit = self.config.detumble_max_speed;
                    let speed = saturate(-rate * self.config.detumble_gain).clamp(-limit, limit);
                    self.set_speed(speed, motor);
                }
            }
            OperatingMode::Idle | OperatingMode::Nominal => (),
        }
    }

    pub fn set_speed(&mut self, speed: i16, motor: &mut dyn MotorDriver) {
        let speed = if i32::from(speed).abs() <= i32::from(self.config.dead_zone) {
            0
        } else {
            speed.clamp(-self.config.max_speed, self.config.max_speed)
        };

        self.target_speed = speed;
        self.current_speed = speed;
        self.motor_active = speed != 0;

        let mut cmd = heapless::String::<8>::new();
        if writeln!(cmd, "M{speed}").is_err() {
            // Can't happen for an i16, but don't send a truncated line
            warn!(speed, "Motor command overflow");
            return;
        }
        send(motor, &cmd);
    }

    pub fn stop(&mut self, motor: &mut dyn MotorDriver) {
        send(motor, STOP_COMMAND);
        self.target_speed = 0;
        self.current_speed = 0;
        self.motor_active = false;
    }

    /// Forget the motor selection so the next step starts over
    pub fn reset(&mut self) {
        *self = Self::new(self.config);
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn is_motor_active(&self) -> bool {
        self.motor_active
    }

    pub fn target_speed(&self) -> i16 {
        self.target_speed
    }

    pub fn current_speed(&self) -> i16 {
        self.current_speed
    }

    /// Last good rate sensor sample
    pub fn sensors(&self) -> &ImuSample {
        &self.sensors
    }
}

fn send(motor: &mut dyn MotorDriver, cmd: &str) {
    if let Err(e) = motor.send_command(cmd) {
        warn!(err = %e, cmd = cmd.trim_end(), "Motor command failed");
    }
}

/// Truncate toward zero and saturate into an i16
fn saturate(value: f64) -> i16 {
    // `as` saturates float to int casts, NaN becomes 0
    value.trunc() as i16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interfaces::{MotorError, SensorError};
    use na::Vector3;

    struct Gyro(Result<f64, SensorError>);

    impl RateSensor for Gyro {
        fn read(&mut self) -> Result<ImuSample, SensorError> {
            self.0
                .map(|z| ImuSample::new(Vector3::new(0.0, 0.0, z), Vector3::zeros()))
        }
    }

    struct BrokenMotor;

    impl MotorDriver for BrokenMotor {
        fn send_command(&mut self, _cmd: &str) -> Result<(), MotorError> {
            Err(MotorError::WriteFailed)
        }
    }

    fn initialized() -> (ActuationCoordinator, Vec<String>) {
        let mut act = ActuationCoordinator::new(ActuatorConfig::nominal());
        let mut motor: Vec<String> = Vec::new();
        act.step(OperatingMode::Idle, &mut Gyro(Ok(0.0)), &mut motor);
        assert!(act.is_initialized());
        assert_eq!(motor, vec![SELECT_MOTOR_COMMAND.to_owned()]);
        motor.clear();
        (act, motor)
    }

    #[test]
    fn first_step_only_selects() {
        let mut act = ActuationCoordinator::new(ActuatorConfig::nominal());
        let mut motor: Vec<String> = Vec::new();
        act.step(OperatingMode::Adcs, &mut Gyro(Ok(3.0)), &mut motor);
        assert_eq!(motor, vec!["MC1\n".to_owned()]);
        assert_eq!(act.current_speed(), 0);
    }

    #[test]
    fn dead_zone_and_clamp() {
        let (mut act, mut motor) = initialized();
        act.set_speed(10, &mut motor);
        assert_eq!(act.current_speed(), 0);
        assert!(!act.is_motor_active());
        act.set_speed(-11, &mut motor);
        assert_eq!(act.current_speed(), -11);
        act.set_speed(500, &mut motor);
        assert_eq!(act.current_speed(), 127);
        act.set_speed(i16::MIN, &mut motor);
        assert_eq!(act.target_speed(), -127);
        assert_eq!(motor, vec!["M0\n", "M-11\n", "M127\n", "M-127\n"]);
    }

    #[test]
    fn adcs_mode_runs_pid() {
        let (mut act, mut motor) = initialized();
        // PID output -2.3 for a rate of 2, times 10
        act.step(OperatingMode::Adcs, &mut Gyro(Ok(2.0)), &mut motor);
        assert_eq!(act.current_speed(), -23);
        assert_eq!(motor, vec!["M-23\n"]);
    }

    #[test]
    fn detumbling_speed_and_stop() {
        let (mut act, mut motor) = initialized();
        act.step(OperatingMode::Detumbling, &mut Gyro(Ok(4.0)), &mut motor);
        assert_eq!(act.current_speed(), -20);

        act.step(OperatingMode::Detumbling, &mut Gyro(Ok(-30.0)), &mut motor);
        assert_eq!(act.current_speed(), 50);

        act.step(OperatingMode::Detumbling, &mut Gyro(Ok(0.2)), &mut motor);
        assert_eq!(act.current_speed(), 0);
        assert!(!act.is_motor_active());
        assert_eq!(motor, vec!["M-20\n", "M50\n", "M0\n"]);
    }

    #[test]
    fn leaving_attitude_modes_stops_once() {
        let (mut act, mut motor) = initialized();
        act.step(OperatingMode::Detumbling, &mut Gyro(Ok(4.0)), &mut motor);
        act.step(OperatingMode::Nominal, &mut Gyro(Ok(4.0)), &mut motor);
        act.step(OperatingMode::Idle, &mut Gyro(Ok(4.0)), &mut motor);
        assert_eq!(motor, vec!["M-20\n", "M0\n"]);
    }

    #[test]
    fn sensor_failure_keeps_last_sample() {
        let (mut act, mut motor) = initialized();
        act.step(OperatingMode::Detumbling, &mut Gyro(Ok(4.0)), &mut motor);
        act.step(
            OperatingMode::Detumbling,
            &mut Gyro(Err(SensorError::ReadFailed)),
            &mut motor,
        );
        assert_eq!(act.sensors().yaw_rate(), 4.0);
        assert_eq!(motor, vec!["M-20\n", "M-20\n"]);
    }

    #[test]
    fn motor_failure_still_tracks_command() {
        let (mut act, _) = initialized();
        act.step(OperatingMode::Detumbling, &mut Gyro(Ok(4.0)), &mut BrokenMotor);
        assert_eq!(act.current_speed(), -20);
        assert!(act.is_motor_active());
    }
}
