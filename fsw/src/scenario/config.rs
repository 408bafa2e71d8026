use crate::{
    adcs::{self, Calibration},
    interfaces::LIGHT_SENSOR_COUNT,
    payload,
};
use cdh_protocol::{BusDatagram, BusId, DatagramError, FrameTimeouts, ModeCommand, DATAGRAM_LEN};
use cdh_types::prelude::{AIS_SEED_LEN, CELL_COUNT};
use serde::Deserialize;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}'", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file")]
    Parse(#[from] toml::de::Error),
    #[error("Light sensor calibration index {0} is out of range")]
    CalibrationIndex(usize),
    #[error("Duplicate light sensor calibration entry for index {0}")]
    DuplicateCalibration(usize),
    #[error("Light sensor calibration {index} has min {min} not below max {max}")]
    CalibrationRange { index: usize, min: u16, max: u16 },
    #[error("Wheel dead zone {dead_zone} must be below the max speed {max_speed}")]
    DeadZone { dead_zone: i16, max_speed: i16 },
    #[error("Wheel max speed {0} must be positive")]
    MaxSpeed(i16),
    #[error("Detumbling max speed {0} must be positive")]
    DetumbleMaxSpeed(i16),
    #[error("Detumbling max torque {0} must be a non-negative number")]
    MaxTorque(f64),
    #[error("PID integral limit {0} must be a non-negative number")]
    IntegralLimit(f64),
    #[error(transparent)]
    BusId(#[from] DatagramError),
    #[error("Command {index} has an unknown mode '{mode}'")]
    UnknownMode { index: usize, mode: String },
    #[error("Command {index} needs either a mode or an id")]
    CommandShape { index: usize },
    #[error("Command {index} carries {len} bytes, at most {max} are allowed")]
    DataLength { index: usize, len: usize, max: usize },
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Config {
    pub name: Option<String>,
    pub cycles: Option<u64>,
    pub cycle_period_ms: Option<u64>,
    pub seed: Option<u64>,
    pub adcs: Option<Adcs>,
    pub pid: Option<Pid>,
    pub detumble: Option<Detumble>,
    pub mission: Option<Mission>,
    pub link: Option<Link>,
    #[serde(alias = "light-sensor-calibration")]
    pub light_sensor_calibrations: Vec<LightSensorCalibration>,
    #[serde(alias = "command")]
    pub commands: Vec<Command>,
    #[serde(alias = "eps")]
    pub eps_reports: Vec<EpsReport>,
    pub payload: Option<Payload>,
    pub imu: Option<Imu>,
    pub light: Option<Light>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_str_checked(&content)
    }

    pub fn from_str_checked(s: &str) -> Result<Self, ConfigError> {
        let cfg: Config = toml::from_str(s)?;

        let mut indices = HashSet::new();
        for cal in cfg.light_sensor_calibrations.iter() {
            if cal.index >= LIGHT_SENSOR_COUNT {
                return Err(ConfigError::CalibrationIndex(cal.index));
            }
            if !indices.insert(cal.index) {
                return Err(ConfigError::DuplicateCalibration(cal.index));
            }
            if cal.min >= cal.max {
                return Err(ConfigError::CalibrationRange {
                    index: cal.index,
                    min: cal.min,
                    max: cal.max,
                });
            }
        }

        let actuator = cfg.actuator_config();
        if actuator.max_speed <= 0 {
            return Err(ConfigError::MaxSpeed(actuator.max_speed));
        }
        if actuator.detumble_max_speed <= 0 {
            return Err(ConfigError::DetumbleMaxSpeed(actuator.detumble_max_speed));
        }
        // Written so NaN fails too
        if !(actuator.pid.integral_limit >= 0.0) {
            return Err(ConfigError::IntegralLimit(actuator.pid.integral_limit));
        }
        let max_torque = cfg.detumble_config().max_torque;
        if !(max_torque >= 0.0) {
            return Err(ConfigError::MaxTorque(max_torque));
        }
        if actuator.dead_zone >= actuator.max_speed {
            return Err(ConfigError::DeadZone {
                dead_zone: actuator.dead_zone,
                max_speed: actuator.max_speed,
            });
        }

        for (index, cmd) in cfg.commands.iter().enumerate() {
            cmd.datagram(index)?;
        }

        Ok(cfg)
    }

    pub fn solar_tracker_config(&self) -> adcs::SolarTrackerConfig {
        let mut c = adcs::SolarTrackerConfig::nominal();
        if let Some(h) = self.adcs.as_ref().and_then(|a| a.hysteresis) {
            c.hysteresis = h;
        }
        for cal in self.light_sensor_calibrations.iter() {
            c = c.with_calibration(
                cal.index,
                Calibration {
                    min: cal.min,
                    max: cal.max,
                },
            );
        }
        c
    }

    pub fn pid_config(&self) -> adcs::PidConfig {
        let mut c = adcs::PidConfig::nominal();
        if let Some(p) = self.pid.as_ref() {
            c.kp = p.kp.unwrap_or(c.kp);
            c.ki = p.ki.unwrap_or(c.ki);
            c.kd = p.kd.unwrap_or(c.kd);
            c.setpoint = p.setpoint.unwrap_or(c.setpoint);
            c.integral_limit = p.integral_limit.unwrap_or(c.integral_limit);
        }
        c
    }

    pub fn detumble_config(&self) -> adcs::DetumbleConfig {
        let mut c = adcs::DetumbleConfig::nominal();
        if let Some(d) = self.detumble.as_ref() {
            c.kd = d.kd.unwrap_or(c.kd);
            c.dead_zone = d.dead_zone.unwrap_or(c.dead_zone);
            c.max_torque = d.max_torque.unwrap_or(c.max_torque);
        }
        c
    }

    pub fn actuator_config(&self) -> adcs::ActuatorConfig {
        let mut c = adcs::ActuatorConfig::nominal().with_pid(self.pid_config());
        if let Some(a) = self.adcs.as_ref() {
            c.dead_zone = a.dead_zone.unwrap_or(c.dead_zone);
            c.max_speed = a.max_speed.unwrap_or(c.max_speed);
            c.adcs_gain = a.adcs_gain.unwrap_or(c.adcs_gain);
            c.detumble_gain = a.detumble_gain.unwrap_or(c.detumble_gain);
            c.detumble_max_speed = a.detumble_max_speed.unwrap_or(c.detumble_max_speed);
            c.detumble_stop_threshold = a
                .detumble_stop_threshold
                .unwrap_or(c.detumble_stop_threshold);
        }
        c
    }

    pub fn adcs_config(&self) -> adcs::AdcsConfig {
        adcs::AdcsConfig {
            solar_tracker: self.solar_tracker_config(),
            detumble: self.detumble_config(),
            actuator: self.actuator_config(),
        }
    }

    pub fn mission_config(&self) -> payload::MissionConfig {
        let mut c = payload::MissionConfig::nominal();
        if let Some(ms) = self.mission.as_ref().and_then(|m| m.inter_packet_delay_ms) {
            c.inter_packet_delay = Duration::from_millis(ms);
        }
        if let Some(l) = self.link.as_ref() {
            let nominal = FrameTimeouts::nominal();
            c = c.with_timeouts(FrameTimeouts {
                start: l
                    .start_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(nominal.start),
                byte: l
                    .byte_timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(nominal.byte),
            });
        }
        c
    }
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Adcs {
    pub hysteresis: Option<i32>,
    pub dead_zone: Option<i16>,
    pub max_speed: Option<i16>,
    pub adcs_gain: Option<f64>,
    pub detumble_gain: Option<f64>,
    pub detumble_max_speed: Option<i16>,
    pub detumble_stop_threshold: Option<f64>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Pid {
    pub kp: Option<f64>,
    pub ki: Option<f64>,
    pub kd: Option<f64>,
    pub setpoint: Option<f64>,
    pub integral_limit: Option<f64>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Detumble {
    pub kd: Option<f64>,
    pub dead_zone: Option<f64>,
    pub max_torque: Option<f64>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Mission {
    pub inter_packet_delay_ms: Option<u64>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Link {
    pub start_timeout_ms: Option<u64>,
    pub byte_timeout_ms: Option<u64>,
}

#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LightSensorCalibration {
    pub index: usize,
    pub min: u16,
    pub max: u16,
}

/// A datagram the COM board puts on the bus at a given cycle. Either a mode
/// change (`mode`, plus `mission` and `seed` for nominal) or a raw `id` and
/// `data`.
#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Command {
    pub at_cycle: u64,
    pub mode: Option<String>,
    pub mission: Option<u8>,
    pub seed: Option<Vec<u8>>,
    pub id: Option<u16>,
    pub data: Option<Vec<u8>>,
}

impl Command {
    pub fn datagram(&self, index: usize) -> Result<BusDatagram, ConfigError> {
        if let Some(mode) = self.mode.as_deref() {
            let cmd = match mode.to_ascii_lowercase().as_str() {
                "idle" => ModeCommand::EnterIdle,
                "nominal" => {
                    let seed_bytes = self.seed.as_deref().unwrap_or_default();
                    if seed_bytes.len() > AIS_SEED_LEN {
                        return Err(ConfigError::DataLength {
                            index,
                            len: seed_bytes.len(),
                            max: AIS_SEED_LEN,
                        });
                    }
                    let mut seed = [0; AIS_SEED_LEN];
                    seed[..seed_bytes.len()].copy_from_slice(seed_bytes);
                    ModeCommand::EnterNominal {
                        mission: self.mission.unwrap_or(1),
                        seed,
                    }
                }
                "adcs" => ModeCommand::EnterAdcs,
                "detumbling" => ModeCommand::EnterDetumbling,
                "exit" => ModeCommand::Exit,
                _ => {
                    return Err(ConfigError::UnknownMode {
                        index,
                        mode: mode.to_owned(),
                    })
                }
            };
            return Ok(BusDatagram::mode_command(&cmd));
        }

        let id = self.id.ok_or(ConfigError::CommandShape { index })?;
        let bytes = self.data.as_deref().unwrap_or_default();
        if bytes.len() > DATAGRAM_LEN {
            return Err(ConfigError::DataLength {
                index,
                len: bytes.len(),
                max: DATAGRAM_LEN,
            });
        }
        let mut data = [0; DATAGRAM_LEN];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(BusDatagram::new(BusId::new(id)?, data))
    }
}

/// EPS telemetry broadcast at a given cycle
#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EpsReport {
    pub at_cycle: u64,
    pub cell_voltage: Option<[u16; CELL_COUNT]>,
    pub cell_depth_of_discharge: Option<[u16; CELL_COUNT]>,
    pub solar_voltage: Option<[u32; 2]>,
    pub solar_current: Option<[u32; 2]>,
}

impl EpsReport {
    pub fn datagrams(&self) -> Vec<BusDatagram> {
        let mut dgs = Vec::new();
        if self.cell_voltage.is_some() || self.cell_depth_of_discharge.is_some() {
            dgs.push(BusDatagram::eps_battery(
                self.cell_voltage.unwrap_or_default(),
                self.cell_depth_of_discharge.unwrap_or_default(),
            ));
        }
        if let Some([a, b]) = self.solar_voltage {
            dgs.push(BusDatagram::eps_solar_voltage(a, b));
        }
        if let Some([a, b]) = self.solar_current {
            dgs.push(BusDatagram::eps_solar_current(a, b));
        }
        dgs
    }
}

/// Behavior of the simulated payload computer
#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Payload {
    pub response_delay_polls: Option<u32>,
    pub ack: Option<bool>,
    pub fail: Option<bool>,
    pub oil_detected: Option<u8>,
    pub oil_area_percentage: Option<f32>,
    pub ship_mmsi: Option<u32>,
    pub ship_origin_lat: Option<f32>,
    pub ship_origin_lon: Option<f32>,
}

/// Simulated body spin and rate sensor
#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Imu {
    /// [rad/s]
    pub initial_yaw_rate: Option<f64>,
    /// Uniform noise amplitude [rad/s]
    pub noise: Option<f64>,
    /// Yaw acceleration per unit of wheel speed [rad/s^2]
    pub wheel_gain: Option<f64>,
    /// Every n-th read fails, 0 disables
    pub fail_every: Option<u64>,
}

#[derive(Clone, PartialEq, Debug, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Light {
    pub raw: Option<[u16; LIGHT_SENSOR_COUNT]>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use indoc::indoc;

    const FULL_CONFIG_TOML: &str = indoc! {r#"
        name = 'everything'
        cycles = 40
        cycle-period-ms = 0
        seed = 7

        [adcs]
        hysteresis = 5
        dead-zone = 12
        max-speed = 100
        detumble-stop-threshold = 0.25

        [pid]
        kp = 2.0
        integral-limit = 50.0

        [detumble]
        kd = 1.5

        [mission]
        inter-packet-delay-ms = 10

        [link]
        start-timeout-ms = 50

        [[light-sensor-calibration]]
        index = 3
        min = 200
        max = 60000

        [[command]]
        at-cycle = 1
        mode = 'nominal'
        mission = 2
        seed = [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11]

        [[command]]
        at-cycle = 4
        id = 0x320
        data = [1, 2, 3, 4, 5, 6, 7, 8]

        [[eps]]
        at-cycle = 2
        cell-voltage = [3700, 3650]
        cell-depth-of-discharge = [25, 30]
        solar-voltage = [5000, 5100]

        [payload]
        response-delay-polls = 2
        ack = true
        ship-mmsi = 123456789

        [imu]
        initial-yaw-rate = 3.0
        fail-every = 5

        [light]
        raw = [100, 200, 300, 400, 500, 600, 700, 800]
    "#};

    #[test]
    fn full_config() {
        let cfg = Config::from_str_checked(FULL_CONFIG_TOML).unwrap();
        assert_eq!(cfg.name.as_deref(), Some("everything"));
        assert_eq!(cfg.cycles, Some(40));
        assert_eq!(cfg.commands.len(), 2);
        assert_eq!(cfg.eps_reports.len(), 1);
        assert_eq!(cfg.light_sensor_calibrations.len(), 1);

        let tracker = cfg.solar_tracker_config();
        assert_eq!(tracker.hysteresis, 5);
        assert_eq!(tracker.calibration[3], Calibration { min: 200, max: 60000 });
        assert_eq!(tracker.calibration[0], Calibration::nominal());

        let act = cfg.actuator_config();
        assert_eq!(act.dead_zone, 12);
        assert_eq!(act.max_speed, 100);
        assert_eq!(act.detumble_max_speed, 50);
        assert_relative_eq!(act.detumble_stop_threshold, 0.25);
        assert_relative_eq!(act.pid.kp, 2.0);
        assert_relative_eq!(act.pid.ki, 0.1);
        assert_relative_eq!(act.pid.integral_limit, 50.0);

        assert_relative_eq!(cfg.detumble_config().kd, 1.5);
        assert_relative_eq!(cfg.detumble_config().dead_zone, 1.0);

        let mission = cfg.mission_config();
        assert_eq!(mission.inter_packet_delay, Duration::from_millis(10));
        assert_eq!(mission.timeouts.start, Duration::from_millis(50));
        assert_eq!(mission.timeouts.byte, Duration::from_millis(100));

        let dg = cfg.commands[0].datagram(0).unwrap();
        assert_eq!(dg.id, BusId::COM_NOMINAL);
        assert_eq!(dg.data, [2, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11]);
        let dg = cfg.commands[1].datagram(1).unwrap();
        assert_eq!(dg.id, BusId::COM_AIS_DATA);

        let eps = cfg.eps_reports[0].datagrams();
        assert_eq!(eps.len(), 2);
        assert_eq!(eps[0].data, [0x0E, 0x74, 0x0E, 0x42, 0, 25, 0, 30]);
    }

    #[test]
    fn empty_config_is_nominal() {
        let cfg = Config::from_str_checked("").unwrap();
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.adcs_config(), adcs::AdcsConfig::nominal());
        assert_eq!(cfg.mission_config(), payload::MissionConfig::nominal());
    }

    #[test]
    fn rejects_bad_calibration() {
        const TOML: &str = indoc! {r#"
            [[light-sensor-calibration]]
            index = 1
            min = 500
            max = 500
        "#};
        assert!(matches!(
            Config::from_str_checked(TOML),
            Err(ConfigError::CalibrationRange { index: 1, .. })
        ));

        const DUP: &str = indoc! {r#"
            [[light-sensor-calibration]]
            index = 1
            min = 0
            max = 500
            [[light-sensor-calibration]]
            index = 1
            min = 0
            max = 600
        "#};
        assert!(matches!(
            Config::from_str_checked(DUP),
            Err(ConfigError::DuplicateCalibration(1))
        ));

        const OOR: &str = indoc! {r#"
            [[light-sensor-calibration]]
            index = 8
            min = 0
            max = 500
        "#};
        assert!(matches!(
            Config::from_str_checked(OOR),
            Err(ConfigError::CalibrationIndex(8))
        ));
    }

    #[test]
    fn rejects_bad_commands() {
        const MODE: &str = indoc! {r#"
            [[command]]
            mode = 'warp'
        "#};
        assert!(matches!(
            Config::from_str_checked(MODE),
            Err(ConfigError::UnknownMode { index: 0, .. })
        ));

        const ID: &str = indoc! {r#"
            [[command]]
            id = 0x800
        "#};
        assert!(matches!(
            Config::from_str_checked(ID),
            Err(ConfigError::BusId(DatagramError::IdOutOfRange(0x800)))
        ));

        const SHAPE: &str = indoc! {r#"
            [[command]]
            at-cycle = 3
        "#};
        assert!(matches!(
            Config::from_str_checked(SHAPE),
            Err(ConfigError::CommandShape { index: 0 })
        ));
    }

    #[test]
    fn rejects_dead_zone_above_max_speed() {
        const TOML: &str = indoc! {r#"
            [adcs]
            dead-zone = 127
        "#};
        assert!(matches!(
            Config::from_str_checked(TOML),
            Err(ConfigError::DeadZone { .. })
        ));
    }

    #[test]
    fn rejects_limits_that_cannot_clamp() {
        const MAX_SPEED: &str = indoc! {r#"
            [adcs]
            dead-zone = -10
            max-speed = -5
        "#};
        assert!(matches!(
            Config::from_str_checked(MAX_SPEED),
            Err(ConfigError::MaxSpeed(-5))
        ));

        const MIN_SPEED: &str = indoc! {r#"
            [adcs]
            max-speed = -32768
        "#};
        assert!(matches!(
            Config::from_str_checked(MIN_SPEED),
            Err(ConfigError::MaxSpeed(i16::MIN))
        ));

        const DETUMBLE_SPEED: &str = indoc! {r#"
            [adcs]
            detumble-max-speed = -1
        "#};
        assert!(matches!(
            Config::from_str_checked(DETUMBLE_SPEED),
            Err(ConfigError::DetumbleMaxSpeed(-1))
        ));

        const ZERO_DETUMBLE_SPEED: &str = indoc! {r#"
            [adcs]
            detumble-max-speed = 0
        "#};
        assert!(matches!(
            Config::from_str_checked(ZERO_DETUMBLE_SPEED),
            Err(ConfigError::DetumbleMaxSpeed(0))
        ));

        const TORQUE: &str = indoc! {r#"
            [detumble]
            max-torque = -1.0
        "#};
        assert!(matches!(
            Config::from_str_checked(TORQUE),
            Err(ConfigError::MaxTorque(_))
        ));

        const TORQUE_NAN: &str = indoc! {r#"
            [detumble]
            max-torque = nan
        "#};
        assert!(matches!(
            Config::from_str_checked(TORQUE_NAN),
            Err(ConfigError::MaxTorque(t)) if t.is_nan()
        ));

        const INTEGRAL: &str = indoc! {r#"
            [pid]
            integral-limit = -0.5
        "#};
        assert!(matches!(
            Config::from_str_checked(INTEGRAL),
            Err(ConfigError::IntegralLimit(_))
        ));

        const INTEGRAL_NAN: &str = indoc! {r#"
            [pid]
            integral-limit = nan
        "#};
        assert!(matches!(
            Config::from_str_checked(INTEGRAL_NAN),
            Err(ConfigError::IntegralLimit(l)) if l.is_nan()
        ));
    }

    #[test]
    fn accepted_limits_keep_the_wheel_loop_running() {
        use crate::{
            adcs::ActuationCoordinator,
            interfaces::{MotorDriver, MotorError, RateSensor, SensorError},
        };
        use cdh_types::prelude::{ImuSample, OperatingMode};
        use na::Vector3;

        struct Spin;
        impl RateSensor for Spin {
            fn read(&mut self) -> Result<ImuSample, SensorError> {
                Ok(ImuSample::new(Vector3::new(0.0, 0.0, 3.0), Vector3::zeros()))
            }
        }
        struct Motor(Vec<String>);
        impl MotorDriver for Motor {
            fn send_command(&mut self, cmd: &str) -> Result<(), MotorError> {
                self.0.push(cmd.to_owned());
                Ok(())
            }
        }

        const TOML: &str = indoc! {r#"
            [adcs]
            detumble-max-speed = 1
            dead-zone = 0
        "#};
        let cfg = Config::from_str_checked(TOML).unwrap();
        let mut act = ActuationCoordinator::new(cfg.actuator_config());
        let mut motor = Motor(Vec::new());
        act.step(OperatingMode::Detumbling, &mut Spin, &mut motor);
        act.step(OperatingMode::Detumbling, &mut Spin, &mut motor);
        assert_eq!(motor.0, vec!["MC1\n", "M-1\n"]);
    }
}
