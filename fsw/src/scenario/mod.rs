use cdh_protocol::BusDatagram;
use std::{collections::VecDeque, path::Path, time::Duration};
use tracing::{debug, info};

use self::{
    config::{Config, ConfigError},
    sim::{BodyModel, PayloadModel, SimDevices},
};
use crate::{
    channel::{BusRxProducer, BusRxQueue},
    flight_info::FlightInfo,
    interfaces::LIGHT_SENSOR_COUNT,
    system::{Cdh, CdhConfig, CdhEnvironment, CdhSharedState, CdhTelemetry},
    units::{AngularVelocity, Time},
    FlightComponent,
};

pub mod config;
pub mod nominal;
pub mod sim;

/// A datagram injected on the bus receive path at the start of a cycle
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ScriptedDatagram {
    pub at_cycle: u64,
    pub datagram: BusDatagram,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub cdh: CdhConfig,
    pub cycles: u64,
    pub cycle_period: Duration,
    pub seed: u64,
    pub script: Vec<ScriptedDatagram>,
    pub payload: PayloadModel,
    pub body: BodyModel,
    pub light: [u16; LIGHT_SENSOR_COUNT],
}

impl Scenario {
    pub fn nominal() -> Self {
        Self {
            name: "nominal".to_owned(),
            cdh: CdhConfig::nominal(),
            cycles: nominal::CYCLES,
            cycle_period: nominal::CYCLE_PERIOD,
            seed: 0,
            script: nominal::script(),
            payload: PayloadModel::nominal(),
            body: nominal::body_model(),
            light: nominal::light(),
        }
    }

    pub fn load<P: AsRef<Path>>(config: Option<P>) -> Result<Self, ConfigError> {
        if let Some(cfg_path) = config.as_ref() {
            info!(
                config = %cfg_path.as_ref().display(),
                "Loading scenario from config file",
            );
            let cfg = Config::load(cfg_path)?;
            Self::from_config(&cfg)
        } else {
            info!("Loading default nominal scenario");
            Ok(Self::nominal())
        }
    }

    /// Values missing from `cfg` fall back to the nominal scenario. A
    /// config with any scripted datagram replaces the nominal script.
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let mut s = Self::nominal();

        if let Some(name) = cfg.name.as_ref() {
            s.name = name.clone();
        }
        if let Some(c) = cfg.cycles {
            s.cycles = c;
        }
        if let Some(ms) = cfg.cycle_period_ms {
            s.cycle_period = Duration::from_millis(ms);
        }
        if let Some(seed) = cfg.seed {
            s.seed = seed;
        }

        s.cdh = CdhConfig {
            adcs: cfg.adcs_config(),
            mission: cfg.mission_config(),
        };

        if !cfg.commands.is_empty() || !cfg.eps_reports.is_empty() {
            let mut script = Vec::new();
            for (index, cmd) in cfg.commands.iter().enumerate() {
                script.push(ScriptedDatagram {
                    at_cycle: cmd.at_cycle,
                    datagram: cmd.datagram(index)?,
                });
            }
            for eps in cfg.eps_reports.iter() {
                script.extend(eps.datagrams().into_iter().map(|datagram| ScriptedDatagram {
                    at_cycle: eps.at_cycle,
                    datagram,
                }));
            }
            // Stable, so same-cycle entries keep their file order
            script.sort_by_key(|d| d.at_cycle);
            s.script = script;
        }

        if let Some(p) = cfg.payload.as_ref() {
            let n = &mut s.payload;
            n.response_delay_polls = p.response_delay_polls.unwrap_or(n.response_delay_polls);
            n.ack = p.ack.unwrap_or(n.ack);
            n.fail = p.fail.unwrap_or(n.fail);
            n.oil_detected = p.oil_detected.unwrap_or(n.oil_detected);
            n.oil_area_percentage = p.oil_area_percentage.unwrap_or(n.oil_area_percentage);
            n.ship_mmsi = p.ship_mmsi.unwrap_or(n.ship_mmsi);
            n.ship_origin_lat = p.ship_origin_lat.unwrap_or(n.ship_origin_lat);
            n.ship_origin_lon = p.ship_origin_lon.unwrap_or(n.ship_origin_lon);
        }

        if let Some(imu) = cfg.imu.as_ref() {
            let b = &mut s.body;
            if let Some(r) = imu.initial_yaw_rate {
                b.initial_yaw_rate = AngularVelocity::from_radians_per_second(r);
            }
            if let Some(n) = imu.noise {
                b.noise = AngularVelocity::from_radians_per_second(n);
            }
            b.wheel_gain = imu.wheel_gain.unwrap_or(b.wheel_gain);
            b.fail_every = imu.fail_every.unwrap_or(b.fail_every);
        }

        if let Some(raw) = cfg.light.as_ref().and_then(|l| l.raw) {
            s.light = raw;
        }

        Ok(s)
    }
}

/// Runs the flight software against the simulated devices, feeding it the
/// scenario's scripted bus traffic.
pub struct Harness<'q> {
    info: FlightInfo,
    dt: Time,
    cdh: Cdh<'q>,
    shared_state: CdhSharedState,
    bus_rx: BusRxProducer<'q>,
    script: VecDeque<ScriptedDatagram>,
    devices: SimDevices,
    dropped: u64,
}

impl<'q> Harness<'q> {
    pub fn new(scenario: &Scenario, queue: &'q mut BusRxQueue) -> Self {
        let (bus_rx, consumer) = queue.split();
        let devices = SimDevices::new(
            scenario.payload.clone(),
            scenario.body.clone(),
            scenario.light,
            scenario.seed,
        );
        let shared_state = CdhSharedState::new(devices.peripherals());

        let mut script: Vec<_> = scenario.script.clone();
        script.sort_by_key(|d| d.at_cycle);

        Self {
            info: FlightInfo::new(),
            dt: Time::from_duration(scenario.cycle_period),
            cdh: Cdh::new(scenario.cdh.clone(), consumer),
            shared_state,
            bus_rx,
            script: script.into(),
            devices,
            dropped: 0,
        }
    }

    pub fn init(&mut self) {
        let env = CdhEnvironment { info: &self.info };
        self.cdh.init(&env, &mut self.shared_state);
    }

    pub fn reset(&mut self) {
        let env = CdhEnvironment { info: &self.info };
        self.cdh.reset(&env, &mut self.shared_state);
    }

    /// Deliver whatever is due this cycle, then run one flight software cycle
    pub fn step(&mut self) {
        while let Some(next) = self.script.front() {
            if next.at_cycle > self.info.cycle {
                break;
            }
            let dg = next.datagram;
            self.script.pop_front();
            debug!(cycle = self.info.cycle, %dg, "Bus RX");
            if self.bus_rx.push(dg).is_err() {
                self.dropped += 1;
            }
        }

        let env = CdhEnvironment { info: &self.info };
        self.cdh.step(self.dt, &env, &mut self.shared_state);

        self.devices.body.state().borrow_mut().advance(self.dt);
        self.info.step(self.dt);
    }

    pub fn run(&mut self, cycles: u64) {
        for _ in 0..cycles {
            self.step();
        }
    }

    pub fn info(&self) -> &FlightInfo {
        &self.info
    }

    pub fn cdh(&self) -> &Cdh<'q> {
        &self.cdh
    }

    pub fn devices(&self) -> &SimDevices {
        &self.devices
    }

    pub fn telemetry(&self) -> CdhTelemetry {
        self.cdh.telemetry(&self.info)
    }

    /// Everything the flight software has transmitted on the bus so far
    pub fn bus_log(&self) -> Vec<BusDatagram> {
        self.devices.bus.log().borrow().clone()
    }

    /// Scripted datagrams that found the receive queue full
    pub fn dropped_datagrams(&self) -> u64 {
        self.dropped
    }
}
