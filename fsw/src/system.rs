use cdh_types::prelude::*;
use serde::Serialize;
use tracing::{info, trace};

use crate::{
    adcs::{Adcs, AdcsConfig, AdcsStatus},
    cdh::ModeManager,
    channel::BusRxConsumer,
    flight_info::FlightInfo,
    interfaces::{BusTransmit, Delay, LightSensors, MotorDriver, RateSensor, SerialLink},
    payload::{MissionConfig, MissionOrchestrator},
    units::Time,
    FlightComponent,
};

/// The whole command and data handling board: bus polling, attitude
/// control and the payload missions, in that order every cycle.
pub struct Cdh<'q> {
    rx: BusRxConsumer<'q>,
    mode: ModeManager,
    adcs: Adcs,
    mission: MissionOrchestrator,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CdhConfig {
    pub adcs: AdcsConfig,
    pub mission: MissionConfig,
}

impl CdhConfig {
    pub fn nominal() -> Self {
        Self {
            adcs: AdcsConfig::nominal(),
            mission: MissionConfig::nominal(),
        }
    }
}

impl<'q> Cdh<'q> {
    pub const COMPONENT_NAME: &'static str = "cdh";

    pub fn new(config: CdhConfig, rx: BusRxConsumer<'q>) -> Self {
        Self {
            rx,
            mode: ModeManager::new(),
            adcs: Adcs::new(config.adcs),
            mission: MissionOrchestrator::new(config.mission),
        }
    }

    pub fn mode_manager(&self) -> &ModeManager {
        &self.mode
    }

    pub fn adcs(&self) -> &Adcs {
        &self.adcs
    }

    pub fn mission(&self) -> &MissionOrchestrator {
        &self.mission
    }

    pub fn telemetry(&self, info: &FlightInfo) -> CdhTelemetry {
        CdhTelemetry {
            cycle: info.cycle,
            relative_time: info.relative_time,
            status: self.mode.status(),
            eps: *self.mode.eps(),
            ais: *self.mode.ais(),
            adcs: self.adcs.status(),
            mission_started: self.mission.is_mission_started(),
            mission_result: *self.mission.result(),
        }
    }
}

impl<'a, 'q> FlightComponent<'a> for Cdh<'q> {
    type SharedState = CdhSharedState;
    type Environment = CdhEnvironment<'a>;

    fn init(&mut self, _env: &'a Self::Environment, shared_state: &mut Self::SharedState) {
        info!(component = Self::COMPONENT_NAME, "init");
        self.mode.init(shared_state.peripherals.bus.as_mut());
        shared_state.status = self.mode.status();
    }

    fn reset(&mut self, env: &'a Self::Environment, shared_state: &mut Self::SharedState) {
        self.rx.clear();
        self.adcs.reset();
        self.mission.reset();
        self.init(env, shared_state);
    }

    fn step(&mut self, _dt: Time, env: &'a Self::Environment, shared_state: &mut Self::SharedState) {
        let p = &mut shared_state.peripherals;

        if let Some(ais) = self.mode.process_messages(&mut self.rx, p.bus.as_mut()) {
            self.mission.forward_ais(&ais, p.serial.as_mut());
        }

        self.adcs.step(
            self.mode.mode(),
            p.light.as_mut(),
            p.rate.as_mut(),
            p.motor.as_mut(),
        );

        self.mission.step(
            self.mode.mission(),
            p.serial.as_mut(),
            p.bus.as_mut(),
            p.delay.as_mut(),
        );

        shared_state.status = self.mode.status();
        trace!(cycle = env.info.cycle, status = %shared_state.status, "Cycle done");
    }
}

#[derive(Debug, Clone)]
pub struct CdhEnvironment<'a> {
    pub info: &'a FlightInfo,
}

/// Every driver the board talks to
pub struct Peripherals {
    pub serial: Box<dyn SerialLink>,
    pub bus: Box<dyn BusTransmit>,
    pub rate: Box<dyn RateSensor>,
    pub light: Box<dyn LightSensors>,
    pub motor: Box<dyn MotorDriver>,
    pub delay: Box<dyn Delay>,
}

pub struct CdhSharedState {
    pub peripherals: Peripherals,
    /// Mode manager status as of the end of the last cycle
    pub status: CdhStatus,
}

impl CdhSharedState {
    pub fn new(peripherals: Peripherals) -> Self {
        CdhSharedState {
            peripherals,
            status: CdhStatus::idle(),
        }
    }
}

/// Snapshot of the board, as dumped by the binary
#[derive(Debug, Clone, Serialize)]
pub struct CdhTelemetry {
    pub cycle: u64,
    pub relative_time: Time,
    pub status: CdhStatus,
    pub eps: EpsTelemetry,
    pub ais: AisBuffer,
    pub adcs: AdcsStatus,
    pub mission_started: bool,
    pub mission_result: MissionResult,
}
