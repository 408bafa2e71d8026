//! Runs the payload computer's missions over the serial link and reports
//! their results on the bus.

use cdh_protocol::{parser, BusDatagram, FrameTimeouts, MessageKind, SerialFrame};
use cdh_types::prelude::*;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::interfaces::{BusTransmit, Delay, SerialLink};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MissionConfig {
    /// Spacing between the datagrams of a multi-packet result
    pub inter_packet_delay: Duration,
    pub timeouts: FrameTimeouts,
}

impl MissionConfig {
    pub fn nominal() -> Self {
        Self {
            inter_packet_delay: Duration::from_millis(5),
            timeouts: FrameTimeouts::nominal(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: FrameTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self::nominal()
    }
}

#[derive(Debug, Default, Serialize)]
pub struct MissionOrchestrator {
    #[serde(skip)]
    config: MissionConfig,
    mission_started: bool,
    /// Mission the payload was last told to start
    running: MissionType,
    result: MissionResult,
}

impl MissionOrchestrator {
    pub const COMPONENT_NAME: &'static str = "mission";

    pub fn new(config: MissionConfig) -> Self {
        Self {
            config,
            mission_started: false,
            running: MissionType::None,
            result: Default::default(),
        }
    }

    pub fn step(
        &mut self,
        mission: MissionType,
        serial: &mut dyn SerialLink,
        bus: &mut dyn BusTransmit,
        delay: &mut dyn Delay,
    ) {
        let start_kind = match mission {
            MissionType::Mission1 => MessageKind::StartMission1,
            MissionType::Mission2 => MessageKind::StartMission2,
            MissionType::None => {
                // Whatever the payload is still working on gets dropped
                self.mission_started = false;
                return;
            }
        };

        if self.mission_started && self.running != mission {
            info!(from = %self.running, to = %mission, "Mission switched, restarting payload");
            self.mission_started = false;
        }

        if !self.mission_started {
            info!(%mission, "Starting payload mission");
            send_frame(serial, start_kind, &[]);
            self.mission_started = true;
            self.running = mission;
            self.result.reset_for(mission);
        }

        let frame = SerialFrame::poll(serial, &self.config.timeouts);
        if frame.is_valid() {
            self.handle_response(&frame);
        }

        if self.result.complete {
            self.report(mission, bus, delay);
            self.mission_started = false;
            self.result.complete = false;
        }
    }

    fn handle_response(&mut self, frame: &SerialFrame) {
        match frame.kind {
            MessageKind::Mission1Result | MessageKind::Mission2Result
                if frame.kind != result_kind(self.running) =>
            {
                warn!(
                    kind = %frame.kind,
                    running = %self.running,
                    "Dropping result for another mission"
                );
            }
            MessageKind::Mission1Result => match parser::oil_result(&frame.payload) {
                Ok((_, (oil_detected, area))) => {
                    self.result.oil_detected = oil_detected;
                    self.result.oil_area_percentage = area;
                    self.result.complete = true;
                }
                Err(_) => warn!(len = frame.payload.len(), "Short mission 1 result"),
            },
            MessageKind::Mission2Result => match parser::ship_result(&frame.payload) {
                Ok((_, (mmsi, lat, lon))) => {
                    self.result.ship_mmsi = mmsi;
                    self.result.ship_origin_lat = lat;
                    self.result.ship_origin_lon = lon;
                    self.result.complete = true;
                }
                Err(_) => warn!(len = frame.payload.len(), "Short mission 2 result"),
            },
            MessageKind::Ack => debug!("Payload ACK"),
            MessageKind::Error => {
                warn!(payload = ?frame.payload, "Payload reported an error");
                self.result.complete = false;
            }
            kind => debug!(%kind, "Ignoring payload frame"),
        }
    }

    fn report(&self, mission: MissionType, bus: &mut dyn BusTransmit, delay: &mut dyn Delay) {
        info!(result = %self.result, %mission, "Mission complete");
        let r = &self.result;
        match mission {
            MissionType::Mission1 => {
                transmit(bus, &BusDatagram::mission1_result(r.oil_detected, r.oil_area_percentage));
            }
            MissionType::Mission2 => {
                let packets = BusDatagram::mission2_result_packets(
                    r.ship_mmsi,
                    r.ship_origin_lat,
                    r.ship_origin_lon,
                );
                for (i, dg) in packets.iter().enumerate() {
                    if i > 0 {
                        delay.delay(self.config.inter_packet_delay);
                    }
                    transmit(bus, dg);
                }
            }
            MissionType::None => (),
        }
    }

    /// Pass an accepted AIS packet on to the payload computer
    pub fn forward_ais(&mut self, data: &[u8; AIS_DATA_LEN], serial: &mut dyn SerialLink) {
        send_frame(serial, MessageKind::AisData, data);
    }

    pub fn reset(&mut self) {
        self.mission_started = false;
        self.running = MissionType::None;
        self.result = Default::default();
    }

    pub fn is_mission_started(&self) -> bool {
        self.mission_started
    }

    pub fn is_mission_complete(&self) -> bool {
        self.result.complete
    }

    pub fn result(&self) -> &MissionResult {
        &self.result
    }

    pub fn oil_detected(&self) -> u8 {
        self.result.oil_detected
    }

    pub fn oil_area_percentage(&self) -> f32 {
        self.result.oil_area_percentage
    }

    pub fn ship_mmsi(&self) -> u32 {
        self.result.ship_mmsi
    }

    pub fn ship_origin_lat(&self) -> f32 {
        self.result.ship_origin_lat
    }

    pub fn ship_origin_lon(&self) -> f32 {
        self.result.ship_origin_lon
    }
}

fn result_kind(mission: MissionType) -> MessageKind {
    match mission {
        MissionType::Mission1 => MessageKind::Mission1Result,
        MissionType::Mission2 => MessageKind::Mission2Result,
        MissionType::None => MessageKind::Unknown(MessageKind::NONE),
    }
}

fn send_frame(serial: &mut dyn SerialLink, kind: MessageKind, payload: &[u8]) {
    let bytes = match cdh_protocol::encode(kind, payload) {
        Ok(b) => b,
        Err(e) => {
            warn!(err = %e, %kind, "Can't encode frame");
            return;
        }
    };
    if let Err(e) = serial.write_all(&bytes) {
        warn!(err = %e, %kind, "Serial write failed");
    }
}

fn transmit(bus: &mut dyn BusTransmit, dg: &BusDatagram) {
    if let Err(e) = bus.transmit(dg) {
        warn!(err = %e, id = %dg.id, "Bus transmit failed");
    }
}
