//! Satellite operating mode state machine, driven by commands from the COM
//! board and fed with EPS telemetry, both arriving over the bus.

use cdh_protocol::{BusDatagram, BusId, BusMessage, ErrorCode, ModeCommand};
use cdh_types::prelude::*;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::{channel::BusRxConsumer, interfaces::BusTransmit};

#[derive(Debug, Clone, Default, Serialize)]
pub struct ModeManager {
    status: CdhStatus,
    eps: EpsTelemetry,
    ais: AisBuffer,
}

impl ModeManager {
    pub const COMPONENT_NAME: &'static str = "mode_manager";

    pub fn new() -> Self {
        Self::default()
    }

    /// Back to idle with empty telemetry, then announce ourselves on the bus
    pub fn init(&mut self, bus: &mut dyn BusTransmit) {
        *self = Self::new();
        info!(component = Self::COMPONENT_NAME, "init");
        self.send_status(bus);
    }

    /// Handle at most one queued datagram. Returns AIS bytes that were
    /// accepted and still need to go to the payload computer.
    pub fn process_messages(
        &mut self,
        rx: &mut BusRxConsumer<'_>,
        bus: &mut dyn BusTransmit,
    ) -> Option<[u8; AIS_DATA_LEN]> {
        let dg = rx.recv()?;
        self.handle_datagram(&dg, bus)
    }

    pub fn handle_datagram(
        &mut self,
        dg: &BusDatagram,
        bus: &mut dyn BusTransmit,
    ) -> Option<[u8; AIS_DATA_LEN]> {
        match dg.message() {
            BusMessage::ModeCommand(cmd) => {
                self.handle_mode_command(dg.id, cmd, bus);
                None
            }
            BusMessage::AisData(data) => self.handle_ais_data(dg.id, data, bus),
            BusMessage::EpsBattery {
                cell_voltage,
                cell_depth_of_discharge,
            } => {
                self.eps.cell_voltage = cell_voltage;
                self.eps.cell_depth_of_discharge = cell_depth_of_discharge;
                debug!(?cell_voltage, ?cell_depth_of_discharge, "EPS battery");
                None
            }
            BusMessage::EpsSolarVoltage {
                panels_1_2,
                panels_3_4,
            } => {
                self.eps.solar_voltage_1_2 = panels_1_2;
                self.eps.solar_voltage_3_4 = panels_3_4;
                None
            }
            BusMessage::EpsSolarCurrent {
                panels_1_2,
                panels_3_4,
            } => {
                self.eps.solar_current_1_2 = panels_1_2;
                self.eps.solar_current_3_4 = panels_3_4;
                None
            }
            BusMessage::EpsOther(id) => {
                trace!(%id, "Ignoring EPS datagram");
                None
            }
            BusMessage::CdhOwn(id) | BusMessage::Unrecognized(id) => {
                trace!(%id, "Dropping datagram");
                None
            }
        }
    }

    fn handle_mode_command(&mut self, id: BusId, cmd: ModeCommand, bus: &mut dyn BusTransmit) {
        let prev = self.status;

        match cmd {
            ModeCommand::EnterIdle | ModeCommand::Exit => {
                self.status = CdhStatus::idle();
            }
            ModeCommand::EnterNominal { mission, seed } => {
                match MissionType::from_u8(mission) {
                    Some(m @ (MissionType::Mission1 | MissionType::Mission2)) => {
                        self.status = CdhStatus {
                            mode: OperatingMode::Nominal,
                            mission: m,
                            active: true,
                        };
                        if m == MissionType::Mission2 {
                            self.ais.seed(&seed);
                            debug!(mmsi = self.ais.mmsi, "AIS seeded");
                        }
                    }
                    _ => {
                        warn!(mission, "Rejecting nominal mode command, invalid mission");
                        self.send(bus, BusDatagram::error(ErrorCode::InvalidMission, id, mission));
                    }
                }
            }
            ModeCommand::EnterAdcs => {
                self.status.mode = OperatingMode::Adcs;
                self.status.active = true;
            }
            ModeCommand::EnterDetumbling => {
                self.status.mode = OperatingMode::Detumbling;
                self.status.active = true;
            }
        }

        if prev.mode != self.status.mode || prev.mission != self.status.mission {
            info!(
                from = %prev,
                to = %self.status,
                "Mode transition"
            );
        }
        self.send_status(bus);
    }

    fn handle_ais_data(
        &mut self,
        id: BusId,
        data: [u8; AIS_DATA_LEN],
        bus: &mut dyn BusTransmit,
    ) -> Option<[u8; AIS_DATA_LEN]> {
        if self.status.mission != MissionType::Mission2 {
            warn!(mission = %self.status.mission, "Rejecting AIS data outside of mission 2");
            self.send(
                bus,
                BusDatagram::error(ErrorCode::AisRejected, id, self.status.mission.as_u8()),
            );
            return None;
        }

        self.ais.push(&data);
        debug!(packet_index = self.ais.packet_index, "AIS data accepted");
        Some(data)
    }

    pub fn send_status(&self, bus: &mut dyn BusTransmit) {
        self.send(bus, BusDatagram::status(&self.status));
    }

    fn send(&self, bus: &mut dyn BusTransmit, dg: BusDatagram) {
        if let Err(e) = bus.transmit(&dg) {
            warn!(err = %e, id = %dg.id, "Bus transmit failed");
        }
    }

    pub fn status(&self) -> CdhStatus {
        self.status
    }

    pub fn mode(&self) -> OperatingMode {
        self.status.mode
    }

    pub fn mission(&self) -> MissionType {
        self.status.mission
    }

    pub fn is_active(&self) -> bool {
        self.status.active
    }

    pub fn eps(&self) -> &EpsTelemetry {
        &self.eps
    }

    pub fn ais(&self) -> &AisBuffer {
        &self.ais
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::BusRxQueue;
    use cdh_protocol::ids;

    fn dg(id: u16, data: [u8; 8]) -> BusDatagram {
        BusDatagram::from_raw(id, data).unwrap()
    }

    fn status_bytes(mode: u8, mission: u8, active: u8) -> [u8; 8] {
        [mode, mission, active, 0, 0, 0, 0, 0]
    }

    #[test]
    fn init_announces_idle() {
        let mut mm = ModeManager::new();
        let mut bus: Vec<BusDatagram> = Vec::new();
        mm.init(&mut bus);
        assert_eq!(bus.len(), 1);
        assert_eq!(bus[0].id, BusId::CDH_STATUS);
        assert_eq!(bus[0].data, status_bytes(0, 0, 0));
        assert_eq!(mm.mode(), OperatingMode::Idle);
        assert!(!mm.is_active());
    }

    #[test]
    fn nominal_mission_2_seeds_ais() {
        let mut mm = ModeManager::new();
        let mut bus: Vec<BusDatagram> = Vec::new();
        let fwd = mm.handle_datagram(
            &dg(0x301, [2, 0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11]),
            &mut bus,
        );
        assert_eq!(fwd, None);
        assert_eq!(
            mm.status(),
            CdhStatus {
                mode: OperatingMode::Nominal,
                mission: MissionType::Mission2,
                active: true
            }
        );
        assert_eq!(&mm.ais().data[..7], &[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF, 0x11]);
        assert_eq!(mm.ais().packet_index, 0);
        assert_eq!(mm.ais().mmsi, 0xAABB_CCDD);
        assert_eq!(bus, vec![dg(ids::CDH_STATUS, status_bytes(1, 2, 1))]);
    }

    #[test]
    fn invalid_mission_is_rejected() {
        let mut mm = ModeManager::new();
        let mut bus: Vec<BusDatagram> = Vec::new();
        mm.handle_datagram(&dg(0x302, [0; 8]), &mut bus);
        bus.clear();

        mm.handle_datagram(&dg(0x301, [3, 0, 0, 0, 0, 0, 0, 0]), &mut bus);
        assert_eq!(mm.mode(), OperatingMode::Adcs);
        assert_eq!(mm.mission(), MissionType::None);
        assert_eq!(
            bus,
            vec![
                dg(ids::CDH_ERROR, [0x01, 0x03, 0x01, 3, 0, 0, 0, 0]),
                dg(ids::CDH_STATUS, status_bytes(2, 0, 1)),
            ]
        );
    }

    #[test]
    fn every_transition() {
        let mut mm = ModeManager::new();
        let mut bus: Vec<BusDatagram> = Vec::new();

        mm.handle_datagram(&dg(0x301, [1, 0, 0, 0, 0, 0, 0, 0]), &mut bus);
        assert_eq!(mm.mode(), OperatingMode::Nominal);
        assert_eq!(mm.mission(), MissionType::Mission1);

        mm.handle_datagram(&dg(0x303, [0; 8]), &mut bus);
        assert_eq!(mm.mode(), OperatingMode::Detumbling);
        assert!(mm.is_active());
        // Attitude modes leave the mission alone
        assert_eq!(mm.mission(), MissionType::Mission1);

        mm.handle_datagram(&dg(0x30F, [0; 8]), &mut bus);
        assert_eq!(mm.status(), CdhStatus::idle());

        mm.handle_datagram(&dg(0x302, [0; 8]), &mut bus);
        assert_eq!(mm.mode(), OperatingMode::Adcs);

        mm.handle_datagram(&dg(0x300, [0; 8]), &mut bus);
        assert_eq!(mm.status(), CdhStatus::idle());

        // One status per command
        assert_eq!(bus.len(), 5);
        assert!(bus.iter().all(|d| d.id == BusId::CDH_STATUS));
        assert!(mm.status().is_consistent());
    }

    #[test]
    fn ais_only_in_mission_2() {
        let mut mm = ModeManager::new();
        let mut bus: Vec<BusDatagram> = Vec::new();
        let ais = [1, 2, 3, 4, 5, 6, 7, 8];

        assert_eq!(mm.handle_datagram(&dg(0x320, ais), &mut bus), None);
        assert_eq!(mm.ais(), &AisBuffer::default());
        assert_eq!(bus, vec![dg(ids::CDH_ERROR, [0x02, 0x03, 0x20, 0, 0, 0, 0, 0])]);

        mm.handle_datagram(&dg(0x301, [2, 0, 0, 0, 0, 0, 0, 0]), &mut bus);
        assert_eq!(mm.handle_datagram(&dg(0x320, ais), &mut bus), Some(ais));
        assert_eq!(mm.ais().data, ais);
        assert_eq!(mm.ais().packet_index, 1);
    }

    #[test]
    fn eps_telemetry() {
        let mut mm = ModeManager::new();
        let mut bus: Vec<BusDatagram> = Vec::new();
        mm.handle_datagram(&dg(0x201, [0x0E, 0x74, 0x0E, 0x42, 0, 25, 0, 30]), &mut bus);
        mm.handle_datagram(&BusDatagram::eps_solar_voltage(5000, 5100), &mut bus);
        mm.handle_datagram(&BusDatagram::eps_solar_current(300, 310), &mut bus);
        mm.handle_datagram(&dg(0x200, [0xFF; 8]), &mut bus);

        let eps = mm.eps();
        assert_eq!(eps.cell_voltage(0), 3700);
        assert_eq!(eps.cell_voltage(1), 3650);
        assert_eq!(eps.cell_depth_of_discharge(0), 25);
        assert_eq!(eps.cell_depth_of_discharge(1), 30);
        assert_eq!(eps.cell_voltage(2), 0);
        assert_eq!(eps.solar_voltage_1_2, 5000);
        assert_eq!(eps.solar_voltage_3_4, 5100);
        assert_eq!(eps.solar_current_1_2, 300);
        assert_eq!(eps.solar_current_3_4, 310);
        // Telemetry never answers
        assert!(bus.is_empty());
        assert_eq!(mm.mode(), OperatingMode::Idle);
    }

    #[test]
    fn one_datagram_per_poll() {
        let mut mm = ModeManager::new();
        let mut bus: Vec<BusDatagram> = Vec::new();
        let mut q = BusRxQueue::new();
        let (mut tx, mut rx) = q.split();
        tx.push(dg(0x302, [0; 8])).unwrap();
        tx.push(dg(0x303, [0; 8])).unwrap();

        mm.process_messages(&mut rx, &mut bus);
        assert_eq!(mm.mode(), OperatingMode::Adcs);
        assert_eq!(rx.len(), 1);

        mm.process_messages(&mut rx, &mut bus);
        assert_eq!(mm.mode(), OperatingMode::Detumbling);

        assert_eq!(mm.process_messages(&mut rx, &mut bus), None);
        assert_eq!(bus.len(), 2);
    }

    #[test]
    fn unknown_ids_are_dropped() {
        let mut mm = ModeManager::new();
        let mut bus: Vec<BusDatagram> = Vec::new();
        mm.handle_datagram(&dg(0x305, [1; 8]), &mut bus);
        mm.handle_datagram(&dg(0x101, [1; 8]), &mut bus);
        mm.handle_datagram(&dg(0x7FF, [1; 8]), &mut bus);
        assert!(bus.is_empty());
        assert_eq!(mm.status(), CdhStatus::idle());
    }
}
