//! Fixed 8-byte addressed datagrams on the satellite bus.
//!
//! Identifier ranges are assigned per subsystem: CDH 0x100-0x1FF,
//! EPS 0x200-0x2FF and COM 0x300-0x3FF.

use crate::{ids, parser, DATAGRAM_LEN, MAX_BUS_ID};
use cdh_types::prelude::*;
use std::fmt;

#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum DatagramError {
    #[error("Bus identifier 0x{0:X} does not fit in 11 bits")]
    IdOutOfRange(u16),
}

/// 11-bit bus identifier
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct BusId(u16);

impl BusId {
    pub const CDH_TELEMETRY: Self = Self(ids::CDH_TELEMETRY);
    pub const CDH_STATUS: Self = Self(ids::CDH_STATUS);
    pub const CDH_ERROR: Self = Self(ids::CDH_ERROR);

    pub const EPS_BATTERY: Self = Self(ids::EPS_BATTERY);
    pub const EPS_SOLAR_VOLTAGE: Self = Self(ids::EPS_SOLAR_VOLTAGE);
    pub const EPS_SOLAR_CURRENT: Self = Self(ids::EPS_SOLAR_CURRENT);

    pub const COM_IDLE: Self = Self(ids::COM_IDLE);
    pub const COM_NOMINAL: Self = Self(ids::COM_NOMINAL);
    pub const COM_ADCS: Self = Self(ids::COM_ADCS);
    pub const COM_DETUMBLING: Self = Self(ids::COM_DETUMBLING);
    pub const COM_EXIT: Self = Self(ids::COM_EXIT);
    pub const COM_AIS_DATA: Self = Self(ids::COM_AIS_DATA);

    pub fn new(id: u16) -> Result<Self, DatagramError> {
        if id > MAX_BUS_ID {
            Err(DatagramError::IdOutOfRange(id))
        } else {
            Ok(Self(id))
        }
    }

    pub const fn get(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for BusId {
    type Error = DatagramError;

    fn try_from(id: u16) -> Result<Self, Self::Error> {
        Self::new(id)
    }
}

impl From<BusId> for u16 {
    fn from(id: BusId) -> Self {
        id.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:03X}", self.0)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct BusDatagram {
    pub id: BusId,
    pub data: [u8; DATAGRAM_LEN],
}

impl fmt::Display for BusDatagram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:02X?}", self.id, self.data)
    }
}

/// Reason carried in the first byte of a CDH error datagram
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
#[repr(u8)]
pub enum ErrorCode {
    /// Nominal-mode command naming a mission other than 1 or 2
    InvalidMission = 0x01,
    /// AIS data received while Mission 2 was not running
    AisRejected = 0x02,
}

impl ErrorCode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(ErrorCode::InvalidMission),
            0x02 => Some(ErrorCode::AisRejected),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ModeCommand {
    EnterIdle,
    /// `mission` is left raw so the receiver can reject bad values
    EnterNominal {
        mission: u8,
        seed: [u8; AIS_SEED_LEN],
    },
    EnterAdcs,
    EnterDetumbling,
    Exit,
}

/// A datagram decoded according to its identifier
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BusMessage {
    ModeCommand(ModeCommand),
    AisData([u8; AIS_DATA_LEN]),
    EpsBattery {
        cell_voltage: [u16; CELL_COUNT],
        cell_depth_of_discharge: [u16; CELL_COUNT],
    },
    EpsSolarVoltage {
        panels_1_2: u32,
        panels_3_4: u32,
    },
    EpsSolarCurrent {
        panels_1_2: u32,
        panels_3_4: u32,
    },
    /// EPS range identifier with no decoder
    EpsOther(BusId),
    /// Traffic in the CDH range, typically our own transmissions
    CdhOwn(BusId),
    Unrecognized(BusId),
}

impl BusMessage {
    pub fn decode(dg: &BusDatagram) -> Self {
        let data = &dg.data[..];
        match dg.id.get() {
            ids::COM_IDLE => Self::ModeCommand(ModeCommand::EnterIdle),
            ids::COM_NOMINAL => match parser::mission_command(data) {
                Ok((_, (mission, seed))) => {
                    Self::ModeCommand(ModeCommand::EnterNominal { mission, seed })
                }
                Err(_) => Self::Unrecognized(dg.id),
            },
            ids::COM_ADCS => Self::ModeCommand(ModeCommand::EnterAdcs),
            ids::COM_DETUMBLING => Self::ModeCommand(ModeCommand::EnterDetumbling),
            ids::COM_EXIT => Self::ModeCommand(ModeCommand::Exit),
            ids::COM_AIS_DATA => Self::AisData(dg.data),

            ids::EPS_BATTERY => match parser::eps_battery(data) {
                Ok((_, (cell_voltage, cell_depth_of_discharge))) => Self::EpsBattery {
                    cell_voltage,
                    cell_depth_of_discharge,
                },
                Err(_) => Self::Unrecognized(dg.id),
            },
            ids::EPS_SOLAR_VOLTAGE => match parser::eps_panel_pairs(data) {
                Ok((_, (panels_1_2, panels_3_4))) => Self::EpsSolarVoltage {
                    panels_1_2,
                    panels_3_4,
                },
                Err(_) => Self::Unrecognized(dg.id),
            },
            ids::EPS_SOLAR_CURRENT => match parser::eps_panel_pairs(data) {
                Ok((_, (panels_1_2, panels_3_4))) => Self::EpsSolarCurrent {
                    panels_1_2,
                    panels_3_4,
                },
                Err(_) => Self::Unrecognized(dg.id),
            },
            id if ids::EPS_RANGE.contains(&id) => Self::EpsOther(dg.id),
            id if ids::CDH_RANGE.contains(&id) => Self::CdhOwn(dg.id),
            _ => Self::Unrecognized(dg.id),
        }
    }
}

impl BusDatagram {
    pub fn new(id: BusId, data: [u8; DATAGRAM_LEN]) -> Self {
        Self { id, data }
    }

    pub fn from_raw(id: u16, data: [u8; DATAGRAM_LEN]) -> Result<Self, DatagramError> {
        Ok(Self::new(BusId::new(id)?, data))
    }

    pub fn message(&self) -> BusMessage {
        BusMessage::decode(self)
    }

    /// `[mode, mission, active, 0, 0, 0, 0, 0]` on 0x101
    pub fn status(status: &CdhStatus) -> Self {
        let mut data = [0; DATAGRAM_LEN];
        data[0] = status.mode.as_u8();
        data[1] = status.mission.as_u8();
        data[2] = status.active.into();
        Self::new(BusId::CDH_STATUS, data)
    }

    /// `[code, id_hi, id_lo, arg, 0, 0, 0, 0]` on 0x103, naming the
    /// identifier of the rejected datagram.
    pub fn error(code: ErrorCode, offending: BusId, arg: u8) -> Self {
        let [id_hi, id_lo] = offending.get().to_be_bytes();
        Self::new(
            BusId::CDH_ERROR,
            [code as u8, id_hi, id_lo, arg, 0, 0, 0, 0],
        )
    }

    /// `[1, oil, area_be[0..4], 0, 0]` on 0x100
    pub fn mission1_result(oil_detected: u8, area_percentage: f32) -> Self {
        let [a0, a1, a2, a3] = area_percentage.to_bits().to_be_bytes();
        Self::new(
            BusId::CDH_TELEMETRY,
            [
                MissionType::Mission1.as_u8(),
                oil_detected,
                a0,
                a1,
                a2,
                a3,
                0,
                0,
            ],
        )
    }

    /// Three datagrams on 0x100, `[2, idx, value_be[0..4], 0, 0]`, carrying
    /// the MMSI, then the latitude bits, then the longitude bits.
    pub fn mission2_result_packets(mmsi: u32, lat: f32, lon: f32) -> [Self; 3] {
        let packet = |idx: u8, value: u32| {
            let [v0, v1, v2, v3] = value.to_be_bytes();
            Self::new(
                BusId::CDH_TELEMETRY,
                [MissionType::Mission2.as_u8(), idx, v0, v1, v2, v3, 0, 0],
            )
        };
        [
            packet(1, mmsi),
            packet(2, lat.to_bits()),
            packet(3, lon.to_bits()),
        ]
    }

    pub fn mode_command(cmd: &ModeCommand) -> Self {
        match cmd {
            ModeCommand::EnterIdle => Self::new(BusId::COM_IDLE, [0; DATAGRAM_LEN]),
            ModeCommand::EnterNominal { mission, seed } => {
                let mut data = [0; DATAGRAM_LEN];
                data[0] = *mission;
                data[1..].copy_from_slice(seed);
                Self::new(BusId::COM_NOMINAL, data)
            }
            ModeCommand::EnterAdcs => Self::new(BusId::COM_ADCS, [0; DATAGRAM_LEN]),
            ModeCommand::EnterDetumbling => Self::new(BusId::COM_DETUMBLING, [0; DATAGRAM_LEN]),
            ModeCommand::Exit => Self::new(BusId::COM_EXIT, [0; DATAGRAM_LEN]),
        }
    }

    pub fn ais_data(data: [u8; AIS_DATA_LEN]) -> Self {
        Self::new(BusId::COM_AIS_DATA, data)
    }

    pub fn eps_battery(
        cell_voltage: [u16; CELL_COUNT],
        cell_depth_of_discharge: [u16; CELL_COUNT],
    ) -> Self {
        let mut data = [0; DATAGRAM_LEN];
        for (chunk, v) in data
            .chunks_exact_mut(2)
            .zip(cell_voltage.iter().chain(cell_depth_of_discharge.iter()))
        {
            chunk.copy_from_slice(&v.to_be_bytes());
        }
        Self::new(BusId::EPS_BATTERY, data)
    }

    pub fn eps_solar_voltage(panels_1_2: u32, panels_3_4: u32) -> Self {
        Self::new(BusId::EPS_SOLAR_VOLTAGE, panel_pairs(panels_1_2, panels_3_4))
    }

    pub fn eps_solar_current(panels_1_2: u32, panels_3_4: u32) -> Self {
        Self::new(BusId::EPS_SOLAR_CURRENT, panel_pairs(panels_1_2, panels_3_4))
    }
}

fn panel_pairs(p12: u32, p34: u32) -> [u8; DATAGRAM_LEN] {
    let mut data = [0; DATAGRAM_LEN];
    data[..4].copy_from_slice(&p12.to_be_bytes());
    data[4..].copy_from_slice(&p34.to_be_bytes());
    data
}
