use derive_more::Display;
use serde::Serialize;

/// Satellite-wide operating mode. The discriminants are the values carried
/// in the status datagram.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display, Serialize)]
#[repr(u8)]
pub enum OperatingMode {
    #[default]
    Idle = 0,
    Nominal = 1,
    Adcs = 2,
    Detumbling = 3,
}

impl OperatingMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// True for the modes that drive the reaction wheel
    pub fn is_attitude_control(self) -> bool {
        matches!(self, OperatingMode::Adcs | OperatingMode::Detumbling)
    }
}

/// Active science mission, only meaningful in `OperatingMode::Nominal`
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Display, Serialize)]
#[repr(u8)]
pub enum MissionType {
    #[default]
    None = 0,
    /// Oil spill detection
    Mission1 = 1,
    /// Ship identification, fed with AIS data
    Mission2 = 2,
}

impl MissionType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(MissionType::None),
            1 => Some(MissionType::Mission1),
            2 => Some(MissionType::Mission2),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Aggregate mode state reported on the bus after every mode command.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Display, Serialize)]
#[display(
    fmt = "{{mode: {}, mission: {}, active: {}}}",
    "mode",
    "mission",
    "active"
)]
pub struct CdhStatus {
    pub mode: OperatingMode,
    pub mission: MissionType,
    /// Set while a routine is running. Always false in `OperatingMode::Idle`.
    pub active: bool,
}

impl CdhStatus {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_consistent(&self) -> bool {
        !(self.mode == OperatingMode::Idle && self.active)
    }
}
