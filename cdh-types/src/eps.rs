use derive_more::Display;
use serde::Serialize;

pub const CELL_COUNT: usize = 2;

/// Last-known power subsystem readings, overwritten in place by each
/// matching EPS datagram.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default, Display, Serialize)]
#[display(
    fmt = "{{cells: {:?} mV, dod: {:?} %, ...}}",
    "cell_voltage",
    "cell_depth_of_discharge"
)]
pub struct EpsTelemetry {
    /// Cell voltages [mV]
    pub cell_voltage: [u16; CELL_COUNT],
    /// Cell depth of discharge [%]
    pub cell_depth_of_discharge: [u16; CELL_COUNT],

    /// Solar panels 1 and 2 input voltage
    pub solar_voltage_1_2: u32,
    /// Solar panels 3 and 4 input voltage
    pub solar_voltage_3_4: u32,

    /// Solar panels 1 and 2 input current
    pub solar_current_1_2: u32,
    /// Solar panels 3 and 4 input current
    pub solar_current_3_4: u32,
}

impl EpsTelemetry {
    /// Returns 0 for an out-of-range cell index
    pub fn cell_voltage(&self, cell: usize) -> u16 {
        self.cell_voltage.get(cell).copied().unwrap_or(0)
    }

    /// Returns 0 for an out-of-range cell index
    pub fn cell_depth_of_discharge(&self, cell: usize) -> u16 {
        self.cell_depth_of_discharge
            .get(cell)
            .copied()
            .unwrap_or(0)
    }
}
