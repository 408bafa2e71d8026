//! The default scenario: power telemetry, a detumble from a moderate spin,
//! a stretch of sun pointing, then one run of each payload mission.

use cdh_protocol::{BusDatagram, ModeCommand};
use std::time::Duration;

use super::{sim::BodyModel, ScriptedDatagram};
use crate::{interfaces::LIGHT_SENSOR_COUNT, units::AngularVelocity};

pub const CYCLE_PERIOD: Duration = Duration::from_millis(200);
pub const CYCLES: u64 = 120;

pub fn body_model() -> BodyModel {
    BodyModel {
        initial_yaw_rate: AngularVelocity::from_radians_per_second(0.8),
        noise: AngularVelocity::from_radians_per_second(0.01),
        ..BodyModel::nominal()
    }
}

/// Sun slightly left of the +X face
pub fn light() -> [u16; LIGHT_SENSOR_COUNT] {
    [4000, 3800, 21000, 52000, 47000, 900, 1100, 30000]
}

pub fn script() -> Vec<ScriptedDatagram> {
    let mode = |at_cycle, cmd| ScriptedDatagram {
        at_cycle,
        datagram: BusDatagram::mode_command(&cmd),
    };

    vec![
        ScriptedDatagram {
            at_cycle: 1,
            datagram: BusDatagram::eps_battery([3700, 3650], [25, 30]),
        },
        ScriptedDatagram {
            at_cycle: 1,
            datagram: BusDatagram::eps_solar_voltage(5000, 5100),
        },
        mode(2, ModeCommand::EnterDetumbling),
        mode(40, ModeCommand::EnterAdcs),
        mode(
            60,
            ModeCommand::EnterNominal {
                mission: 1,
                seed: [0; 7],
            },
        ),
        mode(
            80,
            ModeCommand::EnterNominal {
                mission: 2,
                seed: [0x2A, 0x51, 0x3E, 0x7B, 0x01, 0x02, 0x03],
            },
        ),
        ScriptedDatagram {
            at_cycle: 82,
            datagram: BusDatagram::ais_data([0x2A, 0x51, 0x3E, 0x7B, 0x10, 0x20, 0x30, 0x40]),
        },
        mode(110, ModeCommand::Exit),
    ]
}
