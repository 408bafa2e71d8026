pub use crate::{
    ais::{AisBuffer, AIS_DATA_LEN, AIS_SEED_LEN},
    eps::{EpsTelemetry, CELL_COUNT},
    imu::ImuSample,
    mission::MissionResult,
    mode::{CdhStatus, MissionType, OperatingMode},
};
