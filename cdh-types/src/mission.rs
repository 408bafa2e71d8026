use crate::mode::MissionType;
use derive_more::Display;
use serde::Serialize;

/// Outcome of a payload mission. Cleared right after it has been reported
/// on the bus.
#[derive(Copy, Clone, PartialEq, Debug, Default, Display, Serialize)]
#[display(
    fmt = "{{oil: {}, area: {} %, mmsi: {}, lat: {}, lon: {}, complete: {}}}",
    "oil_detected",
    "oil_area_percentage",
    "ship_mmsi",
    "ship_origin_lat",
    "ship_origin_lon",
    "complete"
)]
pub struct MissionResult {
    /// Mission 1: non-zero when a spill was detected
    pub oil_detected: u8,
    /// Mission 1: area covered by oil [%]
    pub oil_area_percentage: f32,

    /// Mission 2: identified ship
    pub ship_mmsi: u32,
    /// Mission 2: origin latitude [deg]
    pub ship_origin_lat: f32,
    /// Mission 2: origin longitude [deg]
    pub ship_origin_lon: f32,

    pub complete: bool,
}

impl MissionResult {
    /// Clear the fields belonging to `mission` along with the completion flag
    pub fn reset_for(&mut self, mission: MissionType) {
        self.complete = false;
        match mission {
            MissionType::Mission1 => {
                self.oil_detected = 0;
                self.oil_area_percentage = 0.0;
            }
            MissionType::Mission2 => {
                self.ship_mmsi = 0;
                self.ship_origin_lat = 0.0;
                self.ship_origin_lon = 0.0;
            }
            MissionType::None => (),
        }
    }
}
