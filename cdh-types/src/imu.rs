use derive_more::Display;
use serde::Serialize;

/// One inertial sensor reading
#[derive(Copy, Clone, PartialEq, Debug, Display, Serialize)]
#[display(fmt = "{{gyro: {:?}, accel: {:?}}}", "gyro", "accel")]
pub struct ImuSample {
    /// Angular rate [rad/s], body frame
    pub gyro: na::Vector3<f64>,
    /// Linear acceleration [m/s^2], body frame
    pub accel: na::Vector3<f64>,
}

impl Default for ImuSample {
    fn default() -> Self {
        Self {
            gyro: na::Vector3::zeros(),
            accel: na::Vector3::zeros(),
        }
    }
}

impl ImuSample {
    pub fn new(gyro: na::Vector3<f64>, accel: na::Vector3<f64>) -> Self {
        Self { gyro, accel }
    }

    /// The wheel spins about the body z axis, so this is the rate the
    /// attitude controllers act on.
    pub fn yaw_rate(&self) -> f64 {
        self.gyro.z
    }
}
