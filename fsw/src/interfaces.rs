//! Narrow seams to the board's drivers. Everything the control loop touches
//! outside its own state goes through one of these traits.

use cdh_protocol::{BusDatagram, ByteSource, LinkError};
use cdh_types::prelude::ImuSample;
use std::time::Duration;
use thiserror::Error;

pub const LIGHT_SENSOR_COUNT: usize = 8;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum BusError {
    #[error("Bus transmit mailbox is full")]
    MailboxFull,
    #[error("Bus controller is offline")]
    Offline,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum SensorError {
    #[error("Sensor is not initialized")]
    NotInitialized,
    #[error("Sensor read failed")]
    ReadFailed,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum MotorError {
    #[error("Motor controller write failed")]
    WriteFailed,
}

/// The payload computer's serial link
pub trait SerialLink: ByteSource {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError>;
}

pub trait BusTransmit {
    fn transmit(&mut self, dg: &BusDatagram) -> Result<(), BusError>;
}

/// Three-axis gyro and accelerometer
pub trait RateSensor {
    fn read(&mut self) -> Result<ImuSample, SensorError>;
}

/// The eight sun-sensing photo resistors, raw ADC counts
pub trait LightSensors {
    fn read(&mut self) -> Result<[u16; LIGHT_SENSOR_COUNT], SensorError>;
}

/// Line-oriented ASCII command port of the reaction wheel controller
pub trait MotorDriver {
    fn send_command(&mut self, cmd: &str) -> Result<(), MotorError>;
}

pub trait Delay {
    fn delay(&mut self, duration: Duration);
}

/// Records everything transmitted
impl BusTransmit for Vec<BusDatagram> {
    fn transmit(&mut self, dg: &BusDatagram) -> Result<(), BusError> {
        self.push(*dg);
        Ok(())
    }
}

/// Records every command line
impl MotorDriver for Vec<String> {
    fn send_command(&mut self, cmd: &str) -> Result<(), MotorError> {
        self.push(cmd.to_owned());
        Ok(())
    }
}

/// Records requested delays instead of sleeping
impl Delay for Vec<Duration> {
    fn delay(&mut self, duration: Duration) {
        self.push(duration);
    }
}

/// Blocks the calling thread
#[derive(Copy, Clone, Debug, Default)]
pub struct ThreadDelay;

impl Delay for ThreadDelay {
    fn delay(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
