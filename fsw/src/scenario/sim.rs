//! Simulated board peripherals for running the flight software off target.
//!
//! Each device is a cheap handle onto shared state so the harness can look
//! at what the flight software did after handing the handles over as
//! boxed trait objects.

use cdh_protocol::{
    encode, parse_frame, BusDatagram, ByteSource, FramingError, LinkError, MessageKind,
    SerialFrame,
};
use cdh_types::prelude::ImuSample;
use na::Vector3;
use oorandom::Rand64;
use std::{cell::RefCell, collections::VecDeque, rc::Rc, time::Duration};
use tracing::{debug, warn};

use crate::{
    interfaces::{
        BusError, BusTransmit, Delay, LightSensors, MotorDriver, MotorError, RateSensor,
        SensorError, SerialLink, LIGHT_SENSOR_COUNT,
    },
    system::Peripherals,
    units::{AngularVelocity, Time},
};

#[derive(Clone, Debug, PartialEq)]
pub struct PayloadModel {
    /// Empty polls before the mission result shows up
    pub response_delay_polls: u32,
    /// Acknowledge every received frame
    pub ack: bool,
    /// Answer mission starts with an error frame instead of a result
    pub fail: bool,
    pub oil_detected: u8,
    pub oil_area_percentage: f32,
    pub ship_mmsi: u32,
    pub ship_origin_lat: f32,
    pub ship_origin_lon: f32,
}

impl PayloadModel {
    pub fn nominal() -> Self {
        Self {
            response_delay_polls: 3,
            ack: true,
            fail: false,
            oil_detected: 1,
            oil_area_percentage: 42.5,
            ship_mmsi: 710_000_123,
            ship_origin_lat: -23.0,
            ship_origin_lon: -43.25,
        }
    }

    fn response(&self, start: MessageKind) -> Option<(MessageKind, Vec<u8>)> {
        if self.fail {
            return Some((MessageKind::Error, vec![start.into()]));
        }
        match start {
            MessageKind::StartMission1 => {
                let mut p = vec![self.oil_detected];
                p.extend_from_slice(&self.oil_area_percentage.to_le_bytes());
                Some((MessageKind::Mission1Result, p))
            }
            MessageKind::StartMission2 => {
                let mut p = self.ship_mmsi.to_be_bytes().to_vec();
                p.extend_from_slice(&self.ship_origin_lat.to_le_bytes());
                p.extend_from_slice(&self.ship_origin_lon.to_le_bytes());
                Some((MessageKind::Mission2Result, p))
            }
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BodyModel {
    pub initial_yaw_rate: AngularVelocity,
    /// Uniform noise amplitude on each gyro read
    pub noise: AngularVelocity,
    /// Yaw acceleration per unit of commanded wheel speed [rad/s^2]
    pub wheel_gain: f64,
    /// Every n-th gyro read fails, 0 disables
    pub fail_every: u64,
}

impl BodyModel {
    pub fn nominal() -> Self {
        Self {
            initial_yaw_rate: AngularVelocity::from_radians_per_second(0.0),
            noise: AngularVelocity::from_radians_per_second(0.0),
            wheel_gain: 0.002,
            fail_every: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct PayloadState {
    /// Bytes waiting for the flight software to read
    pub rx: VecDeque<u8>,
    /// Bytes written by the flight software, not yet a whole frame
    pub tx: Vec<u8>,
    pub frames_received: Vec<SerialFrame>,
    pending: Option<(u32, MessageKind, Vec<u8>)>,
}

impl PayloadState {
    pub fn ais_packets_received(&self) -> usize {
        self.frames_received
            .iter()
            .filter(|f| f.kind == MessageKind::AisData)
            .count()
    }

    fn queue_frame(&mut self, kind: MessageKind, payload: &[u8]) {
        match encode(kind, payload) {
            Ok(bytes) => self.rx.extend(bytes.iter()),
            Err(e) => warn!(err = %e, %kind, "Simulated payload can't encode"),
        }
    }
}

/// The payload computer at the far end of the serial link
#[derive(Clone)]
pub struct SimPayload {
    model: PayloadModel,
    state: Rc<RefCell<PayloadState>>,
}

impl SimPayload {
    pub fn new(model: PayloadModel) -> Self {
        Self {
            model,
            state: Default::default(),
        }
    }

    pub fn state(&self) -> Rc<RefCell<PayloadState>> {
        self.state.clone()
    }

    fn handle_frame(&self, state: &mut PayloadState, frame: SerialFrame) {
        debug!(%frame, "Simulated payload received");
        if self.model.ack {
            state.queue_frame(MessageKind::Ack, &[]);
        }
        if let Some((kind, payload)) = self.model.response(frame.kind) {
            state.pending = Some((self.model.response_delay_polls, kind, payload));
        }
        state.frames_received.push(frame);
    }
}

impl ByteSource for SimPayload {
    fn read_byte(&mut self, timeout: Duration) -> Result<u8, LinkError> {
        let mut state = self.state.borrow_mut();
        if state.rx.is_empty() {
            // Only an idle line counts down to the pending response
            match state.pending.take() {
                Some((0, kind, payload)) => state.queue_frame(kind, &payload),
                Some((n, kind, payload)) => state.pending = Some((n - 1, kind, payload)),
                None => (),
            }
        }
        state.rx.read_byte(timeout)
    }
}

impl SerialLink for SimPayload {
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        let mut state = self.state.borrow_mut();
        state.tx.extend_from_slice(bytes);
        loop {
            let (consumed, frame) = match parse_frame(&state.tx) {
                Ok((rest, frame)) => (state.tx.len() - rest.len(), frame),
                Err(FramingError::Incomplete) => break,
                Err(e) => {
                    warn!(err = %e, "Simulated payload dropping garbage");
                    state.tx.clear();
                    break;
                }
            };
            state.tx.drain(..consumed);
            self.handle_frame(&mut state, frame);
        }
        Ok(())
    }
}

/// Records everything the flight software puts on the bus
#[derive(Clone, Default)]
pub struct SimBus {
    log: Rc<RefCell<Vec<BusDatagram>>>,
    offline: Rc<RefCell<bool>>,
}

impl SimBus {
    pub fn log(&self) -> Rc<RefCell<Vec<BusDatagram>>> {
        self.log.clone()
    }

    pub fn set_offline(&self, offline: bool) {
        *self.offline.borrow_mut() = offline;
    }
}

impl BusTransmit for SimBus {
    fn transmit(&mut self, dg: &BusDatagram) -> Result<(), BusError> {
        if *self.offline.borrow() {
            return Err(BusError::Offline);
        }
        debug!(%dg, "Bus TX");
        self.log.borrow_mut().push(*dg);
        Ok(())
    }
}

pub struct BodyState {
    pub yaw_rate: AngularVelocity,
    pub wheel_speed: i16,
    pub motor_selected: bool,
    pub motor_commands: Vec<String>,
    pub gyro_reads: u64,
    model: BodyModel,
    prng: Rand64,
}

impl BodyState {
    /// Integrate the wheel's effect on the body over one cycle
    pub fn advance(&mut self, dt: Time) {
        let accel = self.model.wheel_gain * f64::from(self.wheel_speed);
        self.yaw_rate =
            self.yaw_rate + AngularVelocity::from_radians_per_second(accel * dt.as_secs());
    }
}

/// Spinning rigid body with a reaction wheel, seen through the gyro and
/// commanded through the wheel's serial port
#[derive(Clone)]
pub struct SimBody(Rc<RefCell<BodyState>>);

impl SimBody {
    pub fn new(model: BodyModel, seed: u64) -> Self {
        SimBody(Rc::new(RefCell::new(BodyState {
            yaw_rate: model.initial_yaw_rate,
            wheel_speed: 0,
            motor_selected: false,
            motor_commands: Vec::new(),
            gyro_reads: 0,
            model,
            prng: Rand64::new(seed.into()),
        })))
    }

    pub fn state(&self) -> Rc<RefCell<BodyState>> {
        self.0.clone()
    }
}

impl RateSensor for SimBody {
    fn read(&mut self) -> Result<ImuSample, SensorError> {
        let mut s = self.0.borrow_mut();
        s.gyro_reads += 1;
        if s.model.fail_every != 0 && s.gyro_reads % s.model.fail_every == 0 {
            return Err(SensorError::ReadFailed);
        }
        let noise = s.model.noise.as_radians_per_second() * ((s.prng.rand_float() * 2.0) - 1.0);
        let z = s.yaw_rate.as_radians_per_second() + noise;
        Ok(ImuSample::new(
            Vector3::new(0.0, 0.0, z),
            Vector3::new(0.0, 0.0, 0.0),
        ))
    }
}

impl MotorDriver for SimBody {
    fn send_command(&mut self, cmd: &str) -> Result<(), MotorError> {
        let mut s = self.0.borrow_mut();
        s.motor_commands.push(cmd.to_owned());
        let line = cmd.trim_end();
        if line == "MC1" {
            s.motor_selected = true;
        } else if let Some(speed) = line.strip_prefix('M').and_then(|v| v.parse::<i16>().ok()) {
            if s.motor_selected {
                s.wheel_speed = speed;
            } else {
                warn!(speed, "Wheel command before motor selection");
            }
        } else {
            return Err(MotorError::WriteFailed);
        }
        Ok(())
    }
}

/// Photo resistors under a fixed illumination
#[derive(Clone, Debug)]
pub struct SimLights(pub [u16; LIGHT_SENSOR_COUNT]);

impl LightSensors for SimLights {
    fn read(&mut self) -> Result<[u16; LIGHT_SENSOR_COUNT], SensorError> {
        Ok(self.0)
    }
}

/// Records requested delays without sleeping
#[derive(Clone, Default)]
pub struct SimDelay(Rc<RefCell<Vec<Duration>>>);

impl SimDelay {
    pub fn log(&self) -> Rc<RefCell<Vec<Duration>>> {
        self.0.clone()
    }
}

impl Delay for SimDelay {
    fn delay(&mut self, duration: Duration) {
        self.0.borrow_mut().push(duration);
    }
}

/// Shared views onto every simulated device
#[derive(Clone)]
pub struct SimDevices {
    pub payload: SimPayload,
    pub bus: SimBus,
    pub body: SimBody,
    pub lights: SimLights,
    pub delay: SimDelay,
}

impl SimDevices {
    pub fn new(
        payload: PayloadModel,
        body: BodyModel,
        light: [u16; LIGHT_SENSOR_COUNT],
        seed: u64,
    ) -> Self {
        Self {
            payload: SimPayload::new(payload),
            bus: SimBus::default(),
            body: SimBody::new(body, seed),
            lights: SimLights(light),
            delay: SimDelay::default(),
        }
    }

    pub fn peripherals(&self) -> Peripherals {
        Peripherals {
            serial: Box::new(self.payload.clone()),
            bus: Box::new(self.bus.clone()),
            rate: Box::new(self.body.clone()),
            light: Box::new(self.lights.clone()),
            motor: Box::new(self.body.clone()),
            delay: Box::new(self.delay.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdh_protocol::FrameTimeouts;

    #[test]
    fn payload_answers_after_delay() {
        let mut payload = SimPayload::new(PayloadModel {
            response_delay_polls: 2,
            ..PayloadModel::nominal()
        });
        let bytes = encode(MessageKind::StartMission1, &[]).unwrap();
        payload.write_all(&bytes).unwrap();

        let t = FrameTimeouts::nominal();
        assert_eq!(SerialFrame::poll(&mut payload, &t).kind, MessageKind::Ack);
        assert!(!SerialFrame::poll(&mut payload, &t).is_valid());
        assert!(!SerialFrame::poll(&mut payload, &t).is_valid());
        let frame = SerialFrame::poll(&mut payload, &t);
        assert_eq!(frame.kind, MessageKind::Mission1Result);
        assert_eq!(frame.payload[0], 1);
        assert_eq!(payload.state().borrow().frames_received.len(), 1);
    }

    #[test]
    fn payload_reassembles_split_writes() {
        let mut payload = SimPayload::new(PayloadModel::nominal());
        let bytes = encode(MessageKind::AisData, &[1; 8]).unwrap();
        payload.write_all(&bytes[..5]).unwrap();
        assert_eq!(payload.state().borrow().ais_packets_received(), 0);
        payload.write_all(&bytes[5..]).unwrap();
        assert_eq!(payload.state().borrow().ais_packets_received(), 1);
    }

    #[test]
    fn wheel_spins_down_body() {
        let mut body = SimBody::new(
            BodyModel {
                initial_yaw_rate: AngularVelocity::from_radians_per_second(1.0),
                ..BodyModel::nominal()
            },
            0,
        );
        body.send_command("M-50\n").unwrap();
        assert_eq!(body.state().borrow().wheel_speed, 0);
        body.send_command("MC1\n").unwrap();
        body.send_command("M-50\n").unwrap();
        body.state().borrow_mut().advance(Time::from_secs(1.0));
        let rate = body.read().unwrap().yaw_rate();
        assert!((rate - 0.9).abs() < 1e-9);
        assert_eq!(body.send_command("X\n"), Err(MotorError::WriteFailed));
    }

    #[test]
    fn gyro_fails_periodically() {
        let mut body = SimBody::new(
            BodyModel {
                fail_every: 2,
                ..BodyModel::nominal()
            },
            0,
        );
        assert!(body.read().is_ok());
        assert_eq!(body.read(), Err(SensorError::ReadFailed));
        assert!(body.read().is_ok());
    }
}
