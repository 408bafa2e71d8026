//! Checksummed frames on the serial link between the CDH board and the
//! payload computer.
//!
//! ```text
//! [0xFE][kind][len_hi][len_lo][payload: len bytes][checksum]
//! ```
//!
//! The checksum is the XOR of every preceding byte, marker included.

use crate::parser::{self, ParseError};
use crate::{FRAME_MARKER, MAX_FRAME_LEN, MAX_PAYLOAD_LEN};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;
use tracing::debug;

pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum MessageKind {
    StartMission1,
    StartMission2,
    AisData,
    Mission1Result,
    Mission2Result,
    Ack,
    Error,
    Unknown(u8),
}

impl MessageKind {
    /// Kind byte of the sentinel frame returned when nothing valid arrived
    pub const NONE: u8 = 0x00;
}

impl From<u8> for MessageKind {
    fn from(value: u8) -> Self {
        use MessageKind::*;
        match value {
            0x01 => StartMission1,
            0x02 => StartMission2,
            0x03 => AisData,
            0x10 => Mission1Result,
            0x11 => Mission2Result,
            0xA0 => Ack,
            0xEE => Error,
            v => Unknown(v),
        }
    }
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> Self {
        use MessageKind::*;
        match kind {
            StartMission1 => 0x01,
            StartMission2 => 0x02,
            AisData => 0x03,
            Mission1Result => 0x10,
            Mission2Result => 0x11,
            Ack => 0xA0,
            Error => 0xEE,
            Unknown(v) => v,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Unknown(v) => write!(f, "Unknown(0x{v:02X})"),
            k => write!(f, "{k:?}"),
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Timed out waiting for a byte")]
    Timeout,
    #[error("The link is closed")]
    Closed,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum FramingError {
    #[error("Expected frame marker, got 0x{0:02X}")]
    BadStart(u8),
    #[error("Payload length {0} exceeds the frame limit")]
    Oversize(usize),
    #[error("Timed out before the frame was complete")]
    Timeout,
    #[error("Checksum mismatch, expected 0x{expected:02X}, got 0x{actual:02X}")]
    BadChecksum { expected: u8, actual: u8 },
    #[error("Buffer ends before the frame does")]
    Incomplete,
}

/// Blocking byte-at-a-time receive side of a serial link
pub trait ByteSource {
    fn read_byte(&mut self, timeout: Duration) -> Result<u8, LinkError>;
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn read_byte(&mut self, timeout: Duration) -> Result<u8, LinkError> {
        (**self).read_byte(timeout)
    }
}

/// An empty queue behaves like a link that never answers
impl ByteSource for VecDeque<u8> {
    fn read_byte(&mut self, _timeout: Duration) -> Result<u8, LinkError> {
        self.pop_front().ok_or(LinkError::Timeout)
    }
}

impl<'a> ByteSource for &'a [u8] {
    fn read_byte(&mut self, _timeout: Duration) -> Result<u8, LinkError> {
        let data: &'a [u8] = *self;
        let (b, rest) = data.split_first().ok_or(LinkError::Timeout)?;
        *self = rest;
        Ok(*b)
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct FrameTimeouts {
    /// Wait for the marker byte
    pub start: Duration,
    /// Wait for each subsequent byte
    pub byte: Duration,
}

impl FrameTimeouts {
    pub fn nominal() -> Self {
        Self {
            start: Duration::from_millis(1000),
            byte: Duration::from_millis(100),
        }
    }

    /// Upper bound on how long a single `decode` can block
    pub fn worst_case(&self) -> Duration {
        self.start + self.byte * (MAX_FRAME_LEN as u32 - 1)
    }
}

impl Default for FrameTimeouts {
    fn default() -> Self {
        Self::nominal()
    }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct SerialFrame {
    pub kind: MessageKind,
    pub payload: Payload,
}

impl SerialFrame {
    pub fn new(kind: MessageKind, payload: &[u8]) -> Result<Self, FramingError> {
        let payload =
            Payload::from_slice(payload).map_err(|_| FramingError::Oversize(payload.len()))?;
        Ok(Self { kind, payload })
    }

    /// The sentinel frame standing in for "nothing valid received"
    pub fn none() -> Self {
        Self {
            kind: MessageKind::Unknown(MessageKind::NONE),
            payload: Payload::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.kind != MessageKind::Unknown(MessageKind::NONE)
    }

    /// Receive one frame, collapsing every failure into the sentinel frame.
    pub fn poll<S: ByteSource + ?Sized>(source: &mut S, timeouts: &FrameTimeouts) -> Self {
        match decode(source, timeouts) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(err = %e, "No valid serial frame");
                Self::none()
            }
        }
    }

    pub fn encode(&self) -> Result<heapless::Vec<u8, MAX_FRAME_LEN>, FramingError> {
        encode(self.kind, &self.payload)
    }
}

impl fmt::Display for SerialFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {:02X?}", self.kind, self.payload.len(), self.payload)
    }
}

pub fn checksum(kind: MessageKind, payload: &[u8]) -> u8 {
    let [len_hi, len_lo] = (payload.len() as u16).to_be_bytes();
    payload
        .iter()
        .fold(FRAME_MARKER ^ u8::from(kind) ^ len_hi ^ len_lo, |acc, b| {
            acc ^ b
        })
}

pub fn encode(
    kind: MessageKind,
    payload: &[u8],
) -> Result<heapless::Vec<u8, MAX_FRAME_LEN>, FramingError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(FramingError::Oversize(payload.len()));
    }
    let oversize = |_| FramingError::Oversize(payload.len());

    let mut out = heapless::Vec::new();
    out.push(FRAME_MARKER).map_err(oversize)?;
    out.push(kind.into()).map_err(oversize)?;
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes())
        .map_err(|_| FramingError::Oversize(payload.len()))?;
    out.extend_from_slice(payload)
        .map_err(|_| FramingError::Oversize(payload.len()))?;
    out.push(checksum(kind, payload)).map_err(oversize)?;
    Ok(out)
}

/// Read exactly one frame from `source`.
///
/// There is no resynchronization: a wrong first byte fails the whole frame
/// and the caller retries on its next cycle.
pub fn decode<S: ByteSource + ?Sized>(
    source: &mut S,
    timeouts: &FrameTimeouts,
) -> Result<SerialFrame, FramingError> {
    let mut read = |timeout: Duration| {
        source.read_byte(timeout).map_err(|e| {
            debug!(err = %e, "Serial read failed");
            FramingError::Timeout
        })
    };

    let marker = read(timeouts.start)?;
    if marker != FRAME_MARKER {
        return Err(FramingError::BadStart(marker));
    }
    let kind = MessageKind::from(read(timeouts.byte)?);
    let len = usize::from(u16::from_be_bytes([
        read(timeouts.byte)?,
        read(timeouts.byte)?,
    ]));
    if len > MAX_PAYLOAD_LEN {
        return Err(FramingError::Oversize(len));
    }

    let mut payload = Payload::new();
    for _ in 0..len {
        payload
            .push(read(timeouts.byte)?)
            .map_err(|_| FramingError::Oversize(len))?;
    }

    let actual = read(timeouts.byte)?;
    let expected = checksum(kind, &payload);
    if expected != actual {
        return Err(FramingError::BadChecksum { expected, actual });
    }

    Ok(SerialFrame { kind, payload })
}

/// Decode one frame from the front of `buf`, returning the unconsumed rest.
pub fn parse_frame(buf: &[u8]) -> Result<(&[u8], SerialFrame), FramingError> {
    let (rest, raw) = parser::raw_frame(buf).map_err(|e| match e {
        nom::Err::Incomplete(_) => FramingError::Incomplete,
        nom::Err::Error(err) | nom::Err::Failure(err) => match err {
            ParseError::Marker(b) => FramingError::BadStart(b),
            ParseError::Length(len) => FramingError::Oversize(len.into()),
            ParseError::Nom(..) => FramingError::Incomplete,
        },
    })?;

    let kind = MessageKind::from(raw.kind);
    let expected = checksum(kind, raw.payload);
    if expected != raw.checksum {
        return Err(FramingError::BadChecksum {
            expected,
            actual: raw.checksum,
        });
    }
    Ok((rest, SerialFrame::new(kind, raw.payload)?))
}
