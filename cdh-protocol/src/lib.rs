//! Wire codecs for the CDH board: the checksummed serial frames exchanged with
//! the payload computer and the fixed 8-byte datagrams carried on the
//! satellite bus.

pub use crate::datagram::{BusDatagram, BusId, BusMessage, DatagramError, ErrorCode, ModeCommand};
pub use crate::frame::{
    checksum, decode, encode, parse_frame, ByteSource, FrameTimeouts, FramingError, LinkError,
    MessageKind, SerialFrame,
};

pub mod datagram;
pub mod frame;
pub mod parser;

/// First byte of every serial frame
pub const FRAME_MARKER: u8 = 0xFE;

/// Largest payload a serial frame can carry
pub const MAX_PAYLOAD_LEN: usize = 256;

/// Marker, kind, two length bytes and the trailing checksum
pub const FRAME_OVERHEAD: usize = 5;

pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + FRAME_OVERHEAD;

/// Every bus datagram carries exactly this many bytes
pub const DATAGRAM_LEN: usize = 8;

/// Identifiers are 11 bits wide
pub const MAX_BUS_ID: u16 = 0x7FF;

/// Well-known bus identifiers
pub mod ids {
    pub const CDH_TELEMETRY: u16 = 0x100;
    pub const CDH_STATUS: u16 = 0x101;
    pub const CDH_ERROR: u16 = 0x103;

    pub const EPS_GENERAL: u16 = 0x200;
    pub const EPS_BATTERY: u16 = 0x201;
    pub const EPS_SOLAR_VOLTAGE: u16 = 0x202;
    pub const EPS_SOLAR_CURRENT: u16 = 0x203;

    pub const COM_IDLE: u16 = 0x300;
    pub const COM_NOMINAL: u16 = 0x301;
    pub const COM_ADCS: u16 = 0x302;
    pub const COM_DETUMBLING: u16 = 0x303;
    pub const COM_EXIT: u16 = 0x30F;
    pub const COM_AIS_DATA: u16 = 0x320;

    pub const CDH_RANGE: core::ops::RangeInclusive<u16> = 0x100..=0x1FF;
    pub const EPS_RANGE: core::ops::RangeInclusive<u16> = 0x200..=0x2FF;
    pub const COM_RANGE: core::ops::RangeInclusive<u16> = 0x300..=0x3FF;
}
