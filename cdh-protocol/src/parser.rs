//! nom parsers for frame headers, datagram fields, payload results and the
//! hex text dumps the ground tools read.

use crate::{DATAGRAM_LEN, FRAME_MARKER, MAX_PAYLOAD_LEN};
use nom::{
    bytes::complete::{tag, take_while_m_n},
    character::complete::{line_ending, multispace0, not_line_ending, space0},
    combinator::{map_res, opt},
    error::{ErrorKind, FromExternalError},
    multi::{count, fold_many0},
    number::complete::{be_u16, be_u32, le_f32, u8 as any_u8},
    sequence::preceded,
};

pub type Result<I, O, E = ParseError<I>> = std::result::Result<(I, O), nom::Err<E>>;

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum ParseError<I> {
    #[error("Invalid frame marker 0x{0:02X}")]
    Marker(u8),
    #[error("Declared payload length {0} is too large")]
    Length(u16),
    #[error("Parse error")]
    Nom(I, ErrorKind),
}

pub trait ParseErrorExt {
    /// True when more input cannot turn the error into a success
    fn is_failure(&self) -> bool;
}

impl<I> ParseErrorExt for nom::Err<ParseError<I>> {
    fn is_failure(&self) -> bool {
        !matches!(self, nom::Err::Incomplete(_))
    }
}

/// Frame fields as they sit on the wire, checksum not yet verified
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RawFrame<'a> {
    pub kind: u8,
    pub payload: &'a [u8],
    pub checksum: u8,
}

/// Streaming frame parser: `Incomplete` until the whole frame is buffered.
pub fn raw_frame(s: &[u8]) -> Result<&[u8], RawFrame<'_>> {
    use nom::bytes::streaming::take;
    use nom::number::streaming::{be_u16, u8 as any_u8};

    let (s, marker) = any_u8(s)?;
    if marker != FRAME_MARKER {
        return Err(nom::Err::Failure(ParseError::Marker(marker)));
    }
    let (s, kind) = any_u8(s)?;
    let (s, len) = be_u16(s)?;
    if usize::from(len) > MAX_PAYLOAD_LEN {
        return Err(nom::Err::Failure(ParseError::Length(len)));
    }
    let (s, payload) = take(len)(s)?;
    let (s, checksum) = any_u8(s)?;
    Ok((
        s,
        RawFrame {
            kind,
            payload,
            checksum,
        },
    ))
}

/// EPS battery datagram: two cell voltages then two depth-of-discharge values
pub fn eps_battery(s: &[u8]) -> Result<&[u8], ([u16; 2], [u16; 2])> {
    let (s, v0) = be_u16(s)?;
    let (s, v1) = be_u16(s)?;
    let (s, d0) = be_u16(s)?;
    let (s, d1) = be_u16(s)?;
    Ok((s, ([v0, v1], [d0, d1])))
}

/// EPS solar datagrams carry one u32 per panel pair
pub fn eps_panel_pairs(s: &[u8]) -> Result<&[u8], (u32, u32)> {
    let (s, p12) = be_u32(s)?;
    let (s, p34) = be_u32(s)?;
    Ok((s, (p12, p34)))
}

/// Mission byte and the seven argument bytes that follow it
pub fn mission_command(s: &[u8]) -> Result<&[u8], (u8, [u8; DATAGRAM_LEN - 1])> {
    let (s, mission) = any_u8(s)?;
    let (s, seed) = map_res(count(any_u8, DATAGRAM_LEN - 1), <[u8; DATAGRAM_LEN - 1]>::try_from)(s)?;
    Ok((s, (mission, seed)))
}

/// Mission 1 result payload: detection flag then area as little-endian f32
pub fn oil_result(s: &[u8]) -> Result<&[u8], (u8, f32)> {
    let (s, detected) = any_u8(s)?;
    let (s, area) = le_f32(s)?;
    Ok((s, (detected, area)))
}

/// Mission 2 result payload: big-endian MMSI then little-endian lat/lon
pub fn ship_result(s: &[u8]) -> Result<&[u8], (u32, f32, f32)> {
    let (s, mmsi) = be_u32(s)?;
    let (s, lat) = le_f32(s)?;
    let (s, lon) = le_f32(s)?;
    Ok((s, (mmsi, lat, lon)))
}

/// Whitespace separated hex bytes, as captured from a serial line
pub fn hex_bytes(s: &str) -> Result<&str, Vec<u8>> {
    let (s, bytes) = fold_many0(
        preceded(multispace0, hex_byte),
        Vec::new,
        |mut acc: Vec<u8>, b| {
            acc.push(b);
            acc
        },
    )(s)?;
    let (s, _) = multispace0(s)?;
    Ok((s, bytes))
}

/// Bus dump lines of the form `0x301: 02 AA BB CC DD EE FF 11`.
/// Blank lines and `#` comments are skipped, trailing ones included.
pub fn bus_dump(s: &str) -> Result<&str, Vec<(u16, [u8; DATAGRAM_LEN])>> {
    let (s, lines) = fold_many0(
        preceded(skip_blank_and_comments, bus_line),
        Vec::new,
        |mut acc: Vec<(u16, [u8; DATAGRAM_LEN])>, line| {
            acc.push(line);
            acc
        },
    )(s)?;
    let (s, _) = skip_blank_and_comments(s)?;
    Ok((s, lines))
}

fn bus_line(s: &str) -> Result<&str, (u16, [u8; DATAGRAM_LEN])> {
    let (s, _) = opt(tag("0x"))(s)?;
    let (s, id) = map_res(
        take_while_m_n(1, 3, |c: char| c.is_ascii_hexdigit()),
        |h| u16::from_str_radix(h, 16),
    )(s)?;
    let (s, _) = tag(":")(s)?;
    let (s, data) = map_res(
        count(preceded(space0, hex_byte), DATAGRAM_LEN),
        <[u8; DATAGRAM_LEN]>::try_from,
    )(s)?;
    let (s, _) = space0(s)?;
    let (s, _) = opt(line_ending)(s)?;
    Ok((s, (id, data)))
}

fn skip_blank_and_comments(s: &str) -> Result<&str, ()> {
    let (mut s, _) = multispace0(s)?;
    while let Some(rest) = s.strip_prefix('#') {
        let (rest, _) = not_line_ending(rest)?;
        let (rest, _) = multispace0(rest)?;
        s = rest;
    }
    Ok((s, ()))
}

fn hex_byte(s: &str) -> Result<&str, u8> {
    map_res(
        take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()),
        |h| u8::from_str_radix(h, 16),
    )(s)
}

impl<I> nom::error::ParseError<I> for ParseError<I> {
    fn from_error_kind(s: I, kind: ErrorKind) -> Self {
        ParseError::Nom(s, kind)
    }

    fn append(_: I, _: ErrorKind, other: Self) -> Self {
        other
    }
}

impl<I, E> FromExternalError<I, E> for ParseError<I> {
    fn from_external_error(s: I, kind: ErrorKind, _e: E) -> Self {
        ParseError::Nom(s, kind)
    }
}
