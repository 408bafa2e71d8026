use cdh_protocol::{
    parse_frame,
    parser::{self, ParseErrorExt},
    BusDatagram, FramingError, MessageKind, FRAME_MARKER,
};
use clap::Parser;
use std::fs;
use std::io::{self, prelude::*};
use std::path::PathBuf;

/// Decode captured CDH serial frames or bus traffic
#[derive(Parser, Debug)]
#[command(version)]
struct Opts {
    /// Input is a bus dump (`0x301: 02 AA BB ...` per line) instead of
    /// serial link hex bytes
    #[arg(short = 'b', long)]
    bus: bool,

    /// Capture file to read, stdin when not provided
    input: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let opts = Opts::parse();

    let text = match opts.input.as_ref() {
        Some(p) => fs::read_to_string(p)?,
        None => {
            let mut s = String::new();
            io::stdin().read_to_string(&mut s)?;
            s
        }
    };

    if opts.bus {
        dump_bus(&text)
    } else {
        dump_serial(&text)
    }
}

fn dump_bus(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (rest, lines) = match parser::bus_dump(text) {
        Ok(res) => res,
        // Elide the borrow of `text` held by the nom error
        Err(e) => return Err(e.to_string().into()),
    };

    for (id, data) in lines {
        match BusDatagram::from_raw(id, data) {
            Ok(dg) => println!("{dg}  {:?}", dg.message()),
            Err(e) => println!("0x{id:03X}: {data:02X?}  {e}"),
        }
    }

    if !rest.trim().is_empty() {
        let line = rest.lines().next().unwrap_or_default();
        return Err(format!("Unparsed bus dump line '{line}'").into());
    }
    Ok(())
}

fn dump_serial(text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = match parser::hex_bytes(text) {
        Ok((rest, _)) if !rest.is_empty() => {
            let token = rest.split_whitespace().next().unwrap_or_default();
            return Err(format!("Not a hex byte '{token}'").into());
        }
        Ok((_, bytes)) => bytes,
        Err(e) if e.is_failure() => return Err(e.to_string().into()),
        Err(_) => Vec::new(),
    };

    let mut buf = bytes.as_slice();
    while !buf.is_empty() {
        let offset = bytes.len() - buf.len();
        match parse_frame(buf) {
            Ok((rest, frame)) => {
                println!("@{offset:04}  {frame}");
                describe(frame.kind, &frame.payload);
                buf = rest;
            }
            Err(FramingError::Incomplete) => {
                println!("@{offset:04}  {} trailing bytes, incomplete frame", buf.len());
                break;
            }
            Err(e) => {
                println!("@{offset:04}  {e}");
                // Resync on the next marker
                let skip = buf[1..]
                    .iter()
                    .position(|b| *b == FRAME_MARKER)
                    .map_or(buf.len(), |p| p + 1);
                buf = &buf[skip..];
            }
        }
    }
    Ok(())
}

fn describe(kind: MessageKind, payload: &[u8]) {
    match kind {
        MessageKind::Mission1Result => {
            if let Ok((_, (oil, area))) = parser::oil_result(payload) {
                println!("        oil detected: {oil}, area: {area} %");
            }
        }
        MessageKind::Mission2Result => {
            if let Ok((_, (mmsi, lat, lon))) = parser::ship_result(payload) {
                println!("        mmsi: {mmsi}, origin: ({lat}, {lon})");
            }
        }
        _ => (),
    }
}
