use deku::prelude::*;
use serde::Serialize;
use tracing::trace;

pub mod basic_id;
pub mod location;
pub mod operator_id;
pub mod self_id;
pub mod system;

use basic_id::BasicId;
use location::Location;
use operator_id::OperatorId;
use self_id::SelfId;
use system::SystemInfo;

/**
 * ## ASTM F3411 broadcast message
 *
 * Every message is 25 bytes. The first byte is a header:
 *
 * | Type | Version |
 * | ---- | ------- |
 * | 4    | 4       |
 *
 * The type nibble selects the payload schema:
 * - 0: Basic ID (aircraft identity and airframe category)
 * - 1: Location/Vector (position, altitude, speed, heading)
 * - 2: Self-ID (free-text operation description)
 * - 3: System (operator position and operation area)
 * - 4: Operator ID (operator registration number)
 * - 15: Message Pack (a batch of the above, handled by the framing layer)
 *
 * The version nibble is carried but not dispatched on: field layouts are
 * stable across the protocol versions seen on the air.
 */
#[derive(Debug, PartialEq, DekuRead, Serialize, Clone)]
#[deku(id_type = "u8", bits = "4")]
#[serde(untagged)]
pub enum Message {
    #[deku(id = "0")]
    BasicId(BasicId),

    #[deku(id = "1")]
    Location(Location),

    #[deku(id = "2")]
    SelfId(SelfId),

    #[deku(id = "3")]
    System(SystemInfo),

    #[deku(id = "4")]
    OperatorId(OperatorId),

    /// Reserved or private message types, carried so that one unknown
    /// message never invalidates the pack around it
    #[deku(id_pat = "_")]
    #[serde(skip)]
    Unknown,
}

/// Decode a fixed-width text field: NUL-stopped, then right-trimmed of
/// padding spaces. Non-ASCII bytes are replaced rather than rejected.
pub(crate) fn text_read<R: deku::no_std_io::Read + deku::no_std_io::Seek>(
    reader: &mut Reader<R>,
    width: usize,
) -> Result<String, DekuError> {
    let mut bytes = Vec::with_capacity(width);
    for _ in 0..width {
        bytes.push(u8::from_reader_with_ctx(reader, ())?);
    }
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(width);
    let text = String::from_utf8_lossy(&bytes[..end])
        .trim_end_matches(' ')
        .to_string();
    trace!("Reading text field {:?}", text);
    Ok(text)
}

/// Latitude or longitude: signed 32-bit little endian, LSB = 1e-7 degree
pub(crate) fn coordinate_read<
    R: deku::no_std_io::Read + deku::no_std_io::Seek,
>(
    reader: &mut Reader<R>,
) -> Result<f64, DekuError> {
    let encoded = i32::from_reader_with_ctx(reader, deku::ctx::Endian::Little)?;
    Ok(encoded as f64 * 1e-7)
}

/// Altitude or height: unsigned 16-bit little endian, LSB = 0.5 m with a
/// 1000 m offset. The all-zero encoding is the "unknown" marker and maps
/// to 0.0 rather than -1000.
pub(crate) fn altitude_read<
    R: deku::no_std_io::Read + deku::no_std_io::Seek,
>(
    reader: &mut Reader<R>,
) -> Result<f32, DekuError> {
    let encoded = u16::from_reader_with_ctx(reader, deku::ctx::Endian::Little)?;
    if encoded == 0 {
        return Ok(0.0);
    }
    Ok(encoded as f32 * 0.5 - 1000.0)
}
