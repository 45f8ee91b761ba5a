use deku::prelude::*;
use serde::Serialize;

use super::{altitude_read, coordinate_read};

/**
 * ## Location/Vector message (type 1)
 *
 * Position, altitude and velocity of the aircraft, broadcast at 1 Hz or
 * faster while airborne.
 *
 * | Version | Status | Rsvd | HeightRef | E/W | SpeedMult |
 * | ------- | ------ | ---- | --------- | --- | --------- |
 * | 4 bits  | 4 bits | 1    | 1 bit     | 1   | 1 bit     |
 *
 * followed by direction (1 byte), horizontal speed (1 byte), vertical speed
 * (1 byte, signed), latitude and longitude (4 bytes each, signed LE, 1e-7
 * degree), pressure altitude, geodetic altitude and height (2 bytes each,
 * 0.5 m LSB offset by 1000 m), accuracy nibbles and a 0.1 s timestamp
 * offset past the hour.
 *
 * Unknown-value markers decode to NaN: horizontal speed 255, vertical
 * speed 63. An all-zero altitude field decodes to 0.0.
 */
#[derive(Debug, PartialEq, DekuRead, Serialize, Clone)]
pub struct Location {
    #[deku(bits = "4")]
    #[serde(skip)]
    pub protocol_version: u8,

    /// Operational status of the aircraft
    pub status: OperationalStatus,

    #[deku(bits = "1")]
    #[serde(skip)]
    reserved0: u8,

    /// Whether the height field is relative to takeoff or to ground
    pub height_ref: HeightReference,

    #[deku(bits = "1")]
    #[serde(skip)]
    reserved1: u8,

    #[deku(bits = "1")]
    #[serde(skip)]
    speed_multiplier: u8,

    /// Track direction in degrees, clockwise from true north
    #[deku(reader = "direction_read(deku::reader)")]
    pub direction: f32,

    /// Ground speed in m/s, NaN when unknown
    #[deku(reader = "speed_read(deku::reader, *speed_multiplier)")]
    pub speed_horizontal: f32,

    /// Vertical speed in m/s, positive up, NaN when unknown
    #[deku(reader = "vertical_speed_read(deku::reader)")]
    pub speed_vertical: f32,

    /// Latitude in degrees, WGS-84
    #[deku(reader = "coordinate_read(deku::reader)")]
    pub latitude: f64,

    /// Longitude in degrees, WGS-84
    #[deku(reader = "coordinate_read(deku::reader)")]
    pub longitude: f64,

    /// Pressure altitude in metres
    #[deku(reader = "altitude_read(deku::reader)")]
    pub altitude_baro: f32,

    /// Geodetic altitude in metres
    #[deku(reader = "altitude_read(deku::reader)")]
    pub altitude_geo: f32,

    /// Height above the reference in metres
    #[deku(reader = "altitude_read(deku::reader)")]
    pub height: f32,

    pub horizontal_accuracy: HorizontalAccuracy,
    pub vertical_accuracy: VerticalAccuracy,

    #[deku(bits = "4")]
    #[serde(skip)]
    baro_accuracy: u8,

    pub speed_accuracy: SpeedAccuracy,

    /// Tenths of seconds past the hour when the position was sampled
    #[deku(endian = "little")]
    pub timestamp_offset: u16,
}

#[derive(Debug, PartialEq, Eq, DekuRead, Serialize, Copy, Clone, Default)]
#[deku(id_type = "u8", bits = "4")]
#[serde(rename_all = "snake_case")]
pub enum OperationalStatus {
    #[deku(id = "0")]
    #[default]
    Undeclared,
    #[deku(id = "1")]
    Ground,
    #[deku(id = "2")]
    Airborne,
    #[deku(id = "3")]
    Emergency,
    /// The Remote ID system itself reports a failure
    #[deku(id = "4")]
    RemoteIdFailure,
    #[deku(id_pat = "_")]
    #[serde(rename = "reserved")]
    Reserved,
}

#[derive(Debug, PartialEq, Eq, DekuRead, Serialize, Copy, Clone, Default)]
#[deku(id_type = "u8", bits = "1")]
#[serde(rename_all = "snake_case")]
pub enum HeightReference {
    #[deku(id = "0")]
    #[default]
    Takeoff,
    #[deku(id = "1")]
    Ground,
}

/// Horizontal position accuracy, nautical-mile buckets down to metres
#[derive(Debug, PartialEq, Eq, DekuRead, Serialize, Copy, Clone, Default)]
#[deku(id_type = "u8", bits = "4")]
#[serde(rename_all = "snake_case")]
pub enum HorizontalAccuracy {
    #[deku(id = "0")]
    #[default]
    Unknown,
    #[deku(id = "1")]
    Within10Nm,
    #[deku(id = "2")]
    Within4Nm,
    #[deku(id = "3")]
    Within2Nm,
    #[deku(id = "4")]
    Within1Nm,
    #[deku(id = "5")]
    WithinHalfNm,
    #[deku(id = "6")]
    Within555m,
    #[deku(id = "7")]
    Within185m,
    #[deku(id = "8")]
    Within93m,
    #[deku(id = "9")]
    Within30m,
    #[deku(id = "10")]
    Within10m,
    #[deku(id = "11")]
    Within3m,
    #[deku(id = "12")]
    Within1m,
    #[deku(id_pat = "_")]
    #[serde(rename = "reserved")]
    Reserved,
}

#[derive(Debug, PartialEq, Eq, DekuRead, Serialize, Copy, Clone, Default)]
#[deku(id_type = "u8", bits = "4")]
#[serde(rename_all = "snake_case")]
pub enum VerticalAccuracy {
    #[deku(id = "0")]
    #[default]
    Unknown,
    #[deku(id = "1")]
    Within150m,
    #[deku(id = "2")]
    Within45m,
    #[deku(id = "3")]
    Within25m,
    #[deku(id = "4")]
    Within10m,
    #[deku(id = "5")]
    Within3m,
    #[deku(id = "6")]
    Within1m,
    #[deku(id_pat = "_")]
    #[serde(rename = "reserved")]
    Reserved,
}

#[derive(Debug, PartialEq, Eq, DekuRead, Serialize, Copy, Clone, Default)]
#[deku(id_type = "u8", bits = "4")]
#[serde(rename_all = "snake_case")]
pub enum SpeedAccuracy {
    #[deku(id = "0")]
    #[default]
    Unknown,
    #[deku(id = "1")]
    Within10ms,
    #[deku(id = "2")]
    Within3ms,
    #[deku(id = "3")]
    Within1ms,
    #[deku(id = "4")]
    WithinThirdMs,
    #[deku(id_pat = "_")]
    #[serde(rename = "reserved")]
    Reserved,
}

/// Track direction, 1 degree LSB
fn direction_read<R: deku::no_std_io::Read + deku::no_std_io::Seek>(
    reader: &mut Reader<R>,
) -> Result<f32, DekuError> {
    let encoded = u8::from_reader_with_ctx(reader, ())?;
    Ok(encoded as f32)
}

/// Ground speed: 0.25 m/s LSB, or 0.75 m/s offset by 63.75 when the
/// multiplier bit is set. 255 is the unknown marker.
fn speed_read<R: deku::no_std_io::Read + deku::no_std_io::Seek>(
    reader: &mut Reader<R>,
    multiplier: u8,
) -> Result<f32, DekuError> {
    let encoded = u8::from_reader_with_ctx(reader, ())?;
    if encoded == 255 {
        return Ok(f32::NAN);
    }
    if multiplier != 0 {
        Ok(encoded as f32 * 0.75 + 63.75)
    } else {
        Ok(encoded as f32 * 0.25)
    }
}

/// Vertical speed: signed, 0.5 m/s LSB. 63 is the unknown marker.
fn vertical_speed_read<R: deku::no_std_io::Read + deku::no_std_io::Seek>(
    reader: &mut Reader<R>,
) -> Result<f32, DekuError> {
    let encoded = i8::from_reader_with_ctx(reader, ())?;
    if encoded == 63 {
        return Ok(f32::NAN);
    }
    Ok(encoded as f32 * 0.5)
}
