use deku::prelude::*;
use serde::Serialize;

use super::{altitude_read, coordinate_read};

/**
 * ## System message (type 3)
 *
 * Where the operator is and what volume the operation occupies.
 *
 * | Version | Rsvd | OperatorLocation | Rsvd   |
 * | ------- | ---- | ---------------- | ------ |
 * | 4 bits  | 2    | 2 bits           | 4 bits |
 *
 * followed by operator latitude and longitude (4 bytes each, signed LE,
 * 1e-7 degree), area count (2 bytes), area radius (1 byte, 10 m LSB),
 * area ceiling and floor (2 bytes each, altitude encoding) and a Unix
 * timestamp (4 bytes).
 */
#[derive(Debug, PartialEq, DekuRead, Serialize, Clone)]
pub struct SystemInfo {
    #[deku(bits = "4")]
    #[serde(skip)]
    pub protocol_version: u8,

    #[deku(bits = "2")]
    #[serde(skip)]
    reserved0: u8,

    /// How the operator position was obtained
    pub operator_location: OperatorLocationType,

    #[deku(bits = "4")]
    #[serde(skip)]
    reserved1: u8,

    /// Operator latitude in degrees, WGS-84
    #[deku(reader = "coordinate_read(deku::reader)")]
    pub operator_latitude: f64,

    /// Operator longitude in degrees, WGS-84
    #[deku(reader = "coordinate_read(deku::reader)")]
    pub operator_longitude: f64,

    /// Number of aircraft in the operation area (swarms)
    #[deku(endian = "little")]
    pub area_count: u16,

    /// Operation area radius in metres
    #[deku(
        map = "|v: u8| -> Result<_, DekuError> { Ok(v as u16 * 10) }"
    )]
    pub area_radius: u16,

    /// Operation ceiling in metres
    #[deku(reader = "altitude_read(deku::reader)")]
    pub area_ceiling: f32,

    /// Operation floor in metres
    #[deku(reader = "altitude_read(deku::reader)")]
    pub area_floor: f32,

    /// Unix timestamp of the message, seconds
    #[deku(endian = "little")]
    pub timestamp: u32,
}

#[derive(Debug, PartialEq, Eq, DekuRead, Serialize, Copy, Clone, Default)]
#[deku(id_type = "u8", bits = "2")]
#[serde(rename_all = "snake_case")]
pub enum OperatorLocationType {
    /// Operator position assumed equal to the takeoff position
    #[deku(id = "0")]
    #[default]
    Takeoff,
    /// Position of the controller, updated from its own GNSS fix
    #[deku(id = "1")]
    LiveGnss,
    /// Fixed position entered by the operator
    #[deku(id = "2")]
    Fixed,
    #[deku(id_pat = "_")]
    #[serde(rename = "reserved")]
    Reserved,
}

#[cfg(test)]
mod tests {
    use crate::decode::msg::system::*;
    use crate::prelude::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_system_fields() {
        let mut bytes = [0u8; 25];
        bytes[0] = 0x32; // System, protocol version 2
        bytes[1] = 0x10; // live GNSS operator position
        bytes[2..6].copy_from_slice(&485853000i32.to_le_bytes());
        bytes[6..10].copy_from_slice(&23488000i32.to_le_bytes());
        bytes[10..12].copy_from_slice(&1u16.to_le_bytes());
        bytes[12] = 25; // 250 m radius
        bytes[13..15].copy_from_slice(&2240u16.to_le_bytes()); // 120 m
        bytes[15..17].copy_from_slice(&2000u16.to_le_bytes()); // 0 m
        bytes[17..21].copy_from_slice(&1_700_000_000u32.to_le_bytes());

        let (_, msg) = Message::from_bytes((&bytes, 0)).unwrap();
        let sys = match msg {
            Message::System(sys) => sys,
            other => panic!("unexpected message {other:?}"),
        };
        assert_eq!(sys.operator_location, OperatorLocationType::LiveGnss);
        assert_relative_eq!(sys.operator_latitude, 48.5853, epsilon = 1e-7);
        assert_relative_eq!(sys.operator_longitude, 2.3488, epsilon = 1e-7);
        assert_eq!(sys.area_count, 1);
        assert_eq!(sys.area_radius, 250);
        assert_relative_eq!(sys.area_ceiling, 120.0);
        assert_relative_eq!(sys.area_floor, 0.0);
        assert_eq!(sys.timestamp, 1_700_000_000);
    }
}
