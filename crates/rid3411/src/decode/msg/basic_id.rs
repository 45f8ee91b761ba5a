use deku::prelude::*;
use serde::Serialize;
use std::fmt;

use super::text_read;

/**
 * ## Basic ID message (type 0)
 *
 * Identifies the aircraft: the kind of identifier broadcast, the airframe
 * category, and the identifier itself.
 *
 * | Version | IdType | UavType | UAS ID   | Reserved |
 * | ------- | ------ | ------- | -------- | -------- |
 * | 4 bits  | 4 bits | 4 bits  | 20 bytes | 3 bytes  |
 *
 * The UAS ID field is NUL-padded ASCII; serial numbers follow ANSI/CTA-2063-A.
 */
#[derive(Debug, PartialEq, DekuRead, Serialize, Clone)]
pub struct BasicId {
    #[deku(bits = "4")]
    #[serde(skip)]
    pub protocol_version: u8,

    /// What kind of identifier the UAS ID field carries
    pub id_type: UavIdType,

    /// Airframe category of the aircraft
    pub uav_type: UavType,

    /// The identifier, NUL-stopped and space-trimmed
    #[deku(reader = "text_read(deku::reader, 20)")]
    pub id: String,
}

#[derive(
    Debug, PartialEq, Eq, DekuRead, Serialize, Copy, Clone, Default, Hash,
)]
#[deku(id_type = "u8", bits = "4")]
#[serde(rename_all = "snake_case")]
pub enum UavIdType {
    #[deku(id = "0")]
    #[default]
    None,
    /// Manufacturer serial number (ANSI/CTA-2063-A)
    #[deku(id = "1")]
    SerialNumber,
    /// Registration assigned by a civil aviation authority
    #[deku(id = "2")]
    CaaRegistration,
    /// UUID assigned by a UTM service provider
    #[deku(id = "3")]
    UtmAssigned,
    /// Ephemeral session identifier
    #[deku(id = "4")]
    SpecificSession,
    #[deku(id_pat = "_")]
    #[serde(rename = "reserved")]
    Reserved,
}

/// Airframe taxonomy, all sixteen values of the 4-bit field allocated
#[derive(Debug, PartialEq, Eq, DekuRead, Serialize, Copy, Clone, Default)]
#[deku(id_type = "u8", bits = "4")]
#[serde(rename_all = "snake_case")]
pub enum UavType {
    #[deku(id = "0")]
    #[default]
    None,
    #[deku(id = "1")]
    Aeroplane,
    /// Helicopter or multirotor, the dominant category in practice
    #[deku(id = "2")]
    Helicopter,
    #[deku(id = "3")]
    Gyroplane,
    /// VTOL with fixed-wing cruise
    #[deku(id = "4")]
    HybridLift,
    #[deku(id = "5")]
    Ornithopter,
    #[deku(id = "6")]
    Glider,
    #[deku(id = "7")]
    Kite,
    #[deku(id = "8")]
    FreeBalloon,
    #[deku(id = "9")]
    CaptiveBalloon,
    #[deku(id = "10")]
    Airship,
    #[deku(id = "11")]
    FreeFallParachute,
    #[deku(id = "12")]
    Rocket,
    #[deku(id = "13")]
    TetheredPowered,
    #[deku(id = "14")]
    GroundObstacle,
    #[deku(id = "15")]
    Other,
}

impl fmt::Display for BasicId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  Basic ID")?;
        writeln!(f, "  UAS ID:        {} ({:?})", self.id, self.id_type)?;
        writeln!(f, "  Airframe:      {:?}", self.uav_type)?;
        Ok(())
    }
}
