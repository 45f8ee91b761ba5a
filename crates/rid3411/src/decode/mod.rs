pub mod asd;
pub mod msg;

use msg::Message;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/**
 * Transport framing for broadcast Remote ID.
 *
 * The ASTM message schema is transport-independent, but the wrapper around it
 * is not:
 *
 * | Transport      | Wrapper                                                 |
 * | -------------- | ------------------------------------------------------- |
 * | [`Transport::BtLegacy`]   | AD structure, Service Data - 16-bit UUID     |
 * | [`Transport::BtExtended`] | same AD structure, extended advertising PDU  |
 * | [`Transport::WifiBeacon`] | 802.11 beacon, vendor-specific IE (OUI FA:0B:BC) |
 * | [`Transport::WifiNan`]    | NAN service discovery frame                  |
 *
 * The transport tag is supplied by the host radio stack; framing validation
 * is transport-specific, so Bluetooth-framed bytes tagged as WiFi are
 * rejected rather than silently decoded.
 */
#[derive(Debug, PartialEq, Eq, Serialize, Copy, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    BtLegacy,
    BtExtended,
    WifiBeacon,
    WifiNan,
    #[default]
    Unknown,
}

/// Protocol family, selected by the 16-bit service identifier of the beacon.
#[derive(Debug, PartialEq, Eq, Serialize, Copy, Clone, Default)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// ASTM F3411, the USA/international standard
    AstmF3411,
    /// ASD-STAN prEN 4709-002, the EU standard (same message schema)
    AsdStan,
    /// GB/T Chinese standard (provisional identifier)
    CnRid,
    #[default]
    Unknown,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AstmF3411 => "ASTM F3411",
            Self::AsdStan => "ASD-STAN",
            Self::CnRid => "CN RID",
            Self::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// Which protocol families the decoder accepts.
#[derive(Debug, Copy, Clone)]
pub struct ProtocolFilter {
    pub astm: bool,
    pub asd: bool,
    pub cn: bool,
}

impl Default for ProtocolFilter {
    fn default() -> Self {
        Self {
            astm: true,
            asd: false,
            cn: false,
        }
    }
}

impl ProtocolFilter {
    fn allows(&self, protocol: Protocol) -> bool {
        match protocol {
            Protocol::AstmF3411 => self.astm,
            Protocol::AsdStan => self.asd,
            Protocol::CnRid => self.cn,
            Protocol::Unknown => false,
        }
    }
}

/// Errors reported while interpreting a raw advertisement.
///
/// None of these ever crosses the facade as a panic or an `Err`: the facade
/// folds them into a `ParseResult` with `success = false`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("payload too short for Remote ID framing")]
    Truncated,
    #[error("framing error: {0}")]
    Framing(&'static str),
    #[error("no Remote ID service identifier matched")]
    NotRemoteId,
    #[error("protocol {0} is disabled")]
    ProtocolDisabled(Protocol),
    #[error("message schema error: {0}")]
    Schema(String),
    #[error("no decodable Remote ID message")]
    NoMessage,
}

impl DecodeError {
    /// Whether the payload matched Remote ID framing before the error was
    /// raised. Wrapper-level rejections mean the beacon was something else
    /// entirely; schema-level ones mean a Remote ID beacon we could not use.
    pub fn is_remote_id(&self) -> bool {
        matches!(
            self,
            Self::ProtocolDisabled(_) | Self::Schema(_) | Self::NoMessage
        )
    }
}

/// A validated advertisement: the protocol family, the transport the framing
/// actually matched, and every ASTM message carried in the payload.
#[derive(Debug, PartialEq, Clone)]
pub struct DecodedFrame {
    pub protocol: Protocol,
    pub transport: Transport,
    pub messages: Vec<Message>,
}

/// Fixed size of every ASTM message, packs excepted
pub const MESSAGE_SIZE: usize = 25;
/// High nibble of the header byte selecting the message-pack wrapper
const MESSAGE_PACK_TYPE: u8 = 0xF;

// Bluetooth AD structure: length, AD type, 16-bit UUID, message counter
const AD_TYPE_SERVICE_DATA: u8 = 0x16;
const AD_HEADER_SIZE: usize = 5;

// Bluetooth SIG allocations for broadcast Remote ID service data
const SERVICE_UUID_ASTM: u16 = 0xFFFA;
const SERVICE_UUID_ASD: u16 = 0xFFFB;
// No public allocation for GB/T yet, provisional value
const SERVICE_UUID_CN: u16 = 0xFFF9;

// 802.11 management frame constants
const MGMT_HEADER_SIZE: usize = 24;
const BEACON_FIXED_SIZE: usize = 12; // timestamp(8) + interval(2) + capability(2)
const FC_TYPE_MASK: u16 = 0x000C;
const FC_TYPE_MGMT: u16 = 0x0000;
const FC_SUBTYPE_MASK: u16 = 0x00F0;
const FC_SUBTYPE_BEACON: u16 = 0x0080;
const FC_SUBTYPE_PROBE_RESP: u16 = 0x0050;
const FC_SUBTYPE_ACTION: u16 = 0x00D0;
const IE_VENDOR_SPECIFIC: u8 = 221;

/// ASTM designated OUI for the Remote ID vendor-specific element
const VENDOR_OUI: [u8; 3] = [0xFA, 0x0B, 0xBC];
const VENDOR_TYPE: u8 = 0x0D;

/// NAN service ID, truncated SHA-256 of "org.opendroneid.remoteid"
const NAN_SERVICE_ID: [u8; 6] = [0x88, 0x69, 0x19, 0x9D, 0x92, 0x09];

/// Validate the transport wrapper and decode every ASTM message it carries.
///
/// All length checks fail closed: no input, whatever its size or content,
/// indexes past the buffer.
pub fn decode(
    payload: &[u8],
    transport: Transport,
    filter: &ProtocolFilter,
) -> Result<DecodedFrame, DecodeError> {
    match transport {
        Transport::BtLegacy | Transport::BtExtended => {
            decode_bluetooth(payload, transport, filter)
        }
        Transport::WifiBeacon => decode_wifi_beacon(payload, filter),
        Transport::WifiNan => decode_wifi_nan(payload, filter),
        // Untagged captures: probe each framing in turn, but a definitive
        // answer (matched Remote ID, failed later) short-circuits.
        Transport::Unknown => {
            for attempt in [
                decode_bluetooth(payload, Transport::BtLegacy, filter),
                decode_wifi_beacon(payload, filter),
                decode_wifi_nan(payload, filter),
            ] {
                match attempt {
                    Ok(frame) => return Ok(frame),
                    Err(e) if e.is_remote_id() => return Err(e),
                    Err(_) => continue,
                }
            }
            Err(DecodeError::NotRemoteId)
        }
    }
}

/// Bluetooth framing: the leading AD structure must be a Service Data
/// element carrying a known Remote ID service UUID.
fn decode_bluetooth(
    payload: &[u8],
    transport: Transport,
    filter: &ProtocolFilter,
) -> Result<DecodedFrame, DecodeError> {
    if payload.len() < AD_HEADER_SIZE {
        return Err(DecodeError::Truncated);
    }
    let ad_len = payload[0] as usize;
    if ad_len == 0 {
        return Err(DecodeError::Framing("zero-length advertising structure"));
    }
    if 1 + ad_len > payload.len() {
        return Err(DecodeError::Framing("declared AD length exceeds buffer"));
    }
    if payload[1] != AD_TYPE_SERVICE_DATA {
        return Err(DecodeError::NotRemoteId);
    }
    // AD type + UUID + message counter
    if ad_len < 4 {
        return Err(DecodeError::Framing("service data element too short"));
    }
    let uuid = u16::from_le_bytes([payload[2], payload[3]]);
    let protocol = match uuid {
        SERVICE_UUID_ASTM => Protocol::AstmF3411,
        SERVICE_UUID_ASD => Protocol::AsdStan,
        SERVICE_UUID_CN => Protocol::CnRid,
        _ => return Err(DecodeError::NotRemoteId),
    };
    trace!("service UUID {uuid:#06x} -> {protocol}");
    if !filter.allows(protocol) {
        return Err(DecodeError::ProtocolDisabled(protocol));
    }
    let _counter = payload[4];
    let messages = split_messages(&payload[AD_HEADER_SIZE..1 + ad_len])?;
    Ok(DecodedFrame {
        protocol,
        transport,
        messages,
    })
}

/// WiFi beacon framing: 802.11 management header, fixed beacon fields, then
/// information elements. Remote ID rides in a vendor-specific IE with the
/// ASTM OUI.
fn decode_wifi_beacon(
    payload: &[u8],
    filter: &ProtocolFilter,
) -> Result<DecodedFrame, DecodeError> {
    if payload.len() < MGMT_HEADER_SIZE + BEACON_FIXED_SIZE {
        return Err(DecodeError::Truncated);
    }
    let fc = u16::from_le_bytes([payload[0], payload[1]]);
    if fc & FC_TYPE_MASK != FC_TYPE_MGMT {
        return Err(DecodeError::Framing("not an 802.11 management frame"));
    }
    let subtype = fc & FC_SUBTYPE_MASK;
    if subtype != FC_SUBTYPE_BEACON
        && subtype != FC_SUBTYPE_PROBE_RESP
        && subtype != FC_SUBTYPE_ACTION
    {
        return Err(DecodeError::Framing("unexpected management frame subtype"));
    }

    let elements = &payload[MGMT_HEADER_SIZE + BEACON_FIXED_SIZE..];
    let data = find_vendor_element(elements).ok_or(DecodeError::NotRemoteId)?;
    if !filter.allows(Protocol::AstmF3411) {
        return Err(DecodeError::ProtocolDisabled(Protocol::AstmF3411));
    }
    let messages = split_messages(data)?;
    Ok(DecodedFrame {
        protocol: Protocol::AstmF3411,
        transport: Transport::WifiBeacon,
        messages,
    })
}

/// Walk the IE list looking for the Remote ID vendor-specific element and
/// return its payload (after OUI and vendor type).
fn find_vendor_element(elements: &[u8]) -> Option<&[u8]> {
    let mut offset = 0;
    while offset + 2 <= elements.len() {
        let id = elements[offset];
        let len = elements[offset + 1] as usize;
        if offset + 2 + len > elements.len() {
            break;
        }
        let body = &elements[offset + 2..offset + 2 + len];
        if id == IE_VENDOR_SPECIFIC
            && body.len() > 4
            && body[..3] == VENDOR_OUI
            && body[3] == VENDOR_TYPE
        {
            return Some(&body[4..]);
        }
        offset += 2 + len;
    }
    None
}

/// WiFi NAN framing: the 6-byte Remote ID service identifier followed by
/// ASTM messages. Some stacks hand over the service descriptor body instead,
/// so the ASTM OUI marker is accepted as a fallback.
fn decode_wifi_nan(
    payload: &[u8],
    filter: &ProtocolFilter,
) -> Result<DecodedFrame, DecodeError> {
    if payload.len() < NAN_SERVICE_ID.len() + MESSAGE_SIZE {
        return Err(DecodeError::Truncated);
    }

    let start = payload
        .windows(NAN_SERVICE_ID.len())
        .position(|w| w == NAN_SERVICE_ID)
        .map(|i| i + NAN_SERVICE_ID.len())
        .or_else(|| {
            payload
                .windows(4)
                .position(|w| w[..3] == VENDOR_OUI && w[3] == VENDOR_TYPE)
                .map(|i| i + 4)
        })
        .ok_or(DecodeError::NotRemoteId)?;

    if !filter.allows(Protocol::AstmF3411) {
        return Err(DecodeError::ProtocolDisabled(Protocol::AstmF3411));
    }
    let messages = split_messages(&payload[start..])?;
    Ok(DecodedFrame {
        protocol: Protocol::AstmF3411,
        transport: Transport::WifiNan,
        messages,
    })
}

/// Split service data into ASTM messages: either one 25-byte message, or a
/// message pack (header with type nibble 0xF, a sub-message size byte that
/// must be 25, a count byte, then the packed messages).
///
/// Unknown message types are skipped, never fatal: one unrecognized
/// sub-message does not invalidate an otherwise valid pack. A pack nested
/// inside a pack counts as unknown.
fn split_messages(data: &[u8]) -> Result<Vec<Message>, DecodeError> {
    if data.len() < MESSAGE_SIZE {
        return Err(DecodeError::Schema(format!(
            "{} bytes left for a {MESSAGE_SIZE}-byte message",
            data.len()
        )));
    }
    let mut messages = Vec::new();
    if data[0] >> 4 == MESSAGE_PACK_TYPE {
        let msg_size = data[1] as usize;
        let msg_count = data[2] as usize;
        if msg_size != MESSAGE_SIZE {
            return Err(DecodeError::Schema(format!(
                "unexpected pack sub-message size {msg_size}"
            )));
        }
        let mut offset = 3;
        for _ in 0..msg_count {
            if offset + MESSAGE_SIZE > data.len() {
                break;
            }
            push_message(&data[offset..offset + MESSAGE_SIZE], &mut messages);
            offset += MESSAGE_SIZE;
        }
    } else {
        push_message(&data[..MESSAGE_SIZE], &mut messages);
    }
    if messages.is_empty() {
        Err(DecodeError::NoMessage)
    } else {
        Ok(messages)
    }
}

fn push_message(chunk: &[u8], messages: &mut Vec<Message>) {
    use deku::DekuContainerRead;
    match Message::from_bytes((chunk, 0)) {
        Ok((_, Message::Unknown)) => {
            trace!("skipping message with unknown type {:#x}", chunk[0] >> 4)
        }
        Ok((_, msg)) => messages.push(msg),
        Err(e) => debug!("undecodable message: {e}"),
    }
}
