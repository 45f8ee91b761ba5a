use deku::prelude::*;
use serde::Serialize;

use super::text_read;

/**
 * ## Self-ID message (type 2)
 *
 * Free-text description of the operation, meant for display to people on
 * the ground ("survey flight", "powerline inspection").
 *
 * | Version | DescriptionType | Description |
 * | ------- | --------------- | ----------- |
 * | 4 bits  | 1 byte          | 23 bytes    |
 */
#[derive(Debug, PartialEq, DekuRead, Serialize, Clone)]
pub struct SelfId {
    #[deku(bits = "4")]
    #[serde(skip)]
    pub protocol_version: u8,

    /// 0 is free text, 1 an emergency declaration, the rest reserved
    pub description_type: u8,

    #[deku(reader = "text_read(deku::reader, 23)")]
    pub description: String,
}
