use deku::prelude::*;
use serde::Serialize;

use super::text_read;

/**
 * ## Operator ID message (type 4)
 *
 * Registration number of the operator, as assigned by the competent
 * authority (in the EU, the ASD-STAN registration format).
 *
 * | Version | IdType | OperatorId | Reserved |
 * | ------- | ------ | ---------- | -------- |
 * | 4 bits  | 1 byte | 20 bytes   | 3 bytes  |
 */
#[derive(Debug, PartialEq, DekuRead, Serialize, Clone)]
pub struct OperatorId {
    #[deku(bits = "4")]
    #[serde(skip)]
    pub protocol_version: u8,

    /// 0 is the CAA-assigned registration, the rest reserved
    pub id_type: u8,

    #[deku(reader = "text_read(deku::reader, 20)")]
    pub id: String,
}
