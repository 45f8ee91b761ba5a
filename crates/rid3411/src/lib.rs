#![doc = include_str!("../readme.md")]
pub mod analysis;
pub mod decode;
pub mod parser;
pub mod registry;

/// Version of the crate, reported to host applications through bindings.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub mod prelude {
    /// This re-export is necessary to decode messages
    pub use deku::prelude::*;

    pub use crate::decode::msg::basic_id::BasicId;
    pub use crate::decode::msg::location::Location;
    pub use crate::decode::msg::operator_id::OperatorId;
    pub use crate::decode::msg::self_id::SelfId;
    pub use crate::decode::msg::system::SystemInfo;
    /// The tagged union over the five ASTM message kinds
    pub use crate::decode::msg::Message;
    pub use crate::decode::{DecodeError, Protocol, Transport};

    /// The entry point for most applications
    pub use crate::parser::{ParseResult, ParserConfig, RemoteIdParser};
    pub use crate::registry::{Event, Uav, UavRegistry};
}
