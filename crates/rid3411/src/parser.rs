use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::decode::asd;
use crate::decode::{self, DecodeError, Protocol, ProtocolFilter, Transport};
use crate::registry::notify::EventNotifier;
use crate::registry::{Event, Uav, UavRegistry};

/// Tuning knobs for [`RemoteIdParser`]. The defaults suit a handheld scanner
/// listening to ASTM traffic.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Entries not heard for longer than this are removed by `cleanup()`
    pub uav_timeout_ms: u64,
    /// Merge fragments per aircraft instead of overwriting the record
    pub enable_deduplication: bool,
    pub enable_astm: bool,
    pub enable_asd: bool,
    pub enable_cn: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            uav_timeout_ms: 30_000,
            enable_deduplication: true,
            enable_astm: true,
            enable_asd: false,
            enable_cn: false,
        }
    }
}

impl ParserConfig {
    fn filter(&self) -> ProtocolFilter {
        ProtocolFilter {
            astm: self.enable_astm,
            asd: self.enable_asd,
            cn: self.enable_cn,
        }
    }
}

/// Outcome of feeding one advertisement to the parser.
///
/// Failures never surface as `Err` or as panics: whatever happened on the
/// air ends up described here.
#[derive(Debug, Clone, Serialize)]
pub struct ParseResult {
    /// The payload decoded and, when it carried an id, reached the registry
    pub success: bool,
    /// Whether the payload matched Remote ID framing at all. False means
    /// some unrelated beacon wandered into the capture.
    pub is_remote_id: bool,
    pub protocol: Protocol,
    pub error: Option<String>,
    /// Snapshot of the merged record, detached from the registry
    pub uav: Option<Uav>,
}

impl ParseResult {
    fn failure(error: DecodeError) -> Self {
        let protocol = match error {
            DecodeError::ProtocolDisabled(protocol) => protocol,
            _ => Protocol::Unknown,
        };
        Self {
            success: false,
            is_remote_id: error.is_remote_id(),
            protocol,
            error: Some(error.to_string()),
            uav: None,
        }
    }
}

/**
 * The front door: raw advertisement bytes in, registry state and lifecycle
 * events out.
 *
 * ```rust,no_run
 * use rid3411::prelude::*;
 *
 * let mut parser = RemoteIdParser::default();
 * # let (payload, rssi) = (vec![0u8], -60i8);
 * let result = parser.parse(&payload, rssi, Transport::BtLegacy);
 * ```
 *
 * Every method takes `&mut self`, so access from several threads goes
 * through whatever lock the host already uses; instances share nothing with
 * each other. Observers receive a snapshot and cannot re-enter the parser,
 * the exclusive borrow rules that out at compile time.
 *
 * Time is monotonic milliseconds. `parse` and `cleanup` read the parser's
 * own clock; hosts that buffer captures or replay recordings supply their
 * own timestamps through `parse_at` and `cleanup_at`.
 */
pub struct RemoteIdParser {
    config: ParserConfig,
    registry: UavRegistry,
    notifier: EventNotifier,
    epoch: Instant,
}

impl Default for RemoteIdParser {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl RemoteIdParser {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            config,
            registry: UavRegistry::new(config.enable_deduplication),
            notifier: EventNotifier::default(),
            epoch: Instant::now(),
        }
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Decode one advertisement and merge it into the registry, stamping it
    /// with the parser's own clock.
    pub fn parse(
        &mut self,
        payload: &[u8],
        rssi: i8,
        transport: Transport,
    ) -> ParseResult {
        self.parse_at(payload, rssi, transport, self.now_ms())
    }

    /// Like [`RemoteIdParser::parse`] with a caller-supplied timestamp.
    pub fn parse_at(
        &mut self,
        payload: &[u8],
        rssi: i8,
        transport: Transport,
        now_ms: u64,
    ) -> ParseResult {
        let frame =
            match decode::decode(payload, transport, &self.config.filter()) {
                Ok(frame) => frame,
                Err(error) => return ParseResult::failure(error),
            };

        let mut fragment = Uav {
            protocol: frame.protocol,
            transport: frame.transport,
            rssi,
            ..Uav::default()
        };
        for message in &frame.messages {
            fragment.absorb(message);
        }

        if frame.protocol == Protocol::AsdStan {
            if let Some(operator) = &fragment.operator_id {
                if !asd::validate_eu_operator_id(&operator.id) {
                    debug!(
                        "operator id {:?} does not match the EU format",
                        operator.id
                    );
                }
            }
        }

        // A fragment without a Basic ID identifies no aircraft: decoding
        // succeeded but there is nothing to register yet.
        if fragment.id.is_empty() {
            return ParseResult {
                success: true,
                is_remote_id: true,
                protocol: frame.protocol,
                error: None,
                uav: Some(fragment),
            };
        }

        let (snapshot, event) = self.registry.merge(fragment, now_ms);
        let error = self.notifier.notify(event, &snapshot);
        ParseResult {
            success: true,
            is_remote_id: true,
            protocol: frame.protocol,
            error,
            uav: Some(snapshot),
        }
    }

    /// Remove entries not heard within the configured timeout and emit a
    /// timeout event for each. Returns how many were removed.
    pub fn cleanup(&mut self) -> usize {
        self.cleanup_at(self.now_ms())
    }

    /// Like [`RemoteIdParser::cleanup`] with a caller-supplied timestamp.
    pub fn cleanup_at(&mut self, now_ms: u64) -> usize {
        let reaped = self.registry.reap(now_ms, self.config.uav_timeout_ms);
        for uav in &reaped {
            self.notifier.notify(Event::Timeout, uav);
        }
        reaped.len()
    }

    pub fn active_count(&self) -> usize {
        self.registry.len()
    }

    /// Snapshot of every tracked aircraft, most recently heard first.
    pub fn active_uavs(&self) -> Vec<Uav> {
        self.registry.list_active()
    }

    /// Snapshot of one aircraft by UAS ID.
    pub fn uav(&self, id: &str) -> Option<Uav> {
        self.registry.get(id).cloned()
    }

    /// Forget every aircraft, silently.
    pub fn clear(&mut self) {
        self.registry.clear();
    }

    pub fn set_on_new(
        &mut self,
        observer: impl FnMut(&Uav) + Send + 'static,
    ) {
        self.notifier.set(Event::New, Box::new(observer));
    }

    pub fn set_on_update(
        &mut self,
        observer: impl FnMut(&Uav) + Send + 'static,
    ) {
        self.notifier.set(Event::Update, Box::new(observer));
    }

    pub fn set_on_timeout(
        &mut self,
        observer: impl FnMut(&Uav) + Send + 'static,
    ) {
        self.notifier.set(Event::Timeout, Box::new(observer));
    }
}
