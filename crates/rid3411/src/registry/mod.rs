pub mod notify;

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::decode::msg::basic_id::{UavIdType, UavType};
use crate::decode::msg::location::Location;
use crate::decode::msg::operator_id::OperatorId;
use crate::decode::msg::self_id::SelfId;
use crate::decode::msg::system::SystemInfo;
use crate::decode::msg::Message;
use crate::decode::{Protocol, Transport};

/// Lifecycle of a registry entry. `Timeout` is only ever produced by an
/// explicit cleanup pass, never as a side effect of a lookup.
#[derive(Debug, PartialEq, Eq, Serialize, Copy, Clone)]
#[serde(rename_all = "snake_case")]
pub enum Event {
    New,
    Update,
    Timeout,
}

/**
 * The aggregate state of one aircraft, merged from however many message
 * fragments have been heard so far.
 *
 * Sub-records are `None` until the corresponding message type arrives and
 * never revert to `None` while the entry lives: a Basic ID heard after ten
 * Location messages completes the record, it does not erase the track.
 */
#[derive(Debug, PartialEq, Serialize, Clone, Default)]
pub struct Uav {
    /// UAS ID from the Basic ID message, the registry key
    pub id: String,
    pub id_type: UavIdType,
    pub uav_type: UavType,
    pub protocol: Protocol,
    pub transport: Transport,
    /// Signal strength of the latest fragment, dBm
    pub rssi: i8,
    /// Milliseconds on the caller's clock when last heard
    pub last_seen: u64,
    pub location: Option<Location>,
    pub system: Option<SystemInfo>,
    pub self_id: Option<SelfId>,
    pub operator_id: Option<OperatorId>,
    /// Fragments merged into this record, 1 at creation
    pub message_count: u32,
}

impl Uav {
    /// Fold one decoded message into the record. The id only comes from
    /// Basic ID; everything else fills a sub-record.
    pub fn absorb(&mut self, message: &Message) {
        match message {
            Message::BasicId(basic) => {
                self.id = basic.id.clone();
                self.id_type = basic.id_type;
                self.uav_type = basic.uav_type;
            }
            Message::Location(location) => {
                self.location = Some(location.clone())
            }
            Message::System(system) => self.system = Some(system.clone()),
            Message::SelfId(self_id) => self.self_id = Some(self_id.clone()),
            Message::OperatorId(operator_id) => {
                self.operator_id = Some(operator_id.clone())
            }
            Message::Unknown => {}
        }
    }
}

/// In-memory registry of the aircraft currently heard, keyed by UAS ID.
///
/// Nothing ages out implicitly: entries live until [`UavRegistry::reap`] or
/// [`UavRegistry::clear`] removes them.
#[derive(Debug, Default)]
pub struct UavRegistry {
    uavs: HashMap<String, Uav>,
    deduplicate: bool,
}

impl UavRegistry {
    pub fn new(deduplicate: bool) -> Self {
        Self {
            uavs: HashMap::new(),
            deduplicate,
        }
    }

    /// Merge a decoded fragment into the registry and return the resulting
    /// record together with the lifecycle event it triggered.
    ///
    /// An unseen id inserts a fresh entry (`Event::New`). A known id either
    /// merges selectively (deduplication on: present sub-records overwrite,
    /// absent ones leave the accumulated state alone) or replaces the record
    /// wholesale (deduplication off), both `Event::Update`. Either way the
    /// message count grows by one and `last_seen` never moves backwards.
    pub fn merge(&mut self, mut fragment: Uav, now_ms: u64) -> (Uav, Event) {
        fragment.last_seen = now_ms;
        match self.uavs.get_mut(&fragment.id) {
            None => {
                fragment.message_count = 1;
                debug!("new aircraft {}", fragment.id);
                let snapshot = fragment.clone();
                self.uavs.insert(fragment.id.clone(), fragment);
                (snapshot, Event::New)
            }
            Some(existing) if self.deduplicate => {
                if fragment.id_type != UavIdType::None {
                    existing.id_type = fragment.id_type;
                    existing.uav_type = fragment.uav_type;
                }
                if let Some(location) = fragment.location {
                    existing.location = Some(location);
                }
                if let Some(system) = fragment.system {
                    existing.system = Some(system);
                }
                if let Some(self_id) = fragment.self_id {
                    existing.self_id = Some(self_id);
                }
                if let Some(operator_id) = fragment.operator_id {
                    existing.operator_id = Some(operator_id);
                }
                existing.protocol = fragment.protocol;
                existing.transport = fragment.transport;
                existing.rssi = fragment.rssi;
                existing.last_seen = existing.last_seen.max(now_ms);
                existing.message_count += 1;
                (existing.clone(), Event::Update)
            }
            Some(existing) => {
                fragment.message_count = existing.message_count + 1;
                fragment.last_seen = existing.last_seen.max(now_ms);
                *existing = fragment;
                (existing.clone(), Event::Update)
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Uav> {
        self.uavs.get(id)
    }

    pub fn len(&self) -> usize {
        self.uavs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uavs.is_empty()
    }

    /// Snapshot of every entry, most recently heard first.
    pub fn list_active(&self) -> Vec<Uav> {
        let mut uavs: Vec<Uav> = self.uavs.values().cloned().collect();
        uavs.sort_by(|a, b| b.last_seen.cmp(&a.last_seen));
        uavs
    }

    /// Remove and return every entry not heard for strictly more than
    /// `timeout_ms`. An entry heard exactly `timeout_ms` ago survives.
    pub fn reap(&mut self, now_ms: u64, timeout_ms: u64) -> Vec<Uav> {
        let mut reaped = Vec::new();
        self.uavs.retain(|_, uav| {
            let stale = now_ms.saturating_sub(uav.last_seen) > timeout_ms;
            if stale {
                debug!("aircraft {} timed out", uav.id);
                reaped.push(uav.clone());
            }
            !stale
        });
        reaped
    }

    /// Drop every entry without emitting any event.
    pub fn clear(&mut self) {
        self.uavs.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(id: &str) -> Uav {
        Uav {
            id: id.to_string(),
            id_type: UavIdType::SerialNumber,
            uav_type: UavType::Helicopter,
            rssi: -60,
            ..Uav::default()
        }
    }

    fn location() -> Location {
        use deku::DekuContainerRead;
        let mut bytes = [0u8; 25];
        bytes[0] = 0x12;
        bytes[5..9].copy_from_slice(&473977418i32.to_le_bytes());
        match Message::from_bytes((&bytes, 0)).unwrap().1 {
            Message::Location(loc) => loc,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_new_then_update() {
        let mut registry = UavRegistry::new(true);
        let (uav, event) = registry.merge(fragment("DRONE1"), 1000);
        assert_eq!(event, Event::New);
        assert_eq!(uav.message_count, 1);
        assert_eq!(uav.last_seen, 1000);

        let (uav, event) = registry.merge(fragment("DRONE1"), 2000);
        assert_eq!(event, Event::Update);
        assert_eq!(uav.message_count, 2);
        assert_eq!(uav.last_seen, 2000);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_selective_merge_keeps_sub_records() {
        let mut registry = UavRegistry::new(true);
        let mut with_location = fragment("DRONE1");
        with_location.location = Some(location());
        registry.merge(with_location, 1000);

        // A later fragment without location must not erase the track
        let (uav, _) = registry.merge(fragment("DRONE1"), 2000);
        assert!(uav.location.is_some());
        assert_eq!(uav.rssi, -60);
    }

    #[test]
    fn test_overwrite_mode_carries_count() {
        let mut registry = UavRegistry::new(false);
        let mut with_location = fragment("DRONE1");
        with_location.location = Some(location());
        registry.merge(with_location, 1000);

        let (uav, event) = registry.merge(fragment("DRONE1"), 2000);
        assert_eq!(event, Event::Update);
        // Wholesale replacement: the location is gone, the count is not
        assert!(uav.location.is_none());
        assert_eq!(uav.message_count, 2);
    }

    #[test]
    fn test_last_seen_never_decreases() {
        let mut registry = UavRegistry::new(true);
        registry.merge(fragment("DRONE1"), 5000);
        let (uav, _) = registry.merge(fragment("DRONE1"), 3000);
        assert_eq!(uav.last_seen, 5000);
    }

    #[test]
    fn test_reap_boundary() {
        let mut registry = UavRegistry::new(true);
        registry.merge(fragment("OLD"), 0);
        registry.merge(fragment("EDGE"), 10_000);
        registry.merge(fragment("FRESH"), 35_000);

        let reaped = registry.reap(40_000, 30_000);
        assert_eq!(reaped.len(), 1);
        assert_eq!(reaped[0].id, "OLD");
        // exactly timeout_ms old survives
        assert!(registry.get("EDGE").is_some());
        assert!(registry.get("FRESH").is_some());
    }

    #[test]
    fn test_ordering_most_recent_first() {
        let mut registry = UavRegistry::new(true);
        registry.merge(fragment("A"), 1000);
        registry.merge(fragment("B"), 3000);
        registry.merge(fragment("C"), 2000);

        let active = registry.list_active();
        let ids: Vec<&str> = active.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["B", "C", "A"]);
    }

    #[test]
    fn test_clear() {
        let mut registry = UavRegistry::new(true);
        registry.merge(fragment("A"), 1000);
        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.get("A").is_none());
    }
}
