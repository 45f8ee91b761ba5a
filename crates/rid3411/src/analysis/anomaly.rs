use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};

use serde::Serialize;
use tracing::debug;

use super::haversine_distance;
use crate::decode::msg::location::Location;
use crate::registry::Uav;

#[derive(Debug, PartialEq, Eq, Serialize, Copy, Clone, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Implied or reported speed beyond what an airframe can do
    SpeedImpossible,
    /// Position moved impossibly far between two samples
    PositionJump,
    /// Altitude changing faster than physics allows
    AltitudeSpike,
    /// The same payload heard repeatedly within a short window
    ReplayAttack,
}

#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Copy, Clone,
)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub uav_id: String,
    pub description: &'static str,
    /// The threshold that was crossed
    pub expected: f64,
    /// The observed value
    pub actual: f64,
    pub confidence: f64,
    pub detected_at_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct AnomalyConfig {
    /// m/s, ~540 km/h
    pub max_horizontal_speed: f64,
    /// m/s
    pub max_vertical_speed: f64,
    /// m/s^2
    pub max_acceleration: f64,
    /// metres
    pub max_position_jump_m: f64,
    pub replay_window_ms: u64,
    pub min_duplicate_count: usize,
    /// Samples further apart than this are not compared
    pub max_gap_ms: u64,
    pub max_history: usize,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            max_horizontal_speed: 150.0,
            max_vertical_speed: 50.0,
            max_acceleration: 30.0,
            max_position_jump_m: 1000.0,
            replay_window_ms: 5000,
            min_duplicate_count: 3,
            max_gap_ms: 10_000,
            max_history: 100,
        }
    }
}

#[derive(Debug, Default)]
struct History {
    positions: VecDeque<Location>,
    timestamps: VecDeque<u64>,
    hashes: VecDeque<u64>,
}

impl History {
    fn push(&mut self, location: Location, now_ms: u64, hash: u64, max: usize) {
        self.positions.push_back(location);
        self.timestamps.push_back(now_ms);
        self.hashes.push_back(hash);
        while self.positions.len() > max {
            self.positions.pop_front();
            self.timestamps.pop_front();
            self.hashes.pop_front();
        }
    }
}

/// Physical-plausibility and replay checks over successive snapshots of the
/// same aircraft. Feed it every merged record; it keeps its own bounded
/// history per UAS ID.
#[derive(Debug, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
    history: HashMap<String, History>,
    counts: HashMap<AnomalyKind, usize>,
    total: usize,
}

impl AnomalyDetector {
    pub fn new() -> Self {
        Self::with_config(AnomalyConfig::default())
    }

    pub fn with_config(config: AnomalyConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Check one snapshot against the accumulated history for its id and
    /// record it. Returns every anomaly raised by this sample.
    pub fn analyze(&mut self, uav: &Uav, now_ms: u64) -> Vec<Anomaly> {
        let mut anomalies = Vec::new();
        if uav.id.is_empty() {
            return anomalies;
        }

        let hash = payload_hash(uav);
        let history = self.history.entry(uav.id.clone()).or_default();

        if let Some(replay) =
            check_replay(&self.config, history, &uav.id, hash, now_ms)
        {
            anomalies.push(replay);
        }

        if let (Some(current), Some(previous), Some(&prev_ms)) =
            (&uav.location, history.positions.back(), history.timestamps.back())
        {
            let delta_ms = now_ms.saturating_sub(prev_ms);
            if delta_ms > 0 && delta_ms < self.config.max_gap_ms {
                let delta_s = delta_ms as f64 / 1000.0;
                anomalies.extend(check_motion(
                    &self.config,
                    &uav.id,
                    current,
                    previous,
                    delta_s,
                    now_ms,
                ));
            }
        }

        // Only samples carrying a position enter the history: a Basic ID
        // heard alone neither compares nor accumulates.
        if let Some(location) = &uav.location {
            history.push(location.clone(), now_ms, hash, self.config.max_history);
        }

        for anomaly in &anomalies {
            debug!(
                "anomaly {:?} for {}: {}",
                anomaly.kind, anomaly.uav_id, anomaly.description
            );
            *self.counts.entry(anomaly.kind).or_default() += 1;
            self.total += 1;
        }
        anomalies
    }

    pub fn total_anomalies(&self) -> usize {
        self.total
    }

    pub fn count(&self, kind: AnomalyKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.counts.clear();
        self.total = 0;
    }

    pub fn clear_uav(&mut self, uav_id: &str) {
        self.history.remove(uav_id);
    }
}

fn check_replay(
    config: &AnomalyConfig,
    history: &History,
    uav_id: &str,
    hash: u64,
    now_ms: u64,
) -> Option<Anomaly> {
    let duplicates = history
        .hashes
        .iter()
        .zip(&history.timestamps)
        .filter(|(h, ts)| {
            **h == hash && now_ms.saturating_sub(**ts) < config.replay_window_ms
        })
        .count();
    if duplicates < config.min_duplicate_count {
        return None;
    }
    Some(Anomaly {
        kind: AnomalyKind::ReplayAttack,
        severity: Severity::Critical,
        uav_id: uav_id.to_string(),
        description: "identical payload heard repeatedly",
        expected: 0.0,
        actual: duplicates as f64,
        confidence: (duplicates as f64 / 10.0).min(1.0),
        detected_at_ms: now_ms,
    })
}

fn check_motion(
    config: &AnomalyConfig,
    uav_id: &str,
    current: &Location,
    previous: &Location,
    delta_s: f64,
    now_ms: u64,
) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    let distance = haversine_distance(
        previous.latitude,
        previous.longitude,
        current.latitude,
        current.longitude,
    );
    let implied_speed = distance / delta_s;

    if implied_speed > config.max_horizontal_speed {
        anomalies.push(Anomaly {
            kind: AnomalyKind::SpeedImpossible,
            severity: if implied_speed > config.max_horizontal_speed * 2.0 {
                Severity::Critical
            } else {
                Severity::Warning
            },
            uav_id: uav_id.to_string(),
            description: "implied horizontal speed beyond physical limits",
            expected: config.max_horizontal_speed,
            actual: implied_speed,
            confidence: (implied_speed / (config.max_horizontal_speed * 3.0))
                .min(1.0),
            detected_at_ms: now_ms,
        });
    }

    let climb_rate =
        (current.altitude_geo - previous.altitude_geo).abs() as f64 / delta_s;
    if climb_rate > config.max_vertical_speed {
        anomalies.push(Anomaly {
            kind: AnomalyKind::AltitudeSpike,
            severity: if climb_rate > config.max_vertical_speed * 2.0 {
                Severity::Critical
            } else {
                Severity::Warning
            },
            uav_id: uav_id.to_string(),
            description: "implied vertical speed beyond physical limits",
            expected: config.max_vertical_speed,
            actual: climb_rate,
            confidence: (climb_rate / (config.max_vertical_speed * 3.0))
                .min(1.0),
            detected_at_ms: now_ms,
        });
    }

    // Reported speeds (NaN when unknown, which fails the comparison)
    let acceleration = (current.speed_horizontal - previous.speed_horizontal)
        .abs() as f64
        / delta_s;
    if current.speed_horizontal >= 0.0
        && previous.speed_horizontal >= 0.0
        && acceleration > config.max_acceleration
    {
        anomalies.push(Anomaly {
            kind: AnomalyKind::SpeedImpossible,
            severity: Severity::Warning,
            uav_id: uav_id.to_string(),
            description: "reported acceleration beyond reasonable limits",
            expected: config.max_acceleration,
            actual: acceleration,
            confidence: (acceleration / (config.max_acceleration * 2.0))
                .min(1.0),
            detected_at_ms: now_ms,
        });
    }

    let max_possible = config.max_horizontal_speed * delta_s;
    if distance > config.max_position_jump_m && distance > max_possible * 1.5 {
        anomalies.push(Anomaly {
            kind: AnomalyKind::PositionJump,
            severity: Severity::Critical,
            uav_id: uav_id.to_string(),
            description: "position jumped impossibly far",
            expected: max_possible,
            actual: distance,
            confidence: (distance / (max_possible * 3.0)).min(1.0),
            detected_at_ms: now_ms,
        });
    }

    anomalies
}

/// Hash of the fields a replayed payload would repeat verbatim.
fn payload_hash(uav: &Uav) -> u64 {
    let mut hasher = DefaultHasher::new();
    uav.id.hash(&mut hasher);
    if let Some(location) = &uav.location {
        location.latitude.to_bits().hash(&mut hasher);
        location.longitude.to_bits().hash(&mut hasher);
        location.altitude_geo.to_bits().hash(&mut hasher);
        location.speed_horizontal.to_bits().hash(&mut hasher);
        location.timestamp_offset.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use deku::DekuContainerRead;

    use crate::decode::msg::Message;

    fn uav_at(lat: f64, lon: f64, alt: f32) -> Uav {
        let mut bytes = [0u8; 25];
        bytes[0] = 0x12;
        bytes[3] = 40; // 10 m/s reported
        bytes[5..9].copy_from_slice(&((lat * 1e7) as i32).to_le_bytes());
        bytes[9..13].copy_from_slice(&((lon * 1e7) as i32).to_le_bytes());
        let alt_enc = ((alt + 1000.0) * 2.0) as u16;
        bytes[15..17].copy_from_slice(&alt_enc.to_le_bytes());
        let location = match Message::from_bytes((&bytes, 0)).unwrap().1 {
            Message::Location(loc) => loc,
            _ => unreachable!(),
        };
        Uav {
            id: "DRONE1".to_string(),
            location: Some(location),
            ..Uav::default()
        }
    }

    #[test]
    fn test_steady_flight_is_clean() {
        let mut detector = AnomalyDetector::new();
        for i in 0..10u64 {
            let lon = 8.0 + i as f64 * 0.0001; // ~7.6 m/s eastwards
            let anomalies =
                detector.analyze(&uav_at(47.0, lon, 50.0), i * 1000);
            assert!(anomalies.is_empty(), "unexpected {anomalies:?}");
        }
        assert_eq!(detector.total_anomalies(), 0);
    }

    #[test]
    fn test_teleport_is_flagged() {
        let mut detector = AnomalyDetector::new();
        detector.analyze(&uav_at(47.0, 8.0, 50.0), 0);
        // ~111 km in one second
        let anomalies = detector.analyze(&uav_at(48.0, 8.0, 50.0), 1000);

        assert!(anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::PositionJump
                && a.severity == Severity::Critical));
        assert!(anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::SpeedImpossible));
        assert_eq!(detector.count(AnomalyKind::PositionJump), 1);
    }

    #[test]
    fn test_altitude_spike() {
        let mut detector = AnomalyDetector::new();
        detector.analyze(&uav_at(47.0, 8.0, 0.0), 0);
        let anomalies = detector.analyze(&uav_at(47.0, 8.0001, 200.0), 1000);
        assert!(anomalies
            .iter()
            .any(|a| a.kind == AnomalyKind::AltitudeSpike
                && a.severity == Severity::Critical));
    }

    #[test]
    fn test_replay_detection() {
        let mut detector = AnomalyDetector::new();
        let uav = uav_at(47.0, 8.0, 50.0);
        let mut flagged = false;
        for i in 0..5u64 {
            let anomalies = detector.analyze(&uav, i * 100);
            flagged |= anomalies
                .iter()
                .any(|a| a.kind == AnomalyKind::ReplayAttack);
        }
        assert!(flagged);
        assert!(detector.count(AnomalyKind::ReplayAttack) >= 1);
    }

    #[test]
    fn test_long_gap_not_compared() {
        let mut detector = AnomalyDetector::new();
        detector.analyze(&uav_at(47.0, 8.0, 50.0), 0);
        // same teleport distance, but 60 s later: no motion verdict
        let anomalies = detector.analyze(&uav_at(48.0, 8.0, 50.0), 60_000);
        assert!(anomalies.is_empty());
    }

    #[test]
    fn test_clear_resets_counts() {
        let mut detector = AnomalyDetector::new();
        detector.analyze(&uav_at(47.0, 8.0, 50.0), 0);
        detector.analyze(&uav_at(48.0, 8.0, 50.0), 1000);
        assert!(detector.total_anomalies() > 0);
        detector.clear();
        assert_eq!(detector.total_anomalies(), 0);
        assert_eq!(detector.count(AnomalyKind::PositionJump), 0);
    }
}
