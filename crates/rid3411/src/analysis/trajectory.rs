use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use super::{haversine_distance, project_position};
use crate::decode::msg::location::Location;

/// One recorded position sample.
#[derive(Debug, PartialEq, Serialize, Copy, Clone)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f32,
    /// Ground speed reported in the message, m/s, 0 when unknown
    pub speed: f32,
    /// Track direction reported in the message, degrees
    pub heading: f32,
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct TrajectoryConfig {
    pub max_history_points: usize,
    /// Samples closer than this to the previous one are not recorded
    pub min_movement_m: f64,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            max_history_points: 1000,
            min_movement_m: 1.0,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Clone, Default)]
pub struct TrajectoryStats {
    pub total_distance_m: f64,
    pub max_speed_mps: f64,
    pub avg_speed_mps: f64,
    pub min_altitude_m: f32,
    pub max_altitude_m: f32,
    pub duration_ms: u64,
    pub point_count: usize,
}

/// Dead-reckoned future position, with a confidence that decays to zero
/// over a 30 s horizon.
#[derive(Debug, PartialEq, Serialize, Clone)]
pub struct PredictedPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f32,
    pub confidence: f64,
    pub error_radius_m: f64,
}

/// Per-aircraft position history with statistics and prediction.
///
/// Decoupled from the registry on purpose: the host decides which aircraft
/// are worth tracking and feeds snapshots in.
#[derive(Debug, Default)]
pub struct TrajectoryAnalyzer {
    config: TrajectoryConfig,
    tracks: HashMap<String, VecDeque<TrackPoint>>,
}

impl TrajectoryAnalyzer {
    pub fn new() -> Self {
        Self::with_config(TrajectoryConfig::default())
    }

    pub fn with_config(config: TrajectoryConfig) -> Self {
        Self {
            config,
            tracks: HashMap::new(),
        }
    }

    /// Record a position sample for an aircraft. Samples that moved less
    /// than the configured minimum since the last one are dropped.
    pub fn add_position(
        &mut self,
        uav_id: &str,
        location: &Location,
        timestamp_ms: u64,
    ) {
        let point = TrackPoint {
            latitude: location.latitude,
            longitude: location.longitude,
            altitude: location.altitude_geo,
            speed: if location.speed_horizontal.is_nan() {
                0.0
            } else {
                location.speed_horizontal
            },
            heading: location.direction,
            timestamp_ms,
        };

        let track = self.tracks.entry(uav_id.to_string()).or_default();
        if let Some(last) = track.back() {
            let moved = haversine_distance(
                last.latitude,
                last.longitude,
                point.latitude,
                point.longitude,
            );
            if moved < self.config.min_movement_m {
                return;
            }
        }
        track.push_back(point);
        while track.len() > self.config.max_history_points {
            track.pop_front();
        }
    }

    pub fn track(&self, uav_id: &str) -> Option<&VecDeque<TrackPoint>> {
        self.tracks.get(uav_id)
    }

    pub fn active_ids(&self) -> Vec<&str> {
        self.tracks.keys().map(String::as_str).collect()
    }

    pub fn stats(&self, uav_id: &str) -> Option<TrajectoryStats> {
        let track = self.tracks.get(uav_id)?;
        let first = track.front()?;

        let mut stats = TrajectoryStats {
            min_altitude_m: first.altitude,
            max_altitude_m: first.altitude,
            point_count: track.len(),
            ..TrajectoryStats::default()
        };
        for pair in track.iter().zip(track.iter().skip(1)) {
            stats.total_distance_m += haversine_distance(
                pair.0.latitude,
                pair.0.longitude,
                pair.1.latitude,
                pair.1.longitude,
            );
        }
        for point in track {
            stats.max_speed_mps = stats.max_speed_mps.max(point.speed as f64);
            stats.min_altitude_m = stats.min_altitude_m.min(point.altitude);
            stats.max_altitude_m = stats.max_altitude_m.max(point.altitude);
        }
        if let Some(last) = track.back() {
            stats.duration_ms =
                last.timestamp_ms.saturating_sub(first.timestamp_ms);
        }
        if stats.duration_ms > 0 {
            stats.avg_speed_mps =
                stats.total_distance_m / (stats.duration_ms as f64 / 1000.0);
        }
        Some(stats)
    }

    /// Project the last known position forward along its reported speed and
    /// heading. Confidence falls linearly and reaches zero at 30 s out; the
    /// error radius grows with both speed and time.
    pub fn predict(
        &self,
        uav_id: &str,
        horizon_ms: u64,
    ) -> Option<PredictedPosition> {
        let last = self.tracks.get(uav_id)?.back()?;
        let t = horizon_ms as f64 / 1000.0;
        let speed = last.speed as f64;
        let (latitude, longitude) = project_position(
            last.latitude,
            last.longitude,
            last.heading as f64,
            speed * t,
        );
        Some(PredictedPosition {
            latitude,
            longitude,
            altitude: last.altitude,
            confidence: (1.0 - t / 30.0).max(0.0),
            error_radius_m: speed * t * 0.1 + t * 2.0,
        })
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }

    pub fn clear_uav(&mut self, uav_id: &str) {
        self.tracks.remove(uav_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use deku::DekuContainerRead;

    use crate::decode::msg::Message;

    fn location(lat: f64, lon: f64, alt: f32, speed: f32) -> Location {
        let mut bytes = [0u8; 25];
        bytes[0] = 0x12;
        bytes[2] = 90; // heading east
        bytes[3] = (speed * 4.0) as u8;
        bytes[5..9]
            .copy_from_slice(&((lat * 1e7) as i32).to_le_bytes());
        bytes[9..13]
            .copy_from_slice(&((lon * 1e7) as i32).to_le_bytes());
        let alt_enc = ((alt + 1000.0) * 2.0) as u16;
        bytes[15..17].copy_from_slice(&alt_enc.to_le_bytes());
        match Message::from_bytes((&bytes, 0)).unwrap().1 {
            Message::Location(loc) => loc,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_stats_accumulate() {
        let mut analyzer = TrajectoryAnalyzer::new();
        analyzer.add_position("D1", &location(47.0, 8.0, 50.0, 10.0), 0);
        analyzer.add_position("D1", &location(47.0, 8.001, 80.0, 12.0), 5000);
        analyzer.add_position("D1", &location(47.0, 8.002, 60.0, 8.0), 10_000);

        let stats = analyzer.stats("D1").unwrap();
        assert_eq!(stats.point_count, 3);
        assert_eq!(stats.duration_ms, 10_000);
        // two ~75 m hops along the parallel
        assert_relative_eq!(stats.total_distance_m, 151.0, max_relative = 0.02);
        assert_relative_eq!(stats.max_speed_mps, 12.0, epsilon = 1e-6);
        assert_relative_eq!(stats.min_altitude_m, 50.0);
        assert_relative_eq!(stats.max_altitude_m, 80.0);
        assert!(stats.avg_speed_mps > 0.0);
    }

    #[test]
    fn test_stationary_samples_dropped() {
        let mut analyzer = TrajectoryAnalyzer::new();
        for ts in 0..10 {
            analyzer.add_position(
                "D1",
                &location(47.0, 8.0, 50.0, 0.0),
                ts * 1000,
            );
        }
        assert_eq!(analyzer.track("D1").unwrap().len(), 1);
    }

    #[test]
    fn test_history_bounded() {
        let config = TrajectoryConfig {
            max_history_points: 5,
            min_movement_m: 0.0,
        };
        let mut analyzer = TrajectoryAnalyzer::with_config(config);
        for i in 0..20u64 {
            let lon = 8.0 + i as f64 * 0.001;
            analyzer.add_position(
                "D1",
                &location(47.0, lon, 50.0, 10.0),
                i * 1000,
            );
        }
        assert_eq!(analyzer.track("D1").unwrap().len(), 5);
    }

    #[test]
    fn test_prediction_moves_east() {
        let mut analyzer = TrajectoryAnalyzer::new();
        analyzer.add_position("D1", &location(47.0, 8.0, 50.0, 10.0), 0);

        let predicted = analyzer.predict("D1", 10_000).unwrap();
        assert!(predicted.longitude > 8.0);
        assert_relative_eq!(predicted.latitude, 47.0, epsilon = 1e-4);
        // 10 m/s for 10 s eastwards
        let d = haversine_distance(47.0, 8.0, predicted.latitude, predicted.longitude);
        assert_relative_eq!(d, 100.0, max_relative = 0.01);
        assert_relative_eq!(predicted.confidence, 1.0 - 10.0 / 30.0);
        assert!(predicted.error_radius_m > 0.0);
    }

    #[test]
    fn test_prediction_confidence_floor() {
        let mut analyzer = TrajectoryAnalyzer::new();
        analyzer.add_position("D1", &location(47.0, 8.0, 50.0, 10.0), 0);
        let predicted = analyzer.predict("D1", 60_000).unwrap();
        assert_relative_eq!(predicted.confidence, 0.0);
    }

    #[test]
    fn test_unknown_uav() {
        let analyzer = TrajectoryAnalyzer::new();
        assert!(analyzer.stats("NOBODY").is_none());
        assert!(analyzer.predict("NOBODY", 1000).is_none());
    }
}
