//! Mission-level statistics and live performance gauges.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::rules::bounded_step;
use crate::store::{EntityStore, SwarmStats, VictimTally};
use crate::timeline::EventCategory;

/// Routine events the metrics tick may log.
pub const ROUTINE_EVENTS: [(&str, EventCategory); 5] = [
    ("Victim Movement Detected", EventCategory::Detection),
    ("Drone Battery Warning", EventCategory::Warning),
    ("New Hazard Identified", EventCategory::Hazard),
    ("Team Position Updated", EventCategory::Update),
    ("Communication Check", EventCategory::Communication),
];

const ROUTINE_EVENT_CHANCE: f64 = 0.3;
const AREA_STEP_PCT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissionStats {
    pub area_scanned_pct: f64,
    pub area_pending_pct: f64,
    pub avg_response_min: f64,
    pub rescue_time_min: f64,
    pub efficiency_pct: f64,
}

impl Default for MissionStats {
    fn default() -> Self {
        Self {
            area_scanned_pct: 75.0,
            area_pending_pct: 25.0,
            avg_response_min: 8.5,
            rescue_time_min: 12.3,
            efficiency_pct: 87.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LiveGauges {
    pub drone_speed_mps: f64,
    pub area_per_minute_km2: f64,
    pub detection_rate_per_min: f64,
    pub communication_signal_pct: f64,
}

impl Default for LiveGauges {
    fn default() -> Self {
        Self {
            drone_speed_mps: 15.2,
            area_per_minute_km2: 2.3,
            detection_rate_per_min: 0.8,
            communication_signal_pct: 92.0,
        }
    }
}

/// One metrics-tick draw.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MetricsDelta {
    pub response: f64,
    pub efficiency: f64,
    pub drone_speed: f64,
    pub area_per_minute: f64,
    pub detection_rate: f64,
    pub communication_signal: f64,
    /// Index into [`ROUTINE_EVENTS`] when a routine event fires
    pub routine_event: Option<usize>,
}

impl MetricsDelta {
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        let routine_event = rng
            .random_bool(ROUTINE_EVENT_CHANCE)
            .then(|| rng.random_range(0..ROUTINE_EVENTS.len()));
        Self {
            response: rng.random_range(-0.1..=0.1),
            efficiency: rng.random_range(-1.0..=1.0),
            drone_speed: rng.random_range(-1.0..=1.0),
            area_per_minute: rng.random_range(-0.25..=0.25),
            detection_rate: rng.random_range(-0.05..=0.05),
            communication_signal: rng.random_range(-2.5..=2.5),
            routine_event,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionMetrics {
    pub stats: MissionStats,
    pub gauges: LiveGauges,
}

impl MissionMetrics {
    /// Apply one delta. Non-finite components leave their field unchanged.
    /// Returns the routine event to log, if any.
    pub fn advance(&mut self, delta: &MetricsDelta) -> Option<(&'static str, EventCategory)> {
        let stats = &mut self.stats;
        stats.area_scanned_pct = (stats.area_scanned_pct + AREA_STEP_PCT).min(100.0);
        stats.area_pending_pct = (stats.area_pending_pct - AREA_STEP_PCT).max(0.0);
        stats.avg_response_min = step(stats.avg_response_min, delta.response, 0.0, f64::MAX);
        stats.efficiency_pct = step(stats.efficiency_pct, delta.efficiency, 75.0, 100.0);

        let gauges = &mut self.gauges;
        gauges.drone_speed_mps = step(gauges.drone_speed_mps, delta.drone_speed, 10.0, 25.0);
        gauges.area_per_minute_km2 = step(gauges.area_per_minute_km2, delta.area_per_minute, 1.0, 5.0);
        gauges.detection_rate_per_min =
            step(gauges.detection_rate_per_min, delta.detection_rate, 0.3, 1.5);
        gauges.communication_signal_pct =
            step(gauges.communication_signal_pct, delta.communication_signal, 70.0, 100.0);

        delta
            .routine_event
            .and_then(|index| ROUTINE_EVENTS.get(index).copied())
    }
}

fn step(old: f64, delta: f64, lo: f64, hi: f64) -> f64 {
    let next = bounded_step(old, delta, lo, hi);
    if next.is_finite() {
        next
    } else {
        old
    }
}

/// Everything the analytics panel shows, in one read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub stats: MissionStats,
    pub gauges: LiveGauges,
    pub swarm: SwarmStats,
    pub victims: VictimTally,
    pub mission_elapsed_secs: i64,
}

impl MetricsSnapshot {
    pub fn collect(metrics: &MissionMetrics, store: &EntityStore, mission_elapsed_secs: i64) -> Self {
        Self {
            stats: metrics.stats,
            gauges: metrics.gauges,
            swarm: store.swarm_stats(),
            victims: store.victim_tally(),
            mission_elapsed_secs: mission_elapsed_secs.max(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn area_converges_and_saturates() {
        let mut metrics = MissionMetrics::default();
        for _ in 0..60 {
            metrics.advance(&MetricsDelta::default());
        }
        assert_eq!(metrics.stats.area_scanned_pct, 100.0);
        assert_eq!(metrics.stats.area_pending_pct, 0.0);
    }

    #[test]
    fn sampled_drift_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut metrics = MissionMetrics::default();
        for _ in 0..1_000 {
            metrics.advance(&MetricsDelta::sample(&mut rng));
        }
        let stats = metrics.stats;
        let gauges = metrics.gauges;
        assert!((75.0..=100.0).contains(&stats.efficiency_pct));
        assert!(stats.avg_response_min >= 0.0);
        assert!((10.0..=25.0).contains(&gauges.drone_speed_mps));
        assert!((1.0..=5.0).contains(&gauges.area_per_minute_km2));
        assert!((0.3..=1.5).contains(&gauges.detection_rate_per_min));
        assert!((70.0..=100.0).contains(&gauges.communication_signal_pct));
    }

    #[test]
    fn routine_event_is_reported() {
        let mut metrics = MissionMetrics::default();
        let delta = MetricsDelta {
            routine_event: Some(4),
            ..MetricsDelta::default()
        };
        assert_eq!(
            metrics.advance(&delta),
            Some(("Communication Check", EventCategory::Communication))
        );
    }

    #[test]
    fn non_finite_delta_keeps_previous_value() {
        let mut metrics = MissionMetrics::default();
        let delta = MetricsDelta {
            efficiency: f64::NAN,
            ..MetricsDelta::default()
        };
        metrics.advance(&delta);
        assert_eq!(metrics.stats.efficiency_pct, 87.0);
    }
}
