//! Thresholds, field bounds and simulation tuning for the SAR core.

use serde::{Deserialize, Serialize};

use crate::models::{DroneHealth, DroneStatus};

/// Lower edge of the normalized world, in percent.
pub const WORLD_MIN: f64 = 0.0;
/// Upper edge of the normalized world, in percent.
pub const WORLD_MAX: f64 = 100.0;
/// Drones wander inside this margin so markers never sit on the map border.
pub const MAP_MARGIN: f64 = 5.0;

pub const BATTERY_MIN: f64 = 0.0;
pub const BATTERY_MAX: f64 = 100.0;
pub const SIGNAL_MIN: f64 = 0.0;
pub const SIGNAL_MAX: f64 = 100.0;
pub const SPEED_MIN_MPS: f64 = 0.0;
pub const SPEED_MAX_MPS: f64 = 25.0;
pub const HEART_RATE_MIN: f64 = 0.0;
pub const HEART_RATE_MAX: f64 = 120.0;
/// Detection confidence never drifts below the model's acceptance floor.
pub const CONFIDENCE_MIN: f64 = 70.0;
pub const CONFIDENCE_MAX: f64 = 99.0;
pub const PRIORITY_MIN: u8 = 1;
pub const PRIORITY_MAX: u8 = 4;

/// Below this charge a drone reports `LowBattery` and `Critical` health.
pub const LOW_BATTERY_PCT: f64 = 15.0;
/// Below this charge (and at or above `LOW_BATTERY_PCT`) health is `Warning`.
pub const WARNING_BATTERY_PCT: f64 = 30.0;
/// Minimum charge required to deploy a grounded drone.
pub const DEPLOY_MIN_BATTERY_PCT: f64 = 20.0;
/// Panels flag "low power" under this charge.
pub const LOW_POWER_FLAG_PCT: f64 = 20.0;

pub const DEPLOY_ALTITUDE_M: f64 = 100.0;
pub const DEPLOY_SPEED_MPS: f64 = 15.0;
pub const RECALL_SPEED_MPS: f64 = 20.0;

/// Team ETA estimate, seconds per world unit of straight-line distance.
pub const ETA_SECS_PER_WORLD_UNIT: f64 = 6.0;
/// Messages kept per rescue team, oldest dropped first.
pub const TEAM_LOG_CAPACITY: usize = 5;

/// Derive a drone's status from its charge.
///
/// `Charging` and `Returning` are only ever set by operator commands and
/// survive any battery level; every other status follows the charge.
pub fn derive_status(battery: f64, current: DroneStatus) -> DroneStatus {
    match current {
        DroneStatus::Charging | DroneStatus::Returning => current,
        _ if battery <= BATTERY_MIN => DroneStatus::Offline,
        _ if battery < LOW_BATTERY_PCT => DroneStatus::LowBattery,
        _ => DroneStatus::Connected,
    }
}

/// Derive a drone's health classification from charge and link status.
pub fn derive_health(battery: f64, status: DroneStatus) -> DroneHealth {
    if status == DroneStatus::Offline {
        DroneHealth::Offline
    } else if battery >= WARNING_BATTERY_PCT {
        DroneHealth::Good
    } else if battery >= LOW_BATTERY_PCT {
        DroneHealth::Warning
    } else {
        DroneHealth::Critical
    }
}

/// `clamp(old + delta, lo, hi)`. A non-finite input propagates as NaN.
pub fn bounded_step(old: f64, delta: f64, lo: f64, hi: f64) -> f64 {
    let next = old + delta;
    if next.is_nan() {
        return next;
    }
    next.clamp(lo, hi)
}

/// Configuration for the simulation and its derived views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Battery / signal / speed jitter cadence
    pub drone_telemetry_interval_ms: u64,
    /// Map position jitter cadence
    pub drone_position_interval_ms: u64,
    /// Victim vitals / confidence jitter cadence
    pub victim_vitals_interval_ms: u64,
    /// Mission aggregate metrics cadence
    pub metrics_interval_ms: u64,
    /// Alert page rotation cadence
    pub alert_rotation_interval_ms: u64,
    pub alert_page_size: usize,
    /// Alerts kept before the oldest is evicted
    pub alert_capacity: usize,
    pub timeline_capacity: usize,
    pub zoom: ZoomBounds,
    /// Fixed RNG seed; `None` seeds from the OS
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            drone_telemetry_interval_ms: 2_000,
            drone_position_interval_ms: 3_000,
            victim_vitals_interval_ms: 3_000,
            metrics_interval_ms: 3_000,
            alert_rotation_interval_ms: 5_000,
            alert_page_size: 3,
            alert_capacity: 64,
            timeline_capacity: 8,
            zoom: ZoomBounds::default(),
            seed: None,
        }
    }
}

/// Zoom limits in percent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomBounds {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl Default for ZoomBounds {
    fn default() -> Self {
        Self {
            min: 25.0,
            max: 400.0,
            step: 25.0,
        }
    }
}

impl ZoomBounds {
    /// Repair inverted or non-positive bounds instead of rejecting them.
    pub fn normalized(self) -> Self {
        let min = if self.min.is_finite() && self.min > 0.0 { self.min } else { 25.0 };
        let max = if self.max.is_finite() { self.max.max(min) } else { min.max(400.0) };
        let step = if self.step.is_finite() && self.step > 0.0 { self.step } else { 25.0 };
        Self { min, max, step }
    }

    pub fn clamp(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return 100.0_f64.clamp(self.min, self.max);
        }
        zoom.clamp(self.min, self.max)
    }
}
