//! Core data models for the SAR operation picture.
//!
//! All positions are percentages of a normalized 0–100 world, never pixels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::rules::{self, BATTERY_MAX, BATTERY_MIN, TEAM_LOG_CAPACITY};

/// A point in world (percent) or screen space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Axis-aligned rectangle anchored at its top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn contains(&self, point: &Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

// ========== DRONES ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneStatus {
    /// Airborne with a healthy link
    Connected,
    LowBattery,
    /// Docked; set by operators only
    Charging,
    /// Battery exhausted or link lost
    Offline,
    /// Recalled to base; set by operators only
    Returning,
}

impl DroneStatus {
    pub fn label(self) -> &'static str {
        match self {
            DroneStatus::Connected => "Connected",
            DroneStatus::LowBattery => "Low Battery",
            DroneStatus::Charging => "Charging",
            DroneStatus::Offline => "Offline",
            DroneStatus::Returning => "Returning",
        }
    }

    /// Grounded drones receive no simulated telemetry drift.
    pub fn is_grounded(self) -> bool {
        matches!(self, DroneStatus::Offline | DroneStatus::Charging)
    }

    /// Counted as deployed in the swarm overview.
    pub fn is_airborne(self) -> bool {
        matches!(
            self,
            DroneStatus::Connected | DroneStatus::LowBattery | DroneStatus::Returning
        )
    }
}

impl fmt::Display for DroneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneHealth {
    Good,
    Warning,
    Critical,
    Offline,
}

/// A tracked drone.
///
/// Status and health are derived from the battery level and cannot be set
/// directly; every battery write re-derives both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Drone {
    pub id: String,
    status: DroneStatus,
    health: DroneHealth,
    battery: f64,
    pub signal: f64,
    pub altitude_m: f64,
    pub speed_mps: f64,
    pub position: Point,
}

impl Drone {
    /// Create an airborne drone; status and health follow `battery`. A NaN
    /// charge is read as empty.
    pub fn new(
        id: impl Into<String>,
        battery: f64,
        signal: f64,
        altitude_m: f64,
        speed_mps: f64,
        position: Point,
    ) -> Self {
        let mut drone = Self {
            id: id.into(),
            status: DroneStatus::Connected,
            health: DroneHealth::Good,
            battery: BATTERY_MIN,
            signal,
            altitude_m,
            speed_mps,
            position,
        };
        drone.set_battery(battery);
        drone
    }

    /// Same as [`Drone::new`] but starting from an operator-set status
    /// (e.g. docked drones seeded as `Charging`).
    pub fn with_status(mut self, status: DroneStatus) -> Self {
        self.set_commanded_status(status);
        self
    }

    pub fn status(&self) -> DroneStatus {
        self.status
    }

    pub fn health(&self) -> DroneHealth {
        self.health
    }

    pub fn battery(&self) -> f64 {
        self.battery
    }

    /// Write the charge (clamped to 0–100) and re-derive status and health.
    /// NaN keeps the previous charge.
    pub fn set_battery(&mut self, battery: f64) {
        if !battery.is_nan() {
            self.battery = battery.clamp(BATTERY_MIN, BATTERY_MAX);
        }
        self.rederive();
    }

    /// Apply an operator-issued status, then re-derive so the result still
    /// honours the battery table.
    pub(crate) fn set_commanded_status(&mut self, status: DroneStatus) {
        self.status = status;
        self.rederive();
    }

    /// Below the panel "low power" flag and not docked.
    pub fn low_power(&self) -> bool {
        self.battery < rules::LOW_POWER_FLAG_PCT && self.status != DroneStatus::Charging
    }

    /// Actively scanning the area (airborne with a usable link).
    pub fn is_scanning(&self) -> bool {
        matches!(self.status, DroneStatus::Connected)
    }

    fn rederive(&mut self) {
        self.status = rules::derive_status(self.battery, self.status);
        self.health = rules::derive_health(self.battery, self.status);
    }
}

// ========== VICTIMS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VictimStatus {
    Critical,
    Injured,
    Deceased,
    Stable,
}

impl VictimStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VictimStatus::Critical => "critical",
            VictimStatus::Injured => "injured",
            VictimStatus::Deceased => "deceased",
            VictimStatus::Stable => "stable",
        }
    }
}

impl FromStr for VictimStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(VictimStatus::Critical),
            "injured" => Ok(VictimStatus::Injured),
            "deceased" => Ok(VictimStatus::Deceased),
            "stable" => Ok(VictimStatus::Stable),
            _ => Err(ParseError::unknown("victim status", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RescueStatus {
    Pending,
    InProgress,
    Rescued,
    ConfirmedSafe,
}

impl RescueStatus {
    pub fn label(self) -> &'static str {
        match self {
            RescueStatus::Pending => "Pending",
            RescueStatus::InProgress => "In Progress",
            RescueStatus::Rescued => "Rescued",
            RescueStatus::ConfirmedSafe => "Confirmed Safe",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Breathing {
    Normal,
    Stable,
    Weak,
    Irregular,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vitals {
    pub heart_rate: f64,
    pub breathing: Breathing,
}

/// A victim detected by the drone swarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Victim {
    pub id: String,
    /// Sector label, e.g. "Sector A7"
    pub location: String,
    pub status: VictimStatus,
    pub condition: String,
    /// AI detection confidence, 70–99
    pub confidence: f64,
    pub rescue_status: RescueStatus,
    /// 1 = most urgent; fixed at detection
    pub priority: u8,
    pub vitals: Vitals,
    /// Weak reference to a rescue team id
    pub assigned_team: Option<String>,
    pub detected_at: DateTime<Utc>,
    pub position: Point,
}

impl Victim {
    /// Deceased and rescued victims receive no further vitals drift.
    pub fn is_frozen(&self) -> bool {
        self.status == VictimStatus::Deceased || self.rescue_status == RescueStatus::Rescued
    }

    /// Minutes since detection, never negative.
    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.detected_at).num_minutes().max(0)
    }
}

// ========== HAZARDS / ZONES ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardKind {
    Fire,
    Flood,
    Collapse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HazardSeverity {
    High,
    Medium,
}

/// A hazard identified on the map. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub id: String,
    pub position: Point,
    #[serde(rename = "type")]
    pub kind: HazardKind,
    pub severity: HazardSeverity,
}

/// A static safe zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafeZone {
    pub id: String,
    pub area: Rect,
}

// ========== RESCUE TEAMS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeamStatus {
    Available,
    EnRoute,
    Rescuing,
    Returning,
}

impl TeamStatus {
    pub fn label(self) -> &'static str {
        match self {
            TeamStatus::Available => "Available",
            TeamStatus::EnRoute => "En Route",
            TeamStatus::Rescuing => "Rescuing",
            TeamStatus::Returning => "Returning",
        }
    }

    /// Whether the team may take a new assignment.
    pub fn is_assignable(self) -> bool {
        matches!(self, TeamStatus::Available | TeamStatus::Returning)
    }
}

/// A ground rescue team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RescueTeam {
    pub id: String,
    pub members: u32,
    pub location: String,
    pub position: Point,
    pub status: TeamStatus,
    /// Weak reference to a victim id
    pub assigned_victim: Option<String>,
    pub eta_secs: Option<u32>,
    pub last_update: DateTime<Utc>,
    /// Radio log, oldest first
    pub communications: Vec<TeamMessage>,
}

/// One radio message from a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamMessage {
    pub time: DateTime<Utc>,
    pub message: String,
}

impl RescueTeam {
    /// Append to the radio log and stamp `last_update`.
    pub fn log(&mut self, now: DateTime<Utc>, message: impl Into<String>) {
        self.communications.push(TeamMessage {
            time: now,
            message: message.into(),
        });
        let excess = self.communications.len().saturating_sub(TEAM_LOG_CAPACITY);
        self.communications.drain(..excess);
        self.last_update = now;
    }

    /// Change status, logging the transition. Same status is a no-op.
    pub fn set_status(&mut self, status: TeamStatus, now: DateTime<Utc>) {
        if self.status == status {
            return;
        }
        self.status = status;
        self.log(now, format!("Status: {}", status.label()));
    }
}

// ========== TOPICS ==========

/// Kinds of entity held by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Drone,
    Victim,
    Hazard,
    RescueTeam,
    SafeZone,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Drone => "drone",
            EntityKind::Victim => "victim",
            EntityKind::Hazard => "hazard",
            EntityKind::RescueTeam => "rescue team",
            EntityKind::SafeZone => "safe zone",
        };
        f.write_str(name)
    }
}

/// Independently published collections a presentation surface can follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Drones,
    Victims,
    Hazards,
    Teams,
    SafeZones,
    Alerts,
    Timeline,
    Metrics,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Drones,
        Topic::Victims,
        Topic::Hazards,
        Topic::Teams,
        Topic::SafeZones,
        Topic::Alerts,
        Topic::Timeline,
        Topic::Metrics,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Drones => "drones",
            Topic::Victims => "victims",
            Topic::Hazards => "hazards",
            Topic::Teams => "teams",
            Topic::SafeZones => "safe_zones",
            Topic::Alerts => "alerts",
            Topic::Timeline => "timeline",
            Topic::Metrics => "metrics",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == normalized)
            .ok_or_else(|| ParseError::unknown("topic", s))
    }
}
