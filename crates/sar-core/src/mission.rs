//! Mission aggregate: the single owner of the operation picture.
//!
//! Ticks and operator commands both go through [`Mission`], so a host only
//! needs one lock around it to keep them from interleaving.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::alerts::{AlertFeed, AlertSeverity};
use crate::clock::TickKind;
use crate::error::{CommandError, TickFault};
use crate::metrics::{MetricsDelta, MetricsSnapshot, MissionMetrics};
use crate::models::{
    Drone, DroneStatus, EntityKind, RescueStatus, RescueTeam, TeamStatus, Topic, Victim,
};
use crate::rules::{
    SimulationConfig, DEPLOY_ALTITUDE_M, DEPLOY_MIN_BATTERY_PCT, DEPLOY_SPEED_MPS,
    ETA_SECS_PER_WORLD_UNIT, RECALL_SPEED_MPS,
};
use crate::seed;
use crate::simulation::{
    self, CollectionTick, PositionDelta, TelemetryDelta, VitalsDelta,
};
use crate::store::EntityStore;
use crate::timeline::{EventCategory, EventTimeline};
use crate::viewport::MapLayers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    Applied,
    /// Already in the requested state; nothing was written
    Unchanged,
}

/// What one tick did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub kind: TickKind,
    pub updated: usize,
    pub skipped: usize,
    pub faults: Vec<TickFault>,
    pub alerts_raised: Vec<u64>,
    pub events_appended: usize,
    /// Collections whose published snapshot changed
    pub touched: Vec<Topic>,
}

impl TickReport {
    fn new(kind: TickKind) -> Self {
        Self {
            kind,
            updated: 0,
            skipped: 0,
            faults: Vec::new(),
            alerts_raised: Vec::new(),
            events_appended: 0,
            touched: Vec::new(),
        }
    }

    fn with_collection(kind: TickKind, tick: CollectionTick, topic: Topic) -> Self {
        let mut report = Self::new(kind);
        report.updated = tick.updated;
        report.skipped = tick.skipped;
        report.faults = tick.faults;
        if report.updated > 0 {
            report.touched.push(topic);
        }
        report
    }

    fn touch(&mut self, topic: Topic) {
        if !self.touched.contains(&topic) {
            self.touched.push(topic);
        }
    }
}

#[derive(Debug)]
pub struct Mission {
    store: EntityStore,
    alerts: AlertFeed,
    timeline: EventTimeline,
    metrics: MissionMetrics,
    layers: MapLayers,
    rng: StdRng,
    started_at: DateTime<Utc>,
    config: SimulationConfig,
}

impl Mission {
    /// An empty mission.
    pub fn new(config: SimulationConfig, now: DateTime<Utc>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            store: EntityStore::new(),
            alerts: AlertFeed::new(config.alert_page_size, config.alert_capacity),
            timeline: EventTimeline::new(config.timeline_capacity),
            metrics: MissionMetrics::default(),
            layers: MapLayers::default(),
            rng,
            started_at: now,
            config,
        }
    }

    /// A mission loaded with the initial operation picture.
    pub fn seeded(config: SimulationConfig, now: DateTime<Utc>) -> Self {
        let mut mission = Self::new(config, now);
        mission.store = seed::entities(now);
        seed::alerts(&mut mission.alerts, now);
        seed::timeline(&mut mission.timeline);
        mission
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn alerts(&self) -> &AlertFeed {
        &self.alerts
    }

    /// View settings (filter, search, paging) only; alert content changes
    /// go through [`Mission::dismiss_alert`] and ticks.
    pub fn alerts_mut(&mut self) -> &mut AlertFeed {
        &mut self.alerts
    }

    pub fn timeline(&self) -> &EventTimeline {
        &self.timeline
    }

    pub fn metrics(&self) -> &MissionMetrics {
        &self.metrics
    }

    pub fn layers(&self) -> &MapLayers {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut MapLayers {
        &mut self.layers
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn metrics_snapshot(&self, now: DateTime<Utc>) -> MetricsSnapshot {
        let elapsed = (now - self.started_at).num_seconds();
        MetricsSnapshot::collect(&self.metrics, &self.store, elapsed)
    }

    // ========== TICKS ==========

    /// Run one tick, drawing deltas from the mission RNG.
    pub fn run_tick(&mut self, kind: TickKind, now: DateTime<Utc>) -> TickReport {
        let rng = &mut self.rng;
        match kind {
            TickKind::DroneTelemetry => {
                let tick =
                    simulation::tick_drone_telemetry(&mut self.store, |_| TelemetryDelta::sample(&mut *rng));
                self.telemetry_report(tick, now)
            }
            TickKind::DronePosition => {
                let tick =
                    simulation::tick_drone_positions(&mut self.store, |_| PositionDelta::sample(&mut *rng));
                TickReport::with_collection(kind, tick, Topic::Drones)
            }
            TickKind::VictimVitals => {
                let tick =
                    simulation::tick_victim_vitals(&mut self.store, |_| VitalsDelta::sample(&mut *rng));
                TickReport::with_collection(kind, tick, Topic::Victims)
            }
            TickKind::MissionMetrics => {
                let delta = MetricsDelta::sample(rng);
                self.metrics_with(&delta, now)
            }
            TickKind::AlertRotation => {
                let mut report = TickReport::new(kind);
                if self.alerts.rotate() {
                    report.touch(Topic::Alerts);
                }
                report
            }
        }
    }

    /// Drone telemetry tick with caller-supplied deltas.
    pub fn drone_telemetry_with<F>(&mut self, now: DateTime<Utc>, sample: F) -> TickReport
    where
        F: FnMut(&Drone) -> TelemetryDelta,
    {
        let tick = simulation::tick_drone_telemetry(&mut self.store, sample);
        self.telemetry_report(tick, now)
    }

    /// Metrics tick with a caller-supplied delta.
    pub fn metrics_with(&mut self, delta: &MetricsDelta, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::new(TickKind::MissionMetrics);
        let event = self.metrics.advance(delta);
        report.updated = 1;
        report.touch(Topic::Metrics);
        if let Some((description, category)) = event {
            self.timeline.record(now, description, category);
            report.events_appended += 1;
            report.touch(Topic::Timeline);
        }
        report
    }

    /// Raise threshold alerts for drones that just went low or offline.
    fn telemetry_report(&mut self, mut tick: CollectionTick, now: DateTime<Utc>) -> TickReport {
        let transitions = std::mem::take(&mut tick.transitions);
        let mut report = TickReport::with_collection(TickKind::DroneTelemetry, tick, Topic::Drones);

        for transition in transitions {
            let (message, event) = match transition.to {
                DroneStatus::LowBattery => (
                    format!(
                        "Drone {} Battery Critical ({:.0}%)",
                        transition.drone_id, transition.battery
                    ),
                    format!("{} Battery Warning", transition.drone_id),
                ),
                DroneStatus::Offline => (
                    format!("Communication Lost with {}", transition.drone_id),
                    format!("{} Offline", transition.drone_id),
                ),
                _ => continue,
            };
            report
                .alerts_raised
                .push(self.alerts.raise(AlertSeverity::Critical, message, now));
            self.timeline.record(now, event, EventCategory::Warning);
            report.events_appended += 1;
        }

        if !report.alerts_raised.is_empty() {
            report.touch(Topic::Alerts);
            report.touch(Topic::Timeline);
        }
        report
    }

    // ========== COMMANDS ==========

    /// `Offline | Charging` with charge above the deploy floor → `Connected`.
    pub fn deploy_drone(&mut self, id: &str, now: DateTime<Utc>) -> Result<CommandOutcome, CommandError> {
        let drone = self.find_drone(id)?;
        if !drone.status().is_grounded() {
            return Err(CommandError::invalid(
                "deploy",
                id,
                format!("drone is {}", drone.status().label()),
            ));
        }
        if drone.battery() <= DEPLOY_MIN_BATTERY_PCT {
            return Err(CommandError::invalid(
                "deploy",
                id,
                format!("battery {:.0}% is below the deploy floor", drone.battery()),
            ));
        }

        self.store.modify::<Drone, _>(id, |drone| {
            drone.set_commanded_status(DroneStatus::Connected);
            drone.altitude_m = DEPLOY_ALTITUDE_M;
            drone.speed_mps = DEPLOY_SPEED_MPS;
        })?;
        self.timeline
            .record(now, format!("{id} Deployed"), EventCategory::Deployment);
        Ok(CommandOutcome::Applied)
    }

    /// `Connected` → `Returning`.
    pub fn recall_drone(&mut self, id: &str, now: DateTime<Utc>) -> Result<CommandOutcome, CommandError> {
        let drone = self.find_drone(id)?;
        if drone.status() != DroneStatus::Connected {
            return Err(CommandError::invalid(
                "recall",
                id,
                format!("drone is {}", drone.status().label()),
            ));
        }

        self.store.modify::<Drone, _>(id, |drone| {
            drone.set_commanded_status(DroneStatus::Returning);
            drone.speed_mps = RECALL_SPEED_MPS;
        })?;
        self.timeline
            .record(now, format!("{id} Recalled"), EventCategory::Update);
        Ok(CommandOutcome::Applied)
    }

    /// Send a team to a pending victim. Repeating an assignment that is
    /// already in place is a no-op.
    pub fn assign_team(
        &mut self,
        victim_id: &str,
        team_id: &str,
        now: DateTime<Utc>,
    ) -> Result<CommandOutcome, CommandError> {
        let victim = self
            .store
            .find::<Victim>(victim_id)
            .ok_or_else(|| not_found(EntityKind::Victim, victim_id))?;
        let team = self
            .store
            .find::<RescueTeam>(team_id)
            .ok_or_else(|| not_found(EntityKind::RescueTeam, team_id))?;

        if victim.rescue_status == RescueStatus::InProgress
            && victim.assigned_team.as_deref() == Some(team_id)
            && team.assigned_victim.as_deref() == Some(victim_id)
        {
            return Ok(CommandOutcome::Unchanged);
        }
        if victim.rescue_status != RescueStatus::Pending {
            return Err(CommandError::invalid(
                "assign",
                victim_id,
                format!("victim is {}", victim.rescue_status.label()),
            ));
        }
        if !team.status.is_assignable() {
            return Err(CommandError::invalid(
                "assign",
                team_id,
                format!("team is {}", team.status.label()),
            ));
        }

        let eta = (team.position.distance(&victim.position) * ETA_SECS_PER_WORLD_UNIT).round();
        let eta_secs = if eta.is_finite() { Some(eta as u32) } else { None };

        // A returning team may still name a victim it never reached. That
        // victim goes back to the pending queue. Rescued victims keep the
        // team that brought them out.
        let stale = team
            .assigned_victim
            .as_deref()
            .filter(|previous| *previous != victim_id)
            .and_then(|previous| self.store.find::<Victim>(previous))
            .filter(|previous| {
                previous.assigned_team.as_deref() == Some(team_id)
                    && previous.rescue_status == RescueStatus::InProgress
            })
            .map(|previous| previous.id.clone());

        if let Some(previous) = &stale {
            self.store.modify::<Victim, _>(previous, |victim| {
                victim.rescue_status = RescueStatus::Pending;
                victim.assigned_team = None;
            })?;
        }
        self.store.modify::<Victim, _>(victim_id, |victim| {
            victim.rescue_status = RescueStatus::InProgress;
            victim.assigned_team = Some(team_id.to_string());
        })?;
        self.store.modify::<RescueTeam, _>(team_id, |team| {
            team.set_status(TeamStatus::EnRoute, now);
            team.assigned_victim = Some(victim_id.to_string());
            team.eta_secs = eta_secs;
            team.log(now, format!("Dispatched to {victim_id}"));
        })?;

        self.timeline
            .record(now, format!("{team_id} Deployed"), EventCategory::Deployment);
        self.alerts.raise(
            AlertSeverity::Info,
            format!("Rescue Team {team_id} En Route"),
            now,
        );
        Ok(CommandOutcome::Applied)
    }

    pub fn dismiss_alert(&mut self, id: u64) -> CommandOutcome {
        if self.alerts.dismiss(id) {
            CommandOutcome::Applied
        } else {
            CommandOutcome::Unchanged
        }
    }

    fn find_drone(&self, id: &str) -> Result<&Drone, CommandError> {
        self.store
            .find::<Drone>(id)
            .ok_or_else(|| not_found(EntityKind::Drone, id))
    }
}

fn not_found(kind: EntityKind, id: &str) -> CommandError {
    CommandError::NotFound {
        kind,
        id: id.to_string(),
    }
}
