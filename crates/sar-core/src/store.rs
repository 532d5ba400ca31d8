//! Canonical entity collections.
//!
//! The store is the single owner of drones, victims, hazards, rescue teams and
//! safe zones. Readers get ordered, immutable slices; writers go through
//! [`EntityStore::apply`] (single entity) or [`EntityStore::commit`]
//! (a whole tick's batch), both of which replace entities atomically.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::StoreError;
use crate::models::{
    Breathing, Drone, DroneStatus, EntityKind, Hazard, Point, RescueStatus, RescueTeam, SafeZone,
    TeamStatus, Victim, VictimStatus,
};
use crate::rules::{
    CONFIDENCE_MAX, CONFIDENCE_MIN, HEART_RATE_MAX, HEART_RATE_MIN, SIGNAL_MAX, SIGNAL_MIN,
    SPEED_MAX_MPS, SPEED_MIN_MPS, WORLD_MAX, WORLD_MIN,
};

/// An entity type owned by the [`EntityStore`].
pub trait Entity: Clone {
    const KIND: EntityKind;

    fn id(&self) -> &str;
    fn collection(store: &EntityStore) -> &Collection<Self>;
    fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self>;
}

/// Insertion-ordered collection keyed by entity id.
#[derive(Debug, Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Entity> Collection<T> {
    /// Insert or replace in place; a new id goes to the end.
    pub fn upsert(&mut self, item: T) {
        match self.index.get(item.id()) {
            Some(&slot) => self.items[slot] = item,
            None => {
                self.index.insert(item.id().to_string(), self.items.len());
                self.items.push(item);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&slot| &self.items[slot])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn replace(&mut self, item: T) -> Result<(), StoreError> {
        let slot = *self.index.get(item.id()).ok_or_else(|| StoreError::NotFound {
            kind: T::KIND,
            id: item.id().to_string(),
        })?;
        self.items[slot] = item;
        Ok(())
    }
}

macro_rules! impl_entity {
    ($ty:ty, $kind:expr, $field:ident) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn collection(store: &EntityStore) -> &Collection<Self> {
                &store.$field
            }

            fn collection_mut(store: &mut EntityStore) -> &mut Collection<Self> {
                &mut store.$field
            }
        }
    };
}

impl_entity!(Drone, EntityKind::Drone, drones);
impl_entity!(Victim, EntityKind::Victim, victims);
impl_entity!(Hazard, EntityKind::Hazard, hazards);
impl_entity!(RescueTeam, EntityKind::RescueTeam, teams);
impl_entity!(SafeZone, EntityKind::SafeZone, safe_zones);

/// Field updates for one drone. Status is never patched directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DronePatch {
    pub battery: Option<f64>,
    pub signal: Option<f64>,
    pub altitude_m: Option<f64>,
    pub speed_mps: Option<f64>,
    pub position: Option<Point>,
}

/// Field updates for one victim. Priority is fixed at detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VictimPatch {
    pub status: Option<VictimStatus>,
    pub confidence: Option<f64>,
    pub heart_rate: Option<f64>,
    pub breathing: Option<Breathing>,
    pub rescue_status: Option<RescueStatus>,
    /// `Some(None)` clears the assignment
    pub assigned_team: Option<Option<String>>,
}

/// Field updates for one rescue team.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TeamPatch {
    pub status: Option<TeamStatus>,
    pub position: Option<Point>,
    pub assigned_victim: Option<Option<String>>,
    pub eta_secs: Option<Option<u32>>,
    /// Stamps the radio log when `status` changes; defaults to the team's
    /// previous `last_update`
    pub observed_at: Option<DateTime<Utc>>,
}

/// A single-entity update; the variant selects the collection.
#[derive(Debug, Clone, PartialEq)]
pub enum Patch {
    Drone(DronePatch),
    Victim(VictimPatch),
    Team(TeamPatch),
}

/// Out-of-range numbers are clipped, never rejected.
fn clip(value: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(lo, hi)
    }
}

fn clip_point(point: Point, fallback: Point) -> Point {
    Point::new(
        clip(point.x, WORLD_MIN, WORLD_MAX, fallback.x),
        clip(point.y, WORLD_MIN, WORLD_MAX, fallback.y),
    )
}

impl DronePatch {
    fn apply_to(&self, drone: &mut Drone) {
        if let Some(signal) = self.signal {
            drone.signal = clip(signal, SIGNAL_MIN, SIGNAL_MAX, drone.signal);
        }
        if let Some(altitude) = self.altitude_m {
            drone.altitude_m = clip(altitude, 0.0, f64::MAX, drone.altitude_m);
        }
        if let Some(speed) = self.speed_mps {
            drone.speed_mps = clip(speed, SPEED_MIN_MPS, SPEED_MAX_MPS, drone.speed_mps);
        }
        if let Some(position) = self.position {
            drone.position = clip_point(position, drone.position);
        }
        if let Some(battery) = self.battery {
            let battery = if battery.is_nan() { drone.battery() } else { battery };
            drone.set_battery(battery);
        }
    }
}

impl VictimPatch {
    fn apply_to(&self, victim: &mut Victim) {
        if let Some(status) = self.status {
            victim.status = status;
        }
        if let Some(confidence) = self.confidence {
            victim.confidence = clip(confidence, CONFIDENCE_MIN, CONFIDENCE_MAX, victim.confidence);
        }
        if let Some(heart_rate) = self.heart_rate {
            victim.vitals.heart_rate =
                clip(heart_rate, HEART_RATE_MIN, HEART_RATE_MAX, victim.vitals.heart_rate);
        }
        if let Some(breathing) = self.breathing {
            victim.vitals.breathing = breathing;
        }
        if let Some(rescue_status) = self.rescue_status {
            victim.rescue_status = rescue_status;
        }
        if let Some(team) = &self.assigned_team {
            victim.assigned_team = team.clone();
        }
    }
}

impl TeamPatch {
    fn apply_to(&self, team: &mut RescueTeam) {
        if let Some(status) = self.status {
            let at = self.observed_at.unwrap_or(team.last_update);
            team.set_status(status, at);
        }
        if let Some(position) = self.position {
            team.position = clip_point(position, team.position);
        }
        if let Some(victim) = &self.assigned_victim {
            team.assigned_victim = victim.clone();
        }
        if let Some(eta) = self.eta_secs {
            team.eta_secs = eta;
        }
    }
}

/// Swarm overview counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SwarmStats {
    pub total: usize,
    pub deployed: usize,
    /// Grounded with enough charge to deploy
    pub available: usize,
    pub charging: usize,
    pub offline: usize,
    pub low_power: usize,
    pub battery_average: f64,
}

/// Victim counters by condition and rescue progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VictimTally {
    pub total: usize,
    pub critical: usize,
    pub injured: usize,
    pub stable: usize,
    pub deceased: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub rescued: usize,
    pub confirmed_safe: usize,
    /// Mean detection confidence; 0 with no victims
    pub avg_confidence: f64,
}

/// Owner of every entity collection.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    drones: Collection<Drone>,
    victims: Collection<Victim>,
    hazards: Collection<Hazard>,
    teams: Collection<RescueTeam>,
    safe_zones: Collection<SafeZone>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current ordered snapshot of one collection.
    pub fn get<T: Entity>(&self) -> &[T] {
        T::collection(self).as_slice()
    }

    pub fn find<T: Entity>(&self, id: &str) -> Option<&T> {
        T::collection(self).get(id)
    }

    pub fn insert<T: Entity>(&mut self, item: T) {
        T::collection_mut(self).upsert(item);
    }

    pub fn drones(&self) -> &[Drone] {
        self.get()
    }

    pub fn victims(&self) -> &[Victim] {
        self.get()
    }

    pub fn hazards(&self) -> &[Hazard] {
        self.get()
    }

    pub fn teams(&self) -> &[RescueTeam] {
        self.get()
    }

    pub fn safe_zones(&self) -> &[SafeZone] {
        self.get()
    }

    /// Update one entity, revalidating derived fields.
    ///
    /// The entity is rebuilt off to the side and swapped in whole, so a
    /// partially patched entity is never observable.
    pub fn apply(&mut self, id: &str, patch: &Patch) -> Result<(), StoreError> {
        match patch {
            Patch::Drone(patch) => self.modify::<Drone, _>(id, |drone| patch.apply_to(drone)),
            Patch::Victim(patch) => self.modify::<Victim, _>(id, |victim| patch.apply_to(victim)),
            Patch::Team(patch) => self.modify::<RescueTeam, _>(id, |team| patch.apply_to(team)),
        }
    }

    /// Clone-modify-swap a single entity.
    pub(crate) fn modify<T, F>(&mut self, id: &str, update: F) -> Result<(), StoreError>
    where
        T: Entity,
        F: FnOnce(&mut T),
    {
        let mut next = self
            .find::<T>(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: T::KIND,
                id: id.to_string(),
            })?;
        update(&mut next);
        T::collection_mut(self).replace(next)
    }

    /// Commit a tick's batch of updated entities in one step.
    ///
    /// Entities whose id is no longer present are dropped. Returns how many
    /// were written.
    pub fn commit<T: Entity>(&mut self, updated: Vec<T>) -> usize {
        let collection = T::collection_mut(self);
        updated
            .into_iter()
            .filter_map(|item| collection.replace(item).ok())
            .count()
    }

    /// Resolve a victim's assigned team; absent teams read as unassigned.
    pub fn team_for_victim(&self, victim_id: &str) -> Option<&RescueTeam> {
        let team_id = self.find::<Victim>(victim_id)?.assigned_team.as_deref()?;
        self.find::<RescueTeam>(team_id)
    }

    /// Resolve a team's assigned victim; absent victims read as unassigned.
    pub fn victim_for_team(&self, team_id: &str) -> Option<&Victim> {
        let victim_id = self.find::<RescueTeam>(team_id)?.assigned_victim.as_deref()?;
        self.find::<Victim>(victim_id)
    }

    pub fn swarm_stats(&self) -> SwarmStats {
        let drones = self.drones();
        let mut stats = SwarmStats {
            total: drones.len(),
            ..SwarmStats::default()
        };
        for drone in drones {
            match drone.status() {
                status if status.is_airborne() => stats.deployed += 1,
                DroneStatus::Charging => stats.charging += 1,
                _ => stats.offline += 1,
            }
            if drone.status().is_grounded()
                && drone.battery() > crate::rules::DEPLOY_MIN_BATTERY_PCT
            {
                stats.available += 1;
            }
            if drone.low_power() {
                stats.low_power += 1;
            }
        }
        if !drones.is_empty() {
            stats.battery_average =
                drones.iter().map(Drone::battery).sum::<f64>() / drones.len() as f64;
        }
        stats
    }

    pub fn victim_tally(&self) -> VictimTally {
        let mut tally = VictimTally::default();
        for victim in self.victims() {
            tally.total += 1;
            match victim.status {
                VictimStatus::Critical => tally.critical += 1,
                VictimStatus::Injured => tally.injured += 1,
                VictimStatus::Stable => tally.stable += 1,
                VictimStatus::Deceased => tally.deceased += 1,
            }
            match victim.rescue_status {
                RescueStatus::Pending => tally.pending += 1,
                RescueStatus::InProgress => tally.in_progress += 1,
                RescueStatus::Rescued => tally.rescued += 1,
                RescueStatus::ConfirmedSafe => tally.confirmed_safe += 1,
            }
            tally.avg_confidence += victim.confidence;
        }
        if tally.total > 0 {
            tally.avg_confidence /= tally.total as f64;
        }
        tally
    }
}
