//! Bounded random-walk update rules, one per tick kind.
//!
//! Sampling a delta and applying it are separate steps: `*Delta::sample`
//! draws from an RNG, the `advance_*` functions are pure. Each `tick_*`
//! function computes the whole collection's next state from the current
//! snapshot and commits it as one batch.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::TickFault;
use crate::models::{Drone, DroneStatus, EntityKind, Point, Victim};
use crate::rules::{
    bounded_step, CONFIDENCE_MAX, CONFIDENCE_MIN, HEART_RATE_MAX, HEART_RATE_MIN, MAP_MARGIN,
    SIGNAL_MAX, SIGNAL_MIN, SPEED_MAX_MPS, SPEED_MIN_MPS, WORLD_MAX,
};
use crate::store::{Entity, EntityStore};

const SIGNAL_JITTER: f64 = 2.5;
const SPEED_JITTER: f64 = 1.0;
const POSITION_JITTER: f64 = 1.5;
const HEART_RATE_JITTER: f64 = 5.0;
const CONFIDENCE_JITTER: f64 = 1.0;
/// Chance that a drone's battery is considered for drain on a tick.
const DRAIN_CHECK_CHANCE: f64 = 0.3;
/// Chance a considered drone actually loses a percent.
const DRAIN_CHANCE: f64 = 0.5;
const HEART_RATE_CHANGE_CHANCE: f64 = 0.2;

fn symmetric<R: Rng>(rng: &mut R, span: f64) -> f64 {
    rng.random_range(-span..=span)
}

/// Battery, signal and speed deltas for one drone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryDelta {
    pub battery: f64,
    pub signal: f64,
    pub speed: f64,
}

impl TelemetryDelta {
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        let drains = rng.random_bool(DRAIN_CHECK_CHANCE) && rng.random_bool(DRAIN_CHANCE);
        Self {
            battery: if drains { -1.0 } else { 0.0 },
            signal: symmetric(rng, SIGNAL_JITTER),
            speed: symmetric(rng, SPEED_JITTER),
        }
    }
}

/// Map position delta for one drone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionDelta {
    pub dx: f64,
    pub dy: f64,
}

impl PositionDelta {
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        Self {
            dx: symmetric(rng, POSITION_JITTER),
            dy: symmetric(rng, POSITION_JITTER),
        }
    }
}

/// Heart rate and detection confidence deltas for one victim.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalsDelta {
    pub heart_rate: f64,
    pub confidence: f64,
}

impl VitalsDelta {
    pub fn sample<R: Rng>(rng: &mut R) -> Self {
        let heart_rate = if rng.random_bool(HEART_RATE_CHANGE_CHANCE) {
            symmetric(rng, HEART_RATE_JITTER)
        } else {
            0.0
        };
        Self {
            heart_rate,
            confidence: symmetric(rng, CONFIDENCE_JITTER),
        }
    }
}

/// A drone whose status changed during a telemetry tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    pub drone_id: String,
    pub from: DroneStatus,
    pub to: DroneStatus,
    pub battery: f64,
}

/// Result of one collection tick.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionTick {
    pub updated: usize,
    /// Entities in a terminal state
    pub skipped: usize,
    pub faults: Vec<TickFault>,
    pub transitions: Vec<StatusTransition>,
}

fn checked(kind: EntityKind, id: &str, field: &'static str, value: f64) -> Result<f64, TickFault> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(TickFault {
            kind,
            id: id.to_string(),
            field,
        })
    }
}

/// Apply a telemetry delta. `Ok(None)` means the drone is grounded and skipped.
pub fn advance_drone_telemetry(
    drone: &Drone,
    delta: &TelemetryDelta,
) -> Result<Option<Drone>, TickFault> {
    if drone.status().is_grounded() {
        return Ok(None);
    }
    let kind = EntityKind::Drone;
    let battery = checked(kind, &drone.id, "battery", drone.battery() + delta.battery)?;
    let signal = checked(
        kind,
        &drone.id,
        "signal",
        bounded_step(drone.signal, delta.signal, SIGNAL_MIN, SIGNAL_MAX),
    )?;
    let speed = checked(
        kind,
        &drone.id,
        "speed",
        bounded_step(drone.speed_mps, delta.speed, SPEED_MIN_MPS, SPEED_MAX_MPS),
    )?;

    let mut next = drone.clone();
    next.signal = signal;
    next.speed_mps = speed;
    next.set_battery(battery);
    Ok(Some(next))
}

/// Apply a positional delta, keeping the drone inside the map margin.
pub fn advance_drone_position(
    drone: &Drone,
    delta: &PositionDelta,
) -> Result<Option<Drone>, TickFault> {
    if drone.status().is_grounded() {
        return Ok(None);
    }
    let lo = MAP_MARGIN;
    let hi = WORLD_MAX - MAP_MARGIN;
    let x = checked(
        EntityKind::Drone,
        &drone.id,
        "position.x",
        bounded_step(drone.position.x, delta.dx, lo, hi),
    )?;
    let y = checked(
        EntityKind::Drone,
        &drone.id,
        "position.y",
        bounded_step(drone.position.y, delta.dy, lo, hi),
    )?;

    let mut next = drone.clone();
    next.position = Point::new(x, y);
    Ok(Some(next))
}

/// Apply a vitals delta. Frozen victims are skipped.
pub fn advance_victim_vitals(
    victim: &Victim,
    delta: &VitalsDelta,
) -> Result<Option<Victim>, TickFault> {
    if victim.is_frozen() {
        return Ok(None);
    }
    let heart_rate = checked(
        EntityKind::Victim,
        &victim.id,
        "heart_rate",
        bounded_step(victim.vitals.heart_rate, delta.heart_rate, HEART_RATE_MIN, HEART_RATE_MAX),
    )?;
    let confidence = checked(
        EntityKind::Victim,
        &victim.id,
        "confidence",
        bounded_step(victim.confidence, delta.confidence, CONFIDENCE_MIN, CONFIDENCE_MAX),
    )?;

    let mut next = victim.clone();
    next.vitals.heart_rate = heart_rate;
    next.confidence = confidence;
    Ok(Some(next))
}

/// Compute every entity's next state from the snapshot, then commit once.
fn tick_collection<T, S>(store: &mut EntityStore, mut step: S) -> CollectionTick
where
    T: Entity,
    S: FnMut(&T) -> Result<Option<T>, TickFault>,
{
    let mut report = CollectionTick::default();
    let mut batch = Vec::new();
    for entity in store.get::<T>() {
        match step(entity) {
            Ok(Some(next)) => batch.push(next),
            Ok(None) => report.skipped += 1,
            Err(fault) => report.faults.push(fault),
        }
    }
    report.updated = store.commit(batch);
    report
}

/// Battery / signal / speed tick. `sample` supplies each drone's delta.
pub fn tick_drone_telemetry<F>(store: &mut EntityStore, mut sample: F) -> CollectionTick
where
    F: FnMut(&Drone) -> TelemetryDelta,
{
    let before: Vec<(String, DroneStatus)> = store
        .drones()
        .iter()
        .map(|drone| (drone.id.clone(), drone.status()))
        .collect();

    let mut report =
        tick_collection::<Drone, _>(store, |drone| advance_drone_telemetry(drone, &sample(drone)));

    for (id, from) in before {
        if let Some(drone) = store.find::<Drone>(&id) {
            if drone.status() != from {
                report.transitions.push(StatusTransition {
                    drone_id: id,
                    from,
                    to: drone.status(),
                    battery: drone.battery(),
                });
            }
        }
    }
    report
}

/// Map position tick.
pub fn tick_drone_positions<F>(store: &mut EntityStore, mut sample: F) -> CollectionTick
where
    F: FnMut(&Drone) -> PositionDelta,
{
    tick_collection::<Drone, _>(store, |drone| advance_drone_position(drone, &sample(drone)))
}

/// Victim vitals / confidence tick.
pub fn tick_victim_vitals<F>(store: &mut EntityStore, mut sample: F) -> CollectionTick
where
    F: FnMut(&Victim) -> VitalsDelta,
{
    tick_collection::<Victim, _>(store, |victim| advance_victim_vitals(victim, &sample(victim)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        Breathing, DroneHealth, RescueStatus, VictimStatus, Vitals,
    };
    use crate::seed;
    use chrono::Utc;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn drain_to_zero(drone: &Drone) -> TelemetryDelta {
        TelemetryDelta {
            battery: -drone.battery(),
            ..TelemetryDelta::default()
        }
    }

    #[test]
    fn low_battery_drone_drained_to_zero_goes_offline() {
        let mut store = EntityStore::new();
        store.insert(Drone::new("D-003", 8.0, 45.0, 50.0, 8.0, Point::new(65.0, 45.0)));
        assert_eq!(store.drones()[0].health(), DroneHealth::Critical);

        let report = tick_drone_telemetry(&mut store, drain_to_zero);

        let drone = store.find::<Drone>("D-003").unwrap();
        assert_eq!(drone.battery(), 0.0);
        assert_eq!(drone.status(), DroneStatus::Offline);
        assert_eq!(drone.health(), DroneHealth::Offline);
        assert_eq!(
            report.transitions,
            vec![StatusTransition {
                drone_id: "D-003".to_string(),
                from: DroneStatus::LowBattery,
                to: DroneStatus::Offline,
                battery: 0.0,
            }]
        );
    }

    #[test]
    fn grounded_drones_are_skipped() {
        let mut store = EntityStore::new();
        store.insert(Drone::new("D-004", 0.0, 0.0, 0.0, 0.0, Point::new(55.0, 80.0)));
        store.insert(
            Drone::new("D-007", 45.0, 0.0, 0.0, 0.0, Point::new(10.0, 88.0))
                .with_status(DroneStatus::Charging),
        );
        let delta = TelemetryDelta { battery: -1.0, signal: 2.0, speed: 1.0 };
        let report = tick_drone_telemetry(&mut store, |_| delta);
        assert_eq!(report.updated, 0);
        assert_eq!(report.skipped, 2);
        assert_eq!(store.find::<Drone>("D-007").unwrap().battery(), 45.0);

        let report = tick_drone_positions(&mut store, |_| PositionDelta { dx: 1.0, dy: 1.0 });
        assert_eq!(report.skipped, 2);
    }

    #[test]
    fn returning_drone_keeps_status_while_draining() {
        let mut store = EntityStore::new();
        store.insert(
            Drone::new("D-006", 1.0, 89.0, 110.0, 20.0, Point::new(40.0, 20.0))
                .with_status(DroneStatus::Returning),
        );
        tick_drone_telemetry(&mut store, drain_to_zero);
        let drone = store.find::<Drone>("D-006").unwrap();
        assert_eq!(drone.status(), DroneStatus::Returning);
        assert_eq!(drone.battery(), 0.0);
    }

    #[test]
    fn faulty_entity_does_not_block_siblings() {
        let mut store = EntityStore::new();
        store.insert(Drone::new("D-001", 87.0, 95.0, 120.0, 15.0, Point::new(30.0, 35.0)));
        store.insert(Drone::new("D-002", 62.0, 88.0, 85.0, 12.0, Point::new(50.0, 50.0)));

        let report = tick_drone_telemetry(&mut store, |drone| TelemetryDelta {
            battery: if drone.id == "D-001" { f64::NAN } else { -2.0 },
            signal: 0.0,
            speed: 0.0,
        });

        assert_eq!(report.updated, 1);
        assert_eq!(report.faults.len(), 1);
        assert_eq!(report.faults[0].id, "D-001");
        assert_eq!(report.faults[0].field, "battery");
        assert_eq!(store.find::<Drone>("D-001").unwrap().battery(), 87.0);
        assert_eq!(store.find::<Drone>("D-002").unwrap().battery(), 60.0);
    }

    #[test]
    fn positions_stay_inside_margin() {
        let mut store = EntityStore::new();
        store.insert(Drone::new("D-001", 87.0, 95.0, 120.0, 15.0, Point::new(94.5, 5.5)));
        tick_drone_positions(&mut store, |_| PositionDelta { dx: 1.5, dy: -1.5 });
        assert_eq!(store.drones()[0].position, Point::new(95.0, 5.0));
    }

    #[test]
    fn frozen_victims_do_not_drift() {
        let mut store = EntityStore::new();
        let base = Victim {
            id: "V-003".to_string(),
            location: "Sector C1".to_string(),
            status: VictimStatus::Deceased,
            condition: "No Vital Signs".to_string(),
            confidence: 91.0,
            rescue_status: RescueStatus::ConfirmedSafe,
            priority: 3,
            vitals: Vitals { heart_rate: 0.0, breathing: Breathing::None },
            assigned_team: None,
            detected_at: Utc::now(),
            position: Point::new(70.0, 40.0),
        };
        let mut rescued = base.clone();
        rescued.id = "V-005".to_string();
        rescued.status = VictimStatus::Stable;
        rescued.rescue_status = RescueStatus::Rescued;
        rescued.vitals.heart_rate = 82.0;
        let mut alive = base.clone();
        alive.id = "V-001".to_string();
        alive.status = VictimStatus::Critical;
        alive.rescue_status = RescueStatus::Pending;
        alive.vitals.heart_rate = 45.0;
        alive.confidence = 70.5;
        store.insert(base);
        store.insert(rescued);
        store.insert(alive);

        let delta = VitalsDelta { heart_rate: 5.0, confidence: -1.0 };
        let report = tick_victim_vitals(&mut store, |_| delta);

        assert_eq!(report.skipped, 2);
        assert_eq!(store.find::<Victim>("V-003").unwrap().confidence, 91.0);
        assert_eq!(store.find::<Victim>("V-005").unwrap().vitals.heart_rate, 82.0);
        let alive = store.find::<Victim>("V-001").unwrap();
        assert_eq!(alive.vitals.heart_rate, 50.0);
        assert_eq!(alive.confidence, CONFIDENCE_MIN);
    }

    #[test]
    fn sampled_ticks_keep_every_field_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut store = seed::entities(Utc::now());
        for _ in 0..500 {
            tick_drone_telemetry(&mut store, |_| TelemetryDelta::sample(&mut rng));
            tick_drone_positions(&mut store, |_| PositionDelta::sample(&mut rng));
            tick_victim_vitals(&mut store, |_| VitalsDelta::sample(&mut rng));

            for drone in store.drones() {
                assert!((0.0..=100.0).contains(&drone.battery()));
                assert!((SIGNAL_MIN..=SIGNAL_MAX).contains(&drone.signal));
                assert!((SPEED_MIN_MPS..=SPEED_MAX_MPS).contains(&drone.speed_mps));
                assert!((0.0..=100.0).contains(&drone.position.x));
                assert!((0.0..=100.0).contains(&drone.position.y));
                assert_eq!(
                    drone.status(),
                    crate::rules::derive_status(drone.battery(), drone.status())
                );
                assert_eq!(
                    drone.health(),
                    crate::rules::derive_health(drone.battery(), drone.status())
                );
            }
            for victim in store.victims() {
                assert!((CONFIDENCE_MIN..=CONFIDENCE_MAX).contains(&victim.confidence));
                assert!((HEART_RATE_MIN..=HEART_RATE_MAX).contains(&victim.vitals.heart_rate));
            }
        }
    }
}
