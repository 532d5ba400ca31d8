//! Simulation clock: the single owner of every tick registration.
//!
//! The clock is driven by whatever time source the host has (a tokio loop in
//! the server, a virtual counter in the headless runner). It never sleeps; it
//! only answers which ticks are due at a given millisecond.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::rules::SimulationConfig;

/// Independently scheduled update kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickKind {
    DroneTelemetry,
    DronePosition,
    VictimVitals,
    MissionMetrics,
    AlertRotation,
}

impl fmt::Display for TickKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TickKind::DroneTelemetry => "drone_telemetry",
            TickKind::DronePosition => "drone_position",
            TickKind::VictimVitals => "victim_vitals",
            TickKind::MissionMetrics => "mission_metrics",
            TickKind::AlertRotation => "alert_rotation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockState {
    Running,
    Paused,
    /// Terminal; a stopped clock never fires again
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub kind: TickKind,
    pub interval_ms: u64,
    pub next_due_ms: u64,
    pub fired: u64,
}

/// Clock status for presentation surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockStatus {
    pub state: ClockState,
    pub now_ms: u64,
    /// Time to the nearest due tick; absent unless running
    pub next_tick_in_ms: Option<u64>,
    pub registrations: Vec<Registration>,
}

#[derive(Debug, Clone)]
pub struct SimulationClock {
    registrations: Vec<Registration>,
    state: ClockState,
    now_ms: u64,
}

impl SimulationClock {
    /// Register every tick kind from the config; each first fires one full
    /// interval after `start_ms`.
    pub fn new(config: &SimulationConfig, start_ms: u64) -> Self {
        let intervals = [
            (TickKind::DroneTelemetry, config.drone_telemetry_interval_ms),
            (TickKind::DronePosition, config.drone_position_interval_ms),
            (TickKind::VictimVitals, config.victim_vitals_interval_ms),
            (TickKind::MissionMetrics, config.metrics_interval_ms),
            (TickKind::AlertRotation, config.alert_rotation_interval_ms),
        ];
        let registrations = intervals
            .into_iter()
            .map(|(kind, interval_ms)| {
                let interval_ms = interval_ms.max(1);
                Registration {
                    kind,
                    interval_ms,
                    next_due_ms: start_ms.saturating_add(interval_ms),
                    fired: 0,
                }
            })
            .collect();
        Self {
            registrations,
            state: ClockState::Running,
            now_ms: start_ms,
        }
    }

    pub fn state(&self) -> ClockState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ClockState::Running
    }

    /// Ticks due at `now_ms`, ordered by due time then registration order.
    ///
    /// A tick that fell behind by several intervals fires once; the missed
    /// occurrences are dropped rather than replayed.
    pub fn poll(&mut self, now_ms: u64) -> Vec<TickKind> {
        self.now_ms = self.now_ms.max(now_ms);
        if self.state != ClockState::Running {
            return Vec::new();
        }

        let now = self.now_ms;
        let mut due: Vec<(u64, usize)> = self
            .registrations
            .iter()
            .enumerate()
            .filter(|(_, reg)| reg.next_due_ms <= now)
            .map(|(slot, reg)| (reg.next_due_ms, slot))
            .collect();
        due.sort_unstable();

        due.into_iter()
            .map(|(_, slot)| {
                let reg = &mut self.registrations[slot];
                let behind = (now - reg.next_due_ms) / reg.interval_ms;
                let advance = behind.saturating_add(1).saturating_mul(reg.interval_ms);
                reg.next_due_ms = reg.next_due_ms.saturating_add(advance);
                reg.fired += 1;
                reg.kind
            })
            .collect()
    }

    /// Milliseconds until the next tick is due, `None` unless running.
    pub fn until_next(&self, now_ms: u64) -> Option<u64> {
        if self.state != ClockState::Running {
            return None;
        }
        self.registrations
            .iter()
            .map(|reg| reg.next_due_ms.saturating_sub(now_ms))
            .min()
    }

    /// Halt future ticks. Committed state is untouched.
    pub fn pause(&mut self) -> bool {
        if self.state == ClockState::Running {
            self.state = ClockState::Paused;
            return true;
        }
        false
    }

    /// Resume a paused clock; every tick is rescheduled one interval after
    /// `now_ms`, so nothing missed while paused is replayed.
    pub fn resume(&mut self, now_ms: u64) -> bool {
        if self.state != ClockState::Paused {
            return false;
        }
        self.now_ms = self.now_ms.max(now_ms);
        for reg in &mut self.registrations {
            reg.next_due_ms = self.now_ms.saturating_add(reg.interval_ms);
        }
        self.state = ClockState::Running;
        true
    }

    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
    }

    pub fn status(&self) -> ClockStatus {
        ClockStatus {
            state: self.state,
            now_ms: self.now_ms,
            next_tick_in_ms: self.until_next(self.now_ms),
            registrations: self.registrations.clone(),
        }
    }
}
