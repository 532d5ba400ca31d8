//! Virtual-clock mission runner.
//!
//! Time only moves when `advance` is called, so a seeded run is fully
//! reproducible and finishes as fast as the ticks can be computed.

use chrono::{DateTime, Duration, Utc};
use sar_core::{Mission, SimulationClock, SimulationConfig, TickKind, TickReport};
use serde::Serialize;

use crate::report::Report;

/// How often one tick kind fired during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TickCount {
    pub kind: TickKind,
    pub fired: u64,
}

#[derive(Debug)]
pub struct Headless {
    mission: Mission,
    clock: SimulationClock,
    started_at: DateTime<Utc>,
    elapsed_ms: u64,
    ticks: Vec<TickCount>,
    faults: Vec<String>,
    alerts_raised: usize,
}

impl Headless {
    /// Seeded mission picture, clock at zero.
    pub fn new(config: SimulationConfig, started_at: DateTime<Utc>) -> Self {
        let clock = SimulationClock::new(&config, 0);
        Self {
            mission: Mission::seeded(config, started_at),
            clock,
            started_at,
            elapsed_ms: 0,
            ticks: Vec::new(),
            faults: Vec::new(),
            alerts_raised: 0,
        }
    }

    pub fn mission(&self) -> &Mission {
        &self.mission
    }

    /// Operator commands go through here between advances.
    pub fn mission_mut(&mut self) -> &mut Mission {
        &mut self.mission
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    /// Wall time the mission believes it is.
    pub fn now(&self) -> DateTime<Utc> {
        let offset = i64::try_from(self.elapsed_ms).unwrap_or(i64::MAX);
        self.started_at + Duration::milliseconds(offset)
    }

    pub fn ticks(&self) -> &[TickCount] {
        &self.ticks
    }

    pub fn faults(&self) -> &[String] {
        &self.faults
    }

    /// Move the virtual clock forward by `duration_ms` in `step_ms`
    /// increments, running every tick that falls due. Returns the number of
    /// ticks run.
    pub fn advance(&mut self, duration_ms: u64, step_ms: u64) -> usize {
        let step_ms = step_ms.max(1);
        let target = self.elapsed_ms.saturating_add(duration_ms);
        let mut ran = 0;

        while self.elapsed_ms < target {
            self.elapsed_ms = self.elapsed_ms.saturating_add(step_ms).min(target);
            for kind in self.clock.poll(self.elapsed_ms) {
                let report = self.mission.run_tick(kind, self.now());
                self.record(report);
                ran += 1;
            }
        }
        ran
    }

    fn record(&mut self, report: TickReport) {
        match self.ticks.iter_mut().find(|count| count.kind == report.kind) {
            Some(count) => count.fired += 1,
            None => self.ticks.push(TickCount {
                kind: report.kind,
                fired: 1,
            }),
        }
        for fault in &report.faults {
            tracing::warn!(tick = %report.kind, %fault, "Entity update skipped");
            self.faults.push(fault.to_string());
        }
        self.alerts_raised += report.alerts_raised.len();
        tracing::debug!(
            tick = %report.kind,
            at_ms = self.elapsed_ms,
            updated = report.updated,
            "Tick applied"
        );
    }

    pub fn alerts_raised(&self) -> usize {
        self.alerts_raised
    }

    pub fn report(&self, seed: Option<u64>) -> Report {
        Report::collect(self, seed)
    }
}
