//! End-of-run summary.

use sar_core::{
    Alert, Drone, MetricsSnapshot, RescueStatus, SeverityFilter, TimelineEvent, VictimStatus,
};
use serde::Serialize;
use std::fmt::{self, Write as _};

use crate::headless::{Headless, TickCount};

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub seed: Option<u64>,
    pub simulated_secs: f64,
    pub ticks: Vec<TickCount>,
    pub faults: Vec<String>,
    pub alerts_raised: usize,
    pub metrics: MetricsSnapshot,
    pub drones: Vec<Drone>,
    pub victims: Vec<VictimLine>,
    /// Active alerts, newest first
    pub alerts: Vec<Alert>,
    pub timeline: Vec<TimelineEvent>,
}

/// One victim as of the end of the run.
#[derive(Debug, Clone, Serialize)]
pub struct VictimLine {
    pub id: String,
    pub status: VictimStatus,
    pub rescue_status: RescueStatus,
    pub assigned_team: Option<String>,
    pub age_minutes: i64,
}

impl Report {
    pub fn collect(run: &Headless, seed: Option<u64>) -> Self {
        let mission = run.mission();
        let timeline = mission.timeline();
        Self {
            seed,
            simulated_secs: run.elapsed_ms() as f64 / 1000.0,
            ticks: run.ticks().to_vec(),
            faults: run.faults().to_vec(),
            alerts_raised: run.alerts_raised(),
            metrics: mission.metrics_snapshot(run.now()),
            drones: mission.store().drones().to_vec(),
            victims: mission
                .store()
                .victims()
                .iter()
                .map(|victim| VictimLine {
                    id: victim.id.clone(),
                    status: victim.status,
                    rescue_status: victim.rescue_status,
                    assigned_team: victim.assigned_team.clone(),
                    age_minutes: victim.age_minutes(run.now()),
                })
                .collect(),
            alerts: mission
                .alerts()
                .visible(SeverityFilter::All)
                .into_iter()
                .cloned()
                .collect(),
            timeline: timeline
                .recent(timeline.capacity())
                .into_iter()
                .cloned()
                .collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_text(&mut out);
        out
    }

    fn write_text(&self, out: &mut String) -> fmt::Result {
        let seed = self
            .seed
            .map_or_else(|| "random".to_string(), |seed| seed.to_string());
        writeln!(out, "=== SAR mission: {:.1}s simulated (seed {seed}) ===", self.simulated_secs)?;

        let ticks: Vec<String> = self
            .ticks
            .iter()
            .map(|count| format!("{}={}", count.kind, count.fired))
            .collect();
        writeln!(out, "Ticks: {}", ticks.join(" "))?;
        if !self.faults.is_empty() {
            writeln!(out, "Faults: {}", self.faults.len())?;
            for fault in &self.faults {
                writeln!(out, "  {fault}")?;
            }
        }

        let stats = &self.metrics.stats;
        let gauges = &self.metrics.gauges;
        writeln!(out)?;
        writeln!(out, "Mission")?;
        writeln!(
            out,
            "  Area scanned {:.0}% (pending {:.0}%), efficiency {:.0}%",
            stats.area_scanned_pct, stats.area_pending_pct, stats.efficiency_pct
        )?;
        writeln!(
            out,
            "  Avg response {:.1} min, rescue time {:.1} min",
            stats.avg_response_min, stats.rescue_time_min
        )?;
        writeln!(
            out,
            "  Drone speed {:.1} m/s, coverage {:.2} km2/min, detections {:.1}/min, signal {:.0}%",
            gauges.drone_speed_mps,
            gauges.area_per_minute_km2,
            gauges.detection_rate_per_min,
            gauges.communication_signal_pct
        )?;

        let swarm = &self.metrics.swarm;
        writeln!(out)?;
        writeln!(
            out,
            "Drones ({} deployed, {} charging, {} offline, avg battery {:.0}%)",
            swarm.deployed, swarm.charging, swarm.offline, swarm.battery_average
        )?;
        for drone in &self.drones {
            writeln!(
                out,
                "  {:<6} {:<12} battery {:>3.0}%  signal {:>3.0}%  ({:.0}, {:.0})",
                drone.id,
                drone.status().label(),
                drone.battery(),
                drone.signal,
                drone.position.x,
                drone.position.y
            )?;
        }

        let victims = &self.metrics.victims;
        writeln!(out)?;
        writeln!(
            out,
            "Victims: {} total, {} critical, {} pending, {} in progress, {} rescued",
            victims.total, victims.critical, victims.pending, victims.in_progress, victims.rescued
        )?;
        writeln!(out, "  Avg detection confidence {:.1}%", victims.avg_confidence)?;
        for victim in &self.victims {
            writeln!(
                out,
                "  {:<6} {:<9} {:<14} {:>3} min ago  {}",
                victim.id,
                victim.status.as_str(),
                victim.rescue_status.label(),
                victim.age_minutes,
                victim.assigned_team.as_deref().unwrap_or("unassigned")
            )?;
        }

        writeln!(out)?;
        writeln!(out, "Alerts ({} active, {} raised this run)", self.alerts.len(), self.alerts_raised)?;
        for alert in &self.alerts {
            writeln!(out, "  [{:<9}] {}", alert.severity.as_str(), alert.message)?;
        }

        writeln!(out)?;
        writeln!(out, "Timeline")?;
        for event in &self.timeline {
            writeln!(out, "  {}  {}", event.time, event.description)?;
        }
        Ok(())
    }
}
