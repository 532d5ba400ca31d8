//! Simulation loop.
//!
//! Polls the simulation clock at a fixed resolution, runs every due tick
//! against the mission and publishes the collections each tick touched.

use chrono::Utc;
use sar_core::TickReport;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::state::AppState;

/// Run all ticks due right now. Each tick holds the mission write lock only
/// while it computes and commits; publishing happens after release.
pub fn step(state: &AppState) -> Vec<TickReport> {
    let due = state.due_ticks();
    let mut reports = Vec::with_capacity(due.len());

    for kind in due {
        let report = state.mission_mut().run_tick(kind, Utc::now());

        for fault in &report.faults {
            tracing::warn!(tick = %kind, %fault, "Entity update skipped");
        }
        if !report.alerts_raised.is_empty() {
            tracing::info!(
                tick = %kind,
                alerts = ?report.alerts_raised,
                "Threshold alerts raised"
            );
        }
        tracing::trace!(
            tick = %kind,
            updated = report.updated,
            skipped = report.skipped,
            "Tick applied"
        );

        state.publish(&report.touched);
        reports.push(report);
    }
    reports
}

pub async fn run_simulation_loop(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) {
    let resolution = Duration::from_millis(state.config().clock_resolution_ms);
    let mut ticker = interval(resolution);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(resolution_ms = resolution.as_millis() as u64, "Simulation loop started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                state.stop();
                tracing::info!("Simulation loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                step(&state);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use sar_core::{ClockState, TickKind, Topic};

    fn state() -> Arc<AppState> {
        let mut config = Config::default();
        config.simulation.seed = Some(42);
        Arc::new(AppState::new(config))
    }

    #[tokio::test(start_paused = true)]
    async fn loop_publishes_drone_snapshots() {
        let state = state();
        let mut rx = state.subscribe();
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_simulation_loop(state.clone(), shutdown_rx));

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("snapshot before timeout")
            .expect("channel open");
        assert_eq!(event.collection, Topic::Drones);
        assert_eq!(event.seq, 1);

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(state.clock_status().state, ClockState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn paused_clock_runs_nothing() {
        let state = state();
        state.pause();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(step(&state).is_empty());

        state.resume();
        tokio::time::advance(Duration::from_millis(3_000)).await;
        let kinds: Vec<TickKind> = step(&state).into_iter().map(|r| r.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TickKind::DroneTelemetry,
                TickKind::DronePosition,
                TickKind::VictimVitals,
                TickKind::MissionMetrics,
            ]
        );
    }
}
