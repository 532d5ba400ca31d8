//! Application state shared by the simulation loop and the API.
//!
//! The mission sits behind one `RwLock`. Ticks and commands both take the
//! write side, so they never interleave; snapshots are published after the
//! lock is released.

use chrono::Utc;
use sar_core::{ClockStatus, Mission, SimulationClock, TickKind, Topic, Viewport};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tokio::time::Instant;

use crate::config::Config;
use crate::state::snapshot::{collection_payload, SnapshotEvent};

pub struct AppState {
    mission: RwLock<Mission>,
    viewport: RwLock<Viewport>,
    clock: Mutex<SimulationClock>,
    /// Origin of the clock's millisecond timeline
    epoch: Instant,
    tx: broadcast::Sender<SnapshotEvent>,
    seqs: Mutex<HashMap<Topic, u64>>,
    config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let mission = Mission::seeded(config.simulation.clone(), Utc::now());
        let viewport = Viewport::new(config.simulation.zoom);
        let clock = SimulationClock::new(&config.simulation, 0);
        let (tx, _) = broadcast::channel(config.stream_capacity);
        Self {
            mission: RwLock::new(mission),
            viewport: RwLock::new(viewport),
            clock: Mutex::new(clock),
            epoch: Instant::now(),
            tx,
            seqs: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    // A poisoned lock still holds consistent data: every write swaps whole
    // entities in, so we keep serving it.

    pub fn mission(&self) -> RwLockReadGuard<'_, Mission> {
        self.mission.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn mission_mut(&self) -> RwLockWriteGuard<'_, Mission> {
        self.mission.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn clock(&self) -> MutexGuard<'_, SimulationClock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn viewport(&self) -> Viewport {
        *self.viewport.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutate the viewport and return the result.
    pub fn update_viewport<F>(&self, update: F) -> Viewport
    where
        F: FnOnce(&mut Viewport),
    {
        let mut viewport = self.viewport.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut viewport);
        *viewport
    }

    /// Milliseconds since the state was created, on tokio's clock.
    pub fn now_ms(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    // ========== CLOCK ==========

    pub fn due_ticks(&self) -> Vec<TickKind> {
        let now = self.now_ms();
        self.clock().poll(now)
    }

    pub fn clock_status(&self) -> ClockStatus {
        self.clock().status()
    }

    pub fn pause(&self) -> bool {
        self.clock().pause()
    }

    pub fn resume(&self) -> bool {
        let now = self.now_ms();
        self.clock().resume(now)
    }

    pub fn stop(&self) {
        self.clock().stop();
    }

    // ========== SNAPSHOTS ==========

    pub fn subscribe(&self) -> broadcast::Receiver<SnapshotEvent> {
        self.tx.subscribe()
    }

    /// Publish the current snapshot of each topic under a fresh sequence
    /// number. The sequence lock is held while the payload is built so a
    /// higher `seq` always carries newer state.
    pub fn publish(&self, topics: &[Topic]) {
        if topics.is_empty() {
            return;
        }
        let mut seqs = self.seqs.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();
        for &topic in topics {
            let payload = collection_payload(&self.mission(), topic, now);
            let seq = seqs.entry(topic).or_insert(0);
            *seq += 1;
            // No subscribers is not an error.
            let _ = self.tx.send(SnapshotEvent::new(topic, *seq, payload));
        }
    }

    /// Current snapshot without bumping the sequence, for new or lagging
    /// subscribers.
    pub fn current(&self, topic: Topic) -> SnapshotEvent {
        let seqs = self.seqs.lock().unwrap_or_else(PoisonError::into_inner);
        let seq = seqs.get(&topic).copied().unwrap_or(0);
        let payload = collection_payload(&self.mission(), topic, Utc::now());
        SnapshotEvent::new(topic, seq, payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tokio::sync::broadcast::error::RecvError;

    #[tokio::test]
    async fn publish_increments_per_collection() {
        let state = AppState::new(Config::default());
        let mut rx = state.subscribe();

        state.publish(&[Topic::Drones, Topic::Alerts]);
        state.publish(&[Topic::Drones]);

        let seqs: Vec<(Topic, u64)> = (0..3)
            .map(|_| rx.try_recv().map(|e| (e.collection, e.seq)).unwrap())
            .collect();
        assert_eq!(
            seqs,
            vec![(Topic::Drones, 1), (Topic::Alerts, 1), (Topic::Drones, 2)]
        );
        assert_eq!(state.current(Topic::Drones).seq, 2);
        assert_eq!(state.current(Topic::Victims).seq, 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_resyncs_from_current() {
        let mut config = Config::default();
        config.stream_capacity = 1;
        config.simulation.seed = Some(7);
        let state = AppState::new(config);
        let mut rx = state.subscribe();

        state.publish(&[Topic::Drones]);
        state.publish(&[Topic::Drones]);
        state
            .mission_mut()
            .deploy_drone("D-007", Utc::now())
            .unwrap();
        state.publish(&[Topic::Drones]);

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(2))));
        assert_eq!(rx.recv().await.unwrap().seq, 3);

        let resync = state.current(Topic::Drones);
        assert_eq!(resync.seq, 3);
        let envelope: Value = serde_json::from_str(&resync.payload).unwrap();
        assert_eq!(envelope["collection"], "drones");
        assert_eq!(envelope["seq"], 3);
        let expected = collection_payload(&state.mission(), Topic::Drones, Utc::now());
        assert_eq!(envelope["payload"], expected);
        let d007 = envelope["payload"]
            .as_array()
            .unwrap()
            .iter()
            .find(|d| d["id"] == "D-007")
            .unwrap();
        assert_eq!(d007["status"], "connected");
    }

    #[tokio::test]
    async fn seq_is_monotonic_per_topic() {
        let state = AppState::new(Config::default());
        let mut rx = state.subscribe();

        state.publish(&[Topic::Drones, Topic::Victims]);
        state.publish(&[Topic::Victims]);
        state.publish(&[Topic::Metrics, Topic::Drones, Topic::Victims]);
        state.publish(&[Topic::Drones]);

        let mut last: HashMap<Topic, u64> = HashMap::new();
        while let Ok(event) = rx.try_recv() {
            let previous = last.insert(event.collection, event.seq).unwrap_or(0);
            assert_eq!(event.seq, previous + 1, "{} skipped a seq", event.collection);
        }
        assert_eq!(last[&Topic::Drones], 3);
        assert_eq!(last[&Topic::Victims], 3);
        assert_eq!(last[&Topic::Metrics], 1);
        // Reading the current snapshot never advances the sequence.
        assert_eq!(state.current(Topic::Victims).seq, 3);
        assert_eq!(state.current(Topic::Victims).seq, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_follow_tokio_time() {
        let state = AppState::new(Config::default());
        assert!(state.pause());
        tokio::time::advance(std::time::Duration::from_secs(30)).await;
        assert!(state.due_ticks().is_empty());

        assert!(state.resume());
        tokio::time::advance(std::time::Duration::from_millis(2_000)).await;
        assert_eq!(state.due_ticks(), vec![TickKind::DroneTelemetry]);
    }
}
