//! Per-collection snapshot payloads published to subscribers.

use chrono::{DateTime, Utc};
use sar_core::{Mission, Topic};
use serde_json::{json, Value};
use std::sync::Arc;

/// One published collection snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotEvent {
    pub collection: Topic,
    /// Increases per collection in commit order
    pub seq: u64,
    /// Serialized `{collection, seq, payload}` envelope, shared by every
    /// subscriber
    pub payload: Arc<str>,
}

impl SnapshotEvent {
    pub fn new(collection: Topic, seq: u64, payload: Value) -> Self {
        let envelope = json!({
            "collection": collection,
            "seq": seq,
            "payload": payload,
        });
        Self {
            collection,
            seq,
            payload: Arc::from(envelope.to_string()),
        }
    }
}

fn to_value<T: serde::Serialize + ?Sized>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

/// Current state of one collection as JSON.
pub fn collection_payload(mission: &Mission, topic: Topic, now: DateTime<Utc>) -> Value {
    let store = mission.store();
    match topic {
        Topic::Drones => to_value(store.drones()),
        Topic::Victims => to_value(store.victims()),
        Topic::Hazards => to_value(store.hazards()),
        Topic::Teams => to_value(store.teams()),
        Topic::SafeZones => to_value(store.safe_zones()),
        Topic::Alerts => to_value(&mission.alerts().current_page()),
        Topic::Timeline => {
            let timeline = mission.timeline();
            to_value(&timeline.recent(timeline.capacity()))
        }
        Topic::Metrics => to_value(&mission.metrics_snapshot(now)),
    }
}
