//! Bounded mission event log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    Start,
    Detection,
    Deployment,
    Rescue,
    Hazard,
    Warning,
    Update,
    Communication,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Wall-clock label, `HH:MM`
    pub time: String,
    pub description: String,
    pub category: EventCategory,
}

impl TimelineEvent {
    pub fn new(time: impl Into<String>, description: impl Into<String>, category: EventCategory) -> Self {
        Self {
            time: time.into(),
            description: description.into(),
            category,
        }
    }
}

/// Append-only FIFO log. Oldest entries fall off once `capacity` is reached.
#[derive(Debug, Clone)]
pub struct EventTimeline {
    events: VecDeque<TimelineEvent>,
    capacity: usize,
}

impl EventTimeline {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, event: TimelineEvent) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Append an event labelled with `now`.
    pub fn record(&mut self, now: DateTime<Utc>, description: impl Into<String>, category: EventCategory) {
        self.append(TimelineEvent::new(
            now.format("%H:%M").to_string(),
            description,
            category,
        ));
    }

    /// At most `k` entries, newest first.
    pub fn recent(&self, k: usize) -> Vec<&TimelineEvent> {
        self.events.iter().rev().take(k).collect()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &TimelineEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(n: usize) -> TimelineEvent {
        TimelineEvent::new("14:00", format!("event {n}"), EventCategory::Update)
    }

    #[test]
    fn ninth_append_evicts_oldest() {
        let mut timeline = EventTimeline::new(8);
        for n in 1..=9 {
            timeline.append(event(n));
        }
        assert_eq!(timeline.len(), 8);
        let oldest = timeline.iter().next().unwrap();
        assert_eq!(oldest.description, "event 2");
        assert_eq!(timeline.recent(1)[0].description, "event 9");
    }

    #[test]
    fn recent_is_bounded_and_newest_first() {
        let mut timeline = EventTimeline::new(8);
        for n in 1..=3 {
            timeline.append(event(n));
        }
        let recent: Vec<&str> = timeline.recent(10).iter().map(|e| e.description.as_str()).collect();
        assert_eq!(recent, vec!["event 3", "event 2", "event 1"]);
        assert!(timeline.recent(0).is_empty());
    }

    #[test]
    fn record_formats_clock_label() {
        let mut timeline = EventTimeline::new(8);
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 5, 42).unwrap();
        timeline.record(now, "Communication Check", EventCategory::Communication);
        assert_eq!(timeline.recent(1)[0].time, "09:05");
    }
}
