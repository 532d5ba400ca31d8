//! Alert feed: bounded alert log with dismissal, filtering and a rotating
//! paginated view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::query::{self, Query, SortKey, StatusFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Important,
    Info,
}

impl AlertSeverity {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertSeverity::Critical => "critical",
            AlertSeverity::Important => "important",
            AlertSeverity::Info => "info",
        }
    }

    /// Lower is more urgent.
    pub fn rank(self) -> u8 {
        match self {
            AlertSeverity::Critical => 0,
            AlertSeverity::Important => 1,
            AlertSeverity::Info => 2,
        }
    }
}

impl fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AlertSeverity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "critical" => Ok(AlertSeverity::Critical),
            "important" => Ok(AlertSeverity::Important),
            "info" => Ok(AlertSeverity::Info),
            _ => Err(ParseError::unknown("alert severity", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub id: u64,
    pub severity: AlertSeverity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Terminal once set
    pub dismissed: bool,
}

/// Severity filter; `All` is the "all" sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityFilter {
    #[default]
    All,
    Critical,
    Important,
    Info,
}

impl SeverityFilter {
    pub fn matches(self, severity: AlertSeverity) -> bool {
        match self {
            SeverityFilter::All => true,
            SeverityFilter::Critical => severity == AlertSeverity::Critical,
            SeverityFilter::Important => severity == AlertSeverity::Important,
            SeverityFilter::Info => severity == AlertSeverity::Info,
        }
    }
}

impl FromStr for SeverityFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(SeverityFilter::All);
        }
        match s.parse::<AlertSeverity>() {
            Ok(AlertSeverity::Critical) => Ok(SeverityFilter::Critical),
            Ok(AlertSeverity::Important) => Ok(SeverityFilter::Important),
            Ok(AlertSeverity::Info) => Ok(SeverityFilter::Info),
            Err(_) => Err(ParseError::unknown("alert filter", s)),
        }
    }
}

/// One page of the rotating alert view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPage {
    pub alerts: Vec<Alert>,
    pub page: usize,
    pub page_count: usize,
    pub visible: usize,
    pub filter: SeverityFilter,
    pub search: String,
    pub auto_rotate: bool,
}

#[derive(Debug, Clone)]
pub struct AlertFeed {
    /// Oldest first
    alerts: VecDeque<Alert>,
    next_id: u64,
    capacity: usize,
    page_size: usize,
    filter: SeverityFilter,
    search: String,
    page: usize,
    auto_rotate: bool,
}

impl AlertFeed {
    pub fn new(page_size: usize, capacity: usize) -> Self {
        Self {
            alerts: VecDeque::new(),
            next_id: 1,
            capacity: capacity.max(1),
            page_size: page_size.max(1),
            filter: SeverityFilter::All,
            search: String::new(),
            page: 0,
            auto_rotate: true,
        }
    }

    /// Append an alert stamped `now`; returns its id. Evicts the oldest
    /// entry once the log is full.
    pub fn raise(
        &mut self,
        severity: AlertSeverity,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.alerts.push_back(Alert {
            id,
            severity,
            message: message.into(),
            created_at: now,
            dismissed: false,
        });
        while self.alerts.len() > self.capacity {
            self.alerts.pop_front();
        }
        self.clamp_page();
        id
    }

    /// `Active → Dismissed`. Returns `false` for unknown or already
    /// dismissed ids, which are no-ops.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let changed = match self.alerts.iter_mut().find(|alert| alert.id == id) {
            Some(alert) if !alert.dismissed => {
                alert.dismissed = true;
                true
            }
            _ => false,
        };
        self.clamp_page();
        changed
    }

    pub fn get(&self, id: u64) -> Option<&Alert> {
        self.alerts.iter().find(|alert| alert.id == id)
    }

    /// Every logged alert, oldest first, dismissed ones included.
    pub fn all(&self) -> impl Iterator<Item = &Alert> {
        self.alerts.iter()
    }

    /// Non-dismissed alerts matching `filter`, newest first.
    pub fn visible(&self, filter: SeverityFilter) -> Vec<&Alert> {
        self.alerts
            .iter()
            .rev()
            .filter(|alert| !alert.dismissed && filter.matches(alert.severity))
            .collect()
    }

    /// The feed's own view: current filter plus search text, newest first.
    pub fn view(&self) -> Vec<&Alert> {
        let query = Query {
            search: self.search.clone(),
            status: StatusFilter::All,
            sort: SortKey::Time,
        };
        query::run(self.visible(self.filter), &query)
    }

    pub fn active_count(&self) -> usize {
        self.alerts.iter().filter(|alert| !alert.dismissed).count()
    }

    pub fn filter(&self) -> SeverityFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: SeverityFilter) {
        self.filter = filter;
        self.clamp_page();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.search = search.into();
        self.clamp_page();
    }

    pub fn auto_rotate(&self) -> bool {
        self.auto_rotate
    }

    /// Turning rotation off freezes the current page where it is.
    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.auto_rotate = enabled;
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// `ceil(visible / page_size)`; zero when nothing is visible.
    pub fn page_count(&self) -> usize {
        self.view().len().div_ceil(self.page_size)
    }

    /// Timer-driven advance. Only moves while auto-rotate is on and there is
    /// more than one page. Returns whether the page changed.
    pub fn rotate(&mut self) -> bool {
        if !self.auto_rotate {
            return false;
        }
        let pages = self.page_count();
        if pages <= 1 {
            self.clamp_page();
            return false;
        }
        self.page = (self.page + 1) % pages;
        true
    }

    pub fn next_page(&mut self) {
        self.set_page(self.page.saturating_add(1));
    }

    pub fn previous_page(&mut self) {
        self.set_page(self.page.saturating_sub(1));
    }

    /// Jump to a page, clamped to the last one.
    pub fn set_page(&mut self, page: usize) {
        self.page = page;
        self.clamp_page();
    }

    pub fn current_page(&self) -> AlertPage {
        let view = self.view();
        let visible = view.len();
        let alerts = view
            .into_iter()
            .skip(self.page * self.page_size)
            .take(self.page_size)
            .cloned()
            .collect();
        AlertPage {
            alerts,
            page: self.page,
            page_count: visible.div_ceil(self.page_size),
            visible,
            filter: self.filter,
            search: self.search.clone(),
            auto_rotate: self.auto_rotate,
        }
    }

    fn clamp_page(&mut self) {
        let last = self.page_count().saturating_sub(1);
        self.page = self.page.min(last);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Five alerts, two critical, raised oldest first.
    fn seeded_feed() -> AlertFeed {
        let now = Utc::now();
        let mut feed = AlertFeed::new(3, 64);
        feed.raise(AlertSeverity::Important, "Weather Alert: High Winds Detected", now - Duration::minutes(18));
        feed.raise(AlertSeverity::Critical, "Communication Lost with D-004", now - Duration::minutes(15));
        feed.raise(AlertSeverity::Info, "Rescue Team Alpha En Route", now - Duration::minutes(12));
        feed.raise(AlertSeverity::Important, "New Victim Detected - Sector A7", now - Duration::minutes(5));
        feed.raise(AlertSeverity::Critical, "Drone D-003 Battery Critical (8%)", now - Duration::minutes(2));
        feed
    }

    #[test]
    fn visible_is_newest_first() {
        let feed = seeded_feed();
        let ids: Vec<u64> = feed.visible(SeverityFilter::All).iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn critical_filter_yields_single_page() {
        let mut feed = seeded_feed();
        feed.set_filter(SeverityFilter::Critical);
        let page = feed.current_page();
        assert_eq!(page.visible, 2);
        assert_eq!(page.page, 0);
        assert_eq!(page.page_count, 1);
        let ids: Vec<u64> = page.alerts.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![5, 2]);
    }

    #[test]
    fn dismiss_is_idempotent() {
        let mut feed = seeded_feed();
        assert!(feed.dismiss(2));
        let once: Vec<u64> = feed.visible(SeverityFilter::All).iter().map(|a| a.id).collect();
        assert!(!feed.dismiss(2));
        assert!(!feed.dismiss(999));
        let twice: Vec<u64> = feed.visible(SeverityFilter::All).iter().map(|a| a.id).collect();
        assert_eq!(once, twice);
        assert!(feed.get(2).unwrap().dismissed);
    }

    #[test]
    fn rotation_wraps_and_respects_toggle() {
        let mut feed = seeded_feed();
        assert_eq!(feed.page_count(), 2);
        assert!(feed.rotate());
        assert_eq!(feed.page(), 1);

        feed.set_auto_rotate(false);
        assert!(!feed.rotate());
        assert_eq!(feed.page(), 1);

        feed.set_auto_rotate(true);
        assert!(feed.rotate());
        assert_eq!(feed.page(), 0);
    }

    #[test]
    fn page_is_clamped_when_visible_set_shrinks() {
        let mut feed = seeded_feed();
        feed.set_page(1);
        assert_eq!(feed.page(), 1);

        feed.dismiss(1);
        feed.dismiss(2);
        assert_eq!(feed.page_count(), 1);
        assert_eq!(feed.page(), 0);

        for id in 3..=5 {
            feed.dismiss(id);
        }
        let page = feed.current_page();
        assert_eq!(page.page, 0);
        assert_eq!(page.page_count, 0);
        assert!(page.alerts.is_empty());
    }

    #[test]
    fn search_narrows_view_and_clamps_page() {
        let mut feed = seeded_feed();
        feed.set_page(1);
        feed.set_search("d-00");
        let page = feed.current_page();
        assert_eq!(page.visible, 2);
        assert_eq!(page.page, 0);
    }

    #[test]
    fn manual_navigation_is_clamped() {
        let mut feed = seeded_feed();
        feed.previous_page();
        assert_eq!(feed.page(), 0);
        feed.next_page();
        feed.next_page();
        assert_eq!(feed.page(), 1);
    }

    #[test]
    fn capacity_evicts_oldest() {
        let mut feed = AlertFeed::new(3, 2);
        let now = Utc::now();
        feed.raise(AlertSeverity::Info, "one", now);
        feed.raise(AlertSeverity::Info, "two", now);
        feed.raise(AlertSeverity::Info, "three", now);
        let messages: Vec<&str> = feed.all().map(|a| a.message.as_str()).collect();
        assert_eq!(messages, vec!["two", "three"]);
    }

    #[test]
    fn filter_parsing() {
        assert_eq!("ALL".parse::<SeverityFilter>().unwrap(), SeverityFilter::All);
        assert_eq!("critical".parse::<SeverityFilter>().unwrap(), SeverityFilter::Critical);
        assert!("urgent".parse::<SeverityFilter>().is_err());
    }
}
