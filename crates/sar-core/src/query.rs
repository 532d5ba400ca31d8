//! Filter + sort + search over victims and alerts.
//!
//! Queries never mutate their input and are recomputed on every call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

use crate::alerts::Alert;
use crate::error::ParseError;
use crate::models::Victim;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Priority,
    Confidence,
    Time,
}

impl FromStr for SortKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(SortKey::Priority),
            "confidence" => Ok(SortKey::Confidence),
            "time" => Ok(SortKey::Time),
            _ => Err(ParseError::unknown("sort key", s)),
        }
    }
}

/// Categorical status filter. `All` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Only(String),
}

impl StatusFilter {
    pub fn matches(&self, label: &str) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted.eq_ignore_ascii_case(label),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseError::unknown("status filter", s));
        }
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        Ok(StatusFilter::Only(trimmed.to_ascii_lowercase()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub search: String,
    pub status: StatusFilter,
    pub sort: SortKey,
}

impl Query {
    pub fn sorted_by(sort: SortKey) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }
}

/// Something the pipeline can search, filter and order.
pub trait Queryable {
    /// Whether `needle` (already lowercased, non-empty) occurs in the
    /// searchable text.
    fn matches_search(&self, needle: &str) -> bool;

    /// Categorical label compared against the status filter.
    fn status_label(&self) -> &str;

    fn sort_cmp(&self, other: &Self, key: SortKey) -> Ordering;
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

impl Queryable for Victim {
    fn matches_search(&self, needle: &str) -> bool {
        contains_ci(&self.id, needle) || contains_ci(&self.location, needle)
    }

    fn status_label(&self) -> &str {
        self.status.as_str()
    }

    fn sort_cmp(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Priority => self.priority.cmp(&other.priority),
            SortKey::Confidence => other.confidence.total_cmp(&self.confidence),
            SortKey::Time => newest_first(self.detected_at, other.detected_at),
        }
    }
}

impl Queryable for Alert {
    fn matches_search(&self, needle: &str) -> bool {
        contains_ci(&self.id.to_string(), needle) || contains_ci(&self.message, needle)
    }

    fn status_label(&self) -> &str {
        self.severity.as_str()
    }

    fn sort_cmp(&self, other: &Self, key: SortKey) -> Ordering {
        match key {
            SortKey::Priority => self.severity.rank().cmp(&other.severity.rank()),
            SortKey::Confidence => Ordering::Equal,
            SortKey::Time => newest_first(self.created_at, other.created_at),
        }
    }
}

/// Smallest age first, i.e. the most recent timestamp leads.
fn newest_first(a: DateTime<Utc>, b: DateTime<Utc>) -> Ordering {
    b.cmp(&a)
}

/// Run `query` over `items`. The sort is stable, so equal keys keep their
/// input order.
pub fn run<'a, T, I>(items: I, query: &Query) -> Vec<&'a T>
where
    T: Queryable + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let needle = query.search.trim().to_lowercase();
    let mut rows: Vec<&T> = items
        .into_iter()
        .filter(|item| needle.is_empty() || item.matches_search(&needle))
        .filter(|item| query.status.matches(item.status_label()))
        .collect();
    rows.sort_by(|a, b| a.sort_cmp(b, query.sort));
    rows
}
