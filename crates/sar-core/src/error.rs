//! Error taxonomy for the SAR core.
//!
//! Nothing here is fatal: store and command errors leave state untouched,
//! tick faults are isolated to a single entity and reported as data.

use thiserror::Error;

use crate::models::EntityKind;

/// Errors from direct store writes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
}

/// Rejections from operator commands. State is unchanged on every variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
    #[error("cannot {command} {id}: {reason}")]
    InvalidTransition {
        command: &'static str,
        id: String,
        reason: String,
    },
}

impl CommandError {
    pub(crate) fn invalid(command: &'static str, id: &str, reason: impl Into<String>) -> Self {
        CommandError::InvalidTransition {
            command,
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<StoreError> for CommandError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, id } => CommandError::NotFound { kind, id },
        }
    }
}

/// A per-entity failure during a simulation tick.
///
/// The entity keeps its previous committed value; siblings still advance.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} {id}: non-finite {field}, update skipped")]
pub struct TickFault {
    pub kind: EntityKind,
    pub id: String,
    pub field: &'static str,
}

/// Unrecognized filter, sort key, layer or topic string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown {what} '{value}'")]
pub struct ParseError {
    pub what: &'static str,
    pub value: String,
}

impl ParseError {
    pub(crate) fn unknown(what: &'static str, value: &str) -> Self {
        Self {
            what,
            value: value.to_string(),
        }
    }
}
