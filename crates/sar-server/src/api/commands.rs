//! Operator command endpoints.
//!
//! Each command runs against the mission under the write lock; affected
//! collections are published after the lock is released.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use sar_core::{AlertPage, CommandOutcome, SeverityFilter, Topic};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::state::AppState;

const DRONE_TOPICS: &[Topic] = &[Topic::Drones, Topic::Timeline, Topic::Metrics];
const ASSIGN_TOPICS: &[Topic] = &[
    Topic::Victims,
    Topic::Teams,
    Topic::Timeline,
    Topic::Alerts,
    Topic::Metrics,
];

/// Response after a command was accepted.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub id: String,
    pub outcome: CommandOutcome,
}

#[derive(Debug, Deserialize)]
pub struct AssignTeamRequest {
    pub team_id: String,
}

/// Partial update of the alert panel's view state.
#[derive(Debug, Default, Deserialize)]
pub struct AlertViewRequest {
    /// `all`, `critical`, `important` or `info`
    pub severity: Option<String>,
    pub search: Option<String>,
    pub auto_rotate: Option<bool>,
    pub page: Option<usize>,
}

fn respond(state: &AppState, id: String, outcome: CommandOutcome, topics: &[Topic]) -> Json<CommandResponse> {
    if outcome == CommandOutcome::Applied {
        state.publish(topics);
    }
    Json(CommandResponse { id, outcome })
}

/// POST /v1/drones/:drone_id/deploy
pub async fn deploy_drone(
    State(state): State<Arc<AppState>>,
    Path(drone_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state.mission_mut().deploy_drone(&drone_id, Utc::now())?;
    tracing::info!(drone_id = %drone_id, "Drone deployed");
    Ok(respond(&state, drone_id, outcome, DRONE_TOPICS))
}

/// POST /v1/drones/:drone_id/recall
pub async fn recall_drone(
    State(state): State<Arc<AppState>>,
    Path(drone_id): Path<String>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state.mission_mut().recall_drone(&drone_id, Utc::now())?;
    tracing::info!(drone_id = %drone_id, "Drone recalled");
    Ok(respond(&state, drone_id, outcome, DRONE_TOPICS))
}

/// POST /v1/victims/:victim_id/assign
pub async fn assign_team(
    State(state): State<Arc<AppState>>,
    Path(victim_id): Path<String>,
    Json(request): Json<AssignTeamRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let outcome = state
        .mission_mut()
        .assign_team(&victim_id, &request.team_id, Utc::now())?;
    match outcome {
        CommandOutcome::Applied => tracing::info!(
            victim_id = %victim_id,
            team_id = %request.team_id,
            "Rescue team assigned"
        ),
        CommandOutcome::Unchanged => tracing::debug!(
            victim_id = %victim_id,
            team_id = %request.team_id,
            "Assignment already in place"
        ),
    }
    Ok(respond(&state, victim_id, outcome, ASSIGN_TOPICS))
}

/// POST /v1/alerts/:alert_id/dismiss
///
/// Dismissing an unknown or already dismissed alert is not an error.
pub async fn dismiss_alert(
    State(state): State<Arc<AppState>>,
    Path(alert_id): Path<u64>,
) -> Json<CommandResponse> {
    let outcome = state.mission_mut().dismiss_alert(alert_id);
    if outcome == CommandOutcome::Applied {
        tracing::info!(alert_id, "Alert dismissed");
    }
    respond(&state, alert_id.to_string(), outcome, &[Topic::Alerts])
}

/// POST /v1/alerts/view
pub async fn update_alert_view(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AlertViewRequest>,
) -> Result<Json<AlertPage>, ApiError> {
    let severity = request
        .severity
        .as_deref()
        .map(str::parse::<SeverityFilter>)
        .transpose()?;

    let page = {
        let mut mission = state.mission_mut();
        let alerts = mission.alerts_mut();
        if let Some(severity) = severity {
            alerts.set_filter(severity);
        }
        if let Some(search) = request.search {
            alerts.set_search(search);
        }
        if let Some(enabled) = request.auto_rotate {
            alerts.set_auto_rotate(enabled);
        }
        if let Some(page) = request.page {
            alerts.set_page(page);
        }
        alerts.current_page()
    };
    state.publish(&[Topic::Alerts]);
    Ok(Json(page))
}
