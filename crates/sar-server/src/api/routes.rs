//! REST API routes.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use sar_core::query::{self, Query as ViewQuery, SortKey, StatusFilter};
use sar_core::{
    Alert, AlertPage, ClockStatus, Drone, EntityKind, Hazard, MetricsSnapshot, RescueTeam,
    SafeZone, SeverityFilter, TimelineEvent, Victim, VictimStatus,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::api::{commands, map, ws};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        // Collections
        .route("/v1/drones", get(list_drones))
        .route("/v1/drones/:drone_id", get(get_drone))
        .route("/v1/drones/:drone_id/deploy", post(commands::deploy_drone))
        .route("/v1/drones/:drone_id/recall", post(commands::recall_drone))
        .route("/v1/victims", get(list_victims))
        .route("/v1/victims/:victim_id", get(get_victim))
        .route("/v1/victims/:victim_id/assign", post(commands::assign_team))
        .route("/v1/hazards", get(list_hazards))
        .route("/v1/teams", get(list_teams))
        .route("/v1/safe-zones", get(list_safe_zones))
        // Alerts and timeline
        .route("/v1/alerts", get(list_alerts))
        .route("/v1/alerts/page", get(alert_page))
        .route("/v1/alerts/view", post(commands::update_alert_view))
        .route("/v1/alerts/:alert_id/dismiss", post(commands::dismiss_alert))
        .route("/v1/timeline", get(list_timeline))
        .route("/v1/metrics", get(get_metrics))
        // Map
        .route("/v1/map", get(map::get_map))
        .route("/v1/map/zoom", post(map::zoom))
        .route("/v1/map/pan", post(map::pan))
        .route("/v1/map/reset", post(map::reset))
        .route("/v1/map/layers/:layer", post(map::set_layer))
        .route("/v1/map/pick", get(map::pick))
        // Simulation lifecycle
        .route("/v1/simulation", get(simulation_status))
        .route("/v1/simulation/pause", post(pause_simulation))
        .route("/v1/simulation/resume", post(resume_simulation))
        // WebSocket streaming
        .route("/v1/stream", get(ws::ws_handler))
}

// === Request/Response types ===

#[derive(Debug, Deserialize)]
pub struct VictimListQuery {
    pub search: Option<String>,
    /// Victim status or `all`
    pub status: Option<String>,
    /// `priority` (default), `confidence` or `time`
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AlertListQuery {
    /// Severity or `all`
    pub severity: Option<String>,
    pub search: Option<String>,
    /// Defaults to `time` (newest first)
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SimulationResponse {
    pub changed: bool,
    #[serde(flatten)]
    pub clock: ClockStatus,
}

fn parse_sort(raw: Option<&str>, default: SortKey) -> Result<SortKey, ApiError> {
    Ok(raw.map(str::parse::<SortKey>).transpose()?.unwrap_or(default))
}

/// Status filters are only meaningful if they name a real victim status.
fn parse_victim_filter(raw: Option<&str>) -> Result<StatusFilter, ApiError> {
    let Some(raw) = raw else {
        return Ok(StatusFilter::All);
    };
    let filter: StatusFilter = raw.parse()?;
    if let StatusFilter::Only(label) = &filter {
        label.parse::<VictimStatus>()?;
    }
    Ok(filter)
}

// === Handlers ===

async fn list_drones(State(state): State<Arc<AppState>>) -> Json<Vec<Drone>> {
    let drones = state.mission().store().drones().to_vec();
    Json(drones)
}

async fn get_drone(
    State(state): State<Arc<AppState>>,
    Path(drone_id): Path<String>,
) -> Result<Json<Drone>, ApiError> {
    let drone = state.mission().store().find::<Drone>(&drone_id).cloned();
    drone
        .map(Json)
        .ok_or_else(|| ApiError::not_found(EntityKind::Drone, drone_id))
}

async fn list_victims(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VictimListQuery>,
) -> Result<Json<Vec<Victim>>, ApiError> {
    let view = ViewQuery {
        search: params.search.unwrap_or_default(),
        status: parse_victim_filter(params.status.as_deref())?,
        sort: parse_sort(params.sort.as_deref(), SortKey::Priority)?,
    };
    let mission = state.mission();
    let victims: Vec<Victim> = query::run(mission.store().victims(), &view)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(victims))
}

async fn get_victim(
    State(state): State<Arc<AppState>>,
    Path(victim_id): Path<String>,
) -> Result<Json<Victim>, ApiError> {
    let victim = state.mission().store().find::<Victim>(&victim_id).cloned();
    victim
        .map(Json)
        .ok_or_else(|| ApiError::not_found(EntityKind::Victim, victim_id))
}

async fn list_hazards(State(state): State<Arc<AppState>>) -> Json<Vec<Hazard>> {
    let hazards = state.mission().store().hazards().to_vec();
    Json(hazards)
}

async fn list_teams(State(state): State<Arc<AppState>>) -> Json<Vec<RescueTeam>> {
    let teams = state.mission().store().teams().to_vec();
    Json(teams)
}

async fn list_safe_zones(State(state): State<Arc<AppState>>) -> Json<Vec<SafeZone>> {
    let zones = state.mission().store().safe_zones().to_vec();
    Json(zones)
}

async fn list_alerts(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AlertListQuery>,
) -> Result<Json<Vec<Alert>>, ApiError> {
    let severity: SeverityFilter = params
        .severity
        .as_deref()
        .map(str::parse::<SeverityFilter>)
        .transpose()?
        .unwrap_or_default();
    let view = ViewQuery {
        search: params.search.unwrap_or_default(),
        status: StatusFilter::All,
        sort: parse_sort(params.sort.as_deref(), SortKey::Time)?,
    };
    let mission = state.mission();
    let alerts: Vec<Alert> = query::run(mission.alerts().visible(severity), &view)
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(alerts))
}

async fn alert_page(State(state): State<Arc<AppState>>) -> Json<AlertPage> {
    let page = state.mission().alerts().current_page();
    Json(page)
}

async fn list_timeline(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TimelineQuery>,
) -> Json<Vec<TimelineEvent>> {
    let mission = state.mission();
    let timeline = mission.timeline();
    let limit = params.limit.unwrap_or(timeline.capacity());
    let events: Vec<TimelineEvent> = timeline.recent(limit).into_iter().cloned().collect();
    Json(events)
}

async fn get_metrics(State(state): State<Arc<AppState>>) -> Json<MetricsSnapshot> {
    let snapshot = state.mission().metrics_snapshot(Utc::now());
    Json(snapshot)
}

async fn simulation_status(State(state): State<Arc<AppState>>) -> Json<SimulationResponse> {
    Json(SimulationResponse {
        changed: false,
        clock: state.clock_status(),
    })
}

async fn pause_simulation(State(state): State<Arc<AppState>>) -> Json<SimulationResponse> {
    let changed = state.pause();
    if changed {
        tracing::info!("Simulation paused");
    }
    Json(SimulationResponse {
        changed,
        clock: state.clock_status(),
    })
}

async fn resume_simulation(State(state): State<Arc<AppState>>) -> Json<SimulationResponse> {
    let changed = state.resume();
    if changed {
        tracing::info!("Simulation resumed");
    }
    Json(SimulationResponse {
        changed,
        clock: state.clock_status(),
    })
}
