//! Tactical map endpoints: viewport, layer toggles and selection.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use sar_core::viewport::project;
use sar_core::{LayerSummary, MapLayer, MapLayers, MapTarget, Marker, Point, Viewport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::api::error::ApiError;
use crate::state::AppState;

/// Default pick radius, in world units.
const DEFAULT_PICK_RADIUS: f64 = 3.0;

#[derive(Debug, Default, Deserialize)]
pub struct MapQuery {
    /// Narrows victim markers by id
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MapResponse {
    pub viewport: Viewport,
    pub layers: Vec<LayerSummary>,
    pub markers: Vec<Marker>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoomStep {
    In,
    Out,
}

/// Either an absolute level or a single step; a level wins if both are set.
#[derive(Debug, Default, Deserialize)]
pub struct ZoomRequest {
    pub level: Option<f64>,
    pub step: Option<ZoomStep>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LayerRequest {
    /// Absent means toggle
    pub active: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LayerResponse {
    pub layer: MapLayer,
    pub active: bool,
    pub layers: MapLayers,
}

#[derive(Debug, Deserialize)]
pub struct PickQuery {
    pub x: f64,
    pub y: f64,
    pub radius: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct PickResponse {
    pub world: Point,
    pub target: Option<MapTarget>,
}

/// GET /v1/map
pub async fn get_map(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MapQuery>,
) -> Json<MapResponse> {
    let viewport = state.viewport();
    let search = params.search.unwrap_or_default();
    let response = {
        let mission = state.mission();
        let layers = mission.layers();
        MapResponse {
            viewport,
            layers: layers.summary(mission.store()),
            markers: project(mission.store(), layers, &viewport, &search),
        }
    };
    Json(response)
}

/// POST /v1/map/zoom
pub async fn zoom(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ZoomRequest>,
) -> Json<Viewport> {
    let viewport = state.update_viewport(|viewport| match (request.level, request.step) {
        (Some(level), _) => viewport.set_zoom(level),
        (None, Some(ZoomStep::In)) => viewport.zoom_in(),
        (None, Some(ZoomStep::Out)) => viewport.zoom_out(),
        (None, None) => {}
    });
    tracing::debug!(zoom = viewport.zoom, "Viewport zoom changed");
    Json(viewport)
}

/// POST /v1/map/pan
pub async fn pan(State(state): State<Arc<AppState>>, Json(center): Json<Point>) -> Json<Viewport> {
    Json(state.update_viewport(|viewport| viewport.pan_to(center)))
}

/// POST /v1/map/reset
pub async fn reset(State(state): State<Arc<AppState>>) -> Json<Viewport> {
    Json(state.update_viewport(Viewport::reset))
}

/// POST /v1/map/layers/:layer
pub async fn set_layer(
    State(state): State<Arc<AppState>>,
    Path(layer): Path<String>,
    Json(request): Json<LayerRequest>,
) -> Result<Json<LayerResponse>, ApiError> {
    let layer: MapLayer = layer.parse()?;
    let layers = {
        let mut mission = state.mission_mut();
        let layers = mission.layers_mut();
        match request.active {
            Some(active) => layers.set(layer, active),
            None => {
                layers.toggle(layer);
            }
        }
        *layers
    };
    let active = layers.is_active(layer);
    tracing::debug!(%layer, active, "Map layer updated");
    Ok(Json(LayerResponse {
        layer,
        active,
        layers,
    }))
}

/// GET /v1/map/pick?x=..&y=..
///
/// `x`/`y` are screen coordinates; the radius is in world units so the hit
/// does not depend on zoom.
pub async fn pick(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PickQuery>,
) -> Json<PickResponse> {
    let viewport = state.viewport();
    let screen = Point::new(params.x, params.y);
    let radius = params
        .radius
        .filter(|r| r.is_finite() && *r >= 0.0)
        .unwrap_or(DEFAULT_PICK_RADIUS);
    let target = {
        let mission = state.mission();
        viewport.pick(mission.store(), mission.layers(), screen, radius)
    };
    Json(PickResponse {
        world: viewport.to_world(screen),
        target,
    })
}
