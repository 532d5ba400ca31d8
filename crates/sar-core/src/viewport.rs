//! World ↔ screen translation, map layers and hit testing.
//!
//! Entities live in percentage world space. The viewport is the only place
//! that knows about screen space; selection always resolves in world space so
//! that zoom and pan never change what lies under a world coordinate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;
use crate::models::{DroneStatus, HazardSeverity, Point, Rect, TeamStatus, VictimStatus};
use crate::rules::{ZoomBounds, WORLD_MAX, WORLD_MIN};
use crate::store::EntityStore;

const DEFAULT_ZOOM: f64 = 100.0;
const DEFAULT_CENTER: Point = Point::new(50.0, 50.0);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Percent; 100 is unscaled
    pub zoom: f64,
    /// World point shown at `origin`
    pub center: Point,
    /// Screen units per world unit at 100% zoom
    pub scale: f64,
    /// Screen point the center maps to
    pub origin: Point,
    pub bounds: ZoomBounds,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ZoomBounds::default())
    }
}

impl Viewport {
    pub fn new(bounds: ZoomBounds) -> Self {
        let bounds = bounds.normalized();
        Self {
            zoom: bounds.clamp(DEFAULT_ZOOM),
            center: DEFAULT_CENTER,
            scale: 1.0,
            origin: DEFAULT_CENTER,
            bounds,
        }
    }

    /// Fix the rendering surface. Non-positive scales fall back to 1.
    pub fn with_surface(mut self, scale: f64, origin: Point) -> Self {
        self.scale = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
        if origin.is_finite() {
            self.origin = origin;
        }
        self
    }

    fn factor(&self) -> f64 {
        self.zoom / 100.0 * self.scale
    }

    pub fn to_screen(&self, world: Point) -> Point {
        let k = self.factor();
        Point::new(
            (world.x - self.center.x) * k + self.origin.x,
            (world.y - self.center.y) * k + self.origin.y,
        )
    }

    pub fn to_world(&self, screen: Point) -> Point {
        let k = self.factor();
        Point::new(
            (screen.x - self.origin.x) / k + self.center.x,
            (screen.y - self.origin.y) / k + self.center.y,
        )
    }

    pub fn to_screen_rect(&self, area: &Rect) -> Rect {
        let corner = self.to_screen(area.origin());
        let k = self.factor();
        Rect {
            x: corner.x,
            y: corner.y,
            width: area.width * k,
            height: area.height * k,
        }
    }

    /// Out-of-range values are clamped silently.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = self.bounds.clamp(zoom);
    }

    pub fn zoom_in(&mut self) {
        self.set_zoom(self.zoom + self.bounds.step);
    }

    pub fn zoom_out(&mut self) {
        self.set_zoom(self.zoom - self.bounds.step);
    }

    /// Center on a world point, clamped to the world square.
    pub fn pan_to(&mut self, center: Point) {
        if !center.is_finite() {
            return;
        }
        self.center = Point::new(
            center.x.clamp(WORLD_MIN, WORLD_MAX),
            center.y.clamp(WORLD_MIN, WORLD_MAX),
        );
    }

    pub fn reset(&mut self) {
        self.zoom = self.bounds.clamp(DEFAULT_ZOOM);
        self.center = DEFAULT_CENTER;
    }

    /// Convert to world, then hit-test. `radius` is in world units.
    pub fn pick(
        &self,
        store: &EntityStore,
        layers: &MapLayers,
        screen: Point,
        radius: f64,
    ) -> Option<MapTarget> {
        hit_test(store, layers, self.to_world(screen), radius)
    }
}

// ========== LAYERS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapLayer {
    Victims,
    Drones,
    Hazards,
    RescueTeams,
    SafeZones,
}

impl MapLayer {
    pub const ALL: [MapLayer; 5] = [
        MapLayer::Victims,
        MapLayer::Drones,
        MapLayer::Hazards,
        MapLayer::RescueTeams,
        MapLayer::SafeZones,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MapLayer::Victims => "victims",
            MapLayer::Drones => "drones",
            MapLayer::Hazards => "hazards",
            MapLayer::RescueTeams => "rescue_teams",
            MapLayer::SafeZones => "safe_zones",
        }
    }
}

impl fmt::Display for MapLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapLayer {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "teams" => Ok(MapLayer::RescueTeams),
            other => MapLayer::ALL
                .into_iter()
                .find(|layer| layer.as_str() == other)
                .ok_or_else(|| ParseError::unknown("map layer", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapLayers {
    pub victims: bool,
    pub drones: bool,
    pub hazards: bool,
    pub rescue_teams: bool,
    pub safe_zones: bool,
}

impl Default for MapLayers {
    fn default() -> Self {
        Self {
            victims: true,
            drones: true,
            hazards: true,
            rescue_teams: true,
            safe_zones: false,
        }
    }
}

impl MapLayers {
    fn slot(&mut self, layer: MapLayer) -> &mut bool {
        match layer {
            MapLayer::Victims => &mut self.victims,
            MapLayer::Drones => &mut self.drones,
            MapLayer::Hazards => &mut self.hazards,
            MapLayer::RescueTeams => &mut self.rescue_teams,
            MapLayer::SafeZones => &mut self.safe_zones,
        }
    }

    pub fn is_active(&self, layer: MapLayer) -> bool {
        match layer {
            MapLayer::Victims => self.victims,
            MapLayer::Drones => self.drones,
            MapLayer::Hazards => self.hazards,
            MapLayer::RescueTeams => self.rescue_teams,
            MapLayer::SafeZones => self.safe_zones,
        }
    }

    /// Flip a layer; returns its new state.
    pub fn toggle(&mut self, layer: MapLayer) -> bool {
        let slot = self.slot(layer);
        *slot = !*slot;
        *slot
    }

    pub fn set(&mut self, layer: MapLayer, active: bool) {
        *self.slot(layer) = active;
    }

    /// Per-layer legend counts.
    pub fn summary(&self, store: &EntityStore) -> Vec<LayerSummary> {
        MapLayer::ALL
            .into_iter()
            .map(|layer| {
                let (total, counts) = match layer {
                    MapLayer::Victims => {
                        let victims = store.victims();
                        (
                            victims.len(),
                            vec![
                                count("critical", victims.iter().filter(|v| v.status == VictimStatus::Critical).count()),
                                count("injured", victims.iter().filter(|v| v.status == VictimStatus::Injured).count()),
                            ],
                        )
                    }
                    MapLayer::Drones => {
                        let drones = store.drones();
                        (
                            drones.len(),
                            vec![
                                count("scanning", drones.iter().filter(|d| d.is_scanning()).count()),
                                count("low_battery", drones.iter().filter(|d| d.low_power()).count()),
                            ],
                        )
                    }
                    MapLayer::Hazards => {
                        let hazards = store.hazards();
                        (
                            hazards.len(),
                            vec![
                                count("high", hazards.iter().filter(|h| h.severity == HazardSeverity::High).count()),
                                count("medium", hazards.iter().filter(|h| h.severity == HazardSeverity::Medium).count()),
                            ],
                        )
                    }
                    MapLayer::RescueTeams => {
                        let teams = store.teams();
                        (
                            teams.len(),
                            vec![
                                count("available", teams.iter().filter(|t| t.status == TeamStatus::Available).count()),
                                count("deployed", teams.iter().filter(|t| t.status != TeamStatus::Available).count()),
                            ],
                        )
                    }
                    MapLayer::SafeZones => (store.safe_zones().len(), Vec::new()),
                };
                LayerSummary {
                    layer,
                    active: self.is_active(layer),
                    total,
                    counts,
                }
            })
            .collect()
    }
}

fn count(label: &'static str, count: usize) -> LayerCount {
    LayerCount { label, count }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerCount {
    pub label: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LayerSummary {
    pub layer: MapLayer,
    pub active: bool,
    pub total: usize,
    pub counts: Vec<LayerCount>,
}

// ========== SELECTION ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MapTarget {
    Victim(String),
    Drone(String),
    Hazard(String),
    RescueTeam(String),
    SafeZone(String),
}

impl MapTarget {
    pub fn layer(&self) -> MapLayer {
        match self {
            MapTarget::Victim(_) => MapLayer::Victims,
            MapTarget::Drone(_) => MapLayer::Drones,
            MapTarget::Hazard(_) => MapLayer::Hazards,
            MapTarget::RescueTeam(_) => MapLayer::RescueTeams,
            MapTarget::SafeZone(_) => MapLayer::SafeZones,
        }
    }
}

/// Point entities on active layers, in draw order.
fn point_entities<'a>(
    store: &'a EntityStore,
    layers: &'a MapLayers,
) -> impl Iterator<Item = (MapTarget, Point)> + 'a {
    let victims = store
        .victims()
        .iter()
        .map(|v| (MapTarget::Victim(v.id.clone()), v.position));
    let drones = store
        .drones()
        .iter()
        .map(|d| (MapTarget::Drone(d.id.clone()), d.position));
    let hazards = store
        .hazards()
        .iter()
        .map(|h| (MapTarget::Hazard(h.id.clone()), h.position));
    let teams = store
        .teams()
        .iter()
        .map(|t| (MapTarget::RescueTeam(t.id.clone()), t.position));
    victims
        .chain(drones)
        .chain(hazards)
        .chain(teams)
        .filter(|(target, _)| layers.is_active(target.layer()))
}

/// Nearest point entity within `radius` world units on an active layer.
/// Falls back to the safe zone containing `world` when that layer is on.
/// Ties go to the earlier layer.
pub fn hit_test(
    store: &EntityStore,
    layers: &MapLayers,
    world: Point,
    radius: f64,
) -> Option<MapTarget> {
    if !world.is_finite() {
        return None;
    }
    let mut best: Option<(MapTarget, f64)> = None;
    for (target, position) in point_entities(store, layers) {
        let distance = position.distance(&world);
        if distance > radius {
            continue;
        }
        if best.as_ref().map_or(true, |(_, nearest)| distance < *nearest) {
            best = Some((target, distance));
        }
    }
    if let Some((target, _)) = best {
        return Some(target);
    }
    if !layers.safe_zones {
        return None;
    }
    store
        .safe_zones()
        .iter()
        .find(|zone| zone.area.contains(&world))
        .map(|zone| MapTarget::SafeZone(zone.id.clone()))
}

/// A projected map marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub target: MapTarget,
    pub world: Point,
    pub screen: Point,
    /// Screen-space footprint for area entities
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area: Option<Rect>,
    /// Categorical tag for styling (status or severity)
    pub tag: String,
}

/// Screen-space markers for every entity on an active layer. Victims are
/// narrowed by `victim_search` (case-insensitive id substring).
pub fn project(
    store: &EntityStore,
    layers: &MapLayers,
    viewport: &Viewport,
    victim_search: &str,
) -> Vec<Marker> {
    let needle = victim_search.trim().to_lowercase();
    let mut markers = Vec::new();

    if layers.safe_zones {
        for zone in store.safe_zones() {
            markers.push(Marker {
                target: MapTarget::SafeZone(zone.id.clone()),
                world: zone.area.origin(),
                screen: viewport.to_screen(zone.area.origin()),
                area: Some(viewport.to_screen_rect(&zone.area)),
                tag: "safe".to_string(),
            });
        }
    }

    let mut point = |target: MapTarget, world: Point, tag: &str| {
        markers.push(Marker {
            target,
            world,
            screen: viewport.to_screen(world),
            area: None,
            tag: tag.to_string(),
        });
    };

    if layers.victims {
        for victim in store.victims() {
            if needle.is_empty() || victim.id.to_lowercase().contains(&needle) {
                point(MapTarget::Victim(victim.id.clone()), victim.position, victim.status.as_str());
            }
        }
    }
    if layers.drones {
        for drone in store.drones() {
            let tag = if drone.status() == DroneStatus::Connected { "scanning" } else { "idle" };
            point(MapTarget::Drone(drone.id.clone()), drone.position, tag);
        }
    }
    if layers.hazards {
        for hazard in store.hazards() {
            let tag = match hazard.severity {
                HazardSeverity::High => "high",
                HazardSeverity::Medium => "medium",
            };
            point(MapTarget::Hazard(hazard.id.clone()), hazard.position, tag);
        }
    }
    if layers.rescue_teams {
        for team in store.teams() {
            let tag = if team.status == TeamStatus::Available { "available" } else { "deployed" };
            point(MapTarget::RescueTeam(team.id.clone()), team.position, tag);
        }
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed;
    use chrono::Utc;

    fn assert_close(a: Point, b: Point) {
        assert!((a.x - b.x).abs() < 1e-9, "{a:?} != {b:?}");
        assert!((a.y - b.y).abs() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn default_view_is_identity() {
        let viewport = Viewport::default();
        assert_close(viewport.to_screen(Point::new(25.0, 30.0)), Point::new(25.0, 30.0));
    }

    #[test]
    fn round_trip_under_zoom_and_pan() {
        let mut viewport = Viewport::default().with_surface(6.0, Point::new(300.0, 300.0));
        let world = Point::new(17.5, 82.25);
        for zoom in [25.0, 75.0, 100.0, 250.0, 400.0] {
            for center in [Point::new(0.0, 0.0), Point::new(50.0, 50.0), Point::new(91.0, 3.0)] {
                viewport.set_zoom(zoom);
                viewport.pan_to(center);
                assert_close(viewport.to_world(viewport.to_screen(world)), world);
            }
        }
    }

    #[test]
    fn zoom_steps_and_clamps() {
        let mut viewport = Viewport::default();
        viewport.zoom_in();
        assert_eq!(viewport.zoom, 125.0);
        viewport.set_zoom(1_000.0);
        assert_eq!(viewport.zoom, 400.0);
        viewport.zoom_in();
        assert_eq!(viewport.zoom, 400.0);
        viewport.set_zoom(0.0);
        assert_eq!(viewport.zoom, 25.0);
        viewport.zoom_out();
        assert_eq!(viewport.zoom, 25.0);
    }

    #[test]
    fn pan_clamps_and_reset_restores() {
        let mut viewport = Viewport::default();
        viewport.pan_to(Point::new(-20.0, 140.0));
        assert_eq!(viewport.center, Point::new(0.0, 100.0));
        viewport.set_zoom(300.0);
        viewport.reset();
        assert_eq!(viewport.zoom, 100.0);
        assert_eq!(viewport.center, Point::new(50.0, 50.0));
    }

    #[test]
    fn pick_is_zoom_invariant() {
        let store = seed::entities(Utc::now());
        let layers = MapLayers::default();
        let mut viewport = Viewport::default().with_surface(4.0, Point::new(200.0, 200.0));
        let world = Point::new(35.0, 25.0);
        for zoom in [25.0, 100.0, 400.0] {
            viewport.set_zoom(zoom);
            viewport.pan_to(Point::new(zoom / 5.0, 60.0));
            let screen = viewport.to_screen(world);
            assert_eq!(
                viewport.pick(&store, &layers, screen, 1.0),
                Some(MapTarget::Hazard("H-001".into()))
            );
        }
    }

    #[test]
    fn hit_test_respects_layers_and_falls_back_to_zones() {
        let store = seed::entities(Utc::now());
        let mut layers = MapLayers::default();
        let inside_zone = Point::new(7.0, 95.0);
        assert_eq!(hit_test(&store, &layers, inside_zone, 1.0), None);

        layers.toggle(MapLayer::SafeZones);
        assert_eq!(
            hit_test(&store, &layers, inside_zone, 1.0),
            Some(MapTarget::SafeZone("SZ-001".into()))
        );

        layers.set(MapLayer::Hazards, false);
        assert_eq!(hit_test(&store, &layers, Point::new(35.0, 25.0), 1.0), None);
    }

    #[test]
    fn picked_targets_belong_to_active_layers() {
        let store = seed::entities(Utc::now());
        let layers = MapLayers {
            victims: false,
            drones: true,
            hazards: false,
            rescue_teams: false,
            safe_zones: false,
        };
        for drone in store.drones() {
            let hit = hit_test(&store, &layers, drone.position, 0.5).unwrap();
            assert_eq!(hit.layer(), MapLayer::Drones);
        }
        assert_eq!(hit_test(&store, &layers, Point::new(25.0, 30.0), 0.5), None);
    }

    #[test]
    fn project_filters_layers_and_search() {
        let store = seed::entities(Utc::now());
        let layers = MapLayers {
            victims: true,
            drones: false,
            hazards: false,
            rescue_teams: false,
            safe_zones: false,
        };
        let markers = project(&store, &layers, &Viewport::default(), "v-00");
        assert_eq!(markers.len(), 5);
        let markers = project(&store, &layers, &Viewport::default(), "V-002");
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].target, MapTarget::Victim("V-002".into()));
    }

    #[test]
    fn layer_summary_counts() {
        let store = seed::entities(Utc::now());
        let summary = MapLayers::default().summary(&store);
        let victims = &summary[0];
        assert_eq!(victims.total, 5);
        assert_eq!(victims.counts[0].count, 2);
        assert_eq!(victims.counts[1].count, 1);
        let zones = &summary[4];
        assert!(!zones.active);
        assert_eq!(zones.total, 2);
    }

    #[test]
    fn layer_names_parse() {
        assert_eq!("rescue-teams".parse::<MapLayer>().unwrap(), MapLayer::RescueTeams);
        assert_eq!("Safe Zones".parse::<MapLayer>().unwrap(), MapLayer::SafeZones);
        assert!("weather".parse::<MapLayer>().is_err());
    }
}
