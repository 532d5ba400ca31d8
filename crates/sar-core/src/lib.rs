pub mod alerts;
pub mod clock;
pub mod error;
pub mod metrics;
pub mod mission;
pub mod models;
pub mod query;
pub mod rules;
pub mod seed;
pub mod simulation;
pub mod store;
pub mod timeline;
pub mod viewport;

pub use alerts::{Alert, AlertFeed, AlertPage, AlertSeverity, SeverityFilter};
pub use clock::{ClockState, ClockStatus, SimulationClock, TickKind};
pub use error::{CommandError, ParseError, StoreError, TickFault};
pub use metrics::{LiveGauges, MetricsSnapshot, MissionMetrics, MissionStats};
pub use mission::{CommandOutcome, Mission, TickReport};
pub use models::{
    Breathing, Drone, DroneHealth, DroneStatus, EntityKind, Hazard, HazardKind, HazardSeverity,
    Point, Rect, RescueStatus, RescueTeam, SafeZone, TeamMessage, TeamStatus, Topic, Victim,
    VictimStatus, Vitals,
};
pub use query::{Query, Queryable, SortKey, StatusFilter};
pub use rules::{SimulationConfig, ZoomBounds};
pub use store::{Entity, EntityStore, Patch, SwarmStats, VictimTally};
pub use timeline::{EventCategory, EventTimeline, TimelineEvent};
pub use viewport::{LayerSummary, MapLayer, MapLayers, MapTarget, Marker, Viewport};
