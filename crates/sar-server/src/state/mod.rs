//! Shared server state: the mission, the viewport, the clock and the
//! snapshot hub.

pub mod snapshot;
pub mod store;

pub use snapshot::SnapshotEvent;
pub use store::AppState;
