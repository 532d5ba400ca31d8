//! API routes for the SAR server.

pub mod commands;
pub mod error;
pub mod map;
pub mod request_id;
mod routes;
pub mod ws;

use axum::Router;

pub fn routes() -> Router<std::sync::Arc<crate::state::AppState>> {
    routes::create_router()
}

#[cfg(test)]
mod tests;
