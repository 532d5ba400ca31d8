//! API error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sar_core::{CommandError, EntityKind, ParseError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },
}

impl ApiError {
    pub fn not_found(kind: EntityKind, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Command(CommandError::NotFound { .. }) | ApiError::NotFound { .. } => {
                StatusCode::NOT_FOUND
            }
            ApiError::Command(CommandError::InvalidTransition { .. }) => StatusCode::CONFLICT,
            ApiError::Parse(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::CONFLICT {
            tracing::info!(error = %self, "Command rejected");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
