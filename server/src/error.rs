//! Error types shared by the game engine, the persistence layer and the hub.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Failures of the durable store (SQLite rows, question snapshot file).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("encoding: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid timestamp {0:?}")]
    Timestamp(String),

    #[error("database lock poisoned")]
    Poisoned,

    #[error("blocking task failed: {0}")]
    Join(String),
}

/// Errors returned synchronously by registry, session and question bank operations.
#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Validation(String),

    #[error("no more questions")]
    Exhausted,

    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),
}

impl GameError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GameError::NotFound(_) => StatusCode::NOT_FOUND,
            GameError::InvalidState(_) | GameError::Exhausted => StatusCode::CONFLICT,
            GameError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            GameError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<tokio::task::JoinError> for GameError {
    fn from(e: tokio::task::JoinError) -> Self {
        GameError::Persistence(StoreError::Join(e.to_string()))
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// A failed hand-off of an outbound frame to a connection's writer, or a
/// failed write on the socket itself.
///
/// Never returned past the ws layer: it is converted into an eviction.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("outbound queue full")]
    Backpressure,

    #[error("connection closed")]
    Closed,

    #[error("socket write timed out after {0:?}")]
    WriteTimeout(std::time::Duration),

    #[error("socket write failed: {0}")]
    Socket(#[from] axum::Error),

    #[error("event encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}
