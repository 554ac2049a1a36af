//! Core error type for the News Flow pipeline.
//!
//! `FlowError` is used throughout the core domain (engine, stores, config).
//! When the `axum` feature is enabled, it also implements `IntoResponse`
//! so it can be used directly as an axum handler error type.

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// No resumable checkpoint and no seed input, or an unusable config.
    /// Fatal and never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Crew '{crew}' failed: {message}")]
    Collaborator { crew: String, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlowError {
    pub fn collaborator(crew: impl Into<String>, err: impl std::fmt::Display) -> Self {
        FlowError::Collaborator {
            crew: crew.into(),
            message: err.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for FlowError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            FlowError::NotFound(_) => StatusCode::NOT_FOUND,
            FlowError::BadRequest(_) | FlowError::Configuration(_) => StatusCode::BAD_REQUEST,
            FlowError::Conflict(_) => StatusCode::CONFLICT,
            FlowError::Collaborator { .. }
            | FlowError::Database(_)
            | FlowError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
