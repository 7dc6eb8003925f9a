//! Error handling module for the reviewer backend.
//!
//! Provides the domain error taxonomy with mapping to HTTP status codes and response envelopes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const INVALID_INPUT: &str = "INVALID_INPUT";
    pub const TEAM_EXISTS: &str = "TEAM_EXISTS";
    pub const PR_EXISTS: &str = "PR_EXISTS";
    pub const PR_MERGED: &str = "PR_MERGED";
    pub const NOT_ASSIGNED: &str = "NOT_ASSIGNED";
    pub const NO_CANDIDATE: &str = "NO_CANDIDATE";
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed or missing fields
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("team {0} not found")]
    TeamNotFound(String),
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("author {0} not found")]
    AuthorNotFound(String),
    #[error("pull request {0} not found")]
    ReviewRequestNotFound(String),
    #[error("{0} not found")]
    NotFound(String),

    #[error("team {0} already exists")]
    TeamExists(String),
    #[error("pull request {0} already exists")]
    ReviewRequestExists(String),
    #[error("pull request {0} is already merged")]
    ReviewAlreadyMerged(String),
    #[error("user {user_id} is not assigned as reviewer of {pr_id}")]
    ReviewerNotAssigned { pr_id: String, user_id: String },
    #[error("no available candidate to review {0}")]
    NoCandidateAvailable(String),

    /// Storage failure that has no domain meaning
    #[error("database error: {0}")]
    Database(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) | AppError::TeamExists(_) => StatusCode::BAD_REQUEST,
            AppError::TeamNotFound(_)
            | AppError::UserNotFound(_)
            | AppError::AuthorNotFound(_)
            | AppError::ReviewRequestNotFound(_)
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::ReviewRequestExists(_)
            | AppError::ReviewAlreadyMerged(_)
            | AppError::ReviewerNotAssigned { .. }
            | AppError::NoCandidateAvailable(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput(_) => codes::INVALID_INPUT,
            AppError::TeamExists(_) => codes::TEAM_EXISTS,
            AppError::ReviewRequestExists(_) => codes::PR_EXISTS,
            AppError::ReviewAlreadyMerged(_) => codes::PR_MERGED,
            AppError::ReviewerNotAssigned { .. } => codes::NOT_ASSIGNED,
            AppError::NoCandidateAvailable(_) => codes::NO_CANDIDATE,
            AppError::TeamNotFound(_)
            | AppError::UserNotFound(_)
            | AppError::AuthorNotFound(_)
            | AppError::ReviewRequestNotFound(_)
            | AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// Message safe to hand back to a client. Storage details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(err.to_string())
    }
}

/// Error details in the response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
}

/// Error response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetails,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        Self {
            success: false,
            error: ErrorDetails {
                code: error.error_code().to_string(),
                message: error.public_message(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
