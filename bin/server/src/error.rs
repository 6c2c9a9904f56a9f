//! Error types for the HTTP surface.
//!
//! Controller errors are mapped to user-safe JSON bodies here. Internal
//! detail is logged and never returned to the caller.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lucy_conversation::ControllerError;
use rootcause::prelude::Report;
use serde_json::json;
use std::fmt;

/// Errors returned by the conversation endpoints.
#[derive(Debug)]
pub enum ApiError {
    /// A controller operation failed.
    Controller(Report<ControllerError>),
    /// The request body could not be decoded.
    InvalidBody { details: String },
    /// The claim carried a malformed wallet address.
    InvalidWalletAddress,
}

impl From<Report<ControllerError>> for ApiError {
    fn from(report: Report<ControllerError>) -> Self {
        Self::Controller(report)
    }
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = match self {
            Self::InvalidBody { details } => {
                tracing::debug!(%details, "rejected request body");
                return error_body(StatusCode::BAD_REQUEST, "Invalid request body");
            }
            Self::InvalidWalletAddress => {
                return error_body(StatusCode::BAD_REQUEST, "Invalid wallet address");
            }
            Self::Controller(report) => report,
        };

        match report.current_context() {
            ControllerError::Cooldown { cooldown_ends } => (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Conversation in cooldown",
                    "cooldownEnds": cooldown_ends.timestamp_millis(),
                    "canSendMessage": false,
                })),
            )
                .into_response(),
            ControllerError::NotEnded => {
                error_body(StatusCode::BAD_REQUEST, "Conversation has not ended yet")
            }
            ControllerError::NoConversation => {
                error_body(StatusCode::BAD_REQUEST, "No active conversation")
            }
            ControllerError::InvalidInput { reason } => {
                error_body(StatusCode::BAD_REQUEST, reason)
            }
            ControllerError::Completion { .. } => {
                tracing::error!(error = %report, "completion failed");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "failed to get response")
            }
            ControllerError::Storage { .. } => {
                tracing::error!(error = %report, "conversation storage failed");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Something went wrong")
            }
            ControllerError::Publish { .. } => {
                tracing::error!(error = %report, "sharing claimed conversation failed");
                error_body(StatusCode::INTERNAL_SERVER_ERROR, "Failed to share conversation")
            }
        }
    }
}

/// Errors that stop the server from starting.
#[derive(Debug)]
pub enum StartupError {
    /// Configuration is missing or invalid.
    Config { details: String },
    /// The storage backend could not be opened.
    Storage { details: String },
    /// The listener could not bind.
    Bind { addr: String, details: String },
    /// The server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::Storage { details } => write!(f, "failed to open storage: {details}"),
            Self::Bind { addr, details } => write!(f, "failed to bind {addr}: {details}"),
            Self::Serve { details } => write!(f, "server error: {details}"),
        }
    }
}

impl std::error::Error for StartupError {}
