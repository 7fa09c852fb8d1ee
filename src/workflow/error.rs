// src/workflow/error.rs
use axum::http::StatusCode;
use serde_json::json;
use thiserror::Error;

use crate::db::models::outpass::OutpassStatus;
use crate::db::models::user::Role;
use crate::utils::api_response::ApiResponse;
use crate::workflow::transitions::Action;

/// Business failures of the outpass engine. Every variant is a terminal
/// per-call outcome; only `Database` may be transient and worth a retry by
/// the caller.
#[derive(Debug, Error)]
pub enum OutpassError {
    #[error("{role} is not permitted to {action}")]
    Unauthorized { role: Role, action: Action },

    #[error("cannot {action} while the outpass is {current} (requires {required})")]
    InvalidTransition {
        action: Action,
        current: OutpassStatus,
        required: String,
    },

    #[error("student already has an active outpass request")]
    ActiveRequestExists,

    #[error("Invalid code")]
    CodeNotFound,

    #[error("Outpass not found")]
    NotFound,

    #[error("validation failed")]
    Validation(serde_json::Value),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<OutpassError> for ApiResponse<()> {
    fn from(err: OutpassError) -> Self {
        match &err {
            OutpassError::Unauthorized { .. } => {
                ApiResponse::error(StatusCode::FORBIDDEN, err.to_string(), None)
            }
            OutpassError::InvalidTransition {
                current, required, ..
            } => ApiResponse::error(
                StatusCode::CONFLICT,
                err.to_string(),
                Some(json!({
                    "current_status": current.to_string(),
                    "required_status": required,
                })),
            ),
            OutpassError::ActiveRequestExists => {
                ApiResponse::error(StatusCode::CONFLICT, err.to_string(), None)
            }
            // Deliberately generic: does not reveal whether the code ever
            // existed or which phase it belonged to.
            OutpassError::CodeNotFound => {
                ApiResponse::error(StatusCode::NOT_FOUND, "Invalid code", None)
            }
            OutpassError::NotFound => {
                ApiResponse::error(StatusCode::NOT_FOUND, "Outpass not found", None)
            }
            OutpassError::Validation(fields) => ApiResponse::error(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation failed",
                Some(fields.clone()),
            ),
            OutpassError::Database(e) => {
                tracing::error!(error = %e, "database failure");
                ApiResponse::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error",
                    Some(json!({ "error": e.to_string() })),
                )
            }
        }
    }
}
