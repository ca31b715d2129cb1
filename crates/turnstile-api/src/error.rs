//! Turnstile: API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use turnstile_core::error::DomainError;
use uuid::Uuid;

/// Startup errors for the API server.
#[derive(Debug, Error)]
pub enum AppError {
    /// A required environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Schema migration failed.
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Redis connection error.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Tracing or OTLP exporter setup failed.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Network binding or I/O error.
    #[error("server error: {0}")]
    Server(#[from] std::io::Error),
}

/// JSON body returned for error responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Machine-readable error code.
    pub error: &'static str,
    /// Human-readable error message.
    pub message: String,
    /// Tickets the client should drop from its selection.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ticket_ids: Vec<Uuid>,
}

impl ErrorBody {
    /// Builds the body and status for a domain error.
    ///
    /// Structural and infrastructure failures get a generic message; their
    /// detail is logged instead of returned.
    #[must_use]
    pub fn from_domain(err: &DomainError) -> (StatusCode, Self) {
        let (status, code, message) = match err {
            DomainError::UnavailableTicket { .. } => {
                (StatusCode::CONFLICT, "unavailable_ticket", err.to_string())
            }
            DomainError::ReservationExpired { .. } => {
                (StatusCode::GONE, "reservation_expired", err.to_string())
            }
            DomainError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", err.to_string()),
            DomainError::Validation(_) => {
                (StatusCode::BAD_REQUEST, "validation_error", err.to_string())
            }
            DomainError::ConfirmationFailed(_) => {
                error!(error = %err, "confirmation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "confirmation_failed",
                    "the reservation could not be confirmed; create a new reservation and retry"
                        .to_owned(),
                )
            }
            DomainError::Infrastructure(_) => {
                error!(error = %err, "backing store failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "service_unavailable",
                    "a backing service is temporarily unavailable; retry later".to_owned(),
                )
            }
        };
        (
            status,
            Self {
                error: code,
                message,
                ticket_ids: err.offending_ticket_ids().to_vec(),
            },
        )
    }
}

/// HTTP-layer wrapper around `DomainError` that implements `IntoResponse`.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = ErrorBody::from_domain(&self.0);
        (status, Json(body)).into_response()
    }
}
