use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Error payload returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Bad Request")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::error::DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Payment signature did not match the gateway's HMAC scheme.
    #[error("Payment signature verification failed")]
    SignatureInvalid,

    /// Recomputed total differs from the claimed total at minor-unit
    /// precision. Treated as a tampering signal, not a rounding issue.
    #[error("Recomputed amount does not match the paid amount")]
    PriceMismatch,

    #[error("Booking cannot be cancelled after {0} hours")]
    CancellationWindowExpired(i64),

    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    #[error("Payout phase {attempted} cannot be released before phase {required}")]
    OutOfOrderPayout { attempted: u8, required: u8 },

    #[error("Invalid fulfillment step: {0}")]
    InvalidStep(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_)
            | Self::InvalidOperation(_)
            | Self::SignatureInvalid
            | Self::PriceMismatch
            | Self::CancellationWindowExpired(_)
            | Self::AlreadyCancelled
            | Self::OutOfOrderPayout { .. }
            | Self::InvalidStep(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::GatewayUnavailable(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Message suitable for HTTP responses. Internal errors return generic
    /// messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) | Self::Other(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let err = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        (status, Json(err)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integrity_failures_map_to_bad_request() {
        assert_eq!(
            ServiceError::SignatureInvalid.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::PriceMismatch.status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn gateway_failures_are_retryable_upstream_errors() {
        let err = ServiceError::GatewayUnavailable("timeout".into());
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn database_errors_do_not_leak_details() {
        let err = ServiceError::DatabaseError(sea_orm::DbErr::Custom(
            "connection string with password".into(),
        ));
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn out_of_order_payout_names_both_phases() {
        let err = ServiceError::OutOfOrderPayout {
            attempted: 2,
            required: 1,
        };
        assert!(err.to_string().contains('2'));
        assert!(err.to_string().contains('1'));
    }
}
