//! # API Error
//!
//! Every handler returns [`ApiResult`]. Errors render as the failure
//! envelope:
//!
//! ```json
//! { "success": false, "error": { "message": "...", "code": "NOT_FOUND" } }
//! ```
//!
//! ## Mapping
//! ```text
//! DbError::NotFound ─────────────────► 404 NOT_FOUND
//! DbError::UniqueViolation ──────────► 409 CONFLICT
//! CoreError::InvalidTransition ──────► 409 INVALID_TRANSITION
//! CoreError::InsufficientCredit ─────► 422 INSUFFICIENT_CREDIT
//! CoreError::Validation / amounts ───► 400 VALIDATION_ERROR
//! DbError::ConnectionFailed / pool ──► 503 DATABASE_ERROR
//! anything else ─────────────────────► 500 (details logged, not returned)
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use bookon_core::{CoreError, ValidationError};
use bookon_db::DbError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Clone)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        ApiError {
            status,
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "FORBIDDEN", msg)
    }

    pub fn invalid_signature(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_SIGNATURE", msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
    }

    /// Logs `detail` and returns a generic 500.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        tracing::error!(error = %detail, "Internal error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL",
            "Internal server error",
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorEnvelope<'a> {
            success: bool,
            error: ErrorBody<'a>,
        }

        #[derive(Serialize)]
        struct ErrorBody<'a> {
            message: &'a str,
            code: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            details: Option<&'a serde_json::Value>,
        }

        if self.status.is_client_error() {
            tracing::debug!(status = %self.status, code = self.code, message = %self.message, "Request rejected");
        }

        (
            self.status,
            Json(ErrorEnvelope {
                success: false,
                error: ErrorBody {
                    message: &self.message,
                    code: self.code,
                    details: self.details.as_ref(),
                },
            }),
        )
            .into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::InvalidTransition { .. } | CoreError::PaymentNotConfirmed { .. } => {
                Self::new(StatusCode::CONFLICT, "INVALID_TRANSITION", message)
            }
            CoreError::InsufficientCredit {
                available,
                requested,
            } => Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_CREDIT", message)
                .with_details(serde_json::json!({
                    "available": available.pence(),
                    "requested": requested.pence(),
                })),
            CoreError::NoFeeConfig { .. } => Self::conflict(message),
            CoreError::InvalidAmount { .. }
            | CoreError::FeesExceedGross { .. }
            | CoreError::InvalidFeeConfig { .. }
            | CoreError::Validation(_) => Self::validation(message),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::validation(err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Core(core) => core.into(),
            DbError::NotFound { .. } => Self::not_found(err.to_string()),
            DbError::UniqueViolation { .. } => Self::conflict(err.to_string()),
            DbError::ForeignKeyViolation { .. } | DbError::CheckViolation { .. } => {
                tracing::warn!(error = %err, "Constraint rejected write");
                Self::validation("Request violates a data constraint")
            }
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                tracing::error!(error = %err, "Database unavailable");
                Self::new(
                    StatusCode::SERVICE_UNAVAILABLE,
                    "DATABASE_ERROR",
                    "Database unavailable",
                )
            }
            DbError::MigrationFailed(_) | DbError::QueryFailed(_) | DbError::Internal(_) => {
                tracing::error!(error = %err, "Database error");
                Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "Database error",
                )
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<axum::extract::rejection::QueryRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookon_core::Money;

    #[test]
    fn test_not_found_maps_to_404() {
        let err: ApiError = DbError::not_found("Booking", "b-1").into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_core_errors_inside_db_errors_keep_their_code() {
        let err: ApiError =
            DbError::Core(CoreError::invalid_transition("TFC booking", "t-1", "Paid", "Cancelled"))
                .into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_insufficient_credit_has_details() {
        let err: ApiError = CoreError::InsufficientCredit {
            available: Money::from_pence(500),
            requested: Money::from_pence(1_500),
        }
        .into();
        assert_eq!(err.code(), "INSUFFICIENT_CREDIT");
        assert_eq!(err.details.as_ref().unwrap()["available"], 500);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let err: ApiError = DbError::QueryFailed("relation \"bookings\" does not exist".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.message, "Database error");
    }

    #[test]
    fn test_validation_maps_to_400() {
        let err: ApiError = ValidationError::Required {
            field: "ids".to_string(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
