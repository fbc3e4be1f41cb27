use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;

/// The error taxonomy shared by every component of the platform.
///
/// Each kind carries a single canonical HTTP status and a single canonical
/// MCP error code (see [`AppError::mcp_code`]); callers must not invent new
/// mappings at the edges.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("invalid input: {reason}")]
    InvalidInput {
        reason: String,
        offending_token: Option<String>,
    },

    #[error("unauthenticated")]
    Unauthenticated(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("busy")]
    Busy,

    #[error("timed out")]
    Timeout,

    #[error("dependency unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("payload too large")]
    TooLarge,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        AppError::InvalidInput {
            reason: reason.into(),
            offending_token: None,
        }
    }

    pub fn invalid_token(reason: impl Into<String>, token: impl Into<String>) -> Self {
        AppError::InvalidInput {
            reason: reason.into(),
            offending_token: Some(token.into()),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Busy => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Canonical MCP error code string, used by the streaming-HTTP transport.
    pub fn mcp_code(&self) -> &'static str {
        match self {
            AppError::InvalidInput { .. } => "InvalidParams",
            AppError::Unauthenticated(_) => "Unauthenticated",
            AppError::PermissionDenied(_) => "PermissionDenied",
            AppError::RateLimited { .. } => "ResourceExhausted",
            AppError::Busy => "ResourceExhausted",
            AppError::Timeout => "DeadlineExceeded",
            AppError::DependencyUnavailable(_) => "Unavailable",
            AppError::Conflict(_) => "AlreadyExists",
            AppError::NotFound(_) => "NotFound",
            AppError::TooLarge => "InvalidParams",
            AppError::Internal(_) => "Internal",
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::InvalidInput { .. } => "invalid_input",
            AppError::Unauthenticated(_) => "unauthenticated",
            AppError::PermissionDenied(_) => "permission_denied",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Busy => "busy",
            AppError::Timeout => "timeout",
            AppError::DependencyUnavailable(_) => "dependency_unavailable",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::TooLarge => "too_large",
            AppError::Internal(_) => "internal",
        }
    }

    fn public_message(&self) -> String {
        match self {
            AppError::InvalidInput { reason, .. } => reason.clone(),
            AppError::Unauthenticated(m) => m.clone(),
            AppError::PermissionDenied(m) => m.clone(),
            AppError::RateLimited { retry_after_secs } => {
                format!("rate limit exceeded, retry in {retry_after_secs}s")
            }
            AppError::Busy => "execution pool is saturated".to_string(),
            AppError::Timeout => "operation timed out".to_string(),
            AppError::DependencyUnavailable(m) => m.clone(),
            AppError::Conflict(m) => m.clone(),
            AppError::NotFound(m) => m.clone(),
            AppError::TooLarge => "request body exceeds the configured limit".to_string(),
            // Internal messages are never echoed back to the client.
            AppError::Internal(_) => "internal server error".to_string(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::InvalidInput {
                offending_token: Some(tok),
                ..
            } => Some(serde_json::json!({ "offending_token": tok })),
            AppError::RateLimited { retry_after_secs } => {
                Some(serde_json::json!({ "retry_after": retry_after_secs }))
            }
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
    request_id: String,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// Render the error envelope: `{ error: { code, message, details? }, request_id }`.
///
/// Stack traces and internal identifiers never appear here; they are logged
/// separately, keyed by the correlation id, via [`tracing`].
pub fn error_envelope(err: &AppError, request_id: &str) -> serde_json::Value {
    serde_json::to_value(ErrorBody {
        error: ErrorDetail {
            code: err.code(),
            message: err.public_message(),
            details: err.details(),
        },
        request_id: request_id.to_string(),
    })
    .expect("ErrorBody always serializes")
}

/// Marker left on the response extensions when an [`AppError`] was rendered
/// without knowing the request's correlation id. The correlation-id
/// middleware rewrites `request_id` in the body to the real value before the
/// response leaves the process; see [`crate::correlation::correlation_id_layer`].
pub struct NeedsRequestId;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let AppError::Internal(ref msg) = self {
            tracing::error!(error = %msg, "internal error");
        }
        let status = self.status();
        let body = error_envelope(&self, "unset");
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(NeedsRequestId);
        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = http::HeaderValue::from_str(&retry_after_secs.to_string()) {
                response
                    .headers_mut()
                    .insert(http::header::RETRY_AFTER, value);
            }
        }
        response
    }
}

pub type AppResult<T> = Result<T, AppError>;
