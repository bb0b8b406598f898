//! Core error taxonomy
//!
//! Every component reports failures through `CoreError`. Handlers map the
//! variants onto the out-of-band error channel (`kind` strings) and an HTTP
//! status; user-visible messages are bounded and never carry stack traces.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Unified error type for the query pipeline and its ports.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("upstream unavailable: {component}: {message}")]
    UpstreamUnavailable { component: &'static str, message: String },

    #[error("timeout after {0}s")]
    Timeout(u64),

    #[error("canceled")]
    Canceled,

    #[error("incompatible persisted state: found schema_version {found}, supported {supported}")]
    IncompatibleState { found: i64, supported: i64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wire-level error kind, first line of every non-success payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_ARGUMENT",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "INVALID_ARGUMENT",
            Self::UpstreamUnavailable { .. } => "UPSTREAM_UNAVAILABLE",
            Self::Timeout(_) => "TIMEOUT",
            Self::Canceled => "CANCELED",
            Self::IncompatibleState { .. } => "INCOMPATIBLE_STATE",
            Self::Internal(_) => "INTERNAL",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::UpstreamUnavailable { .. })
    }

    /// Bounded, structured message: kind on the first line, actionable body after.
    pub fn render(&self) -> String {
        let next_step = match self {
            Self::InvalidInput(_) | Self::Validation(_) => "Check the request arguments and retry.",
            Self::NotFound(_) => "Verify the identifier and retry.",
            Self::UpstreamUnavailable { .. } => "Retry later or check the upstream service.",
            Self::Timeout(_) => "Retry with a narrower query or a longer deadline.",
            Self::Canceled => "The caller canceled the request.",
            Self::IncompatibleState { .. } => "Upgrade the service or restore a compatible store.",
            Self::Internal(_) => "This is a bug; check the service logs.",
        };
        let mut body = format!("{}\n{}\n{}", self.kind(), self, next_step);
        if body.len() > 1024 {
            let mut cut = 1024;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        body
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("row not found".to_string()),
            other => Self::UpstreamUnavailable {
                component: "sqlite",
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization: {}", err))
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Self::InvalidInput(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Canceled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Self::IncompatibleState { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if matches!(self, Self::Internal(_)) {
            tracing::error!("internal error: {}", self);
        }

        let body = Json(serde_json::json!({
            "kind": self.kind(),
            "error": self.to_string(),
            "code": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_wire_contract() {
        assert_eq!(CoreError::InvalidInput("x".into()).kind(), "INVALID_ARGUMENT");
        assert_eq!(CoreError::NotFound("x".into()).kind(), "NOT_FOUND");
        assert_eq!(
            CoreError::UpstreamUnavailable { component: "llm", message: "down".into() }.kind(),
            "UPSTREAM_UNAVAILABLE"
        );
        assert_eq!(CoreError::Timeout(5).kind(), "TIMEOUT");
        assert_eq!(CoreError::Canceled.kind(), "CANCELED");
        assert_eq!(CoreError::IncompatibleState { found: 9, supported: 1 }.kind(), "INCOMPATIBLE_STATE");
    }

    #[test]
    fn render_is_bounded_and_leads_with_kind() {
        let long = "x".repeat(4096);
        let rendered = CoreError::Internal(long).render();
        assert!(rendered.len() <= 1024);
        assert!(rendered.starts_with("INTERNAL"));
    }

    #[test]
    fn retryable_classification() {
        assert!(CoreError::Timeout(1).is_retryable());
        assert!(!CoreError::Canceled.is_retryable());
        assert!(!CoreError::Validation("short".into()).is_retryable());
    }
}
