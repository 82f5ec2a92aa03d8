use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionPhase;

/// Broad error category used for user-facing handling and retry behavior.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClientErrorCategory {
    /// Invalid configuration or unsupported state.
    Config,
    /// Authentication/authorization failure.
    Auth,
    /// Transient network or transport failure.
    Network,
    /// Rate-limited by the backend.
    RateLimited,
    /// Form or field input rejected before any remote call.
    Validation,
    /// Conflict with existing remote state (username taken, duplicate create).
    Conflict,
    /// Local persistence failure.
    Storage,
    /// Serialization/deserialization failure.
    Serialization,
    /// Internal client bug or invariant break.
    Internal,
}

/// Stable error payload emitted across the command/event boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ClientError {
    /// High-level error category.
    pub category: ClientErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional retry hint in milliseconds.
    pub retry_after_ms: Option<u64>,
}

impl ClientError {
    /// Construct a new client error.
    pub fn new(
        category: ClientErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Attach a retry hint to the error.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(retry_after.as_millis() as u64);
        self
    }

    /// Build a standard invalid-state-transition error.
    pub fn invalid_state(current: SessionPhase, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            ClientErrorCategory::Internal,
            "invalid_state_transition",
            format!("cannot run '{action}' while session is in phase {current:?}"),
        )
    }

    /// Build a field-scoped validation error.
    pub fn validation(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ClientErrorCategory::Validation, code, message)
    }

    /// Build a conflict error (username taken, duplicate document).
    pub fn conflict(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ClientErrorCategory::Conflict, code, message)
    }

    /// Whether retrying the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category,
            ClientErrorCategory::Network | ClientErrorCategory::RateLimited
        )
    }
}

/// Map HTTP status codes to client error categories.
pub fn classify_http_status(status: u16) -> ClientErrorCategory {
    match status {
        401 | 403 => ClientErrorCategory::Auth,
        409 | 412 => ClientErrorCategory::Conflict,
        408 | 429 => ClientErrorCategory::RateLimited,
        400..=499 => ClientErrorCategory::Config,
        500..=599 => ClientErrorCategory::Network,
        _ => ClientErrorCategory::Internal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_http_status_categories() {
        assert_eq!(classify_http_status(401), ClientErrorCategory::Auth);
        assert_eq!(classify_http_status(409), ClientErrorCategory::Conflict);
        assert_eq!(classify_http_status(412), ClientErrorCategory::Conflict);
        assert_eq!(classify_http_status(429), ClientErrorCategory::RateLimited);
        assert_eq!(classify_http_status(404), ClientErrorCategory::Config);
        assert_eq!(classify_http_status(503), ClientErrorCategory::Network);
        assert_eq!(classify_http_status(700), ClientErrorCategory::Internal);
    }

    #[test]
    fn keeps_invalid_state_error_code_stable() {
        let err = ClientError::invalid_state(SessionPhase::Unauthenticated, "open_conversation");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(err.category, ClientErrorCategory::Internal);
    }

    #[test]
    fn persists_retry_after_in_millis() {
        let err = ClientError::new(ClientErrorCategory::RateLimited, "rate_limited", "wait")
            .with_retry_after(Duration::from_secs(3));
        assert_eq!(err.retry_after_ms, Some(3000));
    }

    #[test]
    fn only_transient_categories_are_retryable() {
        assert!(ClientError::new(ClientErrorCategory::Network, "n", "n").is_retryable());
        assert!(!ClientError::validation("missing_field", "x").is_retryable());
        assert!(!ClientError::conflict("username_taken", "x").is_retryable());
    }
}
