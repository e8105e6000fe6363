//! Error types for Baton.

use thiserror::Error;

/// Broad error category for routing recovery logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    ToolExecution,
    Cancellation,
    StepBudget,
}

/// Primary error type for all Baton operations.
#[derive(Error, Debug)]
pub enum BatonError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("Tool execution error: {tool_name}: {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Exceeded maximum of {max_steps} steps")]
    MaxStepsExceeded { max_steps: usize },
}

impl BatonError {
    /// Create an API error from a status code and message.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Authentication(_) => ErrorCategory::Authentication,
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) | Self::Stream(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::AgentNotFound(_) | Self::SessionNotFound(_) => {
                ErrorCategory::Configuration
            }
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::ToolExecution { .. } | Self::InvalidArgument(_) => ErrorCategory::ToolExecution,
            Self::Cancelled => ErrorCategory::Cancellation,
            Self::MaxStepsExceeded { .. } => ErrorCategory::StepBudget,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Whether the caller referenced something that does not exist or is
    /// misconfigured. These are surfaced immediately and never retried.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::Configuration | ErrorCategory::Authentication
        )
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, BatonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_retryable_client_errors_are_not() {
        assert!(BatonError::api(503, "unavailable").is_retryable());
        assert!(BatonError::Timeout(10).is_retryable());
        assert!(BatonError::Stream("closed".into()).is_retryable());
        assert!(!BatonError::api(400, "bad request").is_retryable());
        assert!(!BatonError::Cancelled.is_retryable());
    }

    #[test]
    fn auth_status_is_classified_as_authentication() {
        assert_eq!(
            BatonError::api(401, "nope").category(),
            ErrorCategory::Authentication
        );
        assert!(BatonError::api(403, "nope").is_configuration());
    }

    #[test]
    fn unknown_references_are_configuration_errors() {
        assert!(BatonError::SessionNotFound("s".into()).is_configuration());
        assert!(BatonError::AgentNotFound("a".into()).is_configuration());
        assert!(!BatonError::MaxStepsExceeded { max_steps: 3 }.is_configuration());
    }
}
