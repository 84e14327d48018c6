//! Error taxonomy for the playground state layer.
//!
//! Usage errors are programmer mistakes and always propagate to the caller.
//! Remote and schema errors are caught at the fetch/mutation boundary,
//! logged, surfaced as notifications, and leave the cache at its last good
//! value.

use thiserror::Error;

/// Error category for structured logging and boundary behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Accessor used without the configuration it requires
    UsageError,
    /// A remote call failed or returned a non-success status
    RemoteError,
    /// The app schema is missing or unusable
    SchemaError,
    /// `playground.toml` or env misconfigured
    ConfigError,
    /// Unexpected logic bugs
    InternalError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UsageError => "USAGE_ERROR",
            Self::RemoteError => "REMOTE_ERROR",
            Self::SchemaError => "SCHEMA_ERROR",
            Self::ConfigError => "CONFIG_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether the error is caught at the fetch/mutation boundary instead of
    /// being returned to the consumer.
    pub fn caught_at_boundary(&self) -> bool {
        matches!(self, Self::RemoteError | Self::SchemaError)
    }
}

/// Failure reported by a [`PlaygroundApi`](crate::api::PlaygroundApi) call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("request failed with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response body: {0}")]
    Decode(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Playground state error with category and context
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StateError {
    #[error("usage error: {message}")]
    Usage { message: String },

    #[error("{operation} failed: {source}")]
    Remote {
        operation: String,
        #[source]
        source: ApiError,
    },

    #[error("schema error: {message}")]
    Schema { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl StateError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Usage { .. } => ErrorCategory::UsageError,
            Self::Remote { .. } => ErrorCategory::RemoteError,
            Self::Schema { .. } => ErrorCategory::SchemaError,
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::Internal { .. } => ErrorCategory::InternalError,
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage {
            message: message.into(),
        }
    }

    pub fn remote(operation: impl Into<String>, source: ApiError) -> Self {
        Self::Remote {
            operation: operation.into(),
            source,
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

/// Result type alias for playground state operations
pub type Result<T> = std::result::Result<T, StateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_policy_by_category() {
        assert!(!StateError::usage("x").category().caught_at_boundary());
        assert!(StateError::schema("x").category().caught_at_boundary());
        assert!(
            StateError::remote("delete", ApiError::Transport("reset".into()))
                .category()
                .caught_at_boundary()
        );
        assert!(!StateError::internal("x").category().caught_at_boundary());
    }

    #[test]
    fn remote_error_renders_operation_and_status() {
        let err = StateError::remote(
            "save variant",
            ApiError::Status {
                status: 500,
                message: "boom".into(),
            },
        );
        assert_eq!(
            err.to_string(),
            "save variant failed: request failed with status 500: boom"
        );
        assert_eq!(err.category().as_str(), "REMOTE_ERROR");
    }
}
