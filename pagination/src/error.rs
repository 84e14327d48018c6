use thiserror::Error;

/// Failure of a row-window fetch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PaginationError {
    /// The remote page request failed. The skeleton page is discarded and
    /// the scope stays where it was before the request.
    #[error(
        "page fetch failed{}: {message}",
        .status.map(|s| format!(" with status {s}")).unwrap_or_default()
    )]
    Fetch { status: Option<u16>, message: String },

    /// The request lacks the scope or metadata it needs. Never surfaced to
    /// callers of the store; it resolves to an empty, exhausted page.
    #[error("pagination disabled: {reason}")]
    Disabled { reason: String },
}

impl PaginationError {
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Fetch {
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self::Disabled {
            reason: reason.into(),
        }
    }

    pub fn is_disabled(&self) -> bool {
        matches!(self, Self::Disabled { .. })
    }
}

pub type Result<T> = std::result::Result<T, PaginationError>;
