use playground_pagination::PaginationError;
use playground_state::ApiError;

/// Failure building a client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP client setup failed: {0}")]
    Build(#[from] reqwest::Error),

    #[error("invalid base URL {url:?}")]
    BaseUrl { url: String },
}

/// Outcome of one request before it is mapped into a caller's error type.
#[derive(Debug)]
pub(crate) enum RequestError {
    Transport(reqwest::Error),
    Status { status: u16, body: String },
    Decode(String),
}

impl From<RequestError> for ApiError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Transport(e) => ApiError::Transport(e.to_string()),
            RequestError::Status { status, body } => ApiError::Status {
                status,
                message: body,
            },
            RequestError::Decode(message) => ApiError::Decode(message),
        }
    }
}

impl From<RequestError> for PaginationError {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::Transport(e) => PaginationError::fetch(e.to_string()),
            RequestError::Status { status, body } => PaginationError::status(status, body),
            RequestError::Decode(message) => {
                PaginationError::fetch(format!("invalid response body: {message}"))
            }
        }
    }
}
