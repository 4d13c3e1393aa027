use std::fmt;

/// Result type for oak-model operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur at the model-provider boundary
#[derive(Debug)]
pub enum Error {
    /// Transport-level failure (connection refused, deadline expired).
    /// Retryable: the batch stays queued and recovery tries again.
    Transport(reqwest::Error),

    /// Provider answered with a non-success status
    Provider { status: u16, body: String },

    /// Provider answered 200 but the payload is not the structured JSON
    /// the contract requires. Counts against the batch's attempt budget.
    MalformedResponse(String),

    /// Provider returned embeddings whose count or width is inconsistent
    BadEmbedding(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Transport(err) => write!(f, "Provider transport error: {}", err),
            Error::Provider { status, body } => {
                write!(f, "Provider returned status {}: {}", status, body)
            }
            Error::MalformedResponse(msg) => write!(f, "Malformed provider response: {}", msg),
            Error::BadEmbedding(msg) => write!(f, "Bad embedding payload: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Transport(err) => Some(err),
            Error::Provider { .. } | Error::MalformedResponse(_) | Error::BadEmbedding(_) => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Transport(err)
    }
}
