use std::fmt;

/// Result type for oak-hooks operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while normalizing hook payloads.
/// These never reach the agent as failures: the HTTP layer logs them and
/// answers ok with an empty context.
#[derive(Debug)]
pub enum Error {
    /// JSON body did not parse
    Json(serde_json::Error),

    /// Payload parsed but lacks a field the event requires
    Malformed(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Malformed(msg) => write!(f, "Malformed hook payload: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Json(err) => Some(err),
            Error::Malformed(_) => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}
