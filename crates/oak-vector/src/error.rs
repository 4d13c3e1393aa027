use std::fmt;

/// Result type for oak-vector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the vector layer
#[derive(Debug)]
pub enum Error {
    /// IO operation failed
    Io(std::io::Error),

    /// Snapshot (de)serialization failed
    Serialization(serde_json::Error),

    /// Vector length does not match the collection's dimensionality.
    /// Writes are refused until an operator rebuild.
    DimensionMismatch {
        collection: String,
        expected: usize,
        got: usize,
    },

    /// Collection does not exist
    UnknownCollection(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Serialization(err) => write!(f, "Snapshot error: {}", err),
            Error::DimensionMismatch {
                collection,
                expected,
                got,
            } => write!(
                f,
                "Collection '{}' holds {}-dimensional vectors but got {}; rebuild required",
                collection, expected, got
            ),
            Error::UnknownCollection(name) => write!(f, "Unknown collection '{}'", name),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Serialization(err) => Some(err),
            Error::DimensionMismatch { .. } | Error::UnknownCollection(_) => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err)
    }
}
