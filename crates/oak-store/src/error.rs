use std::fmt;

/// Result type for oak-store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the store layer
#[derive(Debug)]
pub enum Error {
    /// Database operation failed
    Database(rusqlite::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Installed schema is newer than this build understands
    SchemaTooNew { installed: i32, supported: i32 },

    /// Query-specific error (invalid input, not found, etc.)
    Query(String),

    /// Backup/restore rejected (machine scope, malformed dump)
    Restore(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => write!(f, "Database error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::SchemaTooNew {
                installed,
                supported,
            } => write!(
                f,
                "Database schema version {} is newer than supported version {}",
                installed, supported
            ),
            Error::Query(msg) => write!(f, "Query error: {}", msg),
            Error::Restore(msg) => write!(f, "Restore error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::SchemaTooNew { .. } | Error::Query(_) | Error::Restore(_) => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
