use std::fmt;

/// Result type for oak-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the engine layer
#[derive(Debug)]
pub enum Error {
    /// Relational store failure
    Store(oak_store::Error),

    /// Vector store failure
    Vector(oak_vector::Error),

    /// Model provider failure
    Model(oak_model::Error),

    /// Hook payload failure
    Hook(oak_hooks::Error),

    /// Invalid retrieval/search request
    QueryValidation(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "Store error: {}", err),
            Error::Vector(err) => write!(f, "Vector error: {}", err),
            Error::Model(err) => write!(f, "Model error: {}", err),
            Error::Hook(err) => write!(f, "Hook error: {}", err),
            Error::QueryValidation(msg) => write!(f, "Query validation error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Vector(err) => Some(err),
            Error::Model(err) => Some(err),
            Error::Hook(err) => Some(err),
            Error::QueryValidation(_) => None,
        }
    }
}

impl From<oak_store::Error> for Error {
    fn from(err: oak_store::Error) -> Self {
        Error::Store(err)
    }
}

impl From<oak_vector::Error> for Error {
    fn from(err: oak_vector::Error) -> Self {
        Error::Vector(err)
    }
}

impl From<oak_model::Error> for Error {
    fn from(err: oak_model::Error) -> Self {
        Error::Model(err)
    }
}

impl From<oak_hooks::Error> for Error {
    fn from(err: oak_hooks::Error) -> Self {
        Error::Hook(err)
    }
}
