use std::fmt;

/// Result type for oak-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while assembling or running the daemon
#[derive(Debug)]
pub enum Error {
    /// Store layer error
    Store(oak_store::Error),

    /// Vector layer error
    Vector(oak_vector::Error),

    /// Model provider error
    Model(oak_model::Error),

    /// Engine error
    Engine(oak_engine::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Daemon failed to start (port taken, bad bind address, ...)
    Startup(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Store(err) => write!(f, "Store error: {}", err),
            Error::Vector(err) => write!(f, "Vector error: {}", err),
            Error::Model(err) => write!(f, "Model error: {}", err),
            Error::Engine(err) => write!(f, "Engine error: {}", err),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Startup(msg) => write!(f, "Daemon startup error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Store(err) => Some(err),
            Error::Vector(err) => Some(err),
            Error::Model(err) => Some(err),
            Error::Engine(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Config(_) | Error::Startup(_) => None,
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

impl From<oak_engine::Error> for Error {
    fn from(err: oak_engine::Error) -> Self {
        Error::Engine(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::Config(err.to_string())
    }
}
