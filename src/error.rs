use std::fmt;
use std::io;
use std::error::Error as StdError;

/// Custom error type for the application
#[derive(Debug)]
pub enum Error {
    /// I/O errors
    Io(io::Error),
    /// WiFi association errors
    WiFiError(String),
    /// TCP listener/connection errors
    TcpError(String),
    /// Control-channel errors
    LinkError(String),
    /// Persistent storage errors
    StorageError(String),
    /// General errors
    General(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::WiFiError(msg) => write!(f, "WiFi error: {}", msg),
            Error::TcpError(msg) => write!(f, "TCP error: {}", msg),
            Error::LinkError(msg) => write!(f, "Link error: {}", msg),
            Error::StorageError(msg) => write!(f, "Storage error: {}", msg),
            Error::General(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::General(err.to_string())
    }
}

/// Result type for the application
pub type Result<T> = std::result::Result<T, Error>;
