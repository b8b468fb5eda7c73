//! Domain error types for the server.

use std::fmt;
use std::net::SocketAddr;

/// Errors that stop the server from starting or serving.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration could not be loaded or deserialized.
    Config { details: String },
    /// Configuration loaded but is not usable.
    InvalidConfig { details: String },
    /// An access control rule failed to compile.
    InvalidPolicy { details: String },
    /// The listener could not be bound.
    Bind { address: SocketAddr, details: String },
    /// The server stopped with an error.
    Serve { details: String },
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "failed to load configuration: {}", details),
            Self::InvalidConfig { details } => write!(f, "invalid configuration: {}", details),
            Self::InvalidPolicy { details } => {
                write!(f, "invalid access control configuration: {}", details)
            }
            Self::Bind { address, details } => {
                write!(f, "failed to bind to {}: {}", address, details)
            }
            Self::Serve { details } => write!(f, "server error: {}", details),
        }
    }
}

impl std::error::Error for ServerError {}
