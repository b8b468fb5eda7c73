//! Error types for the session crate.
//!
//! Errors here describe collaborator failures: the store could not be
//! reached or answered with something unusable. A credential that is simply
//! wrong is not an error; providers report it as `Ok(None)`.

use std::fmt;

/// Errors from session and credential operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// The backing store could not be reached.
    Unavailable { reason: String },
    /// A stored record could not be decoded.
    Corrupt { key: String, reason: String },
    /// A password hash could not be processed.
    Hashing { reason: String },
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { reason } => {
                write!(f, "session store unavailable: {reason}")
            }
            Self::Corrupt { key, reason } => {
                write!(f, "stored record '{key}' is corrupt: {reason}")
            }
            Self::Hashing { reason } => {
                write!(f, "password hashing failed: {reason}")
            }
        }
    }
}

impl std::error::Error for SessionError {}
