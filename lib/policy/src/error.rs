//! Policy error types.

use std::fmt;

/// Policy errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// An access control rule could not be compiled.
    InvalidRule {
        /// Position of the rule in the configured list.
        index: usize,
        /// Error details.
        details: String,
    },
    /// The policy backend could not answer.
    Unavailable {
        /// Error details.
        details: String,
    },
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRule { index, details } => {
                write!(f, "invalid access control rule #{}: {}", index, details)
            }
            Self::Unavailable { details } => {
                write!(f, "policy evaluation unavailable: {}", details)
            }
        }
    }
}

impl std::error::Error for PolicyError {}
