//! Authorization error types.

use std::fmt;

/// Errors surfaced by [`Authz::authorize`](crate::Authz::authorize).
///
/// Everything that goes wrong while deciding a request ends in a deny
/// decision. The only error is losing the request itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthzError {
    /// The request was cancelled or timed out before a decision was reached.
    Cancelled,
}

impl fmt::Display for AuthzError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "authorization cancelled before a decision was reached"),
        }
    }
}

impl std::error::Error for AuthzError {}

/// Startup configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The refresh interval is neither `disabled`, `always` nor a duration.
    InvalidRefreshInterval {
        /// The configured value.
        value: String,
        /// Error details.
        reason: String,
    },
    /// A served domain is empty or malformed.
    InvalidDomain {
        /// The configured value.
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRefreshInterval { value, reason } => {
                write!(f, "invalid refresh interval '{}': {}", value, reason)
            }
            Self::InvalidDomain { value } => {
                write!(f, "invalid session domain '{}'", value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Reasons a target object cannot be derived or is not served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectError {
    /// A header the implementation requires is absent.
    MissingHeader {
        /// Header name.
        name: &'static str,
    },
    /// A header is present but unusable.
    InvalidHeader {
        /// Header name.
        name: &'static str,
        /// Error details.
        reason: String,
    },
    /// The reconstructed URL does not parse.
    InvalidUrl {
        /// The reconstructed value.
        value: String,
        /// Error details.
        reason: String,
    },
    /// The object is not reached over a secure scheme.
    InsecureScheme {
        /// The scheme found.
        scheme: String,
    },
    /// The object's host is not under any served domain.
    ForeignHost {
        /// The host found.
        host: String,
    },
}

impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader { name } => write!(f, "missing header '{}'", name),
            Self::InvalidHeader { name, reason } => {
                write!(f, "invalid header '{}': {}", name, reason)
            }
            Self::InvalidUrl { value, reason } => {
                write!(f, "invalid target url '{}': {}", value, reason)
            }
            Self::InsecureScheme { scheme } => {
                write!(f, "target scheme '{}' is not https or wss", scheme)
            }
            Self::ForeignHost { host } => {
                write!(f, "target host '{}' is not under a served domain", host)
            }
        }
    }
}

impl std::error::Error for ObjectError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_error_display() {
        let err = ObjectError::ForeignHost {
            host: "attacker.com".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "target host 'attacker.com' is not under a served domain"
        );
        assert_eq!(
            ObjectError::MissingHeader {
                name: "X-Forwarded-Host"
            }
            .to_string(),
            "missing header 'X-Forwarded-Host'"
        );
    }

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidRefreshInterval {
            value: "soon".to_string(),
            reason: "unknown unit".to_string(),
        };
        assert!(err.to_string().contains("soon"));
    }
}
