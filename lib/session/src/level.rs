//! Authentication levels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How strongly a request has been authenticated.
///
/// Levels are ordered: `NotAuthenticated < OneFactor < TwoFactor`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AuthenticationLevel {
    /// No credential has been verified.
    #[default]
    NotAuthenticated,
    /// A single factor (password, token) has been verified.
    OneFactor,
    /// A second factor has been verified on top of the first.
    TwoFactor,
}

impl AuthenticationLevel {
    /// Returns true for any level above `NotAuthenticated`.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::NotAuthenticated)
    }

    /// Returns the configuration name of this level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotAuthenticated => "not_authenticated",
            Self::OneFactor => "one_factor",
            Self::TwoFactor => "two_factor",
        }
    }
}

impl fmt::Display for AuthenticationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
