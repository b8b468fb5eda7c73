//! The identity an authenticated request resolves to.
//!
//! An identity is what the engine forwards upstream in the `Remote-*`
//! headers and what the policy evaluator matches subjects against.

use serde::{Deserialize, Serialize};

/// Represents an authenticated account.
///
/// Identities are produced by the session collaborator, either from a stored
/// session or from a validated credential, and refreshed from the account
/// backend according to the refresh policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Login name, unique per account.
    username: String,
    /// Human-readable name, if the backend provides one.
    #[serde(default)]
    display_name: Option<String>,
    /// Email addresses; the first is the primary address.
    #[serde(default)]
    emails: Vec<String>,
    /// Group memberships.
    #[serde(default)]
    groups: Vec<String>,
}

impl Identity {
    /// Creates an identity with only a username.
    #[must_use]
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            display_name: None,
            emails: Vec::new(),
            groups: Vec::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Sets the email addresses.
    #[must_use]
    pub fn with_emails(mut self, emails: Vec<String>) -> Self {
        self.emails = emails;
        self
    }

    /// Sets the group memberships.
    #[must_use]
    pub fn with_groups(mut self, groups: Vec<String>) -> Self {
        self.groups = groups;
        self
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the display name, falling back to the username.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }

    /// Returns all email addresses.
    #[must_use]
    pub fn emails(&self) -> &[String] {
        &self.emails
    }

    /// Returns the primary email address, if any.
    #[must_use]
    pub fn primary_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    /// Returns the group memberships.
    #[must_use]
    pub fn groups(&self) -> &[String] {
        &self.groups
    }

    /// Returns true if the identity belongs to `group`.
    #[must_use]
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_username() {
        let identity = Identity::new("john");
        assert_eq!(identity.display_name(), "john");

        let identity = identity.with_display_name("John Doe");
        assert_eq!(identity.display_name(), "John Doe");
    }

    #[test]
    fn primary_email_is_first() {
        let identity = Identity::new("john").with_emails(vec![
            "john@example.com".to_string(),
            "jd@example.org".to_string(),
        ]);
        assert_eq!(identity.primary_email(), Some("john@example.com"));
        assert_eq!(Identity::new("jane").primary_email(), None);
    }

    #[test]
    fn group_membership() {
        let identity =
            Identity::new("john").with_groups(vec!["admins".to_string(), "dev".to_string()]);
        assert!(identity.in_group("admins"));
        assert!(!identity.in_group("ops"));
    }

    #[test]
    fn deserializes_with_only_username() {
        let identity: Identity =
            serde_json::from_str(r#"{"username": "john"}"#).expect("deserialize");
        assert_eq!(identity.username(), "john");
        assert!(identity.groups().is_empty());
        assert!(identity.emails().is_empty());
    }
}
