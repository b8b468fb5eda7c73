//! Session and credential collaborator for gatehouse.
//!
//! This crate provides:
//! - Account identities (`Identity`) and authentication levels
//! - Stored sessions (`UserSession`, `SessionId`)
//! - The `SessionProvider` contract consumed by the authorization engine
//! - `MemorySessionStore`, an in-process provider backed by a static user database
//!
//! # Example
//!
//! ```
//! use gatehouse_session::{AuthenticationLevel, Identity, SessionId, UserSession};
//! use chrono::Duration;
//!
//! let identity = Identity::new("john")
//!     .with_display_name("John Doe")
//!     .with_groups(vec!["admins".to_string()]);
//!
//! let session = UserSession::new(
//!     SessionId::from("sess_abc123"),
//!     identity,
//!     AuthenticationLevel::TwoFactor,
//!     Duration::hours(8),
//! );
//!
//! assert!(!session.is_anonymous());
//! assert!(session.identity().in_group("admins"));
//! ```

pub mod error;
pub mod identity;
pub mod level;
pub mod memory;
pub mod provider;
pub mod session;

// Re-export main types at crate root
pub use error::SessionError;
pub use identity::Identity;
pub use level::AuthenticationLevel;
pub use memory::{MemorySessionStore, UserRecord, hash_password};
pub use provider::{Credential, CredentialScheme, SessionProvider};
pub use session::{SessionId, UserSession};
