//! Access control policy for gatehouse.
//!
//! The authorization engine hands a [`Subject`] and a [`TargetObject`] to a
//! [`PolicyEvaluator`] and gets back a [`PolicyDecision`]. [`AccessControl`]
//! evaluates an ordered rule list where the first matching rule wins.
//!
//! # Example
//!
//! ```
//! use gatehouse_policy::{
//!     AccessControl, AccessControlConfig, RequiredLevel, RuleConfig, Subject, TargetObject,
//! };
//! use http::Method;
//! use url::Url;
//!
//! let acl = AccessControl::from_config(&AccessControlConfig {
//!     default_policy: RequiredLevel::Deny,
//!     rules: vec![RuleConfig {
//!         domain: vec!["public.example.com".to_string()],
//!         resources: vec![],
//!         methods: vec![],
//!         subject: vec![],
//!         policy: RequiredLevel::Bypass,
//!     }],
//! })
//! .unwrap();
//!
//! let object = TargetObject::new(Method::GET, Url::parse("https://public.example.com/").unwrap());
//! let (required, _) = acl.required_level(&Subject::anonymous(), &object);
//! assert_eq!(required, RequiredLevel::Bypass);
//! ```

pub mod error;
pub mod evaluator;
pub mod types;

pub use error::PolicyError;
pub use evaluator::{AccessControl, AccessControlConfig, PolicyEvaluator, RuleConfig};
pub use types::{PolicyDecision, RequiredLevel, Subject, TargetObject};
