//! Core types and utilities for gatehouse.
//!
//! This crate provides the foundational types, error handling, and shared
//! parsing helpers used by the authorization engine and its collaborators.

pub mod duration;
pub mod error;
pub mod id;

pub use duration::{ParseDurationError, parse_duration_string};
pub use error::Result;
pub use id::{ParseIdError, RequestId};
