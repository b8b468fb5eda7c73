//! gatehouse HTTP host.
//!
//! Loads [`ServerConfig`](config::ServerConfig), builds one authorization
//! engine per configured endpoint and serves them over axum.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
