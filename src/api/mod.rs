//! API client module for the experiments catalog.
//!
//! Provides the HTTP client with session cookies and CSRF header injection,
//! the auth and experiment endpoint wrappers, and request/response types
//! matching the backend API.

pub mod auth;
pub mod client;
pub mod csrf;
pub mod experiments;
#[cfg(test)]
pub(crate) mod mock;
pub mod types;
