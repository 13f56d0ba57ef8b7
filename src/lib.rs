//! Async client for the experiments catalog backend.
//!
//! Session-cookie authentication with CSRF protection, experiment and tag
//! CRUD, client-side stores for auth state, experiment lists and toast
//! notifications, and a session file that keeps the login between runs.

pub mod api;
pub mod commands;
pub mod config;
pub mod error;
pub mod session;
pub mod state;
pub mod store;

pub use api::client::{ApiClient, HttpTransport, ReqwestTransport};
pub use config::ClientConfig;
pub use error::{ApiError, SessionFileError};
pub use state::AppState;
