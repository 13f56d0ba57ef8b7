//! Client-side state stores.
//!
//! Each store owns its state behind async locks and is driven by the UI
//! layer (the CLI commands). Stores share one `ApiClient` through an `Arc`.

pub mod auth;
pub mod experiments;
pub mod toast;

pub use auth::{AuthStore, LoginOutcome, SessionStatus};
pub use experiments::{ExperimentFilters, ExperimentsStore, FilterUpdate};
pub use toast::{Toast, ToastId, ToastKind, ToastStore};
