//! Application state for the experiments client.
//!
//! One shared `ApiClient` (and with it one cookie jar and one CSRF cache)
//! backs both data stores. The toast store is independent of the network.
//! When a session file is configured the cookie jar is loaded from it at
//! startup and written back before exit.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::api::client::{ApiClient, HttpTransport, ReqwestTransport};
use crate::config::ClientConfig;
use crate::error::{ApiError, SessionFileError};
use crate::session::SessionFile;
use crate::store::{AuthStore, ExperimentsStore, ToastStore};

pub struct AppState<T = ReqwestTransport> {
    /// HTTP client shared by the stores.
    pub api: Arc<ApiClient<T>>,

    /// Login state and current user.
    pub auth: AuthStore<T>,

    /// Experiment list, filters, current experiment and tags.
    pub experiments: ExperimentsStore<T>,

    /// Outcome notifications.
    pub toasts: ToastStore,

    session: Option<SessionFile>,
    /// Set by `forget_session`; later saves are skipped.
    forgotten: AtomicBool,
}

impl AppState<ReqwestTransport> {
    /// Create state talking to `config.base_url`.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let state = Self::with_client(ApiClient::new(config)?, config.toast_dismiss_after);
        Ok(match config.session_file {
            Some(ref path) => state.with_session_file(SessionFile::new(path, &config.base_url)),
            None => state,
        })
    }
}

impl<T: HttpTransport> AppState<T> {
    /// State over an existing client, with no session file.
    pub fn with_client(api: ApiClient<T>, toast_dismiss_after: Duration) -> Self {
        let api = Arc::new(api);
        Self {
            auth: AuthStore::new(Arc::clone(&api)),
            experiments: ExperimentsStore::new(Arc::clone(&api)),
            toasts: ToastStore::with_dismiss_after(toast_dismiss_after),
            api,
            session: None,
            forgotten: AtomicBool::new(false),
        }
    }

    /// Keep the cookie jar in `session` between runs.
    pub fn with_session_file(mut self, session: SessionFile) -> Self {
        self.session = Some(session);
        self
    }

    /// Load saved cookies into the jar. Returns how many were restored.
    pub fn restore_session(&self) -> Result<usize, SessionFileError> {
        let Some(ref session) = self.session else {
            return Ok(0);
        };
        let cookies = session.load()?;
        self.api.transport().import_cookies(&cookies);
        Ok(cookies.len())
    }

    /// Write the jar's cookies back to the session file.
    ///
    /// Skipped after `forget_session`. An empty jar removes the file.
    pub fn persist_session(&self) -> Result<(), SessionFileError> {
        let Some(ref session) = self.session else {
            return Ok(());
        };
        if self.forgotten.load(Ordering::SeqCst) {
            return Ok(());
        }
        let cookies = self.api.transport().export_cookies();
        if cookies.is_empty() {
            session.clear()
        } else {
            session.save(&cookies)
        }
    }

    /// Delete the session file and stop later saves for this run.
    pub fn forget_session(&self) -> Result<(), SessionFileError> {
        self.forgotten.store(true, Ordering::SeqCst);
        match self.session {
            Some(ref session) => session.clear(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockTransport;
    use crate::config::TOAST_DISMISS_AFTER;

    fn scratch(name: &str) -> SessionFile {
        let path = std::env::temp_dir()
            .join(format!("experiments-client-state-{}-{}", std::process::id(), name))
            .join("session.json");
        SessionFile::new(path, "http://localhost:8000/api")
    }

    fn app(session: SessionFile) -> AppState<MockTransport> {
        AppState::with_client(ApiClient::with_transport(MockTransport::new()), TOAST_DISMISS_AFTER)
            .with_session_file(session)
    }

    fn pair(name: &str, value: &str) -> (String, String) {
        (name.to_string(), value.to_string())
    }

    #[test]
    fn test_session_carries_over_to_next_run() {
        let session = scratch("carry");

        let first = app(session.clone());
        first.api.transport().set_cookie("sessionid", "abc");
        first.api.transport().set_cookie("csrftoken", "tok");
        first.persist_session().unwrap();

        let second = app(session.clone());
        assert_eq!(second.restore_session().unwrap(), 2);
        assert_eq!(
            second.api.transport().export_cookies(),
            vec![pair("csrftoken", "tok"), pair("sessionid", "abc")]
        );
        session.clear().unwrap();
    }

    #[test]
    fn test_forget_blocks_later_saves() {
        let session = scratch("forget");
        session.save(&[pair("sessionid", "abc")]).unwrap();

        let state = app(session.clone());
        state.restore_session().unwrap();
        state.forget_session().unwrap();
        state.persist_session().unwrap();

        assert!(session.load().unwrap().is_empty());
    }

    #[test]
    fn test_empty_jar_removes_file() {
        let session = scratch("empty");
        session.save(&[pair("sessionid", "abc")]).unwrap();

        app(session.clone()).persist_session().unwrap();
        assert!(!session.path().exists());
    }

    #[test]
    fn test_no_session_file_is_noop() {
        let state = AppState::with_client(ApiClient::with_transport(MockTransport::new()), TOAST_DISMISS_AFTER);
        assert_eq!(state.restore_session().unwrap(), 0);
        state.persist_session().unwrap();
        state.forget_session().unwrap();
    }
}
