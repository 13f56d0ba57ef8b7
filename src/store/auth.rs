//! Auth session store.
//!
//! Tracks whether the user is logged in and who they are. None of the three
//! operations return errors: check failures collapse to anonymous, login
//! failures come back as a [`LoginOutcome`], and logout always clears the
//! local session.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::auth;
use crate::api::client::{ApiClient, HttpTransport, ReqwestTransport};
use crate::api::types::{LoginRequest, User};
use crate::error::ApiError;

/// Message used when a login failure carries nothing more specific.
pub const LOGIN_FAILED: &str = "Login failed";

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No session. Initial state and post-logout state.
    Anonymous,
    /// Login request in flight.
    Authenticating,
    Authenticated,
    /// Current-user check in flight.
    Checking,
}

impl SessionStatus {
    /// Human-readable status line.
    pub fn label(&self) -> &str {
        match self {
            SessionStatus::Anonymous => "Not logged in",
            SessionStatus::Authenticating => "Logging in...",
            SessionStatus::Authenticated => "Logged in",
            SessionStatus::Checking => "Checking session...",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Session {
    authenticated: bool,
    user: Option<User>,
}

/// Result of [`AuthStore::login`], rendered inline by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl LoginOutcome {
    fn succeeded() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }
}

/// Session state shared by the CLI commands.
pub struct AuthStore<T = ReqwestTransport> {
    api: Arc<ApiClient<T>>,
    session: RwLock<Session>,
    status: RwLock<SessionStatus>,
    loading: RwLock<bool>,
}

impl<T: HttpTransport> AuthStore<T> {
    /// Anonymous store over a shared client.
    pub fn new(api: Arc<ApiClient<T>>) -> Self {
        Self {
            api,
            session: RwLock::new(Session::default()),
            status: RwLock::new(SessionStatus::Anonymous),
            loading: RwLock::new(false),
        }
    }

    /// Ask the backend whether the session cookie is still valid.
    ///
    /// Returns whether the user ended up authenticated. Any failure leaves
    /// the store anonymous.
    pub async fn check_auth(&self) -> bool {
        self.begin(SessionStatus::Checking).await;

        let authenticated = match auth::current_user(&*self.api).await {
            Ok(resp) if resp.authenticated => {
                self.set_authenticated(resp.user).await;
                true
            }
            Ok(_) => {
                self.reset().await;
                false
            }
            Err(e) => {
                log::debug!("Session check failed, treating as anonymous: {}", e);
                self.reset().await;
                false
            }
        };

        *self.loading.write().await = false;
        authenticated
    }

    /// Log in with username and password.
    pub async fn login(&self, username: &str, password: &str) -> LoginOutcome {
        self.begin(SessionStatus::Authenticating).await;

        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let result = auth::login(&*self.api, &request).await;
        drop(request);

        let outcome = match result {
            Ok(resp) if resp.success => {
                self.set_authenticated(resp.user).await;
                log::info!("Logged in as {}", username);
                LoginOutcome::succeeded()
            }
            Ok(resp) => {
                let reason = resp.reason().unwrap_or_default().to_string();
                self.restore_status().await;
                LoginOutcome::failed(ApiError::AuthFailed(reason).describe(LOGIN_FAILED))
            }
            Err(e) => {
                log::info!("Login failed: {}", e);
                self.restore_status().await;
                LoginOutcome::failed(e.describe(LOGIN_FAILED))
            }
        };

        *self.loading.write().await = false;
        outcome
    }

    /// Log out. The server is notified best-effort; local state is cleared
    /// regardless.
    pub async fn logout(&self) {
        *self.loading.write().await = true;

        if let Err(e) = auth::logout(&*self.api).await {
            log::warn!("Logout request failed (will continue local cleanup): {}", e);
        }
        self.reset().await;

        *self.loading.write().await = false;
        log::info!("Logout complete");
    }

    /// Whether the last check or login left a live session.
    pub async fn is_authenticated(&self) -> bool {
        self.session.read().await.authenticated
    }

    /// True only when the current user's superuser flag was a literal `true`.
    pub async fn is_superuser(&self) -> bool {
        self.session
            .read()
            .await
            .user
            .as_ref()
            .is_some_and(|u| u.is_superuser)
    }

    /// Current user, if any.
    pub async fn user(&self) -> Option<User> {
        self.session.read().await.user.clone()
    }

    /// Where the session is in its lifecycle.
    pub async fn status(&self) -> SessionStatus {
        *self.status.read().await
    }

    /// True while `check_auth`, `login` or `logout` is running.
    pub async fn is_loading(&self) -> bool {
        *self.loading.read().await
    }

    async fn begin(&self, status: SessionStatus) {
        *self.loading.write().await = true;
        *self.status.write().await = status;
    }

    async fn set_authenticated(&self, user: Option<User>) {
        *self.session.write().await = Session {
            authenticated: true,
            user,
        };
        *self.status.write().await = SessionStatus::Authenticated;
    }

    async fn reset(&self) {
        *self.session.write().await = Session::default();
        *self.status.write().await = SessionStatus::Anonymous;
    }

    /// After a failed login the session is whatever it was before.
    async fn restore_status(&self) {
        let status = if self.session.read().await.authenticated {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        };
        *self.status.write().await = status;
    }
}
