//! Client configuration resolved from CLI flags and the environment.

use std::path::PathBuf;
use std::time::Duration;

use crate::session::default_session_path;

/// Base URL used when neither a flag nor an environment variable is set.
pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";

/// How long a toast stays queued before it is dismissed automatically.
pub const TOAST_DISMISS_AFTER: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without trailing slash (e.g. `http://localhost:8000/api`).
    pub base_url: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub toast_dismiss_after: Duration,
    /// Where session cookies are kept between runs. `None` keeps them in
    /// memory only.
    pub session_file: Option<PathBuf>,
}

impl ClientConfig {
    /// Defaults for everything but the base URL. No session file.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            toast_dismiss_after: TOAST_DISMISS_AFTER,
            session_file: None,
        }
    }

    /// Resolve the base URL: explicit override > EXPERIMENTS_API_URL > VITE_API_URL > default.
    ///
    /// The session file comes from EXPERIMENTS_SESSION_FILE, else the
    /// platform config directory.
    pub fn from_env(api_url_override: Option<&str>) -> Self {
        let base_url = api_url_override
            .map(str::to_string)
            .or_else(|| std::env::var("EXPERIMENTS_API_URL").ok())
            .or_else(|| std::env::var("VITE_API_URL").ok())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let session_file = std::env::var_os("EXPERIMENTS_SESSION_FILE")
            .map(PathBuf::from)
            .or_else(default_session_path);
        Self {
            session_file,
            ..Self::new(&base_url)
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}
