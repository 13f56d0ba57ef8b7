//! Session cookies saved between CLI runs.
//!
//! The backend authenticates by session cookie, so a login in one run is
//! only useful to the next if the jar outlives the process. The file holds
//! the cookies for a single API base URL; cookies saved for another URL are
//! ignored on load.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::SessionFileError;

const SESSION_DIR: &str = "experiments-client";
const SESSION_FILE: &str = "session.json";

/// `<config dir>/experiments-client/session.json`, when the platform has a
/// config directory.
pub fn default_session_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SESSION_DIR).join(SESSION_FILE))
}

#[derive(Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
struct StoredCookie {
    name: String,
    value: String,
}

#[derive(Serialize, Deserialize)]
struct StoredSession {
    base_url: String,
    cookies: Vec<StoredCookie>,
}

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
    base_url: String,
}

impl SessionFile {
    /// Session file at `path` holding cookies for `base_url`.
    pub fn new(path: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            path: path.into(),
            base_url: base_url.to_string(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cookies saved for this base URL. A missing file is an empty session.
    pub fn load(&self) -> Result<Vec<(String, String)>, SessionFileError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredSession = serde_json::from_slice(&raw)?;
        if stored.base_url != self.base_url {
            log::debug!(
                "Saved session belongs to {}, not {}; ignoring it",
                stored.base_url,
                self.base_url
            );
            return Ok(Vec::new());
        }
        Ok(stored
            .cookies
            .iter()
            .map(|c| (c.name.clone(), c.value.clone()))
            .collect())
    }

    /// Replace the file with `cookies`. Readable by the owner only on Unix.
    pub fn save(&self, cookies: &[(String, String)]) -> Result<(), SessionFileError> {
        let stored = StoredSession {
            base_url: self.base_url.clone(),
            cookies: cookies
                .iter()
                .map(|(name, value)| StoredCookie {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        let mut json = serde_json::to_vec_pretty(&stored)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut options = fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let result = options.open(&self.path).and_then(|mut file| file.write_all(&json));
        json.zeroize();
        result?;
        log::debug!("Saved {} session cookies to {}", cookies.len(), self.path.display());
        Ok(())
    }

    /// Delete the file. Deleting a file that is not there is fine.
    pub fn clear(&self) -> Result<(), SessionFileError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
