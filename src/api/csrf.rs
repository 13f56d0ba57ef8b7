//! CSRF token acquisition and caching.
//!
//! The cookie jar is the source of truth. When the backend marks
//! `csrftoken` HttpOnly (or the cookie is scoped elsewhere) the token is
//! fetched from `/auth/csrf-token/` once and cached until logout.

use serde::Deserialize;
use tokio::sync::RwLock;
use zeroize::Zeroize;

use super::client::{ApiRequest, HttpTransport};
use crate::error::ApiError;

/// Cookie holding the CSRF token.
pub const CSRF_COOKIE_NAME: &str = "csrftoken";

/// Header the backend checks on mutating requests.
pub const CSRF_HEADER_NAME: &str = "X-CSRFToken";

/// Endpoint issuing a token for the current session.
pub const CSRF_TOKEN_PATH: &str = "/auth/csrf-token/";

/// Response from GET /auth/csrf-token/.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsrfTokenResponse {
    pub csrf_token: String,
}

/// Holds at most one cached token.
#[derive(Default)]
pub struct CsrfTokenProvider {
    cached: RwLock<Option<String>>,
}

impl CsrfTokenProvider {
    /// Resolve the token to attach to a mutating request.
    ///
    /// Returns `None` when no token could be obtained; callers then send the
    /// request without the header and let the backend decide.
    pub async fn token<T: HttpTransport>(&self, transport: &T) -> Option<String> {
        if let Some(token) = transport.cookie(CSRF_COOKIE_NAME) {
            return Some(token);
        }

        if let Some(ref token) = *self.cached.read().await {
            return Some(token.clone());
        }

        match fetch_token(transport).await {
            Ok(token) if !token.is_empty() => {
                *self.cached.write().await = Some(token.clone());
                Some(token)
            }
            Ok(_) => {
                log::warn!("CSRF token endpoint returned an empty token");
                None
            }
            Err(e) => {
                log::warn!("Failed to fetch CSRF token: {}", e);
                None
            }
        }
    }

    /// Currently cached token, without touching the cookie jar or network.
    #[cfg(test)]
    pub(crate) async fn cached(&self) -> Option<String> {
        self.cached.read().await.clone()
    }

    /// Wipe and drop the cached token.
    pub async fn clear(&self) {
        let mut cached = self.cached.write().await;
        if let Some(ref mut token) = *cached {
            token.zeroize();
        }
        *cached = None;
    }
}

async fn fetch_token<T: HttpTransport>(transport: &T) -> Result<String, ApiError> {
    let resp = transport.execute(ApiRequest::get(CSRF_TOKEN_PATH)).await?;
    if !resp.is_success() {
        return Err(ApiError::Rejected {
            status: resp.status,
            body: resp.body,
        });
    }
    let parsed: CsrfTokenResponse =
        serde_json::from_value(resp.body).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(parsed.csrf_token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockTransport;
    use reqwest::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_cookie_wins_without_network() {
        let transport = MockTransport::new();
        transport.set_cookie(CSRF_COOKIE_NAME, "from-cookie");
        let provider = CsrfTokenProvider::default();

        for _ in 0..3 {
            assert_eq!(provider.token(&transport).await.as_deref(), Some("from-cookie"));
        }
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cookie_ignores_cache() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, CSRF_TOKEN_PATH, 200, json!({"csrfToken": "cached"}));
        let provider = CsrfTokenProvider::default();
        assert_eq!(provider.token(&transport).await.as_deref(), Some("cached"));

        transport.set_cookie(CSRF_COOKIE_NAME, "fresh");
        assert_eq!(provider.token(&transport).await.as_deref(), Some("fresh"));
        assert_eq!(provider.cached().await.as_deref(), Some("cached"));
    }

    #[tokio::test]
    async fn test_fetches_once_then_caches() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, CSRF_TOKEN_PATH, 200, json!({"csrfToken": "abc"}));
        let provider = CsrfTokenProvider::default();

        assert_eq!(provider.token(&transport).await.as_deref(), Some("abc"));
        assert_eq!(provider.token(&transport).await.as_deref(), Some("abc"));
        assert_eq!(provider.token(&transport).await.as_deref(), Some("abc"));
        assert_eq!(transport.count(Method::GET, CSRF_TOKEN_PATH), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_returns_none_and_retries_next_call() {
        let transport = MockTransport::new();
        transport.fail(Method::GET, CSRF_TOKEN_PATH, "timed out");
        transport.respond(Method::GET, CSRF_TOKEN_PATH, 500, json!({"error": "boom"}));
        transport.respond(Method::GET, CSRF_TOKEN_PATH, 200, json!({"csrfToken": "late"}));
        let provider = CsrfTokenProvider::default();

        assert_eq!(provider.token(&transport).await, None);
        assert_eq!(provider.token(&transport).await, None);
        assert_eq!(provider.token(&transport).await.as_deref(), Some("late"));
        assert_eq!(transport.count(Method::GET, CSRF_TOKEN_PATH), 3);
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_cached() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, CSRF_TOKEN_PATH, 200, json!({"token": "wrong-field"}));
        let provider = CsrfTokenProvider::default();

        assert_eq!(provider.token(&transport).await, None);
        assert_eq!(provider.cached().await, None);
    }

    #[tokio::test]
    async fn test_clear_forces_refetch() {
        let transport = MockTransport::new();
        transport.respond(Method::GET, CSRF_TOKEN_PATH, 200, json!({"csrfToken": "one"}));
        transport.respond(Method::GET, CSRF_TOKEN_PATH, 200, json!({"csrfToken": "two"}));
        let provider = CsrfTokenProvider::default();

        assert_eq!(provider.token(&transport).await.as_deref(), Some("one"));
        provider.clear().await;
        assert_eq!(provider.cached().await, None);
        assert_eq!(provider.token(&transport).await.as_deref(), Some("two"));
        assert_eq!(transport.count(Method::GET, CSRF_TOKEN_PATH), 2);
    }
}
