//! Session endpoints: login, logout, current user.
//!
//! Authentication rides on the backend's session cookie, which the shared
//! cookie jar carries on every request.

use serde_json::Value;

use super::client::{ApiClient, HttpTransport};
use super::types::{CurrentUserResponse, LoginRequest, LoginResponse};
use crate::error::ApiError;

pub const LOGIN_PATH: &str = "/auth/login/";
pub const LOGOUT_PATH: &str = "/auth/logout/";
pub const CURRENT_USER_PATH: &str = "/auth/current-user/";

/// Log in with username and password.
///
/// POST /auth/login/. A 2xx answer is returned as-is, including
/// `success: false`; interpreting it is up to the caller.
pub async fn login<T: HttpTransport>(
    client: &ApiClient<T>,
    request: &LoginRequest,
) -> Result<LoginResponse, ApiError> {
    client.authenticated_post(LOGIN_PATH, request).await
}

/// Log out the current session.
///
/// POST /auth/logout/. The CSRF token is resolved first, then the cache is
/// cleared before the request goes out, so the cache is empty afterwards
/// whether or not the server call succeeds.
pub async fn logout<T: HttpTransport>(client: &ApiClient<T>) -> Result<(), ApiError> {
    let token = client.csrf_token().await;
    client.clear_csrf_token().await;
    let _: Value = client
        .post_with_csrf(LOGOUT_PATH, &serde_json::json!({}), token)
        .await?;
    Ok(())
}

/// GET /auth/current-user/. Read-only, never fetches a CSRF token.
pub async fn current_user<T: HttpTransport>(
    client: &ApiClient<T>,
) -> Result<CurrentUserResponse, ApiError> {
    client.get(CURRENT_USER_PATH).await
}
