//! HTTP client with session cookies and CSRF header injection.
//!
//! All requests go through an [`HttpTransport`] that shares one cookie jar,
//! so the backend's session cookie rides along on every call. Mutating
//! requests additionally carry `X-CSRFToken` when a token is available.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use super::csrf::{CsrfTokenProvider, CSRF_HEADER_NAME};
use crate::config::ClientConfig;
use crate::error::ApiError;

/// A request relative to the API base URL.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(&'static str, String)>,
}

impl ApiRequest {
    /// Request with no query, body or extra headers.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    /// Shorthand for a GET request.
    pub fn get(path: &str) -> Self {
        Self::new(Method::GET, path)
    }

    /// Replace the query parameters.
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Set the JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Add a header on top of the transport defaults.
    pub fn with_header(mut self, name: &'static str, value: String) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Look up a header set on this request (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Path plus percent-encoded query string.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", self.path, query)
    }
}

/// Status and decoded body of a completed request.
///
/// An empty body decodes to `Null`; a body that is not JSON is kept as a string.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

impl ApiResponse {
    /// True for any 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Trait abstracting the wire for testability.
///
/// In production, [`ReqwestTransport`] sends real requests with a shared
/// cookie jar. In tests, a scripted implementation replays canned responses.
#[allow(async_fn_in_trait)]
pub trait HttpTransport {
    /// Send one request. Only network-level failures are errors; any HTTP
    /// status comes back as an `ApiResponse`.
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError>;

    /// Read a cookie the jar would send to the API origin.
    fn cookie(&self, name: &str) -> Option<String>;

    /// Every non-empty cookie the jar would send to the API origin.
    fn export_cookies(&self) -> Vec<(String, String)>;

    /// Seed the jar with cookies saved by an earlier run.
    fn import_cookies(&self, cookies: &[(String, String)]);
}

/// reqwest-backed transport with an in-memory cookie jar.
pub struct ReqwestTransport {
    client: Client,
    base_url: String,
    cookie_url: Url,
    jar: Arc<Jar>,
}

impl ReqwestTransport {
    /// Transport for `config.base_url` with an empty cookie jar.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let cookie_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::Config(format!("invalid base URL {}: {}", config.base_url, e)))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .default_headers(headers)
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            cookie_url,
            jar,
        })
    }
}

impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path_and_query());
        log::debug!("{} {}", request.method, request.path);

        let mut builder = self.client.request(request.method.clone(), &url);
        for (name, value) in &request.headers {
            builder = builder.header(*name, value);
        }
        if let Some(ref body) = request.body {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await?;

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        Ok(ApiResponse { status, body })
    }

    fn cookie(&self, name: &str) -> Option<String> {
        let header = self.jar.cookies(&self.cookie_url)?;
        find_cookie(header.to_str().ok()?, name)
    }

    fn export_cookies(&self) -> Vec<(String, String)> {
        self.jar
            .cookies(&self.cookie_url)
            .and_then(|header| header.to_str().ok().map(parse_cookies))
            .unwrap_or_default()
    }

    fn import_cookies(&self, cookies: &[(String, String)]) {
        for (name, value) in cookies {
            // Path=/ so the cookie also reaches the origin outside the API prefix
            self.jar
                .add_cookie_str(&format!("{}={}; Path=/", name, value), &self.cookie_url);
        }
    }
}

/// Split a `Cookie:` header string into its non-empty name/value pairs.
pub fn parse_cookies(raw: &str) -> Vec<(String, String)> {
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

/// Find a non-empty cookie value in a `Cookie:` header string.
pub fn find_cookie(raw: &str, name: &str) -> Option<String> {
    parse_cookies(raw)
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// API client shared by every store.
///
/// Owns the transport and the CSRF token cache.
pub struct ApiClient<T = ReqwestTransport> {
    transport: T,
    csrf: CsrfTokenProvider,
}

impl ApiClient<ReqwestTransport> {
    /// Create a client talking to `config.base_url` over reqwest.
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        Ok(Self::with_transport(ReqwestTransport::new(config)?))
    }
}

impl<T: HttpTransport> ApiClient<T> {
    /// Client over any transport, with an empty CSRF cache.
    pub fn with_transport(transport: T) -> Self {
        Self {
            transport,
            csrf: CsrfTokenProvider::default(),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[cfg(test)]
    pub(crate) fn csrf(&self) -> &CsrfTokenProvider {
        &self.csrf
    }

    /// Current CSRF token: cookie first, then the cache, then the token endpoint.
    pub async fn csrf_token(&self) -> Option<String> {
        self.csrf.token(&self.transport).await
    }

    /// Drop the cached CSRF token (used on logout).
    pub async fn clear_csrf_token(&self) {
        self.csrf.clear().await;
    }

    /// Send a read-only GET request. Never fetches a CSRF token.
    pub async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        self.get_with_query(path, Vec::new()).await
    }

    /// Send a read-only GET request with query parameters.
    pub async fn get_with_query<R: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<R, ApiError> {
        let body = self.send(ApiRequest::get(path).with_query(query)).await?;
        decode(body)
    }

    /// Send a POST request with a JSON body and CSRF header.
    pub async fn authenticated_post<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let token = self.csrf_token().await;
        self.post_with_csrf(path, body, token).await
    }

    /// POST with an already-resolved CSRF token. Logout needs this so it can
    /// clear the cache between resolving the token and sending.
    pub async fn post_with_csrf<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        csrf_token: Option<String>,
    ) -> Result<R, ApiError> {
        let request = ApiRequest::new(Method::POST, path).with_body(encode(body)?);
        decode(self.send(with_csrf(request, csrf_token)).await?)
    }

    /// Send a PATCH request with a JSON body and CSRF header.
    pub async fn authenticated_patch<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let token = self.csrf_token().await;
        let request = ApiRequest::new(Method::PATCH, path).with_body(encode(body)?);
        decode(self.send(with_csrf(request, token)).await?)
    }

    /// Send a DELETE request with CSRF header. The response body is ignored.
    pub async fn authenticated_delete(&self, path: &str) -> Result<(), ApiError> {
        let token = self.csrf_token().await;
        let request = ApiRequest::new(Method::DELETE, path);
        self.send(with_csrf(request, token)).await?;
        Ok(())
    }

    async fn send(&self, request: ApiRequest) -> Result<Value, ApiError> {
        let resp = self.transport.execute(request).await?;
        if !resp.is_success() {
            return Err(ApiError::Rejected {
                status: resp.status,
                body: resp.body,
            });
        }
        Ok(resp.body)
    }
}

fn with_csrf(request: ApiRequest, token: Option<String>) -> ApiRequest {
    match token {
        Some(t) => request.with_header(CSRF_HEADER_NAME, t),
        None => request,
    }
}

fn encode<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Encode(e.to_string()))
}

fn decode<R: DeserializeOwned>(body: Value) -> Result<R, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
}
