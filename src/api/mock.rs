//! Scripted transport for unit tests.
//!
//! Responses are queued per `METHOD /path` route and replayed in order.
//! A route with nothing queued fails like an unreachable server.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;

use super::client::{ApiRequest, ApiResponse, HttpTransport};
use crate::error::ApiError;

enum Scripted {
    Respond {
        status: u16,
        body: Value,
        delay: Option<Duration>,
    },
    Fail(String),
}

#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<Scripted>>>,
    requests: Mutex<Vec<ApiRequest>>,
    cookies: Mutex<HashMap<String, String>>,
}

fn route_key(method: &Method, path: &str) -> String {
    format!("{} {}", method, path)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry(route_key(&method, path))
            .or_default()
            .push_back(scripted);
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        self.push(method, path, Scripted::Respond { status, body, delay: None });
    }

    /// Queue a response that resolves only after `delay` has elapsed.
    pub fn respond_after(&self, method: Method, path: &str, status: u16, body: Value, delay: Duration) {
        self.push(method, path, Scripted::Respond { status, body, delay: Some(delay) });
    }

    pub fn fail(&self, method: Method, path: &str, message: &str) {
        self.push(method, path, Scripted::Fail(message.to_string()));
    }

    pub fn set_cookie(&self, name: &str, value: &str) {
        self.cookies
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
    }

    /// Every request seen so far, in send order.
    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Last request sent to a route.
    pub fn last(&self, method: Method, path: &str) -> Option<ApiRequest> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| r.method == method && r.path == path)
            .cloned()
    }
}

impl HttpTransport for MockTransport {
    async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let key = route_key(&request.method, &request.path);
        self.requests.lock().unwrap().push(request);

        let scripted = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front);

        match scripted {
            Some(Scripted::Respond { status, body, delay }) => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                Ok(ApiResponse { status, body })
            }
            Some(Scripted::Fail(message)) => Err(ApiError::Transport(message)),
            None => Err(ApiError::Transport(format!("connection refused ({})", key))),
        }
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies
            .lock()
            .unwrap()
            .get(name)
            .filter(|v| !v.is_empty())
            .cloned()
    }

    /// Sorted by name so tests can compare whole lists.
    fn export_cookies(&self) -> Vec<(String, String)> {
        let mut cookies: Vec<(String, String)> = self
            .cookies
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        cookies.sort();
        cookies
    }

    fn import_cookies(&self, cookies: &[(String, String)]) {
        let mut jar = self.cookies.lock().unwrap();
        for (name, value) in cookies {
            jar.insert(name.clone(), value.clone());
        }
    }
}
