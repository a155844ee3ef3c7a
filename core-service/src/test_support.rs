//! Scripted transport shared by the service tests.

use async_trait::async_trait;
use bridge_traits::{
    connection::ConnectionConfig,
    error::{BridgeError, Result as BridgeResult},
    http::{BlockingHttpClient, HttpClient, HttpClientFactory, HttpRequest, HttpResponse},
};
use bytes::Bytes;
use core_runtime::SimbaSettings;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncRead;

use crate::context::SimbaContext;

pub(crate) const TOKEN_PATH: &str = "/o/token/";

#[derive(Default)]
struct Inner {
    routes: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

/// Answers requests by URL path. Each path replays its queued responses in
/// order and then repeats the last one. The token endpoint always issues a
/// fresh bearer token.
#[derive(Clone, Default)]
pub(crate) struct StubTransport {
    inner: Arc<Inner>,
}

impl StubTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn route(&self, path: &str, status: u16, body: &str) -> &Self {
        self.route_with_headers(path, status, body, &[])
    }

    pub(crate) fn route_with_headers(
        &self,
        path: &str,
        status: u16,
        body: &str,
        headers: &[(&str, &str)],
    ) -> &Self {
        let response = HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: Bytes::from(body.to_string()),
        };
        self.inner
            .routes
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Every request seen so far, token exchanges included.
    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.inner.requests.lock().unwrap().clone()
    }

    /// Requests sent to `path`.
    pub(crate) fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| path_of(&r.url) == path)
            .collect()
    }

    pub(crate) fn token_exchanges(&self) -> usize {
        self.requests_to(TOKEN_PATH).len()
    }

    fn respond(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let path = path_of(&request.url);
        self.inner.requests.lock().unwrap().push(request);

        if path == TOKEN_PATH {
            return Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from_static(
                    br#"{"access_token":"stub-token","token_type":"Bearer","expires_in":3600}"#,
                ),
            });
        }

        let mut routes = self.inner.routes.lock().unwrap();
        let queue = routes
            .get_mut(&path)
            .ok_or_else(|| BridgeError::Connect(format!("no route for {}", path)))?;
        let response = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        response.ok_or_else(|| BridgeError::Connect(format!("no response for {}", path)))
    }
}

#[async_trait]
impl HttpClient for StubTransport {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.respond(request)
    }

    async fn download_stream(
        &self,
        request: HttpRequest,
    ) -> BridgeResult<Box<dyn AsyncRead + Send + Unpin>> {
        let response = self.respond(request)?;
        if !response.is_success() {
            return Err(BridgeError::Status {
                status: response.status,
                body: response.text_lossy(),
            });
        }
        Ok(Box::new(Cursor::new(response.body.to_vec())))
    }
}

impl BlockingHttpClient for StubTransport {
    fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.respond(request)
    }

    fn download_reader(&self, request: HttpRequest) -> BridgeResult<Box<dyn std::io::Read + Send>> {
        let response = self.respond(request)?;
        if !response.is_success() {
            return Err(BridgeError::Status {
                status: response.status,
                body: response.text_lossy(),
            });
        }
        Ok(Box::new(Cursor::new(response.body.to_vec())))
    }
}

impl HttpClientFactory for StubTransport {
    fn async_client(&self, _config: &ConnectionConfig) -> BridgeResult<Box<dyn HttpClient>> {
        Ok(Box::new(self.clone()))
    }

    fn blocking_client(
        &self,
        _config: &ConnectionConfig,
    ) -> BridgeResult<Box<dyn BlockingHttpClient>> {
        Ok(Box::new(self.clone()))
    }
}

pub(crate) fn path_of(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_default()
}

pub(crate) fn settings() -> SimbaSettings {
    SimbaSettings::builder()
        .api_base_url("https://api.example.com/")
        .auth_base_url("https://auth.example.com")
        .client_credentials("client", "secret")
        .write_token_to_file(false)
        .build()
        .unwrap()
}

pub(crate) fn context(stub: &StubTransport) -> SimbaContext {
    SimbaContext::new(settings(), Arc::new(stub.clone())).unwrap()
}
