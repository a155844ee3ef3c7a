//! HTTP Client Abstraction
//!
//! Request and response types shared by the async and blocking transports,
//! the retry policy arithmetic, and the transport traits a host implements.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncRead;

use crate::connection::ConnectionConfig;
use crate::error::{BridgeError, Result};

/// HTTP method types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// Methods that carry a JSON or multipart payload.
    pub fn allows_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file attached to a multipart request.
///
/// Only the path is held here; transports open the file right before the
/// request is sent and drop the handle when the call returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub field_name: String,
    pub file_name: String,
    pub mime_type: String,
    pub path: PathBuf,
}

/// Form fields plus files for a `multipart/form-data` request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FilePart>,
}

impl MultipartBody {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }
}

/// Request payload
#[derive(Debug, Clone, Default)]
pub enum HttpBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Multipart(MultipartBody),
}

/// HTTP request builder
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: HttpBody,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: HttpBody::Empty,
            timeout: None,
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in headers {
            self.headers.insert(key.into(), value.into());
        }
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let json = serde_json::to_vec(body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON serialization failed: {}", e))
        })?;
        self.body = HttpBody::Bytes(Bytes::from(json));
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    /// Set an `application/x-www-form-urlencoded` body.
    pub fn form<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        let encoded = serde_urlencoded::to_string(body).map_err(|e| {
            BridgeError::OperationFailed(format!("Form serialization failed: {}", e))
        })?;
        self.body = HttpBody::Bytes(Bytes::from(encoded));
        self.headers.insert(
            "Content-Type".to_string(),
            "application/x-www-form-urlencoded".to_string(),
        );
        Ok(self)
    }

    pub fn body(mut self, body: Bytes) -> Self {
        self.body = HttpBody::Bytes(body);
        self
    }

    pub fn multipart(mut self, body: MultipartBody) -> Self {
        self.body = HttpBody::Multipart(body);
        self
    }

    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        lookup_header(&self.headers, name)
    }

    pub fn has_header(&self, name: &str) -> bool {
        self.header_value(name).is_some()
    }
}

/// HTTP response
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    /// Parse response body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            BridgeError::OperationFailed(format!("JSON deserialization failed: {}", e))
        })
    }

    /// Get response body as UTF-8 string
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| BridgeError::OperationFailed(format!("Invalid UTF-8: {}", e)))
    }

    /// Body as text, replacing invalid UTF-8. Used for error reporting.
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        lookup_header(&self.headers, name)
    }

    /// Check if response status is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Check if response status indicates a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    /// Check if response status indicates a server error (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

fn lookup_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Methods that are safe to resend.
pub const RETRYABLE_METHODS: [HttpMethod; 6] = [
    HttpMethod::Head,
    HttpMethod::Get,
    HttpMethod::Put,
    HttpMethod::Delete,
    HttpMethod::Options,
    HttpMethod::Trace,
];

/// Status codes that trigger a resend.
pub const RETRYABLE_STATUS_CODES: [u16; 6] = [413, 429, 500, 502, 503, 504];

/// Upper bound for any single wait between attempts.
pub const DEFAULT_MAX_BACKOFF_WAIT: Duration = Duration::from_secs(10);

/// Retry policy configuration
///
/// Pure arithmetic shared by the async and blocking retrying clients. The
/// policy never sleeps or performs I/O itself.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of resends after the first attempt
    pub max_attempts: u32,
    /// Base of the exponential backoff, in seconds
    pub backoff_factor: f64,
    /// Fraction of the backoff added or removed at random, in `[0, 0.5]`
    pub jitter_ratio: f64,
    /// Cap applied to every computed wait
    pub max_backoff_wait: Duration,
    /// Prefer the server's `Retry-After` header over the computed backoff
    pub respect_retry_after: bool,
    pub retryable_methods: Vec<HttpMethod>,
    pub retry_status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_factor: 0.5,
            jitter_ratio: 0.1,
            max_backoff_wait: DEFAULT_MAX_BACKOFF_WAIT,
            respect_retry_after: true,
            retryable_methods: RETRYABLE_METHODS.to_vec(),
            retry_status_codes: RETRYABLE_STATUS_CODES.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    pub fn with_jitter_ratio(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio;
        self
    }

    pub fn with_max_backoff_wait(mut self, wait: Duration) -> Self {
        self.max_backoff_wait = wait;
        self
    }

    pub fn with_respect_retry_after(mut self, respect: bool) -> Self {
        self.respect_retry_after = respect;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=0.5).contains(&self.jitter_ratio) {
            return Err(BridgeError::InvalidPolicy(format!(
                "jitter ratio should be between 0 and 0.5, actual {}",
                self.jitter_ratio
            )));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 0.0 {
            return Err(BridgeError::InvalidPolicy(format!(
                "backoff factor must be a non-negative number, actual {}",
                self.backoff_factor
            )));
        }
        Ok(())
    }

    pub fn is_retryable_method(&self, method: HttpMethod) -> bool {
        self.retryable_methods.contains(&method)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retry_status_codes.contains(&status)
    }

    /// Decide whether a response warrants another attempt.
    ///
    /// `attempts_made` counts resends already performed, so the first
    /// response is evaluated with `0`.
    pub fn should_retry(&self, method: HttpMethod, status: u16, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
            && self.is_retryable_method(method)
            && self.is_retryable_status(status)
    }

    /// Wait requested by a `Retry-After` header, capped at `max_backoff_wait`.
    ///
    /// Accepts delta seconds or an HTTP date. Dates in the past and
    /// unparseable values yield `None`.
    pub fn retry_after(
        &self,
        headers: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Option<Duration> {
        if !self.respect_retry_after {
            return None;
        }
        let value = lookup_header(headers, "retry-after")?.trim();
        if value.is_empty() {
            return None;
        }

        if value.bytes().all(|b| b.is_ascii_digit()) {
            let seconds = value.parse::<u64>().ok()?;
            return Some(Duration::from_secs(seconds).min(self.max_backoff_wait));
        }

        let parsed = DateTime::parse_from_rfc2822(value).ok()?;
        let diff = parsed.with_timezone(&Utc) - now;
        let diff = diff.to_std().ok()?;
        if diff.is_zero() {
            return None;
        }
        Some(diff.min(self.max_backoff_wait))
    }

    /// `backoff_factor * 2^(attempts_made - 1)`, shifted by the jitter in the
    /// direction of `jitter_sign` and capped at `max_backoff_wait`.
    ///
    /// `attempts_made` counts resends already performed, so the wait before
    /// the first resend is half the backoff factor.
    pub fn exponential_backoff(&self, attempts_made: u32, jitter_sign: f64) -> Duration {
        let exponent = attempts_made.min(63) as i32 - 1;
        let backoff = self.backoff_factor * 2f64.powi(exponent);
        let jitter = backoff * self.jitter_ratio * jitter_sign.signum();
        let total = (backoff + jitter).max(0.0);
        let cap = self.max_backoff_wait.as_secs_f64();
        Duration::from_secs_f64(total.min(cap))
    }

    /// Wait before the next attempt.
    pub fn sleep_duration(
        &self,
        attempts_made: u32,
        headers: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> Duration {
        self.retry_after(headers, now).unwrap_or_else(|| {
            let sign = if rand::thread_rng().gen_bool(0.5) {
                1.0
            } else {
                -1.0
            };
            self.exponential_backoff(attempts_made, sign)
        })
    }
}

/// One resend decision, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryInfo {
    pub attempt: u32,
    pub status: u16,
    pub delay: Duration,
}

/// Async HTTP client trait
///
/// Implementations perform a single exchange per call. Resending on
/// retryable statuses is layered on top by the retrying clients.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::http::{HttpClient, HttpRequest, HttpMethod};
///
/// async fn fetch_data(client: &dyn HttpClient) -> Result<String> {
///     let request = HttpRequest::new(HttpMethod::Get, "https://api.example.com/v2/apps/")
///         .header("Authorization", "Bearer token");
///
///     let response = client.execute(request).await?;
///     response.text()
/// }
/// ```
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute an HTTP request
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - The URL is malformed
    /// - Network connection fails
    /// - Request times out
    ///
    /// A non-2xx status is not an error at this layer.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    /// Stream a response body without buffering it in memory.
    ///
    /// Non-2xx responses are reported as [`BridgeError::Status`].
    async fn download_stream(
        &self,
        request: HttpRequest,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>>;
}

/// Blocking counterpart of [`HttpClient`].
pub trait BlockingHttpClient: Send + Sync {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;

    fn download_reader(&self, request: HttpRequest) -> Result<Box<dyn std::io::Read + Send>>;
}

/// Builds transports for a [`ConnectionConfig`].
///
/// A fresh client is requested for every logical call and dropped when the
/// call completes.
pub trait HttpClientFactory: Send + Sync {
    fn async_client(&self, config: &ConnectionConfig) -> Result<Box<dyn HttpClient>>;

    fn blocking_client(&self, config: &ConnectionConfig) -> Result<Box<dyn BlockingHttpClient>>;
}
