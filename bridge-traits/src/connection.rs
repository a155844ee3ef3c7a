//! Per-call connection settings.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::http::{HttpClientFactory, RetryPolicy};

/// Transport settings supplied with every call.
///
/// Values are never mutated by the request pipeline; defaults are filled
/// from process settings when a caller does not provide one.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Total request timeout
    pub timeout: Duration,
    /// Resends after a connection failure, before any response
    pub connection_retries: u32,
    /// Resends after a retryable status
    pub max_attempts: u32,
    /// Speak HTTP/2 with prior knowledge
    pub http2: bool,
    /// Verify TLS certificates
    pub verify: bool,
    /// Disable connection keep-alive
    pub close_connection_after_use: bool,
    /// Replaces the default transport factory for this call
    pub transport: Option<Arc<dyn HttpClientFactory>>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            connection_retries: 1,
            max_attempts: 3,
            http2: false,
            verify: true,
            close_connection_after_use: false,
            transport: None,
        }
    }
}

impl ConnectionConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connection_retries(mut self, retries: u32) -> Self {
        self.connection_retries = retries;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_http2(mut self, enabled: bool) -> Self {
        self.http2 = enabled;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn with_close_connection_after_use(mut self, close: bool) -> Self {
        self.close_connection_after_use = close;
        self
    }

    pub fn with_transport(mut self, factory: Arc<dyn HttpClientFactory>) -> Self {
        self.transport = Some(factory);
        self
    }

    /// Retry policy for status-based resends.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
    }

    /// The override factory if set, otherwise `fallback`.
    pub fn factory_or<'a>(
        &'a self,
        fallback: &'a Arc<dyn HttpClientFactory>,
    ) -> &'a Arc<dyn HttpClientFactory> {
        self.transport.as_ref().unwrap_or(fallback)
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("timeout", &self.timeout)
            .field("connection_retries", &self.connection_retries)
            .field("max_attempts", &self.max_attempts)
            .field("http2", &self.http2)
            .field("verify", &self.verify)
            .field("close_connection_after_use", &self.close_connection_after_use)
            .field(
                "transport",
                &self.transport.as_ref().map(|_| "HttpClientFactory { ... }"),
            )
            .finish()
    }
}
