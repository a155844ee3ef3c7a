//! # Retrying Transport
//!
//! Wraps a single-shot client and resends requests that fail with a
//! retryable status, following a [`RetryPolicy`].
//!
//! Only idempotent methods are resent. The failed response is dropped
//! before sleeping, and once the attempts are exhausted the last response is
//! handed back to the caller instead of an error. Transport errors are
//! returned immediately; connection-level resends belong to the underlying
//! client.

use async_trait::async_trait;
use bridge_traits::{
    connection::ConnectionConfig,
    error::Result,
    http::{
        BlockingHttpClient, HttpClient, HttpClientFactory, HttpRequest, HttpResponse, RetryInfo,
        RetryPolicy,
    },
};
use chrono::Utc;
use std::io::Read;
use std::sync::{Arc, Mutex};
use tokio::io::AsyncRead;
use tracing::warn;

/// Async retrying client
pub struct RetryingHttpClient {
    inner: Box<dyn HttpClient>,
    policy: RetryPolicy,
    last_retry_info: Mutex<Vec<RetryInfo>>,
}

impl RetryingHttpClient {
    /// Wrap `inner`.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::InvalidPolicy` if the policy fails validation.
    pub fn new(inner: Box<dyn HttpClient>, policy: RetryPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            inner,
            policy,
            last_retry_info: Mutex::new(Vec::new()),
        })
    }

    /// Build a client for `config` from its transport override or `fallback`.
    pub fn from_config(
        config: &ConnectionConfig,
        fallback: &Arc<dyn HttpClientFactory>,
    ) -> Result<Self> {
        let inner = config.factory_or(fallback).async_client(config)?;
        Self::new(inner, config.retry_policy())
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Resends performed by the most recent `execute` call.
    pub fn last_retry_info(&self) -> Vec<RetryInfo> {
        self.last_retry_info
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, history: Vec<RetryInfo>) {
        *self.last_retry_info.lock().unwrap_or_else(|e| e.into_inner()) = history;
    }
}

#[async_trait]
impl HttpClient for RetryingHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut attempts_made = 0;
        let mut history = Vec::new();

        loop {
            let response = self.inner.execute(request.clone()).await?;
            if !self
                .policy
                .should_retry(request.method, response.status, attempts_made)
            {
                self.record(history);
                return Ok(response);
            }

            let delay = self
                .policy
                .sleep_duration(attempts_made, &response.headers, Utc::now());
            attempts_made += 1;
            warn!(
                method = %request.method,
                url = %request.url,
                status = response.status,
                attempt = attempts_made,
                delay_ms = delay.as_millis() as u64,
                "Retryable response, backing off"
            );
            history.push(RetryInfo {
                attempt: attempts_made,
                status: response.status,
                delay,
            });
            drop(response);
            tokio::time::sleep(delay).await;
        }
    }

    async fn download_stream(
        &self,
        request: HttpRequest,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        self.inner.download_stream(request).await
    }
}

/// Blocking retrying client
pub struct RetryingBlockingHttpClient {
    inner: Box<dyn BlockingHttpClient>,
    policy: RetryPolicy,
    last_retry_info: Mutex<Vec<RetryInfo>>,
}

impl RetryingBlockingHttpClient {
    pub fn new(inner: Box<dyn BlockingHttpClient>, policy: RetryPolicy) -> Result<Self> {
        policy.validate()?;
        Ok(Self {
            inner,
            policy,
            last_retry_info: Mutex::new(Vec::new()),
        })
    }

    pub fn from_config(
        config: &ConnectionConfig,
        fallback: &Arc<dyn HttpClientFactory>,
    ) -> Result<Self> {
        let inner = config.factory_or(fallback).blocking_client(config)?;
        Self::new(inner, config.retry_policy())
    }

    pub fn last_retry_info(&self) -> Vec<RetryInfo> {
        self.last_retry_info
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl BlockingHttpClient for RetryingBlockingHttpClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut attempts_made = 0;
        let mut history = Vec::new();

        loop {
            let response = self.inner.execute(request.clone())?;
            if !self
                .policy
                .should_retry(request.method, response.status, attempts_made)
            {
                *self.last_retry_info.lock().unwrap_or_else(|e| e.into_inner()) = history;
                return Ok(response);
            }

            let delay = self
                .policy
                .sleep_duration(attempts_made, &response.headers, Utc::now());
            attempts_made += 1;
            warn!(
                method = %request.method,
                url = %request.url,
                status = response.status,
                attempt = attempts_made,
                delay_ms = delay.as_millis() as u64,
                "Retryable response, backing off"
            );
            history.push(RetryInfo {
                attempt: attempts_made,
                status: response.status,
                delay,
            });
            drop(response);
            std::thread::sleep(delay);
        }
    }

    fn download_reader(&self, request: HttpRequest) -> Result<Box<dyn Read + Send>> {
        self.inner.download_reader(request)
    }
}
