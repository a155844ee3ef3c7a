//! # Long Polling
//!
//! Deployments and organisation transactions complete asynchronously on the
//! server. [`wait_for`] GETs the resource every [`POLL_INTERVAL`] until its
//! `state` is `COMPLETED`, failing fast on `FAILED` and giving up once the
//! total wait exceeds the limit.
//!
//! The state machine lives in [`PollTracker`], shared by the async and
//! blocking loops.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::error::{Result, SimbaError};

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_DEPLOYMENT_WAIT: Duration = Duration::from_secs(480);
pub const DEFAULT_TRANSACTION_WAIT: Duration = Duration::from_secs(40);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Pending,
    Completed,
    Failed,
    TimedOut,
    /// Any other in-progress state reported by the server
    Other(String),
}

impl PollState {
    pub fn parse(state: &str) -> Self {
        match state {
            "PENDING" => PollState::Pending,
            "COMPLETED" => PollState::Completed,
            "FAILED" => PollState::Failed,
            "TIMED_OUT" => PollState::TimedOut,
            other => PollState::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Completed | PollState::Failed | PollState::TimedOut
        )
    }
}

/// What to do after observing a response.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Done(Value),
    Wait(Duration),
}

/// Bounded polling state for one resource.
#[derive(Debug, Clone)]
pub struct PollTracker {
    resource: String,
    interval: Duration,
    max_wait: Duration,
    waited: Duration,
}

impl PollTracker {
    pub fn new(resource: impl Into<String>, max_wait: Duration) -> Self {
        Self {
            resource: resource.into(),
            interval: POLL_INTERVAL,
            max_wait,
            waited: Duration::ZERO,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Total time slept so far.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Advance on a polled `response`.
    ///
    /// # Errors
    ///
    /// - [`SimbaError::PollFailed`] on `FAILED` or a response without a
    ///   string `state`
    /// - [`SimbaError::PollTimeout`] on `TIMED_OUT`, or when still pending
    ///   after more than `max_wait`
    pub fn observe(&mut self, response: Value) -> Result<PollOutcome> {
        let Some(state) = response.get("state").and_then(Value::as_str) else {
            return Err(SimbaError::PollFailed {
                resource: self.resource.clone(),
                response,
            });
        };

        match PollState::parse(state) {
            PollState::Completed => Ok(PollOutcome::Done(response)),
            PollState::Failed => Err(SimbaError::PollFailed {
                resource: self.resource.clone(),
                response,
            }),
            PollState::TimedOut => Err(self.timeout()),
            state => {
                if self.waited > self.max_wait {
                    return Err(self.timeout());
                }
                debug!(
                    resource = %self.resource,
                    state = ?state,
                    waited_secs = self.waited.as_secs(),
                    "Still waiting"
                );
                self.waited += self.interval;
                Ok(PollOutcome::Wait(self.interval))
            }
        }
    }

    fn timeout(&self) -> SimbaError {
        SimbaError::PollTimeout {
            resource: self.resource.clone(),
            waited: self.waited,
        }
    }
}

/// Poll `fetch` until the tracker reaches a terminal outcome.
pub async fn wait_for<F, Fut>(mut tracker: PollTracker, mut fetch: F) -> Result<Value>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value>>,
{
    loop {
        let response = fetch().await?;
        match tracker.observe(response)? {
            PollOutcome::Done(value) => return Ok(value),
            PollOutcome::Wait(delay) => tokio::time::sleep(delay).await,
        }
    }
}

/// Blocking variant of [`wait_for`].
pub fn wait_for_blocking<F>(mut tracker: PollTracker, mut fetch: F) -> Result<Value>
where
    F: FnMut() -> Result<Value>,
{
    loop {
        let response = fetch()?;
        match tracker.observe(response)? {
            PollOutcome::Done(value) => return Ok(value),
            PollOutcome::Wait(delay) => std::thread::sleep(delay),
        }
    }
}
