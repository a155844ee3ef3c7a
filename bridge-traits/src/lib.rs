//! # Host Bridge Traits
//!
//! Transport abstractions the SIMBA client core is written against.
//!
//! ## Overview
//!
//! This crate defines the contract between the request pipeline and the
//! transport that actually talks to the network. The core never names a
//! concrete HTTP library; it asks an [`HttpClientFactory`](http::HttpClientFactory)
//! for a fresh client per call, configured from a
//! [`ConnectionConfig`](connection::ConnectionConfig).
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async single-shot HTTP exchange and streaming download
//! - [`BlockingHttpClient`](http::BlockingHttpClient) - Blocking counterpart
//! - [`HttpClientFactory`](http::HttpClientFactory) - Builds both flavours from a connection config
//!
//! ### Utilities
//! - [`RetryPolicy`](http::RetryPolicy) - Backoff and `Retry-After` arithmetic
//! - [`Clock`](time::Clock) - Time source for deterministic expiry tests
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with a descriptive error when no transport factory is
//! available:
//!
//! ```ignore
//! let factory = builder.transport
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClientFactory".to_string(),
//!         message: "Enable the desktop-shims feature or inject a transport.".to_string(),
//!     })?;
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so clients can be shared across
//! tasks and threads.

pub mod connection;
pub mod error;
pub mod http;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use connection::ConnectionConfig;
pub use http::{
    BlockingHttpClient, FilePart, HttpBody, HttpClient, HttpClientFactory, HttpMethod,
    HttpRequest, HttpResponse, MultipartBody, RetryInfo, RetryPolicy,
};
pub use time::{Clock, LogLevel, ManualClock, SystemClock};
