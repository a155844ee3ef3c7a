//! # Desktop Bridge Implementations
//!
//! Default transports for desktop and server platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `BlockingHttpClient` using `reqwest::blocking`
//! - `HttpClientFactory` building either from a `ConnectionConfig`
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::ReqwestClientFactory;
//! use bridge_traits::{ConnectionConfig, HttpClientFactory};
//!
//! let factory = ReqwestClientFactory;
//! let client = factory.async_client(&ConnectionConfig::default())?;
//! ```

mod blocking;
mod factory;
mod http;

pub use blocking::ReqwestBlockingHttpClient;
pub use factory::ReqwestClientFactory;
pub use http::ReqwestHttpClient;
