//! # Core Runtime Module
//!
//! Foundational runtime infrastructure for the SIMBA client:
//! - Logging and tracing infrastructure
//! - Settings loaded from the environment and env files
//! - Status-based retry around the bridge transports
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the auth and service layers
//! depend on. It establishes the logging conventions and the retry
//! behaviour shared by every outbound request.

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;

pub use config::SimbaSettings;
pub use error::{Error, Result};
pub use retry::{RetryingBlockingHttpClient, RetryingHttpClient};
