//! SIMBA Blocks client.
//!
//! Single entry point for host applications. Everything lives in the
//! workspace crates and is re-exported here; the `desktop-shims` feature
//! (on by default) enables the reqwest transport.
//!
//! ```ignore
//! use libsimba::{CallOptions, Simba};
//!
//! let simba = Simba::from_env()?;
//! let apps = simba.get_applications(None, &CallOptions::new()).await?;
//! ```

pub use core_service::*;
