//! SIMBA platform client core.
//!
//! This crate turns the auth layer (`core-auth`) and the retrying transport
//! (`core-runtime`) into a REST client for the SIMBA Blocks API. Desktop
//! builds enable the `desktop-shims` feature, which supplies the reqwest
//! transport from `bridge-desktop` as the default; other hosts pass their own
//! `HttpClientFactory` to [`SimbaContext::new`].
//!
//! ## Layers
//!
//! - [`SimbaContext`] owns settings, the [`AuthManager`] and the transport
//!   factory
//! - [`SimbaRequest`] sends one call: login, request, decode
//! - [`SearchFilter`] and the pager turn listings into page streams
//! - [`wait_for`] polls long-running resources
//! - [`ParamChecker`] validates contract inputs against metadata
//! - [`Simba`] and [`SimbaBlocking`] wrap common platform operations
//! - [`SimbaContract`] binds a client to one contract and validates its calls

pub mod client;
pub mod context;
pub mod contract;
pub mod deploy;
pub mod error;
pub mod files;
pub mod filter;
pub mod pager;
pub mod params;
pub mod paths;
pub mod poll;
pub mod request;

#[cfg(test)]
mod test_support;

pub use client::{CallOptions, ContractSubmission, Simba, SimbaBlocking};
pub use context::SimbaContext;
pub use contract::{SimbaContract, SimbaContractBlocking};
pub use deploy::{
    get_address, get_address_by_name, get_deployed_artifact_id, DeploySpec, DeployedContract,
};
pub use error::{Result, SimbaError};
pub use files::{FileSet, TxnHeaders, UploadFile};
pub use filter::{FieldFilter, FilterOp, QueryParams, SearchFilter};
pub use pager::{NextPage, PageIter, Pager};
pub use params::{parse_type, ParamChecker, ParamError, TypeInfo};
pub use paths::ApiPath;
pub use poll::{wait_for, wait_for_blocking, PollOutcome, PollState, PollTracker, POLL_INTERVAL};
pub use request::{build_url, decode, RequestOptions, SimbaRequest};

pub use bridge_traits;
pub use core_auth;
pub use core_runtime;

pub use bridge_traits::{connection::ConnectionConfig, http::HttpClientFactory};
pub use core_auth::{AuthFlow, AuthManager, AuthProviderKind, AuthToken, Login};
pub use core_runtime::SimbaSettings;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::ReqwestClientFactory;
