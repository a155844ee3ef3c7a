//! # Authentication Module
//!
//! Pluggable token providers with a shared token cache.
//!
//! ## Overview
//!
//! Requests to the SIMBA API carry either a bearer token obtained through a
//! client-credentials exchange or a static API key. This crate resolves
//! which provider handles a [`Login`], caches issued tokens per client id
//! (optionally on disk), and injects the matching header.
//!
//! ## Features
//!
//! - Providers: `BLK` (HTTP Basic), `KC` (realm-scoped OpenID Connect),
//!   `PLAT` (absolute expiry), `API_KEY` (no network)
//! - Expiry checks with a 60 second safety margin
//! - One in-flight exchange per client id
//! - Async and blocking entry points sharing the same logic

pub mod error;
pub mod manager;
pub mod providers;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::AuthManager;
pub use providers::{
    ApiKeyProvider, AuthProvider, BlocksAuthProvider, KeycloakAuthProvider, PlatformAuthProvider,
    TokenExchange,
};
pub use token_store::TokenCache;
pub use types::{token_expired, AuthFlow, AuthProviderKind, AuthToken, Login};
