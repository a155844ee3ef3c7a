//! Shared client state: settings, auth manager and transport factory.

use bridge_traits::{connection::ConnectionConfig, http::HttpClientFactory};
use core_auth::{AuthManager, Login};
use core_runtime::SimbaSettings;
use std::sync::Arc;

use crate::error::Result;

/// Everything a request needs beyond its own parameters.
///
/// One context is built per client and shared by every request it issues;
/// the token cache inside the [`AuthManager`] lives as long as the context.
pub struct SimbaContext {
    settings: SimbaSettings,
    auth: AuthManager,
    factory: Arc<dyn HttpClientFactory>,
}

impl SimbaContext {
    /// Build a context with every built-in auth provider registered.
    pub fn new(settings: SimbaSettings, factory: Arc<dyn HttpClientFactory>) -> Result<Self> {
        let auth = AuthManager::from_settings(&settings, factory.clone())?;
        Ok(Self {
            settings,
            auth,
            factory,
        })
    }

    /// Build a context using the default reqwest transport.
    ///
    /// # Errors
    ///
    /// Without the `desktop-shims` feature there is no default transport and
    /// [`crate::SimbaError::CapabilityMissing`] is returned; use [`SimbaContext::new`]
    /// with an explicit factory instead.
    pub fn from_settings(settings: SimbaSettings) -> Result<Self> {
        Self::new(settings, default_factory()?)
    }

    /// Load settings from the environment and env files.
    pub fn from_env() -> Result<Self> {
        Self::from_settings(SimbaSettings::from_env()?)
    }

    /// Replace the auth manager, e.g. to register custom providers.
    pub fn with_auth_manager(mut self, auth: AuthManager) -> Self {
        self.auth = auth;
        self
    }

    pub fn settings(&self) -> &SimbaSettings {
        &self.settings
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub fn factory(&self) -> &Arc<dyn HttpClientFactory> {
        &self.factory
    }

    /// Login described by the settings.
    pub fn default_login(&self) -> Result<Login> {
        Ok(Login::from_settings(&self.settings)?)
    }

    /// Per-call connection defaults.
    pub fn connection_config(&self) -> ConnectionConfig {
        self.settings.connection_config()
    }
}

impl std::fmt::Debug for SimbaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimbaContext")
            .field("settings", &self.settings)
            .field("auth", &self.auth)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "desktop-shims")]
fn default_factory() -> Result<Arc<dyn HttpClientFactory>> {
    Ok(Arc::new(bridge_desktop::ReqwestClientFactory))
}

#[cfg(not(feature = "desktop-shims"))]
fn default_factory() -> Result<Arc<dyn HttpClientFactory>> {
    Err(crate::error::SimbaError::CapabilityMissing {
        capability: "http".to_string(),
        message: "No default transport; enable `desktop-shims` or pass an HttpClientFactory"
            .to_string(),
    })
}
