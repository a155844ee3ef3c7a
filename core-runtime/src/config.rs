//! # Client Settings
//!
//! Process-level settings for the SIMBA client, read from `SIMBA_`-prefixed
//! environment variables and an optional env file.
//!
//! ## Env file lookup
//!
//! The first existing file among `.simbachain.env`, `simbachain.env` and
//! `.env` in the working directory wins. If none exists there, the same
//! names are tried in `$SIMBA_HOME`, or the user's home directory when
//! `SIMBA_HOME` is unset. Variables already present in the process
//! environment take precedence over values from the file; the file never
//! mutates the process environment.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SimbaSettings;
//!
//! // From the environment
//! let settings = SimbaSettings::from_env()?;
//!
//! // Or explicitly
//! let settings = SimbaSettings::builder()
//!     .api_base_url("https://api.example.com/")
//!     .auth_base_url("https://auth.example.com")
//!     .client_credentials("client-id", "client-secret")
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use bridge_traits::{connection::ConnectionConfig, time::LogLevel};
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Prefix shared by every setting in the environment.
pub const ENV_PREFIX: &str = "SIMBA_";

/// Env file names in lookup order.
pub const ENV_FILENAMES: [&str; 3] = [".simbachain.env", "simbachain.env", ".env"];

/// Variable pointing at the fallback directory for env files.
pub const SIMBA_HOME: &str = "SIMBA_HOME";

const DEFAULT_AUTH_FLOW: &str = "client_credentials";
const DEFAULT_AUTH_PROVIDER: &str = "BLK";
const DEFAULT_CONNECTION_TIMEOUT_SECS: f64 = 5.0;

/// Resolved client settings.
#[derive(Clone)]
pub struct SimbaSettings {
    /// Base URL of the REST API, without trailing slash
    pub api_base_url: String,
    /// Base URL of the token endpoints, without trailing slash
    pub auth_base_url: String,
    /// Auth flow identifier, lowercased
    pub auth_flow: String,
    /// Default auth provider identifier
    pub auth_provider: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_scope: Option<String>,
    pub auth_realm: Option<String>,
    /// Persist tokens under `token_dir`
    pub write_token_to_file: bool,
    pub token_dir: PathBuf,
    pub connection_timeout: Duration,
    pub ssl_verify: bool,
    pub log_level: LogLevel,
}

impl fmt::Debug for SimbaSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimbaSettings")
            .field("api_base_url", &self.api_base_url)
            .field("auth_base_url", &self.auth_base_url)
            .field("auth_flow", &self.auth_flow)
            .field("auth_provider", &self.auth_provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("auth_scope", &self.auth_scope)
            .field("auth_realm", &self.auth_realm)
            .field("write_token_to_file", &self.write_token_to_file)
            .field("token_dir", &self.token_dir)
            .field("connection_timeout", &self.connection_timeout)
            .field("ssl_verify", &self.ssl_verify)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl SimbaSettings {
    /// Create a new settings builder.
    pub fn builder() -> SimbaSettingsBuilder {
        SimbaSettingsBuilder::default()
    }

    /// Load settings from the env file (if any) and the process environment.
    pub fn from_env() -> Result<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| Error::Config(format!("Cannot read working directory: {}", e)))?;
        let home = std::env::var_os(SIMBA_HOME).map(PathBuf::from);

        let mut vars = match locate_env_file(&cwd, home) {
            Some(path) => read_env_file(&path)?,
            None => HashMap::new(),
        };
        for (key, value) in std::env::vars() {
            if key.starts_with(ENV_PREFIX) {
                vars.insert(key, value);
            }
        }

        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Build settings from an arbitrary variable source.
    ///
    /// `lookup` receives full variable names such as `SIMBA_API_BASE_URL`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };

        let mut builder = Self::builder();
        if let Some(value) = get("API_BASE_URL") {
            builder = builder.api_base_url(value);
        }
        if let Some(value) = get("AUTH_BASE_URL") {
            builder = builder.auth_base_url(value);
        }
        if let Some(value) = get("AUTH_FLOW") {
            builder = builder.auth_flow(value);
        }
        if let Some(value) = get("AUTH_PROVIDER") {
            builder = builder.auth_provider(value);
        }
        if let Some(value) = get("AUTH_CLIENT_ID") {
            builder = builder.client_id(value);
        }
        if let Some(value) = get("AUTH_CLIENT_SECRET") {
            builder = builder.client_secret(value);
        }
        if let Some(value) = get("AUTH_SCOPE") {
            builder = builder.auth_scope(value);
        }
        if let Some(value) = get("AUTH_REALM") {
            builder = builder.auth_realm(value);
        }
        if let Some(value) = get("WRITE_TOKEN_TO_FILE") {
            builder = builder.write_token_to_file(parse_bool("WRITE_TOKEN_TO_FILE", &value)?);
        }
        if let Some(value) = get("TOKEN_DIR") {
            builder = builder.token_dir(value);
        }
        if let Some(value) = get("CONNECTION_TIMEOUT") {
            let secs: f64 = value.trim().parse().map_err(|_| {
                Error::Config(format!(
                    "{}CONNECTION_TIMEOUT must be a number of seconds, got {:?}",
                    ENV_PREFIX, value
                ))
            })?;
            builder = builder.connection_timeout(duration_from_secs(secs)?);
        }
        if let Some(value) = get("SSL_VERIFY") {
            builder = builder.ssl_verify(parse_bool("SSL_VERIFY", &value)?);
        }
        if let Some(value) = get("LOG_LEVEL") {
            let level = LogLevel::parse(&value).ok_or_else(|| {
                Error::Config(format!("{}LOG_LEVEL is not a log level: {:?}", ENV_PREFIX, value))
            })?;
            builder = builder.log_level(level);
        }

        builder.build()
    }

    /// Per-call connection defaults derived from these settings.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig::default()
            .with_timeout(self.connection_timeout)
            .with_verify(self.ssl_verify)
    }

    /// Logging configuration at the configured level.
    pub fn logging_config(&self) -> LoggingConfig {
        LoggingConfig::default().with_level(self.log_level)
    }

    /// Directory for cached tokens, or `None` when file caching is off.
    pub fn token_cache_dir(&self) -> Option<&Path> {
        self.write_token_to_file.then_some(self.token_dir.as_path())
    }
}

/// First env file found in `cwd`, then in `home` (or the user's home
/// directory).
pub fn locate_env_file(cwd: &Path, home: Option<PathBuf>) -> Option<PathBuf> {
    let in_dir = |dir: &Path| {
        ENV_FILENAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    };

    in_dir(cwd).or_else(|| {
        let home = home.or_else(dirs::home_dir)?;
        in_dir(&home)
    })
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let env_error = |reason: String| Error::EnvFile {
        path: path.display().to_string(),
        reason,
    };

    debug!(path = %path.display(), "Loading settings from env file");

    let mut vars = HashMap::new();
    for item in dotenvy::from_path_iter(path).map_err(|e| env_error(e.to_string()))? {
        let (key, value) = item.map_err(|e| env_error(e.to_string()))?;
        vars.insert(key, value);
    }
    Ok(vars)
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!(
            "{}{} must be a boolean, got {:?}",
            ENV_PREFIX, name, value
        ))),
    }
}

fn duration_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(Error::Config(format!(
            "Connection timeout must be positive, got {}",
            secs
        )));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Builder for [`SimbaSettings`]
///
/// Validates required values and normalises URLs in [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct SimbaSettingsBuilder {
    api_base_url: Option<String>,
    auth_base_url: Option<String>,
    auth_flow: String,
    auth_provider: String,
    client_id: String,
    client_secret: String,
    auth_scope: Option<String>,
    auth_realm: Option<String>,
    write_token_to_file: bool,
    token_dir: PathBuf,
    connection_timeout: Duration,
    ssl_verify: bool,
    log_level: LogLevel,
}

impl Default for SimbaSettingsBuilder {
    fn default() -> Self {
        Self {
            api_base_url: None,
            auth_base_url: None,
            auth_flow: DEFAULT_AUTH_FLOW.to_string(),
            auth_provider: DEFAULT_AUTH_PROVIDER.to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            auth_scope: None,
            auth_realm: None,
            write_token_to_file: true,
            token_dir: PathBuf::from("./"),
            connection_timeout: Duration::from_secs_f64(DEFAULT_CONNECTION_TIMEOUT_SECS),
            ssl_verify: true,
            log_level: LogLevel::Info,
        }
    }
}

impl SimbaSettingsBuilder {
    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = Some(url.into());
        self
    }

    pub fn auth_base_url(mut self, url: impl Into<String>) -> Self {
        self.auth_base_url = Some(url.into());
        self
    }

    pub fn auth_flow(mut self, flow: impl Into<String>) -> Self {
        self.auth_flow = flow.into();
        self
    }

    pub fn auth_provider(mut self, provider: impl Into<String>) -> Self {
        self.auth_provider = provider.into();
        self
    }

    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = secret.into();
        self
    }

    /// Set client id and secret together.
    pub fn client_credentials(self, client_id: impl Into<String>, secret: impl Into<String>) -> Self {
        self.client_id(client_id).client_secret(secret)
    }

    pub fn auth_scope(mut self, scope: impl Into<String>) -> Self {
        self.auth_scope = Some(scope.into());
        self
    }

    pub fn auth_realm(mut self, realm: impl Into<String>) -> Self {
        self.auth_realm = Some(realm.into());
        self
    }

    pub fn write_token_to_file(mut self, enabled: bool) -> Self {
        self.write_token_to_file = enabled;
        self
    }

    pub fn token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = dir.into();
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    pub fn ssl_verify(mut self, verify: bool) -> Self {
        self.ssl_verify = verify;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = level;
        self
    }

    /// Validate and build the settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if either base URL is missing or not an
    /// absolute http(s) URL, or the timeout is zero.
    pub fn build(self) -> Result<SimbaSettings> {
        let api_base_url = normalise_base_url("API_BASE_URL", self.api_base_url)?;
        let auth_base_url = normalise_base_url("AUTH_BASE_URL", self.auth_base_url)?;

        if self.connection_timeout.is_zero() {
            return Err(Error::Config(
                "Connection timeout must be positive".to_string(),
            ));
        }

        Ok(SimbaSettings {
            api_base_url,
            auth_base_url,
            auth_flow: self.auth_flow.trim().to_lowercase(),
            auth_provider: self.auth_provider.trim().to_string(),
            client_id: self.client_id,
            client_secret: self.client_secret,
            auth_scope: self.auth_scope,
            auth_realm: self.auth_realm,
            write_token_to_file: self.write_token_to_file,
            token_dir: self.token_dir,
            connection_timeout: self.connection_timeout,
            ssl_verify: self.ssl_verify,
            log_level: self.log_level,
        })
    }
}

fn normalise_base_url(name: &str, value: Option<String>) -> Result<String> {
    let value = value.ok_or_else(|| {
        Error::Config(format!("{}{} is required", ENV_PREFIX, name))
    })?;
    let trimmed = value.trim().trim_end_matches('/').to_string();

    let parsed = url::Url::parse(&trimmed).map_err(|e| {
        Error::Config(format!("{}{} is not a valid URL ({}): {}", ENV_PREFIX, name, e, trimmed))
    })?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "{}{} must use http or https: {}",
            ENV_PREFIX, name, trimmed
        )));
    }

    Ok(trimmed)
}
