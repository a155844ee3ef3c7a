use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::error::{AuthError, Result};
use core_runtime::SimbaSettings;

/// Tokens expiring within this many seconds are treated as already expired.
pub const DEFAULT_EXPIRY_OFFSET_SECS: i64 = 60;

/// Whether `token` should be discarded at `now`.
///
/// A token is expired once `expires <= now + offset`; the boundary itself
/// counts as expired.
pub fn token_expired(token: &AuthToken, offset: Duration, now: DateTime<Utc>) -> bool {
    token.expires <= now + offset
}

/// Access token issued by an auth provider.
///
/// Immutable once issued. Serialised as
/// `{"token": "...", "type": "...", "expires": "<RFC 3339>"}`. Reading also
/// accepts a timestamp without an offset, taken as UTC.
///
/// # Security
///
/// The `Debug` implementation redacts the token value.
///
/// # Examples
///
/// ```
/// use core_auth::AuthToken;
/// use chrono::{Duration, Utc};
///
/// let token = AuthToken::new("abc", "Bearer", Utc::now() + Duration::hours(1));
/// assert!(!token.is_expired());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    pub token: String,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(deserialize_with = "deserialize_expiry")]
    pub expires: DateTime<Utc>,
}

fn deserialize_expiry<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_expiry(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid expiry: {}", raw)))
}

fn parse_expiry(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl AuthToken {
    pub fn new(
        token: impl Into<String>,
        token_type: impl Into<String>,
        expires: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            token_type: token_type.into(),
            expires,
        }
    }

    /// Check expiry against the system clock with the default offset.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Check expiry at `now` with the default offset.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        token_expired(self, Duration::seconds(DEFAULT_EXPIRY_OFFSET_SECS), now)
    }

    /// Value for an `Authorization` header, `<type> <token>`.
    ///
    /// Any casing of `bearer` is normalised to `Bearer`; an empty type
    /// defaults to it.
    pub fn authorization_value(&self) -> String {
        let scheme = if self.token_type.is_empty() || self.token_type.eq_ignore_ascii_case("bearer")
        {
            "Bearer"
        } else {
            self.token_type.as_str()
        };
        format!("{} {}", scheme, self.token)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires", &self.expires)
            .finish()
    }
}

/// Authentication strategy requested by a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthFlow {
    /// OAuth2-style client id and secret exchange
    ClientCredentials,
    /// Static key sent as a header, no exchange
    ApiKey,
}

impl AuthFlow {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFlow::ClientCredentials => "client_credentials",
            AuthFlow::ApiKey => "api_key",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "client_credentials" => Some(AuthFlow::ClientCredentials),
            "api_key" | "apikey" => Some(AuthFlow::ApiKey),
            _ => None,
        }
    }

    /// Flows that carry a secret and cannot work without one.
    pub fn requires_secret(&self) -> bool {
        matches!(self, AuthFlow::ClientCredentials | AuthFlow::ApiKey)
    }
}

impl fmt::Display for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token issuing backends.
///
/// # Examples
///
/// ```
/// use core_auth::AuthProviderKind;
///
/// assert_eq!(AuthProviderKind::parse("kc"), Some(AuthProviderKind::Kc));
/// assert_eq!(AuthProviderKind::Blk.as_str(), "BLK");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthProviderKind {
    /// Basic-auth client credentials against `/o/token/`
    Blk,
    /// Realm-scoped OpenID Connect token endpoint
    Kc,
    /// Platform token endpoint with absolute expiry
    Plat,
    /// Static `api-key` header
    ApiKey,
}

impl AuthProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProviderKind::Blk => "BLK",
            AuthProviderKind::Kc => "KC",
            AuthProviderKind::Plat => "PLAT",
            AuthProviderKind::ApiKey => "API_KEY",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BLK" => Some(AuthProviderKind::Blk),
            "KC" => Some(AuthProviderKind::Kc),
            "PLAT" => Some(AuthProviderKind::Plat),
            "API_KEY" | "APIKEY" => Some(AuthProviderKind::ApiKey),
            _ => None,
        }
    }
}

impl fmt::Display for AuthProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Credentials and strategy for one logical session.
#[derive(Clone, PartialEq, Eq)]
pub struct Login {
    pub auth_flow: AuthFlow,
    pub client_id: String,
    client_secret: Option<String>,
    pub provider: Option<AuthProviderKind>,
}

impl Login {
    /// Create a login, rejecting a missing or empty secret for flows that
    /// need one.
    pub fn new(
        auth_flow: AuthFlow,
        client_id: impl Into<String>,
        client_secret: Option<String>,
    ) -> Result<Self> {
        let client_secret = client_secret.filter(|s| !s.is_empty());
        if auth_flow.requires_secret() && client_secret.is_none() {
            return Err(AuthError::MissingSecret {
                flow: auth_flow.to_string(),
            });
        }
        Ok(Self {
            auth_flow,
            client_id: client_id.into(),
            client_secret,
            provider: None,
        })
    }

    pub fn client_credentials(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Result<Self> {
        Self::new(
            AuthFlow::ClientCredentials,
            client_id,
            Some(client_secret.into()),
        )
    }

    pub fn api_key(client_id: impl Into<String>, key: impl Into<String>) -> Result<Self> {
        Self::new(AuthFlow::ApiKey, client_id, Some(key.into()))
    }

    /// Login described by the process settings.
    pub fn from_settings(settings: &SimbaSettings) -> Result<Self> {
        let flow = AuthFlow::parse(&settings.auth_flow)
            .ok_or_else(|| AuthError::UnknownAuthFlow(settings.auth_flow.clone()))?;
        Self::new(
            flow,
            settings.client_id.clone(),
            Some(settings.client_secret.clone()),
        )
    }

    pub fn with_provider(mut self, provider: AuthProviderKind) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn client_secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }
}

impl fmt::Debug for Login {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Login")
            .field("auth_flow", &self.auth_flow)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "[REDACTED]"))
            .field("provider", &self.provider)
            .finish()
    }
}
