//! Auth Providers
//!
//! Each provider knows how to turn a [`Login`] into a token for one backend.
//! The request building and response parsing are pure; the trait supplies
//! async and blocking `login` entry points that only add the I/O.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bridge_traits::{
    http::{BlockingHttpClient, HttpClient, HttpMethod, HttpRequest, HttpResponse},
    time::Clock,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::error::{AuthError, Result};
use crate::types::{AuthProviderKind, AuthToken, Login};

/// Scope sent to the realm token endpoint when none is configured.
pub const DEFAULT_KC_SCOPE: &str = "email profile roles web-origins";

/// Header carrying the key for the API-key provider.
pub const API_KEY_HEADER: &str = "api-key";

/// Outcome of preparing a login.
#[derive(Debug)]
pub enum TokenExchange {
    /// Token available without a network round trip
    Local(AuthToken),
    /// Request to send to the token endpoint
    Remote(HttpRequest),
}

/// A token-issuing strategy.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    fn kind(&self) -> AuthProviderKind;

    /// Build the token request, or produce the token directly.
    fn exchange(&self, login: &Login, now: DateTime<Utc>) -> Result<TokenExchange>;

    /// Decode the token endpoint's response.
    fn parse_token(&self, response: &HttpResponse, now: DateTime<Utc>) -> Result<AuthToken> {
        parse_token_response(self.kind(), response, now)
    }

    /// Header injected into authenticated requests.
    fn header_name(&self) -> &'static str {
        "Authorization"
    }

    fn header_value(&self, token: &AuthToken) -> String {
        token.authorization_value()
    }

    /// Whether issued tokens may be written to the token cache.
    fn cacheable(&self) -> bool {
        true
    }

    async fn login(
        &self,
        login: &Login,
        client: &dyn HttpClient,
        clock: &dyn Clock,
    ) -> Result<AuthToken> {
        match self.exchange(login, clock.now())? {
            TokenExchange::Local(token) => Ok(token),
            TokenExchange::Remote(request) => {
                let response = client.execute(request).await?;
                self.parse_token(&response, clock.now())
            }
        }
    }

    fn login_blocking(
        &self,
        login: &Login,
        client: &dyn BlockingHttpClient,
        clock: &dyn Clock,
    ) -> Result<AuthToken> {
        match self.exchange(login, clock.now())? {
            TokenExchange::Local(token) => Ok(token),
            TokenExchange::Remote(request) => {
                let response = client.execute(request)?;
                self.parse_token(&response, clock.now())
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
}

/// Parse an OAuth2-style token response.
///
/// An absolute `expires_at` epoch wins over the relative `expires_in`.
pub fn parse_token_response(
    provider: AuthProviderKind,
    response: &HttpResponse,
    now: DateTime<Utc>,
) -> Result<AuthToken> {
    if !response.is_success() {
        warn!(
            provider = %provider,
            status = response.status,
            "Token endpoint rejected the request"
        );
        return Err(AuthError::AuthenticationFailed {
            provider: provider.to_string(),
            reason: format!("HTTP {}: {}", response.status, response.text_lossy()),
        });
    }

    let body: TokenResponse = serde_json::from_slice(&response.body)
        .map_err(|e| AuthError::InvalidTokenResponse(e.to_string()))?;

    let expires = match (body.expires_at, body.expires_in) {
        (Some(epoch), _) => DateTime::from_timestamp(epoch, 0).ok_or_else(|| {
            AuthError::InvalidTokenResponse(format!("expires_at out of range: {}", epoch))
        })?,
        (None, Some(seconds)) => now + Duration::seconds(seconds),
        (None, None) => {
            return Err(AuthError::InvalidTokenResponse(
                "response carries neither expires_in nor expires_at".to_string(),
            ))
        }
    };

    Ok(AuthToken::new(
        body.access_token,
        body.token_type.unwrap_or_else(|| "Bearer".to_string()),
        expires,
    ))
}

fn require_secret(login: &Login) -> Result<&str> {
    login.client_secret().ok_or_else(|| AuthError::MissingSecret {
        flow: login.auth_flow.to_string(),
    })
}

/// HTTP Basic client credentials against `<auth_base>/o/token/`.
#[derive(Debug, Clone)]
pub struct BlocksAuthProvider {
    auth_base_url: String,
}

impl BlocksAuthProvider {
    pub fn new(auth_base_url: impl Into<String>) -> Self {
        Self {
            auth_base_url: auth_base_url.into(),
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/o/token/", self.auth_base_url)
    }
}

#[async_trait]
impl AuthProvider for BlocksAuthProvider {
    fn kind(&self) -> AuthProviderKind {
        AuthProviderKind::Blk
    }

    fn exchange(&self, login: &Login, _now: DateTime<Utc>) -> Result<TokenExchange> {
        let secret = require_secret(login)?;
        let credentials = STANDARD.encode(format!("{}:{}", login.client_id, secret));
        let request = HttpRequest::new(HttpMethod::Post, self.token_url())
            .header("Authorization", format!("Basic {}", credentials))
            .form(&[("grant_type", "client_credentials")])?;
        Ok(TokenExchange::Remote(request))
    }
}

/// Client-credentials POST to a realm-scoped OpenID Connect endpoint.
#[derive(Debug, Clone)]
pub struct KeycloakAuthProvider {
    auth_base_url: String,
    realm: Option<String>,
    scope: Option<String>,
}

impl KeycloakAuthProvider {
    pub fn new(
        auth_base_url: impl Into<String>,
        realm: Option<String>,
        scope: Option<String>,
    ) -> Self {
        Self {
            auth_base_url: auth_base_url.into(),
            realm,
            scope,
        }
    }

    pub fn token_url(&self) -> Result<String> {
        let realm = self.realm.as_deref().ok_or_else(|| {
            AuthError::Config("AUTH_REALM is required for the KC provider".to_string())
        })?;
        Ok(format!(
            "{}/auth/realms/{}/protocol/openid-connect/token",
            self.auth_base_url, realm
        ))
    }
}

#[async_trait]
impl AuthProvider for KeycloakAuthProvider {
    fn kind(&self) -> AuthProviderKind {
        AuthProviderKind::Kc
    }

    fn exchange(&self, login: &Login, _now: DateTime<Utc>) -> Result<TokenExchange> {
        let secret = require_secret(login)?;
        let scope = self.scope.as_deref().unwrap_or(DEFAULT_KC_SCOPE);
        let request = HttpRequest::new(HttpMethod::Post, self.token_url()?).form(&[
            ("client_id", login.client_id.as_str()),
            ("client_secret", secret),
            ("grant_type", "client_credentials"),
            ("scope", scope),
        ])?;
        Ok(TokenExchange::Remote(request))
    }
}

/// Platform token endpoint at `<auth_base>/oauth/token`.
///
/// The response carries an absolute `expires_at` epoch.
#[derive(Debug, Clone)]
pub struct PlatformAuthProvider {
    auth_base_url: String,
}

impl PlatformAuthProvider {
    pub fn new(auth_base_url: impl Into<String>) -> Self {
        Self {
            auth_base_url: auth_base_url.into(),
        }
    }

    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.auth_base_url)
    }
}

#[async_trait]
impl AuthProvider for PlatformAuthProvider {
    fn kind(&self) -> AuthProviderKind {
        AuthProviderKind::Plat
    }

    fn exchange(&self, login: &Login, _now: DateTime<Utc>) -> Result<TokenExchange> {
        let secret = require_secret(login)?;
        let request = HttpRequest::new(HttpMethod::Post, self.token_url()).form(&[
            ("client_id", login.client_id.as_str()),
            ("client_secret", secret),
            ("grant_type", "client_credentials"),
        ])?;
        Ok(TokenExchange::Remote(request))
    }
}

/// Static key sent in the `api-key` header. No network round trip.
#[derive(Debug, Clone, Default)]
pub struct ApiKeyProvider;

#[async_trait]
impl AuthProvider for ApiKeyProvider {
    fn kind(&self) -> AuthProviderKind {
        AuthProviderKind::ApiKey
    }

    fn exchange(&self, login: &Login, now: DateTime<Utc>) -> Result<TokenExchange> {
        let key = require_secret(login)?;
        Ok(TokenExchange::Local(AuthToken::new(
            key,
            "ApiKey",
            now + Duration::days(1),
        )))
    }

    fn header_name(&self) -> &'static str {
        API_KEY_HEADER
    }

    fn header_value(&self, token: &AuthToken) -> String {
        token.token.clone()
    }

    fn cacheable(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpBody;
    use bridge_traits::time::ManualClock;
    use bytes::Bytes;
    use chrono::TimeZone;
    use mockall::mock;
    use std::collections::HashMap;
    use tokio::io::AsyncRead;

    mock! {
        HttpClient {}

        #[async_trait]
        impl HttpClient for HttpClient {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
            async fn download_stream(&self, request: HttpRequest) -> BridgeResult<Box<dyn AsyncRead + Send + Unpin>>;
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn json_response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: HashMap::new(),
            body: Bytes::from(body.to_string()),
        }
    }

    fn body_text(request: &HttpRequest) -> String {
        match &request.body {
            HttpBody::Bytes(bytes) => String::from_utf8(bytes.to_vec()).unwrap(),
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[test]
    fn test_blocks_exchange_uses_basic_auth() {
        let provider = BlocksAuthProvider::new("https://auth.example.com");
        let login = Login::client_credentials("id", "secret").unwrap();

        let TokenExchange::Remote(request) = provider.exchange(&login, now()).unwrap() else {
            panic!("expected remote exchange");
        };
        assert_eq!(request.url, "https://auth.example.com/o/token/");
        assert_eq!(request.method, HttpMethod::Post);
        assert_eq!(
            request.header_value("authorization"),
            Some(format!("Basic {}", STANDARD.encode("id:secret")).as_str())
        );
        assert_eq!(body_text(&request), "grant_type=client_credentials");
    }

    #[test]
    fn test_keycloak_exchange_defaults_scope() {
        let provider =
            KeycloakAuthProvider::new("https://auth.example.com", Some("simba".to_string()), None);
        let login = Login::client_credentials("id", "secret").unwrap();

        let TokenExchange::Remote(request) = provider.exchange(&login, now()).unwrap() else {
            panic!("expected remote exchange");
        };
        assert_eq!(
            request.url,
            "https://auth.example.com/auth/realms/simba/protocol/openid-connect/token"
        );
        let body = body_text(&request);
        assert!(body.contains("client_id=id"));
        assert!(body.contains("scope=email+profile+roles+web-origins"));
    }

    #[test]
    fn test_keycloak_requires_realm() {
        let provider = KeycloakAuthProvider::new("https://auth.example.com", None, None);
        let login = Login::client_credentials("id", "secret").unwrap();
        assert!(matches!(
            provider.exchange(&login, now()),
            Err(AuthError::Config(_))
        ));
    }

    #[test]
    fn test_parse_relative_expiry() {
        let response = json_response(
            200,
            r#"{"access_token":"abc","token_type":"Bearer","expires_in":3600}"#,
        );
        let token = parse_token_response(AuthProviderKind::Blk, &response, now()).unwrap();
        assert_eq!(token.token, "abc");
        assert_eq!(token.expires, now() + Duration::seconds(3600));
    }

    #[test]
    fn test_parse_absolute_expiry() {
        let epoch = now().timestamp() + 7200;
        let response = json_response(
            200,
            &format!(
                r#"{{"access_token":"abc","expires_in":10,"expires_at":{}}}"#,
                epoch
            ),
        );
        let token = PlatformAuthProvider::new("https://auth.example.com")
            .parse_token(&response, now())
            .unwrap();
        assert_eq!(token.expires.timestamp(), epoch);
        assert_eq!(token.token_type, "Bearer");
    }

    #[test]
    fn test_parse_failure_status() {
        let response = json_response(401, r#"{"error":"invalid_client"}"#);
        let err = parse_token_response(AuthProviderKind::Kc, &response, now()).unwrap_err();
        match err {
            AuthError::AuthenticationFailed { provider, reason } => {
                assert_eq!(provider, "KC");
                assert!(reason.contains("invalid_client"));
            }
            other => panic!("unexpected error {:?}", other),
        }

        let missing = json_response(200, r#"{"access_token":"abc"}"#);
        assert!(matches!(
            parse_token_response(AuthProviderKind::Kc, &missing, now()),
            Err(AuthError::InvalidTokenResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_api_key_login_is_local() {
        let clock = ManualClock::new(now());
        let mut client = MockHttpClient::new();
        client.expect_execute().never();

        let login = Login::api_key("id", "key-123").unwrap();
        let token = ApiKeyProvider.login(&login, &client, &clock).await.unwrap();

        assert_eq!(token.token, "key-123");
        assert_eq!(token.token_type, "ApiKey");
        assert_eq!(token.expires, now() + Duration::days(1));
        assert_eq!(ApiKeyProvider.header_name(), "api-key");
        assert_eq!(ApiKeyProvider.header_value(&token), "key-123");
        assert!(!ApiKeyProvider.cacheable());
    }

    #[tokio::test]
    async fn test_remote_login_uses_client() {
        let clock = ManualClock::new(now());
        let mut client = MockHttpClient::new();
        client
            .expect_execute()
            .withf(|request| request.url.ends_with("/oauth/token"))
            .times(1)
            .returning(|_| {
                Ok(json_response(
                    200,
                    r#"{"access_token":"plat","token_type":"bearer","expires_in":60}"#,
                ))
            });

        let login = Login::client_credentials("id", "secret").unwrap();
        let provider = PlatformAuthProvider::new("https://auth.example.com");
        let token = provider.login(&login, &client, &clock).await.unwrap();
        assert_eq!(provider.header_value(&token), "Bearer plat");
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let clock = ManualClock::new(now());
        let mut client = MockHttpClient::new();
        client
            .expect_execute()
            .returning(|_| Err(BridgeError::Connect("refused".to_string())));

        let login = Login::client_credentials("id", "secret").unwrap();
        let err = BlocksAuthProvider::new("https://auth.example.com")
            .login(&login, &client, &clock)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Transport(BridgeError::Connect(_))));
    }
}
