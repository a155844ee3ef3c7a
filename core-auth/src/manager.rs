//! # Authentication Manager
//!
//! Provider registry plus token cache, shared by every request a client
//! makes.
//!
//! ## Overview
//!
//! `login` resolves the auth header for a request:
//!
//! 1. If the caller already supplied an `Authorization` header (or the
//!    provider's own header, such as `api-key`), nothing happens.
//! 2. A valid cached token for the client id is reused.
//! 3. Otherwise the provider for `login.provider` (or the configured
//!    default) performs the exchange through a freshly built retrying
//!    client, and the token is cached.
//!
//! Concurrent logins for the same client id are serialised so only one
//! exchange is in flight per client; waiters pick up the cached result.
//!
//! ## Usage
//!
//! ```ignore
//! use core_auth::{AuthManager, Login};
//! use std::collections::HashMap;
//!
//! let manager = AuthManager::from_settings(&settings, factory)?;
//! let login = Login::from_settings(&settings)?;
//!
//! let mut headers = HashMap::new();
//! manager.login(&login, &mut headers, &settings.connection_config()).await?;
//! assert!(headers.contains_key("Authorization"));
//! ```

use crate::error::{AuthError, Result};
use crate::providers::{
    ApiKeyProvider, AuthProvider, BlocksAuthProvider, KeycloakAuthProvider, PlatformAuthProvider,
};
use crate::token_store::TokenCache;
use crate::types::{AuthFlow, AuthProviderKind, AuthToken, Login};
use bridge_traits::{
    connection::ConnectionConfig,
    http::HttpClientFactory,
    time::{Clock, SystemClock},
};
use core_runtime::{RetryingBlockingHttpClient, RetryingHttpClient, SimbaSettings};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

type AsyncLocks = tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>;
type BlockingLocks = std::sync::Mutex<HashMap<String, Arc<std::sync::Mutex<()>>>>;

/// Provider registry and token cache.
pub struct AuthManager {
    providers: HashMap<AuthProviderKind, Arc<dyn AuthProvider>>,
    default_provider: AuthProviderKind,
    cache: TokenCache,
    factory: Arc<dyn HttpClientFactory>,
    clock: Arc<dyn Clock>,
    /// Per client id locks so only one exchange runs at a time
    login_locks: AsyncLocks,
    blocking_login_locks: BlockingLocks,
}

impl AuthManager {
    /// Create a manager with an empty registry.
    pub fn new(
        cache: TokenCache,
        factory: Arc<dyn HttpClientFactory>,
        default_provider: AuthProviderKind,
    ) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider,
            cache,
            factory,
            clock: Arc::new(SystemClock),
            login_locks: tokio::sync::Mutex::new(HashMap::new()),
            blocking_login_locks: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Create a manager with every built-in provider registered.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ProviderNotRegistered`] if `AUTH_PROVIDER` does
    /// not name a known provider.
    pub fn from_settings(
        settings: &SimbaSettings,
        factory: Arc<dyn HttpClientFactory>,
    ) -> Result<Self> {
        let default_provider = AuthProviderKind::parse(&settings.auth_provider)
            .ok_or_else(|| AuthError::ProviderNotRegistered(settings.auth_provider.clone()))?;

        let cache = TokenCache::new(settings.token_cache_dir().map(|p| p.to_path_buf()));
        let mut manager = Self::new(cache, factory, default_provider);

        manager.register(Arc::new(BlocksAuthProvider::new(&settings.auth_base_url)));
        manager.register(Arc::new(KeycloakAuthProvider::new(
            &settings.auth_base_url,
            settings.auth_realm.clone(),
            settings.auth_scope.clone(),
        )));
        manager.register(Arc::new(PlatformAuthProvider::new(&settings.auth_base_url)));
        manager.register(Arc::new(ApiKeyProvider));

        Ok(manager)
    }

    /// Use `clock` for expiry checks in the manager and its cache.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.cache = self.cache.with_clock(clock.clone());
        self.clock = clock;
        self
    }

    /// Add or replace a provider.
    pub fn register(&mut self, provider: Arc<dyn AuthProvider>) {
        debug!(provider = %provider.kind(), "Registering auth provider");
        self.providers.insert(provider.kind(), provider);
    }

    pub fn registered_providers(&self) -> Vec<AuthProviderKind> {
        self.providers.keys().copied().collect()
    }

    pub fn default_provider(&self) -> AuthProviderKind {
        self.default_provider
    }

    pub fn cache(&self) -> &TokenCache {
        &self.cache
    }

    /// Provider for `login`: explicit choice, the API-key provider for the
    /// API-key flow, else the configured default.
    pub fn resolve_provider(&self, login: &Login) -> Result<Arc<dyn AuthProvider>> {
        let kind = login.provider.unwrap_or(match login.auth_flow {
            AuthFlow::ApiKey => AuthProviderKind::ApiKey,
            AuthFlow::ClientCredentials => self.default_provider,
        });
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| AuthError::ProviderNotRegistered(kind.to_string()))
    }

    /// Ensure `headers` carry credentials for `login`.
    ///
    /// Returns the token used, or `None` when the headers were already
    /// authorised and left untouched.
    #[instrument(skip(self, login, headers, config), fields(client_id = %login.client_id))]
    pub async fn login(
        &self,
        login: &Login,
        headers: &mut HashMap<String, String>,
        config: &ConnectionConfig,
    ) -> Result<Option<AuthToken>> {
        if has_header(headers, "Authorization") {
            return Ok(None);
        }
        let provider = self.resolve_provider(login)?;
        if has_header(headers, provider.header_name()) {
            return Ok(None);
        }

        let token = match self.cached(&provider, login)? {
            Some(token) => token,
            None => self.exchange(&provider, login, config).await?,
        };

        headers.insert(
            provider.header_name().to_string(),
            provider.header_value(&token),
        );
        Ok(Some(token))
    }

    /// Blocking variant of [`login`](Self::login).
    #[instrument(skip(self, login, headers, config), fields(client_id = %login.client_id))]
    pub fn login_blocking(
        &self,
        login: &Login,
        headers: &mut HashMap<String, String>,
        config: &ConnectionConfig,
    ) -> Result<Option<AuthToken>> {
        if has_header(headers, "Authorization") {
            return Ok(None);
        }
        let provider = self.resolve_provider(login)?;
        if has_header(headers, provider.header_name()) {
            return Ok(None);
        }

        let token = match self.cached(&provider, login)? {
            Some(token) => token,
            None => self.exchange_blocking(&provider, login, config)?,
        };

        headers.insert(
            provider.header_name().to_string(),
            provider.header_value(&token),
        );
        Ok(Some(token))
    }

    /// Run the exchange under the client id's lock, re-checking the cache
    /// once the lock is held.
    async fn exchange(
        &self,
        provider: &Arc<dyn AuthProvider>,
        login: &Login,
        config: &ConnectionConfig,
    ) -> Result<AuthToken> {
        let lock = {
            let mut locks = self.login_locks.lock().await;
            locks
                .entry(login.client_id.clone())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = lock.lock().await;
            match self.cached(provider, login) {
                Ok(Some(token)) => Ok(token),
                Ok(None) => self.fetch(provider, login, config).await,
                Err(err) => Err(err),
            }
        };

        release_lock(&mut *self.login_locks.lock().await, &login.client_id, lock);
        result
    }

    async fn fetch(
        &self,
        provider: &Arc<dyn AuthProvider>,
        login: &Login,
        config: &ConnectionConfig,
    ) -> Result<AuthToken> {
        let client = RetryingHttpClient::from_config(config, &self.factory)?;
        let token = provider.login(login, &client, self.clock.as_ref()).await?;
        self.store(provider, login, &token)?;
        Ok(token)
    }

    fn exchange_blocking(
        &self,
        provider: &Arc<dyn AuthProvider>,
        login: &Login,
        config: &ConnectionConfig,
    ) -> Result<AuthToken> {
        let lock = {
            let mut locks = self
                .blocking_login_locks
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            locks
                .entry(login.client_id.clone())
                .or_insert_with(|| Arc::new(std::sync::Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
            match self.cached(provider, login) {
                Ok(Some(token)) => Ok(token),
                Ok(None) => self.fetch_blocking(provider, login, config),
                Err(err) => Err(err),
            }
        };

        let mut locks = self
            .blocking_login_locks
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        release_lock(&mut locks, &login.client_id, lock);
        result
    }

    fn fetch_blocking(
        &self,
        provider: &Arc<dyn AuthProvider>,
        login: &Login,
        config: &ConnectionConfig,
    ) -> Result<AuthToken> {
        let client = RetryingBlockingHttpClient::from_config(config, &self.factory)?;
        let token = provider.login_blocking(login, &client, self.clock.as_ref())?;
        self.store(provider, login, &token)?;
        Ok(token)
    }

    fn cached(
        &self,
        provider: &Arc<dyn AuthProvider>,
        login: &Login,
    ) -> Result<Option<AuthToken>> {
        if !provider.cacheable() {
            return Ok(None);
        }
        let token = self.cache.get(&login.client_id)?;
        if token.is_some() {
            debug!(provider = %provider.kind(), "Using cached token");
        }
        Ok(token)
    }

    fn store(
        &self,
        provider: &Arc<dyn AuthProvider>,
        login: &Login,
        token: &AuthToken,
    ) -> Result<()> {
        if provider.cacheable() {
            self.cache.put(&login.client_id, token)?;
            info!(
                provider = %provider.kind(),
                expires = %token.expires,
                "Obtained new access token"
            );
        }
        Ok(())
    }
}

impl std::fmt::Debug for AuthManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthManager")
            .field("providers", &self.registered_providers())
            .field("default_provider", &self.default_provider)
            .field("cache", &self.cache)
            .finish()
    }
}

/// Give back the caller's handle and drop the table entry for `client_id`
/// once nobody else holds it.
///
/// Handles are only cloned and released with the table locked, so the last
/// caller out always sees the table's reference alone.
fn release_lock<T>(locks: &mut HashMap<String, Arc<T>>, client_id: &str, lock: Arc<T>) {
    drop(lock);
    if locks.get(client_id).is_some_and(|held| Arc::strong_count(held) == 1) {
        locks.remove(client_id);
    }
}

fn has_header(headers: &HashMap<String, String>, name: &str) -> bool {
    headers
        .iter()
        .any(|(key, value)| key.eq_ignore_ascii_case(name) && !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::{BlockingHttpClient, HttpClient, HttpRequest, HttpResponse};
    use bridge_traits::time::ManualClock;
    use bytes::Bytes;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::AsyncRead;

    /// Token endpoint stub that counts exchanges.
    #[derive(Clone, Default)]
    struct StubTokenEndpoint {
        calls: Arc<AtomicUsize>,
    }

    impl StubTokenEndpoint {
        fn respond(&self, request: &HttpRequest) -> BridgeResult<HttpResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            assert!(request.url.starts_with("https://auth.example.com"));
            Ok(HttpResponse {
                status: 200,
                headers: HashMap::new(),
                body: Bytes::from(format!(
                    r#"{{"access_token":"token-{}","token_type":"Bearer","expires_in":3600}}"#,
                    n
                )),
            })
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for StubTokenEndpoint {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            tokio::task::yield_now().await;
            self.respond(&request)
        }

        async fn download_stream(
            &self,
            _request: HttpRequest,
        ) -> BridgeResult<Box<dyn AsyncRead + Send + Unpin>> {
            Err(BridgeError::NotAvailable("download".to_string()))
        }
    }

    impl BlockingHttpClient for StubTokenEndpoint {
        fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
            self.respond(&request)
        }

        fn download_reader(
            &self,
            _request: HttpRequest,
        ) -> BridgeResult<Box<dyn std::io::Read + Send>> {
            Err(BridgeError::NotAvailable("download".to_string()))
        }
    }

    impl HttpClientFactory for StubTokenEndpoint {
        fn async_client(&self, _config: &ConnectionConfig) -> BridgeResult<Box<dyn HttpClient>> {
            Ok(Box::new(self.clone()))
        }

        fn blocking_client(
            &self,
            _config: &ConnectionConfig,
        ) -> BridgeResult<Box<dyn BlockingHttpClient>> {
            Ok(Box::new(self.clone()))
        }
    }

    fn settings(provider: &str) -> SimbaSettings {
        SimbaSettings::builder()
            .api_base_url("https://api.example.com")
            .auth_base_url("https://auth.example.com")
            .auth_provider(provider)
            .auth_realm("simba")
            .write_token_to_file(false)
            .build()
            .unwrap()
    }

    fn manager(endpoint: &StubTokenEndpoint) -> AuthManager {
        AuthManager::from_settings(&settings("BLK"), Arc::new(endpoint.clone())).unwrap()
    }

    #[tokio::test]
    async fn test_existing_authorization_short_circuits() {
        let endpoint = StubTokenEndpoint::default();
        let manager = manager(&endpoint);
        let login = Login::client_credentials("id", "secret").unwrap();

        let mut headers = HashMap::new();
        headers.insert("authorization".to_string(), "Bearer mine".to_string());

        let token = manager
            .login(&login, &mut headers, &ConnectionConfig::default())
            .await
            .unwrap();

        assert!(token.is_none());
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["authorization"], "Bearer mine");
    }

    #[tokio::test]
    async fn test_login_caches_token() {
        let endpoint = StubTokenEndpoint::default();
        let manager = manager(&endpoint);
        let login = Login::client_credentials("id", "secret").unwrap();
        let config = ConnectionConfig::default();

        let mut first = HashMap::new();
        manager.login(&login, &mut first, &config).await.unwrap();
        let mut second = HashMap::new();
        manager.login(&login, &mut second, &config).await.unwrap();

        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first["Authorization"], "Bearer token-1");
        assert_eq!(second["Authorization"], "Bearer token-1");
    }

    #[tokio::test]
    async fn test_expired_token_triggers_new_exchange() {
        let endpoint = StubTokenEndpoint::default();
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        ));
        let manager = manager(&endpoint).with_clock(clock.clone());
        let login = Login::client_credentials("id", "secret").unwrap();
        let config = ConnectionConfig::default();

        manager.login(&login, &mut HashMap::new(), &config).await.unwrap();
        clock.advance(Duration::seconds(3600 - 60));

        let mut headers = HashMap::new();
        manager.login(&login, &mut headers, &config).await.unwrap();
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 2);
        assert_eq!(headers["Authorization"], "Bearer token-2");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_logins_share_one_exchange() {
        let endpoint = StubTokenEndpoint::default();
        let manager = Arc::new(manager(&endpoint));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move {
                    let login = Login::client_credentials("shared", "secret").unwrap();
                    let mut headers = HashMap::new();
                    manager
                        .login(&login, &mut headers, &ConnectionConfig::default())
                        .await
                        .unwrap();
                    headers["Authorization"].clone()
                })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap(), "Bearer token-1");
        }
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
        assert!(manager.login_locks.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_login_lock_released_after_exchange() {
        let endpoint = StubTokenEndpoint::default();
        let manager = manager(&endpoint);
        let config = ConnectionConfig::default();

        for client_id in ["a", "b", "c"] {
            let login = Login::client_credentials(client_id, "secret").unwrap();
            manager.login(&login, &mut HashMap::new(), &config).await.unwrap();
        }
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 3);
        assert!(manager.login_locks.lock().await.is_empty());

        let login = Login::client_credentials("d", "secret").unwrap();
        manager
            .login_blocking(&login, &mut HashMap::new(), &config)
            .unwrap();
        assert!(manager.blocking_login_locks.lock().unwrap().is_empty());
    }

    #[test]
    fn test_release_lock_keeps_shared_entries() {
        let mut locks = HashMap::new();
        let lock = Arc::new(std::sync::Mutex::new(()));
        locks.insert("id".to_string(), lock.clone());

        let waiter = lock.clone();
        release_lock(&mut locks, "id", lock);
        assert!(locks.contains_key("id"));

        release_lock(&mut locks, "id", waiter);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_api_key_flow_injects_header() {
        let endpoint = StubTokenEndpoint::default();
        let manager = manager(&endpoint);
        let login = Login::api_key("id", "key-123").unwrap();

        let mut headers = HashMap::new();
        manager
            .login(&login, &mut headers, &ConnectionConfig::default())
            .await
            .unwrap();

        assert_eq!(headers["api-key"], "key-123");
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
        assert!(manager.cache().get("id").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unregistered_provider_is_fatal() {
        let endpoint = StubTokenEndpoint::default();
        let manager = AuthManager::new(
            TokenCache::in_memory(),
            Arc::new(endpoint.clone()),
            AuthProviderKind::Blk,
        );
        let login = Login::client_credentials("id", "secret").unwrap();

        let err = manager
            .login(&login, &mut HashMap::new(), &ConnectionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::ProviderNotRegistered(_)));
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unknown_default_provider_is_rejected() {
        let endpoint = StubTokenEndpoint::default();
        let err = AuthManager::from_settings(&settings("NOOP"), Arc::new(endpoint)).unwrap_err();
        assert!(matches!(err, AuthError::ProviderNotRegistered(_)));
    }

    #[test]
    fn test_blocking_login_uses_explicit_provider() {
        let endpoint = StubTokenEndpoint::default();
        let manager = manager(&endpoint);
        let login = Login::client_credentials("kc-client", "secret")
            .unwrap()
            .with_provider(AuthProviderKind::Kc);
        let config = ConnectionConfig::default();

        let mut headers = HashMap::new();
        let token = manager
            .login_blocking(&login, &mut headers, &config)
            .unwrap()
            .unwrap();
        assert_eq!(token.token, "token-1");

        manager
            .login_blocking(&login, &mut HashMap::new(), &config)
            .unwrap();
        assert_eq!(endpoint.calls.load(Ordering::SeqCst), 1);
        assert_eq!(headers["Authorization"], "Bearer token-1");
    }
}
