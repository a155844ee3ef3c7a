//! # Request Pipeline
//!
//! Every API call funnels through [`SimbaRequest`]:
//!
//! 1. Resolve credentials (unless the request is unauthenticated) and add
//!    the auth header.
//! 2. Build a scoped retrying client from the call's [`ConnectionConfig`].
//! 3. Issue the request and decode the JSON response.
//!
//! The client is dropped when the call returns, on success or failure, and
//! upload files are only opened by the transport for the duration of the
//! send.
//!
//! ## Decoding
//!
//! - Non-2xx: [`SimbaError::Request`] carrying status and raw body
//! - Empty body: `{}`
//! - Body that is not JSON: [`SimbaError::InvalidUrl`]
//!
//! ## Blocking calls
//!
//! The `_blocking` variants use `reqwest::blocking` and must not be called
//! from inside a tokio runtime.

use bridge_traits::{
    connection::ConnectionConfig,
    http::{BlockingHttpClient, HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartBody},
};
use core_auth::Login;
use core_runtime::logging::{redact_headers, strip_path};
use core_runtime::{RetryingBlockingHttpClient, RetryingHttpClient};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};
use url::Url;

use crate::context::SimbaContext;
use crate::error::{Result, SimbaError};
use crate::files::FileSet;
use crate::filter::{render_scalar, QueryParams, SearchFilter};

/// Per-call inputs besides the endpoint itself.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub headers: HashMap<String, String>,
    pub json: Option<Value>,
    pub files: Option<FileSet>,
    /// Falls back to the settings' connection defaults
    pub config: Option<ConnectionConfig>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }

    pub fn json(mut self, payload: Value) -> Self {
        self.json = Some(payload);
        self
    }

    pub fn files(mut self, files: FileSet) -> Self {
        self.files = Some(files);
        self
    }

    pub fn config(mut self, config: ConnectionConfig) -> Self {
        self.config = Some(config);
        self
    }
}

/// One API call.
///
/// # Examples
///
/// ```ignore
/// use core_service::{ApiPath, RequestOptions, SimbaRequest};
///
/// let endpoint = ApiPath::AppTxns.create(&["my-app"])?;
/// let body = SimbaRequest::get(&ctx, endpoint)
///     .send(RequestOptions::new())
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct SimbaRequest<'a> {
    pub(crate) ctx: &'a SimbaContext,
    endpoint: String,
    method: HttpMethod,
    pub(crate) query: QueryParams,
    login: Option<Login>,
    base_url: Option<String>,
    authenticated: bool,
}

impl<'a> SimbaRequest<'a> {
    pub fn new(ctx: &'a SimbaContext, method: HttpMethod, endpoint: impl Into<String>) -> Self {
        Self {
            ctx,
            endpoint: endpoint.into(),
            method,
            query: QueryParams::new(),
            login: None,
            base_url: None,
            authenticated: true,
        }
    }

    pub fn get(ctx: &'a SimbaContext, endpoint: impl Into<String>) -> Self {
        Self::new(ctx, HttpMethod::Get, endpoint)
    }

    pub fn post(ctx: &'a SimbaContext, endpoint: impl Into<String>) -> Self {
        Self::new(ctx, HttpMethod::Post, endpoint)
    }

    pub fn put(ctx: &'a SimbaContext, endpoint: impl Into<String>) -> Self {
        Self::new(ctx, HttpMethod::Put, endpoint)
    }

    pub fn patch(ctx: &'a SimbaContext, endpoint: impl Into<String>) -> Self {
        Self::new(ctx, HttpMethod::Patch, endpoint)
    }

    pub fn delete(ctx: &'a SimbaContext, endpoint: impl Into<String>) -> Self {
        Self::new(ctx, HttpMethod::Delete, endpoint)
    }

    pub(crate) fn with_method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Query parameters from `filter`, bracket style.
    pub fn with_filter(self, filter: &SearchFilter) -> Self {
        self.with_query(filter.filter_query())
    }

    /// Use `login` instead of the settings' credentials. `None` keeps the
    /// default.
    pub fn with_login(mut self, login: Option<Login>) -> Self {
        self.login = login;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Skip the login step for public endpoints.
    pub fn authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn query(&self) -> &QueryParams {
        &self.query
    }

    /// Base URL with its path replaced by the endpoint, plus the encoded
    /// query.
    pub fn url(&self) -> Result<String> {
        self.url_with(&self.query)
    }

    pub(crate) fn url_with(&self, query: &QueryParams) -> Result<String> {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or(&self.ctx.settings().api_base_url);
        build_url(base, &self.endpoint, query)
    }

    pub(crate) fn connection_config(&self, options: &RequestOptions) -> ConnectionConfig {
        options
            .config
            .clone()
            .unwrap_or_else(|| self.ctx.connection_config())
    }

    fn resolve_login(&self) -> Result<Login> {
        match &self.login {
            Some(login) => Ok(login.clone()),
            None => self.ctx.default_login(),
        }
    }

    pub(crate) async fn authorize(
        &self,
        headers: &mut HashMap<String, String>,
        config: &ConnectionConfig,
    ) -> Result<()> {
        if !self.authenticated {
            return Ok(());
        }
        let login = self.resolve_login()?;
        self.ctx.auth().login(&login, headers, config).await?;
        Ok(())
    }

    pub(crate) fn authorize_blocking(
        &self,
        headers: &mut HashMap<String, String>,
        config: &ConnectionConfig,
    ) -> Result<()> {
        if !self.authenticated {
            return Ok(());
        }
        let login = self.resolve_login()?;
        self.ctx.auth().login_blocking(&login, headers, config)?;
        Ok(())
    }

    pub(crate) fn build(
        &self,
        method: HttpMethod,
        url: String,
        headers: HashMap<String, String>,
        payload: Option<Value>,
        files: Option<&FileSet>,
        config: &ConnectionConfig,
    ) -> Result<HttpRequest> {
        let request = HttpRequest::new(method, url)
            .headers(headers)
            .timeout(config.timeout);

        if !method.allows_body() {
            return Ok(request);
        }

        let payload = payload.unwrap_or_else(|| Value::Object(Map::new()));
        let request = match files.filter(|files| !files.is_empty()) {
            Some(files) => request.multipart(multipart_body(&payload, files)?),
            None => request.json(&payload)?,
        };
        Ok(request)
    }

    /// Send the request and decode the JSON response.
    #[instrument(skip(self, options), fields(method = %self.method, endpoint = %self.endpoint))]
    pub async fn send(&self, options: RequestOptions) -> Result<Value> {
        let config = self.connection_config(&options);
        let RequestOptions {
            mut headers,
            json,
            files,
            ..
        } = options;

        self.authorize(&mut headers, &config).await?;
        let request = self.build(
            self.method,
            self.url()?,
            headers,
            json,
            files.as_ref(),
            &config,
        )?;
        log_request(&request);

        let client = RetryingHttpClient::from_config(&config, self.ctx.factory())?;
        let response = client.execute(request).await?;
        decode(&response)
    }

    /// Blocking variant of [`send`](Self::send).
    #[instrument(skip(self, options), fields(method = %self.method, endpoint = %self.endpoint))]
    pub fn send_blocking(&self, options: RequestOptions) -> Result<Value> {
        let config = self.connection_config(&options);
        let RequestOptions {
            mut headers,
            json,
            files,
            ..
        } = options;

        self.authorize_blocking(&mut headers, &config)?;
        let request = self.build(
            self.method,
            self.url()?,
            headers,
            json,
            files.as_ref(),
            &config,
        )?;
        log_request(&request);

        let client = RetryingBlockingHttpClient::from_config(&config, self.ctx.factory())?;
        let response = client.execute(request)?;
        decode(&response)
    }

    /// GET a contract getter, passing `args` as query parameters. Maps and
    /// lists are sent as compact JSON.
    #[instrument(skip(self, args, options), fields(endpoint = %self.endpoint))]
    pub async fn call(&self, args: &Map<String, Value>, options: RequestOptions) -> Result<Value> {
        let config = self.connection_config(&options);
        let mut headers = options.headers;

        self.authorize(&mut headers, &config).await?;
        let url = self.url_with(&self.call_query(args))?;
        let request = self.build(HttpMethod::Get, url, headers, None, None, &config)?;
        log_request(&request);

        let client = RetryingHttpClient::from_config(&config, self.ctx.factory())?;
        let response = client.execute(request).await?;
        decode(&response)
    }

    /// Blocking variant of [`call`](Self::call).
    #[instrument(skip(self, args, options), fields(endpoint = %self.endpoint))]
    pub fn call_blocking(
        &self,
        args: &Map<String, Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        let config = self.connection_config(&options);
        let mut headers = options.headers;

        self.authorize_blocking(&mut headers, &config)?;
        let url = self.url_with(&self.call_query(args))?;
        let request = self.build(HttpMethod::Get, url, headers, None, None, &config)?;
        log_request(&request);

        let client = RetryingBlockingHttpClient::from_config(&config, self.ctx.factory())?;
        let response = client.execute(request)?;
        decode(&response)
    }

    fn call_query(&self, args: &Map<String, Value>) -> QueryParams {
        let mut query = self.query.clone();
        for (key, value) in args {
            query.insert(key.clone(), render_scalar(value));
        }
        query
    }

    /// Stream the response body of a GET to `location`.
    ///
    /// Returns the number of bytes written. A partially written file is left
    /// in place if the transfer fails.
    #[instrument(skip(self, location, options), fields(endpoint = %self.endpoint))]
    pub async fn download(
        &self,
        location: impl AsRef<Path>,
        options: RequestOptions,
    ) -> Result<u64> {
        let location = location.as_ref();
        let config = self.connection_config(&options);
        let mut headers = options.headers;

        self.authorize(&mut headers, &config).await?;
        let request = self.build(HttpMethod::Get, self.url()?, headers, None, None, &config)?;
        log_request(&request);

        let client = RetryingHttpClient::from_config(&config, self.ctx.factory())?;
        let mut reader = client.download_stream(request).await?;
        let mut file = tokio::fs::File::create(location).await?;
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.flush().await?;

        info!(
            file = %strip_path(&location.to_string_lossy()),
            bytes = written,
            "Download complete"
        );
        Ok(written)
    }

    /// Blocking variant of [`download`](Self::download).
    #[instrument(skip(self, location, options), fields(endpoint = %self.endpoint))]
    pub fn download_blocking(
        &self,
        location: impl AsRef<Path>,
        options: RequestOptions,
    ) -> Result<u64> {
        let location = location.as_ref();
        let config = self.connection_config(&options);
        let mut headers = options.headers;

        self.authorize_blocking(&mut headers, &config)?;
        let request = self.build(HttpMethod::Get, self.url()?, headers, None, None, &config)?;
        log_request(&request);

        let client = RetryingBlockingHttpClient::from_config(&config, self.ctx.factory())?;
        let mut reader = client.download_reader(request)?;
        let mut file = std::fs::File::create(location)?;
        let written = std::io::copy(&mut reader, &mut file)?;
        file.flush()?;

        info!(
            file = %strip_path(&location.to_string_lossy()),
            bytes = written,
            "Download complete"
        );
        Ok(written)
    }
}

/// Compose `base` with its path replaced by `path` and `query` encoded.
pub fn build_url(base: &str, path: &str, query: &QueryParams) -> Result<String> {
    let mut url = Url::parse(base).map_err(|e| SimbaError::InvalidUrl {
        reason: format!("Invalid base URL {}: {}", base, e),
    })?;
    url.set_path(path);
    url.set_query(None);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query.iter());
    }
    Ok(url.into())
}

/// Decode a response into JSON, mapping failures onto [`SimbaError`].
pub fn decode(response: &HttpResponse) -> Result<Value> {
    debug!(status = response.status, bytes = response.body.len(), "Response received");

    if !response.is_success() {
        return Err(SimbaError::Request {
            status: Some(response.status),
            body: response.text_lossy(),
        });
    }
    if response.body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(&response.body).map_err(|e| SimbaError::InvalidUrl {
        reason: format!("Response is not valid JSON: {}", e),
    })
}

/// Each payload field becomes a JSON-encoded form field next to the files.
fn multipart_body(payload: &Value, files: &FileSet) -> Result<MultipartBody> {
    let fields = match payload {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| Ok((key.clone(), serde_json::to_string(value)?)))
            .collect::<std::result::Result<Vec<_>, serde_json::Error>>()
            .map_err(|e| SimbaError::Config(format!("Payload is not serialisable: {}", e)))?,
        _ => {
            return Err(SimbaError::Config(
                "A payload sent with files must be a JSON object".to_string(),
            ))
        }
    };
    Ok(MultipartBody {
        fields,
        files: files.parts(),
    })
}

fn log_request(request: &HttpRequest) {
    debug!(
        method = %request.method,
        url = %request.url,
        headers = ?redact_headers(&request.headers),
        "Sending request"
    );
}
