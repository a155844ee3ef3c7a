//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    connection::ConnectionConfig,
    error::{BridgeError, Result},
    http::{HttpBody, HttpClient, HttpMethod, HttpRequest, HttpResponse, MultipartBody},
};
use futures_util::TryStreamExt;
use reqwest::header::HeaderMap;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::collections::HashMap;
use tokio::io::AsyncRead;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, warn};

pub(crate) const USER_AGENT: &str = concat!("libsimba-rs/", env!("CARGO_PKG_VERSION"));

/// Reqwest-based HTTP client implementation
///
/// Performs one exchange per call. Connection failures are resent up to
/// `connection_retries` times; status-based retries live in the retrying
/// wrapper.
pub struct ReqwestHttpClient {
    client: Client,
    connection_retries: u32,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::from_config(&ConnectionConfig::default())
    }

    /// Create a new HTTP client honouring a connection config
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .danger_accept_invalid_certs(!config.verify);

        if config.http2 {
            builder = builder.http2_prior_knowledge();
        }
        if config.close_connection_after_use {
            builder = builder.pool_max_idle_per_host(0);
        }

        let client = builder.build().map_err(|e| {
            BridgeError::OperationFailed(format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            connection_retries: config.connection_retries,
        })
    }

    /// Create a new HTTP client around an existing reqwest client
    pub fn with_client(client: Client, connection_retries: u32) -> Self {
        Self {
            client,
            connection_retries,
        }
    }

    /// Build reqwest request from bridge request
    ///
    /// Multipart files are opened here so each attempt streams from a fresh
    /// handle that is dropped with the request.
    async fn build_request(&self, request: &HttpRequest) -> Result<reqwest::RequestBuilder> {
        let method = convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        match &request.body {
            HttpBody::Empty => {}
            HttpBody::Bytes(body) => {
                req = req.body(body.clone());
            }
            HttpBody::Multipart(body) => {
                req = req.multipart(build_form(body).await?);
            }
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        Ok(req)
    }

    async fn send(&self, request: &HttpRequest) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            debug!(
                method = %request.method,
                url = %request.url,
                attempt = attempt + 1,
                "Executing HTTP request"
            );

            let builder = self.build_request(request).await?;
            match builder.send().await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt < self.connection_retries => {
                    warn!(
                        error = %e,
                        attempt = attempt + 1,
                        max_retries = self.connection_retries,
                        "Connection failed, retrying"
                    );
                    attempt += 1;
                }
                Err(e) => return Err(map_reqwest_error(e)),
            }
        }
    }
}

async fn build_form(body: &MultipartBody) -> Result<Form> {
    let mut form = Form::new();
    for (name, value) in &body.fields {
        form = form.text(name.clone(), value.clone());
    }
    for file in &body.files {
        let handle = tokio::fs::File::open(&file.path).await?;
        let length = handle.metadata().await?.len();
        let stream = reqwest::Body::wrap_stream(ReaderStream::new(handle));
        let part = Part::stream_with_length(stream, length)
            .file_name(file.file_name.clone())
            .mime_str(&file.mime_type)
            .map_err(|e| {
                BridgeError::OperationFailed(format!(
                    "Invalid mime type {}: {}",
                    file.mime_type, e
                ))
            })?;
        form = form.part(file.field_name.clone(), part);
    }
    Ok(form)
}

/// Convert bridge HttpMethod to reqwest Method
pub(crate) fn convert_method(method: HttpMethod) -> reqwest::Method {
    match method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
        HttpMethod::Head => reqwest::Method::HEAD,
        HttpMethod::Options => reqwest::Method::OPTIONS,
        HttpMethod::Trace => reqwest::Method::TRACE,
    }
}

pub(crate) fn convert_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
        .collect()
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> BridgeError {
    if e.is_builder() {
        BridgeError::InvalidUrl(e.to_string())
    } else if e.is_connect() {
        BridgeError::Connect(e.to_string())
    } else if e.is_timeout() {
        BridgeError::Timeout(e.to_string())
    } else if e.is_decode() || e.is_body() {
        BridgeError::Protocol(e.to_string())
    } else {
        BridgeError::OperationFailed(e.to_string())
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.send(&request).await?;
        let status = response.status().as_u16();
        let headers = convert_headers(response.headers());
        let body = response.bytes().await.map_err(map_reqwest_error)?;

        debug!(status = status, url = %request.url, "HTTP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    async fn download_stream(
        &self,
        request: HttpRequest,
    ) -> Result<Box<dyn AsyncRead + Send + Unpin>> {
        let response = self.send(&request).await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BridgeError::Status { status, body });
        }

        let stream = response.bytes_stream().map_err(std::io::Error::other);
        let reader = StreamReader::new(stream);

        Ok(Box::new(reader))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::http::FilePart;
    use std::io::Write;

    #[tokio::test]
    async fn test_http_client_creation() {
        let config = ConnectionConfig::default()
            .with_http2(true)
            .with_close_connection_after_use(true)
            .with_verify(false);
        assert!(ReqwestHttpClient::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_method_conversion() {
        assert_eq!(convert_method(HttpMethod::Get), reqwest::Method::GET);
        assert_eq!(convert_method(HttpMethod::Post), reqwest::Method::POST);
        assert_eq!(convert_method(HttpMethod::Trace), reqwest::Method::TRACE);
    }

    #[tokio::test]
    async fn test_invalid_url_is_reported() {
        let client = ReqwestHttpClient::new().unwrap();
        let err = client
            .execute(HttpRequest::new(HttpMethod::Get, "not a url"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_connect_error() {
        let config = ConnectionConfig::default().with_connection_retries(0);
        let client = ReqwestHttpClient::from_config(&config).unwrap();
        let err = client
            .execute(HttpRequest::new(HttpMethod::Get, "http://127.0.0.1:9/"))
            .await
            .unwrap_err();
        assert!(err.is_connect());
    }

    #[tokio::test]
    async fn test_multipart_form_opens_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "hello").unwrap();

        let body = MultipartBody {
            fields: vec![("inputs".to_string(), "{\"a\":1}".to_string())],
            files: vec![FilePart {
                field_name: "files".to_string(),
                file_name: "hello.txt".to_string(),
                mime_type: "text/plain".to_string(),
                path: file.path().to_path_buf(),
            }],
        };
        assert!(build_form(&body).await.is_ok());

        let missing = MultipartBody {
            fields: vec![],
            files: vec![FilePart {
                field_name: "files".to_string(),
                file_name: "gone.txt".to_string(),
                mime_type: "text/plain".to_string(),
                path: file.path().with_extension("missing"),
            }],
        };
        assert!(matches!(
            build_form(&missing).await,
            Err(BridgeError::Io(_))
        ));
    }
}
