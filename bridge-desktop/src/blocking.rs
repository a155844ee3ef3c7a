//! Blocking HTTP Client Implementation using Reqwest
//!
//! `reqwest::blocking` spins up its own runtime internally, so these clients
//! must not be created or used from inside an async task.

use bridge_traits::{
    connection::ConnectionConfig,
    error::{BridgeError, Result},
    http::{BlockingHttpClient, HttpBody, HttpRequest, HttpResponse, MultipartBody},
};
use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use std::io::Read;
use tracing::{debug, warn};

use crate::http::{convert_headers, convert_method, map_reqwest_error, USER_AGENT};

/// Blocking reqwest client
pub struct ReqwestBlockingHttpClient {
    client: Client,
    connection_retries: u32,
}

impl ReqwestBlockingHttpClient {
    pub fn new() -> Result<Self> {
        Self::from_config(&ConnectionConfig::default())
    }

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

    fn build_request(&self, request: &HttpRequest) -> Result<reqwest::blocking::RequestBuilder> {
        let mut req = self
            .client
            .request(convert_method(request.method), &request.url);

        for (key, value) in &request.headers {
            req = req.header(key, value);
        }

        match &request.body {
            HttpBody::Empty => {}
            HttpBody::Bytes(body) => {
                req = req.body(body.to_vec());
            }
            HttpBody::Multipart(body) => {
                req = req.multipart(build_form(body)?);
            }
        }

        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        Ok(req)
    }

    fn send(&self, request: &HttpRequest) -> Result<reqwest::blocking::Response> {
        let mut attempt = 0;
        loop {
            debug!(
                method = %request.method,
                url = %request.url,
                attempt = attempt + 1,
                "Executing blocking HTTP request"
            );

            match self.build_request(request)?.send() {
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

fn build_form(body: &MultipartBody) -> Result<Form> {
    let mut form = Form::new();
    for (name, value) in &body.fields {
        form = form.text(name.clone(), value.clone());
    }
    for file in &body.files {
        let part = Part::file(&file.path)?
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

impl BlockingHttpClient for ReqwestBlockingHttpClient {
    fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let response = self.send(&request)?;
        let status = response.status().as_u16();
        let headers = convert_headers(response.headers());
        let body = response.bytes().map_err(map_reqwest_error)?;

        debug!(status = status, url = %request.url, "HTTP response received");

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }

    fn download_reader(&self, request: HttpRequest) -> Result<Box<dyn Read + Send>> {
        let response = self.send(&request)?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            return Err(BridgeError::Status { status, body });
        }

        Ok(Box::new(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::http::{FilePart, HttpMethod};

    #[test]
    fn test_blocking_client_creation() {
        let config = ConnectionConfig::default().with_close_connection_after_use(true);
        assert!(ReqwestBlockingHttpClient::from_config(&config).is_ok());
    }

    #[test]
    fn test_blocking_invalid_url() {
        let client = ReqwestBlockingHttpClient::new().unwrap();
        let err = client
            .execute(HttpRequest::new(HttpMethod::Get, "::nope"))
            .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidUrl(_)));
    }

    #[test]
    fn test_blocking_form_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let body = MultipartBody {
            fields: vec![],
            files: vec![FilePart {
                field_name: "file".to_string(),
                file_name: "x.bin".to_string(),
                mime_type: "application/octet-stream".to_string(),
                path: dir.path().join("x.bin"),
            }],
        };
        assert!(matches!(build_form(&body), Err(BridgeError::Io(_))));
    }
}
