//! Default transport factory

use bridge_traits::{
    connection::ConnectionConfig,
    error::Result,
    http::{BlockingHttpClient, HttpClient, HttpClientFactory},
};

use crate::blocking::ReqwestBlockingHttpClient;
use crate::http::ReqwestHttpClient;

/// Builds a new reqwest client for every call.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReqwestClientFactory;

impl HttpClientFactory for ReqwestClientFactory {
    fn async_client(&self, config: &ConnectionConfig) -> Result<Box<dyn HttpClient>> {
        Ok(Box::new(ReqwestHttpClient::from_config(config)?))
    }

    fn blocking_client(&self, config: &ConnectionConfig) -> Result<Box<dyn BlockingHttpClient>> {
        Ok(Box::new(ReqwestBlockingHttpClient::from_config(config)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_factory_builds_async_client() {
        let factory = ReqwestClientFactory;
        assert!(factory.async_client(&ConnectionConfig::default()).is_ok());
    }

    #[test]
    fn test_factory_builds_blocking_client() {
        let factory = ReqwestClientFactory;
        assert!(factory.blocking_client(&ConnectionConfig::default()).is_ok());
    }
}
