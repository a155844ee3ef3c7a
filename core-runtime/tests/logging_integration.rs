//! Integration tests for logging system

use bridge_traits::time::LogLevel;
use core_runtime::logging::{
    init_logging, redact_headers, redact_if_sensitive, strip_path, LogFormat, LoggingConfig,
};
use core_runtime::SimbaSettings;
use std::collections::HashMap;

#[test]
fn test_logging_config_from_settings() {
    let settings = SimbaSettings::builder()
        .api_base_url("https://api.example.com")
        .auth_base_url("https://auth.example.com")
        .log_level(LogLevel::Debug)
        .build()
        .unwrap();

    let config = settings.logging_config().with_format(LogFormat::Json);

    assert_eq!(config.format, LogFormat::Json);
    assert_eq!(config.level, LogLevel::Debug);
    assert!(config.enable_spans);
}

#[test]
fn test_logging_initializes_once() {
    let config = LoggingConfig::default().with_format(LogFormat::Compact);
    assert!(init_logging(config.clone()).is_ok());
    assert!(init_logging(config).is_err());
}

#[test]
fn test_invalid_filter_is_rejected() {
    let config = LoggingConfig::default().with_filter("core_auth=loudest");
    assert!(init_logging(config).is_err());
}

#[test]
fn test_credential_redaction() {
    assert_eq!(redact_if_sensitive("access_token", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("client_secret", "abc"), "[REDACTED]");
    assert_eq!(redact_if_sensitive("org", "simbachain"), "simbachain");

    let mut headers = HashMap::new();
    headers.insert("api-key".to_string(), "k-123".to_string());
    headers.insert("txn-value".to_string(), "10".to_string());
    let redacted = redact_headers(&headers);
    assert_eq!(redacted["api-key"], "[REDACTED]");
    assert_eq!(redacted["txn-value"], "10");
}

#[test]
fn test_path_stripping() {
    assert_eq!(strip_path("/tmp/bundles/abc/manifest.json"), "manifest.json");
    assert_eq!(strip_path("D:\\data\\file.txt"), "file.txt");
    assert_eq!(strip_path(""), "");
}
