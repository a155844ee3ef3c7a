use bridge_traits::error::BridgeError;
use std::time::Duration;
use thiserror::Error;

use crate::params::ParamError;

const INVALID_URL_HINT: &str =
    "Please ensure that SIMBA_API_BASE_URL is configured and the server is reachable";
const REQUEST_HINT: &str =
    "Please check the inputs or query params and that the client is configured correctly";
const UNKNOWN_HINT: &str =
    "You found a bug in libsimba. Please report it at https://github.com/SIMBAChain/libsimba/issues";

#[derive(Error, Debug)]
pub enum SimbaError {
    /// Malformed URL, unreachable server, protocol failure or a successful
    /// response that is not JSON.
    #[error("{reason}. {}", INVALID_URL_HINT)]
    InvalidUrl { reason: String },

    /// Timeout, network failure or non-2xx response.
    #[error("Request failed{}: {body}. {}", describe_status(.status), REQUEST_HINT)]
    Request { status: Option<u16>, body: String },

    #[error("{0}. {}", UNKNOWN_HINT)]
    Unknown(String),

    #[error("Authentication error: {0}")]
    Auth(#[from] core_auth::AuthError),

    #[error("Invalid method parameters: {0}")]
    Validation(#[from] ParamError),

    #[error("Incorrect number of args ({actual}) supplied to {template}, expected {expected}")]
    Path {
        template: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Waited more than {waited:?} for {resource}")]
    PollTimeout { resource: String, waited: Duration },

    #[error("{resource} reached state FAILED: {response}")]
    PollFailed {
        resource: String,
        response: serde_json::Value,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capability missing: {capability} - {message}")]
    CapabilityMissing { capability: String, message: String },

    #[error(transparent)]
    Runtime(#[from] core_runtime::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimbaError {
    /// HTTP status of a failed request, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            SimbaError::Request { status, .. } => *status,
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

impl From<BridgeError> for SimbaError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::InvalidUrl(reason)
            | BridgeError::Connect(reason)
            | BridgeError::Protocol(reason) => SimbaError::InvalidUrl { reason },
            BridgeError::Timeout(reason) | BridgeError::OperationFailed(reason) => {
                SimbaError::Request {
                    status: None,
                    body: reason,
                }
            }
            BridgeError::Status { status, body } => SimbaError::Request {
                status: Some(status),
                body,
            },
            BridgeError::InvalidPolicy(reason) => SimbaError::Config(reason),
            BridgeError::NotAvailable(capability) => SimbaError::CapabilityMissing {
                capability,
                message: "The configured transport does not support this operation".to_string(),
            },
            BridgeError::Io(e) => SimbaError::Io(e),
        }
    }
}

fn describe_status(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" with status {}", s))
        .unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, SimbaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_errors_map_to_taxonomy() {
        let err: SimbaError = BridgeError::Connect("refused".to_string()).into();
        assert!(matches!(err, SimbaError::InvalidUrl { .. }));

        let err: SimbaError = BridgeError::Timeout("5s".to_string()).into();
        assert!(matches!(err, SimbaError::Request { status: None, .. }));

        let err: SimbaError = BridgeError::Status {
            status: 404,
            body: "missing".to_string(),
        }
        .into();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_messages_carry_hints() {
        let err = SimbaError::Request {
            status: Some(400),
            body: "{\"detail\":\"bad\"}".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("with status 400"));
        assert!(message.contains("detail"));

        let err = SimbaError::InvalidUrl {
            reason: "relative URL without a base".to_string(),
        };
        assert!(err.to_string().contains("SIMBA_API_BASE_URL"));

        assert!(SimbaError::Unknown("boom".to_string())
            .to_string()
            .contains("report"));
    }
}
