use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("No provider registered for {0}")]
    ProviderNotRegistered(String),

    #[error("Unknown auth flow: {0}")]
    UnknownAuthFlow(String),

    #[error("A client secret is required for the {flow} auth flow")]
    MissingSecret { flow: String },

    #[error("Provider {provider} authentication failed: {reason}")]
    AuthenticationFailed { provider: String, reason: String },

    #[error("Invalid token response: {0}")]
    InvalidTokenResponse(String),

    #[error("Token cache error at {path}: {source}")]
    CacheIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Auth configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Transport(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, AuthError>;
