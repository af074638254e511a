//! Error types for endpoint registration, config loading and lookups.

use thiserror::Error;

/// Rejected endpoint registration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The endpoint URI was empty.
    #[error("endpoint uri must not be empty")]
    EmptyUri,
    /// The endpoint domain was empty.
    #[error("endpoint domain must not be empty (uri={uri})")]
    EmptyDomain { uri: String },
    /// Another endpoint already uses this prefix.
    #[error("endpoint prefix `{prefix}` is already registered")]
    DuplicatePrefix { prefix: String },
}

/// Errors returned while configuring, loading or reading config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading a config file failed.
    #[error("failed to read config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// Parsing a config file failed.
    #[error("failed to parse config: {0}")]
    ParseFailed(#[from] json5::Error),
    /// Converting JSON values failed.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A specific field failed validation.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// An endpoint registration was rejected.
    #[error("invalid endpoint: {0}")]
    Validation(#[from] ValidationError),
    /// No endpoint with a usable URI is registered.
    #[error("config has no usable endpoint")]
    Unusable,
    /// Listener port or interface cannot form a socket address.
    #[error("invalid listen address {value}: {message}")]
    InvalidListenAddr { value: String, message: String },
}
