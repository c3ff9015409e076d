//! Error types for the registry bootstrap
//!
//! Failures come in two tiers. [`BootstrapError`] is fatal: the binaries log
//! it and exit non-zero. [`SubmissionError`] is retryable: the coordinator
//! logs it and restarts the current attempt.

use std::time::Duration;

use thiserror::Error;

/// Result type for fatal bootstrap operations
pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Fatal errors: configuration, bundled data, timeout, mirroring
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("missing {0} environment variable")]
    MissingEnv(String),

    #[error("invalid registry endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("bundled schema level {level} not found")]
    MissingLevel { level: u32 },

    #[error("schema bundle holds no schemas")]
    EmptyBundle,

    #[error("bundled schema {level}/{name} not found")]
    MissingDocument { level: u32, name: String },

    #[error("bundled schema {level}/{name} is not valid UTF-8")]
    InvalidEncoding { level: u32, name: String },

    #[error("timeout trying to setup registry after {0:?}")]
    Timeout(Duration),

    #[error("invalid schema document for {subject}: {reason}")]
    InvalidDocument { subject: String, reason: String },

    #[error("failed to fetch {subject} version {version}: status {status}")]
    FetchStatus {
        subject: String,
        version: u32,
        status: u16,
    },

    #[error("schema reference cycle: {}", .0.join(" -> "))]
    ReferenceCycle(Vec<String>),

    #[error("reference depth limit {limit} reached at {subject}")]
    ReferenceDepthExceeded { subject: String, limit: usize },

    #[error("invalid version pin {key}={value}")]
    InvalidPin { key: String, value: String },

    #[error("Env file error: {0}")]
    EnvFile(#[from] dotenvy::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Retryable registry failures, never propagated past the coordinator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("registry responded with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to read response (status {status}): {reason}")]
    UnreadableBody { status: u16, reason: String },
}
