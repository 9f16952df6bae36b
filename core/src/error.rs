//! Error types for the gateway core.
//!
//! # Design
//! Each concern gets its own enum so callers can tell a local storage
//! failure apart from a vendor-side one. `VendorError::Transport` is reserved
//! for exchanges that never completed; an HTTP error status from the vendor
//! is a `VendorResponse`, not an error.

use thiserror::Error;

/// Errors raised while signing a request.
#[derive(Debug, Error)]
pub enum SignError {
    /// The request body could not be serialized to JSON.
    #[error("failed to encode request body: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("invalid signing key: {0}")]
    InvalidKey(#[from] hmac::digest::InvalidLength),
}

/// Errors raised by a vendor call.
#[derive(Debug, Error)]
pub enum VendorError {
    #[error(transparent)]
    Sign(#[from] SignError),

    /// The request could not be formed, such as a path without a leading `/`
    /// or a URL that does not parse. Nothing was sent.
    #[error("invalid vendor request: {0}")]
    InvalidRequest(String),

    /// The request never completed: connection refused, DNS or TLS failure,
    /// timeout, or the body was cut off mid-read.
    #[error("vendor request failed: {0}")]
    Transport(String),

    /// The HTTP transport could not be constructed.
    #[error("failed to build vendor http client: {0}")]
    ClientBuild(String),
}

impl VendorError {
    pub(crate) fn transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return VendorError::InvalidRequest(err.to_string());
        }
        let kind = if err.is_timeout() {
            "timeout"
        } else if err.is_connect() {
            "connect"
        } else {
            "io"
        };
        VendorError::Transport(format!("{kind}: {err}"))
    }
}

/// Errors raised by the local store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage engine rejected a second row for the same owner.
    #[error("owner `{0}` already exists")]
    UniqueViolation(String),

    #[error("resident `{0}` not found")]
    NotFound(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("storage connection lock poisoned")]
    Poisoned,
}

/// Errors raised while fetching a resident's dynamic QR code.
#[derive(Debug, Error)]
pub enum QrCodeError {
    #[error("resident `{0}` not found")]
    NotFound(String),

    #[error("resident `{0}` is not synced with the vendor platform")]
    NotSynced(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Vendor(#[from] VendorError),
}

/// Errors raised while resolving configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: `{value}`")]
    Invalid { name: &'static str, value: String },

    #[error("failed to read env file {path}: {reason}")]
    EnvFile { path: String, reason: String },
}
