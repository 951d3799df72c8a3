//! Error types for uh-ring

use std::path::PathBuf;

use thiserror::Error;

/// A single envelope could not be decoded into its canonical shape.
///
/// Callers skip the envelope and continue; payload shapes vary between API
/// revisions, so this is expected rather than exceptional.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed {wire_type} payload: {source}")]
    Malformed {
        wire_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors fetching metrics from the upstream API
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("API error: {0}")]
    Api(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors sending samples to the remote write endpoint
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Encoding write request: {0}")]
    Encoding(String),

    #[error("Sending write request: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Remote write failed with status {status}: {body}")]
    RemoteRejected { status: u16, body: String },
}

/// Registry construction errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Duplicate registry entry for wire type: {0}")]
    Duplicate(String),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("API token required. Use --api-token or set ULTRAHUMAN_API_TOKEN")]
    MissingToken,

    #[error("--remote-write-url is required for serve mode")]
    MissingRemoteWrite,

    #[error("Invalid interval: {0} (must be at least 1 second)")]
    InvalidInterval(u64),
}
