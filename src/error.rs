use std::path::PathBuf;
use thiserror::Error;

/// Failures while reading or writing the last-known snapshot file
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// No prior state. Not a failure for callers doing change detection.
    #[error("snapshot not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("snapshot {} is corrupt: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize snapshot for {}: {source}", path.display())]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Outbound delivery failures. Never escapes a `send*` call.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected http status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("provider rejected message: code={code} msg={msg}")]
    Provider { code: i64, msg: String },

    #[error("malformed provider response: {0}")]
    Response(String),

    #[error("no chat target available for application mode")]
    NoChatTarget,

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Reasons an inbound handshake is rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChallengeError {
    #[error("body is not valid json")]
    Parse,

    #[error("encrypted body received but no encrypt key is configured")]
    NoEncryptKey,

    #[error("encrypt field is not valid base64")]
    Decode,

    #[error("decryption failed")]
    Decrypt,

    #[error("decrypted body is not valid utf-8")]
    Utf8,

    #[error("verification token mismatch")]
    TokenMismatch,

    #[error("not a url_verification request")]
    NotVerification,

    #[error("challenge field missing or empty")]
    MissingChallenge,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid toml config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config format (expected .yaml, .yml or .toml): {}", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// Failures fetching data from the account management API
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no bearer token configured")]
    MissingToken,

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed (status {0})")]
    Unauthorized(u16),

    #[error("unexpected http status {0}")]
    Status(u16),

    #[error("response is not valid json: {0}")]
    Parse(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("unsupported command: {0} (supported: monitor_accounts, monitor_api_usage, full_monitor)")]
    UnsupportedCommand(String),
}
