//! Error types for rdb-memaudit
//!
//! The aggregation engine itself never fails. Errors live at the edges:
//! - Record source errors (unreadable or malformed input)
//! - Sink errors (Redis connection and write failures)
//! - Configuration and CLI errors
//! - Job submission validation errors
//!
//! Library code uses thiserror; the binary wraps everything in anyhow.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for rdb-memaudit
#[derive(Error, Debug)]
pub enum AuditError {
    /// Persistence sink errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Record source errors
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Submission validation errors
    #[error("Submission rejected: {0}")]
    Submit(#[from] SubmitError),

    /// I/O errors (file operations, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking job thread panicked or was cancelled
    #[error("Job '{id}' aborted: {reason}")]
    JobAborted { id: String, reason: String },
}

/// Persistence sink errors
#[derive(Error, Debug)]
pub enum SinkError {
    /// Redis connection failed
    #[error("Failed to connect to Redis at '{url}': {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// Redis command failed
    #[error("Redis error: {0}")]
    Redis(String),

    /// Failed to serialize a dataset
    #[error("Failed to serialize dataset '{dataset}': {reason}")]
    Serialization { dataset: String, reason: String },
}

impl From<redis::RedisError> for SinkError {
    fn from(err: redis::RedisError) -> Self {
        SinkError::Redis(err.to_string())
    }
}

/// Record source errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Failed to open the record file
    #[error("Failed to open records '{path}': {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    /// A line could not be decoded into a record
    #[error("Malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    /// Read failed mid-file
    #[error("Failed to read records at line {line}: {reason}")]
    ReadFailed { line: u64, reason: String },

    /// The consumer dropped its end of the stream
    #[error("Record stream consumer is gone")]
    ConsumerGone,
}

/// Configuration and CLI errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No separator characters configured
    #[error("Separator set must not be empty")]
    EmptySeparators,

    /// Tier thresholds are empty or not strictly increasing
    #[error("Invalid tier thresholds '{tiers}': {reason}")]
    InvalidTiers { tiers: String, reason: String },

    /// Channel capacity out of range
    #[error("Invalid channel size {size}: must be at least {min}")]
    InvalidChannelSize { size: usize, min: usize },

    /// Instance identifier is unusable as a key namespace
    #[error("Invalid instance identifier '{instance}': {reason}")]
    InvalidInstance { instance: String, reason: String },

    /// Input path problem
    #[error("Invalid input path '{path}': {reason}")]
    InvalidInputPath { path: PathBuf, reason: String },

    /// Bind address could not be parsed
    #[error("Invalid bind address '{addr}': {reason}")]
    InvalidBindAddress { addr: String, reason: String },
}

/// Job submission validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// Path is relative or does not exist
    #[error("File does not exist or is not an absolute path: '{path}'")]
    InvalidPath { path: String },

    /// Port is not 4-5 digits
    #[error("Invalid port '{port}': expected 4-5 digits")]
    InvalidPort { port: String },

    /// Job queue is gone
    #[error("Job queue is not accepting submissions")]
    QueueUnavailable,
}

impl SubmitError {
    /// Numeric code reported to submitters
    pub fn code(&self) -> u32 {
        match self {
            SubmitError::InvalidPath { .. } => 1,
            SubmitError::InvalidPort { .. } => 2,
            SubmitError::QueueUnavailable => 3,
        }
    }
}

/// Result type alias for AuditError
pub type Result<T> = std::result::Result<T, AuditError>;

/// Result type alias for SinkError
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Result type alias for SourceError
pub type SourceResult<T> = std::result::Result<T, SourceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_error_codes() {
        let path = SubmitError::InvalidPath {
            path: "relative/dump.json".into(),
        };
        assert_eq!(path.code(), 1);

        let port = SubmitError::InvalidPort { port: "80".into() };
        assert_eq!(port.code(), 2);
    }

    #[test]
    fn test_error_conversion() {
        let sink_err = SinkError::Redis("WRONGTYPE".into());
        let audit_err: AuditError = sink_err.into();
        assert!(matches!(audit_err, AuditError::Sink(_)));

        let config_err = ConfigError::EmptySeparators;
        let audit_err: AuditError = config_err.into();
        assert!(matches!(audit_err, AuditError::Config(_)));
    }
}
