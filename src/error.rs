//! Error types for the resumable upload engine

use thiserror::Error;

/// Engine-wide result type
pub type Result<T> = std::result::Result<T, UploadError>;

/// Top-level error returned by every engine operation
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid file path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("S3 error: {0}")]
    Storage(#[from] StorageError),

    #[error("No upload in flight for {bucket}/{key}")]
    NoUploadInFlight { bucket: String, key: String },

    #[error("An upload for key {0} is already running in this process")]
    KeyBusy(String),

    #[error("Progress record for {key} is inconsistent: {reason}")]
    CorruptProgress { key: String, reason: String },
}

/// Missing or malformed process configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Progress ledger failures
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to encode uploaded parts: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Ledger record {bucket}/{key} was modified concurrently (expected version {expected}, found {found:?})")]
    VersionConflict {
        bucket: String,
        key: String,
        expected: u64,
        found: Option<u64>,
    },

    #[error("Ledger record {key} is invalid: {reason}")]
    InvalidRecord { key: String, reason: String },
}

/// Object store failures
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to initiate multipart upload for {key}: {message}")]
    Initiate { key: String, message: String },

    #[error("Failed to upload part {part_number} of {key}: {message}")]
    UploadPart {
        key: String,
        part_number: u32,
        message: String,
    },

    #[error("Failed to read part {part_number} from {path}: {source}")]
    ReadPart {
        part_number: u32,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to complete multipart upload for {key}: {message}")]
    Complete { key: String, message: String },

    #[error("Failed to abort multipart upload for {key}: {message}")]
    Abort { key: String, message: String },

    #[error("S3 response for {key} is missing {field}")]
    MissingField { key: String, field: &'static str },

    #[error("Part number {0} is outside the range accepted by S3")]
    PartNumberOutOfRange(u32),
}

impl UploadError {
    /// Whether calling the engine again with the same file can make progress.
    ///
    /// A busy key or a version conflict clears once the other writer is
    /// done; the next call re-reads the ledger and resumes from there.
    pub fn is_resumable(&self) -> bool {
        match self {
            UploadError::Io(_) | UploadError::KeyBusy(_) => true,
            UploadError::Ledger(e) => matches!(
                e,
                LedgerError::Database(_) | LedgerError::VersionConflict { .. }
            ),
            UploadError::Storage(e) => !matches!(e, StorageError::PartNumberOutOfRange(_)),
            UploadError::Config(_)
            | UploadError::InvalidPath(_)
            | UploadError::NoUploadInFlight { .. }
            | UploadError::CorruptProgress { .. } => false,
        }
    }
}
