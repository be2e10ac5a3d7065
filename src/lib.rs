//! Resumable multipart uploads to S3-compatible storage
//!
//! Large local files are split into fixed-size parts and uploaded one part
//! at a time. Progress is written to a durable ledger after every accepted
//! part, so a crash or network failure costs at most one part of re-work.
//!
//! # Modules
//!
//! - `engine`: the upload state machine (new vs. resume, part loop, finalize)
//! - `ledger`: durable progress records (SQLite, in-memory)
//! - `store`: object store multipart capability (S3)
//! - `config`: process configuration from the environment

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod store;

pub use config::Config;
pub use engine::{UploadEngine, UploadProgress, UploadReceipt, UploadedPart, DEFAULT_PART_SIZE};
pub use error::{ConfigError, LedgerError, Result, StorageError, UploadError};
pub use ledger::{MemoryLedger, ProgressLedger, SqliteLedger};
pub use store::{MultipartStore, PartRequest, ProgressListener, S3MultipartStore, TransferProgress};
