//! Progress ledger
//!
//! Durable storage for `UploadProgress` records, one per (bucket, key).
//! Writes carry the record's version and are rejected when the stored
//! version has moved on, so two writers racing on one key surface as a
//! `LedgerError::VersionConflict` instead of silently corrupting resume
//! state.

mod memory;
mod schema;
mod sqlite;

pub use memory::MemoryLedger;
pub use schema::initialize_schema;
pub use sqlite::{create_pool, SqliteLedger};

use async_trait::async_trait;

use crate::engine::UploadProgress;
use crate::error::LedgerError;

#[async_trait]
pub trait ProgressLedger: Send + Sync {
    /// Load the record for (bucket, key), if an upload is in flight
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<UploadProgress>, LedgerError>;

    /// Overwrite the whole record.
    ///
    /// Succeeds only if the stored version equals `progress.version`
    /// (or no record exists and `progress.version` is 0). On success the
    /// version is bumped in place.
    async fn put(&self, progress: &mut UploadProgress) -> Result<(), LedgerError>;

    /// Remove the record, returning whether one existed
    async fn delete(&self, bucket: &str, key: &str) -> Result<bool, LedgerError>;
}
