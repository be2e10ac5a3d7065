//! Object store multipart capability
//!
//! The engine only needs four operations from the store: initiate a
//! session, upload one numbered part from a byte range of a local file,
//! complete the session from the ordered part list, and abort it.

mod s3;

pub use s3::S3MultipartStore;

use async_trait::async_trait;
use std::path::Path;

use crate::engine::UploadedPart;
use crate::error::StorageError;

/// One part upload: a byte range of a local file tagged with its part number
#[derive(Debug, Clone, Copy)]
pub struct PartRequest<'a> {
    pub bucket: &'a str,
    pub key: &'a str,
    pub session_id: &'a str,
    pub part_number: u32,
    pub file_path: &'a Path,
    pub offset: u64,
    pub length: u64,
}

/// Transfer progress for the part currently in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub part_number: u32,
    pub transferred_bytes: u64,
    pub total_bytes: u64,
}

/// Receives advisory progress events. Never affects control flow.
pub trait ProgressListener: Send + Sync {
    fn on_progress(&self, progress: TransferProgress);
}

/// Default listener: writes progress to the debug log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressListener for LogProgress {
    fn on_progress(&self, progress: TransferProgress) {
        tracing::debug!(
            part = progress.part_number,
            transferred = progress.transferred_bytes,
            total = progress.total_bytes,
            "Part transfer progress"
        );
    }
}

#[async_trait]
pub trait MultipartStore: Send + Sync {
    /// Start a multipart upload and return its session id
    async fn initiate(&self, bucket: &str, key: &str) -> Result<String, StorageError>;

    /// Upload one part and return the tag the store assigned to it
    async fn upload_part(
        &self,
        request: &PartRequest<'_>,
        listener: &dyn ProgressListener,
    ) -> Result<String, StorageError>;

    /// Assemble the uploaded parts into the final object
    async fn complete(
        &self,
        bucket: &str,
        key: &str,
        session_id: &str,
        parts: &[UploadedPart],
    ) -> Result<(), StorageError>;

    /// Discard the session and every part uploaded under it
    async fn abort(&self, bucket: &str, key: &str, session_id: &str) -> Result<(), StorageError>;
}
