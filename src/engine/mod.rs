//! Resumable multipart upload engine
//!
//! Drives one upload at a time per key:
//! 1. Look up the ledger record for (bucket, key); resume it verbatim or
//!    initiate a new session
//! 2. Upload the file part by part, persisting the full record after
//!    every accepted part
//! 3. Complete the session, then delete the ledger record
//!
//! A failure anywhere before completion leaves the last persisted record
//! in place, so calling `upload_file` again picks up at the next part.

mod guard;
mod parts;
mod progress;

pub use guard::{KeyGuard, KeyLease};
pub use parts::{part_count, remaining_parts, PartRange, DEFAULT_PART_SIZE};
pub use progress::{UploadProgress, UploadedPart};

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, UploadError};
use crate::ledger::ProgressLedger;
use crate::store::{LogProgress, MultipartStore, PartRequest, ProgressListener};

/// Outcome of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub bucket_name: String,
    pub key: String,
    pub upload_session_id: String,
    pub part_count: usize,
    pub total_bytes: u64,
    /// Parts sent during this call (excludes parts resumed from the ledger)
    pub parts_uploaded: usize,
    pub resumed: bool,
}

/// Orchestrates the ledger and the object store for one bucket
pub struct UploadEngine {
    bucket: String,
    ledger: Arc<dyn ProgressLedger>,
    store: Arc<dyn MultipartStore>,
    listener: Arc<dyn ProgressListener>,
    part_size: u64,
    guard: KeyGuard,
}

impl UploadEngine {
    pub fn new(
        bucket: impl Into<String>,
        ledger: Arc<dyn ProgressLedger>,
        store: Arc<dyn MultipartStore>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            ledger,
            store,
            listener: Arc::new(LogProgress),
            part_size: DEFAULT_PART_SIZE,
            guard: KeyGuard::new(),
        }
    }

    /// Override the part size for every upload this engine runs.
    ///
    /// Records written with one part size must be resumed with the same one.
    pub fn with_part_size(mut self, part_size: u64) -> Self {
        self.part_size = part_size.max(1);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.listener = listener;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn part_size(&self) -> u64 {
        self.part_size
    }

    /// Upload (or resume uploading) a local file under its base name
    pub async fn upload_file(&self, path: impl AsRef<Path>) -> Result<UploadReceipt> {
        let path = path.as_ref();
        let key = object_key(path)?;
        let _lease = self.guard.acquire(&key)?;

        let file_len = tokio::fs::metadata(path).await?.len();

        let (mut progress, resumed) = match self.ledger.get(&self.bucket, &key).await? {
            Some(progress) => {
                progress
                    .validate()
                    .map_err(|reason| UploadError::CorruptProgress {
                        key: key.clone(),
                        reason,
                    })?;

                if progress.next_file_position > file_len {
                    tracing::warn!(
                        key = %key,
                        recorded_position = progress.next_file_position,
                        file_len,
                        "Recorded position is past the end of the file; finalizing recorded parts as-is"
                    );
                }

                tracing::info!(
                    key = %key,
                    session_id = %progress.upload_session_id,
                    next_part = progress.next_part_number,
                    position = progress.next_file_position,
                    remaining_parts = remaining_parts(progress.next_file_position, self.part_size, file_len),
                    "Resuming multipart upload"
                );
                (progress, true)
            }
            None => {
                let session_id = self.store.initiate(&self.bucket, &key).await?;
                tracing::info!(
                    key = %key,
                    session_id = %session_id,
                    file_len,
                    parts = part_count(file_len, self.part_size),
                    "Initiated multipart upload"
                );
                (UploadProgress::new(&self.bucket, &key, session_id), false)
            }
        };

        let mut parts_uploaded = 0;
        while progress.next_file_position < file_len {
            let part_number = progress.begin_part();
            let range = PartRange::new(progress.next_file_position, self.part_size, file_len);

            let request = PartRequest {
                bucket: &self.bucket,
                key: &key,
                session_id: &progress.upload_session_id,
                part_number,
                file_path: path,
                offset: range.offset,
                length: range.length,
            };

            let part_tag = match self.store.upload_part(&request, self.listener.as_ref()).await {
                Ok(tag) => tag,
                Err(e) => {
                    tracing::warn!(
                        key = %key,
                        part = part_number,
                        error = %e,
                        "Part upload failed; ledger keeps the last persisted part"
                    );
                    return Err(e.into());
                }
            };

            progress.complete_part(part_number, part_tag, range.length);
            self.ledger.put(&mut progress).await?;
            parts_uploaded += 1;

            tracing::debug!(
                key = %key,
                part = part_number,
                position = range.end(),
                file_len,
                "Part persisted"
            );
        }

        self.store
            .complete(&self.bucket, &key, &progress.upload_session_id, &progress.uploaded_parts)
            .await
            .map_err(|e| {
                tracing::warn!(
                    key = %key,
                    parts = progress.part_count(),
                    error = %e,
                    "Completion failed; all parts are recorded and completion can be retried"
                );
                e
            })?;

        self.ledger.delete(&self.bucket, &key).await?;

        tracing::info!(
            key = %key,
            parts = progress.part_count(),
            bytes = file_len,
            resumed,
            "Upload completed"
        );

        Ok(UploadReceipt {
            bucket_name: self.bucket.clone(),
            key,
            upload_session_id: progress.upload_session_id,
            part_count: progress.uploaded_parts.len(),
            total_bytes: file_len,
            parts_uploaded,
            resumed,
        })
    }

    /// Persisted progress for `key`, if an upload is in flight
    pub async fn status(&self, key: &str) -> Result<Option<UploadProgress>> {
        Ok(self.ledger.get(&self.bucket, key).await?)
    }

    /// Abandon the in-flight upload for `key`.
    ///
    /// Aborts the store session (discarding its parts) and clears the
    /// ledger record. Returns the record that was removed.
    pub async fn abort(&self, key: &str) -> Result<UploadProgress> {
        let _lease = self.guard.acquire(key)?;

        let progress = self
            .ledger
            .get(&self.bucket, key)
            .await?
            .ok_or_else(|| UploadError::NoUploadInFlight {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })?;

        self.store
            .abort(&self.bucket, key, &progress.upload_session_id)
            .await?;
        self.ledger.delete(&self.bucket, key).await?;

        tracing::info!(
            key = %key,
            session_id = %progress.upload_session_id,
            parts = progress.part_count(),
            "Multipart upload aborted"
        );

        Ok(progress)
    }
}

/// Object key for a local file: its base name
pub fn object_key(path: &Path) -> Result<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .ok_or_else(|| UploadError::InvalidPath(path.display().to_string()))
}
