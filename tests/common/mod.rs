//! Shared fakes for engine tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;

use resumable_upload::{
    LedgerError, MemoryLedger, MultipartStore, PartRequest, ProgressLedger, ProgressListener,
    StorageError, TransferProgress, UploadProgress, UploadedPart,
};

pub const MIB: u64 = 1024 * 1024;
pub const BUCKET: &str = "media";

/// Write a file of `len` deterministic bytes into `dir`
pub fn write_file(dir: &Path, name: &str, len: u64) -> PathBuf {
    let path = dir.join(name);
    let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    std::fs::write(&path, data).unwrap();
    path
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Initiate { key: String },
    UploadPart { part_number: u32, offset: u64, length: u64 },
    Complete { session_id: String, parts: Vec<UploadedPart> },
    Abort { session_id: String },
}

#[derive(Default)]
struct StoreState {
    next_session: u32,
    sessions: HashSet<String>,
    calls: Vec<Call>,
    fail_part: Option<u32>,
    fail_complete: u32,
    /// Completed objects, keyed by session id
    objects: HashMap<String, Vec<UploadedPart>>,
}

/// Object store double that records every call
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block inside `upload_part` until released.
    ///
    /// `entered` is notified when a part upload starts; the upload
    /// proceeds once `release` is notified.
    pub fn gated(entered: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            state: Mutex::default(),
            gate: Some((entered, release)),
        }
    }

    /// Fail the next upload of `part_number` (one shot)
    pub fn fail_part(&self, part_number: u32) {
        self.state.lock().fail_part = Some(part_number);
    }

    /// Fail the next `times` completion calls
    pub fn fail_complete(&self, times: u32) {
        self.state.lock().fail_complete = times;
    }

    /// Forget every session, as if they expired on the store side
    pub fn expire_sessions(&self) {
        self.state.lock().sessions.clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<Call> {
        std::mem::take(&mut self.state.lock().calls)
    }

    pub fn uploaded_parts(&self) -> Vec<(u32, u64, u64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::UploadPart { part_number, offset, length } => Some((part_number, offset, length)),
                _ => None,
            })
            .collect()
    }

    pub fn initiate_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Initiate { .. }))
            .count()
    }

    pub fn objects(&self) -> HashMap<String, Vec<UploadedPart>> {
        self.state.lock().objects.clone()
    }
}

fn read_range(path: &Path, offset: u64, length: u64) -> std::io::Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = vec![0u8; length as usize];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

#[async_trait]
impl MultipartStore for FakeStore {
    async fn initiate(&self, _bucket: &str, key: &str) -> Result<String, StorageError> {
        let mut state = self.state.lock();
        state.next_session += 1;
        let session_id = format!("session-{}", state.next_session);
        state.sessions.insert(session_id.clone());
        state.calls.push(Call::Initiate { key: key.to_string() });
        Ok(session_id)
    }

    async fn upload_part(
        &self,
        request: &PartRequest<'_>,
        listener: &dyn ProgressListener,
    ) -> Result<String, StorageError> {
        if let Some((entered, release)) = &self.gate {
            entered.notify_one();
            release.notified().await;
        }

        let bytes = read_range(request.file_path, request.offset, request.length).map_err(|source| {
            StorageError::ReadPart {
                part_number: request.part_number,
                path: request.file_path.display().to_string(),
                source,
            }
        })?;

        {
            let mut state = self.state.lock();
            state.calls.push(Call::UploadPart {
                part_number: request.part_number,
                offset: request.offset,
                length: request.length,
            });

            if state.fail_part == Some(request.part_number) {
                state.fail_part = None;
                return Err(StorageError::UploadPart {
                    key: request.key.to_string(),
                    part_number: request.part_number,
                    message: "connection reset by peer".to_string(),
                });
            }

            if !state.sessions.contains(request.session_id) {
                return Err(StorageError::UploadPart {
                    key: request.key.to_string(),
                    part_number: request.part_number,
                    message: "NoSuchUpload".to_string(),
                });
            }
        }

        listener.on_progress(TransferProgress {
            part_number: request.part_number,
            transferred_bytes: request.length,
            total_bytes: request.length,
        });

        let checksum: u64 = bytes.iter().map(|b| u64::from(*b)).sum();
        Ok(format!("\"{}-{:x}\"", request.part_number, checksum))
    }

    async fn complete(
        &self,
        _bucket: &str,
        key: &str,
        session_id: &str,
        parts: &[UploadedPart],
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        state.calls.push(Call::Complete {
            session_id: session_id.to_string(),
            parts: parts.to_vec(),
        });

        if state.fail_complete > 0 {
            state.fail_complete -= 1;
            return Err(StorageError::Complete {
                key: key.to_string(),
                message: "service unavailable".to_string(),
            });
        }

        // Completing the same session twice yields the same object
        state
            .objects
            .entry(session_id.to_string())
            .or_insert_with(|| parts.to_vec());
        Ok(())
    }

    async fn abort(&self, _bucket: &str, _key: &str, session_id: &str) -> Result<(), StorageError> {
        let mut state = self.state.lock();
        state.sessions.remove(session_id);
        state.calls.push(Call::Abort {
            session_id: session_id.to_string(),
        });
        Ok(())
    }
}

/// Ledger wrapper that snapshots every successful write
#[derive(Default)]
pub struct RecordingLedger {
    inner: MemoryLedger,
    snapshots: Mutex<Vec<UploadProgress>>,
    fail_put_after: Mutex<Option<usize>>,
    fail_next_delete: Mutex<bool>,
}

impl RecordingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Let `n` more writes succeed, then fail every write after that
    pub fn fail_puts_after(&self, n: usize) {
        *self.fail_put_after.lock() = Some(self.snapshots.lock().len() + n);
    }

    /// Fail the next delete (one shot)
    pub fn fail_next_delete(&self) {
        *self.fail_next_delete.lock() = true;
    }

    pub fn heal(&self) {
        *self.fail_put_after.lock() = None;
    }

    pub fn snapshots(&self) -> Vec<UploadProgress> {
        self.snapshots.lock().clone()
    }

    pub async fn record_count(&self) -> usize {
        self.inner.len().await
    }
}

#[async_trait]
impl ProgressLedger for RecordingLedger {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<UploadProgress>, LedgerError> {
        self.inner.get(bucket, key).await
    }

    async fn put(&self, progress: &mut UploadProgress) -> Result<(), LedgerError> {
        let limit = *self.fail_put_after.lock();
        if let Some(limit) = limit {
            if self.snapshots.lock().len() >= limit {
                return Err(LedgerError::Database(sqlx::Error::PoolClosed));
            }
        }

        self.inner.put(progress).await?;
        self.snapshots.lock().push(progress.clone());
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<bool, LedgerError> {
        if std::mem::take(&mut *self.fail_next_delete.lock()) {
            return Err(LedgerError::Database(sqlx::Error::PoolClosed));
        }
        self.inner.delete(bucket, key).await
    }
}

/// Listener that keeps every event
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<TransferProgress>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<TransferProgress> {
        self.events.lock().clone()
    }
}

impl ProgressListener for RecordingListener {
    fn on_progress(&self, progress: TransferProgress) {
        self.events.lock().push(progress);
    }
}
