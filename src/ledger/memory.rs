//! In-memory ledger for tests and dry runs

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::engine::UploadProgress;
use crate::error::LedgerError;

use super::ProgressLedger;

/// Ledger held in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryLedger {
    records: RwLock<HashMap<(String, String), UploadProgress>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn identity(bucket: &str, key: &str) -> (String, String) {
    (bucket.to_string(), key.to_string())
}

#[async_trait]
impl ProgressLedger for MemoryLedger {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<UploadProgress>, LedgerError> {
        let records = self.records.read().await;
        Ok(records.get(&identity(bucket, key)).cloned())
    }

    async fn put(&self, progress: &mut UploadProgress) -> Result<(), LedgerError> {
        let mut records = self.records.write().await;
        let id = identity(&progress.bucket_name, &progress.key);

        let stored = records.get(&id).map(|r| r.version);
        let expected = progress.version;
        let matches = match stored {
            Some(version) => version == expected,
            None => expected == 0,
        };
        if !matches {
            return Err(LedgerError::VersionConflict {
                bucket: progress.bucket_name.clone(),
                key: progress.key.clone(),
                expected,
                found: stored,
            });
        }

        progress.version = expected + 1;
        records.insert(id, progress.clone());
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<bool, LedgerError> {
        let mut records = self.records.write().await;
        Ok(records.remove(&identity(bucket, key)).is_some())
    }
}
