//! In-process single-writer guard per object key

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::UploadError;

/// Tracks which keys have an engine operation running
#[derive(Clone, Default)]
pub struct KeyGuard {
    active: Arc<Mutex<HashSet<String>>>,
}

/// Held for the duration of one operation; releases the key on drop
pub struct KeyLease {
    active: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl KeyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `key`, failing if another operation already holds it
    pub fn acquire(&self, key: &str) -> Result<KeyLease, UploadError> {
        if !self.active.lock().insert(key.to_string()) {
            return Err(UploadError::KeyBusy(key.to_string()));
        }

        Ok(KeyLease {
            active: Arc::clone(&self.active),
            key: key.to_string(),
        })
    }
}

impl Drop for KeyLease {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}
