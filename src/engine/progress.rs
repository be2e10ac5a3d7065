//! The durable resume record

use serde::{Deserialize, Serialize};

/// A part the object store has accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedPart {
    pub part_number: u32,
    /// Opaque identifier (ETag) the store requires at completion
    pub part_tag: String,
}

/// Progress of one in-flight multipart upload, keyed by (bucket, key).
///
/// A record existing in the ledger means an upload is in flight for that
/// identity; its absence means none is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    pub bucket_name: String,
    pub key: String,
    pub upload_session_id: String,
    pub next_part_number: u32,
    pub next_file_position: u64,
    pub uploaded_parts: Vec<UploadedPart>,
    /// Optimistic-concurrency token, 0 until first persisted
    pub version: u64,
}

impl UploadProgress {
    /// Fresh record for a newly initiated session
    pub fn new(
        bucket_name: impl Into<String>,
        key: impl Into<String>,
        upload_session_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            key: key.into(),
            upload_session_id: upload_session_id.into(),
            next_part_number: 1,
            next_file_position: 0,
            uploaded_parts: Vec::new(),
            version: 0,
        }
    }

    /// Claim the next part number.
    ///
    /// The increment lives only in memory until the part is recorded and
    /// the record persisted.
    pub fn begin_part(&mut self) -> u32 {
        let part_number = self.next_part_number;
        self.next_part_number += 1;
        part_number
    }

    /// Record an accepted part and advance the file position past it
    pub fn complete_part(&mut self, part_number: u32, part_tag: impl Into<String>, bytes: u64) {
        self.uploaded_parts.push(UploadedPart {
            part_number,
            part_tag: part_tag.into(),
        });
        self.next_file_position += bytes;
    }

    pub fn part_count(&self) -> usize {
        self.uploaded_parts.len()
    }

    /// Whether this record has ever been written to a ledger
    pub fn is_persisted(&self) -> bool {
        self.version > 0
    }

    /// Check the structural invariants every persisted record must hold
    pub fn validate(&self) -> Result<(), String> {
        if self.upload_session_id.is_empty() {
            return Err("empty upload session id".to_string());
        }

        let expected_next = self.uploaded_parts.len() as u64 + 1;
        if u64::from(self.next_part_number) != expected_next {
            return Err(format!(
                "next part number {} does not follow {} uploaded parts",
                self.next_part_number,
                self.uploaded_parts.len()
            ));
        }

        for (index, part) in self.uploaded_parts.iter().enumerate() {
            let expected = index as u64 + 1;
            if u64::from(part.part_number) != expected {
                return Err(format!(
                    "part at position {} is numbered {}, expected {}",
                    index, part.part_number, expected
                ));
            }
        }

        if self.uploaded_parts.is_empty() && self.next_file_position != 0 {
            return Err(format!(
                "file position {} with no uploaded parts",
                self.next_file_position
            ));
        }

        Ok(())
    }
}
