//! Ledger schema initialization

use sqlx::SqlitePool;

use crate::error::LedgerError;

/// Initialize the ledger schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<(), LedgerError> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- One row per in-flight multipart upload
CREATE TABLE IF NOT EXISTS upload_progress (
    bucket_name TEXT NOT NULL,
    key_name TEXT NOT NULL,
    upload_session_id TEXT NOT NULL,
    next_part_number INTEGER NOT NULL,
    next_file_position INTEGER NOT NULL,
    uploaded_parts TEXT NOT NULL DEFAULT '[]',
    version INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL,
    PRIMARY KEY (bucket_name, key_name)
);

CREATE INDEX IF NOT EXISTS idx_upload_progress_updated ON upload_progress(updated_at);
"#;
