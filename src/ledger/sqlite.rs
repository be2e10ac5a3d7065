//! SQLite-backed progress ledger

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;

use crate::engine::{UploadProgress, UploadedPart};
use crate::error::LedgerError;

use super::{initialize_schema, ProgressLedger};

/// Create a new ledger connection pool and make sure the schema exists
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, LedgerError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Full);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    initialize_schema(&pool).await?;

    Ok(pool)
}

/// Row as stored in `upload_progress`
#[derive(Debug, Clone, sqlx::FromRow)]
struct ProgressRow {
    bucket_name: String,
    key_name: String,
    upload_session_id: String,
    next_part_number: i64,
    next_file_position: i64,
    uploaded_parts: String,
    version: i64,
}

impl TryFrom<ProgressRow> for UploadProgress {
    type Error = LedgerError;

    fn try_from(row: ProgressRow) -> Result<Self, Self::Error> {
        let invalid = |reason: String| LedgerError::InvalidRecord {
            key: row.key_name.clone(),
            reason,
        };

        let next_part_number = u32::try_from(row.next_part_number)
            .map_err(|_| invalid(format!("next_part_number {}", row.next_part_number)))?;
        let next_file_position = u64::try_from(row.next_file_position)
            .map_err(|_| invalid(format!("next_file_position {}", row.next_file_position)))?;
        let version = u64::try_from(row.version)
            .map_err(|_| invalid(format!("version {}", row.version)))?;
        let uploaded_parts: Vec<UploadedPart> = serde_json::from_str(&row.uploaded_parts)?;

        Ok(UploadProgress {
            bucket_name: row.bucket_name,
            key: row.key_name,
            upload_session_id: row.upload_session_id,
            next_part_number,
            next_file_position,
            uploaded_parts,
            version,
        })
    }
}

fn to_sql_int(key: &str, field: &str, value: u64) -> Result<i64, LedgerError> {
    i64::try_from(value).map_err(|_| LedgerError::InvalidRecord {
        key: key.to_string(),
        reason: format!("{} {} does not fit in an INTEGER column", field, value),
    })
}

/// Ledger repository over a SQLite pool
#[derive(Clone)]
pub struct SqliteLedger {
    pool: SqlitePool,
}

impl SqliteLedger {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Every in-flight upload for a bucket, oldest update first
    pub async fn list(&self, bucket: &str) -> Result<Vec<UploadProgress>, LedgerError> {
        let rows = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT bucket_name, key_name, upload_session_id, next_part_number,
                   next_file_position, uploaded_parts, version
            FROM upload_progress
            WHERE bucket_name = ?
            ORDER BY updated_at ASC
            "#,
        )
        .bind(bucket)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(UploadProgress::try_from).collect()
    }

    async fn stored_version(&self, bucket: &str, key: &str) -> Result<Option<u64>, LedgerError> {
        let version: Option<(i64,)> = sqlx::query_as(
            "SELECT version FROM upload_progress WHERE bucket_name = ? AND key_name = ?",
        )
        .bind(bucket)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(version.and_then(|(v,)| u64::try_from(v).ok()))
    }
}

#[async_trait]
impl ProgressLedger for SqliteLedger {
    async fn get(&self, bucket: &str, key: &str) -> Result<Option<UploadProgress>, LedgerError> {
        let row = sqlx::query_as::<_, ProgressRow>(
            r#"
            SELECT bucket_name, key_name, upload_session_id, next_part_number,
                   next_file_position, uploaded_parts, version
            FROM upload_progress
            WHERE bucket_name = ? AND key_name = ?
            "#,
        )
        .bind(bucket)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(UploadProgress::try_from).transpose()
    }

    async fn put(&self, progress: &mut UploadProgress) -> Result<(), LedgerError> {
        let key = progress.key.as_str();
        let parts = serde_json::to_string(&progress.uploaded_parts)?;
        let next_part_number = i64::from(progress.next_part_number);
        let next_file_position = to_sql_int(key, "next_file_position", progress.next_file_position)?;
        let expected = to_sql_int(key, "version", progress.version)?;
        let now = Utc::now().to_rfc3339();

        let result = if progress.version == 0 {
            sqlx::query(
                r#"
                INSERT INTO upload_progress (
                    bucket_name, key_name, upload_session_id, next_part_number,
                    next_file_position, uploaded_parts, version, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, 1, ?)
                ON CONFLICT(bucket_name, key_name) DO NOTHING
                "#,
            )
            .bind(&progress.bucket_name)
            .bind(key)
            .bind(&progress.upload_session_id)
            .bind(next_part_number)
            .bind(next_file_position)
            .bind(&parts)
            .bind(&now)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE upload_progress
                SET upload_session_id = ?,
                    next_part_number = ?,
                    next_file_position = ?,
                    uploaded_parts = ?,
                    version = version + 1,
                    updated_at = ?
                WHERE bucket_name = ? AND key_name = ? AND version = ?
                "#,
            )
            .bind(&progress.upload_session_id)
            .bind(next_part_number)
            .bind(next_file_position)
            .bind(&parts)
            .bind(&now)
            .bind(&progress.bucket_name)
            .bind(key)
            .bind(expected)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            let found = self.stored_version(&progress.bucket_name, key).await?;
            return Err(LedgerError::VersionConflict {
                bucket: progress.bucket_name.clone(),
                key: key.to_string(),
                expected: progress.version,
                found,
            });
        }

        progress.version += 1;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<bool, LedgerError> {
        let result = sqlx::query(
            r#"
            DELETE FROM upload_progress
            WHERE bucket_name = ? AND key_name = ?
            "#,
        )
        .bind(bucket)
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
