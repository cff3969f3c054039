/// SQLite-backed metadata index
///
/// The default adapter: a single file shared by every process pointed
/// at it. WAL mode keeps concurrent readers off the writers' backs.
use crate::{
    blob_store::BlobRef,
    error::{PixError, PixResult},
    metadata::{MetadataIndex, MetadataRecord},
};
use async_trait::async_trait;
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::path::Path;

pub struct SqliteMetadataIndex {
    pool: SqlitePool,
}

impl SqliteMetadataIndex {
    /// Open (creating if missing) the index at the given path
    pub async fn open(path: &Path) -> PixResult<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .busy_timeout(std::time::Duration::from_secs(5)),
        )
        .await
        .map_err(|e| PixError::IndexUnavailable(format!("Failed to open index: {}", e)))?;

        Self::bootstrap(&pool).await?;

        Ok(Self { pool })
    }

    /// Idempotent schema creation; runs before the first put/get
    async fn bootstrap(pool: &SqlitePool) -> PixResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS image_token (
                token TEXT PRIMARY KEY,
                blob_ref TEXT NOT NULL,
                expires_at_ms INTEGER NOT NULL,
                content_type TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl MetadataIndex for SqliteMetadataIndex {
    async fn put(&self, record: &MetadataRecord) -> PixResult<()> {
        sqlx::query(
            r#"
            INSERT INTO image_token (token, blob_ref, expires_at_ms, content_type)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(token) DO UPDATE SET
                blob_ref = excluded.blob_ref,
                expires_at_ms = excluded.expires_at_ms,
                content_type = excluded.content_type
            "#,
        )
        .bind(&record.token)
        .bind(record.blob_ref.as_str())
        .bind(record.expires_at_ms)
        .bind(&record.content_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, token: &str) -> PixResult<Option<MetadataRecord>> {
        let row = sqlx::query(
            r#"
            SELECT token, blob_ref, expires_at_ms, content_type
            FROM image_token
            WHERE token = ?1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            Ok(Some(MetadataRecord {
                token: row.try_get("token")?,
                blob_ref: BlobRef::from_string(row.try_get("blob_ref")?),
                expires_at_ms: row.try_get("expires_at_ms")?,
                content_type: row.try_get("content_type")?,
            }))
        } else {
            Ok(None)
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
