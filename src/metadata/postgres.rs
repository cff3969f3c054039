/// PostgreSQL-backed metadata index
///
/// Alternative adapter for deployments running several replicas behind
/// a load balancer, where a shared server beats a shared file.
use crate::{
    blob_store::BlobRef,
    config::PostgresConfig,
    error::{PixError, PixResult},
    metadata::{MetadataIndex, MetadataRecord},
};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::info;

pub struct PostgresMetadataIndex {
    pool: PgPool,
}

impl PostgresMetadataIndex {
    /// Connect and bootstrap the schema
    pub async fn open(config: PostgresConfig) -> PixResult<Self> {
        info!(
            "Connecting to PostgreSQL metadata index (max {} connections)",
            config.max_connections
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(&config.url)
            .await
            .map_err(|e| PixError::IndexUnavailable(format!("Failed to connect: {}", e)))?;

        Self::bootstrap(&pool).await?;

        Ok(Self { pool })
    }

    /// Idempotent schema creation; runs before the first put/get
    async fn bootstrap(pool: &PgPool) -> PixResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS image_token (
                token TEXT PRIMARY KEY,
                blob_ref TEXT NOT NULL,
                expires_at_ms BIGINT NOT NULL,
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
impl MetadataIndex for PostgresMetadataIndex {
    async fn put(&self, record: &MetadataRecord) -> PixResult<()> {
        sqlx::query(
            r#"
            INSERT INTO image_token (token, blob_ref, expires_at_ms, content_type)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (token) DO UPDATE SET
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
            WHERE token = $1
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
