/// Metadata index
///
/// Durably maps each minted token to its blob reference, absolute
/// expiry instant, and declared content type. The index is the shared
/// source of truth across replicas: once `put` returns, any replica
/// pointed at the same backing store must observe the record.

pub mod postgres;
pub mod sqlite;

pub use postgres::PostgresMetadataIndex;
pub use sqlite::SqliteMetadataIndex;

use crate::{blob_store::BlobRef, config::IndexConfig, error::PixResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One logical record per token, immutable after insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub token: String,
    pub blob_ref: BlobRef,
    /// Absolute deadline, milliseconds since the Unix epoch
    pub expires_at_ms: i64,
    pub content_type: Option<String>,
}

/// Metadata index backend trait
#[async_trait]
pub trait MetadataIndex: Send + Sync {
    /// Atomic upsert keyed by token. Tokens are never reused in
    /// practice, so overwrites only occur during test replay.
    async fn put(&self, record: &MetadataRecord) -> PixResult<()>;

    /// Look up a record. `None` means "no such token", which is
    /// distinct from the index failing to answer.
    async fn get(&self, token: &str) -> PixResult<Option<MetadataRecord>>;

    /// Release backing resources
    async fn close(&self);
}

/// Open the metadata index selected by configuration
pub async fn open(config: &IndexConfig) -> PixResult<Arc<dyn MetadataIndex>> {
    match config {
        IndexConfig::Sqlite { location } => {
            Ok(Arc::new(SqliteMetadataIndex::open(location).await?))
        }
        IndexConfig::Postgres(pg) => {
            Ok(Arc::new(PostgresMetadataIndex::open(pg.clone()).await?))
        }
    }
}
