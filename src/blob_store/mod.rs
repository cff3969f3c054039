/// Blob storage
///
/// Persists opaque image bytes and hands back references the rest of
/// the system treats as black-box strings. Supports multiple backends
/// (disk, S3, and a dual composition of both).

pub mod disk;
pub mod dual;
pub mod s3;

pub use disk::DiskBlobStore;
pub use dual::DualBlobStore;
pub use s3::S3BlobStore;

use crate::{
    config::BlobstoreConfig,
    error::PixResult,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;

/// Opaque handle to stored bytes
///
/// Shaped as `<scheme>:<hex-sha256>` where the scheme names the store
/// that minted it (`fs`, `s3`). Adapters address their storage by the
/// hash part, so a reference minted by one half of a dual store can be
/// resolved by the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(scheme: &str, id: &str) -> Self {
        Self(format!("{scheme}:{id}"))
    }

    pub fn from_string(raw: String) -> Self {
        Self(raw)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The storage id after the scheme prefix
    pub fn id(&self) -> &str {
        self.0
            .split_once(':')
            .map(|(_, id)| id)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Blob storage backend trait
///
/// After `save` returns, `get` on the same reference must yield the
/// identical bytes, here and on any peer sharing the backing store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist bytes and return an opaque reference
    async fn save(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> PixResult<BlobRef>;

    /// Retrieve the complete bytes previously stored under a reference
    async fn get(&self, blob_ref: &BlobRef) -> PixResult<Vec<u8>>;

    /// Content type declared when the blob was saved, if retained
    async fn content_type_of(&self, blob_ref: &BlobRef) -> PixResult<Option<String>>;
}

/// Storage id for a payload: hex-encoded SHA-256 of the bytes
pub(crate) fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Open the blob store selected by configuration
pub async fn open(config: &BlobstoreConfig) -> PixResult<Arc<dyn BlobStore>> {
    match config {
        BlobstoreConfig::Local { location } => {
            Ok(Arc::new(DiskBlobStore::new(location.clone())))
        }
        BlobstoreConfig::S3(s3) => Ok(Arc::new(S3BlobStore::new(s3.clone()).await?)),
        BlobstoreConfig::Dual { location, s3 } => {
            let primary: Arc<dyn BlobStore> = Arc::new(DiskBlobStore::new(location.clone()));
            let secondary: Arc<dyn BlobStore> = Arc::new(S3BlobStore::new(s3.clone()).await?);
            Ok(Arc::new(DualBlobStore::new(primary, secondary)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_ref_id_strips_scheme() {
        let blob_ref = BlobRef::new("fs", "deadbeef");
        assert_eq!(blob_ref.as_str(), "fs:deadbeef");
        assert_eq!(blob_ref.id(), "deadbeef");
    }

    #[test]
    fn test_blob_ref_without_scheme_is_its_own_id() {
        let blob_ref = BlobRef::from_string("deadbeef".to_string());
        assert_eq!(blob_ref.id(), "deadbeef");
    }

    #[test]
    fn test_content_hash_is_stable() {
        let a = content_hash(b"same bytes");
        let b = content_hash(b"same bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
