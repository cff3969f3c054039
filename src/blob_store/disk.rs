/// Disk-based blob storage backend
use crate::{
    blob_store::{content_hash, BlobRef, BlobStore},
    error::{PixError, PixResult},
};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Scheme prefix on references minted by this backend
const SCHEME: &str = "fs";

/// Suffix of the sidecar file that retains the declared content type
const TYPE_SIDECAR_EXT: &str = "mime";

/// Disk storage backend
///
/// Stores blobs on the local filesystem with directory sharding based
/// on the leading hash characters to prevent too many files in one
/// directory. The declared content type is kept in a sidecar file next
/// to the blob so it survives restarts.
#[derive(Debug, Clone)]
pub struct DiskBlobStore {
    base_path: PathBuf,
}

impl DiskBlobStore {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    /// File path for a storage id
    ///
    /// Uses directory sharding: {base}/{first2chars}/{id}
    fn blob_path(&self, id: &str) -> PathBuf {
        if id.len() >= 2 {
            let shard = &id[0..2];
            self.base_path.join(shard).join(id)
        } else {
            self.base_path.join("_").join(id)
        }
    }

    fn sidecar_path(&self, id: &str) -> PathBuf {
        let mut path = self.blob_path(id);
        path.set_extension(TYPE_SIDECAR_EXT);
        path
    }

    /// Ensure the shard directory for a blob exists
    async fn ensure_blob_dir(&self, id: &str) -> PixResult<PathBuf> {
        let blob_path = self.blob_path(id);
        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                PixError::BlobIo(format!("Failed to create blob directory: {}", e))
            })?;
        }
        Ok(blob_path)
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn save(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        _filename: Option<&str>,
    ) -> PixResult<BlobRef> {
        let id = content_hash(&bytes);
        let blob_path = self.ensure_blob_dir(&id).await?;

        fs::write(&blob_path, bytes)
            .await
            .map_err(|e| PixError::BlobIo(format!("Failed to write blob {}: {}", id, e)))?;

        fs::write(self.sidecar_path(&id), content_type)
            .await
            .map_err(|e| {
                PixError::BlobIo(format!("Failed to write blob type for {}: {}", id, e))
            })?;

        tracing::debug!("Stored blob {} ({})", id, content_type);
        Ok(BlobRef::new(SCHEME, &id))
    }

    async fn get(&self, blob_ref: &BlobRef) -> PixResult<Vec<u8>> {
        let id = blob_ref.id();
        match fs::read(self.blob_path(id)).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PixError::BlobNotFound(blob_ref.to_string()))
            }
            Err(e) => Err(PixError::BlobIo(format!(
                "Failed to read blob {}: {}",
                id, e
            ))),
        }
    }

    async fn content_type_of(&self, blob_ref: &BlobRef) -> PixResult<Option<String>> {
        let id = blob_ref.id();
        match fs::read_to_string(self.sidecar_path(id)).await {
            Ok(content_type) => Ok(Some(content_type)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PixError::BlobIo(format!(
                "Failed to read blob type for {}: {}",
                id, e
            ))),
        }
    }
}
