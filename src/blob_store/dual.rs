/// Dual blob storage backend
///
/// Composes two backends: writes land on the primary synchronously and
/// are replicated to the secondary in the background, best-effort. A
/// secondary failure is logged and never fails the upload. Reads prefer
/// the primary and fall back to the secondary, so either copy can serve
/// a reference once the write has settled.
use crate::{
    blob_store::{BlobRef, BlobStore},
    error::{PixError, PixResult},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct DualBlobStore {
    primary: Arc<dyn BlobStore>,
    secondary: Arc<dyn BlobStore>,
}

impl DualBlobStore {
    pub fn new(primary: Arc<dyn BlobStore>, secondary: Arc<dyn BlobStore>) -> Self {
        Self { primary, secondary }
    }
}

#[async_trait]
impl BlobStore for DualBlobStore {
    async fn save(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        filename: Option<&str>,
    ) -> PixResult<BlobRef> {
        let blob_ref = self
            .primary
            .save(bytes.clone(), content_type, filename)
            .await?;

        let secondary = Arc::clone(&self.secondary);
        let content_type = content_type.to_string();
        let filename = filename.map(String::from);
        let replicated_ref = blob_ref.clone();
        tokio::spawn(async move {
            match secondary
                .save(bytes, &content_type, filename.as_deref())
                .await
            {
                Ok(_) => debug!("Replicated blob {} to secondary store", replicated_ref),
                Err(e) => warn!(
                    "Secondary store failed to replicate blob {}: {}",
                    replicated_ref, e
                ),
            }
        });

        Ok(blob_ref)
    }

    async fn get(&self, blob_ref: &BlobRef) -> PixResult<Vec<u8>> {
        match self.primary.get(blob_ref).await {
            Ok(bytes) => Ok(bytes),
            Err(PixError::BlobNotFound(_)) | Err(PixError::BlobIo(_)) => {
                debug!(
                    "Primary store missed blob {}, falling back to secondary",
                    blob_ref
                );
                self.secondary.get(blob_ref).await
            }
            Err(e) => Err(e),
        }
    }

    async fn content_type_of(&self, blob_ref: &BlobRef) -> PixResult<Option<String>> {
        match self.primary.content_type_of(blob_ref).await {
            Ok(Some(content_type)) => Ok(Some(content_type)),
            Ok(None) | Err(PixError::BlobNotFound(_)) | Err(PixError::BlobIo(_)) => {
                self.secondary.content_type_of(blob_ref).await
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::content_hash;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory backend for exercising the composition
    #[derive(Default)]
    struct MemoryBlobStore {
        blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
        fail_saves: bool,
    }

    impl MemoryBlobStore {
        fn failing() -> Self {
            Self {
                blobs: Mutex::new(HashMap::new()),
                fail_saves: true,
            }
        }

        fn contains(&self, blob_ref: &BlobRef) -> bool {
            self.blobs.lock().unwrap().contains_key(blob_ref.id())
        }
    }

    #[async_trait]
    impl BlobStore for MemoryBlobStore {
        async fn save(
            &self,
            bytes: Vec<u8>,
            content_type: &str,
            _filename: Option<&str>,
        ) -> PixResult<BlobRef> {
            if self.fail_saves {
                return Err(PixError::BlobIo("disk full".to_string()));
            }
            let id = content_hash(&bytes);
            self.blobs
                .lock()
                .unwrap()
                .insert(id.clone(), (bytes, content_type.to_string()));
            Ok(BlobRef::new("mem", &id))
        }

        async fn get(&self, blob_ref: &BlobRef) -> PixResult<Vec<u8>> {
            self.blobs
                .lock()
                .unwrap()
                .get(blob_ref.id())
                .map(|(bytes, _)| bytes.clone())
                .ok_or_else(|| PixError::BlobNotFound(blob_ref.to_string()))
        }

        async fn content_type_of(&self, blob_ref: &BlobRef) -> PixResult<Option<String>> {
            Ok(self
                .blobs
                .lock()
                .unwrap()
                .get(blob_ref.id())
                .map(|(_, content_type)| content_type.clone()))
        }
    }

    async fn wait_for_replication(store: &MemoryBlobStore, blob_ref: &BlobRef) {
        for _ in 0..100 {
            if store.contains(blob_ref) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("blob {} never reached the secondary", blob_ref);
    }

    #[tokio::test]
    async fn test_save_replicates_to_secondary() {
        let primary = Arc::new(MemoryBlobStore::default());
        let secondary = Arc::new(MemoryBlobStore::default());
        let dual = DualBlobStore::new(primary.clone(), secondary.clone());

        let blob_ref = dual
            .save(b"replicate me".to_vec(), "image/png", None)
            .await
            .unwrap();

        // Primary holds the bytes immediately; the reference is the primary's
        assert!(primary.contains(&blob_ref));
        assert!(blob_ref.as_str().starts_with("mem:"));

        wait_for_replication(&secondary, &blob_ref).await;
    }

    #[tokio::test]
    async fn test_secondary_failure_is_not_fatal() {
        let primary = Arc::new(MemoryBlobStore::default());
        let secondary = Arc::new(MemoryBlobStore::failing());
        let dual = DualBlobStore::new(primary.clone(), secondary);

        let blob_ref = dual
            .save(b"still fine".to_vec(), "image/jpeg", None)
            .await
            .unwrap();

        assert_eq!(dual.get(&blob_ref).await.unwrap(), b"still fine".to_vec());
    }

    #[tokio::test]
    async fn test_get_falls_back_to_secondary() {
        let primary = Arc::new(MemoryBlobStore::default());
        let secondary = Arc::new(MemoryBlobStore::default());
        let dual = DualBlobStore::new(primary, secondary.clone());

        // Present only on the secondary, as if the primary lost its copy
        let blob_ref = secondary
            .save(b"only here".to_vec(), "image/webp", None)
            .await
            .unwrap();

        assert_eq!(dual.get(&blob_ref).await.unwrap(), b"only here".to_vec());
        assert_eq!(
            dual.content_type_of(&blob_ref).await.unwrap().as_deref(),
            Some("image/webp")
        );
    }

    #[tokio::test]
    async fn test_primary_save_failure_aborts() {
        let primary = Arc::new(MemoryBlobStore::failing());
        let secondary = Arc::new(MemoryBlobStore::default());
        let dual = DualBlobStore::new(primary, secondary);

        let result = dual.save(b"doomed".to_vec(), "image/png", None).await;
        assert!(matches!(result, Err(PixError::BlobIo(_))));
    }
}
