/// Upload coordination
///
/// Validates an incoming payload, persists the blob, mints a token, and
/// records the binding with its absolute expiry instant. The blob is
/// written before the token exists, so by the time a token is visible
/// in the index the bytes are already retrievable from any replica. A
/// failure after the blob write leaves the blob orphaned; orphans are
/// tolerated and never collected.
use crate::{
    blob_store::BlobStore,
    clock::Clock,
    error::{PixError, PixResult},
    metadata::{MetadataIndex, MetadataRecord},
    token::TokenMinter,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;

/// Returned to the caller on a successful upload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub token: String,
    pub expires_at_epoch_ms: i64,
}

/// Read-only acceptance policy, fixed at startup
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub accepted_types: HashSet<String>,
    pub max_upload_bytes: usize,
    pub url_ttl_ms: i64,
}

pub struct UploadCoordinator {
    blob_store: Arc<dyn BlobStore>,
    index: Arc<dyn MetadataIndex>,
    minter: Arc<dyn TokenMinter>,
    clock: Arc<dyn Clock>,
    policy: UploadPolicy,
}

impl UploadCoordinator {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        index: Arc<dyn MetadataIndex>,
        minter: Arc<dyn TokenMinter>,
        clock: Arc<dyn Clock>,
        policy: UploadPolicy,
    ) -> Self {
        Self {
            blob_store,
            index,
            minter,
            clock,
            policy,
        }
    }

    /// Accept a payload and return its token and expiry instant
    pub async fn upload(
        &self,
        bytes: Vec<u8>,
        content_type: Option<&str>,
        filename: Option<&str>,
    ) -> PixResult<UploadReceipt> {
        if bytes.is_empty() {
            return Err(PixError::InvalidInput("Empty payload".to_string()));
        }

        let size = bytes.len();
        if size > self.policy.max_upload_bytes {
            return Err(PixError::TooLarge {
                size,
                limit: self.policy.max_upload_bytes,
            });
        }

        let content_type = content_type
            .ok_or_else(|| PixError::UnsupportedType("none declared".to_string()))?;
        if !self.policy.accepted_types.contains(content_type) {
            return Err(PixError::UnsupportedType(content_type.to_string()));
        }

        // Blob first: once the token is announced, the bytes must
        // already be readable by any replica sharing the store.
        let blob_ref = self.blob_store.save(bytes, content_type, filename).await?;

        let token = self.minter.mint()?;

        let expires_at_ms = self.clock.now_ms() + self.policy.url_ttl_ms;

        let record = MetadataRecord {
            token: token.clone(),
            blob_ref,
            expires_at_ms,
            content_type: Some(content_type.to_string()),
        };
        self.index.put(&record).await?;

        info!(
            "Accepted {} byte upload ({}), expires at {}",
            size, content_type, expires_at_ms
        );

        Ok(UploadReceipt {
            token,
            expires_at_epoch_ms: expires_at_ms,
        })
    }
}
