/// S3-compatible blob storage backend
use crate::{
    blob_store::{content_hash, BlobRef, BlobStore},
    config::S3Config,
    error::{PixError, PixResult},
};
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Scheme prefix on references minted by this backend
const SCHEME: &str = "s3";

/// Path prefix for all objects
const KEY_PREFIX: &str = "blobs/";

/// S3 blob storage backend
///
/// Supports AWS S3 and S3-compatible storage providers (MinIO,
/// DigitalOcean Spaces, etc.). The declared content type rides along as
/// object metadata.
#[derive(Clone)]
pub struct S3BlobStore {
    client: Arc<Client>,
    bucket: String,
}

impl S3BlobStore {
    /// Create a new S3 blob backend
    pub async fn new(config: S3Config) -> PixResult<Self> {
        info!(
            "Initializing S3 blob storage (bucket: {}, region: {})",
            config.bucket, config.region
        );

        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None, // session token
            None, // expiration
            "fadepix",
        );

        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint)
                .force_path_style(true); // Required for MinIO and some S3-compatible services
        }

        let client = Client::from_conf(s3_config_builder.build());

        Ok(Self {
            client: Arc::new(client),
            bucket: config.bucket,
        })
    }

    /// Object key for a storage id
    ///
    /// Shards ids into subdirectories: "abc123..." -> "blobs/ab/c1/abc123..."
    fn object_key(id: &str) -> String {
        if id.len() >= 4 {
            format!("{}{}/{}/{}", KEY_PREFIX, &id[0..2], &id[2..4], id)
        } else {
            format!("{}{}", KEY_PREFIX, id)
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn save(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        _filename: Option<&str>,
    ) -> PixResult<BlobRef> {
        let id = content_hash(&bytes);
        let key = Self::object_key(&id);

        debug!(
            "Uploading blob to S3: {} ({} bytes, type: {})",
            key,
            bytes.len(),
            content_type
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                error!("Failed to upload blob to S3: {}", e);
                PixError::BlobIo(format!("S3 upload failed: {}", e))
            })?;

        Ok(BlobRef::new(SCHEME, &id))
    }

    async fn get(&self, blob_ref: &BlobRef) -> PixResult<Vec<u8>> {
        let key = Self::object_key(blob_ref.id());

        match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(response) => {
                let bytes = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| {
                        error!("Failed to read S3 object body: {}", e);
                        PixError::BlobIo(format!("Failed to read S3 object: {}", e))
                    })?
                    .into_bytes()
                    .to_vec();

                debug!("Blob downloaded from S3: {} ({} bytes)", key, bytes.len());
                Ok(bytes)
            }
            Err(e) => {
                let error_msg = format!("{:?}", e);
                if error_msg.contains("NoSuchKey") || error_msg.contains("NotFound") {
                    Err(PixError::BlobNotFound(blob_ref.to_string()))
                } else {
                    error!("Failed to download blob from S3: {}", e);
                    Err(PixError::BlobIo(format!("S3 download failed: {}", e)))
                }
            }
        }
    }

    async fn content_type_of(&self, blob_ref: &BlobRef) -> PixResult<Option<String>> {
        let key = Self::object_key(blob_ref.id());

        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(response) => Ok(response.content_type().map(String::from)),
            Err(e) => {
                let error_msg = format!("{:?}", e);
                if error_msg.contains("NotFound") {
                    Ok(None)
                } else {
                    error!("Failed to head blob in S3: {}", e);
                    Err(PixError::BlobIo(format!("S3 head object failed: {}", e)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_key_sharding() {
        assert_eq!(
            S3BlobStore::object_key("abc123def456"),
            "blobs/ab/c1/abc123def456"
        );
    }

    #[test]
    fn test_object_key_short_id() {
        assert_eq!(S3BlobStore::object_key("abc"), "blobs/abc");
    }
}
