/// Application context and dependency injection
use crate::{
    access::AccessArbiter,
    blob_store,
    clock::{Clock, SystemClock},
    config::{BlobstoreConfig, ServerConfig},
    error::PixResult,
    metadata,
    token::RandomTokenMinter,
    upload::{UploadCoordinator, UploadPolicy},
};
use std::sync::Arc;

/// Shared services behind every request handler
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    pub uploader: Arc<UploadCoordinator>,
    pub arbiter: Arc<AccessArbiter>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> PixResult<Self> {
        config.validate()?;

        Self::ensure_directories(&config).await?;

        let blob_store = blob_store::open(&config.blobstore).await?;
        let index = metadata::open(&config.index).await?;
        let minter = Arc::new(RandomTokenMinter);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let policy = UploadPolicy {
            accepted_types: config.upload.accepted_types.clone(),
            max_upload_bytes: config.upload.max_upload_bytes,
            url_ttl_ms: config.upload.url_ttl_ms,
        };

        let uploader = Arc::new(UploadCoordinator::new(
            Arc::clone(&blob_store),
            Arc::clone(&index),
            minter,
            Arc::clone(&clock),
            policy,
        ));

        let arbiter = Arc::new(AccessArbiter::new(
            index,
            blob_store,
            clock,
            config.access.clock_skew_ms,
        ));

        Ok(Self {
            config: Arc::new(config),
            uploader,
            arbiter,
        })
    }

    /// Ensure blob directories exist when storing on local disk
    async fn ensure_directories(config: &ServerConfig) -> PixResult<()> {
        if let BlobstoreConfig::Local { location } | BlobstoreConfig::Dual { location, .. } =
            &config.blobstore
        {
            tokio::fs::create_dir_all(location).await?;
        }

        Ok(())
    }
}
