/// Configuration management for fadepix
use crate::error::{PixError, PixResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;

/// Default shorthand list for accepted upload types
const DEFAULT_ACCEPTED_TYPES: &str = "jpeg,jpg,png,webp";

/// Default upload size cap: 5 MiB
const DEFAULT_MAX_UPLOAD_BYTES: usize = 5_242_880;

/// Default URL lifetime: sixty seconds
const DEFAULT_URL_TTL_MS: i64 = 60_000;

/// Default cross-replica clock skew tolerance
const DEFAULT_CLOCK_SKEW_MS: i64 = 5_000;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub upload: UploadConfig,
    pub access: AccessConfig,
    pub blobstore: BlobstoreConfig,
    pub index: IndexConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
}

/// Upload acceptance policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Accepted MIME types, expanded from the shorthand list
    pub accepted_types: HashSet<String>,
    pub max_upload_bytes: usize,
    pub url_ttl_ms: i64,
}

/// Access policy knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    pub clock_skew_ms: i64,
}

/// Blob storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BlobstoreConfig {
    /// Store blobs on local disk
    Local { location: PathBuf },
    /// Store blobs in S3-compatible storage
    S3(S3Config),
    /// Local primary with best-effort S3 replication
    Dual { location: PathBuf, s3: S3Config },
}

/// Configuration for S3-compatible storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    /// AWS region (e.g. "us-east-1")
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, Spaces, ...)
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// Metadata index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IndexConfig {
    Sqlite { location: PathBuf },
    Postgres(PostgresConfig),
}

/// Connection parameters for the PostgreSQL index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PixResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PIX_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PIX_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| PixError::Config("Invalid port number".to_string()))?;

        let accepted_raw = env::var("PIX_ACCEPTED_FILE_TYPES")
            .unwrap_or_else(|_| DEFAULT_ACCEPTED_TYPES.to_string());
        let accepted_types = parse_accepted_types(&accepted_raw)?;

        let max_upload_bytes = env::var("PIX_MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let url_ttl_ms = env::var("PIX_URL_TTL_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_URL_TTL_MS);
        let clock_skew_ms = env::var("PIX_CLOCK_SKEW_MS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_CLOCK_SKEW_MS);

        let blobstore = Self::blobstore_from_env()?;
        let index = Self::index_from_env()?;

        Ok(ServerConfig {
            service: ServiceConfig { hostname, port },
            upload: UploadConfig {
                accepted_types,
                max_upload_bytes,
                url_ttl_ms,
            },
            access: AccessConfig { clock_skew_ms },
            blobstore,
            index,
        })
    }

    fn blobstore_from_env() -> PixResult<BlobstoreConfig> {
        let selection = env::var("PIX_BLOBSTORE").unwrap_or_else(|_| "local".to_string());
        let backends: HashSet<&str> = selection
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect();

        for backend in &backends {
            if *backend != "local" && *backend != "s3" {
                return Err(PixError::Config(format!(
                    "Unknown blob store backend: {}",
                    backend
                )));
            }
        }

        let location = env::var("PIX_BLOBSTORE_DISK_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/blobs"));

        match (backends.contains("local"), backends.contains("s3")) {
            (true, false) => Ok(BlobstoreConfig::Local { location }),
            (false, true) => Ok(BlobstoreConfig::S3(Self::s3_from_env()?)),
            (true, true) => Ok(BlobstoreConfig::Dual {
                location,
                s3: Self::s3_from_env()?,
            }),
            (false, false) => Err(PixError::Config(
                "No blob store backend selected".to_string(),
            )),
        }
    }

    fn s3_from_env() -> PixResult<S3Config> {
        Ok(S3Config {
            bucket: env::var("PIX_BLOBSTORE_S3_BUCKET")
                .map_err(|_| PixError::Config("S3 bucket required".to_string()))?,
            region: env::var("PIX_BLOBSTORE_S3_REGION")
                .unwrap_or_else(|_| "us-east-1".to_string()),
            endpoint: env::var("PIX_BLOBSTORE_S3_ENDPOINT").ok(),
            access_key_id: env::var("PIX_BLOBSTORE_S3_ACCESS_KEY_ID")
                .map_err(|_| PixError::Config("S3 access key required".to_string()))?,
            secret_access_key: env::var("PIX_BLOBSTORE_S3_SECRET_ACCESS_KEY")
                .map_err(|_| PixError::Config("S3 secret key required".to_string()))?,
        })
    }

    fn index_from_env() -> PixResult<IndexConfig> {
        let selection = env::var("PIX_INDEX").unwrap_or_else(|_| "sqlite".to_string());
        match selection.as_str() {
            "sqlite" => {
                let location = env::var("PIX_INDEX_DB_LOCATION")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| PathBuf::from("./data/index.sqlite"));
                Ok(IndexConfig::Sqlite { location })
            }
            "postgres" => Ok(IndexConfig::Postgres(PostgresConfig {
                url: env::var("DATABASE_URL")
                    .map_err(|_| PixError::Config("DATABASE_URL required for postgres index".to_string()))?,
                max_connections: env::var("PIX_POSTGRES_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(10),
                connect_timeout_secs: env::var("PIX_POSTGRES_CONNECT_TIMEOUT")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            })),
            other => Err(PixError::Config(format!(
                "Unknown metadata index backend: {}",
                other
            ))),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> PixResult<()> {
        if self.service.hostname.is_empty() {
            return Err(PixError::Config("Hostname cannot be empty".to_string()));
        }

        if self.upload.accepted_types.is_empty() {
            return Err(PixError::Config(
                "Accepted type set cannot be empty".to_string(),
            ));
        }

        if self.upload.max_upload_bytes == 0 {
            return Err(PixError::Config(
                "Upload size cap must be positive".to_string(),
            ));
        }

        if self.upload.url_ttl_ms <= 0 {
            return Err(PixError::Config("URL TTL must be positive".to_string()));
        }

        if self.access.clock_skew_ms < 0 {
            return Err(PixError::Config(
                "Clock skew tolerance cannot be negative".to_string(),
            ));
        }

        Ok(())
    }
}

/// Expand a comma-separated shorthand list into MIME types
///
/// `jpeg`/`jpg` map to `image/jpeg`; `png`, `gif` and `webp` map to
/// `image/<token>`. Anything else fails loading outright rather than
/// silently expanding into a type no client ever declares.
pub fn parse_accepted_types(raw: &str) -> PixResult<HashSet<String>> {
    let mut accepted = HashSet::new();

    for token in raw.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        let mime = match token {
            "jpeg" | "jpg" => "image/jpeg".to_string(),
            "png" | "gif" | "webp" => format!("image/{}", token),
            other => {
                return Err(PixError::Config(format!(
                    "Unknown file type shorthand: {}",
                    other
                )))
            }
        };
        accepted.insert(mime);
    }

    if accepted.is_empty() {
        return Err(PixError::Config(
            "Accepted type list is empty".to_string(),
        ));
    }

    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_shorthand_expansion() {
        let accepted = parse_accepted_types(DEFAULT_ACCEPTED_TYPES).unwrap();
        assert_eq!(accepted.len(), 3); // jpeg and jpg collapse
        assert!(accepted.contains("image/jpeg"));
        assert!(accepted.contains("image/png"));
        assert!(accepted.contains("image/webp"));
    }

    #[test]
    fn test_gif_shorthand() {
        let accepted = parse_accepted_types("gif").unwrap();
        assert!(accepted.contains("image/gif"));
    }

    #[test]
    fn test_unknown_shorthand_fails_loading() {
        assert!(parse_accepted_types("jpeg,exe").is_err());
        assert!(parse_accepted_types("tiff").is_err());
    }

    #[test]
    fn test_empty_list_fails_loading() {
        assert!(parse_accepted_types("").is_err());
        assert!(parse_accepted_types(" , ,").is_err());
    }

    #[test]
    fn test_whitespace_tolerated() {
        let accepted = parse_accepted_types(" jpeg , png ").unwrap();
        assert!(accepted.contains("image/jpeg"));
        assert!(accepted.contains("image/png"));
    }
}
