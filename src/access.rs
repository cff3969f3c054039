/// Access arbitration
///
/// The single place where expiry is evaluated. Every ambiguity (an
/// unknown token, a malformed token, a post-grace timestamp) resolves
/// to denied, and a denied decision never reaches the blob store.
use crate::{
    blob_store::BlobStore,
    clock::Clock,
    error::{PixError, PixResult},
    metadata::{MetadataIndex, MetadataRecord},
};
use std::sync::Arc;
use tracing::debug;

/// Why an access request was turned away
///
/// Preserved internally for logs and tests; the HTTP layer collapses
/// all three to one indistinguishable response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No record for the token
    Missing,
    /// Past the expiry instant plus the skew allowance
    Expired,
    /// Token failed the syntactic check
    Invalid,
}

/// Result of arbitrating one access request
#[derive(Debug)]
pub enum AccessOutcome {
    Allowed {
        bytes: Vec<u8>,
        record: MetadataRecord,
    },
    Denied(DenyReason),
}

pub struct AccessArbiter {
    index: Arc<dyn MetadataIndex>,
    blob_store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    skew_ms: i64,
}

impl AccessArbiter {
    pub fn new(
        index: Arc<dyn MetadataIndex>,
        blob_store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        skew_ms: i64,
    ) -> Self {
        Self {
            index,
            blob_store,
            clock,
            skew_ms,
        }
    }

    /// Resolve a token to its bytes, or a denial
    pub async fn fetch(&self, token: &str) -> PixResult<AccessOutcome> {
        if token.trim().is_empty() {
            return Ok(AccessOutcome::Denied(DenyReason::Invalid));
        }

        let record = match self.index.get(token).await? {
            Some(record) => record,
            None => return Ok(AccessOutcome::Denied(DenyReason::Missing)),
        };

        // The grace window (expiry, expiry + skew] absorbs bounded clock
        // disagreement between the minting and serving replicas.
        let now_ms = self.clock.now_ms();
        if now_ms > record.expires_at_ms + self.skew_ms {
            debug!(
                "Token expired {} ms ago (skew allowance {} ms)",
                now_ms - record.expires_at_ms,
                self.skew_ms
            );
            return Ok(AccessOutcome::Denied(DenyReason::Expired));
        }

        let bytes = match self.blob_store.get(&record.blob_ref).await {
            Ok(bytes) => bytes,
            Err(PixError::BlobNotFound(_)) => {
                // The index vouched for this reference; a miss here is a
                // broken invariant, not a user-visible denial.
                return Err(PixError::Internal(format!(
                    "Metadata points at missing blob {}",
                    record.blob_ref
                )));
            }
            Err(e) => return Err(e),
        };

        Ok(AccessOutcome::Allowed { bytes, record })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::{content_hash, BlobRef};
    use crate::clock::ManualClock;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingBlobStore {
        blobs: Mutex<HashMap<String, Vec<u8>>>,
        gets: AtomicUsize,
    }

    impl CountingBlobStore {
        fn new() -> Self {
            Self {
                blobs: Mutex::new(HashMap::new()),
                gets: AtomicUsize::new(0),
            }
        }

        fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlobStore for CountingBlobStore {
        async fn save(
            &self,
            bytes: Vec<u8>,
            _content_type: &str,
            _filename: Option<&str>,
        ) -> PixResult<BlobRef> {
            let id = content_hash(&bytes);
            self.blobs.lock().unwrap().insert(id.clone(), bytes);
            Ok(BlobRef::new("mem", &id))
        }

        async fn get(&self, blob_ref: &BlobRef) -> PixResult<Vec<u8>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.blobs
                .lock()
                .unwrap()
                .get(blob_ref.id())
                .cloned()
                .ok_or_else(|| PixError::BlobNotFound(blob_ref.to_string()))
        }

        async fn content_type_of(&self, _blob_ref: &BlobRef) -> PixResult<Option<String>> {
            Ok(None)
        }
    }

    struct CountingIndex {
        records: Mutex<HashMap<String, MetadataRecord>>,
        gets: AtomicUsize,
    }

    impl CountingIndex {
        fn new() -> Self {
            Self {
                records: Mutex::new(HashMap::new()),
                gets: AtomicUsize::new(0),
            }
        }

        fn get_count(&self) -> usize {
            self.gets.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MetadataIndex for CountingIndex {
        async fn put(&self, record: &MetadataRecord) -> PixResult<()> {
            self.records
                .lock()
                .unwrap()
                .insert(record.token.clone(), record.clone());
            Ok(())
        }

        async fn get(&self, token: &str) -> PixResult<Option<MetadataRecord>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            Ok(self.records.lock().unwrap().get(token).cloned())
        }

        async fn close(&self) {}
    }

    const EXPIRY: i64 = 1_060_000;
    const SKEW: i64 = 5_000;

    struct Fixture {
        blob_store: Arc<CountingBlobStore>,
        index: Arc<CountingIndex>,
        clock: Arc<ManualClock>,
        arbiter: AccessArbiter,
    }

    /// One stored blob bound to "tok" with expiry 1_060_000
    async fn fixture() -> Fixture {
        let blob_store = Arc::new(CountingBlobStore::new());
        let index = Arc::new(CountingIndex::new());
        let clock = Arc::new(ManualClock::new(1_000_000));

        let blob_ref = blob_store
            .save(vec![0x01; 1024], "image/jpeg", None)
            .await
            .unwrap();
        index
            .put(&MetadataRecord {
                token: "tok".to_string(),
                blob_ref,
                expires_at_ms: EXPIRY,
                content_type: Some("image/jpeg".to_string()),
            })
            .await
            .unwrap();

        let arbiter = AccessArbiter::new(
            index.clone(),
            blob_store.clone(),
            clock.clone(),
            SKEW,
        );

        Fixture {
            blob_store,
            index,
            clock,
            arbiter,
        }
    }

    #[tokio::test]
    async fn test_valid_token_returns_bytes() {
        let f = fixture().await;
        f.clock.set(1_030_000);

        match f.arbiter.fetch("tok").await.unwrap() {
            AccessOutcome::Allowed { bytes, record } => {
                assert_eq!(bytes, vec![0x01; 1024]);
                assert_eq!(record.content_type.as_deref(), Some("image/jpeg"));
            }
            other => panic!("expected allowed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_policy_boundary() {
        // (instant, allowed?)
        let cases = [
            (EXPIRY, true),
            (EXPIRY + 1, true),
            (EXPIRY + SKEW - 1, true),
            (EXPIRY + SKEW, true),
            (EXPIRY + SKEW + 1, false),
        ];

        for (now, should_allow) in cases {
            let f = fixture().await;
            f.clock.set(now);
            let outcome = f.arbiter.fetch("tok").await.unwrap();
            match outcome {
                AccessOutcome::Allowed { .. } => {
                    assert!(should_allow, "unexpectedly allowed at {}", now)
                }
                AccessOutcome::Denied(reason) => {
                    assert!(!should_allow, "unexpectedly denied at {}", now);
                    assert_eq!(reason, DenyReason::Expired);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_expired_denial_skips_blob_store() {
        let f = fixture().await;
        f.clock.set(EXPIRY + SKEW + 60_000);

        match f.arbiter.fetch("tok").await.unwrap() {
            AccessOutcome::Denied(DenyReason::Expired) => {}
            other => panic!("expected expired denial, got {:?}", other),
        }
        assert_eq!(f.blob_store.get_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_skips_blob_store() {
        let f = fixture().await;

        match f.arbiter.fetch("absent").await.unwrap() {
            AccessOutcome::Denied(DenyReason::Missing) => {}
            other => panic!("expected missing denial, got {:?}", other),
        }
        assert_eq!(f.blob_store.get_count(), 0);
    }

    #[tokio::test]
    async fn test_malformed_token_skips_index_and_blob_store() {
        let f = fixture().await;

        for token in ["", "   ", "\t\n"] {
            match f.arbiter.fetch(token).await.unwrap() {
                AccessOutcome::Denied(DenyReason::Invalid) => {}
                other => panic!("expected invalid denial for {:?}, got {:?}", token, other),
            }
        }
        assert_eq!(f.index.get_count(), 0);
        assert_eq!(f.blob_store.get_count(), 0);
    }

    #[tokio::test]
    async fn test_repeated_access_is_idempotent() {
        let f = fixture().await;
        f.clock.set(1_030_000);

        let first = match f.arbiter.fetch("tok").await.unwrap() {
            AccessOutcome::Allowed { bytes, .. } => bytes,
            other => panic!("expected allowed, got {:?}", other),
        };
        let second = match f.arbiter.fetch("tok").await.unwrap() {
            AccessOutcome::Allowed { bytes, .. } => bytes,
            other => panic!("expected allowed, got {:?}", other),
        };
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_missing_blob_for_valid_record_is_internal() {
        let f = fixture().await;
        f.clock.set(1_030_000);

        // Forge a record whose reference was never stored
        f.index
            .put(&MetadataRecord {
                token: "ghost".to_string(),
                blob_ref: BlobRef::new("mem", "feedfacefeedface"),
                expires_at_ms: EXPIRY,
                content_type: None,
            })
            .await
            .unwrap();

        let result = f.arbiter.fetch("ghost").await;
        assert!(matches!(result, Err(PixError::Internal(_))));
    }
}
