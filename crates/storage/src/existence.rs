//! Cached existence lookups for storage keys.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::error::StorageError;
use crate::memo::{MemoCache, MemoOptions};
use crate::traits::{ObjectMetadata, StorageClient};
use crate::types::{RemoteObjectMetadata, UploadSettings};

/// Prefix reserved for existence lookups in the shared memo cache.
pub const KEY_EXISTENCE_PREFIX: &str = "symstash:key-existence:v1";

/// Hit and miss counters for a cache.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCounters {
    /// Number of lookups answered from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Number of lookups that went to the store.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

/// Answers "what is currently stored under this key" through the memo cache.
///
/// A missing object is a regular answer (`size == 0`) and is cached like any
/// other so repeated lookups within the TTL do not reach the store.
pub struct KeyExistenceCache {
    memo: Arc<MemoCache>,
    options: MemoOptions,
    counters: Arc<CacheCounters>,
}

impl KeyExistenceCache {
    /// Create an existence cache on top of a shared memo cache.
    ///
    /// # Arguments
    /// * `memo` - Process-wide memo cache
    /// * `ttl` - How long an answer stays valid
    pub fn new(memo: Arc<MemoCache>, ttl: Duration) -> Self {
        let counters: Arc<CacheCounters> = Arc::new(CacheCounters::default());
        let hit_counters: Arc<CacheCounters> = Arc::clone(&counters);
        let miss_counters: Arc<CacheCounters> = Arc::clone(&counters);
        let options: MemoOptions = MemoOptions::new(KEY_EXISTENCE_PREFIX, ttl)
            .with_on_hit(move |_| {
                hit_counters.hits.fetch_add(1, Ordering::Relaxed);
            })
            .with_on_miss(move |_| {
                miss_counters.misses.fetch_add(1, Ordering::Relaxed);
            });

        Self {
            memo,
            options,
            counters,
        }
    }

    /// Create an existence cache whose TTL comes from `settings`.
    pub fn from_settings(memo: Arc<MemoCache>, settings: &UploadSettings) -> Self {
        Self::new(memo, settings.existence_cache_ttl())
    }

    /// Lifetime of cached answers.
    pub fn ttl(&self) -> Duration {
        self.options.ttl
    }

    /// Look up the stored size and user metadata of `bucket/key`.
    ///
    /// Entries are keyed by bucket and key only; the client is just the
    /// means of fetching a missing answer.
    ///
    /// # Errors
    /// Returns the storage error of the underlying HEAD request. Errors are
    /// not cached.
    pub async fn lookup<C: StorageClient + ?Sized>(
        &self,
        client: &C,
        bucket: &str,
        key: &str,
    ) -> Result<RemoteObjectMetadata, StorageError> {
        let remote: Option<RemoteObjectMetadata> = self
            .memo
            .memoize(&self.options, (bucket, key), |(bucket, key)| async move {
                let head: Option<ObjectMetadata> = client.head_object(bucket, key).await?;
                Ok::<RemoteObjectMetadata, StorageError>(match head {
                    Some(meta) => RemoteObjectMetadata {
                        size: meta.size,
                        custom_metadata: non_empty(meta.user_metadata),
                    },
                    None => RemoteObjectMetadata::not_found(),
                })
            })
            .await?;
        Ok(remote.unwrap_or_default())
    }

    /// Forget the cached answer for `bucket/key`.
    pub async fn invalidate(&self, bucket: &str, key: &str) {
        self.memo.invalidate(KEY_EXISTENCE_PREFIX, &(bucket, key)).await;
    }

    /// Hit and miss counts so far.
    pub fn counters(&self) -> &CacheCounters {
        &self.counters
    }
}

fn non_empty(metadata: HashMap<String, String>) -> Option<HashMap<String, String>> {
    if metadata.is_empty() {
        None
    } else {
        Some(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::PutObjectRequest;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct HeadOnlyClient {
        objects: Mutex<HashMap<String, ObjectMetadata>>,
        heads: AtomicU64,
        fail: bool,
    }

    impl HeadOnlyClient {
        fn with_object(self, key: &str, size: u64, metadata: &[(&str, &str)]) -> Self {
            self.objects.lock().unwrap().insert(
                key.to_string(),
                ObjectMetadata {
                    size,
                    user_metadata: metadata
                        .iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect(),
                    ..Default::default()
                },
            );
            self
        }
    }

    #[async_trait]
    impl StorageClient for HeadOnlyClient {
        async fn head_object(
            &self,
            _bucket: &str,
            key: &str,
        ) -> Result<Option<ObjectMetadata>, StorageError> {
            self.heads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StorageError::NetworkError {
                    message: "connection reset".into(),
                    retryable: true,
                });
            }
            Ok(self.objects.lock().unwrap().get(key).cloned())
        }

        async fn put_object(
            &self,
            _bucket: &str,
            _key: &str,
            _request: PutObjectRequest,
        ) -> Result<(), StorageError> {
            Ok(())
        }

        async fn head_bucket(&self, _bucket: &str) -> Result<bool, StorageError> {
            Ok(true)
        }
    }

    fn cache() -> KeyExistenceCache {
        KeyExistenceCache::new(Arc::new(MemoCache::in_memory()), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn test_ttl_from_settings() {
        let settings: UploadSettings =
            UploadSettings::new().with_existence_cache_ttl(Duration::from_millis(30));
        let cache: KeyExistenceCache =
            KeyExistenceCache::from_settings(Arc::new(MemoCache::in_memory()), &settings);
        assert_eq!(cache.ttl(), Duration::from_millis(30));

        let client: HeadOnlyClient = HeadOnlyClient::default();
        cache.lookup(&client, "b", "v0/a/b/c").await.unwrap();
        cache.lookup(&client, "b", "v0/a/b/c").await.unwrap();
        assert_eq!(client.heads.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.lookup(&client, "b", "v0/a/b/c").await.unwrap();
        assert_eq!(client.heads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_cached() {
        let client: HeadOnlyClient = HeadOnlyClient::default();
        let cache: KeyExistenceCache = cache();

        for _ in 0..3 {
            let remote: RemoteObjectMetadata = cache.lookup(&client, "b", "v0/a/b/c").await.unwrap();
            assert_eq!(remote, RemoteObjectMetadata::not_found());
        }
        assert_eq!(client.heads.load(Ordering::SeqCst), 1);
        assert_eq!(cache.counters().misses(), 1);
        assert_eq!(cache.counters().hits(), 2);
    }

    #[tokio::test]
    async fn test_metadata_round_trips() {
        let client: HeadOnlyClient = HeadOnlyClient::default().with_object(
            "v0/a/b/c",
            100,
            &[("original_size", "500"), ("original_md5_hash", "abc")],
        );
        let cache: KeyExistenceCache = cache();

        let remote: RemoteObjectMetadata = cache.lookup(&client, "b", "v0/a/b/c").await.unwrap();
        assert_eq!(remote.size, 100);
        let metadata: HashMap<String, String> = remote.custom_metadata.unwrap();
        assert_eq!(metadata["original_size"], "500");

        let again: RemoteObjectMetadata = cache.lookup(&client, "b", "v0/a/b/c").await.unwrap();
        assert_eq!(again.custom_metadata.unwrap()["original_md5_hash"], "abc");
        assert_eq!(client.heads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_metadata_is_absent() {
        let client: HeadOnlyClient = HeadOnlyClient::default().with_object("k", 10, &[]);
        let remote: RemoteObjectMetadata = cache().lookup(&client, "b", "k").await.unwrap();
        assert_eq!(remote.size, 10);
        assert!(remote.custom_metadata.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_observes_new_state() {
        let client: HeadOnlyClient = HeadOnlyClient::default();
        let cache: KeyExistenceCache = cache();

        assert!(!cache.lookup(&client, "b", "k").await.unwrap().exists());

        let client: HeadOnlyClient = client.with_object("k", 42, &[]);
        assert!(!cache.lookup(&client, "b", "k").await.unwrap().exists());

        cache.invalidate("b", "k").await;
        assert_eq!(cache.lookup(&client, "b", "k").await.unwrap().size, 42);
    }

    #[tokio::test]
    async fn test_buckets_are_separate() {
        let client: HeadOnlyClient = HeadOnlyClient::default();
        let cache: KeyExistenceCache = cache();

        cache.lookup(&client, "bucket-a", "k").await.unwrap();
        cache.lookup(&client, "bucket-b", "k").await.unwrap();
        assert_eq!(client.heads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let client: HeadOnlyClient = HeadOnlyClient {
            fail: true,
            ..Default::default()
        };
        let cache: KeyExistenceCache = cache();

        assert!(cache.lookup(&client, "b", "k").await.is_err());
        assert!(cache.lookup(&client, "b", "k").await.is_err());
        assert_eq!(client.heads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_does_not_collide_with_other_memoized_calls() {
        let memo: Arc<MemoCache> = Arc::new(MemoCache::in_memory());
        let cache: KeyExistenceCache = KeyExistenceCache::new(Arc::clone(&memo), Duration::from_secs(60));
        let other: MemoOptions = MemoOptions::new("other", Duration::from_secs(60));

        let value: Option<u64> = memo
            .memoize(&other, ("b", "k"), |_: (&str, &str)| async {
                Ok::<u64, StorageError>(7)
            })
            .await
            .unwrap();
        assert_eq!(value, Some(7));

        let client: HeadOnlyClient = HeadOnlyClient::default();
        assert!(!cache.lookup(&client, "b", "k").await.unwrap().exists());
        assert_eq!(client.heads.load(Ordering::SeqCst), 1);
    }
}
