//! Memoization cache for expensive asynchronous calls.
//!
//! Results are stored under a digest of a prefix and the call arguments
//! for a fixed TTL. Entries can be dropped with [`MemoCache::invalidate`]
//! or recomputed with [`MemoCache::refresh`].
//!
//! Memoization is best-effort: two concurrent misses on the same key both
//! run the computation and the last write wins.

mod backend;
mod entry;
mod error;
mod memory;
mod sqlite;

pub use backend::MemoBackend;
pub use entry::{MemoEntry, MemoKey};
pub use error::MemoCacheError;
pub use memory::InMemoryMemoBackend;
pub use sqlite::SqliteMemoBackend;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Observer invoked with the key of a hit or miss.
pub type MemoCallback = Arc<dyn Fn(&MemoKey) + Send + Sync>;

/// Per-function memoization options.
#[derive(Clone)]
pub struct MemoOptions {
    /// Namespace mixed into every key.
    pub prefix: String,
    /// Lifetime of stored results.
    pub ttl: Duration,
    /// When false only a presence marker is stored and hits return None.
    pub store_result: bool,
    /// Called on every hit.
    pub on_hit: Option<MemoCallback>,
    /// Called on every miss, after the computation.
    pub on_miss: Option<MemoCallback>,
}

impl MemoOptions {
    /// Create options with the given prefix and TTL, storing results.
    pub fn new(prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            prefix: prefix.into(),
            ttl,
            store_result: true,
            on_hit: None,
            on_miss: None,
        }
    }

    /// Set whether results are stored.
    pub fn with_store_result(mut self, store_result: bool) -> Self {
        self.store_result = store_result;
        self
    }

    /// Set the hit observer.
    pub fn with_on_hit(mut self, callback: impl Fn(&MemoKey) + Send + Sync + 'static) -> Self {
        self.on_hit = Some(Arc::new(callback));
        self
    }

    /// Set the miss observer.
    pub fn with_on_miss(mut self, callback: impl Fn(&MemoKey) + Send + Sync + 'static) -> Self {
        self.on_miss = Some(Arc::new(callback));
        self
    }
}

impl std::fmt::Debug for MemoOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoOptions")
            .field("prefix", &self.prefix)
            .field("ttl", &self.ttl)
            .field("store_result", &self.store_result)
            .field("on_hit", &self.on_hit.is_some())
            .field("on_miss", &self.on_miss.is_some())
            .finish()
    }
}

/// Memoization cache with configurable backend.
pub struct MemoCache {
    /// The storage backend.
    backend: Box<dyn MemoBackend>,
}

impl MemoCache {
    /// Create a new memo cache with the given backend.
    ///
    /// # Arguments
    /// * `backend` - Storage backend implementation
    pub fn new(backend: impl MemoBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Create a memo cache held in process memory.
    pub fn in_memory() -> Self {
        Self::new(InMemoryMemoBackend::new())
    }

    /// Return the memoized result of `compute(args)`.
    ///
    /// On a hit the computation is skipped. On a miss it runs, its result
    /// is stored for `options.ttl`, and it is returned. Errors from the
    /// computation are returned as-is and never cached.
    ///
    /// # Returns
    /// `Some(value)` on a miss or a stored hit; `None` on a hit when
    /// `options.store_result` is false.
    pub async fn memoize<A, V, E, F, Fut>(
        &self,
        options: &MemoOptions,
        args: A,
        compute: F,
    ) -> Result<Option<V>, E>
    where
        A: Serialize,
        V: Serialize + DeserializeOwned,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let key: MemoKey = match MemoKey::derive(&options.prefix, &args) {
            Ok(key) => key,
            Err(e) => {
                log::warn!(
                    "Cannot derive memo key for {}, calling uncached: {}",
                    options.prefix,
                    e
                );
                return compute(args).await.map(Some);
            }
        };

        if let Some(entry) = self.backend.get(&key, current_epoch_millis()).await {
            if !options.store_result {
                log::debug!("Memo hit {} ({})", key, options.prefix);
                notify(&options.on_hit, &key);
                return Ok(None);
            }
            match entry.value.as_deref().map(serde_json::from_str::<V>) {
                Some(Ok(value)) => {
                    log::debug!("Memo hit {} ({})", key, options.prefix);
                    notify(&options.on_hit, &key);
                    return Ok(Some(value));
                }
                Some(Err(e)) => {
                    log::debug!("Undecodable memo entry {}, recomputing: {}", key, e);
                }
                None => {
                    log::debug!("Memo entry {} holds no value, recomputing", key);
                }
            }
        }

        self.compute_and_store(options, key, args, compute).await
    }

    /// Recompute `compute(args)` and overwrite the stored result,
    /// regardless of any unexpired entry.
    pub async fn refresh<A, V, E, F, Fut>(
        &self,
        options: &MemoOptions,
        args: A,
        compute: F,
    ) -> Result<Option<V>, E>
    where
        A: Serialize,
        V: Serialize + DeserializeOwned,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        match MemoKey::derive(&options.prefix, &args) {
            Ok(key) => self.compute_and_store(options, key, args, compute).await,
            Err(e) => {
                log::warn!(
                    "Cannot derive memo key for {}, calling uncached: {}",
                    options.prefix,
                    e
                );
                compute(args).await.map(Some)
            }
        }
    }

    /// Drop the entry for `args` under `prefix`.
    ///
    /// The next lookup for the same arguments is a guaranteed miss.
    pub async fn invalidate<A: Serialize + ?Sized>(&self, prefix: &str, args: &A) {
        match MemoKey::derive(prefix, args) {
            Ok(key) => {
                log::debug!("Memo invalidate {} ({})", key, prefix);
                self.backend.delete(&key).await;
            }
            Err(e) => log::warn!("Cannot derive memo key for {}: {}", prefix, e),
        }
    }

    /// Drop every entry.
    pub async fn clear(&self) {
        self.backend.clear().await;
    }

    async fn compute_and_store<A, V, E, F, Fut>(
        &self,
        options: &MemoOptions,
        key: MemoKey,
        args: A,
        compute: F,
    ) -> Result<Option<V>, E>
    where
        V: Serialize,
        F: FnOnce(A) -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let value: V = compute(args).await?;

        let stored: Option<String> = if options.store_result {
            match serde_json::to_string(&value) {
                Ok(encoded) => Some(encoded),
                Err(e) => {
                    log::warn!("Cannot encode memo value for {}: {}", options.prefix, e);
                    notify(&options.on_miss, &key);
                    return Ok(Some(value));
                }
            }
        } else {
            None
        };

        let entry: MemoEntry = MemoEntry::new(key, stored, current_epoch_millis(), options.ttl);
        self.backend.put(&entry).await;

        log::debug!("Memo miss {} ({})", entry.key, options.prefix);
        notify(&options.on_miss, &entry.key);
        Ok(Some(value))
    }
}

/// A function bound to a memo cache and its options.
///
/// The prefix is the stable name given at construction, conventionally the
/// function's module path and name. Two wrappers share entries only when
/// they are given the same name.
pub struct Memoized<F> {
    cache: Arc<MemoCache>,
    options: MemoOptions,
    func: F,
}

impl<F> Memoized<F> {
    /// Wrap `func` with the given TTL.
    ///
    /// # Arguments
    /// * `cache` - Shared memo cache
    /// * `name` - Stable identifier of `func`, e.g.
    ///   `concat!(module_path!(), "::lookup_size")`; used as the key prefix
    /// * `ttl` - Lifetime of stored results
    /// * `func` - The wrapped function
    pub fn new(cache: Arc<MemoCache>, name: impl Into<String>, ttl: Duration, func: F) -> Self {
        Self {
            cache,
            options: MemoOptions::new(name, ttl),
            func,
        }
    }

    /// Replace the default prefix.
    ///
    /// Giving two wrappers the same prefix makes them share entries.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.options.prefix = prefix.into();
        self
    }

    /// Set whether results are stored.
    pub fn with_store_result(mut self, store_result: bool) -> Self {
        self.options.store_result = store_result;
        self
    }

    /// Set the hit observer.
    pub fn with_on_hit(mut self, callback: impl Fn(&MemoKey) + Send + Sync + 'static) -> Self {
        self.options = self.options.with_on_hit(callback);
        self
    }

    /// Set the miss observer.
    pub fn with_on_miss(mut self, callback: impl Fn(&MemoKey) + Send + Sync + 'static) -> Self {
        self.options = self.options.with_on_miss(callback);
        self
    }

    /// The key prefix of this wrapper.
    pub fn prefix(&self) -> &str {
        &self.options.prefix
    }

    /// The options used for every call.
    pub fn options(&self) -> &MemoOptions {
        &self.options
    }

    /// Call through the cache.
    pub async fn call<A, V, E, Fut>(&self, args: A) -> Result<Option<V>, E>
    where
        F: Fn(A) -> Fut,
        A: Serialize,
        V: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<V, E>>,
    {
        self.cache.memoize(&self.options, args, &self.func).await
    }

    /// Recompute and overwrite the cached result.
    pub async fn refresh<A, V, E, Fut>(&self, args: A) -> Result<Option<V>, E>
    where
        F: Fn(A) -> Fut,
        A: Serialize,
        V: Serialize + DeserializeOwned,
        Fut: Future<Output = Result<V, E>>,
    {
        self.cache.refresh(&self.options, args, &self.func).await
    }

    /// Drop the cached result for `args`.
    pub async fn invalidate<A: Serialize + ?Sized>(&self, args: &A) {
        self.cache.invalidate(&self.options.prefix, args).await;
    }
}

fn notify(callback: &Option<MemoCallback>, key: &MemoKey) {
    if let Some(callback) = callback {
        callback(key);
    }
}

/// Get current time as epoch milliseconds.
pub(crate) fn current_epoch_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}
