//! Cached "is this symbol stored" queries.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::error::StorageError;
use crate::memo::{MemoCache, MemoOptions};
use crate::notify::SymbolCacheInvalidator;
use crate::traits::StorageClient;
use crate::types::{BucketLocation, SymbolId};

/// Prefix reserved for symbol lookups in the shared memo cache.
pub const SYMBOL_LOOKUP_PREFIX: &str = "symstash:has-symbol:v1";

/// Prefix of the per-pair generation stamps in the shared memo cache.
pub const SYMBOL_GENERATION_PREFIX: &str = "symstash:has-symbol-generation:v1";

/// Answers `has_symbol` queries through the memo cache.
///
/// Answers are cached per `(module, debug_id, file)` together with the
/// generation of their `(module, debug_id)` pair. Generations live in the
/// memo cache too, so a purge is seen by every process sharing the backend
/// and survives a restart. A generation is a fresh timestamp whenever it is
/// computed, so an expired generation never brings back older answers.
pub struct SymbolLookup<C: StorageClient> {
    client: Arc<C>,
    location: BucketLocation,
    memo: Arc<MemoCache>,
    options: MemoOptions,
    generation_options: MemoOptions,
}

impl<C: StorageClient> SymbolLookup<C> {
    /// Create a lookup service.
    ///
    /// # Arguments
    /// * `client` - Storage client used on a miss
    /// * `location` - Bucket and prefix holding the symbols
    /// * `memo` - Shared memo cache
    /// * `ttl` - How long an answer stays valid
    pub fn new(
        client: Arc<C>,
        location: BucketLocation,
        memo: Arc<MemoCache>,
        ttl: Duration,
    ) -> Self {
        Self {
            client,
            location,
            memo,
            options: MemoOptions::new(SYMBOL_LOOKUP_PREFIX, ttl),
            generation_options: MemoOptions::new(SYMBOL_GENERATION_PREFIX, ttl),
        }
    }

    /// Whether `<module>/<debug_id>/<file>` is stored.
    ///
    /// # Errors
    /// Returns the storage error of the HEAD request on a miss.
    pub async fn has_symbol(
        &self,
        module: &str,
        debug_id: &str,
        file: &str,
    ) -> Result<bool, StorageError> {
        let generation: u64 = self.generation(module, debug_id).await;
        let key: String = self
            .location
            .symbol_key(&format!("{}/{}/{}", module, debug_id, file));
        let client: &C = self.client.as_ref();
        let bucket: &str = self.location.bucket.as_str();

        let found: Option<bool> = self
            .memo
            .memoize(
                &self.options,
                (module, debug_id, file, generation),
                move |_| async move {
                    let head = client.head_object(bucket, &key).await?;
                    Ok::<bool, StorageError>(head.is_some())
                },
            )
            .await?;
        Ok(found.unwrap_or(false))
    }

    async fn generation(&self, module: &str, debug_id: &str) -> u64 {
        let stamp: Result<Option<u64>, Infallible> = self
            .memo
            .memoize(&self.generation_options, (module, debug_id), |_| async {
                Ok(generation_stamp())
            })
            .await;
        match stamp {
            Ok(generation) => generation.unwrap_or_else(generation_stamp),
            Err(never) => match never {},
        }
    }
}

#[async_trait]
impl<C: StorageClient> SymbolCacheInvalidator for SymbolLookup<C> {
    async fn invalidate(&self, symbols: &[SymbolId]) {
        for symbol in symbols {
            let bumped: Result<Option<u64>, Infallible> = self
                .memo
                .refresh(
                    &self.generation_options,
                    (symbol.module.as_str(), symbol.debug_id.as_str()),
                    |_| async { Ok(generation_stamp()) },
                )
                .await;
            if let Ok(Some(generation)) = bumped {
                log::debug!(
                    "Symbol lookup generation of {}/{} is now {}",
                    symbol.module,
                    symbol.debug_id,
                    generation
                );
            }
        }
        log::debug!("Invalidated {} symbol lookup pair(s)", symbols.len());
    }
}

/// Nanoseconds since the epoch, unique enough to never repeat a generation.
fn generation_stamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
