//! Memo cache backend trait.

use async_trait::async_trait;

use super::entry::{MemoEntry, MemoKey};

/// Pluggable storage for memoized results.
///
/// Implementations handle their own error recovery: a failing backend
/// behaves like an empty cache rather than failing the memoized call.
#[async_trait]
pub trait MemoBackend: Send + Sync {
    /// Look up an unexpired entry.
    ///
    /// # Arguments
    /// * `key` - The cache key
    /// * `now_ms` - Current time (epoch milliseconds) used for expiry
    ///
    /// # Returns
    /// The cached entry if present and live, None otherwise.
    /// Returns None on error (graceful degradation).
    async fn get(&self, key: &MemoKey, now_ms: i64) -> Option<MemoEntry>;

    /// Store an entry, replacing any previous one for the same key.
    ///
    /// Silently fails on error.
    async fn put(&self, entry: &MemoEntry);

    /// Remove an entry.
    async fn delete(&self, key: &MemoKey);

    /// Clear all entries.
    async fn clear(&self);
}
