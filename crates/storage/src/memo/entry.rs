//! Memo cache key and entry types.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use symstash_common::hash_string;

/// Digest identifying one memoized call.
///
/// Derived from a prefix and the canonical JSON form of the arguments.
/// Object keys are emitted sorted, so keyword-style arguments given in any
/// order produce the same key while positional tuples stay order-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemoKey(String);

impl MemoKey {
    /// Derive the key for a call.
    ///
    /// # Arguments
    /// * `prefix` - Namespace of the memoized function
    /// * `args` - Call arguments
    ///
    /// # Errors
    /// Returns the serializer error if the arguments cannot be expressed as JSON.
    pub fn derive<A: Serialize + ?Sized>(prefix: &str, args: &A) -> Result<Self, serde_json::Error> {
        let canonical: serde_json::Value = serde_json::to_value(args)?;
        let encoded: String = serde_json::to_string(&canonical)?;
        let mut material: String = String::with_capacity(prefix.len() + 1 + encoded.len());
        material.push_str(prefix);
        material.push('\0');
        material.push_str(&encoded);
        Ok(Self(hash_string(&material)))
    }

    /// Wrap an already computed digest.
    pub fn from_digest(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MemoKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored memo result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoEntry {
    /// Cache key.
    pub key: MemoKey,
    /// JSON-encoded value; None for a presence marker.
    pub value: Option<String>,
    /// Creation time (epoch milliseconds).
    pub created_at_ms: i64,
    /// Expiry time (epoch milliseconds).
    pub expires_at_ms: i64,
}

impl MemoEntry {
    /// Create an entry that lives for `ttl` from `now_ms`.
    pub fn new(key: MemoKey, value: Option<String>, now_ms: i64, ttl: Duration) -> Self {
        let ttl_ms: i64 = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        Self {
            key,
            value,
            created_at_ms: now_ms,
            expires_at_ms: now_ms.saturating_add(ttl_ms),
        }
    }

    /// Whether the entry is past its expiry at `now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}
