//! In-process memo backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::backend::MemoBackend;
use super::entry::{MemoEntry, MemoKey};

/// Memo backend held in process memory.
///
/// Expired entries are dropped lazily when they are looked up.
#[derive(Default)]
pub struct InMemoryMemoBackend {
    entries: Mutex<HashMap<MemoKey, MemoEntry>>,
}

impl InMemoryMemoBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether the backend holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<MemoKey, MemoEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl MemoBackend for InMemoryMemoBackend {
    async fn get(&self, key: &MemoKey, now_ms: i64) -> Option<MemoEntry> {
        let mut entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now_ms) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    async fn put(&self, entry: &MemoEntry) {
        self.entries().insert(entry.key.clone(), entry.clone());
    }

    async fn delete(&self, key: &MemoKey) {
        self.entries().remove(key);
    }

    async fn clear(&self) {
        self.entries().clear();
    }
}
