//! Change-aware upload pipeline for debug-symbol archives.
//!
//! This crate decides, for every file extracted from a symbol archive,
//! whether the object already stored under its key is unchanged, and
//! writes only new or changed files. It works with any [`StorageClient`]
//! implementation.
//!
//! # Caching
//!
//! - **Memo Cache** - Generic TTL memoization with invalidate/refresh and
//!   hit/miss observers, backed by memory or SQLite
//! - **Key Existence Cache** - Memoized HEAD lookups so repeated uploads of
//!   the same key do not hit the store within the TTL
//!
//! # Pipeline
//!
//! [`ArchiveListing`] and [`validate_listing`] check an extracted archive,
//! [`build_candidates`] turns it into [`FileCandidate`]s, and
//! [`ArchiveUploader`] decides and writes them concurrently. After a
//! successful archive the [`InvalidationNotifier`] announces the changed
//! `(module, debug_id)` pairs.

mod archive;
mod decision;
mod error;
mod existence;
mod lookup;
pub mod memo;
mod notify;
mod payload;
mod record;
mod traits;
mod types;
mod upload;

pub use archive::{
    build_candidates, validate_archive_filename, validate_listing, ArchiveListing, ArchiveMember,
    ACCEPTED_ARCHIVE_SUFFIXES,
};
pub use decision::{decide, needs_stored_size, DecisionReason, UploadDecision};
pub use error::{ArchiveError, FileError, NotifyError, StorageError, UploadError};
pub use existence::{CacheCounters, KeyExistenceCache, KEY_EXISTENCE_PREFIX};
pub use lookup::{SymbolLookup, SYMBOL_GENERATION_PREFIX, SYMBOL_LOOKUP_PREFIX};
pub use memo::{
    InMemoryMemoBackend, MemoBackend, MemoCache, MemoCacheError, MemoCallback, MemoEntry, MemoKey,
    MemoOptions, Memoized, SqliteMemoBackend,
};
pub use notify::{InvalidationNotifier, SymbolCacheInvalidator};
pub use payload::{gzip_bytes, integrity_metadata, prepare_payload, PreparedPayload};
pub use record::{NoopRecorder, UploadRecorder};
pub use traits::{ObjectMetadata, PutObjectRequest, StorageClient};
pub use types::{
    ArchiveResult, BucketLocation, FileCandidate, FileOutcome, RemoteObjectMetadata, SymbolId,
    UploadSettings,
};
pub use upload::ArchiveUploader;
