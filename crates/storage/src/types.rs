//! Shared data structures for the upload pipeline.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use symstash_common::{
    extension_lowercase, split_symbol_name, SymbolPath, DEFAULT_EXISTENCE_CACHE_TTL_MS,
    DEFAULT_NOTIFY_QUEUE_CAPACITY, DEFAULT_UPLOAD_CONCURRENCY, SYMBOLS_LISTING_SUFFIX,
    SYMBOL_KEY_VERSION,
};

use crate::decision::UploadDecision;
use crate::error::{FileError, StorageError};

/// Configuration settings for archive uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadSettings {
    /// Maximum number of files processed in parallel.
    pub max_concurrency: usize,
    /// Lifetime of cached existence lookups, in milliseconds.
    pub existence_cache_ttl_ms: u64,
    /// Extensions (without dot, case-insensitive) stored gzip-encoded.
    pub compress_extensions: Vec<String>,
    /// Extension (without dot, case-insensitive) to content type.
    pub mime_overrides: BTreeMap<String, String>,
    /// Substrings that may not appear in any archive member name.
    pub disallowed_snippets: Vec<String>,
    /// Top-level files ending with this suffix are ignored, not uploaded.
    pub ignore_suffix: String,
    /// Capacity of the invalidation signal queue.
    pub notify_queue_capacity: usize,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_UPLOAD_CONCURRENCY,
            existence_cache_ttl_ms: DEFAULT_EXISTENCE_CACHE_TTL_MS,
            compress_extensions: vec!["sym".to_string()],
            mime_overrides: BTreeMap::from([("sym".to_string(), "text/plain".to_string())]),
            disallowed_snippets: Vec::new(),
            ignore_suffix: SYMBOLS_LISTING_SUFFIX.to_string(),
            notify_queue_capacity: DEFAULT_NOTIFY_QUEUE_CAPACITY,
        }
    }
}

impl UploadSettings {
    /// Create settings with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum concurrency for parallel file processing.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    /// Set the existence cache TTL.
    ///
    /// Entries expire with millisecond resolution; a non-zero TTL shorter
    /// than one millisecond is rounded up to one.
    pub fn with_existence_cache_ttl(mut self, ttl: Duration) -> Self {
        let millis: u64 = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self.existence_cache_ttl_ms = if millis == 0 && !ttl.is_zero() {
            1
        } else {
            millis
        };
        self
    }

    /// Set the capacity of the invalidation signal queue.
    pub fn with_notify_queue_capacity(mut self, capacity: usize) -> Self {
        self.notify_queue_capacity = capacity;
        self
    }

    /// Set the extensions stored gzip-encoded.
    pub fn with_compress_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compress_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Add a content type override for an extension.
    pub fn with_mime_override(
        mut self,
        extension: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        self.mime_overrides
            .insert(extension.into().to_ascii_lowercase(), content_type.into());
        self
    }

    /// Set the forbidden name snippets.
    pub fn with_disallowed_snippets<I, S>(mut self, snippets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.disallowed_snippets = snippets.into_iter().map(Into::into).collect();
        self
    }

    /// Existence cache TTL as a Duration.
    pub fn existence_cache_ttl(&self) -> Duration {
        Duration::from_millis(self.existence_cache_ttl_ms)
    }

    /// Whether a key with this name is stored gzip-encoded.
    pub fn should_compress(&self, name: &str) -> bool {
        match extension_lowercase(name) {
            Some(ext) => self
                .compress_extensions
                .iter()
                .any(|candidate: &String| candidate.eq_ignore_ascii_case(&ext)),
            None => false,
        }
    }

    /// Content type override for a name, if any.
    pub fn content_type_for(&self, name: &str) -> Option<&str> {
        let ext: String = extension_lowercase(name)?;
        self.mime_overrides
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(&ext))
            .map(|(_, content_type)| content_type.as_str())
    }

    /// Whether an archive member is excluded from upload.
    ///
    /// Only top-level files are eligible, e.g. `build-symbols.txt`.
    pub fn is_ignored(&self, name: &str) -> bool {
        !self.ignore_suffix.is_empty() && !name.contains('/') && name.ends_with(&self.ignore_suffix)
    }
}

/// Destination bucket and key prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketLocation {
    /// S3 bucket name.
    pub bucket: String,
    /// Key prefix placed before the version segment; may be empty.
    pub prefix: String,
}

impl BucketLocation {
    /// Create a new bucket location.
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
        }
    }

    /// Full storage key for a symbol name.
    /// Returns: "{prefix}/v0/{name}"
    pub fn symbol_key(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            format!("{}/{}", SYMBOL_KEY_VERSION, name)
        } else {
            format!("{}/{}/{}", self.prefix, SYMBOL_KEY_VERSION, name)
        }
    }
}

/// A `(module, debug_id)` pair identifying one set of debug symbols.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId {
    /// Debug file name of the module.
    pub module: String,
    /// Debug identifier.
    pub debug_id: String,
}

impl SymbolId {
    /// Create a new symbol id.
    pub fn new(module: impl Into<String>, debug_id: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            debug_id: debug_id.into(),
        }
    }

    /// Derive the pair from a `<module>/<debug_id>/<file>` name.
    pub fn from_name(name: &str) -> Option<Self> {
        split_symbol_name(name).map(|parts: SymbolPath| Self::new(parts.module, parts.debug_id))
    }
}

/// One file extracted from an archive, ready for the decision engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Relative POSIX name inside the archive.
    pub name: String,
    /// Destination key in the bucket.
    pub storage_key: String,
    /// Where the extracted bytes live on disk.
    pub local_path: PathBuf,
    /// Size of the original bytes.
    pub local_size: u64,
    /// md5 hex digest of the original bytes.
    pub local_content_hash: String,
    /// Whether the key is written gzip-encoded.
    pub compressed: bool,
}

impl FileCandidate {
    /// The symbol pair this file belongs to, if its name has that shape.
    pub fn symbol_id(&self) -> Option<SymbolId> {
        SymbolId::from_name(&self.name)
    }
}

/// Observed state of a storage key at lookup time.
///
/// `size == 0` means the object does not exist.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteObjectMetadata {
    /// Stored size in bytes.
    pub size: u64,
    /// User metadata, absent when the object carries none.
    pub custom_metadata: Option<HashMap<String, String>>,
}

impl RemoteObjectMetadata {
    /// The state of a key that does not exist.
    pub fn not_found() -> Self {
        Self::default()
    }

    /// Whether the object exists.
    pub fn exists(&self) -> bool {
        self.size > 0
    }
}

/// Result of attempting to write one file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    /// Destination key.
    pub key: String,
    /// Archive member name.
    pub name: String,
    /// Why the file was written.
    pub decision: UploadDecision,
    /// Whether the body was gzip-encoded.
    pub compressed: bool,
    /// True when an existing object was replaced.
    pub update: bool,
    /// Bytes sent to the store.
    pub final_size: u64,
    /// When the write finished (epoch seconds); None if it failed.
    pub completed_at: Option<i64>,
    /// The write error, if any.
    pub error: Option<StorageError>,
    /// Symbol pair derived from the name.
    pub symbol: Option<SymbolId>,
}

impl FileOutcome {
    /// Whether the object was written successfully.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated result of processing one archive.
#[derive(Debug, Clone, Default)]
pub struct ArchiveResult {
    /// Keys left untouched because the stored copy is unchanged.
    pub skipped_keys: Vec<String>,
    /// Member names excluded by policy.
    pub ignored_keys: Vec<String>,
    /// Create/update attempts, including failed ones.
    pub uploaded: Vec<FileOutcome>,
    /// Keys never decided because the archive was aborted.
    pub unprocessed_keys: Vec<String>,
    /// First fatal error observed.
    pub first_error: Option<FileError>,
}

impl ArchiveResult {
    /// Whether the archive may be marked complete.
    pub fn is_complete(&self) -> bool {
        self.first_error.is_none()
    }

    /// Keys of successfully written files.
    pub fn uploaded_keys(&self) -> Vec<&str> {
        self.uploaded
            .iter()
            .filter(|o: &&FileOutcome| o.is_success())
            .map(|o: &FileOutcome| o.key.as_str())
            .collect()
    }

    /// Deduplicated symbol pairs of every successfully written file.
    pub fn changed_symbols(&self) -> BTreeSet<SymbolId> {
        self.uploaded
            .iter()
            .filter(|o: &&FileOutcome| o.is_success())
            .filter_map(|o: &FileOutcome| o.symbol.clone())
            .collect()
    }

    /// Sort every list by key so the result does not depend on scheduling.
    pub(crate) fn normalize(&mut self) {
        self.skipped_keys.sort();
        self.ignored_keys.sort();
        self.unprocessed_keys.sort();
        self.uploaded.sort_by(|a: &FileOutcome, b: &FileOutcome| a.key.cmp(&b.key));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::DecisionReason;

    #[test]
    fn test_symbol_key_with_prefix() {
        let loc = BucketLocation::new("private", "prefix");
        assert_eq!(
            loc.symbol_key("xpcshell.dbg/A7D6F1BB18CD4CB48/xpcshell.sym"),
            "prefix/v0/xpcshell.dbg/A7D6F1BB18CD4CB48/xpcshell.sym"
        );
    }

    #[test]
    fn test_symbol_key_empty_prefix() {
        let loc = BucketLocation::new("mybucket", "");
        assert_eq!(
            loc.symbol_key("south-africa-flag/deadbeef/south-africa-flag.jpeg"),
            "v0/south-africa-flag/deadbeef/south-africa-flag.jpeg"
        );
    }

    #[test]
    fn test_symbol_key_trims_slashes() {
        let loc = BucketLocation::new("b", "/nested/prefix/");
        assert_eq!(loc.symbol_key("a/b/c"), "nested/prefix/v0/a/b/c");
    }

    #[test]
    fn test_should_compress_case_insensitive() {
        let settings = UploadSettings::default().with_compress_extensions(["bar"]);
        assert!(settings.should_compress("foo.bar"));
        assert!(settings.should_compress("foo.BAR"));
        assert!(!settings.should_compress("foo.exe"));
    }

    #[test]
    fn test_content_type_for() {
        let settings = UploadSettings {
            mime_overrides: BTreeMap::new(),
            ..UploadSettings::default()
        }
        .with_mime_override("html", "text/html");
        assert_eq!(settings.content_type_for("foo.bar"), None);
        assert_eq!(settings.content_type_for("foo.html"), Some("text/html"));
        assert_eq!(settings.content_type_for("foo.HTML"), Some("text/html"));
    }

    #[test]
    fn test_is_ignored() {
        let settings = UploadSettings::default();
        assert!(settings.is_ignored("build-symbols.txt"));
        assert!(!settings.is_ignored("xpcshell.dbg/A7D6/xpcshell.sym"));
        assert!(!settings.is_ignored("nested/build-symbols.txt"));
    }

    #[test]
    fn test_settings_deserialize_partial() {
        let settings: UploadSettings =
            serde_json::from_str(r#"{"max_concurrency": 2, "compress_extensions": ["sym", "pdb"]}"#)
                .unwrap();
        assert_eq!(settings.max_concurrency, 2);
        assert!(settings.should_compress("a/b/c.pdb"));
        assert_eq!(settings.existence_cache_ttl_ms, DEFAULT_EXISTENCE_CACHE_TTL_MS);
        assert_eq!(settings.existence_cache_ttl(), Duration::from_secs(300));
    }

    #[test]
    fn test_existence_cache_ttl_keeps_sub_second_values() {
        let settings = UploadSettings::new().with_existence_cache_ttl(Duration::from_millis(250));
        assert_eq!(settings.existence_cache_ttl(), Duration::from_millis(250));

        let settings = UploadSettings::new().with_existence_cache_ttl(Duration::from_micros(10));
        assert_eq!(settings.existence_cache_ttl(), Duration::from_millis(1));

        let settings = UploadSettings::new().with_existence_cache_ttl(Duration::ZERO);
        assert_eq!(settings.existence_cache_ttl(), Duration::ZERO);

        let settings: UploadSettings =
            serde_json::from_str(r#"{"existence_cache_ttl_ms": 1500}"#).unwrap();
        assert_eq!(settings.existence_cache_ttl(), Duration::from_millis(1500));
    }

    #[test]
    fn test_changed_symbols_dedup_and_success_only() {
        let outcome = |key: &str, name: &str, error: Option<StorageError>| FileOutcome {
            key: key.to_string(),
            name: name.to_string(),
            decision: UploadDecision::Create(DecisionReason::NotFound),
            compressed: false,
            update: false,
            final_size: 1,
            completed_at: if error.is_none() { Some(1) } else { None },
            error,
            symbol: SymbolId::from_name(name),
        };
        let result = ArchiveResult {
            uploaded: vec![
                outcome("v0/m/ID/a.sym", "m/ID/a.sym", None),
                outcome("v0/m/ID/b.txt", "m/ID/b.txt", None),
                outcome(
                    "v0/n/ID2/c.sym",
                    "n/ID2/c.sym",
                    Some(StorageError::Other {
                        message: "boom".into(),
                    }),
                ),
            ],
            ..ArchiveResult::default()
        };

        let symbols: Vec<SymbolId> = result.changed_symbols().into_iter().collect();
        assert_eq!(symbols, vec![SymbolId::new("m", "ID")]);
        assert_eq!(result.uploaded_keys(), vec!["v0/m/ID/a.sym", "v0/m/ID/b.txt"]);
    }
}
