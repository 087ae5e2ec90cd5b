//! Shared constants used across symstash crates.

/// Version segment inserted between the bucket prefix and the symbol name.
pub const SYMBOL_KEY_VERSION: &str = "v0";

/// Object metadata key holding the size of the bytes before compression.
pub const METADATA_ORIGINAL_SIZE: &str = "original_size";

/// Object metadata key holding the md5 hex digest of the bytes before compression.
pub const METADATA_ORIGINAL_MD5_HASH: &str = "original_md5_hash";

/// Content encoding used for compressed symbol objects.
pub const GZIP_CONTENT_ENCODING: &str = "gzip";

/// Default number of files processed in parallel per archive.
pub const DEFAULT_UPLOAD_CONCURRENCY: usize = 8;

/// Default time-to-live for cached object existence lookups, in
/// milliseconds (5 minutes).
pub const DEFAULT_EXISTENCE_CACHE_TTL_MS: u64 = 300_000;

/// Default capacity of the invalidation signal queue.
pub const DEFAULT_NOTIFY_QUEUE_CAPACITY: usize = 64;

/// Suffix of top-level build listing files that ride along in archives.
pub const SYMBOLS_LISTING_SUFFIX: &str = "-symbols.txt";
