//! Hash computation utilities.
//!
//! Two digests live here with different jobs:
//! - XXH128 (`hash_bytes`, `hash_string`) names memoization cache entries.
//! - MD5 (`md5_bytes`, `md5_file`) fingerprints symbol file contents. The md5
//!   hex digest is what gets written to `original_md5_hash` object metadata, so
//!   it has to stay byte-compatible with objects already in the bucket.

use std::io::Read;
use std::path::Path;

use md5::{Digest, Md5};

/// Compute XXH128 hash of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
///
/// # Returns
/// 32-character lowercase hex string (128 bits).
pub fn hash_bytes(data: &[u8]) -> String {
    let hash: u128 = xxhash_rust::xxh3::xxh3_128(data);
    format!("{:032x}", hash)
}

/// Compute XXH128 hash of a string.
pub fn hash_string(data: &str) -> String {
    hash_bytes(data.as_bytes())
}

/// Compute the md5 hex digest of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
///
/// # Returns
/// 32-character lowercase hex string.
pub fn md5_bytes(data: &[u8]) -> String {
    let mut hasher: Md5Hasher = Md5Hasher::new();
    hasher.update(data);
    hasher.finish_hex()
}

/// Compute the md5 hex digest of a file.
///
/// Reads the file in chunks to avoid loading entire file into memory.
///
/// # Arguments
/// * `path` - Path to the file to hash
///
/// # Returns
/// 32-character lowercase hex string.
///
/// # Errors
/// Returns error if file cannot be read.
pub fn md5_file(path: &Path) -> Result<String, std::io::Error> {
    let mut file: std::fs::File = std::fs::File::open(path)?;
    let mut hasher: Md5Hasher = Md5Hasher::new();
    let mut buffer: Vec<u8> = vec![0u8; 64 * 1024]; // 64KB buffer

    loop {
        let bytes_read: usize = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finish_hex())
}

/// Streaming md5 hasher.
pub struct Md5Hasher {
    inner: Md5,
}

impl Md5Hasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self { inner: Md5::new() }
    }

    /// Update the hasher with additional data.
    ///
    /// # Arguments
    /// * `data` - Bytes to add to the hash computation
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finalize and return the digest as a 32-char hex string.
    pub fn finish_hex(self) -> String {
        self.inner
            .finalize()
            .iter()
            .map(|byte: &u8| format!("{:02x}", byte))
            .collect()
    }
}

impl Default for Md5Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_hash_bytes_length_and_determinism() {
        let hash: String = hash_bytes(b"hello world");
        assert_eq!(hash.len(), 32);
        assert_eq!(hash, hash_bytes(b"hello world"));
    }

    #[test]
    fn test_hash_bytes_different_inputs() {
        assert_ne!(hash_bytes(b"hello"), hash_bytes(b"world"));
    }

    #[test]
    fn test_hash_string_matches_bytes() {
        assert_eq!(hash_string("åäö"), hash_bytes("åäö".as_bytes()));
    }

    #[test]
    fn test_md5_known_vectors() {
        assert_eq!(md5_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            md5_bytes(b"The quick brown fox jumps over the lazy dog"),
            "9e107d9d372bb6826bd81d3542a419d6"
        );
    }

    #[test]
    fn test_md5_incremental_matches_direct() {
        let mut hasher: Md5Hasher = Md5Hasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");
        assert_eq!(hasher.finish_hex(), md5_bytes(b"hello world"));
    }

    #[test]
    fn test_md5_file() {
        let dir: tempfile::TempDir = tempfile::tempdir().unwrap();
        let file_path: std::path::PathBuf = dir.path().join("xpcshell.sym");

        let mut file: std::fs::File = std::fs::File::create(&file_path).unwrap();
        file.write_all(b"MODULE Linux x86_64 A7D6F1BB xpcshell").unwrap();
        drop(file);

        assert_eq!(
            md5_file(&file_path).unwrap(),
            md5_bytes(b"MODULE Linux x86_64 A7D6F1BB xpcshell")
        );
    }

    #[test]
    fn test_md5_file_not_found() {
        assert!(md5_file(Path::new("/nonexistent/file.sym")).is_err());
    }
}
