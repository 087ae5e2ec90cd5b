//! Shared types and utilities for symstash.
//!
//! This crate provides common functionality used across all symstash crates:
//! - Cache-key and content digests
//! - Symbol path parsing helpers
//! - Shared constants and error types

pub mod constants;
pub mod error;
pub mod hash;
pub mod path_utils;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::PathError;
pub use hash::{hash_bytes, hash_string, md5_bytes, md5_file, Md5Hasher};
pub use path_utils::{
    extension_lowercase, is_hex, relative_posix_name, split_symbol_name, to_posix_path,
    SymbolPath,
};
