//! Storage traits/interfaces for S3 operations.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::StorageError;

/// Observed state of one object, as returned by a HEAD request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectMetadata {
    /// Stored size in bytes (after any content encoding).
    pub size: u64,
    /// Content type, if the store reports one.
    pub content_type: Option<String>,
    /// Content encoding, if the store reports one.
    pub content_encoding: Option<String>,
    /// User-defined metadata attached at write time.
    pub user_metadata: HashMap<String, String>,
}

/// Everything sent with a single PUT besides bucket and key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutObjectRequest {
    /// Object body.
    pub body: Vec<u8>,
    /// `Content-Encoding` header, e.g. `gzip`.
    pub content_encoding: Option<String>,
    /// `Content-Type` header.
    pub content_type: Option<String>,
    /// User-defined metadata.
    pub metadata: HashMap<String, String>,
}

/// Low-level S3 operations - implemented by each backend.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Fetch an object's size and metadata.
    /// Returns None if the object doesn't exist.
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<Option<ObjectMetadata>, StorageError>;

    /// Upload bytes to S3.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        request: PutObjectRequest,
    ) -> Result<(), StorageError>;

    /// Check that a bucket exists and is reachable.
    /// Returns false if the bucket doesn't exist.
    async fn head_bucket(&self, bucket: &str) -> Result<bool, StorageError>;
}
