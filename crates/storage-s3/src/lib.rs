//! AWS SDK S3 backend for symstash storage.
//!
//! This crate provides a `StorageClient` implementation using the AWS SDK for Rust.
//! Custom endpoints and path-style addressing make it usable against
//! S3-compatible stores as well.
//!
//! # Example
//!
//! ```ignore
//! use symstash_storage_s3::{S3Settings, S3StorageClient};
//! use symstash_storage::{
//!     ArchiveUploader, BucketLocation, KeyExistenceCache, MemoCache, UploadSettings,
//! };
//!
//! let settings = UploadSettings::default();
//! let client = S3StorageClient::new(S3Settings::default()).await?;
//! let existence = KeyExistenceCache::from_settings(Arc::new(MemoCache::in_memory()), &settings);
//! let uploader = ArchiveUploader::new(&client, BucketLocation::new("symbols", ""), &existence)
//!     .with_settings(settings);
//! ```

mod client;
mod error;
mod settings;

pub use client::S3StorageClient;
pub use error::{classify_service_error, S3Error};
pub use settings::{S3Credentials, S3Settings};
