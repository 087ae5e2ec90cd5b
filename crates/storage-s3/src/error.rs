//! Error types for S3 storage operations.

use aws_sdk_s3::error::ProvideErrorMetadata;
use symstash_storage::StorageError;
use thiserror::Error;

/// Errors specific to the S3 storage client.
#[derive(Error, Debug)]
pub enum S3Error {
    /// AWS SDK error.
    #[error("AWS SDK error: {message}")]
    SdkError { message: String, retryable: bool },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<S3Error> for StorageError {
    fn from(err: S3Error) -> Self {
        match err {
            S3Error::SdkError { message, retryable } => {
                StorageError::NetworkError { message, retryable }
            }
            S3Error::ConfigError(message) => StorageError::InvalidConfig { message },
        }
    }
}

/// Map an S3 service error to a `StorageError`.
///
/// Not-found responses are handled by the callers, which turn them into
/// regular answers.
pub fn classify_service_error<E>(bucket: &str, key: &str, err: &E) -> StorageError
where
    E: ProvideErrorMetadata + std::fmt::Display,
{
    let message: String = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string());

    match err.code() {
        Some("AccessDenied") | Some("Forbidden") | Some("AllAccessDisabled") => {
            StorageError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
                message,
            }
        }
        Some("SlowDown") | Some("InternalError") | Some("ServiceUnavailable")
        | Some("RequestTimeout") => StorageError::NetworkError {
            message,
            retryable: true,
        },
        _ => S3Error::SdkError {
            message,
            retryable: false,
        }
        .into(),
    }
}
