//! Error types for storage and upload operations.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Object or bucket not found.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access denied.
    #[error("Access denied to s3://{bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Network error.
    #[error("Network error: {message}")]
    NetworkError { message: String, retryable: bool },

    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    IoError { path: String, message: String },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// Check if this error is retryable.
    ///
    /// Nothing in this crate retries; the flag is for callers and clients.
    pub fn is_retryable(&self) -> bool {
        match self {
            StorageError::NetworkError { retryable, .. } => *retryable,
            StorageError::NotFound { .. } => false,
            StorageError::AccessDenied { .. } => false,
            StorageError::IoError { .. } => false,
            StorageError::InvalidConfig { .. } => false,
            StorageError::Other { .. } => false,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

/// Archive-level validation failures, raised before any upload work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArchiveError {
    /// The uploaded file name does not carry a known archive extension.
    #[error("Unrecognized archive file extension \"{extension}\"")]
    UnrecognizedExtension { extension: String },

    /// A member name contains a character outside the allowed set.
    #[error("Invalid character in filename '{name}'")]
    InvalidCharacter { name: String },

    /// A member name contains a configured forbidden snippet.
    #[error("Content of archive file contains the snippet '{snippet}' which is not allowed")]
    DisallowedSnippet { snippet: String },

    /// A member name matches neither accepted layout.
    #[error(
        "Unrecognized file pattern. Should only be <module>/<hex>/<file> or \
         <name>-symbols.txt and nothing else."
    )]
    UnrecognizedPattern { name: String },

    /// The archive holds no files.
    #[error("Archive contains no files")]
    Empty,

    /// The extracted archive could not be read.
    #[error("I/O error for {path}: {message}")]
    Io { path: String, message: String },
}

/// Failure of one file inside an archive upload.
#[derive(Debug, Clone)]
pub struct FileError {
    /// The storage key that failed.
    pub key: String,
    /// The error that occurred.
    pub error: StorageError,
}

impl FileError {
    /// Create a new file error.
    pub fn new(key: impl Into<String>, error: StorageError) -> Self {
        Self {
            key: key.into(),
            error,
        }
    }
}

/// The invalidation channel could not accept a signal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// The consumer task is gone.
    #[error("Invalidation channel is closed")]
    Closed,
}

/// Errors surfaced to the caller of an archive upload.
#[derive(Error, Debug)]
pub enum UploadError {
    /// The archive or one of its members failed validation.
    #[error(transparent)]
    Validation(#[from] ArchiveError),

    /// The configured destination bucket does not exist.
    #[error("Bucket {bucket} does not exist")]
    BucketNotFound { bucket: String },

    /// A file could not be looked up or written; the archive was aborted.
    #[error("Upload of {key} failed: {source}")]
    FatalWrite {
        key: String,
        #[source]
        source: StorageError,
    },

    /// The invalidation signal could not be handed off.
    #[error(transparent)]
    Notify(#[from] NotifyError),

    /// Storage error outside of any single file.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<FileError> for UploadError {
    fn from(err: FileError) -> Self {
        UploadError::FatalWrite {
            key: err.key,
            source: err.error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_error_messages() {
        let err = ArchiveError::UnrecognizedExtension {
            extension: ".rar".to_string(),
        };
        assert_eq!(err.to_string(), "Unrecognized archive file extension \".rar\"");

        let err = ArchiveError::InvalidCharacter {
            name: "xpcfoo.dbg/A7D6F1BB18CD4CB48/p%eter.sym".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid character in filename 'xpcfoo.dbg/A7D6F1BB18CD4CB48/p%eter.sym'"
        );

        let err = ArchiveError::DisallowedSnippet {
            snippet: "xpcshell.sym".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Content of archive file contains the snippet 'xpcshell.sym' which is not allowed"
        );

        let err = ArchiveError::UnrecognizedPattern {
            name: "foo/bar.sym".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unrecognized file pattern. Should only be <module>/<hex>/<file> or \
             <name>-symbols.txt and nothing else."
        );
    }

    #[test]
    fn test_file_error_into_upload_error() {
        let err: UploadError = FileError::new(
            "v0/a/b/c.sym",
            StorageError::Other {
                message: "stop!".to_string(),
            },
        )
        .into();
        match err {
            UploadError::FatalWrite { key, source } => {
                assert_eq!(key, "v0/a/b/c.sym");
                assert_eq!(source.to_string(), "stop!");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_retryable() {
        assert!(StorageError::NetworkError {
            message: "timeout".into(),
            retryable: true
        }
        .is_retryable());
        assert!(!StorageError::NotFound {
            bucket: "b".into(),
            key: "k".into()
        }
        .is_retryable());
    }
}
