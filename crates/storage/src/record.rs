//! Persistence hooks for upload progress.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::types::{ArchiveResult, FileOutcome};

/// Receives per-file and per-archive records as an upload progresses.
///
/// Implemented by the host's persistence layer.
#[async_trait]
pub trait UploadRecorder: Send + Sync {
    /// Record one create/update attempt as soon as it finishes.
    ///
    /// Called for failed writes too, with `outcome.error` set.
    async fn file_upload(&self, outcome: &FileOutcome) -> Result<(), StorageError>;

    /// Mark the archive complete. Only called when no fatal error occurred.
    async fn archive_completed(&self, result: &ArchiveResult) -> Result<(), StorageError>;
}

/// Recorder that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

#[async_trait]
impl UploadRecorder for NoopRecorder {
    async fn file_upload(&self, _outcome: &FileOutcome) -> Result<(), StorageError> {
        Ok(())
    }

    async fn archive_completed(&self, _result: &ArchiveResult) -> Result<(), StorageError> {
        Ok(())
    }
}
