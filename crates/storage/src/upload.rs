//! Upload orchestration for symbol archives.
//!
//! For every candidate of one archive the uploader:
//!
//! - looks up the stored state through the [`KeyExistenceCache`]
//! - decides skip/create/update with [`decide`]
//! - writes the payload when needed and forgets the cached state of the key
//! - reports each write to the [`UploadRecorder`] as it finishes
//!
//! Files run concurrently, bounded by `UploadSettings::max_concurrency`.
//! The first lookup or write failure stops dispatching new files; files
//! already running finish normally. Only an archive without failures is
//! marked complete and announced to the [`InvalidationNotifier`].
//!
//! # Example
//!
//! ```ignore
//! use symstash_storage::{ArchiveUploader, BucketLocation, KeyExistenceCache};
//!
//! let uploader = ArchiveUploader::new(&client, location, &existence)
//!     .with_recorder(&recorder)
//!     .with_notifier(notifier);
//! let result = uploader.process(candidates).await?;
//! ```

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use futures::stream::{self, StreamExt};

use crate::decision::{decide, needs_stored_size, UploadDecision};
use crate::error::{FileError, StorageError, UploadError};
use crate::existence::KeyExistenceCache;
use crate::notify::InvalidationNotifier;
use crate::payload::{prepare_payload, PreparedPayload};
use crate::record::{NoopRecorder, UploadRecorder};
use crate::traits::StorageClient;
use crate::types::{ArchiveResult, BucketLocation, FileCandidate, FileOutcome, SymbolId, UploadSettings};

/// What happened to one dispatched candidate.
enum FileResult {
    /// Stored copy is unchanged.
    Skipped(String),
    /// A create or update was attempted.
    Written(FileOutcome),
    /// Never decided: the archive was aborted before this file started.
    Unprocessed(String),
    /// The existence lookup or payload preparation failed.
    Failed(FileError),
}

/// Uploads the files of one archive using any StorageClient implementation.
pub struct ArchiveUploader<'a, C: StorageClient> {
    /// The storage client for S3 operations.
    client: &'a C,
    /// Destination bucket and prefix.
    location: BucketLocation,
    /// Process-wide existence cache.
    existence: &'a KeyExistenceCache,
    /// Upload settings.
    settings: UploadSettings,
    /// Persistence hooks.
    recorder: &'a dyn UploadRecorder,
    /// Optional invalidation channel.
    notifier: Option<InvalidationNotifier>,
}

impl<'a, C: StorageClient> ArchiveUploader<'a, C> {
    /// Create a new archive uploader.
    ///
    /// # Arguments
    /// * `client` - Storage client for S3 operations
    /// * `location` - Destination bucket and prefix
    /// * `existence` - Shared existence cache
    pub fn new(client: &'a C, location: BucketLocation, existence: &'a KeyExistenceCache) -> Self {
        Self {
            client,
            location,
            existence,
            settings: UploadSettings::default(),
            recorder: &NoopRecorder,
            notifier: None,
        }
    }

    /// Set upload settings.
    pub fn with_settings(mut self, settings: UploadSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Set the recorder receiving per-file and per-archive records.
    pub fn with_recorder(mut self, recorder: &'a dyn UploadRecorder) -> Self {
        self.recorder = recorder;
        self
    }

    /// Set the channel announcing changed symbols.
    pub fn with_notifier(mut self, notifier: InvalidationNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Upload an archive's candidates and complete the archive.
    ///
    /// On success the archive is handed to `UploadRecorder::archive_completed`
    /// and, when anything was written, one invalidation signal carrying the
    /// changed `(module, debug_id)` pairs is queued.
    ///
    /// # Errors
    /// - `UploadError::BucketNotFound` if the bucket does not exist
    /// - `UploadError::FatalWrite` naming the first file that failed; the
    ///   archive is not completed
    /// - `UploadError::Notify` / `UploadError::Storage` if completion fails
    pub async fn process(&self, candidates: Vec<FileCandidate>) -> Result<ArchiveResult, UploadError> {
        self.check_bucket().await?;

        let result: ArchiveResult = self.upload_candidates(candidates).await;
        if let Some(ref error) = result.first_error {
            log::warn!(
                "Archive upload to {} aborted by {}: {}",
                self.location.bucket,
                error.key,
                error.error
            );
            return Err(error.clone().into());
        }

        let changed: BTreeSet<SymbolId> = result.changed_symbols();
        if let Some(ref notifier) = self.notifier {
            if !changed.is_empty() {
                notifier.notify(changed).await?;
            }
        }

        self.recorder.archive_completed(&result).await?;
        log::info!(
            "Archive complete: {} uploaded, {} skipped, {} ignored",
            result.uploaded.len(),
            result.skipped_keys.len(),
            result.ignored_keys.len()
        );
        Ok(result)
    }

    /// Fail unless the destination bucket exists.
    ///
    /// # Errors
    /// Returns `UploadError::BucketNotFound` or the storage error.
    pub async fn check_bucket(&self) -> Result<(), UploadError> {
        if self.client.head_bucket(&self.location.bucket).await? {
            Ok(())
        } else {
            Err(UploadError::BucketNotFound {
                bucket: self.location.bucket.clone(),
            })
        }
    }

    /// Run the per-file pipeline for every candidate and aggregate.
    ///
    /// Never completes the archive or sends a signal; a failure shows up
    /// in `ArchiveResult::first_error`.
    pub async fn upload_candidates(&self, candidates: Vec<FileCandidate>) -> ArchiveResult {
        let mut result: ArchiveResult = ArchiveResult::default();

        let (ignored, dispatched): (Vec<FileCandidate>, Vec<FileCandidate>) = candidates
            .into_iter()
            .partition(|c: &FileCandidate| self.settings.is_ignored(&c.name));
        result.ignored_keys = ignored.into_iter().map(|c: FileCandidate| c.name).collect();

        let aborted: Arc<AtomicBool> = Arc::new(AtomicBool::new(false));
        let max_concurrency: usize = self.settings.max_concurrency.max(1);

        let results: Vec<FileResult> = stream::iter(dispatched)
            .map(|candidate: FileCandidate| {
                let aborted = Arc::clone(&aborted);

                async move {
                    if aborted.load(Ordering::Relaxed) {
                        return FileResult::Unprocessed(candidate.storage_key);
                    }

                    let file_result: FileResult = self.process_file(&candidate).await;
                    let failed: bool = match &file_result {
                        FileResult::Failed(_) => true,
                        FileResult::Written(outcome) => !outcome.is_success(),
                        _ => false,
                    };
                    if failed {
                        aborted.store(true, Ordering::Relaxed);
                    }
                    file_result
                }
            })
            .buffer_unordered(max_concurrency)
            .collect()
            .await;

        for file_result in results {
            match file_result {
                FileResult::Skipped(key) => result.skipped_keys.push(key),
                FileResult::Unprocessed(key) => result.unprocessed_keys.push(key),
                FileResult::Failed(error) => {
                    result.unprocessed_keys.push(error.key.clone());
                    result.first_error.get_or_insert(error);
                }
                FileResult::Written(outcome) => {
                    if let Some(ref error) = outcome.error {
                        result
                            .first_error
                            .get_or_insert_with(|| FileError::new(outcome.key.clone(), error.clone()));
                    }
                    result.uploaded.push(outcome);
                }
            }
        }

        result.normalize();
        result
    }

    /// Decide and, if needed, write one file.
    async fn process_file(&self, candidate: &FileCandidate) -> FileResult {
        let bucket: &str = self.location.bucket.as_str();
        let key: &str = candidate.storage_key.as_str();

        let remote = match self.existence.lookup(self.client, bucket, key).await {
            Ok(remote) => remote,
            Err(e) => return FileResult::Failed(FileError::new(key, e)),
        };

        // Compressed keys without integrity metadata compare by gzip size.
        let mut payload: Option<PreparedPayload> = None;
        if needs_stored_size(candidate, &remote) {
            match prepare_payload(candidate, &self.settings).await {
                Ok(prepared) => payload = Some(prepared),
                Err(e) => return FileResult::Failed(FileError::new(key, e)),
            }
        }

        let decision: UploadDecision =
            decide(candidate, &remote, payload.as_ref().map(PreparedPayload::size));
        log::debug!("{}: {}", key, decision);

        if decision.is_skip() {
            return FileResult::Skipped(candidate.storage_key.clone());
        }

        let outcome: FileOutcome = self.write_file(candidate, decision, payload).await;
        if let Err(e) = self.recorder.file_upload(&outcome).await {
            log::warn!("Failed to record upload of {}: {}", outcome.key, e);
        }
        FileResult::Written(outcome)
    }

    /// Write one file and forget its cached existence state.
    async fn write_file(
        &self,
        candidate: &FileCandidate,
        decision: UploadDecision,
        payload: Option<PreparedPayload>,
    ) -> FileOutcome {
        let mut outcome: FileOutcome = FileOutcome {
            key: candidate.storage_key.clone(),
            name: candidate.name.clone(),
            decision,
            compressed: candidate.compressed,
            update: decision.is_update(),
            final_size: 0,
            completed_at: None,
            error: None,
            symbol: candidate.symbol_id(),
        };

        let payload: PreparedPayload = match payload {
            Some(prepared) => prepared,
            None => match prepare_payload(candidate, &self.settings).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    outcome.error = Some(e);
                    return outcome;
                }
            },
        };
        outcome.final_size = payload.size();

        let written: Result<(), StorageError> = self
            .client
            .put_object(&self.location.bucket, &candidate.storage_key, payload.into_request())
            .await;

        match written {
            Ok(()) => {
                self.existence
                    .invalidate(&self.location.bucket, &candidate.storage_key)
                    .await;
                outcome.completed_at = Some(current_epoch_seconds());
                log::info!(
                    "Uploaded {} ({} bytes, {})",
                    candidate.storage_key,
                    outcome.final_size,
                    decision
                );
            }
            Err(e) => {
                log::warn!("Upload of {} failed: {}", candidate.storage_key, e);
                outcome.error = Some(e);
            }
        }
        outcome
    }
}

/// Get current time as epoch seconds.
fn current_epoch_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
