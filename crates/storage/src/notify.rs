//! Asynchronous hand-off of "these symbols changed" signals.
//!
//! The uploader only waits for the signal to be queued. A dedicated task
//! drains the queue and hands each batch to a [`SymbolCacheInvalidator`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::NotifyError;
use crate::types::{SymbolId, UploadSettings};

/// Consumer of invalidation signals, e.g. a symbol lookup service that
/// must forget cached answers for newly uploaded symbols.
#[async_trait]
pub trait SymbolCacheInvalidator: Send + Sync {
    /// Purge cached answers for every pair in `symbols`.
    async fn invalidate(&self, symbols: &[SymbolId]);
}

/// Sending half of the invalidation queue.
#[derive(Debug, Clone)]
pub struct InvalidationNotifier {
    sender: mpsc::Sender<Vec<SymbolId>>,
}

impl InvalidationNotifier {
    /// Create a notifier and the receiving end of its queue.
    ///
    /// Use this when the host forwards signals to its own task system.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<SymbolId>>) {
        let (sender, receiver) = mpsc::channel::<Vec<SymbolId>>(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Create a notifier whose signals are delivered to `consumer` by a
    /// background task.
    ///
    /// The task ends once every notifier clone has been dropped and the
    /// queue is drained.
    pub fn spawn(
        consumer: Arc<dyn SymbolCacheInvalidator>,
        capacity: usize,
    ) -> (Self, JoinHandle<()>) {
        let (notifier, mut receiver) = Self::channel(capacity);
        let handle: JoinHandle<()> = tokio::spawn(async move {
            while let Some(symbols) = receiver.recv().await {
                log::debug!("Delivering invalidation for {} symbol(s)", symbols.len());
                consumer.invalidate(&symbols).await;
            }
        });
        (notifier, handle)
    }

    /// [`InvalidationNotifier::channel`] sized by
    /// `settings.notify_queue_capacity`.
    pub fn channel_with(settings: &UploadSettings) -> (Self, mpsc::Receiver<Vec<SymbolId>>) {
        Self::channel(settings.notify_queue_capacity)
    }

    /// [`InvalidationNotifier::spawn`] sized by
    /// `settings.notify_queue_capacity`.
    pub fn spawn_with(
        consumer: Arc<dyn SymbolCacheInvalidator>,
        settings: &UploadSettings,
    ) -> (Self, JoinHandle<()>) {
        Self::spawn(consumer, settings.notify_queue_capacity)
    }

    /// Number of signals that can still be queued without waiting.
    pub fn available_capacity(&self) -> usize {
        self.sender.capacity()
    }

    /// Queue one signal carrying `symbols`.
    ///
    /// Returns once the signal is queued, not when it is consumed.
    ///
    /// # Errors
    /// Returns `NotifyError::Closed` if the receiving side is gone.
    pub async fn notify(&self, symbols: BTreeSet<SymbolId>) -> Result<(), NotifyError> {
        let batch: Vec<SymbolId> = symbols.into_iter().collect();
        let count: usize = batch.len();
        self.sender
            .send(batch)
            .await
            .map_err(|_| NotifyError::Closed)?;
        log::info!("Queued symbol cache invalidation for {} pair(s)", count);
        Ok(())
    }

    /// Whether the receiving side has gone away.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
