//! Per-target change notification channel.
//!
//! Each reactive target owns one [`ChangeBus`]. Observable assignments are
//! announced on it; every `persist_configure` call takes a receiver after
//! hydration, so values applied from storage are never echoed back.
//! Dropping the target drops the only sender, which ends the sync tasks
//! listening on it.

use tokio::sync::broadcast;

use super::ChangeEvent;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out of [`ChangeEvent`]s from one target to its persistence tasks.
///
/// Backed by a bounded `tokio::broadcast` ring. A slow sync task loses the
/// oldest notifications and sees a lag instead, which it handles as an
/// unspecified change and answers with a full rewrite of the record.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    /// Creates a bus holding up to `capacity` undelivered events (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Announces a change. Returns how many sync tasks (or other listeners)
    /// will see it; zero when nothing is persisting the target.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    /// Returns a receiver for changes made from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Number of live receivers, i.e. sync tasks still attached.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
