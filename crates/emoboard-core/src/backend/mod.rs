//! Backend adapters for the `emotions` table.
//!
//! Every adapter offers the same three operations:
//!
//! - read the most recent rows, newest first
//! - insert one row and return the created row
//! - subscribe to a stream of "row inserted" [`PushEvent`]s
//!
//! Push delivery is plain message passing over [`std::sync::mpsc`]. Adapters
//! that talk to another process run one poller thread per subscription; the
//! thread only sends messages and never touches feed state.

pub mod memory;
mod poller;
pub mod rest;
pub mod sqlite;

use crate::config::{BoardConfig, Endpoint};
use crate::model::emotion::{EmotionRow, NewEmotion, PushEvent};
use anyhow::Result;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::Duration;

pub use memory::MemoryBackend;
pub use rest::RestBackend;
pub use sqlite::SqliteBackend;

/// Name of the remote table.
pub const TABLE: &str = "emotions";

/// Opaque row id: the first 32 hex chars of a BLAKE3 digest of `seed`.
pub(crate) fn row_id(seed: &str) -> String {
    let mut id = blake3::hash(seed.as_bytes()).to_hex().to_string();
    id.truncate(32);
    id
}

/// Failure talking to the backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },
    #[error("could not decode response: {0}")]
    Decode(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("{0}")]
    Unavailable(String),
}

/// Access to the `emotions` table and its change stream.
pub trait EmotionBackend {
    /// Rows ordered by `created_at` descending, at most `limit` of them.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the read fails.
    fn fetch_recent(&self, limit: usize) -> Result<Vec<EmotionRow>, BackendError>;

    /// Insert one row and return it as stored, or `None` if the backend
    /// acknowledged the write without returning a row.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the write fails.
    fn insert(&self, row: &NewEmotion) -> Result<Option<EmotionRow>, BackendError>;

    /// Open a change stream that receives every row inserted from now on,
    /// including rows inserted by this client.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] if the stream cannot be established.
    fn subscribe(&self) -> Result<Subscription, BackendError>;
}

impl<B: EmotionBackend + ?Sized> EmotionBackend for Box<B> {
    fn fetch_recent(&self, limit: usize) -> Result<Vec<EmotionRow>, BackendError> {
        (**self).fetch_recent(limit)
    }

    fn insert(&self, row: &NewEmotion) -> Result<Option<EmotionRow>, BackendError> {
        (**self).insert(row)
    }

    fn subscribe(&self) -> Result<Subscription, BackendError> {
        (**self).subscribe()
    }
}

impl<B: EmotionBackend + ?Sized> EmotionBackend for Arc<B> {
    fn fetch_recent(&self, limit: usize) -> Result<Vec<EmotionRow>, BackendError> {
        (**self).fetch_recent(limit)
    }

    fn insert(&self, row: &NewEmotion) -> Result<Option<EmotionRow>, BackendError> {
        (**self).insert(row)
    }

    fn subscribe(&self) -> Result<Subscription, BackendError> {
        (**self).subscribe()
    }
}

impl<B: EmotionBackend + ?Sized> EmotionBackend for &B {
    fn fetch_recent(&self, limit: usize) -> Result<Vec<EmotionRow>, BackendError> {
        (**self).fetch_recent(limit)
    }

    fn insert(&self, row: &NewEmotion) -> Result<Option<EmotionRow>, BackendError> {
        (**self).insert(row)
    }

    fn subscribe(&self) -> Result<Subscription, BackendError> {
        (**self).subscribe()
    }
}

type Unsubscribe = Box<dyn FnOnce() + Send>;

/// A live change stream. Dropping it unsubscribes.
pub struct Subscription {
    receiver: Receiver<PushEvent>,
    on_unsubscribe: Option<Unsubscribe>,
}

/// Result of polling a [`Subscription`] without blocking.
#[derive(Debug, Clone, PartialEq)]
pub enum Poll {
    Event(PushEvent),
    Empty,
    Closed,
}

impl Subscription {
    /// Wrap a receiver. `on_unsubscribe` runs once, when the subscription ends.
    pub fn new(receiver: Receiver<PushEvent>, on_unsubscribe: Option<Unsubscribe>) -> Self {
        Self {
            receiver,
            on_unsubscribe,
        }
    }

    /// Take the next queued event, if any.
    #[must_use]
    pub fn poll(&self) -> Poll {
        match self.receiver.try_recv() {
            Ok(event) => Poll::Event(event),
            Err(TryRecvError::Empty) => Poll::Empty,
            Err(TryRecvError::Disconnected) => Poll::Closed,
        }
    }

    /// Wait up to `timeout` for the next event.
    #[must_use]
    pub fn wait(&self, timeout: Duration) -> Poll {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Poll::Event(event),
            Err(RecvTimeoutError::Timeout) => Poll::Empty,
            Err(RecvTimeoutError::Disconnected) => Poll::Closed,
        }
    }

    /// End the subscription now rather than at drop.
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(on_unsubscribe) = self.on_unsubscribe.take() {
            on_unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("has_unsubscribe_hook", &self.on_unsubscribe.is_some())
            .finish_non_exhaustive()
    }
}

/// Build the adapter named by the configured endpoint.
///
/// # Errors
///
/// Returns an error if the adapter cannot be constructed (for example the
/// `SQLite` file cannot be opened or migrated).
pub fn connect(config: &BoardConfig) -> Result<Box<dyn EmotionBackend>> {
    let backend: Box<dyn EmotionBackend> = match &config.endpoint {
        Endpoint::Rest(url) => Box::new(RestBackend::new(url, &config.access_key, &config.feed)),
        Endpoint::Sqlite(path) => {
            Box::new(SqliteBackend::open(path)?.with_poll_interval(config.feed.poll_interval()))
        }
        Endpoint::Memory => Box::new(MemoryBackend::new()),
    };
    tracing::info!(endpoint = %config.endpoint, "connected board backend");
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::{Poll, Subscription};
    use crate::model::emotion::PushEvent;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn drop_runs_unsubscribe_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_tx, rx) = mpsc::channel::<PushEvent>();
        let counter = Arc::clone(&calls);
        let subscription = Subscription::new(
            rx,
            Some(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })),
        );
        subscription.unsubscribe();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn poll_reports_empty_then_closed() {
        let (tx, rx) = mpsc::channel::<PushEvent>();
        let subscription = Subscription::new(rx, None);
        assert_eq!(subscription.poll(), Poll::Empty);
        tx.send(PushEvent {
            new: serde_json::json!({}),
        })
        .unwrap();
        assert!(matches!(subscription.poll(), Poll::Event(_)));
        drop(tx);
        assert_eq!(subscription.poll(), Poll::Closed);
        assert_eq!(subscription.wait(Duration::from_millis(5)), Poll::Closed);
    }
}
