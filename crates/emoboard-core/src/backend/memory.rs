//! Process-local backend.
//!
//! Holds the table in memory and broadcasts every insert to all live
//! subscribers, including the inserting client. Used by tests, the simulator,
//! and the `memory:` endpoint. Failures can be scripted one call at a time.

use super::{BackendError, EmotionBackend, Subscription, row_id};
use crate::model::emotion::{EmotionRow, NewEmotion, PushEvent, parse_created_at};
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Shared in-memory `emotions` table. Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

/// How many times each operation has been called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub fetch: usize,
    pub insert: usize,
    pub subscribe: usize,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<EmotionRow>,
    subscribers: Vec<(u64, Sender<PushEvent>)>,
    next_subscriber: u64,
    inserted: u64,
    latest_ms: Option<i64>,
    clock: Clock,
    faults: Faults,
    calls: CallCounts,
}

#[derive(Debug, Default)]
struct Faults {
    fetch: Option<String>,
    insert: Option<String>,
    empty_insert: bool,
    subscribe: Option<String>,
}

#[derive(Debug, Default)]
enum Clock {
    /// Wall clock, bumped so successive rows never share a millisecond.
    #[default]
    Wall,
    /// Deterministic clock advancing one millisecond per insert.
    Logical,
}

impl Inner {
    fn store(&mut self, row: EmotionRow) {
        if let Ok(millis) = parse_created_at(&row.created_at) {
            self.latest_ms = Some(self.latest_ms.map_or(millis, |latest| latest.max(millis)));
        }
        self.rows.push(row);
    }

    fn next_created_at(&self) -> String {
        let last = self.latest_ms;
        let millis = match self.clock {
            Clock::Wall => {
                let now = Utc::now().timestamp_millis();
                last.map_or(now, |last| now.max(last + 1))
            }
            Clock::Logical => last.map_or(LOGICAL_EPOCH_MS, |last| last + 1),
        };
        format_millis(millis)
    }

    fn broadcast(&mut self, event: &PushEvent) {
        let before = self.subscribers.len();
        self.subscribers.retain(|(_, tx)| tx.send(event.clone()).is_ok());
        let pruned = before - self.subscribers.len();
        if pruned > 0 {
            debug!(pruned, "dropped closed subscribers");
        }
    }
}

/// 2025-01-01T00:00:00Z
const LOGICAL_EPOCH_MS: i64 = 1_735_689_600_000;

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table whose `created_at` values are a pure function of insert order.
    #[must_use]
    pub fn with_logical_clock() -> Self {
        let backend = Self::new();
        backend.lock().clock = Clock::Logical;
        backend
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store rows without notifying subscribers.
    pub fn preload(&self, rows: impl IntoIterator<Item = EmotionRow>) {
        let mut inner = self.lock();
        for row in rows {
            inner.store(row);
        }
    }

    /// Store `row` as-is and broadcast it, as if another client wrote it.
    pub fn inject(&self, row: EmotionRow) {
        let mut inner = self.lock();
        let event = PushEvent::from_row(&row);
        inner.store(row);
        inner.broadcast(&event);
    }

    /// Broadcast an arbitrary payload without storing anything.
    pub fn push_raw(&self, payload: serde_json::Value) {
        self.lock().broadcast(&PushEvent { new: payload });
    }

    /// Make the next `fetch_recent` fail with `message`.
    pub fn fail_next_fetch(&self, message: impl Into<String>) {
        self.lock().faults.fetch = Some(message.into());
    }

    /// Make the next `insert` fail with `message`. Nothing is stored.
    pub fn fail_next_insert(&self, message: impl Into<String>) {
        self.lock().faults.insert = Some(message.into());
    }

    /// Make the next `insert` store and broadcast the row but return no row.
    pub fn empty_next_insert(&self) {
        self.lock().faults.empty_insert = true;
    }

    /// Make the next `subscribe` fail with `message`.
    pub fn fail_next_subscribe(&self, message: impl Into<String>) {
        self.lock().faults.subscribe = Some(message.into());
    }

    /// Every stored row, in insert order.
    #[must_use]
    pub fn rows(&self) -> Vec<EmotionRow> {
        self.lock().rows.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    #[must_use]
    pub fn calls(&self) -> CallCounts {
        self.lock().calls
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

impl EmotionBackend for MemoryBackend {
    fn fetch_recent(&self, limit: usize) -> Result<Vec<EmotionRow>, BackendError> {
        let mut inner = self.lock();
        inner.calls.fetch += 1;
        if let Some(message) = inner.faults.fetch.take() {
            return Err(BackendError::Unavailable(message));
        }

        // Later inserts win ties, so walk newest-first before the stable sort.
        let mut rows: Vec<EmotionRow> = inner.rows.iter().rev().cloned().collect();
        rows.sort_by_cached_key(|row| {
            std::cmp::Reverse(parse_created_at(&row.created_at).unwrap_or(i64::MIN))
        });
        rows.truncate(limit);
        trace!(rows = rows.len(), limit, "memory fetch");
        Ok(rows)
    }

    fn insert(&self, row: &NewEmotion) -> Result<Option<EmotionRow>, BackendError> {
        let mut inner = self.lock();
        inner.calls.insert += 1;
        if let Some(message) = inner.faults.insert.take() {
            return Err(BackendError::Unavailable(message));
        }

        let created_at = inner.next_created_at();
        inner.inserted += 1;
        let stored = EmotionRow {
            id: row_id(&format!("memory:{}:{created_at}:{}", inner.inserted, row.text)),
            text: row.text.clone(),
            emotion: row.emotion.as_str().to_string(),
            x: row.x,
            y: row.y,
            created_at,
        };
        inner.store(stored.clone());
        inner.broadcast(&PushEvent::from_row(&stored));
        debug!(id = %stored.id, "memory insert");

        if std::mem::take(&mut inner.faults.empty_insert) {
            return Ok(None);
        }
        Ok(Some(stored))
    }

    fn subscribe(&self) -> Result<Subscription, BackendError> {
        let mut inner = self.lock();
        inner.calls.subscribe += 1;
        if let Some(message) = inner.faults.subscribe.take() {
            return Err(BackendError::Unavailable(message));
        }

        let (tx, rx) = mpsc::channel();
        let key = inner.next_subscriber;
        inner.next_subscriber += 1;
        inner.subscribers.push((key, tx));

        let table = Arc::clone(&self.inner);
        Ok(Subscription::new(
            rx,
            Some(Box::new(move || {
                table
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .subscribers
                    .retain(|(k, _)| *k != key);
            })),
        ))
    }
}
