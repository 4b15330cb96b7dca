use super::{DEFAULT_FEED_LIMIT, FeedError, FeedSnapshot, FeedState, MergeOutcome, PumpStats};
use crate::backend::{EmotionBackend, Poll, Subscription};
use crate::model::emotion::{Category, Emotion, NewEmotion, PushEvent};
use crate::position::{Position, PositionSource};
use crate::validate::validate_text;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// One client's view of the board.
///
/// The session is driven from a single thread. Push events queue on the
/// subscription channel and are merged, one at a time, by [`Self::pump`].
pub struct FeedSession<B, P> {
    backend: B,
    positions: P,
    state: FeedState,
    loading: bool,
    error: Option<String>,
    subscription: Option<Subscription>,
    limit: usize,
}

impl<B: EmotionBackend, P: PositionSource> FeedSession<B, P> {
    /// A session that has not loaded or subscribed yet. No I/O happens here.
    pub fn new(backend: B, positions: P) -> Self {
        Self {
            backend,
            positions,
            state: FeedState::new(),
            loading: true,
            error: None,
            subscription: None,
            limit: DEFAULT_FEED_LIMIT,
        }
    }

    /// Change how many posts a load asks for.
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Load the feed, then open the change stream.
    ///
    /// A failed load does not prevent subscribing. Both failures end up in
    /// [`Self::error`].
    pub fn start(&mut self) {
        if let Err(error) = self.load() {
            debug!(%error, "initial load failed, subscribing anyway");
        }
        if let Err(error) = self.subscribe() {
            debug!(%error, "feed started without a change stream");
        }
    }

    /// Open the change stream if it is not open already.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Subscribe`] (also stored as the shared error) if
    /// the backend refuses the subscription.
    pub fn subscribe(&mut self) -> Result<(), FeedError> {
        if self.subscription.is_some() {
            return Ok(());
        }
        match self.backend.subscribe() {
            Ok(subscription) => {
                debug!("subscribed to emotion inserts");
                self.subscription = Some(subscription);
                Ok(())
            }
            Err(e) => Err(self.fail(FeedError::Subscribe(e.to_string()))),
        }
    }

    /// Close the change stream. Safe to call more than once.
    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
            debug!("unsubscribed from emotion inserts");
        }
    }

    /// Whether a change stream is open.
    #[must_use]
    pub const fn is_live(&self) -> bool {
        self.subscription.is_some()
    }

    /// Replace the list with the most recent posts, newest first.
    ///
    /// Returns the number of posts now in the list. Rows that cannot be
    /// decoded are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Load`] if the backend read fails. The list is left
    /// as it was and the message is stored as the shared error.
    pub fn load(&mut self) -> Result<usize, FeedError> {
        self.loading = true;
        let result = self.backend.fetch_recent(self.limit);
        self.loading = false;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) => return Err(self.fail(FeedError::Load(e.to_string()))),
        };

        let mut emotions: Vec<Emotion> = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.id.clone();
                Emotion::try_from(row)
                    .map_err(|error| warn!(%id, %error, "skipping undecodable row"))
                    .ok()
            })
            .collect();
        emotions.sort_by_key(|emotion| std::cmp::Reverse(emotion.timestamp));

        let duplicates = self.state.replace(emotions);
        if duplicates > 0 {
            warn!(duplicates, "load returned duplicate ids");
        }
        self.error = None;
        info!(count = self.state.len(), "loaded emotions");
        Ok(self.state.len())
    }

    /// Validate and insert a new post at a freshly drawn position.
    ///
    /// On success the created post is at the head of the list (unless its
    /// push event got there first) and is returned.
    ///
    /// # Errors
    ///
    /// - [`FeedError::Validation`] for empty or over-long text. No backend
    ///   call is made and the shared error is not touched.
    /// - [`FeedError::Write`] or [`FeedError::EmptyInsert`] when the insert
    ///   fails. The list is unchanged and the message is stored as the shared
    ///   error.
    pub fn add(&mut self, text: &str, category: Category) -> Result<Emotion, FeedError> {
        let text = validate_text(text)?;
        self.error = None;

        let Position { x, y } = self.positions.next_position();
        let payload = NewEmotion {
            text,
            emotion: category,
            x,
            y,
        };

        let row = match self.backend.insert(&payload) {
            Ok(Some(row)) => row,
            Ok(None) => return Err(self.fail(FeedError::EmptyInsert)),
            Err(e) => return Err(self.fail(FeedError::Write(e.to_string()))),
        };
        let emotion =
            Emotion::try_from(row).map_err(|e| self.fail(FeedError::Write(e.to_string())))?;

        if self.state.prepend_unique(emotion.clone()) {
            info!(id = %emotion.id, emotion = %emotion.emotion, "added emotion");
        } else {
            debug!(id = %emotion.id, "added emotion was already merged from the change stream");
        }
        Ok(emotion)
    }

    /// Merge one push event into the list.
    pub fn handle_push(&mut self, event: PushEvent) -> MergeOutcome {
        let emotion = match event.into_emotion() {
            Ok(emotion) => emotion,
            Err(error) => {
                warn!(%error, "dropping malformed push event");
                return MergeOutcome::Dropped;
            }
        };

        let id = emotion.id.clone();
        if self.state.prepend_unique(emotion) {
            debug!(%id, "merged pushed emotion");
            MergeOutcome::Merged
        } else {
            debug!(%id, "ignoring pushed emotion already in feed");
            MergeOutcome::Duplicate
        }
    }

    /// Merge every push event already queued, without blocking.
    pub fn pump(&mut self) -> PumpStats {
        let mut stats = PumpStats::default();
        loop {
            let next = match &self.subscription {
                Some(subscription) => subscription.poll(),
                None => break,
            };
            match next {
                Poll::Event(event) => stats.record(self.handle_push(event)),
                Poll::Empty => break,
                Poll::Closed => {
                    self.disconnected();
                    stats.disconnected = true;
                    break;
                }
            }
        }
        stats
    }

    /// Wait up to `timeout` for at least one push event, then drain the queue.
    pub fn pump_blocking(&mut self, timeout: Duration) -> PumpStats {
        let first = match &self.subscription {
            Some(subscription) => subscription.wait(timeout),
            None => return PumpStats::default(),
        };

        let mut stats = PumpStats::default();
        match first {
            Poll::Event(event) => stats.record(self.handle_push(event)),
            Poll::Empty => return stats,
            Poll::Closed => {
                self.disconnected();
                stats.disconnected = true;
                return stats;
            }
        }

        let rest = self.pump();
        stats.merged += rest.merged;
        stats.duplicates += rest.duplicates;
        stats.dropped += rest.dropped;
        stats.disconnected = rest.disconnected;
        stats
    }

    fn disconnected(&mut self) {
        self.subscription = None;
        let _ = self.fail(FeedError::Subscribe("change stream closed".to_string()));
    }

    fn fail(&mut self, failure: FeedError) -> FeedError {
        error!(code = %failure.code(), error = %failure, "feed operation failed");
        self.error = Some(failure.to_string());
        failure
    }

    /// Posts currently shown, newest first.
    #[must_use]
    pub fn emotions(&self) -> &[Emotion] {
        self.state.emotions()
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Emotion> {
        self.state.get(id)
    }

    #[must_use]
    pub const fn state(&self) -> &FeedState {
        &self.state
    }

    /// True until the first load finishes, and during any later reload.
    #[must_use]
    pub const fn loading(&self) -> bool {
        self.loading
    }

    /// The last user-facing failure, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    #[must_use]
    pub fn snapshot(&self) -> FeedSnapshot {
        FeedSnapshot {
            emotions: self.state.emotions().to_vec(),
            loading: self.loading,
            error: self.error.clone(),
        }
    }

    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }
}

impl<B, P> std::fmt::Debug for FeedSession<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedSession")
            .field("emotions", &self.state.len())
            .field("loading", &self.loading)
            .field("error", &self.error)
            .field("live", &self.subscription.is_some())
            .field("limit", &self.limit)
            .finish_non_exhaustive()
    }
}
