//! Live feed of board posts.
//!
//! A [`FeedSession`] owns the local, newest-first list. It is filled by an
//! initial load, extended by push events from the backend change stream, and
//! by this client's own successful adds. Every path merges by id, so each
//! post appears at most once regardless of arrival order.

mod session;
pub mod state;

pub use session::FeedSession;
pub use state::FeedState;

use crate::error::ErrorCode;
use crate::model::emotion::Emotion;
use crate::validate::ValidationError;
use serde::Serialize;

/// How many posts a load asks for when no limit is configured.
pub const DEFAULT_FEED_LIMIT: usize = 100;

/// Failure of a feed operation. The `Display` text is what users see.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Database error: {0}")]
    Load(String),
    #[error("Failed to add emotion: {0}")]
    Write(String),
    #[error("No data returned from database")]
    EmptyInsert,
    #[error("Subscription failed: {0}")]
    Subscribe(String),
}

impl FeedError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(ValidationError::Empty) => ErrorCode::EmptyText,
            Self::Validation(ValidationError::TooLong { .. }) => ErrorCode::TextTooLong,
            Self::Load(_) => ErrorCode::LoadFailed,
            Self::Write(_) => ErrorCode::InsertFailed,
            Self::EmptyInsert => ErrorCode::EmptyInsertResult,
            Self::Subscribe(_) => ErrorCode::SubscribeFailed,
        }
    }
}

/// Owned copy of the session state for renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub emotions: Vec<Emotion>,
    pub loading: bool,
    pub error: Option<String>,
}

/// What [`FeedSession::handle_push`] did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// New id, now at the head of the list.
    Merged,
    /// Id already present; nothing changed.
    Duplicate,
    /// Payload could not be decoded and was discarded.
    Dropped,
}

/// Counts from one [`FeedSession::pump`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    pub merged: usize,
    pub duplicates: usize,
    pub dropped: usize,
    /// The change stream closed during this pump.
    pub disconnected: bool,
}

impl PumpStats {
    fn record(&mut self, outcome: MergeOutcome) {
        match outcome {
            MergeOutcome::Merged => self.merged += 1,
            MergeOutcome::Duplicate => self.duplicates += 1,
            MergeOutcome::Dropped => self.dropped += 1,
        }
    }

    /// Total events handled.
    #[must_use]
    pub const fn handled(&self) -> usize {
        self.merged + self.duplicates + self.dropped
    }
}
