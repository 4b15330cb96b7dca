use serde::{Deserialize, Serialize};

use emoboard_core::backend::MemoryBackend;
use emoboard_core::feed::MergeOutcome;
use emoboard_core::position::RandomPositions;
use emoboard_core::{Category, Emotion, EmotionRow, FeedError, FeedSession, PushEvent};

use crate::rng::DeterministicRng;

/// Stable identifier for a simulated client.
pub type ClientId = usize;

/// Immutable snapshot of a client's feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    pub id: ClientId,
    /// Round the client joined; `None` if it never did.
    pub joined_round: Option<u64>,
    /// Feed ids, in display order.
    pub emotion_ids: Vec<String>,
    /// Ids of posts this client created.
    pub own_ids: Vec<String>,
    /// Shared error the session is showing, if any.
    pub error: Option<String>,
}

/// One board client: a real [`FeedSession`] whose pushes arrive through the
/// simulated network instead of its own subscription.
pub struct SimulatedClient {
    id: ClientId,
    joined_round: Option<u64>,
    session: FeedSession<MemoryBackend, RandomPositions<DeterministicRng>>,
    own_ids: Vec<String>,
}

impl SimulatedClient {
    #[must_use]
    pub fn new(id: ClientId, table: MemoryBackend, rng: DeterministicRng, limit: usize) -> Self {
        Self {
            id,
            joined_round: None,
            session: FeedSession::new(table, RandomPositions::new(rng)).with_limit(limit),
            own_ids: Vec::new(),
        }
    }

    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    #[must_use]
    pub const fn joined(&self) -> bool {
        self.joined_round.is_some()
    }

    /// Mark the client as listening from `round` on.
    pub const fn join(&mut self, round: u64) {
        self.joined_round = Some(round);
    }

    /// Initial or recovery load from the table.
    ///
    /// # Errors
    ///
    /// Propagates the session's load failure.
    pub fn load(&mut self) -> Result<usize, FeedError> {
        self.session.load()
    }

    /// Post through the session and remember the id.
    ///
    /// # Errors
    ///
    /// Propagates validation and write failures.
    pub fn add(&mut self, text: &str, category: Category) -> Result<Emotion, FeedError> {
        let emotion = self.session.add(text, category)?;
        self.own_ids.push(emotion.id.clone());
        Ok(emotion)
    }

    pub fn deliver(&mut self, event: PushEvent) -> MergeOutcome {
        self.session.handle_push(event)
    }

    /// Push every row again, as a reconnecting change stream might.
    pub fn redeliver(&mut self, rows: &[EmotionRow]) -> usize {
        rows.iter()
            .map(|row| self.deliver(PushEvent::from_row(row)))
            .filter(|outcome| *outcome == MergeOutcome::Merged)
            .count()
    }

    #[must_use]
    pub fn snapshot(&self) -> ClientState {
        ClientState {
            id: self.id,
            joined_round: self.joined_round,
            emotion_ids: self.session.emotions().iter().map(|e| e.id.clone()).collect(),
            own_ids: self.own_ids.clone(),
            error: self.session.error().map(str::to_string),
        }
    }
}

impl std::fmt::Debug for SimulatedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedClient")
            .field("id", &self.id)
            .field("joined_round", &self.joined_round)
            .field("feed_len", &self.session.emotions().len())
            .field("own", &self.own_ids.len())
            .finish()
    }
}
