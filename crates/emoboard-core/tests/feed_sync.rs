use emoboard_core::backend::{BackendError, EmotionBackend, MemoryBackend, Subscription};
use emoboard_core::feed::{FeedError, FeedSession, MergeOutcome};
use emoboard_core::model::emotion::{Category, EmotionRow, NewEmotion, PushEvent};
use emoboard_core::position::{Position, PositionSource, RandomPositions};
use emoboard_core::validate::ValidationError;
use proptest::prelude::*;
use rand::rngs::StdRng;
use std::cell::RefCell;
use std::sync::mpsc::{self, Receiver};

type Session = FeedSession<MemoryBackend, RandomPositions<StdRng>>;

fn session(backend: &MemoryBackend) -> Session {
    FeedSession::new(backend.clone(), RandomPositions::seeded(42))
}

fn row(id: &str, category: &str, created_at: &str) -> EmotionRow {
    EmotionRow {
        id: id.to_string(),
        text: format!("post {id}"),
        emotion: category.to_string(),
        x: 25.0,
        y: 75.0,
        created_at: created_at.to_string(),
    }
}

fn ids(session: &Session) -> Vec<String> {
    session.emotions().iter().map(|e| e.id.clone()).collect()
}

#[test]
fn add_then_load_yields_exactly_one_matching_record() {
    let backend = MemoryBackend::new();
    let mut feed = session(&backend);
    feed.start();

    let created = feed.add("I feel hopeful today", Category::Hope).unwrap();
    assert_eq!(created.text, "I feel hopeful today");
    assert_eq!(created.emotion, Category::Hope);
    assert!(Position { x: created.x, y: created.y }.in_bounds());
    assert_eq!(feed.emotions()[0], created);
    assert!(feed.error().is_none());

    feed.load().unwrap();
    let matching = feed
        .emotions()
        .iter()
        .filter(|e| e.text == "I feel hopeful today" && e.emotion == Category::Hope)
        .count();
    assert_eq!(matching, 1);
}

#[test]
fn trimmed_text_is_what_gets_stored() {
    let backend = MemoryBackend::new();
    let mut feed = session(&backend);
    let created = feed.add("   lonely  ", Category::Sadness).unwrap();
    assert_eq!(created.text, "lonely");
    assert_eq!(backend.rows()[0].text, "lonely");
}

#[test]
fn over_length_add_fails_without_a_backend_call() {
    let backend = MemoryBackend::new();
    let mut feed = session(&backend);
    feed.load().unwrap();

    let err = feed.add(&"a".repeat(150), Category::Joy).unwrap_err();
    assert_eq!(
        err,
        FeedError::Validation(ValidationError::TooLong { len: 150, max: 100 })
    );
    assert_eq!(backend.calls().insert, 0);
    assert!(feed.emotions().is_empty());
    assert!(feed.error().is_none());
}

#[test]
fn blank_add_fails_without_a_backend_call() {
    let backend = MemoryBackend::new();
    let mut feed = session(&backend);
    let err = feed.add(" \n\t ", Category::Anger).unwrap_err();
    assert_eq!(err.to_string(), "Text cannot be empty");
    assert_eq!(backend.calls().insert, 0);
}

#[test]
fn validation_failure_leaves_shared_error_alone() {
    let backend = MemoryBackend::new();
    backend.fail_next_fetch("offline");
    let mut feed = session(&backend);
    assert!(feed.load().is_err());
    let before = feed.error().map(ToString::to_string);

    assert!(feed.add("", Category::Joy).is_err());
    assert_eq!(feed.error().map(ToString::to_string), before);
}

#[test]
fn push_for_a_present_id_is_a_no_op() {
    let backend = MemoryBackend::new();
    backend.preload([row("a", "joy", "2025-01-01T00:00:00Z")]);
    let mut feed = session(&backend);
    feed.load().unwrap();
    let before = feed.snapshot();

    let mut changed = row("a", "anger", "2025-06-01T00:00:00Z");
    changed.text = "edited elsewhere".to_string();
    assert_eq!(
        feed.handle_push(PushEvent::from_row(&changed)),
        MergeOutcome::Duplicate
    );
    assert_eq!(feed.snapshot(), before);
}

#[test]
fn add_then_push_converges_to_one_copy() {
    let backend = MemoryBackend::new();
    let mut feed = session(&backend);
    feed.start();

    let created = feed.add("echo", Category::Emptiness).unwrap();
    let stats = feed.pump();
    assert_eq!(stats.duplicates, 1);
    assert_eq!(stats.merged, 0);
    assert_eq!(ids(&feed), vec![created.id]);
}

/// Returns a fixed row from every insert, so a test can deliver the push
/// for that row before the add confirmation arrives.
struct ScriptedInsert {
    row: EmotionRow,
    inserts: RefCell<usize>,
}

impl EmotionBackend for ScriptedInsert {
    fn fetch_recent(&self, _limit: usize) -> Result<Vec<EmotionRow>, BackendError> {
        Ok(Vec::new())
    }

    fn insert(&self, _row: &NewEmotion) -> Result<Option<EmotionRow>, BackendError> {
        *self.inserts.borrow_mut() += 1;
        Ok(Some(self.row.clone()))
    }

    fn subscribe(&self) -> Result<Subscription, BackendError> {
        Err(BackendError::Unavailable("not used".to_string()))
    }
}

#[test]
fn push_then_add_converges_to_one_copy() {
    let created = row("own", "hope", "2025-02-02T10:00:00Z");
    let backend = ScriptedInsert {
        row: created.clone(),
        inserts: RefCell::new(0),
    };
    let mut feed = FeedSession::new(&backend, RandomPositions::seeded(1));
    feed.load().unwrap();

    assert_eq!(
        feed.handle_push(PushEvent::from_row(&created)),
        MergeOutcome::Merged
    );
    let confirmed = feed.add("post own", Category::Hope).unwrap();

    assert_eq!(confirmed.id, "own");
    assert_eq!(*backend.inserts.borrow(), 1);
    assert_eq!(feed.emotions().len(), 1);
}

#[test]
fn concurrent_push_of_another_id_and_own_insert_both_land_once() {
    let backend = MemoryBackend::new();
    let mut feed = session(&backend);
    feed.start();

    backend.inject(row("theirs", "anxiety", "2030-01-01T00:00:00Z"));
    let mine = feed.add("mine", Category::Joy).unwrap();
    let stats = feed.pump();

    assert_eq!(stats.merged, 1);
    assert_eq!(stats.duplicates, 1);
    let mut present = ids(&feed);
    present.sort();
    let mut expected = vec![mine.id, "theirs".to_string()];
    expected.sort();
    assert_eq!(present, expected);
}

#[test]
fn read_failure_keeps_the_list_and_reports() {
    let backend = MemoryBackend::new();
    backend.preload([
        row("a", "joy", "2025-01-01T00:00:00Z"),
        row("b", "hope", "2025-01-02T00:00:00Z"),
    ]);
    let mut feed = session(&backend);
    feed.load().unwrap();
    let before = ids(&feed);

    backend.fail_next_fetch("connection refused");
    let err = feed.load().unwrap_err();
    assert_eq!(err, FeedError::Load("connection refused".to_string()));
    assert!(!feed.loading());
    assert_eq!(feed.error(), Some("Database error: connection refused"));
    assert_eq!(ids(&feed), before);

    feed.load().unwrap();
    assert!(feed.error().is_none());
}

#[test]
fn failed_initial_load_still_subscribes() {
    let backend = MemoryBackend::new();
    backend.fail_next_fetch("timeout");
    let mut feed = session(&backend);
    feed.start();

    assert!(!feed.loading());
    assert!(feed.emotions().is_empty());
    assert!(feed.error().is_some());
    assert!(feed.is_live());

    backend.inject(row("late", "joy", "2025-01-01T00:00:00Z"));
    assert_eq!(feed.pump().merged, 1);
}

#[test]
fn write_failure_sets_error_without_touching_the_list() {
    let backend = MemoryBackend::new();
    backend.preload([row("a", "joy", "2025-01-01T00:00:00Z")]);
    let mut feed = session(&backend);
    feed.start();
    let before = feed.snapshot().emotions;

    backend.fail_next_insert("permission denied");
    let err = feed.add("blocked", Category::Anger).unwrap_err();
    assert_eq!(err.to_string(), "Failed to add emotion: permission denied");
    assert_eq!(feed.error(), Some("Failed to add emotion: permission denied"));
    assert_eq!(feed.snapshot().emotions, before);

    feed.add("allowed", Category::Anger).unwrap();
    assert!(feed.error().is_none());
}

#[test]
fn empty_insert_result_is_a_failure_but_the_push_still_arrives() {
    let backend = MemoryBackend::new();
    let mut feed = session(&backend);
    feed.start();

    backend.empty_next_insert();
    assert_eq!(
        feed.add("ghost", Category::Sadness).unwrap_err(),
        FeedError::EmptyInsert
    );
    assert_eq!(feed.error(), Some("No data returned from database"));
    assert!(feed.emotions().is_empty());

    assert_eq!(feed.pump().merged, 1);
    assert_eq!(feed.emotions()[0].text, "ghost");
}

#[test]
fn malformed_push_is_dropped_quietly() {
    let backend = MemoryBackend::new();
    let mut feed = session(&backend);
    feed.start();

    backend.push_raw(serde_json::json!({ "id": "x", "emotion": "joy" }));
    backend.push_raw(serde_json::json!("not even an object"));
    let mut bad_category = serde_json::to_value(row("y", "boredom", "2025-01-01T00:00:00Z"))
        .unwrap();
    bad_category["text"] = serde_json::json!("still bad");
    backend.push_raw(bad_category);

    let stats = feed.pump();
    assert_eq!(stats.dropped, 3);
    assert!(feed.emotions().is_empty());
    assert!(feed.error().is_none());
}

#[test]
fn live_growth_is_not_trimmed_to_the_limit() {
    let backend = MemoryBackend::with_logical_clock();
    let mut feed = session(&backend).with_limit(3);
    for text in ["a", "b", "c", "d"] {
        feed.add(text, Category::Joy).unwrap();
    }
    assert_eq!(feed.load().unwrap(), 3);

    feed.subscribe().unwrap();
    backend.inject(row("e", "joy", "2030-01-01T00:00:00Z"));
    backend.inject(row("f", "joy", "2030-01-02T00:00:00Z"));
    feed.pump();
    assert_eq!(feed.emotions().len(), 5);
    assert_eq!(feed.emotions()[0].id, "f");
}

struct ClosedBackend(RefCell<Option<Receiver<PushEvent>>>);

impl EmotionBackend for ClosedBackend {
    fn fetch_recent(&self, _limit: usize) -> Result<Vec<EmotionRow>, BackendError> {
        Ok(Vec::new())
    }

    fn insert(&self, _row: &NewEmotion) -> Result<Option<EmotionRow>, BackendError> {
        Ok(None)
    }

    fn subscribe(&self) -> Result<Subscription, BackendError> {
        self.0
            .borrow_mut()
            .take()
            .map(|rx| Subscription::new(rx, None))
            .ok_or_else(|| BackendError::Unavailable("already subscribed".to_string()))
    }
}

#[test]
fn closed_stream_is_reported() {
    let (tx, rx) = mpsc::channel::<PushEvent>();
    drop(tx);
    let mut feed = FeedSession::new(
        ClosedBackend(RefCell::new(Some(rx))),
        RandomPositions::seeded(3),
    );
    feed.subscribe().unwrap();

    let stats = feed.pump();
    assert!(stats.disconnected);
    assert!(!feed.is_live());
    assert_eq!(feed.error(), Some("Subscription failed: change stream closed"));
}

/// Hands out positions and remembers them.
struct Recording<P> {
    inner: P,
    seen: Vec<Position>,
}

impl<P: PositionSource> PositionSource for Recording<P> {
    fn next_position(&mut self) -> Position {
        let position = self.inner.next_position();
        self.seen.push(position);
        position
    }
}

#[test]
fn ten_thousand_adds_all_land_in_bounds() {
    let backend = MemoryBackend::with_logical_clock();
    let mut positions = Recording {
        inner: RandomPositions::seeded(10_000),
        seen: Vec::new(),
    };
    let mut feed = FeedSession::new(backend.clone(), &mut positions);
    for i in 0..10_000 {
        let created = feed.add(&format!("post {i}"), Category::ALL[i % 6]).unwrap();
        assert!(Position { x: created.x, y: created.y }.in_bounds());
    }
    drop(feed);
    assert_eq!(positions.seen.len(), 10_000);
    assert!(positions.seen.iter().all(|p| p.in_bounds()));
    assert_eq!(backend.len(), 10_000);
}

proptest! {
    #[test]
    fn load_is_sorted_newest_first(offsets in prop::collection::vec(0_i64..1_000_000, 0..40)) {
        let backend = MemoryBackend::new();
        backend.preload(offsets.iter().enumerate().map(|(i, offset)| {
            let millis = 1_735_689_600_000 + offset;
            let created_at = chrono::DateTime::from_timestamp_millis(millis)
                .unwrap()
                .to_rfc3339();
            row(&format!("r{i}"), "hope", &created_at)
        }));
        let mut feed = session(&backend);
        feed.load().unwrap();

        let timestamps: Vec<i64> = feed.emotions().iter().map(|e| e.timestamp).collect();
        prop_assert!(timestamps.windows(2).all(|w| w[0] >= w[1]));
        prop_assert_eq!(timestamps.len(), offsets.len());
    }

    #[test]
    fn any_delivery_order_converges(pushes_first in any::<bool>(), redeliveries in 0_usize..4) {
        let backend = MemoryBackend::new();
        let mut feed = session(&backend);
        feed.start();
        if pushes_first {
            backend.inject(row("other", "joy", "2025-01-01T00:00:00Z"));
            feed.pump();
        }
        let mine = feed.add("mine", Category::Hope).unwrap();
        let own_row = backend.rows().into_iter().find(|r| r.id == mine.id).unwrap();
        let own_event = PushEvent::from_row(&own_row);
        for _ in 0..redeliveries {
            feed.handle_push(own_event.clone());
        }
        if !pushes_first {
            backend.inject(row("other", "joy", "2025-01-01T00:00:00Z"));
        }
        feed.pump();

        let mut present = ids(&feed);
        present.sort();
        let mut expected = vec![mine.id, "other".to_string()];
        expected.sort();
        prop_assert_eq!(present, expected);
    }
}
