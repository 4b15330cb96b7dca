use emoboard_core::backend::{self, SqliteBackend};
use emoboard_core::config::{BoardConfig, Endpoint};
use emoboard_core::feed::FeedSession;
use emoboard_core::model::emotion::Category;
use emoboard_core::position::RandomPositions;
use std::time::{Duration, Instant};

fn open(path: &std::path::Path) -> SqliteBackend {
    SqliteBackend::open(path)
        .expect("open board db")
        .with_poll_interval(Duration::from_millis(10))
}

#[test]
fn two_sessions_on_one_file_converge() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("board.sqlite3");

    let mut alice = FeedSession::new(open(&path), RandomPositions::seeded(1));
    let mut bob = FeedSession::new(open(&path), RandomPositions::seeded(2));
    alice.start();
    bob.start();
    assert!(alice.is_live() && bob.is_live());

    let from_alice = alice.add("first light", Category::Hope).expect("alice add");
    let from_bob = bob.add("long night", Category::Emptiness).expect("bob add");

    let deadline = Instant::now() + Duration::from_secs(10);
    while (alice.emotions().len() < 2 || bob.emotions().len() < 2) && Instant::now() < deadline {
        alice.pump_blocking(Duration::from_millis(50));
        bob.pump_blocking(Duration::from_millis(50));
    }

    for session in [&alice, &bob] {
        let mut ids: Vec<_> = session.emotions().iter().map(|e| e.id.clone()).collect();
        ids.sort();
        let mut expected = vec![from_alice.id.clone(), from_bob.id.clone()];
        expected.sort();
        assert_eq!(ids, expected);
    }

    // Own inserts come back through the poller too; they must stay single.
    std::thread::sleep(Duration::from_millis(50));
    alice.pump();
    bob.pump();
    assert_eq!(alice.emotions().len(), 2);
    assert_eq!(bob.emotions().len(), 2);
}

#[test]
fn reload_after_restart_sees_newest_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("board.sqlite3");
    {
        let mut writer = FeedSession::new(open(&path), RandomPositions::seeded(3));
        for (text, category) in [
            ("one", Category::Joy),
            ("two", Category::Anger),
            ("three", Category::Anxiety),
        ] {
            writer.add(text, category).expect("add");
        }
    }

    let mut reader = FeedSession::new(open(&path), RandomPositions::seeded(4));
    assert_eq!(reader.load().expect("load"), 3);
    let texts: Vec<_> = reader.emotions().iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["three", "two", "one"]);
}

#[test]
fn connect_builds_sqlite_and_memory_backends() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = BoardConfig::new(Endpoint::Sqlite(dir.path().join("via-config.db")), "k");
    let backend = backend::connect(&config).expect("connect sqlite");
    let mut session = FeedSession::new(backend, RandomPositions::seeded(5));
    session.add("configured", Category::Sadness).expect("add");
    assert_eq!(session.load().expect("load"), 1);

    let memory = backend::connect(&BoardConfig::new(Endpoint::Memory, "k")).expect("memory");
    let mut session = FeedSession::new(memory, RandomPositions::seeded(6));
    assert_eq!(session.load().expect("load"), 0);
}
