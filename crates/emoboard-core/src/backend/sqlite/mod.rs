//! Local `SQLite` backend.
//!
//! Connection defaults:
//! - `journal_mode = WAL` so a poller connection can read while another
//!   process writes
//! - `busy_timeout = 5s` to ride out short write locks
//!
//! Several processes may share one file. Each subscription opens its own
//! connection and polls for rows with a `seq` above its cursor.

pub mod migrations;
pub mod schema;

use super::poller::{self, ChangeSource};
use super::{BackendError, EmotionBackend, Subscription, row_id};
use crate::model::emotion::{EmotionRow, NewEmotion, PushEvent};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::debug;

/// Busy timeout used for every board connection.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval used when none is configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

const SELECT_COLUMNS: &str = "id, text, emotion, x, y, created_at";
const POLL_BATCH: i64 = 256;

static INSERT_NONCE: AtomicU64 = AtomicU64::new(0);

/// `emotions` table stored in a local database file.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    path: PathBuf,
    poll_interval: Duration,
}

impl SqliteBackend {
    /// Open (or create) the database at `path` and migrate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, configured, or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create board db directory {}", parent.display()))?;
        }

        let mut conn = open_connection(path)?;
        let version =
            migrations::migrate(&mut conn).context("apply board schema migrations")?;
        debug!(path = %path.display(), version, "opened board database");

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// Set how often subscriptions look for new rows.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, BackendError> {
        self.conn
            .lock()
            .map_err(|_| BackendError::Unavailable("board database lock poisoned".to_string()))
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("open board database {}", path.display()))?;
    configure_connection(&conn).context("configure sqlite pragmas")?;
    Ok(conn)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

fn row_from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<EmotionRow> {
    Ok(EmotionRow {
        id: row.get("id")?,
        text: row.get("text")?,
        emotion: row.get("emotion")?,
        x: row.get("x")?,
        y: row.get("y")?,
        created_at: row.get("created_at")?,
    })
}

/// A `created_at` strictly after `latest`, normally the current time.
fn next_created_at(latest: Option<&str>) -> String {
    let now = Utc::now();
    let floor = latest
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|dt| dt.with_timezone(&Utc) + chrono::Duration::microseconds(1));
    let stamp = match floor {
        Some(floor) if floor > now => floor,
        _ => now,
    };
    stamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl EmotionBackend for SqliteBackend {
    fn fetch_recent(&self, limit: usize) -> Result<Vec<EmotionRow>, BackendError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SELECT_COLUMNS} FROM emotions ORDER BY created_at DESC, seq DESC LIMIT ?1"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map([limit], row_from_sql)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn insert(&self, row: &NewEmotion) -> Result<Option<EmotionRow>, BackendError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let latest: Option<String> = tx
            .query_row(
                "SELECT created_at FROM emotions ORDER BY created_at DESC LIMIT 1",
                [],
                |r| r.get(0),
            )
            .optional()?;
        let created_at = next_created_at(latest.as_deref());
        let nonce = INSERT_NONCE.fetch_add(1, Ordering::Relaxed);
        let id = row_id(&format!(
            "sqlite:{created_at}:{}:{nonce}:{}",
            std::process::id(),
            row.text
        ));

        let stored = tx
            .query_row(
                &format!(
                    "INSERT INTO emotions (id, text, emotion, x, y, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     RETURNING {SELECT_COLUMNS}"
                ),
                params![id, row.text, row.emotion.as_str(), row.x, row.y, created_at],
                row_from_sql,
            )
            .optional()?;
        tx.commit()?;

        debug!(id = %id, "sqlite insert");
        Ok(stored)
    }

    fn subscribe(&self) -> Result<Subscription, BackendError> {
        let conn = open_connection(&self.path)
            .map_err(|e| BackendError::Unavailable(format!("{e:#}")))?;
        let cursor: i64 =
            conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM emotions", [], |r| r.get(0))?;
        poller::spawn(SqliteChanges { conn, cursor }, self.poll_interval)
    }
}

struct SqliteChanges {
    conn: Connection,
    cursor: i64,
}

impl ChangeSource for SqliteChanges {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn poll_new(&mut self) -> Result<Vec<serde_json::Value>, BackendError> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT seq, {SELECT_COLUMNS} FROM emotions WHERE seq > ?1 ORDER BY seq LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![self.cursor, POLL_BATCH], |r| {
                Ok((r.get::<_, i64>("seq")?, row_from_sql(r)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        if let Some((seq, _)) = rows.last() {
            self.cursor = *seq;
        }
        Ok(rows
            .iter()
            .map(|(_, row)| PushEvent::from_row(row).new)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_BUSY_TIMEOUT, SqliteBackend, next_created_at};
    use crate::backend::{EmotionBackend, Poll};
    use crate::model::emotion::{Category, NewEmotion, parse_created_at};
    use std::time::Duration;
    use tempfile::TempDir;

    fn temp_backend() -> (TempDir, SqliteBackend) {
        let dir = tempfile::tempdir().expect("create temp dir");
        let backend = SqliteBackend::open(&dir.path().join("nested/board.sqlite3"))
            .expect("open board db")
            .with_poll_interval(Duration::from_millis(10));
        (dir, backend)
    }

    fn new_row(text: &str, emotion: Category) -> NewEmotion {
        NewEmotion {
            text: text.to_string(),
            emotion,
            x: 12.5,
            y: 87.5,
        }
    }

    #[test]
    fn open_sets_wal_and_busy_timeout() {
        let (_dir, backend) = temp_backend();
        let conn = backend.lock().unwrap();
        let journal_mode: String = conn
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");
        let busy_timeout_ms: u64 = conn
            .pragma_query_value(None, "busy_timeout", |row| row.get(0))
            .unwrap();
        assert_eq!(u128::from(busy_timeout_ms), DEFAULT_BUSY_TIMEOUT.as_millis());
    }

    #[test]
    fn insert_returns_the_stored_row() {
        let (_dir, backend) = temp_backend();
        let row = backend
            .insert(&new_row("quiet evening", Category::Emptiness))
            .unwrap()
            .unwrap();
        assert_eq!(row.id.len(), 32);
        assert_eq!(row.text, "quiet evening");
        assert_eq!(row.emotion, "emptiness");
        assert!((row.x - 12.5).abs() < f64::EPSILON);
        assert!(parse_created_at(&row.created_at).is_ok());
    }

    #[test]
    fn fetch_orders_newest_first_and_honors_limit() {
        let (_dir, backend) = temp_backend();
        for text in ["one", "two", "three"] {
            backend.insert(&new_row(text, Category::Joy)).unwrap();
        }
        let rows = backend.fetch_recent(2).unwrap();
        let texts: Vec<_> = rows.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["three", "two"]);
    }

    #[test]
    fn created_at_is_strictly_increasing() {
        let later = "2999-01-01T00:00:00.000000Z";
        let next = next_created_at(Some(later));
        assert_eq!(next, "2999-01-01T00:00:00.000001Z");
        assert!(next_created_at(Some("not a timestamp")).ends_with('Z'));
    }

    #[test]
    fn reopening_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.sqlite3");
        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.insert(&new_row("persisted", Category::Hope)).unwrap();
        }
        let backend = SqliteBackend::open(&path).unwrap();
        assert_eq!(backend.fetch_recent(10).unwrap().len(), 1);
    }

    #[test]
    fn subscription_sees_inserts_from_another_connection() {
        let (dir, backend) = temp_backend();
        backend.insert(&new_row("before", Category::Anger)).unwrap();
        let subscription = backend.subscribe().unwrap();

        let writer = SqliteBackend::open(&dir.path().join("nested/board.sqlite3")).unwrap();
        let written = writer
            .insert(&new_row("after", Category::Anxiety))
            .unwrap()
            .unwrap();

        match subscription.wait(Duration::from_secs(5)) {
            Poll::Event(event) => assert_eq!(event.new["id"], written.id.as_str()),
            other => panic!("expected pushed row, got {other:?}"),
        }
        assert_eq!(subscription.poll(), Poll::Empty);
    }
}
