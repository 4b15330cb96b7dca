//! Schema of the local `SQLite` board database.
//!
//! - `emotions` mirrors the hosted table, plus a `seq` column that orders
//!   inserts for the change poller
//! - `board_meta` records the schema version the file was last migrated to

/// Migration v1: the `emotions` table and board metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS emotions (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    text TEXT NOT NULL CHECK (length(text) BETWEEN 1 AND 100),
    emotion TEXT NOT NULL CHECK (
        emotion IN ('sadness', 'anger', 'hope', 'joy', 'emptiness', 'anxiety')
    ),
    x REAL NOT NULL,
    y REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS board_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);

INSERT OR IGNORE INTO board_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: newest-first read index.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_emotions_created_at
    ON emotions (created_at DESC, seq DESC);
";

/// Indexes that must exist at the latest schema version.
pub const REQUIRED_INDEXES: &[&str] = &["idx_emotions_created_at"];
