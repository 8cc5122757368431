use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

// refs.target_id has no foreign key: a target may be unresolvable, which the
// engine reports as a dangling reference.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS entities (
    entity_id BLOB PRIMARY KEY CHECK (length(entity_id) = 16),
    type_name TEXT NOT NULL,
    owner_id BLOB CHECK (owner_id IS NULL OR length(owner_id) = 16),
    owner_field TEXT,
    ord INTEGER,
    CHECK ((owner_id IS NULL) = (owner_field IS NULL))
);
CREATE INDEX IF NOT EXISTS idx_entities_owner ON entities (owner_id, owner_field, ord);
CREATE INDEX IF NOT EXISTS idx_entities_type ON entities (type_name);

CREATE TABLE IF NOT EXISTS fields (
    entity_id BLOB NOT NULL,
    field_key TEXT NOT NULL,
    value BLOB NOT NULL,
    PRIMARY KEY (entity_id, field_key)
);

CREATE TABLE IF NOT EXISTS refs (
    rowid INTEGER PRIMARY KEY,
    source_id BLOB NOT NULL CHECK (length(source_id) = 16),
    field_key TEXT NOT NULL,
    ord INTEGER NOT NULL,
    target_id BLOB NOT NULL CHECK (length(target_id) = 16)
);
CREATE INDEX IF NOT EXISTS idx_refs_source ON refs (source_id, field_key, ord);
CREATE INDEX IF NOT EXISTS idx_refs_target ON refs (target_id);
";
