//! Database schema definitions

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Create all tables if they don't exist
pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        -- One row per thread; `record` holds the full serialized ThreadRecord
        CREATE TABLE IF NOT EXISTS threads (
            thread_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            user_intent TEXT NOT NULL,
            created_at TEXT NOT NULL,
            last_update TEXT NOT NULL,
            record TEXT NOT NULL
        );

        -- Index for listing threads by creation time
        CREATE INDEX IF NOT EXISTS idx_threads_created
        ON threads(created_at DESC);

        -- Index for finding threads by status
        CREATE INDEX IF NOT EXISTS idx_threads_status
        ON threads(status);

        -- Schema version tracking
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );

        INSERT OR IGNORE INTO schema_version (version) VALUES (1);
        "#,
    )
}

/// Get the current schema version
pub fn get_version(conn: &Connection) -> rusqlite::Result<i32> {
    conn.query_row(
        "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
        [],
        |row| row.get(0),
    )
}
