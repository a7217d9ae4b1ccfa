//! Database schema.

use anyhow::Result;
use rusqlite::Connection;

/// Create tables and indexes if missing.
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS incident_descriptions (
            id INTEGER PRIMARY KEY,
            document_json TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY,
            host TEXT NOT NULL,
            level INTEGER NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at);",
    )?;

    Ok(())
}
