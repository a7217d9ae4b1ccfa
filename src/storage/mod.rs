//! SQLite storage layer: rule documents and log messages.

pub mod schema;

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use r2d2::Pool as R2D2Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use serde_json::Value;
use tracing::warn;

use crate::incidents::{DescriptionStore, LoadError};
use crate::scan::{LogMessage, MessageSource, ScanError};

/// Connection Pool type
pub type Pool = R2D2Pool<SqliteConnectionManager>;

/// Timestamp layout of `created_at` columns, matching SQLite's `datetime()`.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Open (or create) the SQLite database and return a connection pool.
pub fn open_pool(path: &Path) -> Result<Pool> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create database directory {}", parent.display()))?;
    }

    let manager = SqliteConnectionManager::file(path).with_init(|c| {
        c.execute_batch(
            "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA temp_store = MEMORY;
                 PRAGMA busy_timeout = 5000;",
        )
    });

    let pool = R2D2Pool::new(manager)?;

    let conn = pool.get()?;
    schema::migrate(&conn)?;

    Ok(pool)
}

/// Store a raw rule document verbatim. Structure is checked at load time,
/// not here.
pub fn insert_document(pool: &Pool, document: &Value) -> Result<i64> {
    let conn = pool.get()?;
    let json = serde_json::to_string(document)?;
    conn.execute(
        "INSERT INTO incident_descriptions (document_json) VALUES (?1)",
        params![json],
    )
    .context("Failed to insert incident document")?;
    Ok(conn.last_insert_rowid())
}

/// Append one log message.
pub fn insert_message(pool: &Pool, message: &LogMessage) -> Result<i64> {
    let conn = pool.get()?;
    conn.execute(
        "INSERT INTO messages (host, level, message, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            message.host,
            message.level,
            message.message,
            message.created_at.format(TIMESTAMP_FORMAT).to_string()
        ],
    )
    .context("Failed to insert message")?;
    Ok(conn.last_insert_rowid())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn unavailable<E: std::fmt::Display>(e: E) -> LoadError {
    LoadError::StoreUnavailable(e.to_string())
}

fn source_err<E: std::fmt::Display>(e: E) -> ScanError {
    ScanError::Source(e.to_string())
}

/// Rule store and message source backed by one SQLite pool.
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

impl DescriptionStore for SqliteStore {
    fn fetch_documents(&self) -> Result<Vec<Value>, LoadError> {
        let conn = self.pool.get().map_err(unavailable)?;
        let mut stmt = conn
            .prepare("SELECT id, document_json FROM incident_descriptions ORDER BY id ASC")
            .map_err(unavailable)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))
            .map_err(unavailable)?;

        let mut documents = Vec::new();
        for r in rows {
            let (id, json) = r.map_err(unavailable)?;
            match serde_json::from_str(&json) {
                Ok(doc) => documents.push(doc),
                Err(e) => {
                    // Handed on as Null so the loader skips and reports it.
                    warn!(id, error = %e, "Stored incident document is not valid JSON");
                    documents.push(Value::Null);
                }
            }
        }
        Ok(documents)
    }
}

impl MessageSource for SqliteStore {
    fn messages_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<LogMessage>, ScanError> {
        let conn = self.pool.get().map_err(source_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT host, level, message, created_at FROM messages
                 WHERE created_at >= ?1
                 ORDER BY created_at ASC, id ASC",
            )
            .map_err(source_err)?;

        let cutoff = cutoff.format(TIMESTAMP_FORMAT).to_string();
        let rows = stmt
            .query_map(params![cutoff], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(source_err)?;

        let mut messages = Vec::new();
        for r in rows {
            let (host, level, message, created_at) = r.map_err(source_err)?;
            let Some(created_at) = parse_timestamp(&created_at) else {
                warn!(%host, raw = %created_at, "Skipping message with unreadable timestamp");
                continue;
            };
            let Ok(level) = u8::try_from(level) else {
                warn!(%host, level, "Skipping message with out-of-range level");
                continue;
            };
            messages.push(LogMessage {
                host,
                level,
                message,
                created_at,
            });
        }
        Ok(messages)
    }
}
