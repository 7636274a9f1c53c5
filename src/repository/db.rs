//! Database Connection and Setup
//!
//! Opens the SQLite database and brings its schema up to date.

use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

use crate::domain::DomainResult;

/// Open (or create) the database at `db_path` and run migrations.
///
/// `None` opens a private in-memory database.
pub fn init_db(db_path: Option<&Path>) -> DomainResult<Connection> {
    let conn = match db_path {
        Some(path) => {
            info!(path = %path.display(), "opening tracker database");
            Connection::open(path)?
        }
        None => {
            debug!("opening in-memory tracker database");
            Connection::open_in_memory()?
        }
    };

    // Completion records cascade through the foreign key
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;

    run_migrations(&conn)?;
    Ok(conn)
}

/// Check if a column exists in a table
fn column_exists(conn: &Connection, table: &str, column: &str) -> DomainResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Run database migrations
fn run_migrations(conn: &Connection) -> DomainResult<()> {
    // Text columns are nullable on purpose: rows written by other clients may
    // lack them and are rejected at decode time rather than by the schema.
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            title TEXT,
            created_at INTEGER
        );
        CREATE TABLE IF NOT EXISTS trackers (
            id TEXT PRIMARY KEY,
            category_id TEXT NOT NULL REFERENCES categories(id),
            title TEXT,
            color TEXT,
            emoji TEXT,
            schedule INTEGER NOT NULL DEFAULT 0
        );
        CREATE TABLE IF NOT EXISTS completion_records (
            tracker_id TEXT NOT NULL REFERENCES trackers(id) ON DELETE CASCADE,
            day TEXT NOT NULL,
            PRIMARY KEY (tracker_id, day)
        );",
    )?;

    // v2: trackers gained a creation timestamp for in-section ordering
    if !column_exists(conn, "trackers", "created_at")? {
        conn.execute("ALTER TABLE trackers ADD COLUMN created_at INTEGER", [])?;
        debug!("migrated trackers: added created_at");
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_trackers_category ON trackers(category_id)",
        [],
    )?;

    Ok(())
}
