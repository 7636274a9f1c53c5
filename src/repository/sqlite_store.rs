//! SQLite Store
//!
//! rusqlite-backed implementation of the tracker, category and record
//! repositories. All three share one connection so a tracker delete and its
//! record cascade run in a single transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::db::init_db;
use super::traits::{Loaded, RecordRepository, Repository};
use crate::domain::{
    CategoryId, Color, CompletionRecord, DomainError, DomainResult, Tracker, TrackerCategory,
    TrackerId, Weekday,
};

const DAY_FORMAT: &str = "%Y-%m-%d";

const TRACKER_COLUMNS: &str = "id, category_id, title, color, emoji, schedule, created_at";

#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Open the database file, creating and migrating it as needed.
    pub fn open(path: &Path) -> DomainResult<Self> {
        Ok(Self::new(init_db(Some(path))?))
    }

    pub fn open_in_memory() -> DomainResult<Self> {
        Ok(Self::new(init_db(None)?))
    }

    /// Direct access for maintenance and tests.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }
}

// ============================================================================
// Encoding helpers
// ============================================================================

fn schedule_to_mask(schedule: &BTreeSet<Weekday>) -> i64 {
    schedule
        .iter()
        .fold(0, |mask, day| mask | (1 << (day.code() - 1)))
}

fn mask_to_schedule(mask: i64) -> BTreeSet<Weekday> {
    (1..=7u8)
        .filter(|code| mask & (1 << (code - 1)) != 0)
        .filter_map(Weekday::from_code)
        .collect()
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

/// Read a nullable column, mapping both NULL and type errors to a decoding failure.
fn required<T: rusqlite::types::FromSql>(
    row: &Row<'_>,
    idx: usize,
    entity: &'static str,
    field: &'static str,
) -> DomainResult<T> {
    row.get::<_, Option<T>>(idx)
        .ok()
        .flatten()
        .ok_or(DomainError::decoding(entity, field))
}

fn parse_uuid(raw: &str, entity: &'static str, field: &'static str) -> DomainResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| DomainError::decoding(entity, field))
}

fn row_to_category(row: &Row<'_>) -> DomainResult<TrackerCategory> {
    let id: String = required(row, 0, "category", "id")?;
    let title: String = required(row, 1, "category", "title")?;
    let created_at: i64 = required(row, 2, "category", "created_at")?;
    Ok(TrackerCategory {
        id: CategoryId(parse_uuid(&id, "category", "id")?),
        title,
        created_at: millis_to_utc(created_at)
            .ok_or(DomainError::decoding("category", "created_at"))?,
    })
}

fn row_to_tracker(row: &Row<'_>) -> DomainResult<Tracker> {
    let id: String = required(row, 0, "tracker", "id")?;
    let category_id: String = required(row, 1, "tracker", "category_id")?;
    let title: String = required(row, 2, "tracker", "title")?;
    let color: String = required(row, 3, "tracker", "color")?;
    let emoji: String = required(row, 4, "tracker", "emoji")?;
    // a missing schedule reads as "never scheduled"
    let schedule: i64 = row.get::<_, Option<i64>>(5).ok().flatten().unwrap_or(0);
    let created_at: i64 = required(row, 6, "tracker", "created_at")?;

    Ok(Tracker {
        id: TrackerId(parse_uuid(&id, "tracker", "id")?),
        title,
        color: color
            .parse::<Color>()
            .map_err(|_| DomainError::decoding("tracker", "color"))?,
        emoji,
        schedule: mask_to_schedule(schedule),
        created_at: millis_to_utc(created_at)
            .ok_or(DomainError::decoding("tracker", "created_at"))?,
        category_id: CategoryId(parse_uuid(&category_id, "tracker", "category_id")?),
    })
}

fn row_to_record(row: &Row<'_>) -> DomainResult<CompletionRecord> {
    let tracker_id: String = required(row, 0, "record", "tracker_id")?;
    let day: String = required(row, 1, "record", "day")?;
    Ok(CompletionRecord {
        tracker_id: TrackerId(parse_uuid(&tracker_id, "record", "tracker_id")?),
        day: NaiveDate::parse_from_str(&day, DAY_FORMAT)
            .map_err(|_| DomainError::decoding("record", "day"))?,
    })
}

// ============================================================================
// Categories
// ============================================================================

#[async_trait]
impl Repository<TrackerCategory> for SqliteStore {
    async fn create(&self, entity: &TrackerCategory) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO categories (id, title, created_at) VALUES (?1, ?2, ?3)",
            params![
                entity.id.to_string(),
                entity.title,
                entity.created_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, id: CategoryId) -> DomainResult<Option<TrackerCategory>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT id, title, created_at FROM categories WHERE id = ?1")?;
        let mut rows = stmt.query(params![id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_category(row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self) -> DomainResult<Loaded<TrackerCategory>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT id, title, created_at FROM categories")?;
        let mut rows = stmt.query([])?;

        let mut loaded = Loaded::default();
        while let Some(row) = rows.next()? {
            loaded.push(row_to_category(row));
        }
        Ok(loaded)
    }

    async fn update(&self, entity: &TrackerCategory) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE categories SET title = ?1 WHERE id = ?2",
            params![entity.title, entity.id.to_string()],
        )?;
        if changed == 0 {
            return Err(DomainError::CategoryNotFound(entity.id));
        }
        Ok(())
    }

    async fn delete(&self, id: CategoryId) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM categories WHERE id = ?1", params![id.to_string()])?;
        Ok(())
    }
}

// ============================================================================
// Trackers
// ============================================================================

#[async_trait]
impl Repository<Tracker> for SqliteStore {
    async fn create(&self, entity: &Tracker) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO trackers (id, category_id, title, color, emoji, schedule, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entity.id.to_string(),
                entity.category_id.to_string(),
                entity.title,
                entity.color.to_hex(),
                entity.emoji,
                schedule_to_mask(&entity.schedule),
                entity.created_at.timestamp_millis()
            ],
        )?;
        Ok(())
    }

    async fn find_by_id(&self, id: TrackerId) -> DomainResult<Option<Tracker>> {
        let conn = self.conn.lock().await;
        let found = conn
            .query_row(
                &format!("SELECT {} FROM trackers WHERE id = ?1", TRACKER_COLUMNS),
                params![id.to_string()],
                |row| Ok(row_to_tracker(row)),
            )
            .optional()?;
        found.transpose()
    }

    async fn list(&self) -> DomainResult<Loaded<Tracker>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM trackers", TRACKER_COLUMNS))?;
        let mut rows = stmt.query([])?;

        let mut loaded = Loaded::default();
        while let Some(row) = rows.next()? {
            loaded.push(row_to_tracker(row));
        }
        Ok(loaded)
    }

    async fn update(&self, entity: &Tracker) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        let changed = conn.execute(
            "UPDATE trackers
             SET category_id = ?1, title = ?2, color = ?3, emoji = ?4, schedule = ?5
             WHERE id = ?6",
            params![
                entity.category_id.to_string(),
                entity.title,
                entity.color.to_hex(),
                entity.emoji,
                schedule_to_mask(&entity.schedule),
                entity.id.to_string()
            ],
        )?;
        if changed == 0 {
            return Err(DomainError::TrackerNotFound(entity.id));
        }
        Ok(())
    }

    async fn delete(&self, id: TrackerId) -> DomainResult<()> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        // Manual cascade as well, for databases opened without foreign keys
        tx.execute(
            "DELETE FROM completion_records WHERE tracker_id = ?1",
            params![id.to_string()],
        )?;
        tx.execute("DELETE FROM trackers WHERE id = ?1", params![id.to_string()])?;
        tx.commit()?;
        Ok(())
    }
}

// ============================================================================
// Completion records
// ============================================================================

#[async_trait]
impl RecordRepository for SqliteStore {
    async fn insert_record(&self, record: &CompletionRecord) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO completion_records (tracker_id, day) VALUES (?1, ?2)",
            params![
                record.tracker_id.to_string(),
                record.day.format(DAY_FORMAT).to_string()
            ],
        )?;
        Ok(())
    }

    async fn remove_record(&self, record: &CompletionRecord) -> DomainResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "DELETE FROM completion_records WHERE tracker_id = ?1 AND day = ?2",
            params![
                record.tracker_id.to_string(),
                record.day.format(DAY_FORMAT).to_string()
            ],
        )?;
        Ok(())
    }

    async fn list_records(&self) -> DomainResult<Loaded<CompletionRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT tracker_id, day FROM completion_records")?;
        let mut rows = stmt.query([])?;

        let mut loaded = Loaded::default();
        while let Some(row) = rows.next()? {
            loaded.push(row_to_record(row));
        }
        Ok(loaded)
    }
}
