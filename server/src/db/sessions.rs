//! Persistence gateway for game snapshots.
//!
//! A snapshot holds id, name, active flag, start/end timestamps and the
//! question sequence (as a JSON blob). The roster is never persisted: it is
//! rebuilt from live connections.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension;

use crate::db::DbPool;
use crate::error::StoreError;
use crate::game::question::Question;

/// Persisted shape of a game.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub name: String,
    pub is_active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub questions: Vec<Question>,
}

/// Durable store for game snapshots. Calls are blocking.
pub trait SessionStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<SessionRecord>, StoreError>;

    /// Insert or replace by id.
    fn save(&self, record: &SessionRecord) -> Result<(), StoreError>;

    fn delete(&self, id: &str) -> Result<(), StoreError>;

    fn clear_all(&self) -> Result<(), StoreError>;
}

/// `SessionStore` over the `games` table.
#[derive(Clone)]
pub struct SqliteSessionStore {
    db: DbPool,
}

impl SqliteSessionStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    /// Fetch a single snapshot by id.
    pub fn load(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        let conn = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        let row = conn
            .query_row(
                "SELECT id, name, is_active, start_time, end_time, questions FROM games WHERE id = ?1",
                rusqlite::params![id],
                read_row,
            )
            .optional()?;
        row.map(into_record).transpose()
    }
}

type RawRow = (String, String, bool, Option<String>, Option<String>, String);

fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn into_record(
    (id, name, is_active, start_time, end_time, questions): RawRow,
) -> Result<SessionRecord, StoreError> {
    Ok(SessionRecord {
        id,
        name,
        is_active,
        started_at: parse_timestamp(start_time)?,
        ended_at: parse_timestamp(end_time)?,
        questions: serde_json::from_str(&questions)?,
    })
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> Option<String> {
    ts.map(|t| t.to_rfc3339_opts(SecondsFormat::AutoSi, true))
}

fn parse_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| StoreError::Timestamp(s))
    })
    .transpose()
}

impl SessionStore for SqliteSessionStore {
    fn load_all(&self) -> Result<Vec<SessionRecord>, StoreError> {
        let conn = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(
            "SELECT id, name, is_active, start_time, end_time, questions FROM games ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map([], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(into_record).collect()
    }

    fn save(&self, record: &SessionRecord) -> Result<(), StoreError> {
        let questions = serde_json::to_string(&record.questions)?;
        let conn = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute(
            "INSERT INTO games (id, name, is_active, start_time, end_time, questions, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                is_active = excluded.is_active,
                start_time = excluded.start_time,
                end_time = excluded.end_time,
                questions = excluded.questions",
            rusqlite::params![
                record.id,
                record.name,
                record.is_active,
                format_timestamp(record.started_at),
                format_timestamp(record.ended_at),
                questions,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute("DELETE FROM games WHERE id = ?1", rusqlite::params![id])?;
        Ok(())
    }

    fn clear_all(&self) -> Result<(), StoreError> {
        let conn = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        let removed = conn.execute("DELETE FROM games", [])?;
        tracing::debug!(removed, "Cleared persisted games");
        Ok(())
    }
}
