use super::{check_expected, decode, empty_batch, encode, CommitResult, EventEnvelope, EventStore, NewEvent};
use crate::db;
use crate::errors::{from_rusqlite, poisoned, Result};
use crate::migrations::apply_migrations;
use contentgraph_core::errors::{CgError, CgErrorKind};
use contentgraph_core::stream::ExpectedVersion;
use rusqlite::{Connection, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SELECT_EVENTS: &str = "SELECT sequence_number, stream_name, version, event_id, event_type, payload, metadata, recorded_at FROM events";

/// Event store on a single SQLite database
///
/// One connection behind a mutex. Commits run in `BEGIN IMMEDIATE`
/// transactions so the version check and the insert see the same state even
/// with other processes writing to the file.
pub struct SqliteEventStore {
    conn: Mutex<Connection>,
}

impl SqliteEventStore {
    /// Open (or create) the database file and apply migrations
    ///
    /// # Errors
    ///
    /// `Persistence` when the file cannot be opened or migrated.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut conn = db::open(path)?;
        db::configure(&conn)?;
        apply_migrations(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Private in-memory database, mostly for tests
    ///
    /// # Errors
    ///
    /// `Persistence` when migrations fail.
    pub fn in_memory() -> Result<Self> {
        let mut conn = db::open_in_memory()?;
        apply_migrations(&mut conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self, op: &str) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| poisoned(op))
    }

    fn query(&self, op: &str, sql: &str, params: &[&dyn rusqlite::ToSql]) -> Result<Vec<EventEnvelope>> {
        let conn = self.lock(op)?;
        let mut stmt = conn.prepare(sql).map_err(from_rusqlite)?;
        let rows = stmt
            .query_map(params, StoredRow::from_row)
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;
        rows.into_iter().map(StoredRow::into_envelope).collect()
    }
}

fn current_version(conn: &Connection, stream_name: &str) -> Result<Option<u64>> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT MAX(version) FROM events WHERE stream_name = ?1",
            [stream_name],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;
    Ok(version.map(|v| v as u64))
}

impl EventStore for SqliteEventStore {
    fn commit(&self, stream_name: &str, events: Vec<NewEvent>, expected: ExpectedVersion) -> Result<CommitResult> {
        if events.is_empty() {
            return Err(empty_batch(stream_name));
        }
        let mut conn = self.lock("commit")?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(from_rusqlite)?;

        let current = current_version(&tx, stream_name)?;
        check_expected(stream_name, expected, current)?;

        let recorded_at = chrono::Utc::now().to_rfc3339();
        let mut version = current.map(|v| v + 1).unwrap_or(0);
        let mut sequence_number = 0;
        for event in &events {
            tx.execute(
                "INSERT INTO events (stream_name, version, event_id, event_type, payload, metadata, recorded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                rusqlite::params![
                    stream_name,
                    version as i64,
                    event.event_id,
                    event.event_type,
                    encode("commit", &event.payload)?,
                    encode("commit", &event.metadata)?,
                    recorded_at,
                ],
            )
            .map_err(from_rusqlite)?;
            sequence_number = tx.last_insert_rowid() as u64;
            version += 1;
        }
        tx.commit().map_err(from_rusqlite)?;

        tracing::debug!(
            stream_name,
            event_count = events.len(),
            sequence_number,
            "events committed"
        );
        Ok(CommitResult {
            version: version - 1,
            sequence_number,
        })
    }

    fn read_stream(&self, stream_name: &str) -> Result<Vec<EventEnvelope>> {
        self.query(
            "read_stream",
            &format!("{} WHERE stream_name = ?1 ORDER BY version", SELECT_EVENTS),
            &[&stream_name],
        )
    }

    fn read_stream_until(&self, stream_name: &str, version: u64) -> Result<Vec<EventEnvelope>> {
        self.query(
            "read_stream_until",
            &format!("{} WHERE stream_name = ?1 AND version <= ?2 ORDER BY version", SELECT_EVENTS),
            &[&stream_name, &(version as i64)],
        )
    }

    fn read_all_after(&self, sequence_number: u64) -> Result<Vec<EventEnvelope>> {
        self.query(
            "read_all_after",
            &format!("{} WHERE sequence_number > ?1 ORDER BY sequence_number", SELECT_EVENTS),
            &[&(sequence_number as i64)],
        )
    }

    fn stream_version(&self, stream_name: &str) -> Result<Option<u64>> {
        let conn = self.lock("stream_version")?;
        current_version(&conn, stream_name)
    }

    fn delete_stream(&self, stream_name: &str) -> Result<usize> {
        let conn = self.lock("delete_stream")?;
        let deleted = conn
            .execute("DELETE FROM events WHERE stream_name = ?1", [stream_name])
            .map_err(from_rusqlite)?;
        tracing::debug!(stream_name, deleted, "event stream deleted");
        Ok(deleted)
    }
}

/// Raw columns of one `events` row
struct StoredRow {
    sequence_number: i64,
    stream_name: String,
    version: i64,
    event_id: String,
    event_type: String,
    payload: String,
    metadata: String,
    recorded_at: String,
}

impl StoredRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sequence_number: row.get(0)?,
            stream_name: row.get(1)?,
            version: row.get(2)?,
            event_id: row.get(3)?,
            event_type: row.get(4)?,
            payload: row.get(5)?,
            metadata: row.get(6)?,
            recorded_at: row.get(7)?,
        })
    }

    fn into_envelope(self) -> Result<EventEnvelope> {
        let recorded_at = chrono::DateTime::parse_from_rfc3339(&self.recorded_at)
            .map_err(|e| {
                CgError::new(CgErrorKind::Serialization)
                    .with_op("read_events")
                    .with_entity_id(self.event_id.clone())
                    .with_message(format!("invalid recorded_at: {}", e))
            })?
            .with_timezone(&chrono::Utc);
        Ok(EventEnvelope {
            sequence_number: self.sequence_number as u64,
            stream_name: self.stream_name,
            version: self.version as u64,
            event_type: self.event_type,
            payload: decode("read_events", &self.payload)?,
            metadata: decode("read_events", &self.metadata)?,
            event_id: self.event_id,
            recorded_at,
        })
    }
}
