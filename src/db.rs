//! Session persistence
//!
//! One row per thread id holding the JSON-serialized conversation state.

mod schema;

pub use schema::*;

use crate::state_machine::ConversationState;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("State serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Session not found: {0}")]
    SessionNotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory database
    pub fn open_in_memory() -> DbResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> DbResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the state stored for a thread, if any
    pub fn load_session(&self, thread_id: &str) -> DbResult<Option<ConversationState>> {
        let conn = self.conn();
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM sessions WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|json| serde_json::from_str(&json).map_err(DbError::from))
            .transpose()
    }

    /// Insert or replace the state for a thread
    pub fn save_session(&self, thread_id: &str, state: &ConversationState) -> DbResult<()> {
        let json = serde_json::to_string(state)?;
        let turn_count = i64::try_from(state.turns().len()).unwrap_or(i64::MAX);
        let now = Utc::now().to_rfc3339();

        self.conn().execute(
            "INSERT INTO sessions (thread_id, state, turn_count, approval_in_progress, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(thread_id) DO UPDATE SET
                state = excluded.state,
                turn_count = excluded.turn_count,
                approval_in_progress = excluded.approval_in_progress,
                updated_at = excluded.updated_at",
            params![thread_id, json, turn_count, state.approval_in_progress(), now],
        )?;
        Ok(())
    }

    /// List stored sessions, most recently updated first
    pub fn list_sessions(&self) -> DbResult<Vec<SessionSummary>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT thread_id, turn_count, approval_in_progress, created_at, updated_at
             FROM sessions ORDER BY updated_at DESC, thread_id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(SessionSummary {
                thread_id: row.get(0)?,
                turn_count: row.get(1)?,
                approval_in_progress: row.get(2)?,
                created_at: parse_datetime(&row.get::<_, String>(3)?),
                updated_at: parse_datetime(&row.get::<_, String>(4)?),
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
    }

    /// Delete a thread's session
    pub fn delete_session(&self, thread_id: &str) -> DbResult<()> {
        let deleted = self
            .conn()
            .execute("DELETE FROM sessions WHERE thread_id = ?1", params![thread_id])?;
        if deleted == 0 {
            return Err(DbError::SessionNotFound(thread_id.to_string()));
        }
        Ok(())
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
