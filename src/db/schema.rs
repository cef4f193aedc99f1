//! Database schema and types

use chrono::{DateTime, Utc};
use serde::Serialize;

/// SQL schema for initialization
pub const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    thread_id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    turn_count INTEGER NOT NULL DEFAULT 0,
    approval_in_progress BOOLEAN NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at DESC);
";

/// Listing row for a stored session, without the full state
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub thread_id: String,
    pub turn_count: i64,
    pub approval_in_progress: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
