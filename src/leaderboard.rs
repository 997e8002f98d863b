//! Leaderboard stores and the upsert-if-higher write path.
//!
//! ## Schema
//!
//! ```sql
//! CREATE TABLE leaderboard (
//!     email  TEXT PRIMARY KEY,
//!     name   TEXT NOT NULL,
//!     score  INTEGER NOT NULL
//! );
//! ```

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use rustc_hash::FxHashMap;
use std::path::Path;

use crate::controller::ScoreSubmission;
use crate::models::LeaderboardEntry;
use crate::scoring::should_upsert;
use crate::services::{Leaderboard, ServiceError};

/// Default number of entries shown.
pub const DEFAULT_LEADERBOARD_SIZE: usize = 10;

fn store_error(e: rusqlite::Error) -> ServiceError {
    ServiceError::Leaderboard(e.to_string())
}

// ============================================================================
// SQLite Store
// ============================================================================

pub struct SqliteLeaderboard {
    conn: Connection,
}

impl SqliteLeaderboard {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open leaderboard database {:?}", path))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS leaderboard (
                email  TEXT PRIMARY KEY,
                name   TEXT NOT NULL,
                score  INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_leaderboard_score ON leaderboard(score DESC);",
        )
        .context("Failed to create leaderboard schema")?;
        Ok(SqliteLeaderboard { conn })
    }
}

impl Leaderboard for SqliteLeaderboard {
    fn fetch_top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT email, name, score FROM leaderboard
                 ORDER BY score DESC, email ASC
                 LIMIT ?1",
            )
            .map_err(store_error)?;

        let rows = stmt
            .query_map(params![n as i64], |row| {
                Ok(LeaderboardEntry {
                    email: row.get(0)?,
                    name: row.get(1)?,
                    score: row.get(2)?,
                })
            })
            .map_err(store_error)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(store_error)
    }

    fn entry(&self, email: &str) -> Result<Option<LeaderboardEntry>, ServiceError> {
        self.conn
            .query_row(
                "SELECT email, name, score FROM leaderboard WHERE email = ?1",
                params![email],
                |row| {
                    Ok(LeaderboardEntry {
                        email: row.get(0)?,
                        name: row.get(1)?,
                        score: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(store_error)
    }

    fn upsert(&mut self, entry: &LeaderboardEntry) -> Result<(), ServiceError> {
        self.conn
            .execute(
                "INSERT INTO leaderboard (email, name, score) VALUES (?1, ?2, ?3)
                 ON CONFLICT(email) DO UPDATE SET name = excluded.name, score = excluded.score",
                params![entry.email, entry.name, entry.score],
            )
            .map_err(store_error)?;
        Ok(())
    }
}

// ============================================================================
// In-Memory Store
// ============================================================================

/// Non-persistent store for sessions without a database.
#[derive(Debug, Default)]
pub struct MemoryLeaderboard {
    entries: FxHashMap<String, LeaderboardEntry>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Leaderboard for MemoryLeaderboard {
    fn fetch_top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, ServiceError> {
        let mut entries: Vec<LeaderboardEntry> = self.entries.values().cloned().collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.email.cmp(&b.email)));
        entries.truncate(n);
        Ok(entries)
    }

    fn entry(&self, email: &str) -> Result<Option<LeaderboardEntry>, ServiceError> {
        Ok(self.entries.get(email).cloned())
    }

    fn upsert(&mut self, entry: &LeaderboardEntry) -> Result<(), ServiceError> {
        self.entries.insert(entry.email.clone(), entry.clone());
        Ok(())
    }
}

// ============================================================================
// Write Path
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// New personal best written.
    Written,
    /// Stored score is already at least as high.
    Skipped { best: u32 },
}

/// Write a streak score only if it beats the player's stored score.
pub fn record_score<L: Leaderboard + ?Sized>(
    store: &mut L,
    submission: &ScoreSubmission,
) -> Result<RecordOutcome, ServiceError> {
    let existing = store.entry(&submission.email)?;
    if !should_upsert(existing.as_ref(), submission.score) {
        let best = existing.map(|e| e.score).unwrap_or_default();
        tracing::debug!(email = %submission.email, score = submission.score, best, "leaderboard write skipped");
        return Ok(RecordOutcome::Skipped { best });
    }

    store.upsert(&LeaderboardEntry {
        email: submission.email.clone(),
        name: submission.name.clone(),
        score: submission.score,
    })?;
    tracing::info!(email = %submission.email, score = submission.score, "leaderboard updated");
    Ok(RecordOutcome::Written)
}
