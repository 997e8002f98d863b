//! Collaborator contracts: music catalog, leaderboard store, identity provider
//! and playback widget.

use thiserror::Error;

use crate::models::{LeaderboardEntry, Track};
use crate::selection::CatalogQuery;

/// Transient collaborator failure. The operation that failed is treated as
/// not having happened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("catalog request failed: {0}")]
    Catalog(String),
    #[error("leaderboard request failed: {0}")]
    Leaderboard(String),
    /// Missing or expired access credential.
    #[error("not signed in")]
    NotSignedIn,
}

/// Music catalog: returns candidates in catalog order, possibly empty.
pub trait Catalog {
    fn search(&self, query: &CatalogQuery, access_token: &str) -> Result<Vec<Track>, ServiceError>;
}

/// Leaderboard store. `upsert` is unconditional on the email key; callers
/// enforce upsert-if-higher.
pub trait Leaderboard {
    /// Entries sorted by descending score, at most `n`.
    fn fetch_top(&self, n: usize) -> Result<Vec<LeaderboardEntry>, ServiceError>;

    fn entry(&self, email: &str) -> Result<Option<LeaderboardEntry>, ServiceError>;

    fn upsert(&mut self, entry: &LeaderboardEntry) -> Result<(), ServiceError>;
}

/// Identity/session provider.
pub trait Identity {
    fn access_token(&self) -> Option<String>;

    /// Kick off an external sign-in flow. The result shows up later through
    /// `access_token`.
    fn request_sign_in(&mut self);
}

/// Audio playback widget. Progress and completion come back to the
/// controller as `on_time_update` / `on_ended` calls.
pub trait Playback {
    fn play(&mut self, url: &str);
    fn pause(&mut self);
    fn seek_to_start(&mut self);
}
