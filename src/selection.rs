//! Track selection: difficulty policy for catalog queries and the
//! first-playable-candidate rule.

use thiserror::Error;

use crate::models::{Difficulty, Track};

/// Default number of candidates requested per catalog query.
pub const DEFAULT_RESULT_LIMIT: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// No candidate with a playable preview for the chosen genre/difficulty.
    #[error("no playable track available, try again")]
    NoTrackAvailable,
}

/// Catalog request for one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Lowercase genre seeds; empty means any genre ("Mixed").
    pub genres: Vec<String>,
    pub result_limit: usize,
    pub minimum_popularity: u8,
}

impl CatalogQuery {
    /// Build the query for a genre selection and difficulty.
    pub fn new(genre: Option<&str>, difficulty: Difficulty, result_limit: usize) -> Self {
        let genres = genre
            .map(|g| g.trim().to_lowercase())
            .filter(|g| !g.is_empty())
            .into_iter()
            .collect();

        CatalogQuery {
            genres,
            result_limit: result_limit.max(1),
            minimum_popularity: difficulty.popularity_floor(),
        }
    }
}

/// Pick the first candidate, in catalog order, that has a preview URL.
pub fn select_track<I>(candidates: I) -> Result<Track, SelectionError>
where
    I: IntoIterator<Item = Track>,
{
    let mut skipped = 0usize;
    for track in candidates {
        if track.is_playable() {
            tracing::debug!(track_id = %track.id, skipped, "selected track");
            return Ok(track);
        }
        skipped += 1;
    }
    tracing::debug!(skipped, "no playable candidate");
    Err(SelectionError::NoTrackAvailable)
}
