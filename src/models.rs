//! Core data models for the guessing game.
//!
//! Catalog records, difficulty policy, leaderboard rows and the result types
//! produced by guess judgment.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Genres
// ============================================================================

/// Genres offered by the game. The catalog is seeded with the lowercase form.
pub const GENRES: [&str; 7] = [
    "Pop",
    "Rock",
    "Hip Hop",
    "Electronic",
    "Country",
    "Jazz",
    "Classical",
];

/// Resolve a user-supplied genre against [`GENRES`] (case-insensitive).
/// Returns the canonical spelling.
pub fn find_genre(input: &str) -> Option<&'static str> {
    let needle = input.trim();
    GENRES
        .iter()
        .copied()
        .find(|g| g.eq_ignore_ascii_case(needle))
}

// ============================================================================
// Difficulty
// ============================================================================

/// Difficulty level. Lower popularity floors admit more obscure tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Minimum catalog popularity admitted at this difficulty.
    pub fn popularity_floor(self) -> u8 {
        match self {
            Difficulty::Easy => 70,
            Difficulty::Medium => 50,
            Difficulty::Hard => 30,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        };
        f.write_str(s)
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(format!("unknown difficulty '{}'", other)),
        }
    }
}

// ============================================================================
// Tracks
// ============================================================================

/// Track record as stored by the catalog collaborator (JSON file format).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    /// Credited artists in catalog order; the first is the primary artist.
    pub artists: Vec<String>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub popularity: u8, // 0-100
    #[serde(default)]
    pub preview_url: Option<String>,
}

/// One playable song candidate, immutable once attached to a round.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    /// Title exactly as returned by the catalog; shown in round results.
    pub raw_title: String,
    pub artist: String,
    pub preview_url: Option<String>,
    pub popularity: u8,
}

impl Track {
    /// True when the track carries a non-empty preview URL.
    pub fn is_playable(&self) -> bool {
        self.preview_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }
}

impl From<CatalogTrack> for Track {
    fn from(t: CatalogTrack) -> Self {
        Track {
            id: t.id,
            raw_title: t.name,
            artist: t.artists.into_iter().next().unwrap_or_default(),
            preview_url: t.preview_url,
            popularity: t.popularity.min(100),
        }
    }
}

// ============================================================================
// Leaderboard
// ============================================================================

/// Leaderboard row keyed by email.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub email: String,
    pub name: String,
    pub score: u32,
}

impl LeaderboardEntry {
    /// Name to show in the table, falling back to the email.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.email
        } else {
            &self.name
        }
    }
}

// ============================================================================
// Judgment
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect,
}

/// Feedback band for a guess. Does not affect scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closeness {
    Exact,
    Close,
    WayOff,
}

/// Result of comparing a guess with a canonical title.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgment {
    pub verdict: Verdict,
    pub similarity: f64, // 0.0-1.0
    pub closeness: Closeness,
}

impl Judgment {
    pub fn is_correct(&self) -> bool {
        self.verdict == Verdict::Correct
    }
}
