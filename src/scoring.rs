//! Scoring functions for the guessing game.
//!
//! This module contains:
//! - Guess judgment (bigram similarity against the canonical title)
//! - Score delta for a correct guess (snippet length and replay penalty)
//! - The upsert-if-higher leaderboard rule

use crate::models::{Closeness, Judgment, LeaderboardEntry, Verdict};
use crate::normalize::match_key;

// ============================================================================
// Thresholds
// ============================================================================

/// Minimum similarity for a guess to count as correct.
pub const SIMILARITY_THRESHOLD: f64 = 0.85;

/// Minimum similarity for an incorrect guess to be reported as "close".
/// Feedback only; never affects scoring.
pub const CLOSE_THRESHOLD: f64 = 0.5;

/// Points numerator: a correct guess scores `BASE_POINTS / snippet_seconds`.
pub const BASE_POINTS: f64 = 30.0;

/// Multiplier applied for the rest of a round once the snippet is replayed.
pub const REPLAY_MULTIPLIER: f64 = 0.5;

// ============================================================================
// Similarity
// ============================================================================

/// Case-insensitive similarity between two strings (0.0 to 1.0).
///
/// Both sides are folded with [`match_key`] and compared with the
/// Sorensen-Dice coefficient over character bigrams (whitespace ignored).
/// Identical strings score 1.0; strings sharing no bigram score 0.0.
pub fn title_similarity(guess: &str, canonical: &str) -> f64 {
    let a = match_key(guess);
    let b = match_key(canonical);

    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    if a == b {
        return 1.0;
    }

    strsim::sorensen_dice(&a, &b).clamp(0.0, 1.0)
}

/// Judge a guess against a canonical title. Pure: the caller applies the
/// streak/reset policy.
///
/// An empty (or whitespace-only) guess is always incorrect.
pub fn judge_guess(guess: &str, canonical_title: &str) -> Judgment {
    let similarity = title_similarity(guess, canonical_title);

    let verdict = if similarity >= SIMILARITY_THRESHOLD {
        Verdict::Correct
    } else {
        Verdict::Incorrect
    };

    let closeness = if verdict == Verdict::Correct {
        Closeness::Exact
    } else if similarity >= CLOSE_THRESHOLD {
        Closeness::Close
    } else {
        Closeness::WayOff
    };

    tracing::debug!(guess, canonical_title, similarity, ?verdict, "judged guess");

    Judgment {
        verdict,
        similarity,
        closeness,
    }
}

// ============================================================================
// Score Delta
// ============================================================================

/// Points for a correct guess: `round(30 / snippet_seconds * multiplier)`.
///
/// Rounding is half away from zero (`f64::round`), so 0.5 becomes 1.
/// Non-positive or non-finite inputs score 0.
pub fn score_delta(snippet_seconds: f64, multiplier: f64) -> u32 {
    if !snippet_seconds.is_finite() || snippet_seconds <= 0.0 || !multiplier.is_finite() {
        return 0;
    }
    let raw = (BASE_POINTS / snippet_seconds * multiplier).round();
    if raw <= 0.0 {
        0
    } else {
        raw.min(u32::MAX as f64) as u32
    }
}

// ============================================================================
// Leaderboard Rule
// ============================================================================

/// Whether a new streak score should be written to the leaderboard.
/// Writes only when there is no prior entry or the new score is strictly higher.
pub fn should_upsert(existing: Option<&LeaderboardEntry>, new_score: u32) -> bool {
    match existing {
        None => true,
        Some(entry) => new_score > entry.score,
    }
}
