//! Cross-round game state: streak score, selection constraints and the
//! player's leaderboard identity.

use crate::models::Difficulty;
use crate::round::{clamp_snippet_seconds, DEFAULT_SNIPPET_SECONDS};

/// Leaderboard identity. Email is the uniqueness key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct GameSession {
    accumulated_score: u32,
    pub(crate) genre: Option<String>,
    pub(crate) difficulty: Difficulty,
    snippet_seconds: f64,
    player: Option<Player>,
}

impl Default for GameSession {
    fn default() -> Self {
        Self::new()
    }
}

impl GameSession {
    pub fn new() -> Self {
        GameSession {
            accumulated_score: 0,
            genre: None,
            difficulty: Difficulty::default(),
            snippet_seconds: DEFAULT_SNIPPET_SECONDS,
            player: None,
        }
    }

    pub fn with_player(mut self, player: Player) -> Self {
        self.player = Some(player);
        self
    }

    pub fn accumulated_score(&self) -> u32 {
        self.accumulated_score
    }

    /// Selected genre; `None` plays mixed genres.
    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    /// Snippet length that the next round will use.
    pub fn snippet_seconds(&self) -> f64 {
        self.snippet_seconds
    }

    /// Returns the clamped value actually stored.
    pub fn set_snippet_seconds(&mut self, seconds: f64) -> f64 {
        self.snippet_seconds = clamp_snippet_seconds(seconds);
        self.snippet_seconds
    }

    pub fn player(&self) -> Option<&Player> {
        self.player.as_ref()
    }

    pub fn set_player(&mut self, player: Option<Player>) {
        self.player = player;
    }

    /// Add a correct guess's points to the streak. Returns the new score.
    pub fn record_correct(&mut self, delta: u32) -> u32 {
        self.accumulated_score = self.accumulated_score.saturating_add(delta);
        self.accumulated_score
    }

    /// Streak broken (miss or pass). Returns the score that was lost.
    pub fn reset_streak(&mut self) -> u32 {
        std::mem::take(&mut self.accumulated_score)
    }
}

/// Text for sharing a score on social media.
pub fn share_text(score: u32, origin: &str) -> String {
    format!(
        "I scored {} points in Choon Music Guessing Game! Can you beat my score? Play now at {}",
        score, origin
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_share_text() {
        assert_eq!(
            share_text(12, "https://choon.example"),
            "I scored 12 points in Choon Music Guessing Game! Can you beat my score? Play now at https://choon.example"
        );
    }

    #[test]
    fn test_streak_accumulates_and_resets() {
        let mut session = GameSession::new();
        assert_eq!(session.record_correct(6), 6);
        assert_eq!(session.record_correct(1), 7);
        assert_eq!(session.reset_streak(), 7);
        assert_eq!(session.accumulated_score(), 0);
        assert_eq!(session.reset_streak(), 0);
    }

    #[test]
    fn test_snippet_seconds_clamped() {
        let mut session = GameSession::new();
        assert_eq!(session.snippet_seconds(), DEFAULT_SNIPPET_SECONDS);
        assert_eq!(session.set_snippet_seconds(45.0), 30.0);
        assert_eq!(session.set_snippet_seconds(0.1), 0.5);
    }

    #[test]
    fn test_saturating_score() {
        let mut session = GameSession::new();
        session.record_correct(u32::MAX);
        assert_eq!(session.record_correct(5), u32::MAX);
    }
}
