//! Per-round state: the active track, the snippet cap, playback progress and
//! the one-shot replay.

use crate::models::Track;
use crate::normalize::normalize_title;
use crate::scoring::REPLAY_MULTIPLIER;
use crate::services::Playback;

// ============================================================================
// Snippet Duration
// ============================================================================

pub const MIN_SNIPPET_SECONDS: f64 = 0.5;
pub const MAX_SNIPPET_SECONDS: f64 = 30.0;
pub const SNIPPET_STEP_SECONDS: f64 = 0.5;
pub const DEFAULT_SNIPPET_SECONDS: f64 = 1.0;

/// Clamp a requested snippet length to the allowed range, snapped to 0.5 s steps.
pub fn clamp_snippet_seconds(seconds: f64) -> f64 {
    if !seconds.is_finite() {
        return DEFAULT_SNIPPET_SECONDS;
    }
    let snapped = (seconds / SNIPPET_STEP_SECONDS).round() * SNIPPET_STEP_SECONDS;
    snapped.clamp(MIN_SNIPPET_SECONDS, MAX_SNIPPET_SECONDS)
}

// ============================================================================
// Playback Commands
// ============================================================================

/// What the playback widget should do in response to a round event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    /// Load and play the round's preview from the start.
    Start,
    /// Snippet cap reached (or clip ended): pause and rewind.
    StopAndRewind,
    /// Replay granted: rewind and play again.
    ReplayFromStart,
}

impl PlaybackCommand {
    /// Drive a playback collaborator.
    pub fn apply<P: Playback + ?Sized>(self, player: &mut P, preview_url: &str) {
        match self {
            PlaybackCommand::Start => {
                player.seek_to_start();
                player.play(preview_url);
            }
            PlaybackCommand::StopAndRewind => {
                player.pause();
                player.seek_to_start();
            }
            PlaybackCommand::ReplayFromStart => {
                player.seek_to_start();
                player.play(preview_url);
            }
        }
    }
}

// ============================================================================
// Round
// ============================================================================

/// Mutable state of one guess-attempt cycle.
///
/// At most one replay per round; the multiplier starts at 1.0 and drops to
/// the replay penalty exactly once.
#[derive(Debug, Clone)]
pub struct Round {
    track: Track,
    canonical_title: String,
    snippet_seconds: f64,
    elapsed_seconds: f64,
    has_replayed: bool,
    can_replay: bool,
    score_multiplier: f64,
}

impl Round {
    pub fn new(track: Track, snippet_seconds: f64) -> Self {
        let canonical_title = normalize_title(&track.raw_title);
        Round {
            track,
            canonical_title,
            snippet_seconds: clamp_snippet_seconds(snippet_seconds),
            elapsed_seconds: 0.0,
            has_replayed: false,
            can_replay: false,
            score_multiplier: 1.0,
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Title used for matching (never displayed).
    pub fn canonical_title(&self) -> &str {
        &self.canonical_title
    }

    pub fn snippet_seconds(&self) -> f64 {
        self.snippet_seconds
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    pub fn has_replayed(&self) -> bool {
        self.has_replayed
    }

    pub fn can_replay(&self) -> bool {
        self.can_replay
    }

    pub fn score_multiplier(&self) -> f64 {
        self.score_multiplier
    }

    /// Playback progress tick. Stops playback once the snippet cap is reached,
    /// whatever the real length of the clip.
    pub fn on_time_update(&mut self, elapsed_seconds: f64, is_playing: bool) -> Option<PlaybackCommand> {
        self.elapsed_seconds = elapsed_seconds.max(0.0);
        if is_playing && self.elapsed_seconds >= self.snippet_seconds {
            self.finish_snippet();
            return Some(PlaybackCommand::StopAndRewind);
        }
        None
    }

    /// The clip itself ran out before the cap.
    pub fn on_ended(&mut self) -> Option<PlaybackCommand> {
        self.finish_snippet();
        Some(PlaybackCommand::StopAndRewind)
    }

    /// Spend the round's replay. No-op (None) unless the snippet has finished
    /// playing once and the replay has not been used yet.
    pub fn replay(&mut self) -> Option<PlaybackCommand> {
        if !self.can_replay || self.has_replayed {
            return None;
        }
        self.elapsed_seconds = 0.0;
        self.score_multiplier = REPLAY_MULTIPLIER;
        self.has_replayed = true;
        self.can_replay = false;
        Some(PlaybackCommand::ReplayFromStart)
    }

    fn finish_snippet(&mut self) {
        self.elapsed_seconds = 0.0;
        if !self.has_replayed {
            self.can_replay = true;
        }
    }
}
