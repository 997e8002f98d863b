//! Round orchestration.
//!
//! `RoundController` owns the `GameSession` and the active `Round` and turns
//! front-end events (start, guess, pass, replay, playback ticks) into state
//! transitions. It performs no I/O: catalog requests leave as
//! [`SelectionTicket`]s and come back through [`RoundController::complete_selection`].
//!
//! Every ticket carries the generation it was issued for. A response whose
//! generation is no longer current is discarded, so a slow catalog reply can
//! never overwrite a newer round.
//!
//! Phases:
//!
//! ```text
//! Idle --start--> Loading --track--> AwaitingGuess --correct/pass--> Loading
//!                    |                   |  ^
//!                    | no track/failure  |  | incorrect (same round)
//!                    v                   +--+
//!                 Stalled --retry--> Loading
//! ```

use thiserror::Error;

use crate::models::{find_genre, Difficulty, Judgment, Track};
use crate::round::{PlaybackCommand, Round};
use crate::scoring::{judge_guess, score_delta};
use crate::selection::{select_track, CatalogQuery, SelectionError, DEFAULT_RESULT_LIMIT};
use crate::services::{Identity, ServiceError};
use crate::session::{GameSession, Player};

// ============================================================================
// Outcomes
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No game in progress; settings may change.
    Idle,
    /// A track selection is outstanding.
    Loading,
    /// A round is active and accepts guesses.
    AwaitingGuess,
    /// The last selection failed; retry with `request_next_track`.
    Stalled,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    #[error("settings can only change while no round is active")]
    SettingsLocked,
    #[error("unknown genre '{0}'")]
    UnknownGenre(String),
}

/// An outstanding catalog request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionTicket {
    generation: u64,
    pub query: CatalogQuery,
}

impl SelectionTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Streak score to offer to the leaderboard (upsert-if-higher).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSubmission {
    pub email: String,
    pub name: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// No access token; sign-in was requested and nothing else happened.
    NotSignedIn,
    /// A game is already running.
    AlreadyStarted,
    Loading(SelectionTicket),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionOutcome {
    /// New round is active; start playback of its preview.
    Loaded { track: Track, playback: PlaybackCommand },
    /// Response belonged to an older generation and was dropped.
    Stale,
    /// Nothing playable came back; retry is possible.
    NoTrackAvailable,
    /// Collaborator failure; retry is possible.
    FetchFailed(ServiceError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuessOutcome {
    Correct {
        judgment: Judgment,
        /// The round's track, for the reveal message (raw title).
        revealed: Track,
        delta: u32,
        score: u32,
        submission: Option<ScoreSubmission>,
        next: Option<SelectionTicket>,
    },
    /// Streak reset; the same round stays open.
    Incorrect { judgment: Judgment, lost_score: u32 },
    /// No round accepts guesses right now.
    Ignored,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PassOutcome {
    Passed {
        revealed: Track,
        lost_score: u32,
        next: Option<SelectionTicket>,
    },
    Ignored,
}

// ============================================================================
// Controller
// ============================================================================

#[derive(Debug)]
pub struct RoundController {
    session: GameSession,
    round: Option<Round>,
    phase: Phase,
    generation: u64,
    result_limit: usize,
}

impl RoundController {
    pub fn new(session: GameSession) -> Self {
        RoundController {
            session,
            round: None,
            phase: Phase::Idle,
            generation: 0,
            result_limit: DEFAULT_RESULT_LIMIT,
        }
    }

    pub fn with_result_limit(mut self, result_limit: usize) -> Self {
        self.result_limit = result_limit.max(1);
        self
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True while a selection request is outstanding.
    pub fn is_busy(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn score(&self) -> u32 {
        self.session.accumulated_score()
    }

    fn settings_unlocked(&self) -> bool {
        matches!(self.phase, Phase::Idle | Phase::Stalled)
    }

    // ------------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------------

    /// Choose a genre from the fixed list, or `None` for mixed.
    pub fn set_genre(&mut self, genre: Option<&str>) -> Result<(), ControlError> {
        if !self.settings_unlocked() {
            return Err(ControlError::SettingsLocked);
        }
        self.session.genre = match genre {
            None => None,
            Some(g) => Some(
                find_genre(g)
                    .ok_or_else(|| ControlError::UnknownGenre(g.to_string()))?
                    .to_string(),
            ),
        };
        Ok(())
    }

    pub fn set_difficulty(&mut self, difficulty: Difficulty) -> Result<(), ControlError> {
        if !self.settings_unlocked() {
            return Err(ControlError::SettingsLocked);
        }
        self.session.difficulty = difficulty;
        Ok(())
    }

    /// Snippet length for the next round. The active round keeps its cap.
    pub fn set_snippet_seconds(&mut self, seconds: f64) -> f64 {
        self.session.set_snippet_seconds(seconds)
    }

    pub fn set_player(&mut self, player: Option<Player>) {
        self.session.set_player(player);
    }

    // ------------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------------

    /// Start a game. Without an access token, sign-in is requested instead.
    pub fn start<I: Identity + ?Sized>(&mut self, identity: &mut I) -> StartOutcome {
        if self.phase != Phase::Idle {
            return StartOutcome::AlreadyStarted;
        }
        if identity.access_token().is_none() {
            identity.request_sign_in();
            return StartOutcome::NotSignedIn;
        }
        tracing::info!(
            genre = self.session.genre().unwrap_or("Mixed"),
            difficulty = %self.session.difficulty(),
            "game started"
        );
        StartOutcome::Loading(self.issue_ticket())
    }

    /// Retry after a failed selection. Ignored (None) unless stalled, which
    /// also makes duplicate triggers while loading a no-op.
    pub fn request_next_track(&mut self) -> Option<SelectionTicket> {
        if self.phase != Phase::Stalled {
            return None;
        }
        Some(self.issue_ticket())
    }

    fn issue_ticket(&mut self) -> SelectionTicket {
        self.generation += 1;
        self.phase = Phase::Loading;
        SelectionTicket {
            generation: self.generation,
            query: CatalogQuery::new(
                self.session.genre(),
                self.session.difficulty(),
                self.result_limit,
            ),
        }
    }

    /// Deliver a catalog response. Failures leave the previous round and score
    /// untouched.
    pub fn complete_selection(
        &mut self,
        ticket: &SelectionTicket,
        response: Result<Vec<Track>, ServiceError>,
    ) -> SelectionOutcome {
        if ticket.generation != self.generation || self.phase != Phase::Loading {
            tracing::warn!(
                ticket = ticket.generation,
                current = self.generation,
                "discarding stale catalog response"
            );
            return SelectionOutcome::Stale;
        }

        let candidates = match response {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "track selection failed");
                self.phase = Phase::Stalled;
                return SelectionOutcome::FetchFailed(e);
            }
        };

        match select_track(candidates) {
            Ok(track) => {
                let round = Round::new(track.clone(), self.session.snippet_seconds());
                tracing::info!(
                    track_id = %track.id,
                    snippet_seconds = round.snippet_seconds(),
                    "round started"
                );
                self.round = Some(round);
                self.phase = Phase::AwaitingGuess;
                SelectionOutcome::Loaded {
                    track,
                    playback: PlaybackCommand::Start,
                }
            }
            Err(SelectionError::NoTrackAvailable) => {
                self.phase = Phase::Stalled;
                SelectionOutcome::NoTrackAvailable
            }
        }
    }

    // ------------------------------------------------------------------------
    // Guessing
    // ------------------------------------------------------------------------

    pub fn submit_guess(&mut self, guess: &str) -> GuessOutcome {
        if self.phase != Phase::AwaitingGuess {
            return GuessOutcome::Ignored;
        }
        let Some(round) = self.round.as_ref() else {
            return GuessOutcome::Ignored;
        };

        let judgment = judge_guess(guess, round.canonical_title());
        if !judgment.is_correct() {
            let lost_score = self.session.reset_streak();
            tracing::info!(similarity = judgment.similarity, lost_score, "incorrect guess");
            return GuessOutcome::Incorrect {
                judgment,
                lost_score,
            };
        }

        let delta = score_delta(round.snippet_seconds(), round.score_multiplier());
        let revealed = round.track().clone();
        let score = self.session.record_correct(delta);
        let submission = self.session.player().map(|p| ScoreSubmission {
            email: p.email.clone(),
            name: p.name.clone(),
            score,
        });
        tracing::info!(delta, score, "correct guess");

        GuessOutcome::Correct {
            judgment,
            revealed,
            delta,
            score,
            submission,
            next: Some(self.issue_ticket()),
        }
    }

    /// Skip the current track. Breaks the streak.
    pub fn pass(&mut self) -> PassOutcome {
        if self.phase != Phase::AwaitingGuess {
            return PassOutcome::Ignored;
        }
        let Some(round) = self.round.as_ref() else {
            return PassOutcome::Ignored;
        };
        let revealed = round.track().clone();
        let lost_score = self.session.reset_streak();
        tracing::info!(track_id = %revealed.id, lost_score, "passed");

        PassOutcome::Passed {
            revealed,
            lost_score,
            next: Some(self.issue_ticket()),
        }
    }

    /// End the game. Outstanding selections become stale.
    pub fn end_game(&mut self) -> u32 {
        self.generation += 1;
        self.round = None;
        self.phase = Phase::Idle;
        self.session.reset_streak()
    }

    // ------------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------------

    fn active_round_mut(&mut self) -> Option<&mut Round> {
        if self.phase == Phase::AwaitingGuess {
            self.round.as_mut()
        } else {
            None
        }
    }

    pub fn replay(&mut self) -> Option<PlaybackCommand> {
        let command = self.active_round_mut()?.replay();
        if command.is_some() {
            tracing::debug!("replay used");
        }
        command
    }

    pub fn on_time_update(&mut self, elapsed_seconds: f64, is_playing: bool) -> Option<PlaybackCommand> {
        self.active_round_mut()?
            .on_time_update(elapsed_seconds, is_playing)
    }

    pub fn on_ended(&mut self) -> Option<PlaybackCommand> {
        self.active_round_mut()?.on_ended()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Verdict;
    use crate::scoring::REPLAY_MULTIPLIER;

    struct FakeIdentity {
        token: Option<String>,
        sign_in_requests: usize,
    }

    impl Identity for FakeIdentity {
        fn access_token(&self) -> Option<String> {
            self.token.clone()
        }
        fn request_sign_in(&mut self) {
            self.sign_in_requests += 1;
        }
    }

    fn signed_in() -> FakeIdentity {
        FakeIdentity {
            token: Some("token".to_string()),
            sign_in_requests: 0,
        }
    }

    fn track(id: &str, title: &str) -> Track {
        Track {
            id: id.to_string(),
            raw_title: title.to_string(),
            artist: "Artist".to_string(),
            preview_url: Some(format!("https://p/{}.mp3", id)),
            popularity: 75,
        }
    }

    fn controller_with_player() -> RoundController {
        RoundController::new(GameSession::new().with_player(Player {
            name: "Pat".to_string(),
            email: "pat@example.com".to_string(),
        }))
    }

    /// Start a game and load `first` as the first round.
    fn started(first: Track, snippet: f64) -> RoundController {
        let mut c = controller_with_player();
        c.set_snippet_seconds(snippet);
        let StartOutcome::Loading(ticket) = c.start(&mut signed_in()) else {
            panic!("expected loading");
        };
        let outcome = c.complete_selection(&ticket, Ok(vec![first]));
        assert!(matches!(outcome, SelectionOutcome::Loaded { .. }));
        c
    }

    fn next_ticket(outcome: GuessOutcome) -> SelectionTicket {
        match outcome {
            GuessOutcome::Correct { next: Some(t), .. } => t,
            other => panic!("expected correct guess, got {:?}", other),
        }
    }

    #[test]
    fn test_start_without_token_requests_sign_in() {
        let mut c = controller_with_player();
        let mut identity = FakeIdentity {
            token: None,
            sign_in_requests: 0,
        };
        assert_eq!(c.start(&mut identity), StartOutcome::NotSignedIn);
        assert_eq!(identity.sign_in_requests, 1);
        assert_eq!(c.phase(), Phase::Idle);
        assert!(c.round().is_none());
    }

    #[test]
    fn test_start_builds_query_from_settings() {
        let mut c = controller_with_player().with_result_limit(7);
        c.set_genre(Some("rock")).unwrap();
        c.set_difficulty(Difficulty::Easy).unwrap();
        let StartOutcome::Loading(ticket) = c.start(&mut signed_in()) else {
            panic!("expected loading");
        };
        assert_eq!(ticket.query.genres, vec!["rock".to_string()]);
        assert_eq!(ticket.query.minimum_popularity, 70);
        assert_eq!(ticket.query.result_limit, 7);
        assert!(c.is_busy());
        assert_eq!(c.start(&mut signed_in()), StartOutcome::AlreadyStarted);
    }

    #[test]
    fn test_unknown_genre_rejected() {
        let mut c = controller_with_player();
        assert_eq!(
            c.set_genre(Some("polka")),
            Err(ControlError::UnknownGenre("polka".to_string()))
        );
        assert_eq!(c.session().genre(), None);
    }

    #[test]
    fn test_settings_locked_during_round() {
        let mut c = started(track("a", "Yellow"), 1.0);
        assert_eq!(c.set_genre(Some("Jazz")), Err(ControlError::SettingsLocked));
        assert_eq!(c.set_difficulty(Difficulty::Hard), Err(ControlError::SettingsLocked));
        assert_eq!(c.session().difficulty(), Difficulty::Medium);
    }

    #[test]
    fn test_correct_guess_scores_and_advances() {
        let mut c = started(track("a", "Yellow (Remastered)"), 5.0);
        let outcome = c.submit_guess("yellow");
        match &outcome {
            GuessOutcome::Correct {
                judgment,
                revealed,
                delta,
                score,
                submission,
                next,
            } => {
                assert_eq!(judgment.verdict, Verdict::Correct);
                assert_eq!(revealed.raw_title, "Yellow (Remastered)");
                assert_eq!(*delta, 6);
                assert_eq!(*score, 6);
                assert_eq!(
                    submission.as_ref().map(|s| (s.email.as_str(), s.score)),
                    Some(("pat@example.com", 6))
                );
                assert!(next.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.phase(), Phase::Loading);
        // No guessing while the next track loads
        assert_eq!(c.submit_guess("yellow"), GuessOutcome::Ignored);
    }

    #[test]
    fn test_streak_accumulates_across_rounds() {
        let mut c = started(track("a", "Yellow"), 30.0);
        let ticket = next_ticket(c.submit_guess("Yellow"));
        assert_eq!(c.score(), 1);
        c.complete_selection(&ticket, Ok(vec![track("b", "Clocks")]));
        next_ticket(c.submit_guess("clocks"));
        assert_eq!(c.score(), 2);
    }

    #[test]
    fn test_no_submission_without_player() {
        let mut c = RoundController::new(GameSession::new());
        let StartOutcome::Loading(ticket) = c.start(&mut signed_in()) else {
            panic!("expected loading");
        };
        c.complete_selection(&ticket, Ok(vec![track("a", "Yellow")]));
        match c.submit_guess("Yellow") {
            GuessOutcome::Correct { submission, .. } => assert!(submission.is_none()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_incorrect_guess_resets_streak_and_keeps_round() {
        let mut c = started(track("a", "Yellow"), 1.0);
        let ticket = next_ticket(c.submit_guess("Yellow"));
        c.complete_selection(&ticket, Ok(vec![track("b", "Clocks")]));
        assert_eq!(c.score(), 30);

        match c.submit_guess("Fix You") {
            GuessOutcome::Incorrect { lost_score, .. } => assert_eq!(lost_score, 30),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.score(), 0);
        assert_eq!(c.phase(), Phase::AwaitingGuess);
        assert_eq!(c.round().unwrap().track().id, "b");

        // Guessing again on the same round still works
        assert!(matches!(c.submit_guess("Clocks"), GuessOutcome::Correct { .. }));
    }

    #[test]
    fn test_empty_guess_is_incorrect() {
        let mut c = started(track("a", "Yellow"), 1.0);
        assert!(matches!(c.submit_guess("   "), GuessOutcome::Incorrect { .. }));
    }

    #[test]
    fn test_pass_resets_and_advances() {
        let mut c = started(track("a", "Yellow"), 1.0);
        let ticket = next_ticket(c.submit_guess("Yellow"));
        c.complete_selection(&ticket, Ok(vec![track("b", "Clocks")]));

        match c.pass() {
            PassOutcome::Passed {
                revealed,
                lost_score,
                next,
            } => {
                assert_eq!(revealed.id, "b");
                assert_eq!(lost_score, 30);
                assert!(next.is_some());
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.score(), 0);
        assert_eq!(c.pass(), PassOutcome::Ignored);
    }

    #[test]
    fn test_no_track_available_leaves_round_untouched() {
        let mut c = started(track("a", "Yellow"), 1.0);
        let ticket = next_ticket(c.submit_guess("Yellow"));
        let mut unplayable = track("b", "Clocks");
        unplayable.preview_url = None;

        assert_eq!(
            c.complete_selection(&ticket, Ok(vec![unplayable])),
            SelectionOutcome::NoTrackAvailable
        );
        assert_eq!(c.phase(), Phase::Stalled);
        assert_eq!(c.round().unwrap().track().id, "a");
        assert_eq!(c.score(), 30);

        let retry = c.request_next_track().expect("retry allowed when stalled");
        c.complete_selection(&retry, Ok(vec![track("c", "Sparks")]));
        assert_eq!(c.round().unwrap().track().id, "c");
        assert_eq!(c.score(), 30);
    }

    #[test]
    fn test_no_track_on_first_round_creates_nothing() {
        let mut c = controller_with_player();
        let StartOutcome::Loading(ticket) = c.start(&mut signed_in()) else {
            panic!("expected loading");
        };
        assert_eq!(
            c.complete_selection(&ticket, Ok(Vec::new())),
            SelectionOutcome::NoTrackAvailable
        );
        assert!(c.round().is_none());
        assert_eq!(c.submit_guess("anything"), GuessOutcome::Ignored);
    }

    #[test]
    fn test_fetch_failure_keeps_state() {
        let mut c = started(track("a", "Yellow"), 1.0);
        let ticket = next_ticket(c.submit_guess("Yellow"));
        let err = ServiceError::Catalog("timeout".to_string());
        assert_eq!(
            c.complete_selection(&ticket, Err(err.clone())),
            SelectionOutcome::FetchFailed(err)
        );
        assert_eq!(c.score(), 30);
        assert_eq!(c.round().unwrap().track().id, "a");
        assert_eq!(c.phase(), Phase::Stalled);
    }

    #[test]
    fn test_duplicate_next_track_while_busy_is_noop() {
        let mut c = started(track("a", "Yellow"), 1.0);
        let ticket = next_ticket(c.submit_guess("Yellow"));
        assert!(c.is_busy());
        assert_eq!(c.request_next_track(), None);
        assert_eq!(c.pass(), PassOutcome::Ignored);
        // The original ticket is still the live one
        assert!(matches!(
            c.complete_selection(&ticket, Ok(vec![track("b", "Clocks")])),
            SelectionOutcome::Loaded { .. }
        ));
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut c = started(track("a", "Yellow"), 1.0);
        let old = next_ticket(c.submit_guess("Yellow"));
        c.complete_selection(&old, Err(ServiceError::Catalog("x".to_string())));
        let fresh = c.request_next_track().unwrap();
        c.complete_selection(&fresh, Ok(vec![track("c", "Sparks")]));

        // A late duplicate of the old response must not replace the new round
        assert_eq!(
            c.complete_selection(&old, Ok(vec![track("z", "Late")])),
            SelectionOutcome::Stale
        );
        assert_eq!(c.round().unwrap().track().id, "c");
        assert!(fresh.generation() > old.generation());
    }

    #[test]
    fn test_end_game_invalidates_outstanding_ticket() {
        let mut c = started(track("a", "Yellow"), 1.0);
        let ticket = next_ticket(c.submit_guess("Yellow"));
        assert_eq!(c.end_game(), 30);
        assert_eq!(c.phase(), Phase::Idle);
        assert_eq!(
            c.complete_selection(&ticket, Ok(vec![track("b", "Clocks")])),
            SelectionOutcome::Stale
        );
        assert!(c.round().is_none());
    }

    #[test]
    fn test_replay_penalty_applies_to_score() {
        let mut c = started(track("a", "Yellow"), 1.0);
        assert_eq!(c.replay(), None);
        assert_eq!(c.on_time_update(1.0, true), Some(PlaybackCommand::StopAndRewind));
        assert_eq!(c.replay(), Some(PlaybackCommand::ReplayFromStart));
        // Second replay before a new track is a no-op
        assert_eq!(c.replay(), None);
        assert_eq!(c.round().unwrap().score_multiplier(), REPLAY_MULTIPLIER);
        assert_eq!(c.score(), 0);

        match c.submit_guess("Yellow") {
            GuessOutcome::Correct { delta, .. } => assert_eq!(delta, 15),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_snippet_change_applies_next_round() {
        let mut c = started(track("a", "Yellow"), 1.0);
        c.set_snippet_seconds(5.0);
        assert_eq!(c.round().unwrap().snippet_seconds(), 1.0);
        match c.submit_guess("Yellow") {
            GuessOutcome::Correct { delta, next, .. } => {
                assert_eq!(delta, 30);
                c.complete_selection(&next.unwrap(), Ok(vec![track("b", "Clocks")]));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.round().unwrap().snippet_seconds(), 5.0);
    }

    #[test]
    fn test_playback_events_ignored_without_round() {
        let mut c = controller_with_player();
        assert_eq!(c.on_time_update(10.0, true), None);
        assert_eq!(c.on_ended(), None);
        assert_eq!(c.replay(), None);
    }
}
