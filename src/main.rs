use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use crossbeam_channel::{select, tick, unbounded, Sender};
use indicatif::ProgressBar;
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

use choon::catalog::JsonCatalog;
use choon::config::GameConfig;
use choon::controller::{
    GuessOutcome, PassOutcome, RoundController, SelectionOutcome, SelectionTicket, StartOutcome,
};
use choon::leaderboard::{record_score, MemoryLeaderboard, RecordOutcome, SqliteLeaderboard};
use choon::models::{Closeness, Difficulty, LeaderboardEntry, Track, GENRES};
use choon::normalize::normalize_title;
use choon::progress::{create_spinner, format_seconds, log_phase, set_log_only};
use choon::round::PlaybackCommand;
use choon::scoring::judge_guess;
use choon::services::{Catalog, Identity, Leaderboard, Playback, ServiceError};
use choon::session::{share_text, GameSession, Player};

#[derive(Parser)]
#[command(name = "choon")]
#[command(about = "Guess the song from a short preview snippet")]
struct Args {
    /// TOML config file (falls back to $CHOON_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hide spinners and print tagged log lines instead
    #[arg(long, global = true)]
    log_only: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play an interactive game in the terminal
    Play(PlayArgs),
    /// Print the canonical (matching) form of catalog titles
    Normalize { titles: Vec<String> },
    /// Judge a guess against a catalog title
    Judge { guess: String, title: String },
    /// Show the leaderboard
    Leaderboard {
        #[arg(long)]
        db: Option<PathBuf>,
        #[arg(long)]
        top: Option<usize>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(ClapArgs)]
struct PlayArgs {
    /// Catalog JSON file
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Leaderboard SQLite database (in-memory when omitted)
    #[arg(long)]
    db: Option<PathBuf>,

    /// One of: Pop, Rock, Hip Hop, Electronic, Country, Jazz, Classical (mixed when omitted)
    #[arg(long)]
    genre: Option<String>,

    #[arg(long, default_value = "medium")]
    difficulty: Difficulty,

    /// Snippet length in seconds (0.5 to 30, 0.5 steps)
    #[arg(long)]
    snippet: Option<f64>,

    #[arg(long, env = "CHOON_NAME")]
    name: Option<String>,

    #[arg(long, env = "CHOON_EMAIL")]
    email: Option<String>,

    /// Catalog access token
    #[arg(long, env = "CHOON_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Origin used in the share text
    #[arg(long, default_value = "https://choon.app")]
    origin: String,
}

// ============================================================================
// Terminal collaborators
// ============================================================================

/// Length of a catalog preview clip.
const CLIP_SECONDS: f64 = 30.0;

const TICK_INTERVAL: Duration = Duration::from_millis(100);

struct TokenIdentity {
    token: Option<String>,
}

impl Identity for TokenIdentity {
    fn access_token(&self) -> Option<String> {
        self.token.clone().filter(|t| !t.trim().is_empty())
    }

    fn request_sign_in(&mut self) {
        eprintln!("Not signed in: pass --token or set CHOON_ACCESS_TOKEN, then start again.");
    }
}

/// Playback simulated by a clock; nothing is actually decoded.
#[derive(Default)]
struct ClockPlayer {
    started: Option<Instant>,
    offset: f64,
}

impl ClockPlayer {
    fn is_playing(&self) -> bool {
        self.started.is_some()
    }

    fn elapsed(&self) -> f64 {
        self.offset + self.started.map_or(0.0, |s| s.elapsed().as_secs_f64())
    }
}

impl Playback for ClockPlayer {
    fn play(&mut self, url: &str) {
        log_phase("PLAY", url);
        println!("♪ playing...");
        self.started = Some(Instant::now());
    }

    fn pause(&mut self) {
        self.offset = self.elapsed();
        self.started = None;
    }

    fn seek_to_start(&mut self) {
        self.offset = 0.0;
        if self.started.is_some() {
            self.started = Some(Instant::now());
        }
    }
}

enum Event {
    Line(String),
    InputClosed,
    Tracks {
        ticket: SelectionTicket,
        response: Result<Vec<Track>, ServiceError>,
    },
}

// ============================================================================
// Play
// ============================================================================

struct Game {
    controller: RoundController,
    catalog: Arc<JsonCatalog>,
    board: Box<dyn Leaderboard>,
    identity: TokenIdentity,
    player: ClockPlayer,
    events: Sender<Event>,
    spinner: Option<ProgressBar>,
    leaderboard_size: usize,
    origin: String,
}

impl Game {
    fn dispatch(&mut self, ticket: SelectionTicket) {
        self.spinner = Some(create_spinner("Loading next song"));
        log_phase("LOAD", &format!("generation {}", ticket.generation()));

        let events = self.events.clone();
        let catalog = Arc::clone(&self.catalog);
        let token = self.identity.access_token();
        thread::spawn(move || {
            let response = match token {
                Some(token) => catalog.search(&ticket.query, &token),
                None => Err(ServiceError::NotSignedIn),
            };
            // Receiver gone means the game already ended
            let _ = events.send(Event::Tracks { ticket, response });
        });
    }

    fn apply(&mut self, command: PlaybackCommand) {
        let url = self
            .controller
            .round()
            .and_then(|r| r.track().preview_url.clone())
            .unwrap_or_default();
        command.apply(&mut self.player, &url);
    }

    fn on_tracks(&mut self, ticket: SelectionTicket, response: Result<Vec<Track>, ServiceError>) {
        match self.controller.complete_selection(&ticket, response) {
            SelectionOutcome::Stale => return,
            SelectionOutcome::Loaded { track, playback } => {
                self.finish_spinner();
                let snippet = self
                    .controller
                    .round()
                    .map_or(0.0, |r| r.snippet_seconds());
                println!(
                    "\nNew song! Listen for {} (score {}) and type your guess.",
                    format_seconds(snippet),
                    self.controller.score()
                );
                log_phase("ROUND", &track.id);
                self.apply(playback);
            }
            SelectionOutcome::NoTrackAvailable => {
                self.finish_spinner();
                println!("No playable song found for this genre. Type :retry to try again.");
            }
            SelectionOutcome::FetchFailed(ServiceError::NotSignedIn) => {
                self.finish_spinner();
                self.identity.request_sign_in();
            }
            SelectionOutcome::FetchFailed(e) => {
                self.finish_spinner();
                println!("Failed to load song ({}). Type :retry to try again.", e);
            }
        }
    }

    fn finish_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn on_tick(&mut self) {
        if !self.player.is_playing() {
            return;
        }
        let elapsed = self.player.elapsed();
        let command = if elapsed >= CLIP_SECONDS {
            self.controller.on_ended()
        } else {
            self.controller.on_time_update(elapsed, true)
        };
        if let Some(command) = command {
            self.apply(command);
            if self.controller.round().is_some_and(|r| r.can_replay()) {
                println!("(snippet over, :replay to hear it once more at half points)");
            }
        }
    }

    fn print_board(&self) {
        match self.board.fetch_top(self.leaderboard_size) {
            Ok(entries) => print_entries(&entries),
            Err(e) => eprintln!("Error fetching leaderboard: {}", e),
        }
    }

    fn on_guess(&mut self, guess: &str) {
        match self.controller.submit_guess(guess) {
            GuessOutcome::Ignored => println!("No song is playing right now."),
            GuessOutcome::Incorrect { judgment, .. } => {
                let hint = match judgment.closeness {
                    Closeness::Close => "Close!",
                    _ => "Incorrect.",
                };
                println!("{} Try again or increase the snippet duration. Score reset to 0.", hint);
            }
            GuessOutcome::Correct {
                revealed,
                delta,
                score,
                submission,
                next,
                ..
            } => {
                self.player.pause();
                println!(
                    "Correct! The song was \"{}\" by {} (+{}, score {})",
                    revealed.raw_title, revealed.artist, delta, score
                );
                if let Some(submission) = submission {
                    match record_score(self.board.as_mut(), &submission) {
                        Ok(RecordOutcome::Written) => {
                            println!("New personal best saved.");
                            self.print_board();
                        }
                        Ok(RecordOutcome::Skipped { .. }) => {}
                        Err(e) => eprintln!("Error updating leaderboard: {}", e),
                    }
                }
                if let Some(ticket) = next {
                    self.dispatch(ticket);
                }
            }
        }
    }

    /// Returns false when the player quits.
    fn on_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            ":quit" | ":q" => return false,
            ":help" => print_help(),
            ":pass" => match self.controller.pass() {
                PassOutcome::Passed { revealed, next, .. } => {
                    self.player.pause();
                    println!(
                        "Passed. The song was \"{}\" by {}",
                        revealed.raw_title, revealed.artist
                    );
                    if let Some(ticket) = next {
                        self.dispatch(ticket);
                    }
                }
                PassOutcome::Ignored => println!("Nothing to pass."),
            },
            ":retry" => match self.controller.request_next_track() {
                Some(ticket) => self.dispatch(ticket),
                None => println!("Nothing to retry."),
            },
            ":replay" => match self.controller.replay() {
                Some(command) => self.apply(command),
                None => println!("Replay is not available."),
            },
            ":snippet" => match rest.trim().parse::<f64>() {
                Ok(secs) => {
                    let applied = self.controller.set_snippet_seconds(secs);
                    println!("Snippet set to {} from the next song.", format_seconds(applied));
                }
                Err(_) => println!("Usage: :snippet <seconds>"),
            },
            ":score" => println!("Score: {}", self.controller.score()),
            ":board" => self.print_board(),
            ":share" => println!("{}", share_text(self.controller.score(), &self.origin)),
            "" => {}
            _ => self.on_guess(line),
        }
        true
    }
}

fn print_help() {
    println!("Type a song title to guess. Commands:");
    println!("  :pass            skip this song (score resets)");
    println!("  :replay          hear the snippet once more (half points)");
    println!("  :snippet <secs>  snippet length from the next song");
    println!("  :retry           try loading a song again");
    println!("  :score  :board  :share  :quit");
}

fn print_entries(entries: &[LeaderboardEntry]) {
    println!("\nLeaderboard");
    println!("{:-<40}", "");
    if entries.is_empty() {
        println!("No scores yet.");
    }
    for (i, entry) in entries.iter().enumerate() {
        println!("{:>2}. {:<30} {:>5}", i + 1, entry.display_name(), entry.score);
    }
}

fn spawn_input_reader(events: Sender<Event>) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if events.send(Event::Line(line)).is_err() {
                return;
            }
        }
        let _ = events.send(Event::InputClosed);
    });
}

fn run_play(play: PlayArgs, mut config: GameConfig) -> Result<()> {
    if let Some(path) = play.catalog {
        config.catalog_path = Some(path);
    }
    if let Some(path) = play.db {
        config.database_path = Some(path);
    }
    if let Some(secs) = play.snippet {
        config.snippet_seconds = secs;
    }
    config.validate()?;

    let Some(catalog_path) = config.catalog_path.as_deref() else {
        bail!("No catalog configured: pass --catalog or set catalog_path in the config file");
    };
    let catalog = JsonCatalog::load(catalog_path)?;
    println!("Loaded {} catalog tracks from {:?}", catalog.len(), catalog_path);

    let board: Box<dyn Leaderboard> = match config.database_path.as_deref() {
        Some(path) => Box::new(SqliteLeaderboard::open(path)?),
        None => Box::new(MemoryLeaderboard::new()),
    };

    let player = match (play.name, play.email) {
        (name, Some(email)) => Some(Player {
            name: name.unwrap_or_default(),
            email,
        }),
        (_, None) => {
            println!("No --email given: scores will not be saved to the leaderboard.");
            None
        }
    };

    let mut session = GameSession::new();
    session.set_player(player);
    session.set_snippet_seconds(config.snippet_seconds);
    let mut controller = RoundController::new(session).with_result_limit(config.result_limit);
    if let Some(genre) = play.genre.as_deref() {
        controller
            .set_genre(Some(genre))
            .with_context(|| format!("Choose one of: {}", GENRES.join(", ")))?;
    }
    controller.set_difficulty(play.difficulty)?;

    let (tx, rx) = unbounded();
    let mut game = Game {
        controller,
        catalog: Arc::new(catalog),
        board,
        identity: TokenIdentity { token: play.token },
        player: ClockPlayer::default(),
        events: tx.clone(),
        spinner: None,
        leaderboard_size: config.leaderboard_size,
        origin: play.origin,
    };

    game.print_board();
    let ticket = match game.controller.start(&mut game.identity) {
        StartOutcome::Loading(ticket) => ticket,
        StartOutcome::NotSignedIn | StartOutcome::AlreadyStarted => return Ok(()),
    };
    println!(
        "Genre: {}  Difficulty: {}  (:help for commands)",
        game.controller.session().genre().unwrap_or("Mixed"),
        game.controller.session().difficulty()
    );
    game.dispatch(ticket);

    spawn_input_reader(tx);
    let ticker = tick(TICK_INTERVAL);
    loop {
        select! {
            recv(rx) -> event => match event {
                Ok(Event::Line(line)) => {
                    if !game.on_line(&line) {
                        break;
                    }
                }
                Ok(Event::Tracks { ticket, response }) => game.on_tracks(ticket, response),
                Ok(Event::InputClosed) | Err(_) => break,
            },
            recv(ticker) -> _ => game.on_tick(),
        }
    }

    game.finish_spinner();
    let final_score = game.controller.end_game();
    println!("Final score: {}", final_score);
    Ok(())
}

// ============================================================================
// Other commands
// ============================================================================

fn run_leaderboard(db: Option<PathBuf>, top: Option<usize>, json: bool, config: GameConfig) -> Result<()> {
    let Some(path) = db.or(config.database_path) else {
        bail!("No leaderboard database: pass --db or set database_path in the config file");
    };
    let store = SqliteLeaderboard::open(&path)?;
    let entries = store.fetch_top(top.unwrap_or(config.leaderboard_size))?;
    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else {
        print_entries(&entries);
    }
    Ok(())
}

fn run_judge(guess: &str, title: &str) {
    let canonical = normalize_title(title);
    let judgment = judge_guess(guess, &canonical);
    println!("Canonical title: {}", canonical);
    println!("Similarity:      {:.3}", judgment.similarity);
    println!("Verdict:         {:?} ({:?})", judgment.verdict, judgment.closeness);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    set_log_only(args.log_only);

    let config = GameConfig::resolve(args.config.as_deref()).context("Failed to load config")?;

    match args.command {
        Command::Play(play) => run_play(play, config)?,
        Command::Normalize { titles } => {
            for title in &titles {
                println!("{} => {}", title, normalize_title(title));
            }
        }
        Command::Judge { guess, title } => run_judge(&guess, &title),
        Command::Leaderboard { db, top, json } => run_leaderboard(db, top, json, config)?,
    }

    Ok(())
}
