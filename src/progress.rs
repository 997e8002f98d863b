//! Spinner and logging utilities for the terminal front-end.
//!
//! In log-only mode spinners are hidden and phase lines go to stderr instead,
//! for tail-friendly output.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Global flag for log-only mode (set from args in main)
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Format seconds the way the snippet slider shows them: "1s", "2.5s".
pub fn format_seconds(secs: f64) -> String {
    if secs.fract() == 0.0 {
        format!("{:.0}s", secs)
    } else {
        format!("{:.1}s", secs)
    }
}

/// Print a tagged phase line in log-only mode.
pub fn log_phase(phase: &str, msg: &str) {
    if is_log_only() {
        eprintln!("[{}] {}", phase, msg);
    }
}

/// Create a spinner for an outstanding request.
/// In log-only mode, the spinner is hidden.
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    } else {
        if let Ok(style) = ProgressStyle::default_spinner().template("{msg} {spinner} [{elapsed}]") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(100));
    }
    pb.set_message(msg.to_string());
    pb
}
