//! Choon music-guessing game core: title normalization, guess judgment,
//! scoring and round orchestration over pluggable collaborators.

pub mod catalog;
pub mod config;
pub mod controller;
pub mod leaderboard;
pub mod models;
pub mod normalize;
pub mod progress;
pub mod round;
pub mod scoring;
pub mod selection;
pub mod services;
pub mod session;
