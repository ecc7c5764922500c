//! Core data types shared across the training loop.

pub mod episode_stats;
pub mod transition;

pub use episode_stats::EpisodeStats;
pub use transition::{state_action_features, Transition};
