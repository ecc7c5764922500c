//! Training-loop coordination.

pub mod config;
pub mod coordinator;

pub use config::{ConfigError, TrainFreq, TrainFreqUnit, TrainerConfig};
pub use coordinator::{Phase, StepInfo, Trainer, TrainingReport};

use crate::environment::EnvironmentError;

/// Fatal training-loop failure.
///
/// Pseudo-labeling failures are *not* represented here: they are
/// recoverable at cycle granularity and handled inside the loop.
#[derive(Debug)]
pub enum TrainError {
    /// Invalid configuration, surfaced at setup.
    Config(ConfigError),
    /// Failure from the environment collaborator; propagated untouched.
    Environment(EnvironmentError),
}

impl std::fmt::Display for TrainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainError::Config(e) => write!(f, "configuration error: {}", e),
            TrainError::Environment(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for TrainError {}

impl From<ConfigError> for TrainError {
    fn from(e: ConfigError) -> Self {
        TrainError::Config(e)
    }
}

impl From<EnvironmentError> for TrainError {
    fn from(e: EnvironmentError) -> Self {
        TrainError::Environment(e)
    }
}
