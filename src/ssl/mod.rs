//! Graph-based semi-supervised reward inference.
//!
//! Every `ssl_freq` steps the trainer snapshots the labeled and unlabeled
//! stores, builds a similarity graph over deduplicated state-action
//! features, propagates reward classes from the labeled seeds, and rebuilds
//! the pseudo store from the result. All failures here are recoverable at
//! cycle granularity: the trainer logs them, skips the cycle, and retries
//! at the next scheduled refresh.

pub mod cycle;
pub mod graph;
pub mod labels;
pub mod method;

pub use cycle::{run_refresh_cycle, CycleReport};
pub use graph::{GraphBuild, GraphBuilder};
pub use labels::RewardLabelMap;
pub use method::{Inference, SslMethod};

/// Recoverable failure of one pseudo-labeling cycle.
#[derive(Debug)]
pub enum SslError {
    /// No data to build a graph from (empty node set, or nothing to
    /// pseudo-label).
    InsufficientData,
    /// Propagation is undefined without at least one labeled seed node.
    NoLabeledSeed,
    /// Singular propagation system or non-finite values; the cycle must
    /// never write NaN pseudo-rewards.
    NumericalInstability(String),
}

impl std::fmt::Display for SslError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SslError::InsufficientData => write!(f, "insufficient data for pseudo-labeling"),
            SslError::NoLabeledSeed => write!(f, "no labeled seed nodes for propagation"),
            SslError::NumericalInstability(e) => write!(f, "numerical instability: {}", e),
        }
    }
}

impl std::error::Error for SslError {}
