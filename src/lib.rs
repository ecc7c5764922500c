//! # Semisup-RL: Off-Policy Training with Pseudo-Labeled Rewards
//!
//! Training-loop core for off-policy reinforcement learning under partial
//! reward observability: only a fraction `p` of collected transitions carry
//! a ground-truth reward. The remaining transitions are periodically
//! assigned *pseudo-rewards* by semi-supervised label propagation over a
//! similarity graph built from state-action features, so the downstream
//! policy update can learn from both truly-labeled and pseudo-labeled
//! experience.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Trainer                              │
//! │   WARMUP → COLLECTING → (REFRESHING_SSL) → TRAINING → …      │
//! ├──────────────────────────────────────────────────────────────┤
//! │  env.step ──► Router(p) ──┬──► labeled store  ─┐             │
//! │                           └──► unlabeled store │             │
//! │                                      │         │             │
//! │        every ssl_freq steps          ▼         │             │
//! │  ┌────────────┐   ┌───────────┐   ┌────────┐   │             │
//! │  │GraphBuilder│──►│ SslMethod │──►│ pseudo │   │             │
//! │  │ dedup+kNN  │   │ inference │   │ store  │   │             │
//! │  └────────────┘   └───────────┘   └───┬────┘   │             │
//! │                                       ▼        ▼             │
//! │                              PolicySink::update(batches)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The policy/value networks, the environment simulator, and the gradient
//! update itself live behind the [`PolicySink`] and [`VectorizedEnv`]
//! traits; this crate only owns the stores, the routing, the graph
//! inference, and the cadence of the loop.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use semisup_rl::{Trainer, TrainerConfig, ConsoleSink};
//!
//! let config = TrainerConfig::new()
//!     .with_label_probability(0.3)
//!     .with_pseudo_mode(true)
//!     .with_ssl_freq(500)
//!     .with_method("laplace")?;
//!
//! let mut trainer = Trainer::new(config, env, policy, ConsoleSink::new())?;
//! let report = trainer.run(100_000, |_| true)?;
//! ```

pub mod buffers;
pub mod core;
pub mod environment;
pub mod metrics;
pub mod policy;
pub mod runner;
pub mod ssl;

// Re-export commonly used types
pub use crate::core::episode_stats::EpisodeStats;
pub use crate::core::transition::{state_action_features, Transition};

pub use buffers::experience_store::{ExperienceStore, SnapshotError};
pub use buffers::router::{ExperienceRouter, RouteTarget};

pub use ssl::cycle::{run_refresh_cycle, CycleReport};
pub use ssl::graph::{GraphBuild, GraphBuilder};
pub use ssl::labels::RewardLabelMap;
pub use ssl::method::{Inference, SslMethod};
pub use ssl::SslError;

pub use runner::config::{ConfigError, TrainFreq, TrainFreqUnit, TrainerConfig};
pub use runner::coordinator::{Phase, StepInfo, Trainer, TrainingReport};
pub use runner::TrainError;

pub use environment::{EnvironmentError, StepResult, VectorizedEnv};
pub use policy::{PolicySink, UpdateContext};

pub use metrics::recorder::{ConsoleSink, CsvSink, MemorySink, TelemetrySink};
