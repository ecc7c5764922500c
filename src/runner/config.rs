//! Trainer configuration and setup-time validation.

use crate::ssl::method::SslMethod;

/// Unit of the collection cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainFreqUnit {
    /// Collect a fixed number of environment steps per rollout.
    Step,
    /// Collect a fixed number of whole episodes per rollout.
    Episode,
}

/// Collection cadence: how much experience to gather between updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainFreq {
    /// Number of steps or episodes per rollout.
    pub frequency: usize,
    /// Whether `frequency` counts steps or episodes.
    pub unit: TrainFreqUnit,
}

impl TrainFreq {
    /// Cadence of `n` environment steps.
    pub fn steps(n: usize) -> Self {
        Self {
            frequency: n,
            unit: TrainFreqUnit::Step,
        }
    }

    /// Cadence of `n` whole episodes.
    pub fn episodes(n: usize) -> Self {
        Self {
            frequency: n,
            unit: TrainFreqUnit::Episode,
        }
    }
}

/// Invalid configuration, rejected at `Trainer::new`.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Label probability outside `[0, 1]`.
    InvalidProbability(f64),
    /// A cadence or size parameter that must be positive was not.
    InvalidCadence {
        /// Name of the offending parameter.
        name: &'static str,
        /// The rejected value.
        value: i64,
    },
    /// Unrecognized SSL method name.
    UnknownMethod(String),
    /// Episodic collection cadence with more than one parallel env.
    EpisodicTrainFreqRequiresSingleEnv {
        /// Configured number of parallel environments.
        n_envs: usize,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidProbability(p) => {
                write!(f, "label probability {} must lie in [0, 1]", p)
            }
            ConfigError::InvalidCadence { name, value } => {
                write!(f, "{} must be positive, got {}", name, value)
            }
            ConfigError::UnknownMethod(name) => {
                write!(f, "unknown SSL method '{}'", name)
            }
            ConfigError::EpisodicTrainFreqRequiresSingleEnv { n_envs } => {
                write!(
                    f,
                    "episodic train_freq requires a single env, got {}",
                    n_envs
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the [`Trainer`](crate::Trainer).
#[derive(Debug, Clone)]
pub struct TrainerConfig {
    /// Capacity of the labeled store.
    pub buffer_size: usize,
    /// Capacity of the unlabeled store (only allocated in pseudo mode).
    pub unlabeled_buffer_size: usize,
    /// Capacity of the pseudo store.
    pub ssl_buffer_size: usize,
    /// Probability `p` that a collected transition keeps its reward.
    pub label_probability: f64,
    /// Whether the pseudo-labeling cycle runs at all.
    pub pseudo_mode: bool,
    /// Steps between pseudo-labeling refresh cycles.
    pub ssl_freq: usize,
    /// Collection cadence per loop iteration.
    pub train_freq: TrainFreq,
    /// Steps of uniform-random warm-up before the policy is consulted and
    /// before gradient updates begin.
    pub learning_starts: usize,
    /// Gradient steps per training phase; `-1` means as many as env steps
    /// collected during the preceding rollout.
    pub gradient_steps: i64,
    /// Minibatch size drawn from the labeled store.
    pub batch_size: usize,
    /// Minibatch size drawn from the pseudo store.
    pub ssl_batch_size: usize,
    /// Episode window for rollout statistics.
    pub stats_window_size: usize,
    /// Dump telemetry every this many completed episodes.
    pub log_interval: usize,
    /// Initial kNN neighbourhood size for graph construction.
    pub graph_neighbors: usize,
    /// Graph propagation method.
    pub method: SslMethod,
    /// Seed for all random draws (routing, warm-up actions).
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            buffer_size: 1_000_000,
            unlabeled_buffer_size: 100_000,
            ssl_buffer_size: 100_000,
            label_probability: 1.0,
            pseudo_mode: false,
            ssl_freq: 100,
            train_freq: TrainFreq::steps(1),
            learning_starts: 100,
            gradient_steps: 1,
            batch_size: 256,
            ssl_batch_size: 512,
            stats_window_size: 100,
            log_interval: 4,
            graph_neighbors: 10,
            method: SslMethod::Laplace,
            seed: 0,
        }
    }
}

impl TrainerConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the labeled store capacity.
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Set the unlabeled store capacity.
    pub fn with_unlabeled_buffer_size(mut self, size: usize) -> Self {
        self.unlabeled_buffer_size = size;
        self
    }

    /// Set the pseudo store capacity.
    pub fn with_ssl_buffer_size(mut self, size: usize) -> Self {
        self.ssl_buffer_size = size;
        self
    }

    /// Set the label probability `p`.
    pub fn with_label_probability(mut self, p: f64) -> Self {
        self.label_probability = p;
        self
    }

    /// Enable or disable the pseudo-labeling cycle.
    pub fn with_pseudo_mode(mut self, enabled: bool) -> Self {
        self.pseudo_mode = enabled;
        self
    }

    /// Set the refresh cadence in environment steps.
    pub fn with_ssl_freq(mut self, freq: usize) -> Self {
        self.ssl_freq = freq;
        self
    }

    /// Set the collection cadence.
    pub fn with_train_freq(mut self, freq: TrainFreq) -> Self {
        self.train_freq = freq;
        self
    }

    /// Set the warm-up step count.
    pub fn with_learning_starts(mut self, steps: usize) -> Self {
        self.learning_starts = steps;
        self
    }

    /// Set the gradient steps per training phase (`-1` = match rollout).
    pub fn with_gradient_steps(mut self, steps: i64) -> Self {
        self.gradient_steps = steps;
        self
    }

    /// Set the labeled minibatch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set the pseudo minibatch size.
    pub fn with_ssl_batch_size(mut self, size: usize) -> Self {
        self.ssl_batch_size = size;
        self
    }

    /// Set the initial graph neighbourhood size.
    pub fn with_graph_neighbors(mut self, neighbors: usize) -> Self {
        self.graph_neighbors = neighbors;
        self
    }

    /// Select the SSL method by name (`"laplace"`, `"poisson"`).
    pub fn with_method(mut self, name: &str) -> Result<Self, ConfigError> {
        self.method = SslMethod::from_name(name)
            .ok_or_else(|| ConfigError::UnknownMethod(name.to_string()))?;
        Ok(self)
    }

    /// Set the RNG seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Validate the configuration against the environment shape.
    pub fn validate(&self, n_envs: usize) -> Result<(), ConfigError> {
        if !self.label_probability.is_finite()
            || self.label_probability < 0.0
            || self.label_probability > 1.0
        {
            return Err(ConfigError::InvalidProbability(self.label_probability));
        }
        if self.ssl_freq == 0 {
            return Err(ConfigError::InvalidCadence {
                name: "ssl_freq",
                value: 0,
            });
        }
        if self.train_freq.frequency == 0 {
            return Err(ConfigError::InvalidCadence {
                name: "train_freq",
                value: 0,
            });
        }
        if self.log_interval == 0 {
            return Err(ConfigError::InvalidCadence {
                name: "log_interval",
                value: 0,
            });
        }
        if self.train_freq.unit == TrainFreqUnit::Episode && n_envs > 1 {
            return Err(ConfigError::EpisodicTrainFreqRequiresSingleEnv { n_envs });
        }
        Ok(())
    }
}
