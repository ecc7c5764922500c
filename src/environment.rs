//! Environment abstraction for the training loop.
//!
//! The simulator is an external collaborator: the trainer only needs
//! vectorized stepping over a batch of parallel instances and the discrete
//! action-space size for warm-up sampling. Stepping is treated as an
//! atomic external call that returns a batch of transitions.

/// Result from stepping vectorized environments.
#[derive(Debug, Clone)]
pub struct StepResult {
    /// Observations after the step, flattened `[n_envs * obs_size]`.
    pub next_observations: Vec<f32>,
    /// Rewards received `[n_envs]`.
    pub rewards: Vec<f32>,
    /// Terminal flags (episode ended at an absorbing state) `[n_envs]`.
    pub terminals: Vec<bool>,
    /// Truncation flags (episode ended at a time limit) `[n_envs]`.
    pub truncations: Vec<bool>,
}

impl StepResult {
    /// Done flags (terminal OR truncated).
    pub fn dones(&self) -> Vec<bool> {
        self.terminals
            .iter()
            .zip(self.truncations.iter())
            .map(|(&t, &tr)| t || tr)
            .collect()
    }
}

/// Failure reported by the environment collaborator.
///
/// The training core does not handle these; they propagate untouched to
/// the caller of [`Trainer::run`](crate::Trainer::run).
#[derive(Debug)]
pub struct EnvironmentError {
    message: String,
}

impl EnvironmentError {
    /// Wrap an environment failure description.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EnvironmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "environment error: {}", self.message)
    }
}

impl std::error::Error for EnvironmentError {}

/// Trait for vectorized discrete-action environments.
///
/// Implementations wrap any simulator and present a uniform batched
/// interface. Environments auto-reset internally: after a done flag, the
/// returned observation is already the first of the next episode.
pub trait VectorizedEnv {
    /// Number of parallel environment instances.
    fn n_envs(&self) -> usize;

    /// Size of a single observation vector.
    fn obs_size(&self) -> usize;

    /// Number of discrete actions.
    fn n_actions(&self) -> usize;

    /// Reset all environments and return initial observations, flattened
    /// `[n_envs * obs_size]`.
    fn reset_all(&mut self, seed: u64) -> Result<Vec<f32>, EnvironmentError>;

    /// Step all environments with one action per instance.
    fn step(&mut self, actions: &[u32]) -> Result<StepResult, EnvironmentError>;
}
