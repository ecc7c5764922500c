//! Transition type and state-action feature construction.
//!
//! A transition is one environment step's record. The `reward` field is
//! always numerically present; whether it is *trustworthy* is a property of
//! the store it lives in (labeled and pseudo stores: yes; unlabeled store:
//! evaluation only, never read by training).

/// One environment step's observation/action/reward record.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Observation before the step.
    pub observation: Vec<f32>,
    /// Observation after the step.
    pub next_observation: Vec<f32>,
    /// Discrete action index taken.
    pub action: u32,
    /// Reward received. Trustworthy only in labeled and pseudo stores.
    pub reward: f32,
    /// Episode terminated (absorbing state reached).
    pub terminal: bool,
    /// Episode truncated (time limit, step limit).
    pub truncated: bool,
}

impl Transition {
    /// Create a new transition.
    pub fn new(
        observation: Vec<f32>,
        next_observation: Vec<f32>,
        action: u32,
        reward: f32,
        terminal: bool,
        truncated: bool,
    ) -> Self {
        Self {
            observation,
            next_observation,
            action,
            reward,
            terminal,
            truncated,
        }
    }

    /// Check if the episode ended (terminal or truncated).
    pub fn done(&self) -> bool {
        self.terminal || self.truncated
    }

    /// Copy of this transition with the reward field replaced.
    ///
    /// Used when repopulating the pseudo store: every field except the
    /// reward is carried over unchanged from the unlabeled original.
    pub fn with_reward(&self, reward: f32) -> Self {
        Self {
            reward,
            ..self.clone()
        }
    }
}

/// Build the state-action feature vector for graph construction.
///
/// The feature is the observation concatenated with a one-hot encoding of
/// the discrete action. It is the graph-construction key only and is never
/// stored as a transition field.
pub fn state_action_features(observation: &[f32], action: u32, n_actions: usize) -> Vec<f32> {
    let mut features = Vec::with_capacity(observation.len() + n_actions);
    features.extend_from_slice(observation);
    for a in 0..n_actions {
        features.push(if a as u32 == action { 1.0 } else { 0.0 });
    }
    features
}
