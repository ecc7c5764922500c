//! Policy and gradient-update sink abstraction.
//!
//! The neural policy and its optimizer are external collaborators. The
//! trainer asks the sink for actions during collection and hands it the
//! labeled and pseudo stores for gradient updates; what the sink does with
//! the batches is opaque to this crate.

use crate::buffers::experience_store::ExperienceStore;

/// One gradient-update request from the trainer.
///
/// The sink samples its own minibatches from the two stores; the unlabeled
/// store is deliberately absent (its rewards must never reach training).
#[derive(Debug)]
pub struct UpdateContext<'a> {
    /// Store of transitions with ground-truth rewards.
    pub labeled: &'a ExperienceStore,
    /// Store of transitions with inferred pseudo-rewards.
    pub pseudo: &'a ExperienceStore,
    /// Minibatch size to draw from the labeled store.
    pub batch_size: usize,
    /// Minibatch size to draw from the pseudo store.
    pub ssl_batch_size: usize,
    /// Number of gradient steps to perform.
    pub gradient_steps: usize,
}

/// External policy-optimization collaborator.
pub trait PolicySink {
    /// Pick one action per environment from the flattened observation
    /// batch `[n_envs * obs_size]`.
    fn predict(&mut self, observations: &[f32], deterministic: bool) -> Vec<u32>;

    /// Perform gradient updates from the labeled and pseudo stores.
    fn update(&mut self, ctx: UpdateContext<'_>);
}
