//! Bernoulli routing of transitions into the labeled or unlabeled store.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Destination picked by the router for one transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteTarget {
    /// The transition keeps its ground-truth reward.
    Labeled,
    /// The transition's reward is withheld from training.
    Unlabeled,
}

/// Routes each incoming transition to exactly one store.
///
/// Draws `u ~ U[0,1)` per transition; `u < p` sends it to the labeled
/// store, otherwise to the unlabeled store. The trainer maps `Unlabeled`
/// to a discard when no unlabeled store is configured.
#[derive(Debug)]
pub struct ExperienceRouter {
    p: f64,
    rng: Xoshiro256PlusPlus,
}

impl ExperienceRouter {
    /// Create a router with label probability `p` (validated upstream to
    /// lie in `[0, 1]`) and a deterministic seed.
    pub fn new(p: f64, seed: u64) -> Self {
        Self {
            p,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    /// The configured label probability.
    pub fn label_probability(&self) -> f64 {
        self.p
    }

    /// Draw the destination for one transition.
    pub fn route(&mut self) -> RouteTarget {
        if self.rng.gen::<f64>() < self.p {
            RouteTarget::Labeled
        } else {
            RouteTarget::Unlabeled
        }
    }
}
