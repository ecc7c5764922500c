//! Reward-to-class bijection, rebuilt fresh each pseudo-labeling cycle.
//!
//! Rewards are discretized by a truncating cast to `i64`; the observed
//! alphabet of discretized values maps to dense class ids `0..num_classes`.
//! The mapping is a per-cycle value object: the observed reward alphabet
//! can change as more labeled data arrives, so stale mappings must never
//! be reused across cycles.

/// Bijection between observed (discretized) reward values and class ids.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardLabelMap {
    // Sorted, deduplicated discretized reward values; the class id of a
    // value is its index in this vector.
    classes: Vec<i64>,
}

/// Discretize a reward into the integer class alphabet.
pub fn discretize(reward: f32) -> i64 {
    reward as i64
}

impl RewardLabelMap {
    /// Build the mapping from a batch of labeled rewards and return it
    /// together with the class label of each input reward.
    pub fn from_rewards(rewards: &[f32]) -> (Self, Vec<usize>) {
        let mut classes: Vec<i64> = rewards.iter().map(|&r| discretize(r)).collect();
        classes.sort_unstable();
        classes.dedup();

        let map = Self { classes };
        let labels = rewards
            .iter()
            .map(|&r| {
                // Present by construction: the alphabet was built from
                // exactly these rewards.
                map.label_of(r).unwrap_or(0)
            })
            .collect();
        (map, labels)
    }

    /// Number of distinct reward classes observed this cycle.
    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    /// Class id of a reward value, if its discretization was observed.
    pub fn label_of(&self, reward: f32) -> Option<usize> {
        self.classes.binary_search(&discretize(reward)).ok()
    }

    /// Reward value of a class id (inverse mapping).
    pub fn reward_of(&self, label: usize) -> f32 {
        self.classes[label] as f32
    }
}
