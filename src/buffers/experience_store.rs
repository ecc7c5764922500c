//! Fixed-capacity ring buffer of transitions.
//!
//! Key characteristics:
//! - Columnar storage of transition fields
//! - Overwrite-when-full semantics (oldest slot is silently evicted)
//! - Full-store snapshots in chronological order for the pseudo-labeling
//!   cycle (no random minibatch sampling here; that is the policy sink's
//!   business)
//! - Opaque binary persist/restore for checkpointing between runs

use serde::{Deserialize, Serialize};

use crate::core::transition::Transition;

/// Error from persisting or restoring a store snapshot.
#[derive(Debug)]
pub enum SnapshotError {
    /// Failed to encode the store contents.
    Encode(String),
    /// Failed to decode a snapshot blob.
    Decode(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::Encode(e) => write!(f, "snapshot encode error: {}", e),
            SnapshotError::Decode(e) => write!(f, "snapshot decode error: {}", e),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Fixed-capacity circular buffer of transitions with columnar fields.
///
/// Invariants: `0 <= pos < capacity`, `len() <= capacity`. `full` becomes
/// true once `pos` has wrapped; from then on every insertion overwrites the
/// oldest slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceStore {
    capacity: usize,
    pos: usize,
    full: bool,
    observations: Vec<Vec<f32>>,
    next_observations: Vec<Vec<f32>>,
    actions: Vec<u32>,
    rewards: Vec<f32>,
    terminals: Vec<bool>,
    timeouts: Vec<bool>,
}

impl ExperienceStore {
    /// Create an empty store with the given capacity.
    ///
    /// Capacity must be at least 1; a zero-capacity ring has no valid
    /// write position.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "store capacity must be positive");
        Self {
            capacity,
            pos: 0,
            full: false,
            observations: Vec::with_capacity(capacity),
            next_observations: Vec::with_capacity(capacity),
            actions: Vec::with_capacity(capacity),
            rewards: Vec::with_capacity(capacity),
            terminals: Vec::with_capacity(capacity),
            timeouts: Vec::with_capacity(capacity),
        }
    }

    /// Add a transition, overwriting the oldest slot once full.
    ///
    /// The store takes ownership of the transition's buffers; callers that
    /// keep their own copy must clone before calling (value-semantics copy
    /// at the insertion boundary).
    pub fn add(&mut self, transition: Transition) {
        if self.observations.len() < self.capacity {
            self.observations.push(transition.observation);
            self.next_observations.push(transition.next_observation);
            self.actions.push(transition.action);
            self.rewards.push(transition.reward);
            self.terminals.push(transition.terminal);
            self.timeouts.push(transition.truncated);
        } else {
            self.observations[self.pos] = transition.observation;
            self.next_observations[self.pos] = transition.next_observation;
            self.actions[self.pos] = transition.action;
            self.rewards[self.pos] = transition.reward;
            self.terminals[self.pos] = transition.terminal;
            self.timeouts[self.pos] = transition.truncated;
        }

        self.pos += 1;
        if self.pos == self.capacity {
            self.pos = 0;
            self.full = true;
        }
    }

    /// Number of valid entries: `capacity` if full, else the write position.
    pub fn len(&self) -> usize {
        if self.full {
            self.capacity
        } else {
            self.pos
        }
    }

    /// Check if the store holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The fixed capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the write position has wrapped at least once.
    pub fn is_full(&self) -> bool {
        self.full
    }

    /// Snapshot of all valid entries in chronological order (oldest first).
    ///
    /// Used by the pseudo-labeling cycle, which operates on full-store
    /// snapshots rather than random minibatches.
    pub fn get_all(&self) -> Vec<Transition> {
        let n = self.len();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            let idx = if self.full {
                (self.pos + i) % self.capacity
            } else {
                i
            };
            out.push(Transition {
                observation: self.observations[idx].clone(),
                next_observation: self.next_observations[idx].clone(),
                action: self.actions[idx],
                reward: self.rewards[idx],
                terminal: self.terminals[idx],
                truncated: self.timeouts[idx],
            });
        }
        out
    }

    /// Clear the store back to the empty state.
    ///
    /// Used on the pseudo store, which is fully rebuilt every refresh cycle
    /// rather than incrementally updated.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.full = false;
        self.observations.clear();
        self.next_observations.clear();
        self.actions.clear();
        self.rewards.clear();
        self.terminals.clear();
        self.timeouts.clear();
    }

    /// Serialize the ring contents into an opaque binary blob.
    pub fn persist(&self) -> Result<Vec<u8>, SnapshotError> {
        bincode::serialize(self).map_err(|e| SnapshotError::Encode(e.to_string()))
    }

    /// Restore a store from a blob produced by [`persist`](Self::persist).
    pub fn restore(blob: &[u8]) -> Result<Self, SnapshotError> {
        bincode::deserialize(blob).map_err(|e| SnapshotError::Decode(e.to_string()))
    }
}
