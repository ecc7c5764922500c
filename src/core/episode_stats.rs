//! Rolling episode statistics for rollout bookkeeping.
//!
//! The trainer accumulates per-env episode returns and lengths as it steps
//! the environment batch, and keeps a bounded window of the most recent
//! completed episodes for reporting.

use std::collections::VecDeque;

/// Bounded window of recent episode returns and lengths.
///
/// One accumulator per parallel environment; completed episodes enter the
/// window and evict the oldest entry once the window is full.
#[derive(Debug)]
pub struct EpisodeStats {
    window: usize,
    returns: VecDeque<f32>,
    lengths: VecDeque<usize>,
    running_return: Vec<f32>,
    running_length: Vec<usize>,
    episodes: usize,
}

impl EpisodeStats {
    /// Create stats for `n_envs` parallel environments with the given window.
    pub fn new(n_envs: usize, window: usize) -> Self {
        Self {
            window,
            returns: VecDeque::with_capacity(window),
            lengths: VecDeque::with_capacity(window),
            running_return: vec![0.0; n_envs],
            running_length: vec![0; n_envs],
            episodes: 0,
        }
    }

    /// Record one environment step for env `idx`.
    ///
    /// Returns `true` if this step completed an episode.
    pub fn on_step(&mut self, idx: usize, reward: f32, done: bool) -> bool {
        self.running_return[idx] += reward;
        self.running_length[idx] += 1;

        if done {
            if self.returns.len() == self.window {
                self.returns.pop_front();
                self.lengths.pop_front();
            }
            self.returns.push_back(self.running_return[idx]);
            self.lengths.push_back(self.running_length[idx]);
            self.running_return[idx] = 0.0;
            self.running_length[idx] = 0;
            self.episodes += 1;
        }
        done
    }

    /// Total number of completed episodes.
    pub fn episodes(&self) -> usize {
        self.episodes
    }

    /// Mean return over the window, if any episode has completed.
    pub fn mean_return(&self) -> Option<f32> {
        if self.returns.is_empty() {
            return None;
        }
        Some(self.returns.iter().sum::<f32>() / self.returns.len() as f32)
    }

    /// Mean episode length over the window, if any episode has completed.
    pub fn mean_length(&self) -> Option<f32> {
        if self.lengths.is_empty() {
            return None;
        }
        Some(self.lengths.iter().sum::<usize>() as f32 / self.lengths.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_episodes_yet() {
        let stats = EpisodeStats::new(2, 10);
        assert_eq!(stats.episodes(), 0);
        assert!(stats.mean_return().is_none());
        assert!(stats.mean_length().is_none());
    }

    #[test]
    fn test_episode_accumulation() {
        let mut stats = EpisodeStats::new(1, 10);
        assert!(!stats.on_step(0, 1.0, false));
        assert!(!stats.on_step(0, 1.0, false));
        assert!(stats.on_step(0, 1.0, true));

        assert_eq!(stats.episodes(), 1);
        assert_eq!(stats.mean_return(), Some(3.0));
        assert_eq!(stats.mean_length(), Some(3.0));
    }

    #[test]
    fn test_per_env_accumulators_independent() {
        let mut stats = EpisodeStats::new(2, 10);
        stats.on_step(0, 1.0, false);
        stats.on_step(1, 5.0, true);

        assert_eq!(stats.episodes(), 1);
        assert_eq!(stats.mean_return(), Some(5.0));

        // env 0 keeps accumulating
        stats.on_step(0, 1.0, true);
        assert_eq!(stats.episodes(), 2);
        assert_eq!(stats.mean_return(), Some(3.5));
    }

    #[test]
    fn test_window_eviction() {
        let mut stats = EpisodeStats::new(1, 2);
        for r in [1.0, 2.0, 3.0] {
            stats.on_step(0, r, true);
        }
        // Window of 2 keeps episodes with returns 2.0 and 3.0
        assert_eq!(stats.episodes(), 3);
        assert_eq!(stats.mean_return(), Some(2.5));
    }
}
