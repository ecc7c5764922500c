//! The training-loop coordinator.
//!
//! Owns all three experience stores and drives the state machine
//! `WARMUP → COLLECTING → (REFRESHING_SSL) → TRAINING → … → DONE` on a
//! single thread. Within one iteration the order is fixed: collection
//! precedes the conditional refresh, which precedes the conditional
//! training call, because training consumes the result of the refresh.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::buffers::experience_store::ExperienceStore;
use crate::buffers::router::{ExperienceRouter, RouteTarget};
use crate::core::episode_stats::EpisodeStats;
use crate::core::transition::Transition;
use crate::environment::VectorizedEnv;
use crate::metrics::recorder::TelemetrySink;
use crate::policy::{PolicySink, UpdateContext};
use crate::ssl::cycle::run_refresh_cycle;
use crate::ssl::graph::GraphBuilder;

use super::config::{TrainerConfig, TrainFreqUnit};
use super::TrainError;

/// Coordinator state, exposed for observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Sampling uniform-random actions to seed the stores.
    Warmup,
    /// Stepping the environment and routing transitions.
    Collecting,
    /// Running the pseudo-labeling cycle.
    RefreshingSsl,
    /// Issuing gradient updates to the policy sink.
    Training,
    /// Step budget exhausted or stopped by the hook.
    Done,
}

/// Snapshot passed to the step-level hook after every environment step.
#[derive(Debug, Clone, Copy)]
pub struct StepInfo {
    /// Global environment-step counter.
    pub num_timesteps: usize,
    /// Completed episodes so far.
    pub episodes: usize,
}

/// Final state returned by [`Trainer::run`].
#[derive(Debug, Clone)]
pub struct TrainingReport {
    /// Total environment steps taken.
    pub num_timesteps: usize,
    /// Completed episodes.
    pub episodes: usize,
    /// Successful pseudo-labeling refreshes.
    pub refreshes: usize,
    /// Refresh cycles that failed and were skipped.
    pub refresh_failures: usize,
    /// Most recent pseudo-labeling evaluation metric.
    pub last_f1: Option<f64>,
    /// Whether the step hook requested the stop.
    pub stopped_by_hook: bool,
}

struct RolloutSummary {
    env_steps: usize,
    continue_training: bool,
}

/// Top-level training loop over an environment, a policy sink, and a
/// telemetry sink.
pub struct Trainer<E, P, T> {
    config: TrainerConfig,
    env: E,
    policy: P,
    telemetry: T,
    labeled: ExperienceStore,
    unlabeled: Option<ExperienceStore>,
    pseudo: ExperienceStore,
    router: ExperienceRouter,
    builder: GraphBuilder,
    rng: Xoshiro256PlusPlus,
    stats: EpisodeStats,
    phase: Phase,
    num_timesteps: usize,
    refreshes: usize,
    refresh_failures: usize,
    last_f1: Option<f64>,
    last_obs: Vec<f32>,
    n_envs: usize,
    obs_size: usize,
    n_actions: usize,
}

impl<E, P, T> Trainer<E, P, T>
where
    E: VectorizedEnv,
    P: PolicySink,
    T: TelemetrySink,
{
    /// Create a trainer, validating the configuration against the
    /// environment shape. Configuration violations are fatal here.
    pub fn new(config: TrainerConfig, env: E, policy: P, telemetry: T) -> Result<Self, TrainError> {
        config.validate(env.n_envs())?;

        if !config.pseudo_mode && config.label_probability < 1.0 {
            log::warn!(
                "label probability {} < 1 with pseudo-labeling disabled: \
                 unlabeled-destined transitions are dropped",
                config.label_probability
            );
        }

        let unlabeled = config
            .pseudo_mode
            .then(|| ExperienceStore::new(config.unlabeled_buffer_size));
        let router = ExperienceRouter::new(config.label_probability, config.seed.wrapping_add(1));
        let builder = GraphBuilder::new().with_neighbors(config.graph_neighbors);
        let n_envs = env.n_envs();
        let obs_size = env.obs_size();
        let n_actions = env.n_actions();

        Ok(Self {
            labeled: ExperienceStore::new(config.buffer_size),
            unlabeled,
            pseudo: ExperienceStore::new(config.ssl_buffer_size),
            router,
            builder,
            rng: Xoshiro256PlusPlus::seed_from_u64(config.seed),
            stats: EpisodeStats::new(n_envs, config.stats_window_size),
            phase: Phase::Warmup,
            num_timesteps: 0,
            refreshes: 0,
            refresh_failures: 0,
            last_f1: None,
            last_obs: Vec::new(),
            n_envs,
            obs_size,
            n_actions,
            config,
            env,
            policy,
            telemetry,
        })
    }

    /// Run the training loop for up to `total_steps` environment steps.
    ///
    /// The hook is invoked after every environment step; returning `false`
    /// stops collection at step granularity (never mid-refresh) and ends
    /// the run.
    pub fn run(
        &mut self,
        total_steps: usize,
        mut hook: impl FnMut(&StepInfo) -> bool,
    ) -> Result<TrainingReport, TrainError> {
        self.last_obs = self.env.reset_all(self.config.seed)?;
        let mut stopped_by_hook = false;

        while self.num_timesteps < total_steps {
            self.phase = if self.num_timesteps < self.config.learning_starts {
                Phase::Warmup
            } else {
                Phase::Collecting
            };

            let rollout = self.collect_rollouts(total_steps, &mut hook)?;
            if !rollout.continue_training {
                stopped_by_hook = true;
                break;
            }

            if self.should_refresh() {
                self.phase = Phase::RefreshingSsl;
                self.refresh();
            }

            if self.num_timesteps > self.config.learning_starts {
                self.phase = Phase::Training;
                self.train(rollout.env_steps);
            }
        }

        self.phase = Phase::Done;
        Ok(TrainingReport {
            num_timesteps: self.num_timesteps,
            episodes: self.stats.episodes(),
            refreshes: self.refreshes,
            refresh_failures: self.refresh_failures,
            last_f1: self.last_f1,
            stopped_by_hook,
        })
    }

    /// Current coordinator phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Global environment-step counter.
    pub fn num_timesteps(&self) -> usize {
        self.num_timesteps
    }

    /// The labeled store (for checkpointing via `persist`).
    pub fn labeled_store(&self) -> &ExperienceStore {
        &self.labeled
    }

    /// The unlabeled store, if pseudo-labeling is enabled.
    pub fn unlabeled_store(&self) -> Option<&ExperienceStore> {
        self.unlabeled.as_ref()
    }

    /// The pseudo store.
    pub fn pseudo_store(&self) -> &ExperienceStore {
        &self.pseudo
    }

    /// The policy sink.
    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// The telemetry sink.
    pub fn telemetry(&self) -> &T {
        &self.telemetry
    }

    fn should_collect_more(&self, steps: usize, episodes: usize) -> bool {
        match self.config.train_freq.unit {
            TrainFreqUnit::Step => steps < self.config.train_freq.frequency,
            TrainFreqUnit::Episode => episodes < self.config.train_freq.frequency,
        }
    }

    fn should_refresh(&self) -> bool {
        self.config.pseudo_mode
            && self.num_timesteps % self.config.ssl_freq == 0
            && self.num_timesteps > self.config.learning_starts / 2
    }

    fn sample_actions(&mut self) -> Vec<u32> {
        if self.num_timesteps < self.config.learning_starts {
            // Warm-up: uniform over the action space, ignoring the policy.
            (0..self.n_envs)
                .map(|_| self.rng.gen_range(0..self.n_actions as u32))
                .collect()
        } else {
            self.policy.predict(&self.last_obs, false)
        }
    }

    fn collect_rollouts(
        &mut self,
        total_steps: usize,
        hook: &mut impl FnMut(&StepInfo) -> bool,
    ) -> Result<RolloutSummary, TrainError> {
        let mut collected_steps = 0usize;
        let mut collected_episodes = 0usize;

        while self.should_collect_more(collected_steps, collected_episodes)
            && self.num_timesteps < total_steps
        {
            let actions = self.sample_actions();
            let result = self.env.step(&actions)?;
            self.num_timesteps += self.n_envs;
            collected_steps += 1;

            let info = StepInfo {
                num_timesteps: self.num_timesteps,
                episodes: self.stats.episodes(),
            };
            if !hook(&info) {
                return Ok(RolloutSummary {
                    env_steps: collected_steps * self.n_envs,
                    continue_training: false,
                });
            }

            for i in 0..self.n_envs {
                let obs = self.last_obs[i * self.obs_size..(i + 1) * self.obs_size].to_vec();
                let next_obs =
                    result.next_observations[i * self.obs_size..(i + 1) * self.obs_size].to_vec();
                let transition = Transition::new(
                    obs,
                    next_obs,
                    actions[i],
                    result.rewards[i],
                    result.terminals[i],
                    result.truncations[i],
                );

                // Exactly one destination per transition.
                match self.router.route() {
                    RouteTarget::Labeled => self.labeled.add(transition),
                    RouteTarget::Unlabeled => {
                        if let Some(store) = self.unlabeled.as_mut() {
                            store.add(transition);
                        }
                    }
                }

                let done = result.terminals[i] || result.truncations[i];
                if self.stats.on_step(i, result.rewards[i], done) {
                    collected_episodes += 1;
                    if self.stats.episodes() % self.config.log_interval == 0 {
                        self.dump_logs();
                    }
                }
            }
            self.last_obs = result.next_observations;

            self.telemetry
                .record("buffer/num_labeled_rewards", self.labeled.len() as f64);
            if let Some(store) = self.unlabeled.as_ref() {
                self.telemetry
                    .record("buffer/num_unlabeled_rewards", store.len() as f64);
            }
        }

        Ok(RolloutSummary {
            env_steps: collected_steps * self.n_envs,
            continue_training: true,
        })
    }

    /// Run one pseudo-labeling cycle. Failures are recoverable: logged,
    /// counted, and the loop proceeds to the next rollout segment.
    fn refresh(&mut self) {
        let Some(unlabeled) = self.unlabeled.as_ref() else {
            return;
        };

        match run_refresh_cycle(
            &self.labeled,
            unlabeled,
            &mut self.pseudo,
            &self.builder,
            self.config.method,
            self.n_actions,
        ) {
            Ok(report) => {
                self.refreshes += 1;
                if let Some(f1) = report.f1 {
                    self.last_f1 = Some(f1);
                    self.telemetry.record("ssl/f1_score", f1);
                }
                self.telemetry
                    .record("buffer/num_ssl_rewards", self.pseudo.len() as f64);
                self.telemetry.dump(self.num_timesteps);
                log::debug!(
                    "pseudo-labeling refresh at step {}: {} nodes, {} seeds, {} pseudo-rewards",
                    self.num_timesteps,
                    report.nodes,
                    report.seeds,
                    report.pseudo_count
                );
            }
            Err(e) => {
                self.refresh_failures += 1;
                log::warn!(
                    "pseudo-labeling cycle skipped at step {}: {}",
                    self.num_timesteps,
                    e
                );
            }
        }
    }

    fn train(&mut self, rollout_env_steps: usize) {
        let gradient_steps = if self.config.gradient_steps >= 0 {
            self.config.gradient_steps as usize
        } else {
            // Match the number of env steps collected during the rollout.
            rollout_env_steps
        };
        if gradient_steps == 0 {
            return;
        }

        self.policy.update(UpdateContext {
            labeled: &self.labeled,
            pseudo: &self.pseudo,
            batch_size: self.config.batch_size,
            ssl_batch_size: self.config.ssl_batch_size,
            gradient_steps,
        });
    }

    fn dump_logs(&mut self) {
        if let Some(mean) = self.stats.mean_return() {
            self.telemetry.record("rollout/ep_rew_mean", mean as f64);
        }
        if let Some(mean) = self.stats.mean_length() {
            self.telemetry.record("rollout/ep_len_mean", mean as f64);
        }
        self.telemetry
            .record("time/episodes", self.stats.episodes() as f64);
        self.telemetry.dump(self.num_timesteps);
    }
}
