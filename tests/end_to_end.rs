//! End-to-end runs of the trainer against small deterministic environments.

use semisup_rl::{
    EnvironmentError, ExperienceStore, MemorySink, PolicySink, StepResult, TrainFreq,
    Trainer, TrainerConfig, UpdateContext, VectorizedEnv,
};

/// Single deterministic environment whose reward equals the global step
/// count (1-based). Never terminates; truncates every `horizon` steps.
/// Makes eviction order directly observable through rewards.
struct CountingEnv {
    step: usize,
    horizon: usize,
}

impl CountingEnv {
    fn new(horizon: usize) -> Self {
        Self { step: 0, horizon }
    }
}

impl VectorizedEnv for CountingEnv {
    fn n_envs(&self) -> usize {
        1
    }

    fn obs_size(&self) -> usize {
        1
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn reset_all(&mut self, _seed: u64) -> Result<Vec<f32>, EnvironmentError> {
        self.step = 0;
        Ok(vec![0.0])
    }

    fn step(&mut self, _actions: &[u32]) -> Result<StepResult, EnvironmentError> {
        self.step += 1;
        Ok(StepResult {
            next_observations: vec![self.step as f32],
            rewards: vec![self.step as f32],
            terminals: vec![false],
            truncations: vec![self.step % self.horizon == 0],
        })
    }
}

/// Deterministic cycle over two well-separated observation clusters.
/// Reward is 1 inside the high cluster and 0 inside the low one, so
/// reward classes align with graph structure.
struct TwoClusterEnv {
    idx: usize,
}

const CLUSTER_OBS: [f32; 6] = [0.0, 1.0, 2.0, 10.0, 11.0, 12.0];

impl TwoClusterEnv {
    fn new() -> Self {
        Self { idx: 0 }
    }
}

impl VectorizedEnv for TwoClusterEnv {
    fn n_envs(&self) -> usize {
        1
    }

    fn obs_size(&self) -> usize {
        1
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn reset_all(&mut self, _seed: u64) -> Result<Vec<f32>, EnvironmentError> {
        self.idx = 0;
        Ok(vec![CLUSTER_OBS[0]])
    }

    fn step(&mut self, _actions: &[u32]) -> Result<StepResult, EnvironmentError> {
        let reward = if CLUSTER_OBS[self.idx] >= 10.0 { 1.0 } else { 0.0 };
        self.idx = (self.idx + 1) % CLUSTER_OBS.len();
        Ok(StepResult {
            next_observations: vec![CLUSTER_OBS[self.idx]],
            rewards: vec![reward],
            terminals: vec![false],
            truncations: vec![self.idx == 0],
        })
    }
}

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Default)]
struct RecordingPolicy {
    predicts: usize,
    update_batches: Vec<(usize, usize)>,
}

impl PolicySink for RecordingPolicy {
    fn predict(&mut self, observations: &[f32], _deterministic: bool) -> Vec<u32> {
        self.predicts += 1;
        vec![0; observations.len()]
    }

    fn update(&mut self, ctx: UpdateContext<'_>) {
        self.update_batches.push((ctx.labeled.len(), ctx.pseudo.len()));
    }
}

#[test]
fn test_full_labeling_fills_ring_and_refresh_fails() {
    init_logs();
    // p = 1: every transition lands in the labeled store. After 10 steps
    // the capacity-4 ring holds exactly the last four transitions in
    // order, and the refresh at step 10 fails for lack of unlabeled data.
    let config = TrainerConfig::new()
        .with_buffer_size(4)
        .with_label_probability(1.0)
        .with_pseudo_mode(true)
        .with_ssl_freq(10)
        .with_learning_starts(8);

    let mut trainer = Trainer::new(
        config,
        CountingEnv::new(100),
        RecordingPolicy::default(),
        MemorySink::new(),
    )
    .unwrap();
    let report = trainer.run(10, |_| true).unwrap();

    assert_eq!(report.num_timesteps, 10);
    assert_eq!(report.refreshes, 0);
    assert_eq!(report.refresh_failures, 1);
    assert_eq!(report.last_f1, None);

    let labeled = trainer.labeled_store();
    assert_eq!(labeled.len(), 4);
    let rewards: Vec<f32> = labeled.get_all().iter().map(|t| t.reward).collect();
    assert_eq!(rewards, vec![7.0, 8.0, 9.0, 10.0]);

    assert_eq!(trainer.unlabeled_store().unwrap().len(), 0);
    assert_eq!(trainer.pseudo_store().len(), 0);
}

#[test]
fn test_partial_labeling_refresh_and_training() {
    init_logs();
    let config = TrainerConfig::new()
        .with_label_probability(0.5)
        .with_pseudo_mode(true)
        .with_learning_starts(20)
        .with_ssl_freq(60)
        .with_train_freq(TrainFreq::steps(4))
        .with_graph_neighbors(3)
        .with_seed(7);

    let mut trainer = Trainer::new(
        config,
        TwoClusterEnv::new(),
        RecordingPolicy::default(),
        MemorySink::new(),
    )
    .unwrap();
    let report = trainer.run(240, |_| true).unwrap();

    assert_eq!(report.num_timesteps, 240);
    assert!(report.refreshes > 0);
    assert_eq!(report.refresh_failures, 0);

    // Every transition went to exactly one store.
    let labeled = trainer.labeled_store().len();
    let unlabeled = trainer.unlabeled_store().unwrap().len();
    assert_eq!(labeled + unlabeled, 240);
    assert!(labeled > 0);
    assert!(unlabeled > 0);

    // The pseudo store was rebuilt with rewards drawn from the observed
    // label alphabet {0, 1}.
    let pseudo = trainer.pseudo_store().get_all();
    assert!(!pseudo.is_empty());
    assert!(pseudo.iter().all(|t| t.reward == 0.0 || t.reward == 1.0));

    // Training used both stores once past learning_starts.
    let policy = trainer.policy();
    assert!(policy.predicts > 0);
    assert!(!policy.update_batches.is_empty());
    assert!(policy.update_batches.iter().any(|&(l, _)| l > 0));

    // When non-seed nodes existed to evaluate, the metric was emitted and
    // is a valid ratio.
    if let Some(f1) = report.last_f1 {
        assert!((0.0..=1.0).contains(&f1));
        assert_eq!(trainer.telemetry().last("ssl/f1_score"), Some(f1));
    }
}

#[test]
fn test_telemetry_ordering_collection_before_refresh() {
    init_logs();
    let config = TrainerConfig::new()
        .with_label_probability(0.5)
        .with_pseudo_mode(true)
        .with_learning_starts(10)
        .with_ssl_freq(40)
        .with_graph_neighbors(3)
        .with_seed(5);

    let mut trainer = Trainer::new(
        config,
        TwoClusterEnv::new(),
        RecordingPolicy::default(),
        MemorySink::new(),
    )
    .unwrap();
    trainer.run(120, |_| true).unwrap();

    let records = trainer.telemetry().records();
    let first_collect = records
        .iter()
        .position(|(k, _)| k == "buffer/num_labeled_rewards")
        .unwrap();
    let first_refresh = records
        .iter()
        .position(|(k, _)| k == "buffer/num_ssl_rewards")
        .unwrap();
    assert!(first_collect < first_refresh);

    // Refresh telemetry matches the pseudo store it reported on.
    let last = trainer.telemetry().last("buffer/num_ssl_rewards").unwrap();
    assert_eq!(last as usize, trainer.pseudo_store().len());
}

#[test]
fn test_labeled_store_checkpoint_round_trip() {
    init_logs();
    let config = TrainerConfig::new().with_label_probability(1.0);
    let mut trainer = Trainer::new(
        config,
        CountingEnv::new(100),
        RecordingPolicy::default(),
        MemorySink::new(),
    )
    .unwrap();
    trainer.run(30, |_| true).unwrap();

    let blob = trainer.labeled_store().persist().unwrap();
    let restored = ExperienceStore::restore(&blob).unwrap();
    assert_eq!(restored.len(), trainer.labeled_store().len());
    assert_eq!(restored.get_all(), trainer.labeled_store().get_all());
}

#[test]
fn test_hook_stop_is_step_granular() {
    init_logs();
    let config = TrainerConfig::new()
        .with_pseudo_mode(true)
        .with_label_probability(0.5)
        .with_seed(2);
    let mut trainer = Trainer::new(
        config,
        TwoClusterEnv::new(),
        RecordingPolicy::default(),
        MemorySink::new(),
    )
    .unwrap();

    let report = trainer.run(1_000, |info| info.num_timesteps < 13).unwrap();
    assert!(report.stopped_by_hook);
    assert_eq!(report.num_timesteps, 13);
    // The transition from the stopping step was discarded.
    let stored = trainer.labeled_store().len() + trainer.unlabeled_store().unwrap().len();
    assert_eq!(stored, 12);
}
