//! The pseudo-labeling refresh cycle.
//!
//! Reset the pseudo store, snapshot the labeled and unlabeled stores,
//! build the similarity graph, propagate reward classes from the labeled
//! seeds, evaluate against held-out true rewards, and repopulate the
//! pseudo store. The cycle is atomic: any failure after the initial reset
//! leaves the pseudo store empty, never partially populated.

use crate::buffers::experience_store::ExperienceStore;
use crate::core::transition::{state_action_features, Transition};

use super::graph::GraphBuilder;
use super::labels::{discretize, RewardLabelMap};
use super::method::SslMethod;
use super::SslError;

/// Summary of one successful refresh cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Graph nodes after all dedup passes.
    pub nodes: usize,
    /// Labeled seed nodes.
    pub seeds: usize,
    /// Transitions written to the pseudo store.
    pub pseudo_count: usize,
    /// Micro-averaged F1 of pseudo vs. true reward classes on non-seed
    /// nodes; `None` when every unlabeled node was also a seed.
    pub f1: Option<f64>,
}

/// Run one pseudo-labeling cycle.
///
/// On error the pseudo store has already been cleared and nothing else is
/// mutated; the caller logs and skips to the next scheduled cycle.
pub fn run_refresh_cycle(
    labeled: &ExperienceStore,
    unlabeled: &ExperienceStore,
    pseudo: &mut ExperienceStore,
    builder: &GraphBuilder,
    method: SslMethod,
    n_actions: usize,
) -> Result<CycleReport, SslError> {
    pseudo.reset();

    let labeled_snap = labeled.get_all();
    let unlabeled_snap = unlabeled.get_all();
    if unlabeled_snap.is_empty() {
        // Nothing to pseudo-label.
        return Err(SslError::InsufficientData);
    }

    let unlabeled_features = features_of(&unlabeled_snap, n_actions);
    let labeled_features = features_of(&labeled_snap, n_actions);

    let graph = builder.build(&unlabeled_features, &labeled_features)?;
    if graph.labeled_rows.is_empty() {
        return Err(SslError::NoLabeledSeed);
    }

    let seed_rewards: Vec<f32> = graph
        .labeled_rows
        .iter()
        .map(|&row| labeled_snap[row].reward)
        .collect();
    if seed_rewards.iter().any(|r| !r.is_finite()) {
        return Err(SslError::NumericalInstability(
            "non-finite reward in labeled snapshot".to_string(),
        ));
    }

    // The reward-label mapping is rebuilt from scratch each cycle; the
    // observed alphabet changes as labeled data accumulates.
    let (label_map, train_labels) = RewardLabelMap::from_rewards(&seed_rewards);
    let train_indices = graph.labeled_node_ids.clone();

    let inference = method.infer(
        &graph.weights,
        &train_labels,
        &train_indices,
        label_map.num_classes(),
    )?;

    let pseudo_rewards: Vec<f32> = inference
        .labels
        .iter()
        .map(|&label| label_map.reward_of(label))
        .collect();
    if pseudo_rewards.iter().any(|r| !r.is_finite()) {
        return Err(SslError::NumericalInstability(
            "non-finite pseudo-reward".to_string(),
        ));
    }

    // Evaluation on non-seed nodes only. Observability, never training
    // signal: this is the only place unlabeled-store rewards are read.
    let seed_set: std::collections::HashSet<usize> = train_indices.iter().copied().collect();
    let mut predicted = Vec::new();
    let mut truth = Vec::new();
    for i in 0..graph.n_unlabeled() {
        if !seed_set.contains(&i) {
            predicted.push(discretize(pseudo_rewards[i]));
            truth.push(discretize(unlabeled_snap[graph.unlabeled_rows[i]].reward));
        }
    }
    let f1 = if predicted.is_empty() {
        None
    } else {
        Some(micro_f1(&predicted, &truth))
    };

    // Repopulate: unique unlabeled transitions with the inferred reward
    // substituted, every other field copied unchanged.
    for i in 0..graph.n_unlabeled() {
        let original = &unlabeled_snap[graph.unlabeled_rows[i]];
        pseudo.add(original.with_reward(pseudo_rewards[i]));
    }

    Ok(CycleReport {
        nodes: graph.n_nodes(),
        seeds: train_indices.len(),
        pseudo_count: graph.n_unlabeled(),
        f1,
    })
}

fn features_of(transitions: &[Transition], n_actions: usize) -> Vec<Vec<f32>> {
    transitions
        .iter()
        .map(|t| state_action_features(&t.observation, t.action, n_actions))
        .collect()
}

/// Micro-averaged F1 over discretized reward classes.
///
/// With single-label predictions every false positive for one class is a
/// false negative for another, so micro precision, recall, and F1 all
/// collapse to the same ratio; computed from the pooled counts regardless.
pub fn micro_f1(predicted: &[i64], truth: &[i64]) -> f64 {
    assert_eq!(predicted.len(), truth.len());
    if predicted.is_empty() {
        return 0.0;
    }
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut fn_ = 0usize;
    for (p, t) in predicted.iter().zip(truth.iter()) {
        if p == t {
            tp += 1;
        } else {
            fp += 1;
            fn_ += 1;
        }
    }
    let precision = tp as f64 / (tp + fp) as f64;
    let recall = tp as f64 / (tp + fn_) as f64;
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(obs: &[f32], action: u32, reward: f32) -> Transition {
        Transition::new(obs.to_vec(), obs.to_vec(), action, reward, false, false)
    }

    fn stores(
        labeled_rows: &[(&[f32], u32, f32)],
        unlabeled_rows: &[(&[f32], u32, f32)],
    ) -> (ExperienceStore, ExperienceStore, ExperienceStore) {
        let mut labeled = ExperienceStore::new(64);
        let mut unlabeled = ExperienceStore::new(64);
        for &(obs, a, r) in labeled_rows {
            labeled.add(transition(obs, a, r));
        }
        for &(obs, a, r) in unlabeled_rows {
            unlabeled.add(transition(obs, a, r));
        }
        (labeled, unlabeled, ExperienceStore::new(64))
    }

    #[test]
    fn test_micro_f1() {
        assert_eq!(micro_f1(&[1, 0, 1], &[1, 0, 1]), 1.0);
        assert_eq!(micro_f1(&[1, 1, 1, 1], &[1, 0, 1, 0]), 0.5);
        assert_eq!(micro_f1(&[0], &[1]), 0.0);
    }

    #[test]
    fn test_empty_unlabeled_is_insufficient_data() {
        let (labeled, unlabeled, mut pseudo) =
            stores(&[(&[0.0], 0, 1.0)], &[]);
        let err = run_refresh_cycle(
            &labeled,
            &unlabeled,
            &mut pseudo,
            &GraphBuilder::new(),
            SslMethod::Laplace,
            2,
        )
        .unwrap_err();
        assert!(matches!(err, SslError::InsufficientData));
        assert_eq!(pseudo.len(), 0);
    }

    #[test]
    fn test_no_labeled_data_is_no_seed() {
        let (labeled, unlabeled, mut pseudo) =
            stores(&[], &[(&[0.0], 0, 1.0), (&[1.0], 0, 0.0)]);
        let err = run_refresh_cycle(
            &labeled,
            &unlabeled,
            &mut pseudo,
            &GraphBuilder::new(),
            SslMethod::Laplace,
            2,
        )
        .unwrap_err();
        assert!(matches!(err, SslError::NoLabeledSeed));
        assert_eq!(pseudo.len(), 0);
    }

    #[test]
    fn test_failed_cycle_leaves_pseudo_empty() {
        // Pre-populate the pseudo store, then force a failing cycle: it
        // must end empty, never partially populated.
        let (labeled, unlabeled, mut pseudo) = stores(&[], &[]);
        pseudo.add(transition(&[9.0], 0, 9.0));
        assert_eq!(pseudo.len(), 1);

        let _ = run_refresh_cycle(
            &labeled,
            &unlabeled,
            &mut pseudo,
            &GraphBuilder::new(),
            SslMethod::Laplace,
            2,
        );
        assert_eq!(pseudo.len(), 0);
    }

    #[test]
    fn test_two_labeled_three_unlabeled_scenario() {
        // Two labeled transitions with rewards {0, 1}; three unlabeled
        // whose true rewards are {0, 0, 1}. The unlabeled near the reward-1
        // seed should receive pseudo-reward 1, the others 0.
        let (labeled, unlabeled, mut pseudo) = stores(
            &[(&[0.0, 0.0], 0, 0.0), (&[10.0, 0.0], 0, 1.0)],
            &[
                (&[0.5, 0.0], 0, 0.0),
                (&[1.0, 0.0], 0, 0.0),
                (&[9.5, 0.0], 0, 1.0),
            ],
        );

        let report = run_refresh_cycle(
            &labeled,
            &unlabeled,
            &mut pseudo,
            &GraphBuilder::new().with_neighbors(2),
            SslMethod::Laplace,
            2,
        )
        .unwrap();

        assert_eq!(report.nodes, 5);
        assert_eq!(report.seeds, 2);
        assert_eq!(report.pseudo_count, 3);
        assert_eq!(pseudo.len(), 3);
        // Metric computed over exactly the three unlabeled nodes.
        assert_eq!(report.f1, Some(1.0));

        let rows = pseudo.get_all();
        assert_eq!(rows[0].reward, 0.0);
        assert_eq!(rows[1].reward, 0.0);
        assert_eq!(rows[2].reward, 1.0);
    }

    #[test]
    fn test_substitution_law() {
        // Every pseudo-store field except reward equals the corresponding
        // unlabeled transition.
        let mut labeled = ExperienceStore::new(16);
        labeled.add(transition(&[0.0], 0, 0.0));
        labeled.add(transition(&[8.0], 1, 1.0));

        let mut unlabeled = ExperienceStore::new(16);
        unlabeled.add(Transition::new(vec![1.0], vec![2.0], 1, 0.0, true, false));
        unlabeled.add(Transition::new(vec![7.0], vec![8.0], 0, 1.0, false, true));

        let mut pseudo = ExperienceStore::new(16);
        run_refresh_cycle(
            &labeled,
            &unlabeled,
            &mut pseudo,
            &GraphBuilder::new().with_neighbors(2),
            SslMethod::Laplace,
            2,
        )
        .unwrap();

        let originals = unlabeled.get_all();
        for (got, want) in pseudo.get_all().iter().zip(originals.iter()) {
            assert_eq!(got.observation, want.observation);
            assert_eq!(got.next_observation, want.next_observation);
            assert_eq!(got.action, want.action);
            assert_eq!(got.terminal, want.terminal);
            assert_eq!(got.truncated, want.truncated);
            assert!(got.reward.is_finite());
        }
    }

    #[test]
    fn test_duplicate_unlabeled_collapse() {
        // Duplicate state-action pairs collapse to one pseudo entry.
        let (labeled, unlabeled, mut pseudo) = stores(
            &[(&[0.0], 0, 0.0), (&[5.0], 0, 1.0)],
            &[(&[1.0], 0, 0.0), (&[1.0], 0, 0.0), (&[4.0], 0, 1.0)],
        );

        let report = run_refresh_cycle(
            &labeled,
            &unlabeled,
            &mut pseudo,
            &GraphBuilder::new().with_neighbors(2),
            SslMethod::Laplace,
            2,
        )
        .unwrap();
        assert_eq!(report.pseudo_count, 2);
        assert_eq!(pseudo.len(), 2);
    }

    #[test]
    fn test_seeded_unlabeled_node_excluded_from_metric() {
        // The single unlabeled feature also occurs labeled, so it is a
        // seed; no non-seed node remains to evaluate.
        let (labeled, unlabeled, mut pseudo) = stores(
            &[(&[1.0], 0, 1.0), (&[3.0], 0, 0.0)],
            &[(&[1.0], 0, 1.0)],
        );

        let report = run_refresh_cycle(
            &labeled,
            &unlabeled,
            &mut pseudo,
            &GraphBuilder::new(),
            SslMethod::Laplace,
            2,
        )
        .unwrap();
        assert_eq!(report.f1, None);
        assert_eq!(report.pseudo_count, 1);
        // The seeded node still round-trips its own reward.
        assert_eq!(pseudo.get_all()[0].reward, 1.0);
    }
}
