//! Similarity-graph construction over deduplicated state-action features.
//!
//! Node identity is exact bit equality of the feature vector. Dedup runs
//! in three passes, all order-preserving:
//!
//! 1. unlabeled features against themselves,
//! 2. labeled features against themselves,
//! 3. the unlabeled-then-labeled concatenation, collapsing cross-set
//!    repeats.
//!
//! Because the unlabeled uniques come first and are pairwise distinct, the
//! unlabeled partition occupies node ids `0..n_unlabeled()` in order; a
//! labeled feature that also occurs unlabeled collapses onto the existing
//! unlabeled node.
//!
//! The weight matrix is a symmetric k-nearest-neighbour graph with
//! self-tuned Gaussian kernel weights. `k` grows until the graph is
//! connected, so every node has a path to every labeled seed; at
//! `k = n - 1` all kernel weights are positive and connectivity is
//! guaranteed.

use std::collections::{HashMap, HashSet, VecDeque};

use nalgebra::DMatrix;

use super::SslError;

/// Output of [`GraphBuilder::build`].
#[derive(Debug, Clone)]
pub struct GraphBuild {
    /// The deduplicated node features, unlabeled partition first.
    pub nodes: Vec<Vec<f32>>,
    /// Symmetric, nonnegative, zero-diagonal weight matrix over `nodes`.
    pub weights: DMatrix<f64>,
    /// Indices into the unlabeled snapshot that survived dedup, in order.
    /// Row `i` of this vector produced node `i`.
    pub unlabeled_rows: Vec<usize>,
    /// Indices into the labeled snapshot that survived dedup, in order.
    pub labeled_rows: Vec<usize>,
    /// Node id of each unique labeled feature (parallel to `labeled_rows`).
    pub labeled_node_ids: Vec<usize>,
}

impl GraphBuild {
    /// Number of nodes in the unlabeled partition.
    pub fn n_unlabeled(&self) -> usize {
        self.unlabeled_rows.len()
    }

    /// Total number of graph nodes.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }
}

/// Builds the similarity graph for label propagation.
#[derive(Debug, Clone)]
pub struct GraphBuilder {
    /// Initial neighbourhood size; grows until the graph is connected.
    neighbors: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self { neighbors: 10 }
    }
}

impl GraphBuilder {
    /// Create a builder with the default neighbourhood size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial k-nearest-neighbour count.
    pub fn with_neighbors(mut self, neighbors: usize) -> Self {
        self.neighbors = neighbors.max(1);
        self
    }

    /// Build the graph from the two feature sets.
    ///
    /// Fails with [`SslError::InsufficientData`] when the final node set is
    /// empty.
    pub fn build(
        &self,
        unlabeled_features: &[Vec<f32>],
        labeled_features: &[Vec<f32>],
    ) -> Result<GraphBuild, SslError> {
        let unlabeled_rows = dedup_preserving_order(unlabeled_features);
        let labeled_rows = dedup_preserving_order(labeled_features);

        // Final merge pass: unlabeled uniques occupy ids 0..n_unlabeled,
        // labeled uniques collapse onto them where the feature repeats.
        let mut node_id: HashMap<Vec<u32>, usize> = HashMap::new();
        let mut nodes: Vec<Vec<f32>> = Vec::with_capacity(unlabeled_rows.len());
        for &row in &unlabeled_rows {
            let feature = &unlabeled_features[row];
            node_id.insert(feature_key(feature), nodes.len());
            nodes.push(feature.clone());
        }

        let mut labeled_node_ids = Vec::with_capacity(labeled_rows.len());
        for &row in &labeled_rows {
            let feature = &labeled_features[row];
            match node_id.get(&feature_key(feature)) {
                // Cross-set repeat: same physical state-action pair seen
                // both labeled and unlabeled.
                Some(&id) => labeled_node_ids.push(id),
                None => {
                    node_id.insert(feature_key(feature), nodes.len());
                    labeled_node_ids.push(nodes.len());
                    nodes.push(feature.clone());
                }
            }
        }

        if nodes.is_empty() {
            return Err(SslError::InsufficientData);
        }

        let weights = self.connected_weights(&nodes);

        Ok(GraphBuild {
            nodes,
            weights,
            unlabeled_rows,
            labeled_rows,
            labeled_node_ids,
        })
    }

    /// Symmetric kNN Gaussian-kernel weights, with `k` grown until the
    /// graph is a single connected component.
    fn connected_weights(&self, nodes: &[Vec<f32>]) -> DMatrix<f64> {
        let n = nodes.len();
        if n == 1 {
            return DMatrix::zeros(1, 1);
        }

        let d2 = pairwise_sq_distances(nodes);
        let mut k = self.neighbors.min(n - 1);
        loop {
            let w = knn_weights(&d2, k);
            if k >= n - 1 || is_connected(&w) {
                return w;
            }
            k = (k * 2).min(n - 1);
        }
    }
}

fn feature_key(v: &[f32]) -> Vec<u32> {
    v.iter().map(|x| x.to_bits()).collect()
}

/// Indices of first occurrences, in input order.
fn dedup_preserving_order(features: &[Vec<f32>]) -> Vec<usize> {
    let mut seen: HashSet<Vec<u32>> = HashSet::new();
    let mut keep = Vec::new();
    for (i, f) in features.iter().enumerate() {
        if seen.insert(feature_key(f)) {
            keep.push(i);
        }
    }
    keep
}

fn pairwise_sq_distances(nodes: &[Vec<f32>]) -> Vec<Vec<f64>> {
    let n = nodes.len();
    let mut d2 = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let dist: f64 = nodes[i]
                .iter()
                .zip(nodes[j].iter())
                .map(|(&a, &b)| {
                    let d = a as f64 - b as f64;
                    d * d
                })
                .sum();
            d2[i][j] = dist;
            d2[j][i] = dist;
        }
    }
    d2
}

/// kNN graph with self-tuned Gaussian kernel: the bandwidth at node `i` is
/// its distance to its k-th nearest neighbour.
fn knn_weights(d2: &[Vec<f64>], k: usize) -> DMatrix<f64> {
    let n = d2.len();

    // Neighbour order per node, ties broken by index for determinism.
    let mut neighbor_order: Vec<Vec<usize>> = Vec::with_capacity(n);
    let mut sigma = vec![0.0f64; n];
    for i in 0..n {
        let mut order: Vec<usize> = (0..n).filter(|&j| j != i).collect();
        order.sort_by(|&a, &b| {
            d2[i][a]
                .partial_cmp(&d2[i][b])
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        sigma[i] = d2[i][order[k - 1]].sqrt().max(1e-12);
        neighbor_order.push(order);
    }

    let mut w = DMatrix::zeros(n, n);
    for i in 0..n {
        for &j in neighbor_order[i].iter().take(k) {
            let weight = (-d2[i][j] / (sigma[i] * sigma[j])).exp();
            // Symmetrize by taking the stronger direction.
            if weight > w[(i, j)] {
                w[(i, j)] = weight;
                w[(j, i)] = weight;
            }
        }
    }
    w
}

/// BFS reachability over positive edges from node 0.
fn is_connected(w: &DMatrix<f64>) -> bool {
    let n = w.nrows();
    if n == 0 {
        return true;
    }
    let mut visited = vec![false; n];
    let mut queue = VecDeque::new();
    visited[0] = true;
    queue.push_back(0);
    let mut count = 1;
    while let Some(i) = queue.pop_front() {
        for j in 0..n {
            if !visited[j] && w[(i, j)] > 0.0 {
                visited[j] = true;
                count += 1;
                queue.push_back(j);
            }
        }
    }
    count == n
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feats(rows: &[&[f32]]) -> Vec<Vec<f32>> {
        rows.iter().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_empty_input_fails() {
        let builder = GraphBuilder::new();
        let err = builder.build(&[], &[]).unwrap_err();
        assert!(matches!(err, SslError::InsufficientData));
    }

    #[test]
    fn test_dedup_preserves_first_occurrence_order() {
        let rows = feats(&[&[1.0, 0.0], &[2.0, 0.0], &[1.0, 0.0], &[3.0, 0.0]]);
        assert_eq!(dedup_preserving_order(&rows), vec![0, 1, 3]);
    }

    #[test]
    fn test_unlabeled_partition_comes_first() {
        let builder = GraphBuilder::new().with_neighbors(1);
        let unlabeled = feats(&[&[0.0, 0.0], &[1.0, 0.0], &[0.0, 0.0]]);
        let labeled = feats(&[&[2.0, 0.0]]);
        let g = builder.build(&unlabeled, &labeled).unwrap();

        assert_eq!(g.n_unlabeled(), 2);
        assert_eq!(g.unlabeled_rows, vec![0, 1]);
        assert_eq!(g.nodes[0], vec![0.0, 0.0]);
        assert_eq!(g.nodes[1], vec![1.0, 0.0]);
        assert_eq!(g.labeled_node_ids, vec![2]);
    }

    #[test]
    fn test_cross_set_repeat_collapses_onto_unlabeled_node() {
        let builder = GraphBuilder::new().with_neighbors(1);
        let unlabeled = feats(&[&[0.0, 1.0], &[1.0, 1.0]]);
        let labeled = feats(&[&[1.0, 1.0], &[2.0, 1.0]]);
        let g = builder.build(&unlabeled, &labeled).unwrap();

        assert_eq!(g.n_nodes(), 3);
        // The repeated labeled feature seeds the existing unlabeled node 1.
        assert_eq!(g.labeled_node_ids, vec![1, 2]);
    }

    #[test]
    fn test_weight_matrix_contract() {
        let builder = GraphBuilder::new().with_neighbors(2);
        let unlabeled = feats(&[&[0.0], &[1.0], &[2.0], &[5.0]]);
        let labeled = feats(&[&[10.0]]);
        let g = builder.build(&unlabeled, &labeled).unwrap();

        let n = g.n_nodes();
        for i in 0..n {
            assert_eq!(g.weights[(i, i)], 0.0, "nonzero diagonal at {}", i);
            for j in 0..n {
                assert!(g.weights[(i, j)] >= 0.0);
                assert!((g.weights[(i, j)] - g.weights[(j, i)]).abs() < 1e-12);
            }
        }
        assert!(is_connected(&g.weights));
    }

    #[test]
    fn test_k_grows_until_connected() {
        // Two tight clusters far apart: k=1 links within clusters only, so
        // the builder must enlarge the neighbourhood to connect them.
        let builder = GraphBuilder::new().with_neighbors(1);
        let unlabeled = feats(&[&[0.0], &[0.1], &[100.0], &[100.1]]);
        let g = builder.build(&unlabeled, &feats(&[&[0.05]])).unwrap();
        assert!(is_connected(&g.weights));
    }

    #[test]
    fn test_build_is_deterministic() {
        let builder = GraphBuilder::new().with_neighbors(2);
        let unlabeled = feats(&[&[0.0, 3.0], &[1.0, 2.0], &[0.0, 3.0], &[4.0, 4.0]]);
        let labeled = feats(&[&[1.0, 2.0], &[5.0, 5.0]]);

        let a = builder.build(&unlabeled, &labeled).unwrap();
        let b = builder.build(&unlabeled, &labeled).unwrap();

        assert_eq!(a.nodes, b.nodes);
        assert_eq!(a.labeled_node_ids, b.labeled_node_ids);
        assert_eq!(a.weights, b.weights);
    }

    #[test]
    fn test_single_node_graph() {
        let builder = GraphBuilder::new();
        let g = builder.build(&feats(&[&[1.0]]), &[]).unwrap();
        assert_eq!(g.n_nodes(), 1);
        assert_eq!(g.weights, DMatrix::zeros(1, 1));
    }
}
