//! Pluggable graph semi-supervised inference methods.
//!
//! All methods share one contract: given the weight matrix, the seeded
//! node ids and their classes, return one predicted class per graph node
//! (seeded nodes reproduce their seed) plus an uncertainty score per node.
//! Method selection is tagged-variant dispatch; an unrecognized method
//! name is rejected at configuration time, long before a cycle runs.

use nalgebra::DMatrix;

use super::SslError;

/// Result of one inference run: one entry per graph node.
#[derive(Debug, Clone)]
pub struct Inference {
    /// Predicted class id per node.
    pub labels: Vec<usize>,
    /// Uncertainty in `[0, 1]` per node (0 = confident, seeds are 0).
    pub uncertainty: Vec<f64>,
}

/// Graph semi-supervised classification method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslMethod {
    /// Harmonic-function propagation: direct solve of the unlabeled block
    /// of the graph Laplacian with seeds as Dirichlet boundary values.
    Laplace,
    /// Poisson learning: iterative diffusion with mean-centered point
    /// sources at the seeds. Better behaved at very low label rates.
    Poisson,
}

impl SslMethod {
    /// Parse a method name (case-insensitive). `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "laplace" => Some(SslMethod::Laplace),
            "poisson" => Some(SslMethod::Poisson),
            _ => None,
        }
    }

    /// Canonical method name.
    pub fn name(&self) -> &'static str {
        match self {
            SslMethod::Laplace => "laplace",
            SslMethod::Poisson => "poisson",
        }
    }

    /// Run inference over the graph.
    ///
    /// `train_indices` are graph node ids seeded with ground truth;
    /// `train_labels` (same length) are their classes in `0..num_classes`.
    pub fn infer(
        &self,
        weights: &DMatrix<f64>,
        train_labels: &[usize],
        train_indices: &[usize],
        num_classes: usize,
    ) -> Result<Inference, SslError> {
        if train_indices.is_empty() {
            return Err(SslError::NoLabeledSeed);
        }
        assert_eq!(
            train_labels.len(),
            train_indices.len(),
            "seed labels and indices must be parallel"
        );
        let n = weights.nrows();

        let mut seed_class: Vec<Option<usize>> = vec![None; n];
        for (&idx, &label) in train_indices.iter().zip(train_labels.iter()) {
            assert!(idx < n, "seed index {} out of bounds for {} nodes", idx, n);
            assert!(label < num_classes, "seed label {} out of alphabet", label);
            seed_class[idx] = Some(label);
        }

        let scores = match self {
            SslMethod::Laplace => laplace_scores(weights, &seed_class, num_classes)?,
            SslMethod::Poisson => poisson_scores(weights, &seed_class, num_classes)?,
        };

        if scores.iter().any(|v| !v.is_finite()) {
            return Err(SslError::NumericalInstability(
                "non-finite propagation scores".to_string(),
            ));
        }

        let mut labels = Vec::with_capacity(n);
        let mut uncertainty = Vec::with_capacity(n);
        for i in 0..n {
            match seed_class[i] {
                Some(label) => {
                    labels.push(label);
                    uncertainty.push(0.0);
                }
                None => {
                    let row: Vec<f64> = (0..num_classes).map(|c| scores[(i, c)]).collect();
                    labels.push(argmax(&row));
                    uncertainty.push(row_uncertainty(&row));
                }
            }
        }

        Ok(Inference {
            labels,
            uncertainty,
        })
    }
}

/// Harmonic solve: `L_uu F_u = W_ul Y_l`, seeds fixed at their one-hot.
fn laplace_scores(
    weights: &DMatrix<f64>,
    seed_class: &[Option<usize>],
    num_classes: usize,
) -> Result<DMatrix<f64>, SslError> {
    let n = weights.nrows();
    let degrees: Vec<f64> = (0..n).map(|i| weights.row(i).sum()).collect();

    let unlabeled: Vec<usize> = (0..n).filter(|&i| seed_class[i].is_none()).collect();
    let m = unlabeled.len();

    let mut scores = DMatrix::zeros(n, num_classes);
    for (i, class) in seed_class.iter().enumerate() {
        if let Some(c) = class {
            scores[(i, *c)] = 1.0;
        }
    }
    if m == 0 {
        return Ok(scores);
    }

    let mut l_uu = DMatrix::zeros(m, m);
    let mut rhs = DMatrix::zeros(m, num_classes);
    for (a, &i) in unlabeled.iter().enumerate() {
        l_uu[(a, a)] = degrees[i];
        for (b, &j) in unlabeled.iter().enumerate() {
            if a != b {
                l_uu[(a, b)] = -weights[(i, j)];
            }
        }
        for (j, class) in seed_class.iter().enumerate() {
            if let Some(c) = class {
                rhs[(a, *c)] += weights[(i, j)];
            }
        }
    }

    let solution = l_uu.lu().solve(&rhs).ok_or_else(|| {
        SslError::NumericalInstability("singular Laplace propagation system".to_string())
    })?;

    for (a, &i) in unlabeled.iter().enumerate() {
        for c in 0..num_classes {
            scores[(i, c)] = solution[(a, c)];
        }
    }
    Ok(scores)
}

/// Poisson learning: iterate `F <- D^{-1} (W F + B)` with mean-centered
/// sources `B` at the seeds until the update stalls.
fn poisson_scores(
    weights: &DMatrix<f64>,
    seed_class: &[Option<usize>],
    num_classes: usize,
) -> Result<DMatrix<f64>, SslError> {
    const MAX_ITERS: usize = 500;
    const TOL: f64 = 1e-9;

    let n = weights.nrows();
    if n == 1 {
        // A single node is necessarily the seed; nothing to diffuse.
        let mut scores = DMatrix::zeros(1, num_classes);
        if let Some(c) = seed_class[0] {
            scores[(0, c)] = 1.0;
        }
        return Ok(scores);
    }

    let degrees: Vec<f64> = (0..n).map(|i| weights.row(i).sum()).collect();
    if degrees.iter().any(|&d| d <= 0.0) {
        return Err(SslError::NumericalInstability(
            "isolated node in propagation graph".to_string(),
        ));
    }

    let n_seeds = seed_class.iter().filter(|c| c.is_some()).count();
    let mut class_mean = vec![0.0f64; num_classes];
    for class in seed_class.iter().flatten() {
        class_mean[*class] += 1.0 / n_seeds as f64;
    }

    let mut sources = DMatrix::zeros(n, num_classes);
    for (i, class) in seed_class.iter().enumerate() {
        if let Some(c) = class {
            for (k, &mean) in class_mean.iter().enumerate() {
                sources[(i, k)] += if k == *c { 1.0 - mean } else { -mean };
            }
        }
    }

    let mut f = DMatrix::zeros(n, num_classes);
    for _ in 0..MAX_ITERS {
        let mut next = weights * &f + &sources;
        for i in 0..n {
            for c in 0..num_classes {
                next[(i, c)] /= degrees[i];
            }
        }
        let delta = (&next - &f).abs().max();
        f = next;
        if delta < TOL {
            break;
        }
    }
    Ok(f)
}

fn argmax(row: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

/// Normalized-score uncertainty: shift the row to nonnegative and measure
/// how far the winning mass is from dominating.
fn row_uncertainty(row: &[f64]) -> f64 {
    if row.len() < 2 {
        return 0.0;
    }
    let min = row.iter().cloned().fold(f64::INFINITY, f64::min);
    let shifted: Vec<f64> = row.iter().map(|&v| v - min).collect();
    let sum: f64 = shifted.iter().sum();
    if sum < 1e-12 {
        return 1.0;
    }
    let max = shifted.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (1.0 - max / sum).clamp(0.0, 1.0)
}
