//! Isolation forest: an ensemble of random binary trees where anomalous
//! points end up isolated after fewer splits than typical ones.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::stats;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_samples: usize,
    pub contamination: f64,
    pub seed: u64,
}

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Fitted ensemble. Rows of the training matrix are records, columns features.
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
    offset: f64,
}

impl IsolationForest {
    /// Fits on `rows` and sets the decision offset so that roughly a
    /// `contamination` share of the training rows falls below it.
    pub fn fit(rows: &[Vec<f64>], params: &ForestParams) -> Option<Self> {
        if rows.is_empty() || params.n_estimators == 0 {
            return None;
        }
        let mut rng = StdRng::seed_from_u64(params.seed);
        let sample_size = params.max_samples.clamp(1, rows.len());
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;

        let trees = (0..params.n_estimators)
            .map(|_| {
                let sample = index::sample(&mut rng, rows.len(), sample_size).into_vec();
                build(rows, sample, 0, max_depth, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            sample_size,
            offset: 0.0,
        };
        let scores = forest.score_samples(rows);
        forest.offset = stats::percentile(&scores, 100.0 * params.contamination)?;

        debug!(
            trees = params.n_estimators,
            sample_size,
            max_depth,
            offset = forest.offset,
            "fitted isolation forest"
        );
        Some(forest)
    }

    /// Opposite of the anomaly score from the isolation forest paper:
    /// values near -1 are anomalous, values near -0.5 or above are typical.
    pub fn score_samples(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        let normalizer = average_path_length(self.sample_size);
        rows.iter()
            .map(|row| {
                let total: f64 = self.trees.iter().map(|tree| path_length(tree, row, 0)).sum();
                let mean_depth = total / self.trees.len() as f64;
                if normalizer > 0.0 {
                    -(2f64.powf(-mean_depth / normalizer))
                } else {
                    -0.5
                }
            })
            .collect()
    }

    /// Shifted score: negative for outliers, positive for inliers.
    pub fn decision_function(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        self.score_samples(rows)
            .into_iter()
            .map(|score| score - self.offset)
            .collect()
    }

    pub fn predict_outliers(&self, rows: &[Vec<f64>]) -> Vec<bool> {
        self.decision_function(rows)
            .into_iter()
            .map(|value| value < 0.0)
            .collect()
    }
}

fn build(
    rows: &[Vec<f64>],
    sample: Vec<usize>,
    depth: usize,
    max_depth: usize,
    rng: &mut StdRng,
) -> Node {
    if sample.len() <= 1 || depth >= max_depth {
        return Node::Leaf { size: sample.len() };
    }

    let width = rows[sample[0]].len();
    let candidates: Vec<(usize, f64, f64)> = (0..width)
        .filter_map(|feature| {
            let (lo, hi) = sample.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(rows[i][feature]), hi.max(rows[i][feature]))
            });
            (lo < hi).then_some((feature, lo, hi))
        })
        .collect();
    if candidates.is_empty() {
        return Node::Leaf { size: sample.len() };
    }

    let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
    let threshold = rng.gen_range(lo..hi);
    let (left, right): (Vec<usize>, Vec<usize>) =
        sample.into_iter().partition(|&i| rows[i][feature] <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(build(rows, left, depth + 1, max_depth, rng)),
        right: Box::new(build(rows, right, depth + 1, max_depth, rng)),
    }
}

fn path_length(node: &Node, row: &[f64], depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            feature,
            threshold,
            left,
            right,
        } => {
            let next = if row[*feature] <= *threshold { left } else { right };
            path_length(next, row, depth + 1)
        }
    }
}

/// Average path length of an unsuccessful binary search tree lookup over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}
