//! Gini decision tree, the building block of the random forest

use crate::error::{CultivarError, Result};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// Classification tree with optional per-split feature subsampling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    max_features: Option<usize>,
    seed: u64,
    n_classes: usize,
    root: Option<Node>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 42,
            n_classes: 0,
            root: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    /// Number of candidate features examined at each split
    pub fn with_max_features(mut self, max_features: usize) -> Self {
        self.max_features = Some(max_features.max(1));
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Fit on (already scaled) features and class labels
    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        if x.nrows() != y.len() {
            return Err(CultivarError::Shape {
                expected: format!("{} labels", x.nrows()),
                actual: format!("{} labels", y.len()),
            });
        }
        if y.is_empty() {
            return Err(CultivarError::Data(
                "cannot fit a tree on zero samples".to_string(),
            ));
        }

        self.n_classes = y.iter().copied().max().unwrap_or(0) + 1;
        let indices: Vec<usize> = (0..y.len()).collect();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        self.root = Some(self.grow(x, y, &indices, 0, &mut rng));
        Ok(())
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let root = self.root.as_ref().ok_or(CultivarError::ModelNotFitted)?;

        let predictions = (0..x.nrows())
            .map(|i| {
                let mut node = root;
                loop {
                    match node {
                        Node::Leaf { class } => break *class,
                        Node::Split {
                            feature,
                            threshold,
                            left,
                            right,
                        } => {
                            node = if x[[i, *feature]] <= *threshold {
                                left
                            } else {
                                right
                            };
                        }
                    }
                }
            })
            .collect();

        Ok(predictions)
    }

    fn grow(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        depth: usize,
        rng: &mut ChaCha8Rng,
    ) -> Node {
        let counts = self.class_counts(y, indices);
        let majority = argmax_count(&counts);

        let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
        let depth_capped = self.max_depth.map(|d| depth >= d).unwrap_or(false);
        if pure || depth_capped || indices.len() < self.min_samples_split {
            return Node::Leaf { class: majority };
        }

        let Some((feature, threshold)) = self.best_split(x, y, indices, rng) else {
            return Node::Leaf { class: majority };
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| x[[i, feature]] <= threshold);

        let left = self.grow(x, y, &left_idx, depth + 1, rng);
        let right = self.grow(x, y, &right_idx, depth + 1, rng);

        Node::Split {
            feature,
            threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Lowest weighted-Gini split over the (possibly subsampled)
    /// candidate features. Returns None when no split satisfies the
    /// leaf-size constraints.
    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        indices: &[usize],
        rng: &mut ChaCha8Rng,
    ) -> Option<(usize, f64)> {
        let p = x.ncols();
        let mut features: Vec<usize> = (0..p).collect();
        if let Some(m) = self.max_features {
            if m < p {
                features.shuffle(rng);
                features.truncate(m);
            }
        }

        let n = indices.len();
        let mut best: Option<(usize, f64, f64)> = None;

        for &feature in &features {
            let mut ordered: Vec<(f64, usize)> =
                indices.iter().map(|&i| (x[[i, feature]], y[i])).collect();
            ordered.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

            let mut left_counts = vec![0usize; self.n_classes];
            let mut right_counts = self.class_counts(y, indices);

            for split_at in 1..n {
                let (value, label) = ordered[split_at - 1];
                left_counts[label] += 1;
                right_counts[label] -= 1;

                if value == ordered[split_at].0 {
                    continue;
                }
                let n_left = split_at;
                let n_right = n - split_at;
                if n_left < self.min_samples_leaf || n_right < self.min_samples_leaf {
                    continue;
                }

                let score = (n_left as f64 * gini(&left_counts, n_left)
                    + n_right as f64 * gini(&right_counts, n_right))
                    / n as f64;

                if best.map(|(_, _, s)| score < s).unwrap_or(true) {
                    let threshold = (value + ordered[split_at].0) / 2.0;
                    best = Some((feature, threshold, score));
                }
            }
        }

        best.map(|(feature, threshold, _)| (feature, threshold))
    }

    fn class_counts(&self, y: &[usize], indices: &[usize]) -> Vec<usize> {
        let mut counts = vec![0usize; self.n_classes];
        for &i in indices {
            counts[y[i]] += 1;
        }
        counts
    }
}

fn gini(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let n = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let f = c as f64 / n;
            f * f
        })
        .sum::<f64>()
}

/// Index of the largest count; ties resolve to the lowest class index
fn argmax_count(counts: &[usize]) -> usize {
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    best
}
