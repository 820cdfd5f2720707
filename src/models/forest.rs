//! Random forest classifier
//!
//! Bootstrap-aggregated Gini trees with per-split feature subsampling.
//! Trees are built in parallel; each tree derives its own RNG seed from
//! the forest seed, so results do not depend on scheduling.

use crate::error::{CultivarError, Result};
use crate::models::{tree::DecisionTree, Classifier};
use crate::preprocessing::ScaledFeatures;
use ndarray::Array1;
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Bagged ensemble of decision trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestClassifier {
    n_trees: usize,
    mtry: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    min_samples_leaf: usize,
    seed: u64,
    trees: Vec<DecisionTree>,
    n_classes: usize,
}

impl RandomForestClassifier {
    /// Create an untrained forest with `n_trees` trees, each examining
    /// `mtry` candidate features per split
    pub fn new(n_trees: usize, mtry: usize) -> Self {
        Self {
            n_trees,
            mtry: mtry.max(1),
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
            trees: Vec::new(),
            n_classes: 0,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_fitted_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForestClassifier {
    fn fit(&mut self, x: &ScaledFeatures, y: &[usize]) -> Result<()> {
        let x = x.matrix();
        let n_samples = x.nrows();

        if n_samples != y.len() {
            return Err(CultivarError::Shape {
                expected: format!("{} labels", n_samples),
                actual: format!("{} labels", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(CultivarError::Data(
                "cannot fit a forest on zero samples".to_string(),
            ));
        }
        if self.n_trees == 0 {
            return Err(CultivarError::InvalidParameter {
                name: "n_trees".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        self.n_classes = y.iter().copied().max().unwrap_or(0) + 1;
        let mtry = self.mtry.min(x.ncols());
        let base_seed = self.seed;

        let trees: Result<Vec<DecisionTree>> = (0..self.n_trees)
            .into_par_iter()
            .map(|tree_idx| {
                let tree_seed = base_seed.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(tree_seed);

                // Bootstrap sample
                let sample_indices: Vec<usize> = (0..n_samples)
                    .map(|_| (rng.next_u64() as usize) % n_samples)
                    .collect();

                let x_boot = x.select(ndarray::Axis(0), &sample_indices);
                let y_boot: Vec<usize> = sample_indices.iter().map(|&i| y[i]).collect();

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(mtry)
                    .with_seed(tree_seed);
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                tree.fit(&x_boot, &y_boot)?;
                Ok(tree)
            })
            .collect();

        self.trees = trees?;
        Ok(())
    }

    fn predict(&self, x: &ScaledFeatures) -> Result<Vec<usize>> {
        if self.trees.is_empty() {
            return Err(CultivarError::ModelNotFitted);
        }

        let x = x.matrix();
        let all_predictions: Result<Vec<Vec<usize>>> =
            self.trees.par_iter().map(|tree| tree.predict(x)).collect();
        let all_predictions = all_predictions?;

        let n_samples = x.nrows();
        let mut predictions = Vec::with_capacity(n_samples);

        for i in 0..n_samples {
            let mut votes = Array1::<usize>::zeros(self.n_classes);
            for tree_preds in &all_predictions {
                votes[tree_preds[i]] += 1;
            }
            // Majority vote; strict comparison keeps the lowest class
            // index on ties
            let mut best = 0;
            for c in 1..self.n_classes {
                if votes[c] > votes[best] {
                    best = c;
                }
            }
            predictions.push(best);
        }

        Ok(predictions)
    }
}
