//! Classifier implementations
//!
//! The benchmarked model set is a closed enum: every family implements
//! the same capability contract ([`Classifier`]) and is constructed
//! from an explicit [`HyperParams`] variant, so there is no string
//! dispatch and nothing configurable outside the grid.

pub mod forest;
pub mod svm;
pub mod tree;

pub use forest::RandomForestClassifier;
pub use svm::SvmClassifier;
pub use tree::DecisionTree;

use crate::error::Result;
use crate::preprocessing::ScaledFeatures;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two model families the pipeline benchmarks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    RbfSvm,
    RandomForest,
}

impl ModelFamily {
    pub fn name(&self) -> &'static str {
        match self {
            ModelFamily::RbfSvm => "rbf_svm",
            ModelFamily::RandomForest => "random_forest",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One candidate hyperparameter configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HyperParams {
    RbfSvm { cost: f64, gamma: f64 },
    RandomForest { n_trees: usize, mtry: usize },
}

impl HyperParams {
    pub fn family(&self) -> ModelFamily {
        match self {
            HyperParams::RbfSvm { .. } => ModelFamily::RbfSvm,
            HyperParams::RandomForest { .. } => ModelFamily::RandomForest,
        }
    }

    /// Scalar used to break selection ties toward the simpler model
    pub fn complexity(&self) -> f64 {
        match self {
            HyperParams::RbfSvm { cost, .. } => *cost,
            HyperParams::RandomForest { n_trees, mtry } => (n_trees * mtry) as f64,
        }
    }
}

impl fmt::Display for HyperParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HyperParams::RbfSvm { cost, gamma } => {
                write!(f, "cost={cost}, gamma={gamma:.4}")
            }
            HyperParams::RandomForest { n_trees, mtry } => {
                write!(f, "n_trees={n_trees}, mtry={mtry}")
            }
        }
    }
}

/// Capability contract every model family implements
pub trait Classifier {
    /// Fit on scaled training features and class labels
    fn fit(&mut self, x: &ScaledFeatures, y: &[usize]) -> Result<()>;

    /// Predict class labels for scaled features
    fn predict(&self, x: &ScaledFeatures) -> Result<Vec<usize>>;
}

/// Closed set of trainable classifiers, one variant per family
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedClassifier {
    RbfSvm(SvmClassifier),
    RandomForest(RandomForestClassifier),
}

impl Classifier for TrainedClassifier {
    fn fit(&mut self, x: &ScaledFeatures, y: &[usize]) -> Result<()> {
        match self {
            TrainedClassifier::RbfSvm(m) => m.fit(x, y),
            TrainedClassifier::RandomForest(m) => m.fit(x, y),
        }
    }

    fn predict(&self, x: &ScaledFeatures) -> Result<Vec<usize>> {
        match self {
            TrainedClassifier::RbfSvm(m) => m.predict(x),
            TrainedClassifier::RandomForest(m) => m.predict(x),
        }
    }
}

/// Construct an untrained classifier for a candidate configuration
pub fn build_classifier(params: &HyperParams, seed: u64) -> TrainedClassifier {
    match params {
        HyperParams::RbfSvm { cost, gamma } => {
            TrainedClassifier::RbfSvm(SvmClassifier::new(*cost, *gamma).with_seed(seed))
        }
        HyperParams::RandomForest { n_trees, mtry } => {
            TrainedClassifier::RandomForest(
                RandomForestClassifier::new(*n_trees, *mtry).with_seed(seed),
            )
        }
    }
}

/// Candidate grid for a family.
///
/// The SVM varies cost over `grid_size` doubling steps with the kernel
/// width held at `gamma_hint`. The forest crosses `grid_size` tree
/// counts with per-split feature counts capped at `max_secondary`
/// candidates (and never more than the available features).
pub fn param_grid(
    family: ModelFamily,
    grid_size: usize,
    max_secondary: usize,
    n_features: usize,
    gamma_hint: f64,
) -> Vec<HyperParams> {
    match family {
        ModelFamily::RbfSvm => (0..grid_size)
            .map(|i| HyperParams::RbfSvm {
                cost: 2f64.powi(i as i32 - 2),
                gamma: gamma_hint,
            })
            .collect(),
        ModelFamily::RandomForest => {
            let mtry_max = max_secondary.min(n_features).max(1);
            let mut grid = Vec::with_capacity(grid_size * mtry_max);
            for i in 1..=grid_size {
                for mtry in 1..=mtry_max {
                    grid.push(HyperParams::RandomForest {
                        n_trees: 50 * i,
                        mtry,
                    });
                }
            }
            grid
        }
    }
}

/// Median-distance heuristic for the RBF kernel width.
///
/// Uses the median pairwise squared distance over at most 200
/// stride-sampled rows, so the estimate is deterministic for a given
/// matrix.
pub fn estimate_gamma(x: &Array2<f64>) -> f64 {
    let n = x.nrows();
    if n < 2 {
        return 1.0;
    }

    let step = n.div_ceil(200);
    let rows: Vec<usize> = (0..n).step_by(step).collect();

    let mut sq_dists = Vec::with_capacity(rows.len() * (rows.len() - 1) / 2);
    for (pos, &i) in rows.iter().enumerate() {
        for &j in &rows[pos + 1..] {
            let d: f64 = x
                .row(i)
                .iter()
                .zip(x.row(j).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum();
            sq_dists.push(d);
        }
    }

    sq_dists.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median = sq_dists[sq_dists.len() / 2];
    if median > 0.0 {
        1.0 / median
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_svm_grid_doubles_cost() {
        let grid = param_grid(ModelFamily::RbfSvm, 10, 6, 7, 0.2);
        assert_eq!(grid.len(), 10);
        match (&grid[0], &grid[9]) {
            (
                HyperParams::RbfSvm { cost: c0, gamma },
                HyperParams::RbfSvm { cost: c9, .. },
            ) => {
                assert_eq!(*c0, 0.25);
                assert_eq!(*c9, 128.0);
                assert_eq!(*gamma, 0.2);
            }
            _ => panic!("wrong family in grid"),
        }
    }

    #[test]
    fn test_forest_grid_caps_secondary() {
        let grid = param_grid(ModelFamily::RandomForest, 10, 6, 7, 0.0);
        assert_eq!(grid.len(), 60);

        let max_mtry = grid
            .iter()
            .map(|p| match p {
                HyperParams::RandomForest { mtry, .. } => *mtry,
                _ => panic!("wrong family in grid"),
            })
            .max()
            .unwrap();
        assert_eq!(max_mtry, 6);
    }

    #[test]
    fn test_forest_grid_respects_feature_count() {
        let grid = param_grid(ModelFamily::RandomForest, 4, 6, 3, 0.0);
        for p in &grid {
            if let HyperParams::RandomForest { mtry, .. } = p {
                assert!(*mtry <= 3);
            }
        }
    }

    #[test]
    fn test_complexity_orders_candidates() {
        let small = HyperParams::RbfSvm { cost: 0.5, gamma: 1.0 };
        let large = HyperParams::RbfSvm { cost: 8.0, gamma: 1.0 };
        assert!(small.complexity() < large.complexity());

        let light = HyperParams::RandomForest { n_trees: 50, mtry: 1 };
        let heavy = HyperParams::RandomForest { n_trees: 500, mtry: 6 };
        assert!(light.complexity() < heavy.complexity());
    }

    #[test]
    fn test_estimate_gamma_deterministic() {
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 2.0], [3.0, 1.0]];
        let g1 = estimate_gamma(&x);
        let g2 = estimate_gamma(&x);
        assert_eq!(g1, g2);
        assert!(g1 > 0.0);
    }

    #[test]
    fn test_estimate_gamma_degenerate_input() {
        let x = array![[1.0, 1.0], [1.0, 1.0]];
        assert_eq!(estimate_gamma(&x), 1.0);
    }
}
