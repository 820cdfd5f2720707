//! Hyperparameter tuning over repeated stratified k-fold resampling
//!
//! The [`ResamplingPlan`] fixes every fold assignment up front from a
//! seed, so the same plan can be reused across model families for a
//! fair comparison. The [`Tuner`] evaluates every
//! (repeat, fold, candidate) cell on a bounded worker pool, records
//! failures as missing cells, and refits the winning configuration on
//! the full training partition.

use crate::error::{CultivarError, Result};
use crate::models::{build_classifier, Classifier, HyperParams, ModelFamily, TrainedClassifier};
use crate::preprocessing::{FittedScaler, ScaledFeatures};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Fold assignments for repeated stratified k-fold cross-validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResamplingPlan {
    n_samples: usize,
    n_folds: usize,
    n_repeats: usize,
    seed: u64,
    /// `folds[repeat][fold]` holds that fold's validation indices
    folds: Vec<Vec<Vec<usize>>>,
}

impl ResamplingPlan {
    /// Generate stratified fold assignments for every repeat.
    ///
    /// Each repeat shuffles within classes using its own seed derived
    /// from the plan seed, then deals samples round-robin across folds,
    /// so class proportions carry into every fold.
    pub fn stratified(
        labels: &[usize],
        n_classes: usize,
        n_folds: usize,
        n_repeats: usize,
        seed: u64,
    ) -> Result<Self> {
        if n_folds < 2 {
            return Err(CultivarError::InvalidParameter {
                name: "n_folds".to_string(),
                value: n_folds.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if n_repeats == 0 {
            return Err(CultivarError::InvalidParameter {
                name: "n_repeats".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if labels.len() < n_folds {
            return Err(CultivarError::Data(format!(
                "{} samples cannot fill {} folds",
                labels.len(),
                n_folds
            )));
        }

        let mut per_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (idx, &label) in labels.iter().enumerate() {
            if label >= n_classes {
                return Err(CultivarError::Data(format!(
                    "label index {} out of range for {} classes",
                    label, n_classes
                )));
            }
            per_class[label].push(idx);
        }

        let mut folds = Vec::with_capacity(n_repeats);
        for repeat in 0..n_repeats {
            let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(repeat as u64));
            let mut repeat_folds: Vec<Vec<usize>> = vec![Vec::new(); n_folds];

            for class_indices in &per_class {
                let mut shuffled = class_indices.clone();
                shuffled.shuffle(&mut rng);
                for (i, &idx) in shuffled.iter().enumerate() {
                    repeat_folds[i % n_folds].push(idx);
                }
            }

            for (fold, members) in repeat_folds.iter_mut().enumerate() {
                if members.is_empty() {
                    return Err(CultivarError::Data(format!(
                        "fold {} of repeat {} is empty; reduce n_folds",
                        fold, repeat
                    )));
                }
                members.sort_unstable();
            }
            folds.push(repeat_folds);
        }

        Ok(Self {
            n_samples: labels.len(),
            n_folds,
            n_repeats,
            seed,
            folds,
        })
    }

    pub fn n_folds(&self) -> usize {
        self.n_folds
    }

    pub fn n_repeats(&self) -> usize {
        self.n_repeats
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn validation_indices(&self, repeat: usize, fold: usize) -> &[usize] {
        &self.folds[repeat][fold]
    }

    /// Complement of the validation fold within the training partition
    pub fn training_indices(&self, repeat: usize, fold: usize) -> Vec<usize> {
        let held_out = &self.folds[repeat][fold];
        (0..self.n_samples)
            .filter(|i| !held_out.contains(i))
            .collect()
    }

    /// True when two plans have identical fold structure and assignments
    pub fn matches(&self, other: &Self) -> bool {
        self == other
    }

    pub fn describe(&self) -> String {
        format!(
            "{}-fold x {}-repeat (seed {})",
            self.n_folds, self.n_repeats, self.seed
        )
    }
}

/// One cell of the tuning score table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreCell {
    pub repeat: usize,
    pub fold: usize,
    pub candidate: usize,
    /// Held-out accuracy; None when this candidate failed on this fold
    pub accuracy: Option<f64>,
}

/// A tuned model ready for evaluation: frozen preprocessing plus the
/// classifier refit on the full training partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedModel {
    family: ModelFamily,
    params: HyperParams,
    scaler: FittedScaler,
    classifier: TrainedClassifier,
}

impl FittedModel {
    pub fn family(&self) -> ModelFamily {
        self.family
    }

    pub fn params(&self) -> &HyperParams {
        &self.params
    }

    /// Predict labels for raw (unscaled) features; the stored transform
    /// is applied with parameters frozen from training
    pub fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        let scaled = self.scaler.transform(features)?;
        self.classifier.predict(&scaled)
    }
}

/// Output of one family's grid search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuningResult {
    pub family: ModelFamily,
    pub grid: Vec<HyperParams>,
    pub plan: ResamplingPlan,
    /// Full per-(repeat, fold, candidate) score table
    pub cells: Vec<ScoreCell>,
    /// Mean held-out accuracy per candidate (None when every cell failed)
    pub mean_scores: Vec<Option<f64>>,
    pub best_index: usize,
    pub model: FittedModel,
}

impl TuningResult {
    pub fn best_params(&self) -> &HyperParams {
        &self.grid[self.best_index]
    }

    pub fn best_mean_accuracy(&self) -> f64 {
        self.mean_scores[self.best_index].unwrap_or(f64::NAN)
    }

    /// Score cells of the selected candidate, in (repeat, fold) order
    pub fn selected_cells(&self) -> Vec<&ScoreCell> {
        self.cells
            .iter()
            .filter(|c| c.candidate == self.best_index)
            .collect()
    }
}

struct FoldContext {
    repeat: usize,
    fold: usize,
    x_train: ScaledFeatures,
    y_train: Vec<usize>,
    x_val: ScaledFeatures,
    y_val: Vec<usize>,
}

/// Grid-search engine over a fixed resampling plan
pub struct Tuner {
    n_workers: usize,
}

impl Tuner {
    pub fn new(n_workers: usize) -> Self {
        Self {
            n_workers: n_workers.max(1),
        }
    }

    /// Search `grid` for the best configuration of `family`.
    ///
    /// Preprocessing is refit inside each fold's training subset; the
    /// held-out fold only ever sees the frozen transform. Candidate
    /// failures become missing cells unless an entire (repeat, fold)
    /// loses every candidate, which fails the family.
    pub fn tune(
        &self,
        family: ModelFamily,
        grid: Vec<HyperParams>,
        x: &Array2<f64>,
        y: &[usize],
        plan: &ResamplingPlan,
    ) -> Result<TuningResult> {
        if grid.is_empty() {
            return Err(CultivarError::InvalidParameter {
                name: "grid".to_string(),
                value: "[]".to_string(),
                reason: format!("no candidates to evaluate for {}", family),
            });
        }
        if let Some(stray) = grid.iter().find(|p| p.family() != family) {
            return Err(CultivarError::InvalidParameter {
                name: "grid".to_string(),
                value: stray.to_string(),
                reason: format!("candidate does not belong to family {}", family),
            });
        }
        if x.nrows() != y.len() || x.nrows() != plan.n_samples {
            return Err(CultivarError::Shape {
                expected: format!("{} samples (per plan)", plan.n_samples),
                actual: format!("{} rows, {} labels", x.nrows(), y.len()),
            });
        }

        info!(
            family = %family,
            candidates = grid.len(),
            plan = %plan.describe(),
            workers = self.n_workers,
            "Starting grid search"
        );

        let contexts = self.build_fold_contexts(x, y, plan)?;

        let tasks: Vec<(usize, usize)> = (0..contexts.len())
            .flat_map(|ctx_idx| (0..grid.len()).map(move |cand| (ctx_idx, cand)))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.n_workers)
            .build()
            .map_err(|e| CultivarError::Data(format!("worker pool: {}", e)))?;

        let grid_len = grid.len();
        let cells: Vec<ScoreCell> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(ctx_idx, candidate)| {
                    let ctx = &contexts[ctx_idx];
                    let params = &grid[candidate];
                    let task = (ctx.repeat * plan.n_folds + ctx.fold) * grid_len + candidate;
                    let task_seed = plan.seed.wrapping_add(task as u64 + 1);

                    let accuracy = evaluate_candidate(ctx, params, task_seed)
                        .map_err(|e| {
                            warn!(
                                family = %family,
                                repeat = ctx.repeat,
                                fold = ctx.fold,
                                params = %params,
                                error = %e,
                                "Candidate failed; recording missing cell"
                            );
                        })
                        .ok();

                    ScoreCell {
                        repeat: ctx.repeat,
                        fold: ctx.fold,
                        candidate,
                        accuracy,
                    }
                })
                .collect()
        });

        // A fold-repeat where no candidate fit is a hard failure
        for ctx in &contexts {
            let all_missing = cells
                .iter()
                .filter(|c| c.repeat == ctx.repeat && c.fold == ctx.fold)
                .all(|c| c.accuracy.is_none());
            if all_missing {
                return Err(CultivarError::FittingFailure {
                    family: family.name().to_string(),
                    repeat: ctx.repeat,
                    fold: ctx.fold,
                });
            }
        }

        let mean_scores = candidate_means(&cells, grid.len());
        let best_index = select_best(&grid, &mean_scores).expect("at least one candidate scored");

        // Refit on the full training partition
        let scaler = FittedScaler::fit(x);
        let scaled = scaler.transform(x)?;
        let mut classifier = build_classifier(&grid[best_index], plan.seed);
        classifier.fit(&scaled, y)?;

        info!(
            family = %family,
            params = %grid[best_index],
            mean_accuracy = mean_scores[best_index].unwrap_or(f64::NAN),
            "Selected configuration"
        );

        Ok(TuningResult {
            family,
            model: FittedModel {
                family,
                params: grid[best_index],
                scaler,
                classifier,
            },
            best_index,
            mean_scores,
            cells,
            plan: plan.clone(),
            grid,
        })
    }

    fn build_fold_contexts(
        &self,
        x: &Array2<f64>,
        y: &[usize],
        plan: &ResamplingPlan,
    ) -> Result<Vec<FoldContext>> {
        let mut contexts = Vec::with_capacity(plan.n_repeats * plan.n_folds);

        for repeat in 0..plan.n_repeats {
            for fold in 0..plan.n_folds {
                let val_idx = plan.validation_indices(repeat, fold);
                let train_idx = plan.training_indices(repeat, fold);

                let x_train_raw = x.select(ndarray::Axis(0), &train_idx);
                let x_val_raw = x.select(ndarray::Axis(0), val_idx);

                // Scaling statistics come from this fold's training
                // subset only
                let scaler = FittedScaler::fit(&x_train_raw);
                let x_train = scaler.transform(&x_train_raw)?;
                let x_val = scaler.transform(&x_val_raw)?;

                contexts.push(FoldContext {
                    repeat,
                    fold,
                    x_train,
                    y_train: train_idx.iter().map(|&i| y[i]).collect(),
                    x_val,
                    y_val: val_idx.iter().map(|&i| y[i]).collect(),
                });
            }
        }

        Ok(contexts)
    }
}

fn evaluate_candidate(ctx: &FoldContext, params: &HyperParams, seed: u64) -> Result<f64> {
    let mut model = build_classifier(params, seed);
    model.fit(&ctx.x_train, &ctx.y_train)?;
    let predictions = model.predict(&ctx.x_val)?;

    let correct = predictions
        .iter()
        .zip(ctx.y_val.iter())
        .filter(|(p, a)| p == a)
        .count();
    Ok(correct as f64 / ctx.y_val.len() as f64)
}

fn candidate_means(cells: &[ScoreCell], n_candidates: usize) -> Vec<Option<f64>> {
    let mut sums = vec![0.0; n_candidates];
    let mut counts = vec![0usize; n_candidates];

    for cell in cells {
        if let Some(acc) = cell.accuracy {
            sums[cell.candidate] += acc;
            counts[cell.candidate] += 1;
        }
    }

    sums.into_iter()
        .zip(counts)
        .map(|(sum, count)| {
            if count > 0 {
                Some(sum / count as f64)
            } else {
                None
            }
        })
        .collect()
}

/// Best mean accuracy; ties go to the lower-complexity candidate, then
/// to grid order
fn select_best(grid: &[HyperParams], mean_scores: &[Option<f64>]) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (idx, score) in mean_scores.iter().enumerate() {
        let Some(score) = score else { continue };
        match best {
            None => best = Some(idx),
            Some(current) => {
                let current_score = mean_scores[current].unwrap();
                if *score > current_score
                    || (*score == current_score
                        && grid[idx].complexity() < grid[current].complexity())
                {
                    best = Some(idx);
                }
            }
        }
    }

    best
}
