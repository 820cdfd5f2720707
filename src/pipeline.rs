//! End-to-end pipeline orchestration
//!
//! load -> partition -> screen -> tune both families -> compare ->
//! evaluate. Each stage consumes the prior stage's output; every
//! stochastic step takes its seed from the configuration.

use crate::compare::ModelComparison;
use crate::config::PipelineConfig;
use crate::data::partition::{stratified_split, Partition};
use crate::data::Dataset;
use crate::error::{CultivarError, Result};
use crate::evaluate::{evaluate, Evaluation};
use crate::models::{estimate_gamma, param_grid, ModelFamily};
use crate::preprocessing::FittedScaler;
use crate::screening::{correlation_matrix, find_correlated, near_zero_variance, VarianceReport};
use crate::tuning::{ResamplingPlan, Tuner, TuningResult};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Advisory screening output over the training partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreeningReport {
    pub variance: Vec<VarianceReport>,
    /// Column indices recommended for removal, in elimination order
    pub correlated_indices: Vec<usize>,
    /// The same recommendations as predictor names
    pub correlated_predictors: Vec<String>,
}

impl ScreeningReport {
    pub fn nzv_count(&self) -> usize {
        self.variance.iter().filter(|v| v.near_zero_variance).count()
    }
}

/// A model family that failed tuning and was left out of the comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedFamily {
    pub family: ModelFamily,
    pub reason: String,
}

/// Everything the pipeline produced, end to end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub partition: Partition,
    pub screening: ScreeningReport,
    pub results: Vec<TuningResult>,
    pub skipped: Vec<SkippedFamily>,
    pub comparison: ModelComparison,
    /// Family whose tuned model was evaluated on the test partition
    pub best_family: ModelFamily,
    pub evaluation: Evaluation,
}

/// Run the full benchmarking pipeline on a loaded dataset
pub fn run(dataset: &Dataset, config: &PipelineConfig) -> Result<PipelineReport> {
    config.validate()?;

    info!(
        samples = dataset.n_samples(),
        features = dataset.n_features(),
        classes = dataset.n_classes(),
        seed = config.seed,
        "Starting pipeline"
    );

    // Stratified train/test split
    let partition = stratified_split(
        dataset.labels(),
        dataset.n_classes(),
        config.split_fraction,
        config.seed,
    )?;
    let (x_train, y_train) = dataset.subset(&partition.train);
    let (x_test, y_test) = dataset.subset(&partition.test);
    info!(
        train = partition.train_size(),
        test = partition.test_size(),
        "Partitioned dataset"
    );

    // Advisory predictor screening over the training partition only
    let variance = near_zero_variance(
        &x_train,
        dataset.feature_names(),
        config.nzv_freq_ratio,
        config.nzv_unique_pct,
    );
    let corr = correlation_matrix(&x_train);
    let correlated_indices = find_correlated(&corr, config.correlation_cutoff);
    let correlated_predictors: Vec<String> = correlated_indices
        .iter()
        .map(|&i| dataset.feature_names()[i].clone())
        .collect();
    let screening = ScreeningReport {
        variance,
        correlated_indices,
        correlated_predictors,
    };
    info!(
        nzv = screening.nzv_count(),
        correlated = screening.correlated_indices.len(),
        "Screened predictors"
    );

    // One resampling plan shared by every family
    let plan = ResamplingPlan::stratified(
        &y_train,
        dataset.n_classes(),
        config.n_folds,
        config.n_repeats,
        config.seed,
    )?;

    // Kernel width hint from the scaled training partition
    let gamma = {
        let scaler = FittedScaler::fit(&x_train);
        estimate_gamma(scaler.transform(&x_train)?.matrix())
    };

    let tuner = Tuner::new(config.num_workers());
    let families = [ModelFamily::RbfSvm, ModelFamily::RandomForest];

    let mut results: Vec<TuningResult> = Vec::new();
    let mut skipped: Vec<SkippedFamily> = Vec::new();

    for family in families {
        let grid = param_grid(
            family,
            config.grid_size,
            config.max_secondary_candidates,
            dataset.n_features(),
            gamma,
        );

        match tuner.tune(family, grid, &x_train, &y_train, &plan) {
            Ok(result) => results.push(result),
            Err(err @ CultivarError::FittingFailure { .. }) => {
                warn!(family = %family, error = %err, "Family failed tuning; skipping");
                skipped.push(SkippedFamily {
                    family,
                    reason: err.to_string(),
                });
            }
            Err(other) => return Err(other),
        }
    }

    if results.is_empty() {
        let reasons: Vec<String> = skipped.iter().map(|s| s.reason.clone()).collect();
        return Err(CultivarError::Data(format!(
            "every model family failed tuning: {}",
            reasons.join("; ")
        )));
    }

    let comparison = ModelComparison::from_results(&results.iter().collect::<Vec<_>>())?;

    // Evaluate the family with the best mean cross-validated accuracy;
    // strict comparison keeps the earlier family on exact ties
    let mut best = 0;
    for (idx, result) in results.iter().enumerate().skip(1) {
        if result.best_mean_accuracy() > results[best].best_mean_accuracy() {
            best = idx;
        }
    }
    let best_family = results[best].family;

    let evaluation = evaluate(
        &results[best].model,
        &x_test,
        &y_test,
        dataset.class_names(),
    )?;

    info!(
        best = %best_family,
        accuracy = evaluation.accuracy,
        "Pipeline complete"
    );

    Ok(PipelineReport {
        partition,
        screening,
        results,
        skipped,
        comparison,
        best_family,
        evaluation,
    })
}
