//! Integration test: tuning determinism and comparator fold-identity

mod common;

use cultivar::compare::ModelComparison;
use cultivar::error::CultivarError;
use cultivar::models::{param_grid, ModelFamily};
use cultivar::tuning::{ResamplingPlan, Tuner};

#[test]
fn test_tuning_matches_across_worker_counts() {
    let dataset = common::seed_like_dataset(15, 5);
    let plan = ResamplingPlan::stratified(dataset.labels(), 3, 3, 2, 5).unwrap();
    let grid = param_grid(ModelFamily::RandomForest, 2, 2, 7, 0.0);

    let serial = Tuner::new(1)
        .tune(
            ModelFamily::RandomForest,
            grid.clone(),
            dataset.features(),
            dataset.labels(),
            &plan,
        )
        .unwrap();
    let parallel = Tuner::new(4)
        .tune(
            ModelFamily::RandomForest,
            grid,
            dataset.features(),
            dataset.labels(),
            &plan,
        )
        .unwrap();

    assert_eq!(serial.best_index, parallel.best_index);
    assert_eq!(serial.best_params(), parallel.best_params());
    let cells_s: Vec<Option<f64>> = serial.cells.iter().map(|c| c.accuracy).collect();
    let cells_p: Vec<Option<f64>> = parallel.cells.iter().map(|c| c.accuracy).collect();
    assert_eq!(cells_s, cells_p);
}

#[test]
fn test_comparator_rejects_different_fold_counts() {
    let dataset = common::seed_like_dataset(20, 9);
    let plan5 = ResamplingPlan::stratified(dataset.labels(), 3, 5, 1, 9).unwrap();
    let plan10 = ResamplingPlan::stratified(dataset.labels(), 3, 10, 1, 9).unwrap();

    let tuner = Tuner::new(2);
    let on5 = tuner
        .tune(
            ModelFamily::RbfSvm,
            param_grid(ModelFamily::RbfSvm, 1, 6, 7, 0.5),
            dataset.features(),
            dataset.labels(),
            &plan5,
        )
        .unwrap();
    let on10 = tuner
        .tune(
            ModelFamily::RandomForest,
            param_grid(ModelFamily::RandomForest, 1, 1, 7, 0.0),
            dataset.features(),
            dataset.labels(),
            &plan10,
        )
        .unwrap();

    let err = ModelComparison::from_results(&[&on5, &on10]).unwrap_err();
    assert!(matches!(
        err,
        CultivarError::MismatchedResamplingPlan { .. }
    ));
}

#[test]
fn test_shared_plan_comparison_succeeds() {
    let dataset = common::seed_like_dataset(15, 3);
    let plan = ResamplingPlan::stratified(dataset.labels(), 3, 3, 1, 3).unwrap();

    let tuner = Tuner::new(2);
    let svm = tuner
        .tune(
            ModelFamily::RbfSvm,
            param_grid(ModelFamily::RbfSvm, 2, 6, 7, 0.5),
            dataset.features(),
            dataset.labels(),
            &plan,
        )
        .unwrap();
    let forest = tuner
        .tune(
            ModelFamily::RandomForest,
            param_grid(ModelFamily::RandomForest, 1, 2, 7, 0.0),
            dataset.features(),
            dataset.labels(),
            &plan,
        )
        .unwrap();

    let comparison = ModelComparison::from_results(&[&svm, &forest]).unwrap();
    assert_eq!(comparison.summaries.len(), 2);

    // Every family contributes one entry per (repeat, fold)
    let svm_entries = comparison
        .entries
        .iter()
        .filter(|e| e.family == ModelFamily::RbfSvm)
        .count();
    assert_eq!(svm_entries, 3);
}
