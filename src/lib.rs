//! Cultivar - cross-validated classifier benchmarking
//!
//! A fixed pipeline for small tabular classification problems:
//! - Stratified train/test partitioning with seeded reproducibility
//! - Advisory predictor screening (near-zero variance, correlation)
//! - Repeated stratified k-fold hyperparameter tuning for two model
//!   families (RBF-kernel SVM and random forest)
//! - Fold-identical comparison of the tuned families
//! - Test-set evaluation with a confusion matrix and per-class metrics
//!
//! # Modules
//!
//! - [`data`] - Dataset loading, schema validation, partitioning
//! - [`screening`] - Near-zero-variance and correlation diagnostics
//! - [`preprocessing`] - Center+scale transform bound to training data
//! - [`models`] - The closed classifier set and hyperparameter grids
//! - [`tuning`] - Resampling plan and parallel grid search
//! - [`compare`] - Combined resampling tables across families
//! - [`evaluate`] - Confusion matrix and derived metrics
//! - [`pipeline`] - End-to-end orchestration

pub mod compare;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod models;
pub mod pipeline;
pub mod preprocessing;
pub mod screening;
pub mod stats;
pub mod tuning;

pub use config::PipelineConfig;
pub use error::{CultivarError, Result};
