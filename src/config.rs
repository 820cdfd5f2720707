//! Pipeline configuration
//!
//! All knobs that affect results are threaded explicitly through this
//! configuration object; no stage reads ambient global state.

use crate::error::{CultivarError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the full benchmarking pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fraction of samples assigned to the training partition
    pub split_fraction: f64,
    /// Seed for every stochastic stage (split, folds, model internals)
    pub seed: u64,
    /// Number of cross-validation folds
    pub n_folds: usize,
    /// Number of cross-validation repeats
    pub n_repeats: usize,
    /// Candidate count for each family's primary hyperparameter
    pub grid_size: usize,
    /// Cap on candidate count for a family's secondary hyperparameter
    pub max_secondary_candidates: usize,
    /// Frequency-ratio cutoff for near-zero-variance flagging
    pub nzv_freq_ratio: f64,
    /// Percent-unique cutoff for near-zero-variance flagging
    pub nzv_unique_pct: f64,
    /// Absolute pairwise correlation cutoff for the greedy eliminator
    pub correlation_cutoff: f64,
    /// Worker-pool size (None = available hardware parallelism)
    pub n_workers: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            split_fraction: 0.7,
            seed: 42,
            n_folds: 5,
            n_repeats: 5,
            grid_size: 10,
            max_secondary_candidates: 6,
            nzv_freq_ratio: 19.0,
            nzv_unique_pct: 10.0,
            correlation_cutoff: 0.75,
            n_workers: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the train split fraction
    pub fn with_split_fraction(mut self, fraction: f64) -> Self {
        self.split_fraction = fraction;
        self
    }

    /// Set the master random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set fold and repeat counts for cross-validation
    pub fn with_resampling(mut self, n_folds: usize, n_repeats: usize) -> Self {
        self.n_folds = n_folds;
        self.n_repeats = n_repeats;
        self
    }

    /// Set the primary-parameter grid size
    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Set the correlation cutoff
    pub fn with_correlation_cutoff(mut self, cutoff: f64) -> Self {
        self.correlation_cutoff = cutoff;
        self
    }

    /// Set the worker-pool size
    pub fn with_workers(mut self, n: usize) -> Self {
        self.n_workers = Some(n);
        self
    }

    /// Number of worker threads the tuner should use
    pub fn num_workers(&self) -> usize {
        self.n_workers.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }

    /// Validate all parameters, naming the offending one on failure
    pub fn validate(&self) -> Result<()> {
        if !(self.split_fraction > 0.0 && self.split_fraction < 1.0) {
            return Err(CultivarError::InvalidParameter {
                name: "split_fraction".to_string(),
                value: self.split_fraction.to_string(),
                reason: "must be strictly between 0 and 1".to_string(),
            });
        }
        if self.n_folds < 2 {
            return Err(CultivarError::InvalidParameter {
                name: "n_folds".to_string(),
                value: self.n_folds.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        if self.n_repeats == 0 {
            return Err(CultivarError::InvalidParameter {
                name: "n_repeats".to_string(),
                value: self.n_repeats.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.grid_size == 0 {
            return Err(CultivarError::InvalidParameter {
                name: "grid_size".to_string(),
                value: self.grid_size.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.max_secondary_candidates == 0 {
            return Err(CultivarError::InvalidParameter {
                name: "max_secondary_candidates".to_string(),
                value: self.max_secondary_candidates.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.correlation_cutoff > 0.0 && self.correlation_cutoff <= 1.0) {
            return Err(CultivarError::InvalidParameter {
                name: "correlation_cutoff".to_string(),
                value: self.correlation_cutoff.to_string(),
                reason: "must be in (0, 1]".to_string(),
            });
        }
        if self.nzv_freq_ratio < 1.0 {
            return Err(CultivarError::InvalidParameter {
                name: "nzv_freq_ratio".to_string(),
                value: self.nzv_freq_ratio.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.n_workers == Some(0) {
            return Err(CultivarError::InvalidParameter {
                name: "n_workers".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
