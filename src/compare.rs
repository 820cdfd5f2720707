//! Cross-family comparison of resampling results
//!
//! Combines tuning outputs that share one resampling plan into a
//! single (family x repeat x fold) table with per-family summary
//! statistics, so families can be compared on exactly the same folds.

use crate::error::{CultivarError, Result};
use crate::models::ModelFamily;
use crate::stats::quantile_sorted;
use crate::tuning::TuningResult;
use serde::{Deserialize, Serialize};

/// One row of the combined resampling table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResampleEntry {
    pub family: ModelFamily,
    pub repeat: usize,
    pub fold: usize,
    pub accuracy: f64,
}

/// Distribution summary of one family's held-out accuracies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FamilySummary {
    pub family: ModelFamily,
    pub n_scores: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Combined resampling results for two or more tuned families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparison {
    pub entries: Vec<ResampleEntry>,
    pub summaries: Vec<FamilySummary>,
}

impl ModelComparison {
    /// Combine tuning results, verifying fold-identity first.
    ///
    /// Every result must have been produced under the identical
    /// resampling plan (same folds, same repeats, same assignments);
    /// anything else is a comparison between incompatible estimates and
    /// fails with [`CultivarError::MismatchedResamplingPlan`].
    pub fn from_results(results: &[&TuningResult]) -> Result<Self> {
        if results.is_empty() {
            return Err(CultivarError::InvalidParameter {
                name: "results".to_string(),
                value: "[]".to_string(),
                reason: "nothing to compare".to_string(),
            });
        }

        let reference = &results[0].plan;
        for result in &results[1..] {
            if !reference.matches(&result.plan) {
                return Err(CultivarError::MismatchedResamplingPlan {
                    expected: reference.describe(),
                    actual: result.plan.describe(),
                });
            }
        }

        let mut entries = Vec::new();
        let mut summaries = Vec::new();

        for result in results {
            let mut scores = Vec::new();
            for cell in result.selected_cells() {
                // Missing cells are excluded rather than imputed
                if let Some(accuracy) = cell.accuracy {
                    entries.push(ResampleEntry {
                        family: result.family,
                        repeat: cell.repeat,
                        fold: cell.fold,
                        accuracy,
                    });
                    scores.push(accuracy);
                }
            }
            summaries.push(summarize(result.family, scores));
        }

        Ok(Self { entries, summaries })
    }

    pub fn summary(&self, family: ModelFamily) -> Option<&FamilySummary> {
        self.summaries.iter().find(|s| s.family == family)
    }

    /// Per-(repeat, fold) accuracy differences `a - b`, for paired
    /// comparison of two families over the shared folds
    pub fn paired_differences(&self, a: ModelFamily, b: ModelFamily) -> Vec<f64> {
        let mut diffs = Vec::new();
        for entry in self.entries.iter().filter(|e| e.family == a) {
            let matched = self.entries.iter().find(|e| {
                e.family == b && e.repeat == entry.repeat && e.fold == entry.fold
            });
            if let Some(other) = matched {
                diffs.push(entry.accuracy - other.accuracy);
            }
        }
        diffs
    }
}

fn summarize(family: ModelFamily, mut scores: Vec<f64>) -> FamilySummary {
    let n = scores.len();
    if n == 0 {
        return FamilySummary {
            family,
            n_scores: 0,
            mean: f64::NAN,
            std: f64::NAN,
            min: f64::NAN,
            q1: f64::NAN,
            median: f64::NAN,
            q3: f64::NAN,
            max: f64::NAN,
        };
    }

    let mean = scores.iter().sum::<f64>() / n as f64;
    let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n as f64;

    scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    FamilySummary {
        family,
        n_scores: n,
        mean,
        std: variance.sqrt(),
        min: scores[0],
        q1: quantile_sorted(&scores, 0.25),
        median: quantile_sorted(&scores, 0.5),
        q3: quantile_sorted(&scores, 0.75),
        max: scores[n - 1],
    }
}
