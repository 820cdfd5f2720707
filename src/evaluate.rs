//! Test-set evaluation
//!
//! Applies a tuned model's frozen preprocessing transform to the
//! untouched test partition, then derives a confusion matrix, per-class
//! metrics, and overall accuracy with an exact binomial confidence
//! interval. Nothing here mutates its inputs or refits anything.

use crate::error::{CultivarError, Result};
use crate::stats::binomial_ci;
use crate::tuning::FittedModel;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Counts of (true class, predicted class) pairs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: Array2<usize>,
    class_names: Vec<String>,
}

impl ConfusionMatrix {
    /// Tally predictions against true labels
    pub fn from_labels(
        actual: &[usize],
        predicted: &[usize],
        class_names: &[String],
    ) -> Result<Self> {
        if actual.len() != predicted.len() {
            return Err(CultivarError::Shape {
                expected: format!("{} predictions", actual.len()),
                actual: format!("{} predictions", predicted.len()),
            });
        }
        if actual.is_empty() {
            return Err(CultivarError::Data(
                "cannot evaluate on an empty test set".to_string(),
            ));
        }

        let k = class_names.len();
        let mut counts = Array2::zeros((k, k));
        for (&t, &p) in actual.iter().zip(predicted.iter()) {
            if t >= k || p >= k {
                return Err(CultivarError::Data(format!(
                    "label index {} out of range for {} classes",
                    t.max(p),
                    k
                )));
            }
            counts[[t, p]] += 1;
        }

        Ok(Self {
            counts,
            class_names: class_names.to_vec(),
        })
    }

    /// Build directly from a square count matrix
    pub fn from_counts(counts: Array2<usize>, class_names: Vec<String>) -> Result<Self> {
        if counts.nrows() != counts.ncols() || counts.nrows() != class_names.len() {
            return Err(CultivarError::Shape {
                expected: format!("{0}x{0} counts", class_names.len()),
                actual: format!("{}x{}", counts.nrows(), counts.ncols()),
            });
        }
        Ok(Self {
            counts,
            class_names,
        })
    }

    pub fn counts(&self) -> &Array2<usize> {
        &self.counts
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn total(&self) -> usize {
        self.counts.sum()
    }

    /// Correctly classified samples (the matrix trace)
    pub fn correct(&self) -> usize {
        (0..self.counts.nrows()).map(|i| self.counts[[i, i]]).sum()
    }

    pub fn accuracy(&self) -> f64 {
        self.correct() as f64 / self.total() as f64
    }

    /// True-class sample count (row sum)
    pub fn class_total(&self, class: usize) -> usize {
        self.counts.row(class).sum()
    }
}

/// One-vs-rest metrics for a single class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: String,
    /// TP / (TP + FN); None when the class has no true samples
    pub sensitivity: Option<f64>,
    /// TN / (TN + FP)
    pub specificity: Option<f64>,
    /// TP / (TP + FP); None when the class was never predicted
    pub precision: Option<f64>,
    /// TN / (TN + FN)
    pub negative_predictive_value: Option<f64>,
}

/// Full evaluation of one fitted model on the test partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    /// 95% exact binomial interval on the accuracy
    pub accuracy_ci: (f64, f64),
}

/// Evaluate a fitted model on raw test features and labels
pub fn evaluate(
    model: &FittedModel,
    x_test: &Array2<f64>,
    y_test: &[usize],
    class_names: &[String],
) -> Result<Evaluation> {
    let predictions = model.predict(x_test)?;
    let confusion = ConfusionMatrix::from_labels(y_test, &predictions, class_names)?;
    let evaluation = summarize(confusion);

    info!(
        family = %model.family(),
        accuracy = evaluation.accuracy,
        ci_lower = evaluation.accuracy_ci.0,
        ci_upper = evaluation.accuracy_ci.1,
        "Test-set evaluation complete"
    );

    Ok(evaluation)
}

/// Derive per-class metrics and the accuracy interval from a matrix
pub fn summarize(confusion: ConfusionMatrix) -> Evaluation {
    let k = confusion.class_names.len();
    let total = confusion.total();

    let mut per_class = Vec::with_capacity(k);
    for c in 0..k {
        let tp = confusion.counts[[c, c]];
        let fn_ = confusion.class_total(c) - tp;
        let fp = confusion.counts.column(c).sum() - tp;
        let tn = total - tp - fn_ - fp;

        per_class.push(ClassMetrics {
            class: confusion.class_names[c].clone(),
            sensitivity: ratio(tp, tp + fn_),
            specificity: ratio(tn, tn + fp),
            precision: ratio(tp, tp + fp),
            negative_predictive_value: ratio(tn, tn + fn_),
        });
    }

    let accuracy = confusion.accuracy();
    let accuracy_ci = binomial_ci(confusion.correct(), total, 0.95);

    Evaluation {
        confusion,
        per_class,
        accuracy,
        accuracy_ci,
    }
}

fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn spec_matrix() -> ConfusionMatrix {
        ConfusionMatrix::from_counts(
            array![[14, 1, 0], [2, 13, 0], [0, 0, 15]],
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_accuracy_is_trace_over_total() {
        let m = spec_matrix();
        assert_eq!(m.total(), 45);
        assert_eq!(m.correct(), 42);
        assert!((m.accuracy() - 42.0 / 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_row_sums_are_class_totals() {
        let m = spec_matrix();
        assert_eq!(m.class_total(0), 15);
        assert_eq!(m.class_total(1), 15);
        assert_eq!(m.class_total(2), 15);
    }

    #[test]
    fn test_from_labels_tallies() {
        let actual = vec![0, 0, 1, 1, 2];
        let predicted = vec![0, 1, 1, 1, 2];
        let names = vec!["x".to_string(), "y".to_string(), "z".to_string()];
        let m = ConfusionMatrix::from_labels(&actual, &predicted, &names).unwrap();

        assert_eq!(m.counts()[[0, 0]], 1);
        assert_eq!(m.counts()[[0, 1]], 1);
        assert_eq!(m.counts()[[1, 1]], 2);
        assert_eq!(m.counts()[[2, 2]], 1);

        // Row sums equal per-class counts of the true labels
        assert_eq!(m.class_total(0), 2);
        assert_eq!(m.class_total(1), 2);
        assert_eq!(m.class_total(2), 1);
    }

    #[test]
    fn test_per_class_metrics() {
        let evaluation = summarize(spec_matrix());
        let a = &evaluation.per_class[0];

        // Class a: TP=14, FN=1, FP=2, TN=28
        assert!((a.sensitivity.unwrap() - 14.0 / 15.0).abs() < 1e-12);
        assert!((a.specificity.unwrap() - 28.0 / 30.0).abs() < 1e-12);
        assert!((a.precision.unwrap() - 14.0 / 16.0).abs() < 1e-12);
        assert!((a.negative_predictive_value.unwrap() - 28.0 / 29.0).abs() < 1e-12);

        // Class c is perfectly classified
        let c = &evaluation.per_class[2];
        assert_eq!(c.sensitivity, Some(1.0));
        assert_eq!(c.precision, Some(1.0));
    }

    #[test]
    fn test_ci_brackets_accuracy() {
        let evaluation = summarize(spec_matrix());
        let (lo, hi) = evaluation.accuracy_ci;
        assert!(lo < evaluation.accuracy && evaluation.accuracy < hi);
        assert!(lo > 0.7);
        assert!(hi <= 1.0);
    }

    #[test]
    fn test_never_predicted_class_has_no_precision() {
        let m = ConfusionMatrix::from_counts(
            array![[3, 2], [0, 0]],
            vec!["p".to_string(), "q".to_string()],
        )
        .unwrap();
        let evaluation = summarize(m);

        // Class q has no true samples, so sensitivity is undefined
        assert_eq!(evaluation.per_class[1].sensitivity, None);
        // But q was predicted twice, so precision is defined (and zero)
        assert_eq!(evaluation.per_class[1].precision, Some(0.0));
    }

    #[test]
    fn test_length_mismatch_rejected() {
        let names = vec!["x".to_string()];
        assert!(ConfusionMatrix::from_labels(&[0, 0], &[0], &names).is_err());
    }

    #[test]
    fn test_empty_test_set_rejected() {
        let names = vec!["x".to_string()];
        assert!(ConfusionMatrix::from_labels(&[], &[], &names).is_err());
    }
}
