//! Feature preprocessing
//!
//! Centering and scaling statistics are always derived from one
//! specific training subset. Models only accept [`ScaledFeatures`],
//! which can only be produced by [`FittedScaler::transform`], so raw
//! validation or test rows cannot slip into a fit and the transform can
//! never be silently refit on held-out data.

use crate::error::{CultivarError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Center+scale transform frozen to the training subset it was fit on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedScaler {
    means: Array1<f64>,
    stds: Array1<f64>,
}

impl FittedScaler {
    /// Derive means and standard deviations from a training subset
    pub fn fit(x: &Array2<f64>) -> Self {
        let n = x.nrows().max(1) as f64;
        let p = x.ncols();

        let means = Array1::from_shape_fn(p, |j| x.column(j).sum() / n);
        let stds = Array1::from_shape_fn(p, |j| {
            let m = means[j];
            let ss: f64 = x.column(j).iter().map(|v| (v - m).powi(2)).sum();
            let denom = if x.nrows() > 1 { n - 1.0 } else { 1.0 };
            let sd = (ss / denom).sqrt();
            if sd == 0.0 {
                1.0
            } else {
                sd
            }
        });

        Self { means, stds }
    }

    /// Apply the frozen transform to a feature matrix
    pub fn transform(&self, x: &Array2<f64>) -> Result<ScaledFeatures> {
        if x.ncols() != self.means.len() {
            return Err(CultivarError::Shape {
                expected: format!("{} columns", self.means.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let data = Array2::from_shape_fn((x.nrows(), x.ncols()), |(r, c)| {
            (x[[r, c]] - self.means[c]) / self.stds[c]
        });

        Ok(ScaledFeatures { data })
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn stds(&self) -> &Array1<f64> {
        &self.stds
    }
}

/// Features that have passed through a transform bound to a training
/// subset. Constructed only by [`FittedScaler::transform`].
#[derive(Debug, Clone)]
pub struct ScaledFeatures {
    data: Array2<f64>,
}

impl ScaledFeatures {
    pub fn matrix(&self) -> &Array2<f64> {
        &self.data
    }

    pub fn nrows(&self) -> usize {
        self.data.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.data.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_fit_transform_centers_and_scales() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0], [5.0, 50.0]];
        let scaler = FittedScaler::fit(&x);
        let scaled = scaler.transform(&x).unwrap();

        for j in 0..2 {
            let col = scaled.matrix().column(j);
            let mean: f64 = col.sum() / 5.0;
            let var: f64 = col.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / 4.0;
            assert!(mean.abs() < 1e-12);
            assert!((var - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_transform_uses_frozen_statistics() {
        let train = array![[0.0], [10.0]];
        let scaler = FittedScaler::fit(&train);

        // New data is scaled with train statistics, not its own
        let test = array![[5.0], [20.0]];
        let scaled = scaler.transform(&test).unwrap();
        let expected_first = (5.0 - 5.0) / scaler.stds()[0];
        let expected_second = (20.0 - 5.0) / scaler.stds()[0];
        assert!((scaled.matrix()[[0, 0]] - expected_first).abs() < 1e-12);
        assert!((scaled.matrix()[[1, 0]] - expected_second).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_scales_to_zero() {
        let x = array![[7.0], [7.0], [7.0]];
        let scaler = FittedScaler::fit(&x);
        let scaled = scaler.transform(&x).unwrap();
        for v in scaled.matrix().iter() {
            assert_eq!(*v, 0.0);
        }
    }

    #[test]
    fn test_column_mismatch_rejected() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let scaler = FittedScaler::fit(&x);
        let wrong = array![[1.0], [2.0]];
        assert!(matches!(
            scaler.transform(&wrong),
            Err(CultivarError::Shape { .. })
        ));
    }
}
