//! RBF-kernel support vector machine
//!
//! Soft-margin SVM trained with SMO (Sequential Minimal Optimization)
//! over a kernel matrix computed once per fit and shared by every
//! one-vs-rest machine.

use crate::error::{CultivarError, Result};
use crate::models::Classifier;
use crate::preprocessing::ScaledFeatures;
use ndarray::{Array1, Array2};
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// A single binary machine trained for one class vs rest
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryMachine {
    support_vectors: Array2<f64>,
    alphas: Array1<f64>,
    support_labels: Array1<f64>,
    bias: f64,
}

/// One-vs-rest support vector classifier with an RBF kernel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    cost: f64,
    gamma: f64,
    tol: f64,
    max_iter: usize,
    seed: u64,
    classes: Vec<usize>,
    machines: Vec<BinaryMachine>,
    is_fitted: bool,
}

impl SvmClassifier {
    /// Create an untrained classifier with the given cost and kernel width
    pub fn new(cost: f64, gamma: f64) -> Self {
        Self {
            cost,
            gamma,
            tol: 1e-3,
            max_iter: 1000,
            seed: 42,
            classes: Vec::new(),
            machines: Vec::new(),
            is_fitted: false,
        }
    }

    /// Seed for the SMO working-pair selection
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn n_support_vectors(&self) -> usize {
        self.machines.iter().map(|m| m.support_vectors.nrows()).sum()
    }

    fn rbf(&self, a: &[f64], b: &[f64]) -> f64 {
        let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum();
        (-self.gamma * norm_sq).exp()
    }

    fn kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut k = Array2::zeros((n, n));
        for i in 0..n {
            let row_i = x.row(i);
            for j in i..n {
                let val = self.rbf(row_i.as_slice().unwrap(), x.row(j).as_slice().unwrap());
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        k
    }

    /// Train one binary machine on cached kernel values.
    ///
    /// `y` holds +1/-1 targets. Returns (alphas, bias, support indices).
    fn smo_train(
        &self,
        kernel: &Array2<f64>,
        y: &Array1<f64>,
        machine_seed: u64,
    ) -> (Array1<f64>, f64, Vec<usize>) {
        let n = y.len();
        let mut alphas = Array1::zeros(n);
        let mut bias = 0.0;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(machine_seed);

        let decision = |k: &Array2<f64>, alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let mut sum = 0.0;
            for i in 0..n {
                sum += alphas[i] * y[i] * k[[i, idx]];
            }
            sum + bias
        };

        let mut passes = 0;
        let max_passes = 5;
        let mut total_iter = 0;

        while passes < max_passes && total_iter < self.max_iter && n > 1 {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(kernel, &alphas, bias, i) - y[i];

                // KKT violation check
                if (y[i] * e_i < -self.tol && alphas[i] < self.cost)
                    || (y[i] * e_i > self.tol && alphas[i] > 0.0)
                {
                    let j = loop {
                        let j = rng.gen_range(0..n);
                        if j != i {
                            break j;
                        }
                    };

                    let e_j = decision(kernel, &alphas, bias, j) - y[j];

                    let alpha_i_old = alphas[i];
                    let alpha_j_old = alphas[j];

                    let (lo, hi) = if y[i] != y[j] {
                        (
                            (alphas[j] - alphas[i]).max(0.0),
                            (self.cost + alphas[j] - alphas[i]).min(self.cost),
                        )
                    } else {
                        (
                            (alphas[i] + alphas[j] - self.cost).max(0.0),
                            (alphas[i] + alphas[j]).min(self.cost),
                        )
                    };

                    if (lo - hi).abs() < 1e-10 {
                        continue;
                    }

                    let eta = 2.0 * kernel[[i, j]] - kernel[[i, i]] - kernel[[j, j]];
                    if eta >= 0.0 {
                        continue;
                    }

                    alphas[j] = (alphas[j] - y[j] * (e_i - e_j) / eta).clamp(lo, hi);
                    if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                        continue;
                    }

                    alphas[i] += y[i] * y[j] * (alpha_j_old - alphas[j]);

                    let b1 = bias
                        - e_i
                        - y[i] * (alphas[i] - alpha_i_old) * kernel[[i, i]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel[[i, j]];
                    let b2 = bias
                        - e_j
                        - y[i] * (alphas[i] - alpha_i_old) * kernel[[i, j]]
                        - y[j] * (alphas[j] - alpha_j_old) * kernel[[j, j]];

                    bias = if alphas[i] > 0.0 && alphas[i] < self.cost {
                        b1
                    } else if alphas[j] > 0.0 && alphas[j] < self.cost {
                        b2
                    } else {
                        (b1 + b2) / 2.0
                    };

                    num_changed += 1;
                }
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        let support_indices: Vec<usize> = alphas
            .iter()
            .enumerate()
            .filter(|(_, &a)| a > 1e-8)
            .map(|(i, _)| i)
            .collect();

        (alphas, bias, support_indices)
    }

    fn build_machine(
        &self,
        x: &Array2<f64>,
        kernel: &Array2<f64>,
        targets: &Array1<f64>,
        machine_seed: u64,
    ) -> BinaryMachine {
        let (alphas, bias, support_indices) = self.smo_train(kernel, targets, machine_seed);

        let sv_count = support_indices.len();
        let mut support_vectors = Array2::zeros((sv_count, x.ncols()));
        let mut support_labels = Array1::zeros(sv_count);
        let mut support_alphas = Array1::zeros(sv_count);

        for (i, &idx) in support_indices.iter().enumerate() {
            support_vectors.row_mut(i).assign(&x.row(idx));
            support_labels[i] = targets[idx];
            support_alphas[i] = alphas[idx];
        }

        BinaryMachine {
            support_vectors,
            alphas: support_alphas,
            support_labels,
            bias,
        }
    }

    fn machine_score(&self, machine: &BinaryMachine, sample: &[f64]) -> f64 {
        let mut sum = machine.bias;
        for j in 0..machine.support_vectors.nrows() {
            let sv = machine.support_vectors.row(j);
            sum += machine.alphas[j]
                * machine.support_labels[j]
                * self.rbf(sample, sv.as_slice().unwrap());
        }
        sum
    }
}

impl Classifier for SvmClassifier {
    fn fit(&mut self, x: &ScaledFeatures, y: &[usize]) -> Result<()> {
        let x = x.matrix();
        let n = x.nrows();

        if n != y.len() {
            return Err(CultivarError::Shape {
                expected: format!("{} labels", n),
                actual: format!("{} labels", y.len()),
            });
        }
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(CultivarError::Data(format!(
                "{} samples exceed the {} sample cap for the SVM kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let mut classes: Vec<usize> = y.to_vec();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(CultivarError::Data(
                "SVM training requires at least 2 distinct classes".to_string(),
            ));
        }
        self.classes = classes;

        let kernel = self.kernel_matrix(x);

        let mut machines = Vec::new();
        if self.classes.len() == 2 {
            // Single machine: positive = second class
            let positive = self.classes[1];
            let targets: Array1<f64> =
                Array1::from_iter(y.iter().map(|&l| if l == positive { 1.0 } else { -1.0 }));
            machines.push(self.build_machine(x, &kernel, &targets, self.seed));
        } else {
            for (idx, &cls) in self.classes.iter().enumerate() {
                let targets: Array1<f64> =
                    Array1::from_iter(y.iter().map(|&l| if l == cls { 1.0 } else { -1.0 }));
                let machine_seed = self.seed.wrapping_add(idx as u64);
                machines.push(self.build_machine(x, &kernel, &targets, machine_seed));
            }
        }

        self.machines = machines;
        self.is_fitted = true;
        Ok(())
    }

    fn predict(&self, x: &ScaledFeatures) -> Result<Vec<usize>> {
        if !self.is_fitted {
            return Err(CultivarError::ModelNotFitted);
        }

        let x = x.matrix();
        let mut predictions = Vec::with_capacity(x.nrows());

        for i in 0..x.nrows() {
            let sample = x.row(i);
            let sample = sample.as_slice().unwrap();

            let label = if self.classes.len() == 2 {
                let score = self.machine_score(&self.machines[0], sample);
                if score >= 0.0 {
                    self.classes[1]
                } else {
                    self.classes[0]
                }
            } else {
                // Highest one-vs-rest score; strict comparison keeps the
                // lowest class index on exact ties
                let mut best_score = f64::NEG_INFINITY;
                let mut best_class = self.classes[0];
                for (machine, &cls) in self.machines.iter().zip(self.classes.iter()) {
                    let score = self.machine_score(machine, sample);
                    if score > best_score {
                        best_score = score;
                        best_class = cls;
                    }
                }
                best_class
            };

            predictions.push(label);
        }

        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocessing::FittedScaler;
    use ndarray::Array2;

    fn scaled(x: Array2<f64>) -> ScaledFeatures {
        FittedScaler::fit(&x).transform(&x).unwrap()
    }

    fn three_blob_data() -> (ScaledFeatures, Vec<usize>) {
        let mut rows = Vec::new();
        let centers = [(0.0, 0.0), (6.0, 6.0), (0.0, 6.0)];
        for (cx, cy) in centers {
            for i in 0..8 {
                let dx = 0.2 * (i % 3) as f64;
                let dy = 0.15 * (i % 4) as f64;
                rows.push([cx + dx, cy + dy]);
            }
        }
        let x = Array2::from_shape_fn((24, 2), |(r, c)| rows[r][c]);
        let y: Vec<usize> = (0..24).map(|i| i / 8).collect();
        (scaled(x), y)
    }

    #[test]
    fn test_binary_classification() {
        let x = Array2::from_shape_vec(
            (10, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 2.0, 1.2, 1.8, 0.8, 1.5, 5.0, 5.0, 5.5, 5.2, 6.0, 6.0,
                5.2, 5.8, 4.8, 5.5,
            ],
        )
        .unwrap();
        let y = vec![0, 0, 0, 0, 0, 1, 1, 1, 1, 1];

        let x = scaled(x);
        let mut svm = SvmClassifier::new(1.0, 0.5);
        svm.fit(&x, &y).unwrap();

        let predictions = svm.predict(&x).unwrap();
        let correct = predictions.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 8, "only {} of 10 correct", correct);
    }

    #[test]
    fn test_multiclass_one_vs_rest() {
        let (x, y) = three_blob_data();

        let mut svm = SvmClassifier::new(10.0, 0.5);
        svm.fit(&x, &y).unwrap();

        let predictions = svm.predict(&x).unwrap();
        assert_eq!(predictions.len(), 24);
        for &p in &predictions {
            assert!(p < 3);
        }

        let correct = predictions.iter().zip(y.iter()).filter(|(p, a)| p == a).count();
        assert!(correct >= 18, "only {} of 24 correct", correct);
    }

    #[test]
    fn test_fit_deterministic_with_seed() {
        let (x, y) = three_blob_data();

        let mut a = SvmClassifier::new(1.0, 0.5).with_seed(7);
        let mut b = SvmClassifier::new(1.0, 0.5).with_seed(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
        assert_eq!(a.n_support_vectors(), b.n_support_vectors());
    }

    #[test]
    fn test_single_class_rejected() {
        let x = scaled(Array2::from_shape_vec((4, 1), vec![1.0, 2.0, 3.0, 4.0]).unwrap());
        let y = vec![0, 0, 0, 0];
        let mut svm = SvmClassifier::new(1.0, 1.0);
        assert!(svm.fit(&x, &y).is_err());
    }

    #[test]
    fn test_predict_before_fit_rejected() {
        let x = scaled(Array2::from_shape_vec((2, 1), vec![1.0, 2.0]).unwrap());
        let svm = SvmClassifier::new(1.0, 1.0);
        assert!(matches!(
            svm.predict(&x),
            Err(CultivarError::ModelNotFitted)
        ));
    }
}
