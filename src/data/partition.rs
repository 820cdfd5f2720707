//! Stratified train/test partitioning

use crate::error::{CultivarError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// A disjoint split of sample indices into train and test sides
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partition {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Partition {
    pub fn train_size(&self) -> usize {
        self.train.len()
    }

    pub fn test_size(&self) -> usize {
        self.test.len()
    }
}

/// Split samples into stratified train/test subsets.
///
/// Within each class, `round(fraction * class_count)` samples go to the
/// training side, so per-class proportions match the global fraction up
/// to one sample of rounding. Identical `(labels, fraction, seed)`
/// always produce the identical split.
pub fn stratified_split(
    labels: &[usize],
    n_classes: usize,
    fraction: f64,
    seed: u64,
) -> Result<Partition> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(CultivarError::InvalidParameter {
            name: "fraction".to_string(),
            value: fraction.to_string(),
            reason: "must be strictly between 0 and 1".to_string(),
        });
    }
    if labels.is_empty() {
        return Err(CultivarError::Partition("no samples to split".to_string()));
    }

    let mut per_class: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (idx, &label) in labels.iter().enumerate() {
        if label >= n_classes {
            return Err(CultivarError::Partition(format!(
                "label index {} out of range for {} classes",
                label, n_classes
            )));
        }
        per_class[label].push(idx);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (class, indices) in per_class.iter_mut().enumerate() {
        let count = indices.len();
        if count < 2 {
            return Err(CultivarError::Partition(format!(
                "class {} has {} sample(s), need at least 2 to stratify",
                class, count
            )));
        }

        let n_train = (fraction * count as f64).round() as usize;
        if n_train == 0 || n_train == count {
            return Err(CultivarError::Partition(format!(
                "class {} has {} samples, cannot stratify at fraction {}",
                class, count, fraction
            )));
        }

        indices.shuffle(&mut rng);
        train.extend_from_slice(&indices[..n_train]);
        test.extend_from_slice(&indices[n_train..]);
    }

    train.sort_unstable();
    test.sort_unstable();

    Ok(Partition { train, test })
}
