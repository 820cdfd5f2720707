//! Predictor quality screening
//!
//! Two advisory, read-only checks over the training partition:
//! near-zero-variance detection and greedy high-correlation
//! elimination. Neither removes predictors by itself; both report what
//! a caller may want to drop.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Per-predictor variance diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarianceReport {
    pub predictor: String,
    /// Count of the most frequent value over the second-most frequent
    pub freq_ratio: f64,
    /// Distinct values as a percentage of sample count
    pub percent_unique: f64,
    /// Single distinct value
    pub zero_variance: bool,
    /// Flagged by the ratio + uniqueness rule (or zero variance)
    pub near_zero_variance: bool,
}

/// Compute near-zero-variance diagnostics for every predictor.
///
/// A predictor is flagged when its frequency ratio exceeds
/// `freq_ratio_cutoff` AND its percent-unique falls below
/// `unique_pct_cutoff`. A constant predictor is always flagged and
/// reports a frequency ratio of 0 (there is no second value to ratio
/// against).
pub fn near_zero_variance(
    features: &Array2<f64>,
    names: &[String],
    freq_ratio_cutoff: f64,
    unique_pct_cutoff: f64,
) -> Vec<VarianceReport> {
    let n = features.nrows();
    let mut reports = Vec::with_capacity(features.ncols());

    for (col, name) in names.iter().enumerate().take(features.ncols()) {
        let mut values: Vec<f64> = features.column(col).to_vec();
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        // Run lengths of equal values, descending
        let mut counts: Vec<usize> = Vec::new();
        let mut run = 1usize;
        for i in 1..values.len() {
            if values[i] == values[i - 1] {
                run += 1;
            } else {
                counts.push(run);
                run = 1;
            }
        }
        counts.push(run);
        counts.sort_unstable_by(|a, b| b.cmp(a));

        let distinct = counts.len();
        let percent_unique = 100.0 * distinct as f64 / n as f64;
        let zero_variance = distinct <= 1;
        let freq_ratio = if distinct < 2 {
            0.0
        } else {
            counts[0] as f64 / counts[1] as f64
        };

        let near_zero_variance = zero_variance
            || (freq_ratio > freq_ratio_cutoff && percent_unique < unique_pct_cutoff);

        if near_zero_variance {
            debug!(
                predictor = %name,
                freq_ratio,
                percent_unique,
                "Near-zero-variance predictor"
            );
        }

        reports.push(VarianceReport {
            predictor: name.clone(),
            freq_ratio,
            percent_unique,
            zero_variance,
            near_zero_variance,
        });
    }

    reports
}

/// Full pairwise Pearson correlation matrix over predictors.
///
/// A constant predictor correlates 0 with everything (its correlation
/// is undefined; 0 keeps it out of the eliminator's way).
pub fn correlation_matrix(features: &Array2<f64>) -> Array2<f64> {
    let n = features.nrows() as f64;
    let p = features.ncols();

    let means: Vec<f64> = (0..p).map(|j| features.column(j).sum() / n).collect();
    let devs: Vec<f64> = (0..p)
        .map(|j| {
            features
                .column(j)
                .iter()
                .map(|v| (v - means[j]).powi(2))
                .sum::<f64>()
                .sqrt()
        })
        .collect();

    let mut corr = Array2::zeros((p, p));
    for i in 0..p {
        corr[[i, i]] = 1.0;
        for j in (i + 1)..p {
            let cov: f64 = features
                .column(i)
                .iter()
                .zip(features.column(j).iter())
                .map(|(a, b)| (a - means[i]) * (b - means[j]))
                .sum();
            let denom = devs[i] * devs[j];
            let r = if denom > 0.0 { cov / denom } else { 0.0 };
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }

    corr
}

/// Greedy correlation-based elimination.
///
/// Repeatedly finds the pair with the highest absolute correlation
/// above `cutoff` and drops the member with the larger mean absolute
/// correlation against the remaining predictors; an exact tie drops the
/// lower column index. Returns the removal order. After removal no
/// surviving pair exceeds the cutoff.
pub fn find_correlated(corr: &Array2<f64>, cutoff: f64) -> Vec<usize> {
    let p = corr.nrows();
    let mut alive = vec![true; p];
    let mut removed = Vec::new();

    loop {
        // Worst surviving pair
        let mut worst: Option<(usize, usize, f64)> = None;
        for i in 0..p {
            if !alive[i] {
                continue;
            }
            for j in (i + 1)..p {
                if !alive[j] {
                    continue;
                }
                let r = corr[[i, j]].abs();
                if r > cutoff && worst.map(|(_, _, w)| r > w).unwrap_or(true) {
                    worst = Some((i, j, r));
                }
            }
        }

        let Some((i, j, r)) = worst else {
            break;
        };

        let mean_i = mean_abs_corr(corr, i, &alive);
        let mean_j = mean_abs_corr(corr, j, &alive);

        let drop = if mean_i > mean_j {
            i
        } else if mean_j > mean_i {
            j
        } else {
            i.min(j)
        };

        debug!(pair = ?(i, j), correlation = r, drop, "Dropping correlated predictor");
        alive[drop] = false;
        removed.push(drop);
    }

    removed
}

fn mean_abs_corr(corr: &Array2<f64>, idx: usize, alive: &[bool]) -> f64 {
    let mut total = 0.0;
    let mut count = 0usize;
    for (other, &is_alive) in alive.iter().enumerate() {
        if is_alive && other != idx {
            total += corr[[idx, other]].abs();
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("x{}", i)).collect()
    }

    fn from_columns(cols: &[Vec<f64>]) -> Array2<f64> {
        let n = cols[0].len();
        Array2::from_shape_fn((n, cols.len()), |(r, c)| cols[c][r])
    }

    #[test]
    fn test_constant_predictor_is_zero_variance() {
        let x = from_columns(&[vec![3.0; 50], (0..50).map(|i| i as f64).collect()]);
        let reports = near_zero_variance(&x, &names(2), 19.0, 10.0);

        assert!(reports[0].zero_variance);
        assert!(reports[0].near_zero_variance);
        assert_eq!(reports[0].freq_ratio, 0.0);
        assert!(!reports[1].zero_variance);
        assert!(!reports[1].near_zero_variance);
    }

    #[test]
    fn test_nzv_requires_both_conditions() {
        // 96 zeros, 4 ones: ratio 24 > 19, percent unique 2 < 10
        let mut skewed = vec![0.0; 96];
        skewed.extend(vec![1.0; 4]);
        // 50/50 binary: ratio 1, percent unique 2
        let balanced: Vec<f64> = (0..100).map(|i| (i % 2) as f64).collect();
        // all distinct: ratio 1, percent unique 100
        let uniform: Vec<f64> = (0..100).map(|i| i as f64).collect();

        let x = from_columns(&[skewed, balanced, uniform]);
        let reports = near_zero_variance(&x, &names(3), 19.0, 10.0);

        assert!(reports[0].near_zero_variance);
        assert!((reports[0].freq_ratio - 24.0).abs() < 1e-12);
        assert!(!reports[1].near_zero_variance, "low ratio must not flag");
        assert!(!reports[2].near_zero_variance, "high uniqueness must not flag");
    }

    #[test]
    fn test_nzv_cutoff_is_strict() {
        // 95 zeros, 5 ones: ratio exactly 19 does not exceed the cutoff
        let mut col = vec![0.0; 95];
        col.extend(vec![1.0; 5]);
        let x = from_columns(&[col]);
        let reports = near_zero_variance(&x, &names(1), 19.0, 10.0);
        assert!(!reports[0].near_zero_variance);
    }

    #[test]
    fn test_correlation_matrix_known_values() {
        let a: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let b: Vec<f64> = a.iter().map(|v| 2.0 * v + 1.0).collect();
        let c: Vec<f64> = a.iter().map(|v| -v).collect();
        let x = from_columns(&[a, b, c]);

        let corr = correlation_matrix(&x);
        assert!((corr[[0, 1]] - 1.0).abs() < 1e-10);
        assert!((corr[[0, 2]] + 1.0).abs() < 1e-10);
        assert!((corr[[0, 0]] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_constant_column_correlates_zero() {
        let x = from_columns(&[(0..10).map(|i| i as f64).collect(), vec![5.0; 10]]);
        let corr = correlation_matrix(&x);
        assert_eq!(corr[[0, 1]], 0.0);
    }

    #[test]
    fn test_find_correlated_removes_duplicate() {
        let a: Vec<f64> = (0..12).map(|i| i as f64).collect();
        let dup = a.clone();
        let noise: Vec<f64> = vec![
            5.0, 9.0, 1.0, 12.0, 3.0, 8.0, 2.0, 11.0, 6.0, 4.0, 10.0, 7.0,
        ];
        let alternating: Vec<f64> = (0..12).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let x = from_columns(&[a, dup, noise, alternating]);

        let corr = correlation_matrix(&x);
        let removed = find_correlated(&corr, 0.75);

        // Duplicate columns tie on mean correlation; lower index drops
        assert_eq!(removed, vec![0]);

        // Nothing above the cutoff survives
        let alive: Vec<usize> = (0..4).filter(|i| !removed.contains(i)).collect();
        for (pos, &i) in alive.iter().enumerate() {
            for &j in &alive[pos + 1..] {
                assert!(corr[[i, j]].abs() <= 0.75, "pair ({i}, {j}) still correlated");
            }
        }
    }

    #[test]
    fn test_find_correlated_deterministic() {
        let a: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let b: Vec<f64> = a.iter().map(|v| v + ((v * 7.0).sin())).collect();
        let c: Vec<f64> = a.iter().map(|v| 0.5 * v + 3.0 * (v * 3.0).cos()).collect();
        let x = from_columns(&[a, b, c]);
        let corr = correlation_matrix(&x);

        let r1 = find_correlated(&corr, 0.75);
        let r2 = find_correlated(&corr, 0.75);
        assert_eq!(r1, r2);
    }

    #[test]
    fn test_find_correlated_empty_when_uncorrelated() {
        let a: Vec<f64> = (0..8).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let b: Vec<f64> = (0..8)
            .map(|i| if (i / 2) % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        let x = from_columns(&[a, b]);
        let corr = correlation_matrix(&x);
        assert!(find_correlated(&corr, 0.75).is_empty());
    }
}
