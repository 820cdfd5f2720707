//! Small statistical helpers shared by the comparison and evaluation stages

/// Quantile of a sorted slice using linear interpolation (R-7 method).
///
/// `q` is clamped to [0, 1]; the slice must be sorted ascending and
/// non-empty.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let q = q.clamp(0.0, 1.0);
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }

    let h = (n - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = h - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Exact (Clopper-Pearson) two-sided binomial confidence interval for a
/// proportion of `successes` out of `trials`.
///
/// Returns `(lower, upper)` at the given confidence level, e.g. 0.95.
pub fn binomial_ci(successes: usize, trials: usize, confidence: f64) -> (f64, f64) {
    assert!(trials > 0, "binomial_ci requires at least one trial");
    assert!(successes <= trials);
    let alpha = 1.0 - confidence.clamp(0.0, 1.0);
    let k = successes as f64;
    let n = trials as f64;

    let lower = if successes == 0 {
        0.0
    } else {
        inv_beta_cdf(alpha / 2.0, k, n - k + 1.0)
    };
    let upper = if successes == trials {
        1.0
    } else {
        inv_beta_cdf(1.0 - alpha / 2.0, k + 1.0, n - k)
    };

    (lower, upper)
}

/// Inverse of the regularized incomplete beta function, solved by
/// bisection. Monotonicity of the CDF makes this robust for every
/// (a, b) the binomial interval produces.
fn inv_beta_cdf(p: f64, a: f64, b: f64) -> f64 {
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }

    let mut lo = 0.0;
    let mut hi = 1.0;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if reg_inc_beta(a, b, mid) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    0.5 * (lo + hi)
}

/// Regularized incomplete beta function I_x(a, b), evaluated with the
/// continued fraction in whichever tail converges fast.
fn reg_inc_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }

    let ln_front = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b)
        + a * x.ln()
        + b * (1.0 - x).ln();
    let front = ln_front.exp();

    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_cont_frac(a, b, x) / a
    } else {
        1.0 - front * beta_cont_frac(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta (modified Lentz method)
fn beta_cont_frac(a: f64, b: f64, x: f64) -> f64 {
    const MAX_ITER: usize = 300;
    const EPS: f64 = 3e-14;
    const TINY: f64 = 1e-300;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=MAX_ITER {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;

        if (del - 1.0).abs() < EPS {
            break;
        }
    }

    h
}

/// Natural log of the gamma function (Lanczos approximation, g = 7)
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_93,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_59,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_571_6e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection formula
        return std::f64::consts::PI.ln()
            - (std::f64::consts::PI * x).sin().ln()
            - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut acc = COEFFS[0];
    for (i, &c) in COEFFS.iter().enumerate().skip(1) {
        acc += c / (x + i as f64);
    }
    let t = x + 7.5;
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + acc.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_median() {
        let data = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(quantile_sorted(&data, 0.5), 3.0);
        assert_eq!(quantile_sorted(&data, 0.0), 1.0);
        assert_eq!(quantile_sorted(&data, 1.0), 5.0);
    }

    #[test]
    fn test_quantile_interpolates() {
        let data = [1.0, 2.0, 3.0, 4.0];
        // R-7: h = 3 * 0.5 = 1.5 -> 2.5
        assert!((quantile_sorted(&data, 0.5) - 2.5).abs() < 1e-12);
        // h = 3 * 0.25 = 0.75 -> 1.75
        assert!((quantile_sorted(&data, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_ln_gamma_known_values() {
        // gamma(5) = 24
        assert!((ln_gamma(5.0) - 24.0f64.ln()).abs() < 1e-10);
        // gamma(0.5) = sqrt(pi)
        assert!((ln_gamma(0.5) - std::f64::consts::PI.sqrt().ln()).abs() < 1e-10);
    }

    #[test]
    fn test_reg_inc_beta_symmetry() {
        // I_x(a, b) = 1 - I_{1-x}(b, a)
        let v1 = reg_inc_beta(3.0, 5.0, 0.3);
        let v2 = 1.0 - reg_inc_beta(5.0, 3.0, 0.7);
        assert!((v1 - v2).abs() < 1e-10);
    }

    #[test]
    fn test_reg_inc_beta_uniform() {
        // Beta(1, 1) is uniform: I_x(1, 1) = x
        for &x in &[0.1, 0.35, 0.8] {
            assert!((reg_inc_beta(1.0, 1.0, x) - x).abs() < 1e-10);
        }
    }

    #[test]
    fn test_binomial_ci_contains_point_estimate() {
        let (lo, hi) = binomial_ci(42, 45, 0.95);
        let p_hat = 42.0 / 45.0;
        assert!(lo < p_hat && p_hat < hi);
        // Reference: binom.test(42, 45) gives roughly [0.814, 0.983]
        assert!(lo > 0.78 && lo < 0.85, "lower bound {lo}");
        assert!(hi > 0.96 && hi < 0.999, "upper bound {hi}");
    }

    #[test]
    fn test_binomial_ci_edges() {
        let (lo, hi) = binomial_ci(0, 20, 0.95);
        assert_eq!(lo, 0.0);
        assert!(hi > 0.0 && hi < 0.3);

        let (lo, hi) = binomial_ci(20, 20, 0.95);
        assert!(lo > 0.7 && lo < 1.0);
        assert_eq!(hi, 1.0);
    }

    #[test]
    fn test_binomial_ci_narrows_with_trials() {
        let (lo1, hi1) = binomial_ci(8, 10, 0.95);
        let (lo2, hi2) = binomial_ci(80, 100, 0.95);
        assert!(hi2 - lo2 < hi1 - lo1);
    }
}
