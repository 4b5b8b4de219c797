//! Bayesian stopping rules for the pass rate of a property.
//!
//! The engine maintains a Beta(successes + 1, failures + 1) posterior over
//! the true pass rate (uniform prior). The confidence that the pass rate
//! exceeds a threshold θ is `1 − I_θ(s + 1, f + 1)` with `I` the regularized
//! incomplete beta function; credible intervals come from the Beta inverse
//! CDF and the Wilson score interval is available as a cheaper frequentist
//! alternative.

/// Posterior probability that the true pass rate exceeds `threshold`, after
/// observing `successes` passes and `failures` refutations.
pub fn confidence(successes: usize, failures: usize, threshold: f64) -> f64 {
    1.0 - beta_cdf(threshold, successes as f64 + 1.0, failures as f64 + 1.0)
}

/// Two-tailed credible interval for the pass rate at the given level.
pub fn credible_interval(successes: usize, failures: usize, level: f64) -> (f64, f64) {
    let alpha = successes as f64 + 1.0;
    let beta = failures as f64 + 1.0;
    let tail = (1.0 - level.clamp(0.0, 1.0)) / 2.0;
    (
        beta_inv_cdf(tail, alpha, beta),
        beta_inv_cdf(1.0 - tail, alpha, beta),
    )
}

/// Wilson score interval for a proportion of `successes` over `trials` at
/// critical value `z`.
pub fn wilson(successes: u64, trials: u64, z: f64) -> (f64, f64) {
    if trials == 0 {
        return (0.0, 1.0);
    }
    let n = trials as f64;
    let p = successes as f64 / n;
    let z2 = z * z;
    let denominator = 1.0 + z2 / n;
    let center = (p + z2 / (2.0 * n)) / denominator;
    let half = z * (p * (1.0 - p) / n + z2 / (4.0 * n * n)).sqrt() / denominator;
    ((center - half).max(0.0), (center + half).min(1.0))
}

/// Termination rules compiled from the strategy.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Termination {
    pub target: Option<f64>,
    pub minimum: Option<f64>,
    pub threshold: f64,
    pub ceiling: usize,
}

impl Termination {
    /// True once the confidence target is reached and exploration may stop
    /// early.
    pub fn satisfied(&self, successes: usize, failures: usize) -> bool {
        match self.target {
            Some(target) => confidence(successes, failures, self.threshold) >= target,
            None => false,
        }
    }

    /// True while the minimum confidence is unmet and exploration must keep
    /// drawing, up to the iteration ceiling.
    pub fn must_continue(&self, successes: usize, failures: usize) -> bool {
        match self.minimum {
            Some(minimum) => confidence(successes, failures, self.threshold) < minimum,
            None => false,
        }
    }
}

/// Regularized incomplete beta function `I_x(a, b)`.
pub fn beta_cdf(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b)
        + a * x.ln()
        + b * (1.0 - x).ln())
    .exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_fraction(x, a, b) / a
    } else {
        1.0 - front * beta_fraction(1.0 - x, b, a) / b
    }
}

/// Inverse of [`beta_cdf`] in `x`, by bisection; `I_x` is monotone in `x`.
pub fn beta_inv_cdf(p: f64, a: f64, b: f64) -> f64 {
    if p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }
    let (mut low, mut high) = (0.0f64, 1.0f64);
    for _ in 0..100 {
        let middle = (low + high) / 2.0;
        if beta_cdf(middle, a, b) < p {
            low = middle;
        } else {
            high = middle;
        }
    }
    (low + high) / 2.0
}

/// Continued-fraction evaluation of the incomplete beta (modified Lentz).
fn beta_fraction(x: f64, a: f64, b: f64) -> f64 {
    const EPSILON: f64 = 3e-14;
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
    for m in 1..=200 {
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
        let delta = d * c;
        h *= delta;
        if (delta - 1.0).abs() < EPSILON {
            break;
        }
    }
    h
}

/// Lanczos approximation of `ln Γ`.
fn ln_gamma(z: f64) -> f64 {
    const COEFFICIENTS: [f64; 8] = [
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_13,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if z < 0.5 {
        let pi = core::f64::consts::PI;
        (pi / (pi * z).sin()).ln() - ln_gamma(1.0 - z)
    } else {
        let z = z - 1.0;
        let mut x = 0.999_999_999_999_809_93;
        for (index, coefficient) in COEFFICIENTS.iter().enumerate() {
            x += coefficient / (z + index as f64 + 1.0);
        }
        let t = z + 7.5;
        0.5 * (2.0 * core::f64::consts::PI).ln() + (z + 0.5) * t.ln() - t + x.ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beta_cdf_matches_analytic_forms() {
        // I_x(1, 1) = x
        for x in [0.1, 0.25, 0.5, 0.9] {
            assert!((beta_cdf(x, 1.0, 1.0) - x).abs() < 1e-10);
        }
        // I_x(a, 1) = x^a
        assert!((beta_cdf(0.5, 3.0, 1.0) - 0.125).abs() < 1e-10);
        // I_x(1, b) = 1 - (1 - x)^b
        assert!((beta_cdf(0.25, 1.0, 4.0) - (1.0 - 0.75f64.powi(4))).abs() < 1e-10);
    }

    #[test]
    fn confidence_grows_with_successes() {
        for failures in [0usize, 1, 5] {
            let mut previous = 0.0;
            for successes in 0..200 {
                let current = confidence(successes, failures, 0.9);
                assert!(current >= previous - 1e-12);
                previous = current;
            }
        }
    }

    #[test]
    fn confidence_drops_with_failures() {
        for successes in [0usize, 10, 100] {
            let mut previous = 1.0;
            for failures in 0..50 {
                let current = confidence(successes, failures, 0.9);
                assert!(current <= previous + 1e-12);
                previous = current;
            }
        }
    }

    #[test]
    fn inverse_cdf_round_trips() {
        for p in [0.025, 0.5, 0.975] {
            let x = beta_inv_cdf(p, 42.0, 17.0);
            assert!((beta_cdf(x, 42.0, 17.0) - p).abs() < 1e-9);
        }
    }

    #[test]
    fn credible_interval_brackets_the_estimate() {
        let (low, high) = credible_interval(90, 10, 0.95);
        assert!(low < 0.9 && 0.9 < high);
        assert!(high - low < 0.15);
    }

    #[test]
    fn wilson_matches_the_textbook_example() {
        let (low, high) = wilson(50, 100, 1.96);
        assert!((low - 0.404).abs() < 5e-3);
        assert!((high - 0.596).abs() < 5e-3);
    }

    #[test]
    fn wilson_handles_degenerate_counts() {
        assert_eq!(wilson(0, 0, 1.96), (0.0, 1.0));
        let (low, high) = wilson(0, 10, 1.96);
        assert_eq!(low, 0.0);
        assert!(high > 0.0);
    }
}
