//! Reference distributions for significance testing
//!
//! Standard normal tail probabilities for z-scores, and exact upper-tail
//! probabilities for the discrete count models used by cluster detection
//! (Poisson, binomial) and local join counts (hypergeometric). Discrete
//! tails are summed in log space so that large populations neither
//! overflow nor underflow the individual terms.

/// Approximate CDF of the standard normal distribution.
///
/// Abramowitz & Stegun 26.2.17 (error < 7.5e-8).
pub fn normal_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let t = 1.0 / (1.0 + 0.2316419 * x.abs());
    let d = 0.3989422804014327; // 1/sqrt(2*pi)
    let p = d
        * (-x * x / 2.0).exp()
        * (t * (0.3193815 + t * (-0.3565638 + t * (1.781478 + t * (-1.821256 + t * 1.330274)))));

    if x > 0.0 {
        1.0 - p
    } else {
        p
    }
}

/// Two-tailed p-value of a z-score
pub fn two_tailed_p(z: f64) -> f64 {
    if z.is_nan() || z == 0.0 {
        return 1.0;
    }
    (2.0 * normal_cdf(-z.abs())).min(1.0)
}

/// ln Γ(x) for x > 0 (Lanczos, g = 7, n = 9)
pub fn ln_gamma(x: f64) -> f64 {
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];

    if x < 0.5 {
        // Reflection
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }

    let x = x - 1.0;
    let mut a = COEF[0];
    let t = x + 7.5;
    for (i, &c) in COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// ln(n!)
pub fn ln_factorial(n: u64) -> f64 {
    if n < 2 {
        0.0
    } else {
        ln_gamma(n as f64 + 1.0)
    }
}

/// ln C(n, k)
pub fn ln_choose(n: u64, k: u64) -> f64 {
    if k > n {
        return f64::NEG_INFINITY;
    }
    ln_factorial(n) - ln_factorial(k) - ln_factorial(n - k)
}

/// Relative size below which a tail term no longer changes the sum
const TAIL_EPSILON: f64 = 1e-16;

/// P(X >= k) for X ~ Poisson(lambda)
pub fn poisson_sf(k: u64, lambda: f64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    if lambda <= 0.0 || !lambda.is_finite() {
        return 0.0;
    }

    let mut term = (k as f64 * lambda.ln() - lambda - ln_factorial(k)).exp();
    let mut sum = term;
    let mut i = k;
    loop {
        i += 1;
        term *= lambda / i as f64;
        sum += term;
        if (i as f64) > lambda && term <= sum * TAIL_EPSILON {
            break;
        }
        if term == 0.0 {
            break;
        }
    }
    sum.min(1.0)
}

/// P(X >= k) for X ~ Binomial(n, p)
pub fn binomial_sf(k: u64, n: u64, p: f64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    if k > n || p <= 0.0 {
        return 0.0;
    }
    if p >= 1.0 {
        return 1.0;
    }

    let (lp, lq) = (p.ln(), (1.0 - p).ln());
    let mode = (n as f64 + 1.0) * p;
    let mut sum = 0.0;
    for i in k..=n {
        let term = (ln_choose(n, i) + i as f64 * lp + (n - i) as f64 * lq).exp();
        sum += term;
        if (i as f64) > mode && term <= sum * TAIL_EPSILON {
            break;
        }
    }
    sum.min(1.0)
}

/// P(X >= k) for X ~ Hypergeometric: `draws` items taken without
/// replacement from `total`, of which `successes` are marked.
pub fn hypergeometric_sf(k: u64, total: u64, successes: u64, draws: u64) -> f64 {
    if k == 0 {
        return 1.0;
    }
    if successes > total || draws > total {
        return 0.0;
    }
    let upper = successes.min(draws);
    if k > upper {
        return 0.0;
    }

    let denom = ln_choose(total, draws);
    let mut sum = 0.0;
    for i in k..=upper {
        if draws - i > total - successes {
            continue;
        }
        sum += (ln_choose(successes, i) + ln_choose(total - successes, draws - i) - denom).exp();
    }
    sum.min(1.0)
}
