//!
//! Special functions and probability mass/density functions used by the
//! emission densities.
//!
use libm::lgamma;

///
/// digamma function `psi(x) = d/dx ln Gamma(x)`
///
/// asymptotic expansion after shifting `x` above 12 by the recurrence
/// `psi(x) = psi(x+1) - 1/x`.
///
pub fn digamma(x: f64) -> f64 {
    let c = 12.0;
    let d1 = -0.57721566490153286;
    let d2 = 1.6449340668482264365;
    let s = 1e-6;
    let s3 = 1.0 / 12.0;
    let s4 = 1.0 / 120.0;
    let s5 = 1.0 / 252.0;
    let s6 = 1.0 / 240.0;
    let s7 = 1.0 / 132.0;

    if x == f64::NEG_INFINITY || x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 && x.floor() == x {
        return f64::NEG_INFINITY;
    }
    if x < 0.0 {
        return digamma(1.0 - x) + std::f64::consts::PI / (-std::f64::consts::PI * x).tan();
    }
    if x <= s {
        return d1 - 1.0 / x + d2 * x;
    }

    let mut result = 0.0;
    let mut z = x;
    while z < c {
        result -= 1.0 / z;
        z += 1.0;
    }
    let mut r = 1.0 / z;
    result += z.ln() - 0.5 * r;
    r *= r;
    result -= r * (s3 - (r * (s4 - (r * (s5 - (r * (s6 - (r * s7))))))));
    result
}

///
/// gamma density with shape `k` and scale `theta`
///
/// ```text
/// f(x) = x^(k-1) exp(-x/theta) / (Gamma(k) theta^k)
/// ```
///
pub fn gamma_pdf(x: f64, k: f64, theta: f64) -> f64 {
    if x < 0.0 {
        return 0.0;
    }
    if x == 0.0 {
        return if k < 1.0 {
            f64::INFINITY
        } else if k == 1.0 {
            1.0 / theta
        } else {
            0.0
        };
    }
    ((k - 1.0) * x.ln() - x / theta - lgamma(k) - k * theta.ln()).exp()
}

///
/// `ln C(n, c)` for real `n >= c`
///
pub fn ln_choose(n: f64, c: f64) -> f64 {
    lgamma(n + 1.0) - lgamma(c + 1.0) - lgamma(n - c + 1.0)
}

///
/// log of the zero-truncated binomial mass
///
/// ```text
/// P(c | n, p) = C(n,c) p^c (1-p)^(n-c) / (1 - (1-p)^n),  c >= 1
/// ```
///
/// `None` if the mass is 0 (`c == 0`, `c > n`, `p` on the boundary).
///
pub fn ln_zt_binomial(c: f64, n: f64, p: f64) -> Option<f64> {
    if c < 1.0 || c > n || p <= 0.0 || p >= 1.0 {
        return None;
    }
    let norm = 1.0 - (1.0 - p).powf(n);
    if norm <= 0.0 {
        return None;
    }
    Some(ln_choose(n, c) + c * p.ln() + (n - c) * (-p).ln_1p() - norm.ln())
}

///
/// zero-truncated binomial mass in linear space
///
pub fn zt_binomial_pmf(c: f64, n: f64, p: f64) -> f64 {
    ln_zt_binomial(c, n, p).map_or(0.0, f64::exp)
}

///
/// expected count `E[c] = n p / (1 - (1-p)^n)` of the zero-truncated binomial
///
pub fn zt_binomial_mean(n: f64, p: f64) -> f64 {
    n * p / (1.0 - (1.0 - p).powf(n))
}

pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

///
/// Solve `ln k - digamma(k) = s` for the gamma shape `k` within
/// `[k_min, k_max]` by bisection in log scale.
///
/// `ln k - digamma(k)` is decreasing in `k`, so the solution is clamped to
/// the bounds when `s` is outside of the attainable range.
///
pub fn solve_gamma_shape(s: f64, k_min: f64, k_max: f64) -> f64 {
    let g = |k: f64| k.ln() - digamma(k);
    if !(s > 0.0) || g(k_max) >= s {
        return k_max;
    }
    if g(k_min) <= s {
        return k_min;
    }
    let (mut lo, mut hi) = (k_min.ln(), k_max.ln());
    for _ in 0..100 {
        let mid = 0.5 * (lo + hi);
        if g(mid.exp()) > s {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo < 1e-12 {
            break;
        }
    }
    (0.5 * (lo + hi)).exp()
}
