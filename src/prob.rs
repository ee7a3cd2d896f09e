///
/// probability calculation in log space
/// implements logaddexp with a precomputed lookup table
///
use crate::error::HmmError;
use approx::AbsDiffEq;
use once_cell::sync::Lazy;
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::str::FromStr;

///
/// Log probability with an explicit zero-probability sentinel.
///
/// * `LogProb::Zero` is the probability `p = 0`. It is absorbed by `+`
///   (log-sum-exp) and absorbs `*` and `/`.
/// * `LogProb::Ln(x)` is a probability with `log p = x`.
///
/// Infinite `Ln` values are not sentinels. They are kept as they are so
/// that the numeric checks in forward/backward can report them.
///
#[derive(Clone, Copy, Debug, SerializeDisplay, DeserializeFromStr)]
pub enum LogProb {
    Zero,
    Ln(f64),
}

///
/// short-hand of `LogProb::from_prob`
///
pub fn p(p: f64) -> LogProb {
    LogProb::from_prob(p)
}

///
/// short-hand of `LogProb::from_log_prob`
///
pub fn lp(lp: f64) -> LogProb {
    LogProb::from_log_prob(lp)
}

///
/// natural logarithm that returns the zero sentinel for `x == 0`
/// instead of `-inf`.
///
pub fn safe_log(x: f64) -> LogProb {
    if x == 0.0 {
        LogProb::Zero
    } else {
        LogProb::Ln(x.ln())
    }
}

///
/// exponential that maps the zero sentinel to `0.0`.
///
pub fn safe_exp(x: LogProb) -> f64 {
    match x {
        LogProb::Zero => 0.0,
        LogProb::Ln(v) => v.exp(),
    }
}

impl LogProb {
    pub fn from_prob(value: f64) -> LogProb {
        safe_log(value)
    }
    ///
    /// NaN is read as the zero sentinel.
    pub fn from_log_prob(log_value: f64) -> LogProb {
        if log_value.is_nan() {
            LogProb::Zero
        } else {
            LogProb::Ln(log_value)
        }
    }
    ///
    /// Get the probability (in `[0, 1]`)
    pub fn to_value(self) -> f64 {
        safe_exp(self)
    }
    ///
    /// Get the log probability. `Zero` is `-inf`.
    pub fn to_log_value(self) -> f64 {
        match self {
            LogProb::Zero => f64::NEG_INFINITY,
            LogProb::Ln(v) => v,
        }
    }
    pub fn is_zero(self) -> bool {
        matches!(self, LogProb::Zero)
    }
    pub fn is_infinite(self) -> bool {
        match self {
            LogProb::Zero => false,
            LogProb::Ln(v) => v.is_infinite(),
        }
    }
    pub fn is_finite(self) -> bool {
        match self {
            LogProb::Zero => false,
            LogProb::Ln(v) => v.is_finite(),
        }
    }
    pub fn zero() -> LogProb {
        LogProb::Zero
    }
    pub fn one() -> LogProb {
        LogProb::Ln(0.0)
    }
}

/// p=0 as a default value
impl Default for LogProb {
    fn default() -> Self {
        LogProb::Zero
    }
}

impl num_traits::One for LogProb {
    fn one() -> Self {
        LogProb::one()
    }
}

impl num_traits::Zero for LogProb {
    fn zero() -> Self {
        LogProb::zero()
    }
    fn is_zero(&self) -> bool {
        LogProb::is_zero(*self)
    }
}

// display
impl std::fmt::Display for LogProb {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LogProb::Zero => write!(f, "NA"),
            LogProb::Ln(v) => write!(f, "{}", v),
        }
    }
}
impl FromStr for LogProb {
    type Err = std::num::ParseFloatError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "NA" {
            Ok(LogProb::Zero)
        } else {
            s.parse::<f64>().map(LogProb::from_log_prob)
        }
    }
}

impl PartialEq for LogProb {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LogProb::Zero, LogProb::Zero) => true,
            (LogProb::Ln(a), LogProb::Ln(b)) => a == b,
            _ => false,
        }
    }
}

/// `Zero` is smaller than any `Ln` value.
impl PartialOrd for LogProb {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        use std::cmp::Ordering;
        match (self, other) {
            (LogProb::Zero, LogProb::Zero) => Some(Ordering::Equal),
            (LogProb::Zero, LogProb::Ln(_)) => Some(Ordering::Less),
            (LogProb::Ln(_), LogProb::Zero) => Some(Ordering::Greater),
            (LogProb::Ln(a), LogProb::Ln(b)) => a.partial_cmp(b),
        }
    }
}

//
// lookup table of log(1 + exp(-d))
//

/// `|a - b|` beyond this is computed directly
pub const LSE_MAX_DIFF: f64 = 50.0;
/// grid points per unit of `|a - b|`
pub const LSE_POINTS_PER_UNIT: usize = 1000;

///
/// Precomputed `log(1 + exp(-d))` for `d` in `[0, max_diff)`,
/// sampled every `1 / points_per_unit` and linearly interpolated.
///
#[derive(Debug, Clone)]
pub struct LogSumExpTable {
    max_diff: f64,
    points_per_unit: f64,
    values: Vec<f64>,
}

impl LogSumExpTable {
    ///
    /// Table over `[0, max_diff)`. `max_diff` must be positive and finite,
    /// `points_per_unit` at least 1.
    ///
    pub fn new(max_diff: f64, points_per_unit: usize) -> crate::error::Result<Self> {
        if !(max_diff > 0.0 && max_diff.is_finite()) || points_per_unit == 0 {
            return Err(HmmError::invalid_data(format!(
                "log-sum-exp table needs max_diff > 0 and points_per_unit > 0 (got {} and {})",
                max_diff, points_per_unit
            )));
        }
        Ok(LogSumExpTable::build(max_diff, points_per_unit))
    }
    fn build(max_diff: f64, points_per_unit: usize) -> Self {
        let n = (max_diff * points_per_unit as f64).ceil() as usize + 2;
        let values = (0..n)
            .map(|i| {
                let d = i as f64 / points_per_unit as f64;
                (-d).exp().ln_1p()
            })
            .collect();
        LogSumExpTable {
            max_diff,
            points_per_unit: points_per_unit as f64,
            values,
        }
    }
    ///
    /// `log(1 + exp(-d))` for `d >= 0`
    ///
    #[inline]
    pub fn ln_1p_exp_neg(&self, d: f64) -> f64 {
        if d < self.max_diff {
            let x = d * self.points_per_unit;
            let i = x as usize;
            let frac = x - i as f64;
            let y0 = self.values[i];
            let y1 = self.values[i + 1];
            y0 + frac * (y1 - y0)
        } else {
            (-d).exp().ln_1p()
        }
    }
    ///
    /// log-sum-exp of two log probabilities
    ///
    /// 1. `Zero` returns the other operand
    /// 2. infinite returns that operand
    /// 3. otherwise `max + log(1 + exp(-|a-b|))`
    ///
    #[inline]
    pub fn add(&self, a: LogProb, b: LogProb) -> LogProb {
        match (a, b) {
            (LogProb::Zero, _) => b,
            (_, LogProb::Zero) => a,
            (LogProb::Ln(x), _) if x.is_infinite() => a,
            (_, LogProb::Ln(y)) if y.is_infinite() => b,
            (LogProb::Ln(x), LogProb::Ln(y)) => {
                let (hi, lo) = if x >= y { (x, y) } else { (y, x) };
                LogProb::Ln(hi + self.ln_1p_exp_neg(hi - lo))
            }
        }
    }
    ///
    /// pairwise fold of `add`. Empty input is `Zero`.
    ///
    pub fn sum<I: IntoIterator<Item = LogProb>>(&self, xs: I) -> LogProb {
        xs.into_iter().fold(LogProb::Zero, |acc, x| self.add(acc, x))
    }
}

impl Default for LogSumExpTable {
    fn default() -> Self {
        LogSumExpTable::build(LSE_MAX_DIFF, LSE_POINTS_PER_UNIT)
    }
}

static LSE_TABLE: Lazy<LogSumExpTable> = Lazy::new(LogSumExpTable::default);

///
/// log-sum-exp with the shared default table
///
#[inline]
pub fn log_sum_exp(a: LogProb, b: LogProb) -> LogProb {
    LSE_TABLE.add(a, b)
}

/// Addition of two probabilities `px + py` in log space (log-sum-exp)
impl std::ops::Add for LogProb {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        log_sum_exp(self, other)
    }
}

/// Multiplication of two probabilities `px * py` in log space
impl std::ops::Mul for LogProb {
    type Output = Self;
    fn mul(self, other: Self) -> Self {
        match (self, other) {
            (LogProb::Ln(a), LogProb::Ln(b)) => LogProb::Ln(a + b),
            _ => LogProb::Zero,
        }
    }
}

/// Division of two probabilities `px / py` in log space
impl std::ops::Div for LogProb {
    type Output = Self;
    fn div(self, other: Self) -> Self {
        match (self, other) {
            (LogProb::Ln(a), LogProb::Ln(b)) => LogProb::Ln(a - b),
            _ => LogProb::Zero,
        }
    }
}

// assign
impl std::ops::AddAssign for LogProb {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}
impl std::ops::MulAssign for LogProb {
    fn mul_assign(&mut self, other: Self) {
        *self = *self * other;
    }
}
// sum/prod
impl std::iter::Sum for LogProb {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(LogProb::Zero, |a, b| a + b)
    }
}
impl<'a> std::iter::Sum<&'a Self> for LogProb {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(LogProb::Zero, |a, b| a + *b)
    }
}
impl std::iter::Product for LogProb {
    fn product<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(LogProb::one(), |a, b| a * b)
    }
}
impl<'a> std::iter::Product<&'a Self> for LogProb {
    fn product<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.fold(LogProb::one(), |a, b| a * *b)
    }
}

/// for approx `assert_abs_diff_eq`
impl AbsDiffEq for LogProb {
    type Epsilon = f64;

    fn default_epsilon() -> Self::Epsilon {
        f64::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: Self::Epsilon) -> bool {
        match (self, other) {
            (LogProb::Zero, LogProb::Zero) => true,
            (LogProb::Ln(a), LogProb::Ln(b)) => f64::abs_diff_eq(a, b, epsilon),
            _ => false,
        }
    }
}
