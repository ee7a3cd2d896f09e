//!
//! Emission density models
//!
//! Each position emits a coverage value and a truncation count.
//! The coverage is governed by the enrichment factor and the count by the
//! crosslink factor, so the engine needs one pair of densities per factor:
//!
//! * `CoverageDensity`: `[non-enriched, enriched]`
//!     * `Gamma`: gamma distribution
//!     * `GammaReg`: gamma distribution whose mean is log-linear in a covariate
//! * `CountDensity`: `[non-crosslink, crosslink]`
//!     * `ZtBinomial`: zero-truncated binomial
//!     * `ZtBinomialReg`: zero-truncated binomial whose success probability is
//!       logistic in the motif score
//!
pub mod gamma;
pub mod gamma_reg;
pub mod ztbin;
pub mod ztbin_reg;

pub use gamma::Gamma;
pub use gamma_reg::GammaReg;
pub use ztbin::ZtBinomial;
pub use ztbin_reg::ZtBinomialReg;

use crate::dataset::{Dataset, Position};
use crate::error::Result;
use crate::hmm::params::HmmParams;

///
/// A position with the posterior weights of the two components of a pair.
///
#[derive(Debug, Clone, Copy)]
pub struct FitSample<'a> {
    pub pos: &'a Position,
    /// `[weight of pair[0], weight of pair[1]]`
    pub weights: [f64; 2],
}

///
/// Density of the coverage value at a position.
///
/// A pair `[bg, fg]` is ordered: the mean of `fg` (enriched) must exceed the
/// mean of `bg` (non-enriched).
///
pub trait CoverageDensity: Clone + std::fmt::Debug + std::fmt::Display + Send + Sync {
    /// name used in logs and errors
    const FAMILY: &'static str;
    ///
    /// density value at the position (can be `> 1`)
    fn density(&self, pos: &Position) -> f64;
    ///
    /// the density is evaluated only if `coverage >= threshold`
    fn threshold(&self) -> f64;
    ///
    /// expected coverage at the position, if it depends on the position.
    /// Uses the covariate as observed, without the fitting floor.
    fn predicted_mean(&self, _pos: &Position) -> Option<f64> {
        None
    }
    ///
    /// initial `[bg, fg]` from the observations
    fn seed_pair(data: &Dataset, params: &HmmParams) -> Result<[Self; 2]>;
    ///
    /// Weighted MLE update of the pair.
    ///
    /// Ordering violations reseed `fg` and increment `n_reseeds`. It fails
    /// with `ReseedLimit` when `n_reseeds` exceeds `params.max_reseeds`.
    fn fit_pair(
        pair: &mut [Self; 2],
        samples: &[FitSample],
        params: &HmmParams,
        n_reseeds: &mut usize,
    ) -> Result<()>;
    ///
    /// all parameters changed less than `tol` from `prev`
    fn is_converged(&self, prev: &Self, tol: f64) -> bool;
}

///
/// Density of the truncation count at a position given its trials.
///
/// A pair `[bg, fg]` is ordered: the success probability of `fg`
/// (crosslink) must exceed that of `bg`. Violations swap the two.
///
pub trait CountDensity: Clone + std::fmt::Debug + std::fmt::Display + Send + Sync {
    const FAMILY: &'static str;
    fn density(&self, pos: &Position) -> f64;
    fn seed_pair(data: &Dataset, params: &HmmParams) -> Result<[Self; 2]>;
    fn fit_pair(pair: &mut [Self; 2], samples: &[FitSample], params: &HmmParams) -> Result<()>;
    fn is_converged(&self, prev: &Self, tol: f64) -> bool;
}

///
/// The two density pairs used by the emission model.
///
#[derive(Debug, Clone)]
pub struct Densities<C: CoverageDensity, B: CountDensity> {
    /// `[non-enriched, enriched]`
    pub coverage: [C; 2],
    /// `[non-crosslink, crosslink]`
    pub count: [B; 2],
}

impl<C: CoverageDensity, B: CountDensity> Densities<C, B> {
    pub fn new(coverage: [C; 2], count: [B; 2]) -> Self {
        Densities { coverage, count }
    }
    ///
    /// seed both pairs from the observations
    ///
    pub fn from_data(data: &Dataset, params: &HmmParams) -> Result<Self> {
        Ok(Densities {
            coverage: C::seed_pair(data, params)?,
            count: B::seed_pair(data, params)?,
        })
    }
    pub fn coverage_converged(&self, prev: &[C; 2], tol: f64) -> bool {
        self.coverage
            .iter()
            .zip(prev.iter())
            .all(|(a, b)| a.is_converged(b, tol))
    }
    pub fn count_converged(&self, prev: &[B; 2], tol: f64) -> bool {
        self.count
            .iter()
            .zip(prev.iter())
            .all(|(a, b)| a.is_converged(b, tol))
    }
}

impl<C: CoverageDensity, B: CountDensity> std::fmt::Display for Densities<C, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "{} (non-enriched): {}", C::FAMILY, self.coverage[0])?;
        writeln!(f, "{} (enriched): {}", C::FAMILY, self.coverage[1])?;
        writeln!(f, "{} (non-crosslink): {}", B::FAMILY, self.count[0])?;
        write!(f, "{} (crosslink): {}", B::FAMILY, self.count[1])
    }
}

//
// helpers shared by the implementations
//

///
/// `q`-quantile (nearest rank) of the values. `None` if empty.
///
pub(crate) fn quantile(mut xs: Vec<f64>, q: f64) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    xs.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let i = ((xs.len() - 1) as f64 * q).round() as usize;
    Some(xs[i.min(xs.len() - 1)])
}

///
/// seed means `(bg, fg)` of coverage: median and 90% quantile of the
/// coverages above the threshold.
///
pub(crate) fn seed_coverage_means(data: &Dataset, threshold: f64) -> Option<(f64, f64)> {
    let xs: Vec<f64> = data
        .positions()
        .map(|p| p.coverage)
        .filter(|&x| x >= threshold && x > 0.0)
        .collect();
    let bg = quantile(xs.clone(), 0.5)?;
    let mut fg = quantile(xs, 0.9)?;
    if !(fg > bg) {
        fg = 2.0 * bg;
    }
    Some((bg, fg))
}

///
/// positions whose truncation count can be explained by a zero-truncated
/// binomial (`1 <= c <= n`)
///
pub(crate) fn is_count_sample(pos: &Position) -> bool {
    pos.trunc_count >= 1 && pos.n_trials >= pos.trunc_count as f64
}

///
/// seed success probabilities `(bg, fg)` from the pooled ratio of counts
/// and trials
///
pub(crate) fn seed_success_probs(data: &Dataset) -> (f64, f64) {
    let (c, n) = data
        .positions()
        .filter(|p| is_count_sample(p))
        .fold((0.0, 0.0), |(c, n), p| (c + p.trunc_count as f64, n + p.n_trials));
    let r = if n > 0.0 { (c / n).clamp(1e-6, 0.5) } else { 0.05 };
    (r * 0.5, (r * 2.0).min(0.99))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantiles() {
        assert_eq!(quantile(vec![], 0.5), None);
        assert_eq!(quantile(vec![3.0, 1.0, 2.0], 0.5), Some(2.0));
        assert_eq!(quantile(vec![5.0, 1.0, 2.0, 3.0, 4.0], 0.9), Some(5.0));
        assert_eq!(quantile(vec![5.0, 1.0, 2.0, 3.0, 4.0], 0.0), Some(1.0));
    }
    #[test]
    fn count_samples() {
        assert!(is_count_sample(&Position::new(1.0, 2, 3.0)));
        assert!(!is_count_sample(&Position::new(1.0, 0, 3.0)));
        assert!(!is_count_sample(&Position::new(1.0, 4, 3.0)));
    }
}
