//!
//! Zero-truncated binomial count density
//!
use super::{is_count_sample, seed_success_probs, CountDensity, FitSample};
use crate::dataset::{Dataset, Position};
use crate::distribution::zt_binomial_pmf;
use crate::error::{HmmError, Result};
use crate::hmm::params::HmmParams;
use serde::{Deserialize, Serialize};

/// success probabilities are kept in `[P_MIN, 1 - P_MIN]`
pub(crate) const P_MIN: f64 = 1e-10;
const FIXED_POINT_MAX_ITER: usize = 200;
const FIXED_POINT_TOL: f64 = 1e-12;

///
/// Zero-truncated binomial with success probability `p`.
/// The number of trials is given by the position.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZtBinomial {
    pub p: f64,
}

impl ZtBinomial {
    pub fn new(p: f64) -> Self {
        ZtBinomial { p }
    }
    ///
    /// Weighted MLE by the fixed point iteration of
    ///
    /// ```text
    /// p = sum w c / sum w n / (1 - (1-p)^n)
    /// ```
    ///
    /// starting from the current `p`.
    ///
    fn fit_weighted(&self, samples: &[(f64, f64, f64)]) -> Option<ZtBinomial> {
        let wc: f64 = samples.iter().map(|&(c, _, w)| w * c).sum();
        if !(wc > 0.0) {
            return None;
        }
        let mut p = self.p.clamp(P_MIN, 1.0 - P_MIN);
        for _ in 0..FIXED_POINT_MAX_ITER {
            let denom: f64 = samples
                .iter()
                .map(|&(_, n, w)| w * n / (1.0 - (1.0 - p).powf(n)))
                .sum();
            let next = (wc / denom).clamp(P_MIN, 1.0 - P_MIN);
            let delta = (next - p).abs();
            p = next;
            if delta < FIXED_POINT_TOL {
                break;
            }
        }
        Some(ZtBinomial::new(p))
    }
}

impl std::fmt::Display for ZtBinomial {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "p={:.6e}", self.p)
    }
}

impl CountDensity for ZtBinomial {
    const FAMILY: &'static str = "crosslink";

    fn density(&self, pos: &Position) -> f64 {
        zt_binomial_pmf(pos.trunc_count as f64, pos.n_trials, self.p)
    }
    fn seed_pair(data: &Dataset, _params: &HmmParams) -> Result<[Self; 2]> {
        let (bg, fg) = seed_success_probs(data);
        Ok([ZtBinomial::new(bg), ZtBinomial::new(fg)])
    }
    fn fit_pair(pair: &mut [Self; 2], samples: &[FitSample], _params: &HmmParams) -> Result<()> {
        for j in 0..2 {
            let xs: Vec<(f64, f64, f64)> = samples
                .iter()
                .filter(|s| is_count_sample(s.pos) && s.weights[j] > 0.0)
                .map(|s| (s.pos.trunc_count as f64, s.pos.n_trials, s.weights[j]))
                .collect();
            pair[j] = pair[j]
                .fit_weighted(&xs)
                .ok_or_else(|| HmmError::fit(Self::FAMILY, "no weighted truncation to fit"))?;
        }
        if !(pair[1].p > pair[0].p) {
            log::warn!("crosslink success probability dropped below non-crosslink, swapping");
            pair.swap(0, 1);
        }
        Ok(())
    }
    fn is_converged(&self, prev: &Self, tol: f64) -> bool {
        (self.p - prev.p).abs() < tol
    }
}
