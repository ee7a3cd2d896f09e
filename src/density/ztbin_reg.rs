//!
//! Zero-truncated binomial count density with a logistic success
//! probability on the motif score
//!
//! ```text
//! p = logistic(b0 + coeffs[id] * score)
//! ```
//!
//! Positions without a motif hit use `logistic(b0)`.
//!
use super::ztbin::P_MIN;
use super::{is_count_sample, seed_success_probs, CountDensity, FitSample};
use crate::dataset::{Dataset, Position};
use crate::distribution::{ln_zt_binomial, logistic, zt_binomial_mean, zt_binomial_pmf};
use crate::error::{HmmError, Result};
use crate::hmm::params::HmmParams;
use serde::{Deserialize, Serialize};

const GRAD_MAX_ITER: usize = 500;
const GRAD_MAX_HALVING: usize = 40;
const GRAD_TOL: f64 = 1e-10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZtBinomialReg {
    pub b0: f64,
    /// coefficient of the motif score for each motif id
    pub coeffs: Vec<f64>,
}

///
/// `(c, n, motif, w)` of a weighted count
///
type Sample = (f64, f64, Option<(usize, f64)>, f64);

impl ZtBinomialReg {
    pub fn new(b0: f64, coeffs: Vec<f64>) -> Self {
        ZtBinomialReg { b0, coeffs }
    }
    fn eta(&self, motif: Option<(usize, f64)>) -> f64 {
        match motif {
            Some((id, score)) => self.b0 + self.coeffs.get(id).copied().unwrap_or(0.0) * score,
            None => self.b0,
        }
    }
    pub fn success_prob(&self, pos: &Position) -> f64 {
        let motif = pos.motif.map(|m| (m.id, m.score));
        logistic(self.eta(motif)).clamp(P_MIN, 1.0 - P_MIN)
    }
    fn log_likelihood(&self, samples: &[Sample]) -> f64 {
        samples
            .iter()
            .map(|&(c, n, motif, w)| {
                let p = logistic(self.eta(motif)).clamp(P_MIN, 1.0 - P_MIN);
                ln_zt_binomial(c, n, p).map_or(f64::NEG_INFINITY, |l| w * l)
            })
            .sum()
    }
    ///
    /// gradient of the weighted log likelihood over `[b0, coeffs...]`.
    /// `d ln P / d eta = c - E[c]`
    ///
    fn gradient(&self, samples: &[Sample]) -> Vec<f64> {
        let mut g = vec![0.0; 1 + self.coeffs.len()];
        for &(c, n, motif, w) in samples {
            let p = logistic(self.eta(motif)).clamp(P_MIN, 1.0 - P_MIN);
            let r = w * (c - zt_binomial_mean(n, p));
            g[0] += r;
            if let Some((id, score)) = motif {
                if id < self.coeffs.len() {
                    g[1 + id] += r * score;
                }
            }
        }
        g
    }
    fn step(&self, g: &[f64], lr: f64) -> ZtBinomialReg {
        ZtBinomialReg {
            b0: self.b0 + lr * g[0],
            coeffs: self
                .coeffs
                .iter()
                .zip(g[1..].iter())
                .map(|(b, d)| b + lr * d)
                .collect(),
        }
    }
    ///
    /// Gradient ascent with backtracking line search, starting from the
    /// current coefficients.
    ///
    fn fit_weighted(&self, samples: &[Sample]) -> Option<ZtBinomialReg> {
        let w: f64 = samples.iter().map(|s| s.3).sum();
        if !(w > 0.0) {
            return None;
        }
        let mut cur = self.clone();
        let mut ll = cur.log_likelihood(samples);
        for _ in 0..GRAD_MAX_ITER {
            let g: Vec<f64> = cur.gradient(samples).into_iter().map(|x| x / w).collect();
            let norm: f64 = g.iter().map(|x| x * x).sum::<f64>().sqrt();
            if norm < GRAD_TOL {
                break;
            }
            let mut lr = 1.0;
            let mut improved = None;
            for _ in 0..GRAD_MAX_HALVING {
                let next = cur.step(&g, lr);
                let next_ll = next.log_likelihood(samples);
                if next_ll > ll {
                    improved = Some((next, next_ll));
                    break;
                }
                lr *= 0.5;
            }
            match improved {
                Some((next, next_ll)) => {
                    let gain = next_ll - ll;
                    cur = next;
                    ll = next_ll;
                    if gain < GRAD_TOL * w {
                        break;
                    }
                }
                None => break,
            }
        }
        Some(cur)
    }
}

impl std::fmt::Display for ZtBinomialReg {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "b0={:.6}", self.b0)?;
        for (id, b) in self.coeffs.iter().enumerate() {
            write!(f, " b[{}]={:.6}", id, b)?;
        }
        Ok(())
    }
}

impl CountDensity for ZtBinomialReg {
    const FAMILY: &'static str = "crosslink regression";

    fn density(&self, pos: &Position) -> f64 {
        zt_binomial_pmf(pos.trunc_count as f64, pos.n_trials, self.success_prob(pos))
    }
    fn seed_pair(data: &Dataset, _params: &HmmParams) -> Result<[Self; 2]> {
        let (bg, fg) = seed_success_probs(data);
        let n_motifs = data
            .positions()
            .filter_map(|p| p.motif.map(|m| m.id + 1))
            .max()
            .unwrap_or(0);
        let logit = |p: f64| (p / (1.0 - p)).ln();
        Ok([
            ZtBinomialReg::new(logit(bg), vec![0.0; n_motifs]),
            ZtBinomialReg::new(logit(fg), vec![0.0; n_motifs]),
        ])
    }
    fn fit_pair(pair: &mut [Self; 2], samples: &[FitSample], _params: &HmmParams) -> Result<()> {
        for j in 0..2 {
            let xs: Vec<Sample> = samples
                .iter()
                .filter(|s| is_count_sample(s.pos) && s.weights[j] > 0.0)
                .map(|s| {
                    (
                        s.pos.trunc_count as f64,
                        s.pos.n_trials,
                        s.pos.motif.map(|m| (m.id, m.score)),
                        s.weights[j],
                    )
                })
                .collect();
            pair[j] = pair[j]
                .fit_weighted(&xs)
                .ok_or_else(|| HmmError::fit(Self::FAMILY, "no weighted truncation to fit"))?;
        }
        if !(pair[1].b0 > pair[0].b0) {
            log::warn!("crosslink intercept dropped below non-crosslink, swapping");
            pair.swap(0, 1);
        }
        Ok(())
    }
    fn is_converged(&self, prev: &Self, tol: f64) -> bool {
        (self.b0 - prev.b0).abs() < tol
            && self.coeffs.len() == prev.coeffs.len()
            && self
                .coeffs
                .iter()
                .zip(prev.coeffs.iter())
                .all(|(a, b)| (a - b).abs() < tol)
    }
}
