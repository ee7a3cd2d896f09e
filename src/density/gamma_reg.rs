//!
//! Gamma coverage density with a log-linear mean
//!
//! ```text
//! mean(x) = exp(b0 + b1 x),  scale = mean(x) / k
//! ```
//!
//! `x` is the covariate of the position, floored at `min_covariate`.
//! The coefficients are fitted by iteratively reweighted least squares
//! (IRLS) of the log-link gamma GLM and the shape by MLE given the means.
//!
use super::{seed_coverage_means, CoverageDensity, FitSample};
use crate::dataset::{Dataset, Position};
use crate::distribution::{gamma_pdf, solve_gamma_shape};
use crate::error::{HmmError, Result};
use crate::hmm::params::HmmParams;
use serde::{Deserialize, Serialize};

const IRLS_MAX_ITER: usize = 50;
const IRLS_TOL: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GammaReg {
    pub b0: f64,
    pub b1: f64,
    pub k: f64,
    pub threshold: f64,
    pub min_covariate: f64,
}

impl GammaReg {
    pub fn new(b0: f64, b1: f64, k: f64, threshold: f64, min_covariate: f64) -> Self {
        GammaReg {
            b0,
            b1,
            k,
            threshold,
            min_covariate,
        }
    }
    pub fn covariate(&self, pos: &Position) -> f64 {
        pos.covariate.unwrap_or(0.0).max(self.min_covariate)
    }
    pub fn mean_at(&self, x: f64) -> f64 {
        (self.b0 + self.b1 * x).exp()
    }
    pub fn mean(&self, pos: &Position) -> f64 {
        self.mean_at(self.covariate(pos))
    }
    ///
    /// IRLS of `(b0, b1)` on `(x, y, w)` triples starting from the current
    /// coefficients. Gamma with log link has constant working weights, so
    /// each step is a weighted least squares of the working response
    /// `z = eta + (y - mu) / mu` on `[1, x]`.
    ///
    fn fit_coefficients(&self, xyw: &[(f64, f64, f64)]) -> (f64, f64) {
        let deviance = |b0: f64, b1: f64| -> f64 {
            xyw.iter()
                .map(|&(x, y, w)| {
                    let r = y / (b0 + b1 * x).exp();
                    w * (r - r.ln() - 1.0)
                })
                .sum()
        };
        let (mut b0, mut b1) = (self.b0, self.b1);
        let mut dev = deviance(b0, b1);
        for _ in 0..IRLS_MAX_ITER {
            let (mut sw, mut sx, mut sxx, mut sz, mut sxz) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for &(x, y, w) in xyw {
                let eta = b0 + b1 * x;
                let mu = eta.exp();
                let z = eta + (y - mu) / mu;
                sw += w;
                sx += w * x;
                sxx += w * x * x;
                sz += w * z;
                sxz += w * x * z;
            }
            let det = sw * sxx - sx * sx;
            let (mut n0, mut n1) = if det.abs() > 1e-12 * sw * sw.max(sxx) {
                ((sxx * sz - sx * sxz) / det, (sw * sxz - sx * sz) / det)
            } else {
                // covariate is constant: intercept only
                (sz / sw - b1 * sx / sw, b1)
            };
            // step halving while the deviance increases
            let mut new_dev = deviance(n0, n1);
            let mut n_halving = 0;
            while !(new_dev <= dev) && n_halving < 30 {
                n0 = 0.5 * (b0 + n0);
                n1 = 0.5 * (b1 + n1);
                new_dev = deviance(n0, n1);
                n_halving += 1;
            }
            if !(new_dev <= dev) {
                break;
            }
            let delta = (n0 - b0).abs() + (n1 - b1).abs();
            b0 = n0;
            b1 = n1;
            dev = new_dev;
            if delta < IRLS_TOL {
                break;
            }
        }
        (b0, b1)
    }
    ///
    /// weighted MLE, `None` if there is no weighted position to fit
    ///
    fn fit_weighted(&self, xyw: &[(f64, f64, f64)], k_min: f64, k_max: f64) -> Option<GammaReg> {
        let w: f64 = xyw.iter().map(|t| t.2).sum();
        if !(w > 0.0) {
            return None;
        }
        let (b0, b1) = self.fit_coefficients(xyw);
        let mut fitted = GammaReg { b0, b1, ..*self };
        let s: f64 = xyw
            .iter()
            .map(|&(x, y, w)| {
                let r = y / fitted.mean_at(x);
                w * (r - r.ln() - 1.0)
            })
            .sum::<f64>()
            / w;
        fitted.k = solve_gamma_shape(s, k_min, k_max);
        Some(fitted)
    }
}

impl std::fmt::Display for GammaReg {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "b0={:.6} b1={:.6} k={:.6}", self.b0, self.b1, self.k)
    }
}

impl CoverageDensity for GammaReg {
    const FAMILY: &'static str = "coverage regression";

    fn density(&self, pos: &Position) -> f64 {
        let mean = self.mean(pos);
        gamma_pdf(pos.coverage, self.k, mean / self.k)
    }
    fn threshold(&self) -> f64 {
        self.threshold
    }
    fn predicted_mean(&self, pos: &Position) -> Option<f64> {
        // raw covariate, the floor only applies to the fit and the density
        Some(self.mean_at(pos.covariate.unwrap_or(0.0)))
    }
    fn seed_pair(data: &Dataset, params: &HmmParams) -> Result<[Self; 2]> {
        let (bg_mean, fg_mean) = seed_coverage_means(data, params.coverage_threshold)
            .ok_or_else(|| HmmError::fit(Self::FAMILY, "no position above coverage threshold"))?;
        let bg_k = 1.0f64.clamp(params.bg_shape_min, params.bg_shape_max);
        let fg_k = 1.0f64.clamp(params.fg_shape_min, params.fg_shape_max);
        let t = params.coverage_threshold;
        let m = params.min_covariate_to_fit;
        Ok([
            GammaReg::new(bg_mean.ln(), 0.0, bg_k, t, m),
            GammaReg::new(fg_mean.ln(), 0.0, fg_k, t, m),
        ])
    }
    fn fit_pair(
        pair: &mut [Self; 2],
        samples: &[FitSample],
        params: &HmmParams,
        n_reseeds: &mut usize,
    ) -> Result<()> {
        let bounds = [
            (params.bg_shape_min, params.bg_shape_max),
            (params.fg_shape_min, params.fg_shape_max),
        ];
        let threshold = pair[0].threshold;
        for j in 0..2 {
            let xyw: Vec<(f64, f64, f64)> = samples
                .iter()
                .filter(|s| s.pos.coverage >= threshold && s.pos.coverage > 0.0)
                .filter(|s| s.weights[j] > 0.0)
                .map(|s| (pair[j].covariate(s.pos), s.pos.coverage, s.weights[j]))
                .collect();
            pair[j] = pair[j]
                .fit_weighted(&xyw, bounds[j].0, bounds[j].1)
                .ok_or_else(|| HmmError::fit(Self::FAMILY, "no weighted position to fit"))?;
        }
        if params.bg_shape_le_fg_shape && pair[0].k > pair[1].k {
            pair[1].k = pair[0].k;
        }

        // compare the means at the weighted mean covariate
        let (sw, swx) = samples.iter().fold((0.0, 0.0), |(sw, swx), s| {
            let w = s.weights[0] + s.weights[1];
            (sw + w, swx + w * pair[0].covariate(s.pos))
        });
        let x = if sw > 0.0 { swx / sw } else { pair[0].min_covariate };
        if !(pair[1].mean_at(x) > pair[0].mean_at(x)) {
            *n_reseeds += 1;
            if *n_reseeds > params.max_reseeds {
                return Err(HmmError::ReseedLimit {
                    family: Self::FAMILY,
                    max_reseeds: params.max_reseeds,
                });
            }
            pair[1].b0 = pair[0].b0 + std::f64::consts::LN_2;
            pair[1].b1 = pair[0].b1;
            log::warn!(
                "enriched coverage mean dropped below non-enriched mean, reseeding ({}/{})",
                n_reseeds,
                params.max_reseeds
            );
        }
        Ok(())
    }
    fn is_converged(&self, prev: &Self, tol: f64) -> bool {
        (self.b0 - prev.b0).abs() < tol
            && (self.b1 - prev.b1).abs() < tol
            && (self.k - prev.k).abs() < tol
    }
}
