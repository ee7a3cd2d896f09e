//!
//! Gamma coverage density
//!
use super::{seed_coverage_means, CoverageDensity, FitSample};
use crate::dataset::{Dataset, Position};
use crate::distribution::{gamma_pdf, solve_gamma_shape};
use crate::error::{HmmError, Result};
use crate::hmm::params::HmmParams;
use serde::{Deserialize, Serialize};

///
/// Gamma distribution with shape `k` and scale `theta`.
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gamma {
    pub k: f64,
    pub theta: f64,
    pub threshold: f64,
}

impl Gamma {
    pub fn new(k: f64, theta: f64, threshold: f64) -> Self {
        Gamma { k, theta, threshold }
    }
    pub fn mean(&self) -> f64 {
        self.k * self.theta
    }
    ///
    /// Weighted MLE of `(k, theta)` with `k` kept within `[k_min, k_max]`.
    ///
    /// `None` if no positive weight is on positions above the threshold.
    ///
    fn fit_weighted<I>(&self, xs: I, k_min: f64, k_max: f64) -> Option<Gamma>
    where
        I: Iterator<Item = (f64, f64)>,
    {
        let (w, wx, wlnx) = xs
            .filter(|&(x, w)| x >= self.threshold && x > 0.0 && w > 0.0)
            .fold((0.0, 0.0, 0.0), |(sw, sx, sl), (x, w)| {
                (sw + w, sx + w * x, sl + w * x.ln())
            });
        if !(w > 0.0) {
            return None;
        }
        let mean = wx / w;
        let s = mean.ln() - wlnx / w;
        let k = solve_gamma_shape(s, k_min, k_max);
        Some(Gamma::new(k, mean / k, self.threshold))
    }
}

impl std::fmt::Display for Gamma {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "k={:.6} theta={:.6} mean={:.6}",
            self.k,
            self.theta,
            self.mean()
        )
    }
}

impl CoverageDensity for Gamma {
    const FAMILY: &'static str = "coverage";

    fn density(&self, pos: &Position) -> f64 {
        gamma_pdf(pos.coverage, self.k, self.theta)
    }
    fn threshold(&self) -> f64 {
        self.threshold
    }
    fn seed_pair(data: &Dataset, params: &HmmParams) -> Result<[Self; 2]> {
        let (bg_mean, fg_mean) = seed_coverage_means(data, params.coverage_threshold)
            .ok_or_else(|| HmmError::fit(Self::FAMILY, "no position above coverage threshold"))?;
        let bg_k = 1.0f64.clamp(params.bg_shape_min, params.bg_shape_max);
        let fg_k = 1.0f64.clamp(params.fg_shape_min, params.fg_shape_max);
        Ok([
            Gamma::new(bg_k, bg_mean / bg_k, params.coverage_threshold),
            Gamma::new(fg_k, fg_mean / fg_k, params.coverage_threshold),
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
        for j in 0..2 {
            let xs = samples.iter().map(|s| (s.pos.coverage, s.weights[j]));
            pair[j] = pair[j]
                .fit_weighted(xs, bounds[j].0, bounds[j].1)
                .ok_or_else(|| HmmError::fit(Self::FAMILY, "no weighted position to fit"))?;
        }
        if params.bg_shape_le_fg_shape && pair[0].k > pair[1].k {
            let mean = pair[1].mean();
            pair[1].k = pair[0].k;
            pair[1].theta = mean / pair[1].k;
        }
        if !(pair[1].mean() > pair[0].mean()) {
            *n_reseeds += 1;
            if *n_reseeds > params.max_reseeds {
                return Err(HmmError::ReseedLimit {
                    family: Self::FAMILY,
                    max_reseeds: params.max_reseeds,
                });
            }
            let mean = 2.0 * pair[0].mean();
            pair[1].theta = mean / pair[1].k;
            log::warn!(
                "enriched coverage mean dropped below non-enriched mean, reseeding ({}/{})",
                n_reseeds,
                params.max_reseeds
            );
        }
        Ok(())
    }
    fn is_converged(&self, prev: &Self, tol: f64) -> bool {
        (self.k - prev.k).abs() < tol && (self.theta - prev.theta).abs() < tol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Interval, StrandData};
    use rand::prelude::*;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn fit_recovers_shape_and_scale() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        let truth = Gamma::new(2.5, 3.0, 0.0);
        let xs: Vec<Position> = (0..20000)
            .map(|_| Position::new(crate::hmm::mocks::sample_gamma(&mut rng, 2.5, 3.0), 0, 0.0))
            .collect();
        let fitted = truth
            .fit_weighted(xs.iter().map(|p| (p.coverage, 1.0)), 0.1, 10.0)
            .unwrap();
        assert_abs_diff_eq!(fitted.k, 2.5, epsilon = 0.1);
        assert_abs_diff_eq!(fitted.mean(), 7.5, epsilon = 0.2);
    }
    #[test]
    fn ordering_violation_reseeds() {
        let pos: Vec<Position> = [1.0, 2.0, 3.0, 4.0]
            .iter()
            .map(|&c| Position::new(c, 0, 0.0))
            .collect();
        // both components see the same data
        let samples: Vec<FitSample> = pos
            .iter()
            .map(|p| FitSample {
                pos: p,
                weights: [1.0, 1.0],
            })
            .collect();
        let mut params = HmmParams::default();
        params.fg_shape_min = params.bg_shape_min;
        params.fg_shape_max = params.bg_shape_max;
        params.max_reseeds = 1;
        let mut pair = [Gamma::new(1.0, 1.0, 0.0), Gamma::new(1.0, 2.0, 0.0)];
        let mut n = 0;
        Gamma::fit_pair(&mut pair, &samples, &params, &mut n).unwrap();
        assert_eq!(n, 1);
        assert!(pair[1].mean() > pair[0].mean());
        assert_abs_diff_eq!(pair[1].mean(), 2.0 * pair[0].mean(), epsilon = 1e-12);
        let r = Gamma::fit_pair(&mut pair, &samples, &params, &mut n);
        assert!(matches!(r, Err(HmmError::ReseedLimit { .. })));
    }
    #[test]
    fn seed_is_ordered() {
        let positions = (1..=100)
            .map(|i| Position::new(i as f64, 0, 0.0))
            .collect();
        let fwd = StrandData::new(vec![Interval::new(positions)], vec![0]).unwrap();
        let d = Dataset::new("c", 200, fwd, StrandData::default()).unwrap();
        let pair = Gamma::seed_pair(&d, &HmmParams::default()).unwrap();
        assert!(pair[1].mean() > pair[0].mean());
        assert!(pair[0].density(&Position::new(10.0, 0, 0.0)) > 0.0);
    }
}
