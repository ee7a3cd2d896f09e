//!
//! Baum-Welch training and application of the trained parameters
//!
//! ## E-step
//!
//! Emissions from the current densities, then state posteriors and expected
//! transition counts by forward/backward.
//!
//! ## M-step
//!
//! Re-estimate the transition matrix, and fit the density pair of the
//! factor being learned with the posteriors as weights.
//!
use crate::dataset::Dataset;
use crate::density::{CountDensity, CoverageDensity, Densities, FitSample};
use crate::error::Result;
use crate::hmm::{Hmm, Mode};
use crate::utils::progress_bar;
use log::info;

///
/// Density pair updated by a Baum-Welch run
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnTarget {
    /// `[non-enriched, enriched]` coverage densities
    Coverage,
    /// `[non-crosslink, crosslink]` count densities
    Crosslink,
}

///
/// Summary of a Baum-Welch run
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EmSummary {
    pub n_iter: usize,
    pub converged: bool,
    pub n_reseeds: usize,
}

impl std::fmt::Display for EmSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "n_iter={} converged={} n_reseeds={}",
            self.n_iter, self.converged, self.n_reseeds
        )
    }
}

impl Hmm {
    ///
    /// Posterior weights of every position of the non-discarded intervals
    ///
    /// * `Coverage`: `[p0 + p1, p2 + p3]`
    /// * `Crosslink`: `[p2, p3]`
    ///
    pub fn fit_samples<'a>(&self, data: &'a Dataset, target: LearnTarget) -> Vec<FitSample<'a>> {
        let mut samples = Vec::with_capacity(data.n_positions());
        for (s, strand) in data.strands.iter().enumerate() {
            for (i, interval) in strand.intervals.iter().enumerate() {
                if interval.is_discarded() {
                    continue;
                }
                for (pos, post) in interval.positions().iter().zip(self.posteriors[s][i].iter()) {
                    let weights = match target {
                        LearnTarget::Coverage => [post[0] + post[1], post[2] + post[3]],
                        LearnTarget::Crosslink => [post[2], post[3]],
                    };
                    samples.push(FitSample { pos, weights });
                }
            }
        }
        samples
    }
    ///
    /// Baum-Welch on the transition matrix and the density pair of `target`.
    ///
    /// Runs up to `params.max_iter` iterations and stops when every
    /// parameter of the pair changes less than `params.conv_tol`.
    ///
    pub fn baum_welch<C: CoverageDensity, B: CountDensity>(
        &mut self,
        data: &Dataset,
        densities: &mut Densities<C, B>,
        target: LearnTarget,
        show_progress: bool,
    ) -> Result<EmSummary> {
        let max_iter = self.params.max_iter;
        let tol = self.params.conv_tol;
        let pb = progress_bar(max_iter, show_progress);
        pb.set_message(format!("{:?}", target));
        let mut summary = EmSummary::default();

        for iteration in 0..max_iter {
            // E-step
            self.compute_emissions(data, densities, Mode::Training)?;
            let freqs = self.forward_backward(data, Mode::Training)?;

            // M-step on copies, committed only when every update succeeds
            let trans = self.trans.reestimate(&freqs, &self.params);
            let samples = self.fit_samples(data, target);
            let converged = match target {
                LearnTarget::Coverage => {
                    let mut pair = densities.coverage.clone();
                    let mut n_reseeds = summary.n_reseeds;
                    C::fit_pair(&mut pair, &samples, &self.params, &mut n_reseeds)?;
                    let converged = densities.coverage_converged(&pair, tol);
                    densities.coverage = pair;
                    summary.n_reseeds = n_reseeds;
                    converged
                }
                LearnTarget::Crosslink => {
                    let mut pair = densities.count.clone();
                    B::fit_pair(&mut pair, &samples, &self.params)?;
                    let converged = densities.count_converged(&pair, tol);
                    densities.count = pair;
                    converged
                }
            };
            self.trans = trans;

            info!("iteration {} ({:?})", iteration + 1, target);
            info!("transition matrix:\n{}", self.trans);
            info!("densities:\n{}", densities);
            summary.n_iter = iteration + 1;
            pb.inc(1);
            if converged {
                summary.converged = true;
                break;
            }
        }
        pb.finish_and_clear();
        info!("{:?} training finished: {}", target, summary);
        Ok(summary)
    }
    ///
    /// Emissions in decoding mode and forward/backward with the current
    /// parameters. Intervals with invalid emissions are discarded.
    ///
    /// Returns the number of newly found invalid intervals.
    ///
    pub fn apply_parameters<C: CoverageDensity, B: CountDensity>(
        &mut self,
        data: &mut Dataset,
        densities: &Densities<C, B>,
    ) -> Result<usize> {
        let invalid = self.compute_emissions(data, densities, Mode::Decoding)?;
        self.discard_intervals(data, &invalid);
        self.forward_backward(data, Mode::Decoding)?;
        Ok(invalid.len())
    }
}
