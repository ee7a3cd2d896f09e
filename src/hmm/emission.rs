//!
//! Emission probabilities
//!
//! The emission of state `k = 2 * e + x` is the product of the coverage
//! density of enrichment `e` and the count density of crosslink `x`.
//!
use super::{Emission, Hmm, Mode, UNIFORM};
use crate::dataset::{Dataset, Position, Strand};
use crate::density::{CountDensity, CoverageDensity, Densities};
use crate::error::{HmmError, Result};
use crate::prob::{safe_log, LogProb};
use log::{debug, warn};
use rayon::prelude::*;

///
/// emission of a position that no state can explain: all mass on state 0
///
pub const INVALID_EMISSION: Emission = [LogProb::Ln(0.0), LogProb::Zero, LogProb::Zero, LogProb::Zero];

/// NaN densities are read as 0
fn sanitize(x: f64) -> f64 {
    if x.is_nan() {
        0.0
    } else {
        x
    }
}

///
/// Factor densities of a position
///
/// * coverage `[bg, fg]`: evaluated if `coverage > 0` and `coverage >= threshold`,
///   else `(1, 0)`
/// * count `[bg, fg]`: evaluated if `trunc_count > 0`, else `(1, 0)`
///
pub fn factor_densities<C: CoverageDensity, B: CountDensity>(
    pos: &Position,
    densities: &Densities<C, B>,
) -> ([f64; 2], [f64; 2]) {
    let coverage = if pos.coverage > 0.0 && pos.coverage >= densities.coverage[0].threshold() {
        [
            sanitize(densities.coverage[0].density(pos)),
            sanitize(densities.coverage[1].density(pos)),
        ]
    } else {
        [1.0, 0.0]
    };
    let count = if pos.trunc_count > 0 {
        [
            sanitize(densities.count[0].density(pos)),
            sanitize(densities.count[1].density(pos)),
        ]
    } else {
        [1.0, 0.0]
    };
    (coverage, count)
}

///
/// Emission of a position, or `None` if the position is invalid
/// (both coverage densities are 0, both count densities are 0, or every
/// state has probability 0).
///
pub fn position_emission<C: CoverageDensity, B: CountDensity>(
    pos: &Position,
    densities: &Densities<C, B>,
) -> Option<Emission> {
    let (coverage, count) = factor_densities(pos, densities);
    if coverage[0] + coverage[1] == 0.0 || count[0] + count[1] == 0.0 {
        return None;
    }
    let mut e = [LogProb::Zero; 4];
    for (k, x) in e.iter_mut().enumerate() {
        *x = safe_log(coverage[k / 2]) * safe_log(count[k % 2]);
    }
    if e.iter().all(|x| x.is_zero()) {
        None
    } else {
        Some(e)
    }
}

impl Hmm {
    ///
    /// Recompute the emission table.
    ///
    /// Returns the invalid intervals `(strand, index)`.
    ///
    /// * `Mode::Training`: discarded intervals are skipped and any invalid
    ///   interval is an `EmissionInvalid` error.
    /// * `Mode::Decoding`: every interval is computed and invalid intervals
    ///   are returned to be discarded by the caller.
    ///
    pub fn compute_emissions<C: CoverageDensity, B: CountDensity>(
        &mut self,
        data: &Dataset,
        densities: &Densities<C, B>,
        mode: Mode,
    ) -> Result<Vec<(Strand, usize)>> {
        let mut invalid = Vec::new();
        let mut n_zero_coverage = 0;
        for strand in Strand::BOTH {
            let s = strand.index();
            let results: Vec<(Option<usize>, usize)> = data.strands[s]
                .intervals
                .par_iter()
                .zip(self.emissions[s].par_iter_mut())
                .enumerate()
                .map(|(i, (interval, emissions))| {
                    if mode == Mode::Training && interval.is_discarded() {
                        return (None, 0);
                    }
                    let mut valid = true;
                    let mut n_zero = 0;
                    for (t, pos) in interval.positions().iter().enumerate() {
                        if pos.coverage == 0.0 {
                            n_zero += 1;
                        }
                        emissions[t] = match position_emission(pos, densities) {
                            Some(e) => e,
                            None => {
                                valid = false;
                                log_invalid_position(data, densities, strand, i, t);
                                INVALID_EMISSION
                            }
                        };
                    }
                    (if valid { None } else { Some(i) }, n_zero)
                })
                .collect();
            for (i, n_zero) in results {
                n_zero_coverage += n_zero;
                if let Some(i) = i {
                    invalid.push((strand, i));
                }
            }
        }
        if n_zero_coverage > 0 {
            warn!(
                "coverage is 0.0 at {} position(s). This might be caused by a bandwidth of the coverage estimate that is too small",
                n_zero_coverage
            );
        }
        if mode == Mode::Training {
            if let Some(&(strand, interval)) = invalid.first() {
                return Err(HmmError::EmissionInvalid {
                    strand,
                    interval,
                    n_intervals: invalid.len(),
                });
            }
        } else if !invalid.is_empty() {
            warn!(
                "emission probability became 0.0 in {} interval(s), which are discarded. \
                 This might be due to artifacts or outliers; consider extended floating-point precision mode",
                invalid.len()
            );
        }
        Ok(invalid)
    }
    ///
    /// Mark the intervals discarded. Their initial distributions are reset
    /// to uniform and their posteriors to 0.
    ///
    pub fn discard_intervals(&mut self, data: &mut Dataset, intervals: &[(Strand, usize)]) {
        for &(strand, i) in intervals {
            let s = strand.index();
            data.strands[s].intervals[i].mark_discarded();
            self.init_probs[s][i] = UNIFORM;
            for post in self.posteriors[s][i].iter_mut() {
                *post = [0.0; 4];
            }
        }
    }
}

fn log_invalid_position<C: CoverageDensity, B: CountDensity>(
    data: &Dataset,
    densities: &Densities<C, B>,
    strand: Strand,
    i: usize,
    t: usize,
) {
    let pos = &data.interval(strand, i)[t];
    let (coverage, count) = factor_densities(pos, densities);
    let (begin, end) = data.genomic_range(strand, i);
    debug!(
        "invalid emission at {}:{}-{} ({} strand) interval {} position {}: coverage={} trunc_count={} n_trials={} \
         coverage densities={:?} count densities={:?} covariate={:?} motif={:?}",
        data.contig,
        begin,
        end,
        strand,
        i,
        t,
        pos.coverage,
        pos.trunc_count,
        pos.n_trials,
        coverage,
        count,
        pos.covariate,
        pos.motif,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::density::{Gamma, ZtBinomial};

    fn densities() -> Densities<Gamma, ZtBinomial> {
        Densities::new(
            [Gamma::new(1.0, 1.0, 0.5), Gamma::new(2.0, 3.0, 0.5)],
            [ZtBinomial::new(0.01), ZtBinomial::new(0.2)],
        )
    }

    #[test]
    fn below_threshold_and_no_truncation() {
        let d = densities();
        let e = position_emission(&Position::new(0.1, 0, 10.0), &d).unwrap();
        assert_eq!(e, INVALID_EMISSION);
    }
    #[test]
    fn emission_is_product_of_factors() {
        let d = densities();
        let pos = Position::new(4.0, 2, 10.0);
        let e = position_emission(&pos, &d).unwrap();
        for k in 0..4 {
            let expected =
                d.coverage[k / 2].density(&pos).ln() + d.count[k % 2].density(&pos).ln();
            assert_abs_diff_eq!(e[k].to_log_value(), expected, epsilon = 1e-12);
        }
    }
    #[test]
    fn invalid_when_counts_impossible() {
        let d = densities();
        // trunc_count > n_trials: both count densities are 0
        assert!(position_emission(&Position::new(4.0, 12, 10.0), &d).is_none());
    }
    #[test]
    fn zero_coverage_is_outside_support() {
        // shape < 1 has an infinite density at 0
        let d = Densities::new(
            [Gamma::new(0.5, 1.0, 0.0), Gamma::new(2.0, 3.0, 0.0)],
            [ZtBinomial::new(0.01), ZtBinomial::new(0.2)],
        );
        let pos = Position::new(0.0, 2, 10.0);
        let (coverage, _) = factor_densities(&pos, &d);
        assert_eq!(coverage, [1.0, 0.0]);
        let e = position_emission(&pos, &d).unwrap();
        assert!(e.iter().all(|x| x.is_zero() || x.to_log_value().is_finite()));
        assert_eq!(e[2], LogProb::Zero);
    }
}
