//!
//! State posteriors and expected transition counts from the result of
//! Forward/Backward.
//!
//! - **State posterior** (for each position and each state)
//!     `P(state at t = k | observations) = a[t][k] b[t][k] / P(O)`
//!
//! - **Transition freq** (for each pair of states)
//!     The expected number of transitions `k1 -> k2`, the sum over `t` of
//!     `P(state at t-1 = k1, state at t = k2 | observations)`.
//!
use super::backward::backward;
use super::forward::{forward, LogTable};
use super::state::N_STATES;
use super::trans_table::{LogTransMatrix, TransFreqs};
use super::{Emission, Hmm, Mode, Posterior};
use crate::dataset::{Interval, Strand};
use crate::error::{HmmError, Result};
use crate::prob::{safe_exp, LogProb};
use rayon::prelude::*;

///
/// Posteriors of an interval from its forward and backward tables.
///
/// The normalizer is `LSE_k (a[t][k] + b[t][k])` of each position. A `Zero`
/// normalizer, or a posterior outside of `[0, 1]`, is an error.
///
pub fn posteriors(
    alpha: &LogTable,
    beta: &LogTable,
    strand: Strand,
    interval: usize,
) -> Result<Vec<Posterior>> {
    alpha
        .iter()
        .zip(beta.iter())
        .enumerate()
        .map(|(t, (a, b))| {
            let f: [LogProb; N_STATES] = [a[0] * b[0], a[1] * b[1], a[2] * b[2], a[3] * b[3]];
            let norm: LogProb = f.iter().sum();
            if norm.is_zero() {
                return Err(posterior_error(strand, interval, t, format!("norm is 0 a={:?} b={:?}", a, b)));
            }
            let mut post = [0.0; N_STATES];
            for k in 0..N_STATES {
                post[k] = safe_exp(f[k] / norm);
                if !post[k].is_finite() || post[k] < 0.0 || post[k] > 1.0 {
                    return Err(posterior_error(
                        strand,
                        interval,
                        t,
                        format!(
                            "posterior[{}]={} alpha={} beta={} norm={}",
                            k, post[k], a[k], b[k], norm
                        ),
                    ));
                }
            }
            Ok(post)
        })
        .collect()
}

fn posterior_error(strand: Strand, interval: usize, t: usize, detail: String) -> HmmError {
    HmmError::NumericInstability {
        stage: "posterior",
        strand,
        interval,
        t,
        detail,
    }
}

///
/// Expected transition counts of an interval.
///
/// Each `t` is normalized by its own `LSE` over the 16 pairs. The
/// restricted counts `p_2_2`, `p_2_3` use only the transitions into
/// positions with `n_trials >= threshold` (if `threshold > 0`).
///
pub fn transition_freqs(
    alpha: &LogTable,
    beta: &LogTable,
    emissions: &[Emission],
    log_trans: &LogTransMatrix,
    interval: &Interval,
    threshold: f64,
) -> TransFreqs {
    let mut freqs = TransFreqs::zero();
    for t in 1..emissions.len() {
        let mut xi = [[LogProb::Zero; N_STATES]; N_STATES];
        let mut norm = LogProb::Zero;
        for k1 in 0..N_STATES {
            for k2 in 0..N_STATES {
                xi[k1][k2] = alpha[t - 1][k1] * log_trans[k1][k2] * emissions[t][k2] * beta[t][k2];
                norm += xi[k1][k2];
            }
        }
        for k1 in 0..N_STATES {
            for k2 in 0..N_STATES {
                freqs.p[k1][k2] += safe_exp(xi[k1][k2] / norm);
            }
        }
        if threshold > 0.0 && interval[t].n_trials >= threshold {
            freqs.p_2_2 += safe_exp(xi[2][2] / norm);
            freqs.p_2_3 += safe_exp(xi[2][3] / norm);
        }
    }
    freqs
}

impl Hmm {
    ///
    /// Run forward/backward on every non-discarded interval, store the
    /// posteriors and set the initial distributions to the posteriors at the
    /// first position.
    ///
    /// In `Mode::Training` the expected transition counts summed over all
    /// intervals are returned, otherwise zero.
    ///
    pub fn forward_backward(&mut self, data: &crate::dataset::Dataset, mode: Mode) -> Result<TransFreqs> {
        let log_trans = self.trans.to_log();
        let threshold = self.params.n_threshold_for_trans_p;
        let mut total = TransFreqs::zero();
        for strand in Strand::BOTH {
            let s = strand.index();
            let emissions = &self.emissions[s];
            let freqs = data.strands[s]
                .intervals
                .par_iter()
                .zip(self.posteriors[s].par_iter_mut())
                .zip(self.init_probs[s].par_iter_mut())
                .enumerate()
                .map(|(i, ((interval, post), init))| -> Result<TransFreqs> {
                    if interval.is_discarded() {
                        return Ok(TransFreqs::zero());
                    }
                    let e = &emissions[i];
                    let alpha = forward(init, e, &log_trans, strand, i)?;
                    let beta = backward(e, &log_trans, strand, i)?;
                    *post = posteriors(&alpha, &beta, strand, i)?;
                    *init = post[0];
                    if mode == Mode::Training {
                        Ok(transition_freqs(&alpha, &beta, e, &log_trans, interval, threshold))
                    } else {
                        Ok(TransFreqs::zero())
                    }
                })
                .try_reduce(TransFreqs::zero, |a, b| Ok(a + b))?;
            total += &freqs;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::trans_table::TransMatrix;
    use crate::prob::p;

    #[test]
    fn posteriors_sum_to_one() {
        let lt = TransMatrix([
            [0.7, 0.1, 0.1, 0.1],
            [0.2, 0.5, 0.2, 0.1],
            [0.1, 0.1, 0.6, 0.2],
            [0.3, 0.1, 0.3, 0.3],
        ])
        .to_log();
        let emissions = vec![
            [p(0.2), p(0.01), p(0.05), p(0.3)],
            [p(0.6), p(0.02), p(0.0), p(0.1)],
            [p(0.1), p(0.2), p(0.3), p(0.4)],
        ];
        let alpha = forward(&[0.25; 4], &emissions, &lt, Strand::Forward, 0).unwrap();
        let beta = backward(&emissions, &lt, Strand::Forward, 0).unwrap();
        let post = posteriors(&alpha, &beta, Strand::Forward, 0).unwrap();
        for row in post.iter() {
            assert_abs_diff_eq!(row.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
        }
        assert_eq!(post[1][2], 0.0);
    }
    #[test]
    fn all_zero_is_an_error() {
        let zero = vec![[LogProb::Zero; 4]];
        let r = posteriors(&zero, &zero, Strand::Forward, 2);
        assert!(matches!(r, Err(HmmError::NumericInstability { stage: "posterior", .. })));
    }
}
