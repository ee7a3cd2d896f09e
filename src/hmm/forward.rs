//!
//! Forward recursion of an interval in log space
//!
//! ```text
//! a[0][k] = log init[k] + e[0][k]
//! a[t][k] = LSE_k' (a[t-1][k'] + log A[k'][k]) + e[t][k]
//! ```
//!
use super::state::N_STATES;
use super::trans_table::LogTransMatrix;
use super::{Emission, Posterior};
use crate::dataset::Strand;
use crate::error::{HmmError, Result};
use crate::prob::{safe_log, LogProb};

pub type LogTable = Vec<[LogProb; N_STATES]>;

///
/// Forward table of an interval. Any infinite value is an error.
///
pub fn forward(
    init: &Posterior,
    emissions: &[Emission],
    log_trans: &LogTransMatrix,
    strand: Strand,
    interval: usize,
) -> Result<LogTable> {
    let n = emissions.len();
    let mut alpha: LogTable = vec![[LogProb::Zero; N_STATES]; n];
    if n == 0 {
        return Ok(alpha);
    }
    for k in 0..N_STATES {
        alpha[0][k] = safe_log(init[k]) * emissions[0][k];
        if alpha[0][k].is_infinite() {
            return Err(instability(
                strand,
                interval,
                0,
                format!(
                    "alpha[0][{}]={} init={} emission={}",
                    k, alpha[0][k], init[k], emissions[0][k]
                ),
            ));
        }
    }
    for t in 1..n {
        for k in 0..N_STATES {
            let sum: LogProb = (0..N_STATES).map(|k0| alpha[t - 1][k0] * log_trans[k0][k]).sum();
            alpha[t][k] = sum * emissions[t][k];
            if alpha[t][k].is_infinite() {
                return Err(instability(
                    strand,
                    interval,
                    t,
                    format!(
                        "alpha[{}][{}]={} previous={:?} emission={}",
                        t,
                        k,
                        alpha[t][k],
                        alpha[t - 1],
                        emissions[t][k]
                    ),
                ));
            }
        }
    }
    Ok(alpha)
}

pub(super) fn instability(strand: Strand, interval: usize, t: usize, detail: String) -> HmmError {
    HmmError::NumericInstability {
        stage: "forward",
        strand,
        interval,
        t,
        detail,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hmm::trans_table::TransMatrix;
    use crate::prob::p;

    #[test]
    fn forward_single_state_chain() {
        // emissions only allow state 0
        let e = [p(0.5), p(0.0), p(0.0), p(0.0)];
        let emissions = vec![e; 3];
        let lt = TransMatrix::uniform().to_log();
        let alpha = forward(&[0.25; 4], &emissions, &lt, Strand::Forward, 0).unwrap();
        // 0.25 * 0.5 * (0.25 * 0.5)^2
        assert_abs_diff_eq!(alpha[2][0].to_value(), 0.25 * 0.5 * 0.125 * 0.125, epsilon = 1e-12);
        assert!(alpha[2][1].is_zero());
    }
    #[test]
    fn infinite_emission_is_an_error() {
        let e = [crate::prob::lp(f64::INFINITY), p(0.1), p(0.1), p(0.1)];
        let lt = TransMatrix::uniform().to_log();
        let r = forward(&[0.25; 4], &[e], &lt, Strand::Reverse, 4);
        assert!(matches!(
            r,
            Err(HmmError::NumericInstability {
                interval: 4,
                t: 0,
                ..
            })
        ));
    }
}
