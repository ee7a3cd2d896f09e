//!
//! Backward recursion of an interval in log space
//!
//! ```text
//! b[T-1][k] = 0
//! b[t][k] = LSE_k' (b[t+1][k'] + log A[k][k'] + e[t+1][k'])
//! ```
//!
use super::forward::LogTable;
use super::state::N_STATES;
use super::trans_table::LogTransMatrix;
use super::Emission;
use crate::dataset::Strand;
use crate::error::{HmmError, Result};
use crate::prob::LogProb;

///
/// Backward table of an interval. Any infinite value is an error.
///
pub fn backward(
    emissions: &[Emission],
    log_trans: &LogTransMatrix,
    strand: Strand,
    interval: usize,
) -> Result<LogTable> {
    let n = emissions.len();
    let mut beta: LogTable = vec![[LogProb::one(); N_STATES]; n];
    for t in (0..n.saturating_sub(1)).rev() {
        for k in 0..N_STATES {
            beta[t][k] = (0..N_STATES)
                .map(|k1| beta[t + 1][k1] * log_trans[k][k1] * emissions[t + 1][k1])
                .sum();
            if beta[t][k].is_infinite() {
                return Err(HmmError::NumericInstability {
                    stage: "backward",
                    strand,
                    interval,
                    t,
                    detail: format!(
                        "beta[{}][{}]={} next={:?} emissions={:?}",
                        t,
                        k,
                        beta[t][k],
                        beta[t + 1],
                        emissions[t + 1]
                    ),
                });
            }
        }
    }
    Ok(beta)
}
