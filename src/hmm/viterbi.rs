//!
//! Viterbi decoding in log space
//!
use super::state::{State, N_STATES};
use super::trans_table::LogTransMatrix;
use super::{DecodedStates, Emission, Hmm, Posterior};
use crate::dataset::{Dataset, Strand};
use crate::prob::{safe_log, LogProb};
use rayon::prelude::*;

///
/// Most probable state sequence of an interval and its log probability.
///
/// Ties of the predecessor are resolved to the lowest state index, and
/// ties of the final state to the highest state index.
///
pub fn viterbi_interval(
    init: &Posterior,
    emissions: &[Emission],
    log_trans: &LogTransMatrix,
) -> (Vec<State>, LogProb) {
    let n = emissions.len();
    if n == 0 {
        return (Vec::new(), LogProb::one());
    }
    let mut v = vec![[LogProb::Zero; N_STATES]; n];
    let mut back = vec![[0usize; N_STATES]; n];
    for k in 0..N_STATES {
        v[0][k] = safe_log(init[k]) * emissions[0][k];
    }
    for t in 1..n {
        for k in 0..N_STATES {
            let mut best = v[t - 1][0] * log_trans[0][k];
            let mut arg = 0;
            for k0 in 1..N_STATES {
                let x = v[t - 1][k0] * log_trans[k0][k];
                if x > best {
                    best = x;
                    arg = k0;
                }
            }
            v[t][k] = best * emissions[t][k];
            back[t][k] = arg;
        }
    }

    let mut best = LogProb::Zero;
    let mut last = 0;
    for k in 0..N_STATES {
        if v[n - 1][k] >= best {
            best = v[n - 1][k];
            last = k;
        }
    }

    let mut states = vec![State::default(); n];
    let mut k = last;
    for t in (0..n).rev() {
        states[t] = State::from_index(k);
        k = back[t][k];
    }
    (states, best)
}

impl Hmm {
    ///
    /// Viterbi path of every non-discarded interval, with the total log
    /// probability of the decoded intervals.
    ///
    pub fn viterbi(&self, data: &Dataset) -> (DecodedStates, LogProb) {
        let log_trans = self.trans.to_log();
        let mut total = LogProb::one();
        let mut decoded: DecodedStates = [Vec::new(), Vec::new()];
        for strand in Strand::BOTH {
            let s = strand.index();
            let paths: Vec<Option<(Vec<State>, LogProb)>> = data.strands[s]
                .intervals
                .par_iter()
                .enumerate()
                .map(|(i, interval)| {
                    if interval.is_discarded() {
                        None
                    } else {
                        Some(viterbi_interval(
                            &self.init_probs[s][i],
                            &self.emissions[s][i],
                            &log_trans,
                        ))
                    }
                })
                .collect();
            decoded[s] = paths
                .into_iter()
                .map(|path| {
                    path.map(|(states, p)| {
                        total *= p;
                        states
                    })
                })
                .collect();
        }
        (decoded, total)
    }
}
