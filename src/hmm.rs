//!
//! Four-state enrichment/crosslink HMM
//!
//! * `state`: hidden states
//! * `params`: training/decoding configuration
//! * `trans_table`: transition matrix and its re-estimation
//! * `emission`: emission probabilities from the densities
//! * `forward`/`backward`: log-space recursions of an interval
//! * `freq`: state posteriors and expected transition counts
//! * `viterbi`/`decode`: most probable state sequences
//!
//! Intervals are independent given the transition matrix, so every pass
//! runs over the intervals of both strands in parallel.
//!
pub mod backward;
pub mod decode;
pub mod emission;
pub mod forward;
pub mod freq;
pub mod mocks;
pub mod params;
pub mod state;
pub mod trans_table;
pub mod viterbi;

use crate::dataset::{Dataset, Strand};
use crate::prob::LogProb;
use params::HmmParams;
use state::{State, N_STATES};
use trans_table::TransMatrix;

/// log emission probability of each state at a position
pub type Emission = [LogProb; N_STATES];
/// posterior probability of each state at a position (linear space)
pub type Posterior = [f64; N_STATES];
/// decoded states of each interval of each strand. `None` if discarded.
pub type DecodedStates = [Vec<Option<Vec<State>>>; 2];

/// uniform distribution over the states
pub const UNIFORM: Posterior = [1.0 / N_STATES as f64; N_STATES];

///
/// Training fails on invalid emissions, decoding discards their intervals.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Training,
    Decoding,
}

///
/// HMM engine
///
/// Tables are indexed as `[strand][interval][position]`.
///
#[derive(Debug, Clone)]
pub struct Hmm {
    pub params: HmmParams,
    pub trans: TransMatrix,
    /// initial state distribution of each interval
    pub init_probs: [Vec<Posterior>; 2],
    pub emissions: [Vec<Vec<Emission>>; 2],
    pub posteriors: [Vec<Vec<Posterior>>; 2],
}

impl Hmm {
    ///
    /// Tables sized for the dataset, with uniform initial distributions and
    /// a uniform transition matrix.
    ///
    pub fn new(data: &Dataset, params: HmmParams) -> Self {
        let init = |s: usize| vec![UNIFORM; data.strands[s].len()];
        let invalid = emission::INVALID_EMISSION;
        let zero = [0.0; N_STATES];
        Hmm {
            params,
            trans: TransMatrix::uniform(),
            init_probs: [init(0), init(1)],
            emissions: [table(data, 0, invalid), table(data, 1, invalid)],
            posteriors: [table(data, 0, zero), table(data, 1, zero)],
        }
    }
    pub fn with_trans(mut self, trans: TransMatrix) -> Self {
        self.trans = trans;
        self
    }
    pub fn posteriors(&self, strand: Strand, i: usize) -> &[Posterior] {
        &self.posteriors[strand.index()][i]
    }
    pub fn emissions(&self, strand: Strand, i: usize) -> &[Emission] {
        &self.emissions[strand.index()][i]
    }
    pub fn init_prob(&self, strand: Strand, i: usize) -> &Posterior {
        &self.init_probs[strand.index()][i]
    }
}

///
/// per-position table of the intervals of a strand filled with `x`
///
fn table<T: Clone>(data: &Dataset, s: usize, x: T) -> Vec<Vec<T>> {
    data.strands[s]
        .intervals
        .iter()
        .map(|interval| vec![x.clone(); interval.len()])
        .collect()
}

#[cfg(test)]
mod tests;
