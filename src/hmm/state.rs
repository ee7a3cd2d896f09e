//!
//! Hidden states
//!
//! The four states are the cross product of two binary factors,
//! enrichment and crosslink. `index = 2 * enrichment + crosslink`.
//!
use serde::{Deserialize, Serialize};

/// number of hidden states
pub const N_STATES: usize = 4;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum State {
    #[default]
    NonEnriched = 0,
    NonEnrichedCrosslink = 1,
    Enriched = 2,
    EnrichedCrosslink = 3,
}

impl State {
    pub const ALL: [State; N_STATES] = [
        State::NonEnriched,
        State::NonEnrichedCrosslink,
        State::Enriched,
        State::EnrichedCrosslink,
    ];
    pub fn from_index(k: usize) -> State {
        State::ALL[k]
    }
    pub fn from_factors(enriched: bool, crosslink: bool) -> State {
        State::from_index(2 * enriched as usize + crosslink as usize)
    }
    pub fn index(self) -> usize {
        self as usize
    }
    /// state code used in output records
    pub fn code(self) -> u8 {
        self as u8
    }
    pub fn is_enriched(self) -> bool {
        self.index() >= 2
    }
    pub fn is_crosslink(self) -> bool {
        self.index() % 2 == 1
    }
    ///
    /// The non-enriched state with the same crosslink factor.
    ///
    pub fn to_non_enriched(self) -> State {
        State::from_factors(false, self.is_crosslink())
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}
