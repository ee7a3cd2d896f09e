//!
//! Posterior decoding and correction of decoded states
//!
use super::state::{State, N_STATES};
use super::{DecodedStates, Hmm, Posterior};
use crate::dataset::Dataset;
use crate::density::{CountDensity, CoverageDensity, Densities};
use rayon::prelude::*;

///
/// State with the largest posterior. The first state wins ties.
///
pub fn argmax_posterior(post: &Posterior) -> State {
    let mut max_p = 0.0;
    let mut arg = 0;
    for k in 0..N_STATES {
        if post[k] > max_p {
            max_p = post[k];
            arg = k;
        }
    }
    State::from_index(arg)
}

impl Hmm {
    ///
    /// Per-position argmax of the posteriors of every non-discarded interval.
    ///
    pub fn posterior_decoding(&self, data: &Dataset) -> DecodedStates {
        let decode = |s: usize| -> Vec<Option<Vec<State>>> {
            data.strands[s]
                .intervals
                .par_iter()
                .zip(self.posteriors[s].par_iter())
                .map(|(interval, post)| {
                    if interval.is_discarded() {
                        None
                    } else {
                        Some(post.iter().map(argmax_posterior).collect())
                    }
                })
                .collect()
        };
        [decode(0), decode(1)]
    }
}

///
/// Downgrade enriched states whose coverage is below the mean predicted by
/// the non-enriched coverage density.
///
/// Only coverage densities with a position-dependent mean (regression)
/// have a prediction, so this is a no-op for the others.
///
pub fn remove_border_artifacts<C: CoverageDensity, B: CountDensity>(
    decoded: &mut DecodedStates,
    data: &Dataset,
    densities: &Densities<C, B>,
) -> usize {
    let bg = &densities.coverage[0];
    let mut n_changed = 0;
    for s in 0..2 {
        for (i, states) in decoded[s].iter_mut().enumerate() {
            let states = match states {
                Some(states) => states,
                None => continue,
            };
            let interval = &data.strands[s].intervals[i];
            for (t, state) in states.iter_mut().enumerate() {
                if !state.is_enriched() {
                    continue;
                }
                let pos = &interval[t];
                match bg.predicted_mean(pos) {
                    Some(mean) if pos.coverage < mean => {
                        *state = state.to_non_enriched();
                        n_changed += 1;
                    }
                    Some(_) => {}
                    None => return 0,
                }
            }
        }
    }
    n_changed
}
