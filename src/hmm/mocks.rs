//!
//! Synthetic datasets sampled from a known four-state model
//!
//! Used by tests and benchmarks.
//!
use super::state::{State, N_STATES};
use super::trans_table::TransMatrix;
use crate::dataset::{Dataset, Interval, Position, StrandData};
use crate::error::Result;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;

///
/// Standard normal by the Box-Muller transform
///
pub fn sample_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

///
/// Gamma(k, theta) by Marsaglia-Tsang
///
pub fn sample_gamma<R: Rng>(rng: &mut R, k: f64, theta: f64) -> f64 {
    if k < 1.0 {
        let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        return sample_gamma(rng, k + 1.0, theta) * u.powf(1.0 / k);
    }
    let d = k - 1.0 / 3.0;
    let c = 1.0 / (9.0 * d).sqrt();
    loop {
        let x = sample_normal(rng);
        let v = (1.0 + c * x).powi(3);
        if v <= 0.0 {
            continue;
        }
        let u: f64 = rng.gen_range(f64::MIN_POSITIVE..1.0);
        if u.ln() < 0.5 * x * x + d - d * v + d * v.ln() {
            return d * v * theta;
        }
    }
}

///
/// Binomial(n, p) conditioned on `>= 1` by rejection
///
pub fn sample_zt_binomial<R: Rng>(rng: &mut R, n: u32, p: f64) -> u32 {
    assert!(n >= 1 && p > 0.0);
    loop {
        let c = (0..n).filter(|_| rng.gen::<f64>() < p).count() as u32;
        if c >= 1 {
            return c;
        }
    }
}

///
/// Parameters of the generating model
///
#[derive(Debug, Clone)]
pub struct MockModel {
    pub trans: TransMatrix,
    /// `(k, theta)` of `[non-enriched, enriched]` coverage
    pub coverage: [(f64, f64); 2],
    /// truncation probability per trial of `[non-crosslink, crosslink]`
    pub count_p: [f64; 2],
    pub n_trials: u32,
}

impl Default for MockModel {
    fn default() -> Self {
        MockModel {
            trans: TransMatrix([
                [0.90, 0.05, 0.05, 0.00],
                [0.60, 0.30, 0.10, 0.00],
                [0.10, 0.00, 0.80, 0.10],
                [0.05, 0.00, 0.45, 0.50],
            ]),
            coverage: [(1.0, 1.0), (3.0, 4.0)],
            count_p: [0.02, 0.3],
            n_trials: 20,
        }
    }
}

impl MockModel {
    fn next_state<R: Rng>(&self, rng: &mut R, from: State) -> State {
        let row = &self.trans.0[from.index()];
        let r: f64 = rng.gen();
        let mut acc = 0.0;
        for k in 0..N_STATES {
            acc += row[k];
            if r < acc {
                return State::from_index(k);
            }
        }
        State::from_index(N_STATES - 1)
    }
    ///
    /// Sample a position from the state.
    ///
    /// Non-crosslink states have no truncation with probability
    /// `(1 - p)^n` and otherwise a zero-truncated count, the same as
    /// crosslink states.
    ///
    pub fn sample_position<R: Rng>(&self, rng: &mut R, state: State) -> Position {
        let (k, theta) = self.coverage[state.is_enriched() as usize];
        let coverage = sample_gamma(rng, k, theta);
        let p = self.count_p[state.is_crosslink() as usize];
        let n = self.n_trials;
        let trunc_count = if state.is_crosslink() {
            sample_zt_binomial(rng, n, p)
        } else {
            (0..n).filter(|_| rng.gen::<f64>() < p).count() as u32
        };
        Position::new(coverage, trunc_count, n as f64)
    }
    ///
    /// Sample an interval of length `len` starting from the non-enriched state
    ///
    pub fn sample_interval<R: Rng>(&self, rng: &mut R, len: usize) -> (Vec<State>, Interval) {
        let mut states = Vec::with_capacity(len);
        let mut positions = Vec::with_capacity(len);
        let mut state = State::NonEnriched;
        for t in 0..len {
            if t > 0 {
                state = self.next_state(rng, state);
            }
            states.push(state);
            positions.push(self.sample_position(rng, state));
        }
        (states, Interval::new(positions))
    }
    ///
    /// Sample a dataset with `n_intervals` intervals of length `len` on each
    /// strand, with the true states of each interval.
    ///
    pub fn sample_dataset(
        &self,
        seed: u64,
        n_intervals: usize,
        len: usize,
    ) -> Result<(Dataset, [Vec<Vec<State>>; 2])> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let mut strands = Vec::new();
        let mut truth: [Vec<Vec<State>>; 2] = [Vec::new(), Vec::new()];
        for s in 0..2 {
            let mut intervals = Vec::new();
            let mut offsets = Vec::new();
            for i in 0..n_intervals {
                let (states, interval) = self.sample_interval(&mut rng, len);
                truth[s].push(states);
                intervals.push(interval);
                offsets.push(i * (len + 10));
            }
            strands.push(StrandData::new(intervals, offsets)?);
        }
        let contig_len = n_intervals * (len + 10);
        let reverse = strands.pop().unwrap_or_default();
        let forward = strands.pop().unwrap_or_default();
        let dataset = Dataset::new("mock", contig_len, forward, reverse)?;
        Ok((dataset, truth))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gamma_sampler_moments() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(0);
        for &(k, theta) in &[(0.7, 2.0), (3.0, 4.0)] {
            let xs: Vec<f64> = (0..50000).map(|_| sample_gamma(&mut rng, k, theta)).collect();
            let mean = xs.iter().sum::<f64>() / xs.len() as f64;
            let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / xs.len() as f64;
            assert_abs_diff_eq!(mean, k * theta, epsilon = 0.05 * k * theta);
            assert_abs_diff_eq!(var, k * theta * theta, epsilon = 0.1 * k * theta * theta);
        }
    }
    #[test]
    fn sampled_dataset_shape() {
        let (d, truth) = MockModel::default().sample_dataset(0, 3, 50).unwrap();
        assert_eq!(d.n_intervals(), 6);
        assert_eq!(d.n_positions(), 300);
        assert_eq!(truth[1].len(), 3);
        for (s, states) in truth.iter().enumerate() {
            for (i, xs) in states.iter().enumerate() {
                for (t, state) in xs.iter().enumerate() {
                    let pos = &d.strands[s].intervals[i][t];
                    if state.is_crosslink() {
                        assert!(pos.trunc_count >= 1);
                    }
                }
            }
        }
    }
}
