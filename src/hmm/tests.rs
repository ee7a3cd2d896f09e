//!
//! Tests of the engine on small datasets
//!
use super::*;
use crate::dataset::{Interval, Position, StrandData};
use crate::density::{Densities, Gamma, ZtBinomial};
use crate::error::HmmError;

fn densities() -> Densities<Gamma, ZtBinomial> {
    Densities::new(
        [Gamma::new(1.0, 1.0, 1e-3), Gamma::new(3.0, 4.0, 1e-3)],
        [ZtBinomial::new(0.02), ZtBinomial::new(0.3)],
    )
}

fn dataset(forward: Vec<Vec<Position>>, reverse: Vec<Vec<Position>>) -> Dataset {
    let strand = |xs: Vec<Vec<Position>>| {
        let offsets = (0..xs.len()).map(|i| i * 100).collect();
        StrandData::new(xs.into_iter().map(Interval::new).collect(), offsets).unwrap()
    };
    Dataset::new("test", 1000, strand(forward), strand(reverse)).unwrap()
}

#[test]
fn length_one_posterior_is_normalized_emission() {
    let pos = Position::new(5.0, 3, 20.0);
    let data = dataset(vec![vec![pos]], vec![]);
    let d = densities();
    let mut hmm = Hmm::new(&data, HmmParams::default());
    hmm.compute_emissions(&data, &d, Mode::Decoding).unwrap();
    hmm.forward_backward(&data, Mode::Decoding).unwrap();

    let e: Vec<f64> = hmm.emissions(Strand::Forward, 0)[0]
        .iter()
        .map(|x| x.to_value())
        .collect();
    let z: f64 = e.iter().sum();
    let post = hmm.posteriors(Strand::Forward, 0)[0];
    for k in 0..N_STATES {
        assert_abs_diff_eq!(post[k], e[k] / z, epsilon = 1e-6);
    }
    // initial distribution is the posterior at the first position
    assert_eq!(hmm.init_prob(Strand::Forward, 0), &post);
}

#[test]
fn posteriors_are_distributions() {
    let (data, _) = mocks::MockModel::default().sample_dataset(2, 4, 60).unwrap();
    let d = densities();
    let mut hmm = Hmm::new(&data, HmmParams::default());
    hmm.compute_emissions(&data, &d, Mode::Training).unwrap();
    let freqs = hmm.forward_backward(&data, Mode::Training).unwrap();
    for s in 0..2 {
        for post in hmm.posteriors[s].iter().flatten() {
            assert_abs_diff_eq!(post.iter().sum::<f64>(), 1.0, epsilon = 1e-5);
            assert!(post.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
    }
    // one transition per adjacent pair of positions
    let total: f64 = freqs.p.iter().flatten().sum();
    assert_abs_diff_eq!(total, (2 * 4 * 59) as f64, epsilon = 1e-2);
}

#[test]
fn invalid_interval_is_fatal_in_training() {
    // trunc_count > n_trials: no count density can explain it
    let bad = Position::new(2.0, 5, 2.0);
    let good = Position::new(2.0, 0, 2.0);
    let data = dataset(vec![vec![good, good]], vec![vec![good, bad]]);
    let mut hmm = Hmm::new(&data, HmmParams::default());
    let r = hmm.compute_emissions(&data, &densities(), Mode::Training);
    match r {
        Err(HmmError::EmissionInvalid {
            strand,
            interval,
            n_intervals,
        }) => {
            assert_eq!(strand, Strand::Reverse);
            assert_eq!(interval, 0);
            assert_eq!(n_intervals, 1);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn invalid_interval_is_discarded_in_decoding() {
    let bad = Position::new(2.0, 5, 2.0);
    let good = Position::new(2.0, 1, 2.0);
    let mut data = dataset(vec![vec![good, good], vec![bad, good, bad]], vec![]);
    let mut hmm = Hmm::new(&data, HmmParams::default());
    let d = densities();
    let n = hmm.apply_parameters(&mut data, &d).unwrap();
    assert_eq!(n, 1);
    assert!(!data.interval(Strand::Forward, 0).is_discarded());
    assert!(data.interval(Strand::Forward, 1).is_discarded());
    assert_eq!(hmm.init_prob(Strand::Forward, 1), &UNIFORM);

    let (viterbi, _) = hmm.viterbi(&data);
    assert!(viterbi[0][0].is_some());
    assert!(viterbi[0][1].is_none());
    let posterior = hmm.posterior_decoding(&data);
    assert!(posterior[0][1].is_none());

    // the discarded interval stays discarded
    hmm.apply_parameters(&mut data, &d).unwrap();
    assert!(data.interval(Strand::Forward, 1).is_discarded());
    assert_eq!(data.n_discarded(), 1);
}

#[test]
fn training_keeps_transition_floor() {
    let (data, _) = mocks::MockModel::default().sample_dataset(9, 4, 100).unwrap();
    let mut params = HmmParams::default();
    params.max_iter = 3;
    params.min_trans_prob_cs = 0.05;
    let mut hmm = Hmm::new(&data, params);
    let mut d = densities();
    hmm.baum_welch(&data, &mut d, crate::em::LearnTarget::Crosslink, false)
        .unwrap();
    for k in 0..N_STATES {
        assert_abs_diff_eq!(hmm.trans.row_sum(k), 1.0, epsilon = 1e-9);
    }
    assert!(hmm.trans.p(2, 3) >= 0.05 - 1e-12);
}

#[test]
fn failed_iteration_commits_nothing() {
    // every coverage below the density threshold: the coverage fit has no sample
    let pos = Position::new(2.0, 1, 5.0);
    let data = dataset(vec![vec![pos; 6]], vec![vec![pos; 4]]);
    let mut d = Densities::new(
        [Gamma::new(1.0, 1.0, 10.0), Gamma::new(3.0, 4.0, 10.0)],
        [ZtBinomial::new(0.02), ZtBinomial::new(0.3)],
    );
    let before = d.clone();
    let mut hmm = Hmm::new(&data, HmmParams::default());
    let trans = hmm.trans;
    let r = hmm.baum_welch(&data, &mut d, crate::em::LearnTarget::Coverage, false);
    assert!(matches!(r, Err(HmmError::Fit { .. })));
    assert_eq!(hmm.trans, trans);
    assert_eq!(d.coverage, before.coverage);
    assert_eq!(d.count, before.count);
}

#[test]
fn zero_coverage_is_not_fatal() {
    let mut params = HmmParams::default();
    params.coverage_threshold = 0.0;
    let d = Densities::new(
        [Gamma::new(0.5, 2.0, 0.0), Gamma::new(3.0, 4.0, 0.0)],
        [ZtBinomial::new(0.02), ZtBinomial::new(0.3)],
    );
    let zero = Position::new(0.0, 1, 5.0);
    let covered = Position::new(3.0, 2, 5.0);
    let mut data = dataset(vec![vec![zero, covered, zero]], vec![]);
    let mut hmm = Hmm::new(&data, params);
    assert_eq!(hmm.apply_parameters(&mut data, &d).unwrap(), 0);
    for post in hmm.posteriors(Strand::Forward, 0) {
        assert_abs_diff_eq!(post.iter().sum::<f64>(), 1.0, epsilon = 1e-6);
    }
}
