//!
//! training and decoding on synthetic datasets
//!
#[macro_use]
extern crate approx;

use xlhmm::dataset::Dataset;
use xlhmm::density::{Gamma, GammaReg, ZtBinomial, ZtBinomialReg};
use xlhmm::hmm::mocks::MockModel;
use xlhmm::hmm::params::HmmParams;
use xlhmm::hmm::state::State;
use xlhmm::hmm::trans_table::TransMatrix;
use xlhmm::io::OutputParams;
use xlhmm::pipeline::{run, Decoder};

fn params() -> HmmParams {
    let mut params = HmmParams::default();
    params.max_iter = 30;
    params.fg_shape_max = 5.0;
    params
}

fn enrichment_accuracy(decoded: &xlhmm::hmm::DecodedStates, truth: &[Vec<Vec<State>>; 2]) -> f64 {
    let mut n = 0;
    let mut n_correct = 0;
    for s in 0..2 {
        for (states, true_states) in decoded[s].iter().zip(truth[s].iter()) {
            if let Some(states) = states {
                for (a, b) in states.iter().zip(true_states.iter()) {
                    n += 1;
                    if a.is_enriched() == b.is_enriched() {
                        n_correct += 1;
                    }
                }
            }
        }
    }
    n_correct as f64 / n as f64
}

#[test]
fn training_recovers_generating_model() {
    let model = MockModel::default();
    let (mut data, truth) = model.sample_dataset(42, 20, 500).unwrap();
    let out = run::<Gamma, ZtBinomial>(
        &mut data,
        params(),
        &OutputParams::default(),
        Decoder::Posterior,
        false,
    )
    .unwrap();
    println!("{}", out.densities);
    println!("{}", out.hmm.trans);

    let bg = out.densities.coverage[0];
    let fg = out.densities.coverage[1];
    assert_relative_eq!(bg.mean(), 1.0, max_relative = 0.35);
    assert_relative_eq!(fg.mean(), 12.0, max_relative = 0.35);
    assert!(out.densities.count[0].p < out.densities.count[1].p);
    assert_relative_eq!(out.densities.count[1].p, 0.3, max_relative = 0.35);

    for k in 0..4 {
        assert_abs_diff_eq!(out.hmm.trans.row_sum(k), 1.0, epsilon = 1e-9);
    }
    // enrichment persistence and the dominant entries of the generator
    let (a, b) = (&out.hmm.trans, &model.trans);
    for k in [0, 2] {
        let stay = |m: &TransMatrix| m.p(k, k & 2) + m.p(k, (k & 2) + 1);
        assert_abs_diff_eq!(stay(a), stay(b), epsilon = 0.08);
    }
    assert_abs_diff_eq!(a.p(0, 0), b.p(0, 0), epsilon = 0.15);
    assert_abs_diff_eq!(a.p(2, 2), b.p(2, 2), epsilon = 0.15);
    assert_eq!(out.n_discarded, 0);

    let accuracy = enrichment_accuracy(&out.decoded, &truth);
    println!("enrichment accuracy={}", accuracy);
    assert!(accuracy > 0.85);
    assert!(out
        .sites
        .iter()
        .all(|site| site.name == State::EnrichedCrosslink.to_string()));
}

#[test]
fn viterbi_and_posterior_mostly_agree() {
    let model = MockModel::default();
    let (data, _) = model.sample_dataset(7, 10, 300).unwrap();
    let mut d1: Dataset = data.clone();
    let mut d2: Dataset = data;
    let a = run::<Gamma, ZtBinomial>(&mut d1, params(), &OutputParams::default(), Decoder::Viterbi, false)
        .unwrap();
    let b = run::<Gamma, ZtBinomial>(&mut d2, params(), &OutputParams::default(), Decoder::Posterior, false)
        .unwrap();
    let mut n = 0;
    let mut n_same = 0;
    for s in 0..2 {
        for (x, y) in a.decoded[s].iter().zip(b.decoded[s].iter()) {
            if let (Some(x), Some(y)) = (x, y) {
                n += x.len();
                n_same += x.iter().zip(y.iter()).filter(|(p, q)| p == q).count();
            }
        }
    }
    assert!(n_same as f64 / n as f64 > 0.8);
}

#[test]
fn regression_densities_run_end_to_end() {
    let model = MockModel::default();
    let (mut data, _) = model.sample_dataset(3, 10, 300).unwrap();
    // attach a covariate and a motif to every other position
    for strand in data.strands.iter_mut() {
        for interval in strand.intervals.iter_mut() {
            let positions: Vec<_> = interval
                .positions()
                .iter()
                .enumerate()
                .map(|(t, pos)| {
                    let pos = pos.with_covariate(1.0 + (t % 3) as f64);
                    if t % 2 == 0 {
                        pos.with_motif(0, 0.5)
                    } else {
                        pos
                    }
                })
                .collect();
            *interval = xlhmm::dataset::Interval::new(positions);
        }
    }
    let output = OutputParams {
        output_all: true,
        ..OutputParams::default()
    };
    let out = run::<GammaReg, ZtBinomialReg>(&mut data, params(), &output, Decoder::Viterbi, false)
        .unwrap();
    assert_eq!(out.densities.count[0].coeffs.len(), 1);
    // every position with a truncation is written
    let n_truncated = data
        .strands
        .iter()
        .flat_map(|s| s.intervals.iter())
        .flat_map(|x| x.positions().iter())
        .filter(|p| p.trunc_count >= 1)
        .count();
    assert_eq!(out.sites.len(), n_truncated);
    for region in out.regions.iter() {
        assert!(region.begin < region.end);
        assert!(region.name().ends_with(';'));
    }
}
