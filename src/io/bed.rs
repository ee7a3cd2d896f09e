//!
//! BED6 records of decoded states
//!
//! * `SiteRecord`: a single position, with an optional auxiliary column
//! * `RegionRecord`: merged crosslink sites of an interval
//!
use super::OutputParams;
use crate::dataset::{Dataset, Position, Strand};
use crate::hmm::state::{State, N_STATES};
use crate::hmm::{DecodedStates, Hmm, Posterior};
use std::io::Write;

///
/// `ln(post[state] / max(second best, min_positive))`
///
pub fn posterior_score(post: &Posterior, state: State, min_positive: f64) -> f64 {
    let k = state.index();
    let second_best = (0..N_STATES)
        .filter(|&j| j != k)
        .map(|j| post[j])
        .fold(0.0, f64::max);
    (post[k] / second_best.max(min_positive)).ln()
}

///
/// 0-based begin of the site of position `t` of an interval at `offset`.
///
/// The crosslink site is one nucleotide upstream of the truncation site.
///
pub fn site_begin(
    contig_len: usize,
    strand: Strand,
    offset: usize,
    t: usize,
    crosslink_at_trunc_site: bool,
) -> usize {
    match strand {
        Strand::Forward => {
            if crosslink_at_trunc_site {
                t + offset
            } else {
                (t + offset).saturating_sub(1)
            }
        }
        Strand::Reverse => {
            let x = contig_len.saturating_sub(t + offset);
            if crosslink_at_trunc_site {
                x.saturating_sub(1)
            } else {
                x
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteRecord {
    pub contig: String,
    pub begin: usize,
    pub end: usize,
    /// state code, "0" for discarded intervals
    pub name: String,
    /// `None` is written as `NA`
    pub score: Option<f64>,
    pub strand: Strand,
    pub aux: Option<String>,
}

impl std::fmt::Display for SiteRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t",
            self.contig, self.begin, self.end, self.name
        )?;
        match self.score {
            Some(score) => write!(f, "{}", score)?,
            None => write!(f, "NA")?,
        }
        write!(f, "\t{}", self.strand.to_char())?;
        if let Some(aux) = &self.aux {
            write!(f, "\t{}", aux)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegionRecord {
    pub contig: String,
    pub begin: usize,
    pub end: usize,
    /// scores of the merged sites
    pub scores: Vec<f64>,
    pub strand: Strand,
}

impl RegionRecord {
    /// individual scores, each followed by `;`
    pub fn name(&self) -> String {
        self.scores.iter().map(|s| format!("{};", s)).collect()
    }
    pub fn score(&self) -> f64 {
        self.scores.iter().sum()
    }
}

impl std::fmt::Display for RegionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.contig,
            self.begin,
            self.end,
            self.name(),
            self.score(),
            self.strand.to_char()
        )
    }
}

fn aux(pos: &Position, post: Option<&Posterior>) -> String {
    let covariate = pos.covariate.unwrap_or(0.0);
    match post {
        Some(post) => format!(
            "0;{};{};{};{};{};{};",
            pos.trunc_count,
            pos.n_trials as i64,
            pos.coverage,
            post[3],
            covariate,
            ((post[2] + post[3]) / (post[0] + post[1])).ln()
        ),
        None => format!(
            "0;{};{};{};NA;{};NA;",
            pos.trunc_count, pos.n_trials as i64, pos.coverage, covariate
        ),
    }
}

///
/// Site records of both strands.
///
/// * `output_all`: every position with `trunc_count >= 1`, with the
///   auxiliary column. Positions of discarded intervals are named "0" with
///   score `NA`.
/// * otherwise: crosslink calls (state 3) of non-discarded intervals only.
///
pub fn site_records(
    data: &Dataset,
    hmm: &Hmm,
    decoded: &DecodedStates,
    params: &OutputParams,
) -> Vec<SiteRecord> {
    let min_positive = hmm.params.precision.min_positive();
    let mut records = Vec::new();
    for strand in Strand::BOTH {
        let s = strand.index();
        for (i, interval) in data.strands[s].intervals.iter().enumerate() {
            let offset = data.strands[s].offsets[i];
            let states = decoded[s].get(i).and_then(|x| x.as_ref());
            for (t, pos) in interval.positions().iter().enumerate() {
                let begin = site_begin(
                    data.contig_len,
                    strand,
                    offset,
                    t,
                    params.crosslink_at_trunc_site,
                );
                let record = |name: String, score: Option<f64>, aux: Option<String>| SiteRecord {
                    contig: data.contig.clone(),
                    begin,
                    end: begin + 1,
                    name,
                    score,
                    strand,
                    aux,
                };
                if interval.is_discarded() {
                    if params.output_all && pos.trunc_count >= 1 {
                        records.push(record("0".to_string(), None, Some(aux(pos, None))));
                    }
                    continue;
                }
                let state = match states {
                    Some(states) => states[t],
                    None => continue,
                };
                let post = &hmm.posteriors[s][i][t];
                let score = posterior_score(post, state, min_positive);
                if params.output_all && pos.trunc_count >= 1 {
                    records.push(record(state.to_string(), Some(score), Some(aux(pos, Some(post)))));
                } else if state == State::EnrichedCrosslink {
                    records.push(record(state.to_string(), Some(score), None));
                }
            }
        }
    }
    records
}

///
/// Region records: crosslink calls of an interval are merged while the
/// next call is at most `dist_merge` positions after the previous one.
///
pub fn region_records(
    data: &Dataset,
    hmm: &Hmm,
    decoded: &DecodedStates,
    params: &OutputParams,
) -> Vec<RegionRecord> {
    let min_positive = hmm.params.precision.min_positive();
    let at_trunc = params.crosslink_at_trunc_site;
    let mut records = Vec::new();
    for strand in Strand::BOTH {
        let s = strand.index();
        for (i, interval) in data.strands[s].intervals.iter().enumerate() {
            if interval.is_discarded() {
                continue;
            }
            let states = match decoded[s].get(i).and_then(|x| x.as_ref()) {
                Some(states) => states,
                None => continue,
            };
            let offset = data.strands[s].offsets[i];
            let score_at = |t: usize| posterior_score(&hmm.posteriors[s][i][t], states[t], min_positive);
            let begin_at = |t: usize| site_begin(data.contig_len, strand, offset, t, at_trunc);

            let n = states.len();
            let mut t = 0;
            while t < n {
                if states[t] != State::EnrichedCrosslink {
                    t += 1;
                    continue;
                }
                let first = t;
                let mut last = t;
                let mut scores = vec![score_at(t)];
                while t + 1 < n && t + 1 - last <= params.dist_merge {
                    t += 1;
                    if states[t] == State::EnrichedCrosslink {
                        scores.push(score_at(t));
                        last = t;
                    }
                }
                let (begin, end) = match strand {
                    Strand::Forward => (begin_at(first), begin_at(last) + 1),
                    Strand::Reverse => (begin_at(last), begin_at(first) + 1),
                };
                records.push(RegionRecord {
                    contig: data.contig.clone(),
                    begin,
                    end,
                    scores,
                    strand,
                });
                t += 1;
            }
        }
    }
    records
}

///
/// write records, one per line
///
pub fn write_records<W: Write, R: std::fmt::Display>(
    writer: &mut W,
    records: &[R],
) -> std::io::Result<()> {
    for record in records {
        writeln!(writer, "{}", record)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Interval, StrandData};
    use crate::hmm::params::HmmParams;
    use test_case::test_case;

    #[test_case(Strand::Forward, false, 10 ; "forward crosslink site")]
    #[test_case(Strand::Forward, true, 11 ; "forward truncation site")]
    #[test_case(Strand::Reverse, false, 89 ; "reverse crosslink site")]
    #[test_case(Strand::Reverse, true, 88 ; "reverse truncation site")]
    fn site_coordinates(strand: Strand, at_trunc: bool, begin: usize) {
        assert_eq!(site_begin(100, strand, 10, 1, at_trunc), begin);
    }
    #[test]
    fn site_coordinate_at_contig_start() {
        assert_eq!(site_begin(100, Strand::Forward, 0, 0, false), 0);
        assert_eq!(site_begin(100, Strand::Reverse, 100, 0, true), 0);
    }
    #[test]
    fn score_is_log_ratio_to_second_best() {
        let post = [0.1, 0.2, 0.1, 0.6];
        assert_abs_diff_eq!(
            posterior_score(&post, State::EnrichedCrosslink, f64::MIN_POSITIVE),
            3.0f64.ln()
        );
        let certain = [0.0, 0.0, 0.0, 1.0];
        assert_abs_diff_eq!(
            posterior_score(&certain, State::EnrichedCrosslink, f64::MIN_POSITIVE),
            -f64::MIN_POSITIVE.ln()
        );
    }

    /// dataset of a single forward interval of length `n`, decoded states
    /// with crosslink calls at `calls`, and an engine with known posteriors
    fn setup(n: usize, calls: &[usize]) -> (Dataset, Hmm, DecodedStates) {
        let positions = (0..n).map(|_| Position::new(1.0, 1, 5.0)).collect();
        let fwd = StrandData::new(vec![Interval::new(positions)], vec![100]).unwrap();
        let data = Dataset::new("chr", 1000, fwd, StrandData::default()).unwrap();
        let mut hmm = Hmm::new(&data, HmmParams::default());
        let mut states = vec![State::NonEnriched; n];
        for &t in calls {
            states[t] = State::EnrichedCrosslink;
            hmm.posteriors[0][0][t] = [0.1, 0.1, 0.2, 0.6];
        }
        for t in 0..n {
            if !calls.contains(&t) {
                hmm.posteriors[0][0][t] = [0.7, 0.1, 0.1, 0.1];
            }
        }
        (data, hmm, [vec![Some(states)], vec![]])
    }

    /// score of a crosslink call in `setup`, ln(0.6 / 0.2) up to rounding
    fn call_score(hmm: &Hmm) -> f64 {
        let post = [0.1, 0.1, 0.2, 0.6];
        posterior_score(&post, State::EnrichedCrosslink, hmm.params.precision.min_positive())
    }

    #[test_case(3, 1 ; "within distance")]
    #[test_case(4, 1 ; "at distance")]
    #[test_case(5, 2 ; "beyond distance")]
    fn region_merging(second: usize, n_regions: usize) {
        let d = 4;
        let (data, hmm, decoded) = setup(20, &[5, 5 + second]);
        let params = OutputParams {
            dist_merge: d,
            ..OutputParams::default()
        };
        let regions = region_records(&data, &hmm, &decoded, &params);
        assert_eq!(regions.len(), n_regions);
        if n_regions == 1 {
            let r = &regions[0];
            assert_eq!(r.begin, 5 + 100 - 1);
            assert_eq!(r.end, 5 + second + 100);
            assert_eq!(r.scores.len(), 2);
            assert_abs_diff_eq!(r.score(), 2.0 * 3.0f64.ln(), epsilon = 1e-12);
            let s = call_score(&hmm);
            assert_eq!(r.name(), format!("{};{};", s, s));
        }
    }
    #[test]
    fn region_chain_merges_transitively() {
        let (data, hmm, decoded) = setup(30, &[2, 5, 8, 11, 20]);
        let params = OutputParams {
            dist_merge: 3,
            ..OutputParams::default()
        };
        let regions = region_records(&data, &hmm, &decoded, &params);
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].scores.len(), 4);
        assert_eq!(regions[1].scores.len(), 1);
        assert_eq!(regions[1].to_string().split('\t').count(), 6);
    }
    #[test]
    fn sites_only_crosslink_calls_by_default() {
        let (data, hmm, decoded) = setup(10, &[3]);
        let sites = site_records(&data, &hmm, &decoded, &OutputParams::default());
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].begin, 102);
        assert_eq!(sites[0].name, "3");
        assert_eq!(sites[0].aux, None);
        assert_abs_diff_eq!(sites[0].score.unwrap(), 3.0f64.ln(), epsilon = 1e-12);
        assert_eq!(
            sites[0].to_string(),
            format!("chr\t102\t103\t3\t{}\t+", call_score(&hmm))
        );
    }
    #[test]
    fn sites_output_all() {
        let (mut data, hmm, mut decoded) = setup(10, &[3]);
        let params = OutputParams {
            output_all: true,
            ..OutputParams::default()
        };
        let sites = site_records(&data, &hmm, &decoded, &params);
        assert_eq!(sites.len(), 10);
        assert!(sites.iter().all(|s| s.aux.is_some()));
        let aux = sites[3].aux.as_ref().unwrap();
        assert!(aux.starts_with("0;1;5;1;0.6;0;"));

        // discarded interval: name "0", score NA
        data.strands[0].intervals[0].mark_discarded();
        decoded[0][0] = None;
        let sites = site_records(&data, &hmm, &decoded, &params);
        assert_eq!(sites.len(), 10);
        assert_eq!(sites[0].name, "0");
        assert_eq!(sites[0].score, None);
        assert_eq!(sites[0].aux.as_deref(), Some("0;1;5;1;NA;0;NA;"));
        assert!(sites[0].to_string().contains("\tNA\t+\t"));
        // but no call without output_all
        assert!(site_records(&data, &hmm, &decoded, &OutputParams::default()).is_empty());
    }
    #[test]
    fn write_lines() {
        let (data, hmm, decoded) = setup(10, &[3, 4]);
        let regions = region_records(&data, &hmm, &decoded, &OutputParams::default());
        let mut buf = Vec::new();
        write_records(&mut buf, &regions).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.ends_with('\n'));
    }
}
