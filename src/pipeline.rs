//!
//! Training and decoding of a dataset, from the observations to the site
//! and region records
//!
use crate::dataset::Dataset;
use crate::density::{CountDensity, CoverageDensity, Densities};
use crate::em::{EmSummary, LearnTarget};
use crate::error::Result;
use crate::hmm::decode::remove_border_artifacts;
use crate::hmm::params::HmmParams;
use crate::hmm::{DecodedStates, Hmm};
use crate::io::{region_records, site_records, OutputParams, RegionRecord, SiteRecord};
use log::info;
use serde::{Deserialize, Serialize};

///
/// Decoding method
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decoder {
    Viterbi,
    Posterior,
}

impl std::str::FromStr for Decoder {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "viterbi" => Ok(Decoder::Viterbi),
            "posterior" => Ok(Decoder::Posterior),
            _ => Err(format!("unknown decoder '{}' (viterbi or posterior)", s)),
        }
    }
}

///
/// Result of `run`
///
#[derive(Debug, Clone)]
pub struct RunOutput<C: CoverageDensity, B: CountDensity> {
    pub hmm: Hmm,
    pub densities: Densities<C, B>,
    pub decoded: DecodedStates,
    pub coverage_summary: EmSummary,
    pub crosslink_summary: EmSummary,
    pub n_discarded: usize,
    pub sites: Vec<SiteRecord>,
    pub regions: Vec<RegionRecord>,
}

///
/// Full run on a dataset
///
/// 1. seed both density pairs from the observations
/// 2. Baum-Welch on the coverage densities, then on the count densities
/// 3. apply the trained parameters (discarding invalid intervals)
/// 4. decode and remove border artifacts
/// 5. build the site and region records
///
pub fn run<C: CoverageDensity, B: CountDensity>(
    data: &mut Dataset,
    params: HmmParams,
    output: &OutputParams,
    decoder: Decoder,
    show_progress: bool,
) -> Result<RunOutput<C, B>> {
    info!(
        "{}: {} intervals, {} positions",
        data.contig,
        data.n_intervals(),
        data.n_positions()
    );
    let mut densities: Densities<C, B> = Densities::from_data(data, &params)?;
    info!("initial densities:\n{}", densities);
    let mut hmm = Hmm::new(data, params);

    let coverage_summary =
        hmm.baum_welch(data, &mut densities, LearnTarget::Coverage, show_progress)?;
    let crosslink_summary =
        hmm.baum_welch(data, &mut densities, LearnTarget::Crosslink, show_progress)?;

    let n_invalid = hmm.apply_parameters(data, &densities)?;
    if n_invalid > 0 {
        info!("{} interval(s) discarded while decoding", n_invalid);
    }

    let mut decoded = match decoder {
        Decoder::Viterbi => {
            let (decoded, p) = hmm.viterbi(data);
            info!("viterbi log probability: {}", p);
            decoded
        }
        Decoder::Posterior => hmm.posterior_decoding(data),
    };
    let n_changed = remove_border_artifacts(&mut decoded, data, &densities);
    if n_changed > 0 {
        info!("{} enriched position(s) below the predicted coverage were downgraded", n_changed);
    }

    let sites = site_records(data, &hmm, &decoded, output);
    let regions = region_records(data, &hmm, &decoded, output);
    info!("{} sites, {} regions", sites.len(), regions.len());

    Ok(RunOutput {
        hmm,
        densities,
        decoded,
        coverage_summary,
        crosslink_summary,
        n_discarded: data.n_discarded(),
        sites,
        regions,
    })
}
