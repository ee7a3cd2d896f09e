use clap::Parser;
use xlhmm::{
    dataset::Dataset,
    density::{CountDensity, CoverageDensity, Gamma, GammaReg, ZtBinomial, ZtBinomialReg},
    error::Result,
    hmm::params::{HmmParams, Precision},
    io::{create_file, write_records, OutputParams},
    pipeline::{run, Decoder},
    utils::timer,
};

#[derive(Parser, Debug)]
#[clap(about = "Crosslink site detection with a four-state enrichment/crosslink HMM")]
struct Opts {
    /// precomputed observations (.json or .json.gz)
    #[clap(long)]
    dataset_json: std::path::PathBuf,
    /// HmmParams json. Command line flags override its values
    #[clap(long)]
    params_json: Option<std::path::PathBuf>,
    #[clap(long)]
    sites_bed: String,
    #[clap(long)]
    regions_bed: Option<String>,
    #[clap(long)]
    max_iter: Option<usize>,
    /// number of worker threads (all cores if omitted)
    #[clap(long)]
    threads: Option<usize>,
    /// use the smallest subnormal instead of the smallest normal as floor
    #[clap(long)]
    high_precision: bool,
    /// crosslink calls at most this many positions apart are merged
    #[clap(long, default_value_t = 8)]
    dist_merge: usize,
    #[clap(long)]
    output_all: bool,
    #[clap(long)]
    crosslink_at_trunc_site: bool,
    /// viterbi or posterior
    #[clap(long, default_value = "viterbi")]
    decoder: Decoder,
    /// coverage mean depends on the covariate of each position
    #[clap(long)]
    coverage_covariate: bool,
    /// crosslink probability depends on the motif score of each position
    #[clap(long)]
    motif_covariate: bool,
    #[clap(long)]
    progress: bool,
}

fn run_and_write<C: CoverageDensity, B: CountDensity>(
    data: &mut Dataset,
    params: HmmParams,
    output: &OutputParams,
    opts: &Opts,
) -> Result<()> {
    let out = run::<C, B>(data, params, output, opts.decoder, opts.progress)?;
    println!("# coverage_training={}", out.coverage_summary);
    println!("# crosslink_training={}", out.crosslink_summary);
    println!("# n_discarded={}", out.n_discarded);
    println!("# transition_matrix=\n{}", out.hmm.trans);
    println!("# densities=\n{}", out.densities);

    let mut file = create_file(&opts.sites_bed)?;
    write_records(&mut file, &out.sites)?;
    if let Some(filename) = &opts.regions_bed {
        let mut file = create_file(filename)?;
        write_records(&mut file, &out.regions)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let opts: Opts = Opts::parse();
    println!("# started_at={}", chrono::Local::now());
    println!("# opts={:?}", opts);

    if let Some(n) = opts.threads {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            log::warn!("could not set the number of threads: {}", e);
        }
    }

    let mut params = match &opts.params_json {
        Some(path) => HmmParams::from_json_file(path)?,
        None => HmmParams::default(),
    };
    if let Some(max_iter) = opts.max_iter {
        params.max_iter = max_iter;
    }
    if opts.high_precision {
        params.precision = Precision::Extended;
    }
    println!("# params=\n{}", params);
    let output = OutputParams {
        output_all: opts.output_all,
        crosslink_at_trunc_site: opts.crosslink_at_trunc_site,
        dist_merge: opts.dist_merge,
    };

    let mut data = Dataset::from_json_file(&opts.dataset_json)?;
    let (result, elapsed) = timer(|| match (opts.coverage_covariate, opts.motif_covariate) {
        (false, false) => run_and_write::<Gamma, ZtBinomial>(&mut data, params, &output, &opts),
        (true, false) => run_and_write::<GammaReg, ZtBinomial>(&mut data, params, &output, &opts),
        (false, true) => run_and_write::<Gamma, ZtBinomialReg>(&mut data, params, &output, &opts),
        (true, true) => run_and_write::<GammaReg, ZtBinomialReg>(&mut data, params, &output, &opts),
    });
    result?;
    println!("# elapsed={}ms", elapsed);
    println!("# finished_at={}", chrono::Local::now());
    Ok(())
}
