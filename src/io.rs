pub mod bed;

pub use bed::{region_records, site_records, write_records, RegionRecord, SiteRecord};

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;

///
/// Options of the site and region records
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputParams {
    ///
    /// emit every position with a truncation, not only crosslink calls
    pub output_all: bool,
    ///
    /// report the truncation site itself instead of the crosslink site one
    /// nucleotide upstream
    pub crosslink_at_trunc_site: bool,
    ///
    /// crosslink calls at most this many positions apart are merged into a
    /// region
    pub dist_merge: usize,
}

impl Default for OutputParams {
    fn default() -> Self {
        OutputParams {
            output_all: false,
            crosslink_at_trunc_site: false,
            dist_merge: 8,
        }
    }
}

///
/// buffered writer of a newly created file
///
pub fn create_file(filename: &str) -> std::io::Result<BufWriter<File>> {
    Ok(BufWriter::new(File::create(filename)?))
}
