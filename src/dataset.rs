//!
//! Observation dataset
//!
//! * `Position`: observations at a single position of a strand
//! * `Interval`: a run of consecutive positions (the unit of parallelism)
//! * `StrandData`: intervals of a strand with their starting offsets
//! * `Dataset`: forward and reverse `StrandData` of a contig
//!
use crate::error::{HmmError, Result};
use derive_new::new;
use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

///
/// Strand of the interval
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strand {
    Forward,
    Reverse,
}

impl Strand {
    pub const BOTH: [Strand; 2] = [Strand::Forward, Strand::Reverse];
    pub fn index(self) -> usize {
        match self {
            Strand::Forward => 0,
            Strand::Reverse => 1,
        }
    }
    pub fn from_index(s: usize) -> Strand {
        if s == 0 {
            Strand::Forward
        } else {
            Strand::Reverse
        }
    }
    /// `+` or `-`
    pub fn to_char(self) -> char {
        match self {
            Strand::Forward => '+',
            Strand::Reverse => '-',
        }
    }
}

impl std::fmt::Display for Strand {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Strand::Forward => write!(f, "forward"),
            Strand::Reverse => write!(f, "reverse"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, new)]
pub struct Motif {
    pub id: usize,
    pub score: f64,
}

///
/// Observations at a position.
///
/// * `coverage`: fragment coverage estimate (KDE)
/// * `trunc_count`: number of read truncations (read starts)
/// * `n_trials`: estimated number of trials of `trunc_count`
/// * `covariate`: input signal used by the coverage regression
/// * `motif`: motif hit used by the crosslink regression
///
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, new)]
pub struct Position {
    pub coverage: f64,
    pub trunc_count: u32,
    pub n_trials: f64,
    #[new(default)]
    #[serde(default)]
    pub covariate: Option<f64>,
    #[new(default)]
    #[serde(default)]
    pub motif: Option<Motif>,
}

impl Position {
    pub fn with_covariate(mut self, covariate: f64) -> Self {
        self.covariate = Some(covariate);
        self
    }
    pub fn with_motif(mut self, id: usize, score: f64) -> Self {
        self.motif = Some(Motif::new(id, score));
        self
    }
}

///
/// Consecutive positions on a strand.
///
/// Once discarded, an interval stays discarded.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    positions: Vec<Position>,
    #[serde(default)]
    discard: bool,
}

impl Interval {
    pub fn new(positions: Vec<Position>) -> Self {
        Interval {
            positions,
            discard: false,
        }
    }
    pub fn len(&self) -> usize {
        self.positions.len()
    }
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
    pub fn positions(&self) -> &[Position] {
        &self.positions
    }
    pub fn is_discarded(&self) -> bool {
        self.discard
    }
    pub fn mark_discarded(&mut self) {
        self.discard = true;
    }
}

impl std::ops::Index<usize> for Interval {
    type Output = Position;
    fn index(&self, t: usize) -> &Position {
        &self.positions[t]
    }
}

///
/// Intervals of a strand, with the starting offset of each interval.
///
/// Offsets of the reverse strand are positions on the reversed contig.
///
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrandData {
    pub intervals: Vec<Interval>,
    pub offsets: Vec<usize>,
}

impl StrandData {
    pub fn new(intervals: Vec<Interval>, offsets: Vec<usize>) -> Result<Self> {
        let s = StrandData { intervals, offsets };
        s.validate()?;
        Ok(s)
    }
    pub fn len(&self) -> usize {
        self.intervals.len()
    }
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
    fn validate(&self) -> Result<()> {
        if self.intervals.len() != self.offsets.len() {
            return Err(HmmError::invalid_data(format!(
                "{} intervals but {} offsets",
                self.intervals.len(),
                self.offsets.len()
            )));
        }
        if let Some(i) = self.intervals.iter().position(|x| x.is_empty()) {
            return Err(HmmError::invalid_data(format!("interval {} is empty", i)));
        }
        Ok(())
    }
}

///
/// Observations of both strands of a contig.
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub contig: String,
    pub contig_len: usize,
    pub strands: [StrandData; 2],
}

impl Dataset {
    pub fn new(
        contig: impl Into<String>,
        contig_len: usize,
        forward: StrandData,
        reverse: StrandData,
    ) -> Result<Self> {
        let d = Dataset {
            contig: contig.into(),
            contig_len,
            strands: [forward, reverse],
        };
        d.validate()?;
        Ok(d)
    }
    pub fn validate(&self) -> Result<()> {
        for s in self.strands.iter() {
            s.validate()?;
        }
        Ok(())
    }
    pub fn strand(&self, strand: Strand) -> &StrandData {
        &self.strands[strand.index()]
    }
    pub fn interval(&self, strand: Strand, i: usize) -> &Interval {
        &self.strands[strand.index()].intervals[i]
    }
    pub fn n_intervals(&self) -> usize {
        self.strands.iter().map(|s| s.len()).sum()
    }
    pub fn n_positions(&self) -> usize {
        self.strands
            .iter()
            .flat_map(|s| s.intervals.iter())
            .map(|x| x.len())
            .sum()
    }
    pub fn n_discarded(&self) -> usize {
        self.strands
            .iter()
            .flat_map(|s| s.intervals.iter())
            .filter(|x| x.is_discarded())
            .count()
    }
    ///
    /// iterate over all non-discarded positions
    ///
    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.strands
            .iter()
            .flat_map(|s| s.intervals.iter())
            .filter(|x| !x.is_discarded())
            .flat_map(|x| x.positions().iter())
    }
    ///
    /// half-open genomic range `[begin, end)` of the interval in forward
    /// strand coordinates
    ///
    pub fn genomic_range(&self, strand: Strand, i: usize) -> (usize, usize) {
        let offset = self.strands[strand.index()].offsets[i];
        let len = self.interval(strand, i).len();
        match strand {
            Strand::Forward => (offset, offset + len),
            Strand::Reverse => {
                let begin = self.contig_len.saturating_sub(offset + 1);
                (begin, begin + len)
            }
        }
    }
    pub fn to_json_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path.as_ref())?;
        let writer = std::io::BufWriter::new(file);
        if path.as_ref().extension().is_some_and(|ext| ext == "gz") {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            serde_json::to_writer(&mut encoder, self)?;
            encoder.finish()?;
        } else {
            serde_json::to_writer(writer, self)?;
        }
        Ok(())
    }
    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let reader = std::io::BufReader::new(file);
        let dataset: Dataset = if path.as_ref().extension().is_some_and(|ext| ext == "gz") {
            let decoder = GzDecoder::new(reader);
            serde_json::from_reader(std::io::BufReader::new(decoder))?
        } else {
            serde_json::from_reader(reader)?
        };
        dataset.validate()?;
        Ok(dataset)
    }
}
