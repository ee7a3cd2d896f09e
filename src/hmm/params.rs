//!
//! HmmParams: training/decoding configuration of the HMM engine
//!
use serde::{Deserialize, Serialize};

///
/// Floating-point floor used for transition probabilities and for the
/// denominator of posterior ratio scores.
///
/// * `Standard`: smallest positive normal `f64`
/// * `Extended`: smallest positive subnormal `f64`
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    Standard,
    Extended,
}

impl Precision {
    pub fn min_positive(self) -> f64 {
        match self {
            Precision::Standard => f64::MIN_POSITIVE,
            Precision::Extended => f64::from_bits(1),
        }
    }
    pub fn is_extended(self) -> bool {
        self == Precision::Extended
    }
}

///
/// HmmParams
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HmmParams {
    ///
    /// maximum number of Baum-Welch iterations
    pub max_iter: usize,
    ///
    /// tolerance of density parameter changes for convergence
    pub conv_tol: f64,
    ///
    /// transitions `2->2` and `2->3` are learned only from positions whose
    /// estimated trials are at least this value. Disabled if `<= 0`.
    pub n_threshold_for_trans_p: f64,
    ///
    /// lower bound of the `2->3` transition probability
    pub min_trans_prob_cs: f64,
    ///
    /// maximum number of reseedings of the coverage densities
    pub max_reseeds: usize,
    pub precision: Precision,
    ///
    /// coverage densities are evaluated only at or above this coverage
    pub coverage_threshold: f64,
    /// shape bounds of the non-enriched coverage density
    pub bg_shape_min: f64,
    pub bg_shape_max: f64,
    /// shape bounds of the enriched coverage density
    pub fg_shape_min: f64,
    pub fg_shape_max: f64,
    ///
    /// force the enriched shape to be at least the non-enriched shape
    pub bg_shape_le_fg_shape: bool,
    ///
    /// lower bound of the coverage regression covariate
    pub min_covariate_to_fit: f64,
}

impl Default for HmmParams {
    fn default() -> Self {
        HmmParams {
            max_iter: 50,
            conv_tol: 1e-4,
            n_threshold_for_trans_p: 0.0,
            min_trans_prob_cs: 1e-4,
            max_reseeds: 10,
            precision: Precision::Standard,
            coverage_threshold: 1e-3,
            bg_shape_min: 0.5,
            bg_shape_max: 1.0,
            fg_shape_min: 1.0,
            fg_shape_max: 1.5,
            bg_shape_le_fg_shape: false,
            min_covariate_to_fit: 1e-4,
        }
    }
}

impl HmmParams {
    pub fn from_json_file<P: AsRef<std::path::Path>>(path: P) -> crate::error::Result<Self> {
        let file = std::fs::File::open(path)?;
        let params = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(params)
    }
    /// `use_restricted_trans` = threshold-restricted `2->2/3` statistics are on
    pub fn use_restricted_trans(&self) -> bool {
        self.n_threshold_for_trans_p > 0.0
    }
}

impl std::fmt::Display for HmmParams {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "max_iter: {}", self.max_iter)?;
        writeln!(f, "conv_tol: {}", self.conv_tol)?;
        writeln!(f, "n_threshold_for_trans_p: {}", self.n_threshold_for_trans_p)?;
        writeln!(f, "min_trans_prob_cs: {}", self.min_trans_prob_cs)?;
        writeln!(f, "max_reseeds: {}", self.max_reseeds)?;
        writeln!(f, "precision: {:?}", self.precision)?;
        writeln!(f, "coverage_threshold: {}", self.coverage_threshold)?;
        writeln!(f, "bg_shape: [{}, {}]", self.bg_shape_min, self.bg_shape_max)?;
        writeln!(f, "fg_shape: [{}, {}]", self.fg_shape_min, self.fg_shape_max)?;
        writeln!(f, "bg_shape_le_fg_shape: {}", self.bg_shape_le_fg_shape)?;
        write!(f, "min_covariate_to_fit: {}", self.min_covariate_to_fit)
    }
}
