//!
//! Error types of the HMM engine and its collaborators
//!
use crate::dataset::Strand;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HmmError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// malformed dataset (length mismatch, empty interval)
    #[error("invalid data: {message}")]
    InvalidData { message: String },

    /// an emission probability became 0.0 for every state while training
    #[error(
        "emission probability became 0.0 in {n_intervals} interval(s) (first: interval {interval} on {strand} strand). \
         This might be due to artifacts or outliers; try extended floating-point precision mode"
    )]
    EmissionInvalid {
        strand: Strand,
        interval: usize,
        n_intervals: usize,
    },

    /// infinite or out-of-range value in forward/backward/posterior
    #[error("numeric instability in {stage} at {strand} strand interval {interval} position {t}: {detail}")]
    NumericInstability {
        stage: &'static str,
        strand: Strand,
        interval: usize,
        t: usize,
        detail: String,
    },

    /// ordering constraint between background and foreground densities
    /// could not be satisfied within the reseeding budget
    #[error("could not learn {family} parameters, exceeded max. number of reseedings ({max_reseeds})")]
    ReseedLimit {
        family: &'static str,
        max_reseeds: usize,
    },

    /// density fitting had no usable data
    #[error("could not update {family} parameters: {message}")]
    Fit {
        family: &'static str,
        message: String,
    },
}

impl HmmError {
    pub fn invalid_data(message: impl Into<String>) -> Self {
        HmmError::InvalidData {
            message: message.into(),
        }
    }
    pub fn fit(family: &'static str, message: impl Into<String>) -> Self {
        HmmError::Fit {
            family,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, HmmError>;
