pub mod dataset;
pub mod density;
pub mod distribution;
pub mod em;
pub mod error;
pub mod hmm;
pub mod io;
pub mod pipeline;
pub mod prob;
pub mod utils;

#[macro_use]
extern crate approx;
