//! Genetic-distance-aware HMM smoothing of local ancestry calls.
//!
//! Upstream, a window classifier assigns every sample an ancestry label in
//! each of `W` windows of consecutive SNPs, along with an estimated success
//! rate per window. Those calls are noisy and independent, while true
//! ancestry tracts are long blocks broken only by historical recombination.
//! This crate corrects the calls with a hidden Markov model whose transitions
//! come from the genetic distance between windows and the number of
//! generations since admixture, and whose emissions come from the
//! classifier's success rates.
//!
//! The pieces, in the order they are used:
//!
//!  - [`GeneticMap`]: physical-to-genetic (cM) position lookup.
//!  - [`windows`]: recovering window genetic positions from SNP positions.
//!  - [`model`]: transition and emission matrix stacks.
//!  - [`HmmEngine`]: forward-backward posteriors and MAP calls for one sample.
//!  - [`HmmFilter`]: all of the above over a `W x S` call matrix, with samples
//!    run in parallel.
//!
//! ```no_run
//! use ancestry_hmm::prelude::*;
//!
//! let config = FilterConfig::new(10.0, 3);
//! let filter = HmmFilter::from_genetic_map_file("genetic_map_chr22_b36.txt", config)
//!                  .expect("cannot read genetic map");
//!
//! let snps = read_positions("snp_positions.txt").expect("cannot read positions");
//! let success = read_success_rates("success_rate.txt").expect("cannot read success rates");
//! let raw = read_calls("raw_calls.tsv").expect("cannot read calls");
//!
//! let smoothed = filter.filter(&snps, &success, raw.view()).expect("smoothing failed");
//! write_calls(&smoothed.calls, Some("smoothed_calls.tsv")).expect("cannot write calls");
//! ```

pub mod config;
pub mod error;
pub mod file;
pub mod filter;
pub mod genetic_map;
pub mod hmm;
pub mod matrices;
pub mod model;
mod numeric;
pub mod windows;

pub use config::{FilterConfig, InitialBelief};
pub use error::AncestryError;
pub use filter::{CallFilter, HmmFilter, SmoothedCalls};
pub use genetic_map::{GeneticMap, Position};
pub use hmm::{HmmEngine, Inference};

pub mod prelude {
    pub use crate::config::{FilterConfig, InitialBelief};
    pub use crate::error::AncestryError;
    pub use crate::filter::{CallFilter, HmmFilter, SmoothedCalls};
    pub use crate::genetic_map::{GeneticMap, Position};
    pub use crate::hmm::{HmmEngine, Inference};
    pub use crate::matrices::{
        read_calls, read_positions, read_success_rates, write_calls, write_posteriors,
    };
}
