//! # Heredity
//!
//! Exact inference of inherited trait probabilities across a family pedigree.
//!
//! Each person carries 0, 1 or 2 copies of a trait-linked gene and either
//! shows the trait or not. Given the people whose trait status is known, the
//! engine enumerates every consistent assignment, weighs it by the inheritance
//! model (parent transmission with mutation, founder prior, trait likelihood)
//! and reports normalized per-person posteriors.
//!
//! ## Features
//!
//! - Pedigree loading from CSV/TSV files
//! - Probability tables configurable through TOML, validated at startup
//! - Sequential or multi-threaded enumeration with identical results
//! - Text, JSON, CSV and TSV reports

pub mod config;
pub mod error;
pub mod inference;
pub mod output;
pub mod parsers;
pub mod pedigree;
pub mod posterior;
pub mod types;

// Re-export key types
pub use config::ProbabilityTables;
pub use error::{ConfigError, InferenceError, PedigreeError};
pub use inference::{infer, Execution, InferenceEngine, SearchSpace};
pub use output::{ReportFormat, ReportGenerator};
pub use parsers::{DelimitedPedigreeParser, FileParser};
pub use pedigree::Pedigree;
pub use posterior::Accumulator;
pub use types::*;
