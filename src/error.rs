//! Error types for pedigree loading, probability tables and inference.
//!
//! Parsers and report writers work with `anyhow` and attach file context;
//! the variants below are the conditions callers may want to match on.

use thiserror::Error;

/// A pedigree that breaks the founder / parent-resolution invariants.
#[derive(Debug, Error, PartialEq)]
pub enum PedigreeError {
    #[error("Pedigree contains no individuals")]
    Empty,

    #[error("Individual name cannot be empty")]
    EmptyName,

    #[error("Individual '{name}' is listed more than once")]
    DuplicateIndividual { name: String },

    #[error("Individual '{name}' has a {present} but no {missing}; parents must be both present or both absent")]
    HalfSpecifiedParents {
        name: String,
        present: &'static str,
        missing: &'static str,
    },

    #[error("Individual '{name}' references unknown {role} '{parent}'")]
    UnknownParent {
        name: String,
        role: &'static str,
        parent: String,
    },

    #[error("Individual '{name}' is listed as their own parent")]
    SelfParent { name: String },

    #[error("Unknown individual '{name}' in assignment")]
    UnknownIndividual { name: String },

    #[error("Individual '{name}' is assigned both one and two gene copies")]
    OverlappingGeneSets { name: String },
}

/// A probability table that cannot describe a valid network.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Probability {field} = {value} is outside [0.0, 1.0]")]
    OutOfRange { field: String, value: f64 },

    #[error("Probabilities in {row} sum to {sum}, expected 1.0")]
    RowSum { row: String, sum: f64 },

    #[error("Failed to parse probability tables: {0}")]
    Parse(String),
}

/// Failures raised while building or running the inference engine.
#[derive(Debug, Error, PartialEq)]
pub enum InferenceError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Pedigree has {count} individuals; at most {max} are supported")]
    TooManyIndividuals { count: usize, max: usize },

    #[error("{field} distribution of '{individual}' has zero total mass")]
    DegenerateDistribution {
        individual: String,
        field: &'static str,
    },
}
