use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::ConfigError;
use crate::types::{GeneCount, GeneDistribution, TraitDistribution};

/// Allowed drift of a probability row from 1.0
pub const ROW_TOLERANCE: f64 = 1e-9;

/// Trait likelihood rows, one per gene count
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitLikelihood {
    pub zero: TraitDistribution,
    pub one: TraitDistribution,
    pub two: TraitDistribution,
}

impl TraitLikelihood {
    pub fn row(&self, gene: GeneCount) -> &TraitDistribution {
        match gene {
            GeneCount::Zero => &self.zero,
            GeneCount::One => &self.one,
            GeneCount::Two => &self.two,
        }
    }
}

/// Conditional probability tables shared by every person in the network.
///
/// Loaded once and passed into the engine; the engine never mutates them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbabilityTables {
    /// Probability that an allele flips state when passed to a child
    pub mutation_rate: f64,
    /// Gene-count distribution for founders
    pub gene_prior: GeneDistribution,
    pub trait_likelihood: TraitLikelihood,
}

impl Default for ProbabilityTables {
    fn default() -> Self {
        Self {
            mutation_rate: 0.01,
            gene_prior: GeneDistribution {
                zero: 0.96,
                one: 0.03,
                two: 0.01,
            },
            trait_likelihood: TraitLikelihood {
                zero: TraitDistribution {
                    present: 0.01,
                    absent: 0.99,
                },
                one: TraitDistribution {
                    present: 0.56,
                    absent: 0.44,
                },
                two: TraitDistribution {
                    present: 0.65,
                    absent: 0.35,
                },
            },
        }
    }
}

impl ProbabilityTables {
    pub fn with_mutation_rate(mut self, mutation_rate: f64) -> Self {
        self.mutation_rate = mutation_rate;
        self
    }

    /// P(trait = `has_trait` | gene = `gene`)
    pub fn trait_probability(&self, gene: GeneCount, has_trait: bool) -> f64 {
        self.trait_likelihood.row(gene).get(has_trait)
    }

    /// Check every entry lies in [0, 1] and every row sums to 1
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("mutation_rate", self.mutation_rate)?;

        for gene in GeneCount::ALL {
            check_range(
                &format!("gene_prior.{}", gene_key(gene)),
                self.gene_prior.get(gene),
            )?;
        }
        check_row_sum("gene_prior", self.gene_prior.total())?;

        for gene in GeneCount::ALL {
            let row = self.trait_likelihood.row(gene);
            let key = gene_key(gene);
            check_range(&format!("trait_likelihood.{}.present", key), row.present)?;
            check_range(&format!("trait_likelihood.{}.absent", key), row.absent)?;
            check_row_sum(&format!("trait_likelihood.{}", key), row.total())?;
        }

        Ok(())
    }

    /// Parse and validate tables from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let tables: Self = toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read probability tables: {}", path.display()))?;
        Self::from_toml_str(&text)
            .with_context(|| format!("Invalid probability tables in {}", path.display()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize probability tables")
    }
}

fn gene_key(gene: GeneCount) -> &'static str {
    match gene {
        GeneCount::Zero => "zero",
        GeneCount::One => "one",
        GeneCount::Two => "two",
    }
}

fn check_range(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field: field.to_string(),
            value,
        })
    }
}

fn check_row_sum(row: &str, sum: f64) -> Result<(), ConfigError> {
    if (sum - 1.0).abs() <= ROW_TOLERANCE {
        Ok(())
    } else {
        Err(ConfigError::RowSum {
            row: row.to_string(),
            sum,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tables_are_valid() {
        ProbabilityTables::default().validate().unwrap();
    }

    #[test]
    fn rejects_prior_not_summing_to_one() {
        let mut tables = ProbabilityTables::default();
        tables.gene_prior.zero = 0.5;
        assert!(matches!(
            tables.validate(),
            Err(ConfigError::RowSum { ref row, .. }) if row == "gene_prior"
        ));
    }

    #[test]
    fn rejects_out_of_range_mutation_rate() {
        let tables = ProbabilityTables::default().with_mutation_rate(1.5);
        assert!(matches!(
            tables.validate(),
            Err(ConfigError::OutOfRange { ref field, .. }) if field == "mutation_rate"
        ));
    }

    #[test]
    fn zero_mutation_rate_is_allowed() {
        ProbabilityTables::default()
            .with_mutation_rate(0.0)
            .validate()
            .unwrap();
    }

    #[test]
    fn parses_toml_tables() {
        let text = r#"
mutation_rate = 0.05

[gene_prior]
zero = 0.5
one = 0.25
two = 0.25

[trait_likelihood.zero]
present = 0.1
absent = 0.9

[trait_likelihood.one]
present = 0.5
absent = 0.5

[trait_likelihood.two]
present = 0.9
absent = 0.1
"#;
        let tables = ProbabilityTables::from_toml_str(text).unwrap();
        assert_eq!(tables.mutation_rate, 0.05);
        assert_eq!(tables.gene_prior.one, 0.25);
        assert_eq!(tables.trait_probability(GeneCount::Two, true), 0.9);
    }

    #[test]
    fn toml_round_trip_keeps_default_tables() {
        let text = ProbabilityTables::default().to_toml_string().unwrap();
        let parsed = ProbabilityTables::from_toml_str(&text).unwrap();
        assert_eq!(parsed, ProbabilityTables::default());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(
            ProbabilityTables::from_toml_str("mutation_rate = \"high\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
