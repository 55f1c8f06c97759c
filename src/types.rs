use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::PedigreeError;
use crate::pedigree::Pedigree;

/// Number of copies of the trait-linked allele a person carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeneCount {
    Zero,
    One,
    Two,
}

impl GeneCount {
    /// Display order used by reports: two copies first
    pub const ALL: [GeneCount; 3] = [GeneCount::Two, GeneCount::One, GeneCount::Zero];

    pub fn copies(self) -> u8 {
        match self {
            GeneCount::Zero => 0,
            GeneCount::One => 1,
            GeneCount::Two => 2,
        }
    }

    /// Position in tables indexed by copy count
    pub fn index(self) -> usize {
        self.copies() as usize
    }

    pub fn from_copies(copies: u8) -> Option<Self> {
        match copies {
            0 => Some(GeneCount::Zero),
            1 => Some(GeneCount::One),
            2 => Some(GeneCount::Two),
            _ => None,
        }
    }
}

/// A single pedigree record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Individual {
    pub name: String,
    pub mother: Option<String>,
    pub father: Option<String>,
    /// Observed trait status; `None` when unknown
    pub trait_observed: Option<bool>,
}

impl Individual {
    pub fn founder(name: &str, trait_observed: Option<bool>) -> Self {
        Self {
            name: name.to_string(),
            mother: None,
            father: None,
            trait_observed,
        }
    }

    pub fn child(name: &str, mother: &str, father: &str, trait_observed: Option<bool>) -> Self {
        Self {
            name: name.to_string(),
            mother: Some(mother.to_string()),
            father: Some(father.to_string()),
            trait_observed,
        }
    }

    pub fn is_founder(&self) -> bool {
        self.mother.is_none() && self.father.is_none()
    }
}

/// Probability mass over 0, 1 and 2 gene copies
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneDistribution {
    pub zero: f64,
    pub one: f64,
    pub two: f64,
}

impl GeneDistribution {
    pub fn get(&self, gene: GeneCount) -> f64 {
        match gene {
            GeneCount::Zero => self.zero,
            GeneCount::One => self.one,
            GeneCount::Two => self.two,
        }
    }

    pub fn add(&mut self, gene: GeneCount, mass: f64) {
        match gene {
            GeneCount::Zero => self.zero += mass,
            GeneCount::One => self.one += mass,
            GeneCount::Two => self.two += mass,
        }
    }

    pub fn total(&self) -> f64 {
        self.zero + self.one + self.two
    }

    /// Scaled copy summing to 1, or `None` when there is no mass to scale
    pub fn normalized(&self) -> Option<Self> {
        let total = self.total();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        Some(Self {
            zero: self.zero / total,
            one: self.one / total,
            two: self.two / total,
        })
    }
}

/// Probability mass over trait present / absent
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TraitDistribution {
    pub present: f64,
    pub absent: f64,
}

impl TraitDistribution {
    pub fn get(&self, has_trait: bool) -> f64 {
        if has_trait {
            self.present
        } else {
            self.absent
        }
    }

    pub fn add(&mut self, has_trait: bool, mass: f64) {
        if has_trait {
            self.present += mass;
        } else {
            self.absent += mass;
        }
    }

    pub fn total(&self) -> f64 {
        self.present + self.absent
    }

    pub fn normalized(&self) -> Option<Self> {
        let total = self.total();
        if total <= 0.0 || !total.is_finite() {
            return None;
        }
        Some(Self {
            present: self.present / total,
            absent: self.absent / total,
        })
    }
}

/// Final per-person result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posterior {
    pub name: String,
    pub gene: GeneDistribution,
    #[serde(rename = "trait")]
    pub trait_: TraitDistribution,
}

/// One fully specified enumeration step: a gene count and trait status for
/// every individual, indexed in pedigree order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub genes: Vec<GeneCount>,
    pub traits: Vec<bool>,
}

impl Assignment {
    pub fn new(genes: Vec<GeneCount>, traits: Vec<bool>) -> Self {
        debug_assert_eq!(genes.len(), traits.len());
        Self { genes, traits }
    }

    /// Build an assignment from the set-based form: everyone outside
    /// `one_gene` and `two_genes` carries zero copies, everyone outside
    /// `have_trait` lacks the trait.
    pub fn from_sets(
        pedigree: &Pedigree,
        one_gene: &HashSet<&str>,
        two_genes: &HashSet<&str>,
        have_trait: &HashSet<&str>,
    ) -> Result<Self, PedigreeError> {
        for name in one_gene.iter().chain(two_genes).chain(have_trait) {
            if pedigree.index_of(name).is_none() {
                return Err(PedigreeError::UnknownIndividual {
                    name: name.to_string(),
                });
            }
        }
        if let Some(name) = one_gene.intersection(two_genes).next() {
            return Err(PedigreeError::OverlappingGeneSets {
                name: name.to_string(),
            });
        }

        let genes = pedigree
            .names()
            .map(|name| {
                if two_genes.contains(name) {
                    GeneCount::Two
                } else if one_gene.contains(name) {
                    GeneCount::One
                } else {
                    GeneCount::Zero
                }
            })
            .collect();
        let traits = pedigree.names().map(|name| have_trait.contains(name)).collect();

        Ok(Self { genes, traits })
    }

    pub fn len(&self) -> usize {
        self.genes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }
}
