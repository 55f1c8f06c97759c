use crate::error::InferenceError;
use crate::pedigree::Pedigree;
use crate::types::{Assignment, GeneDistribution, Posterior, TraitDistribution};

/// Running, unnormalized marginals for every person in a pedigree.
///
/// Starts at zero, receives one `accumulate` call per enumeration step and
/// is turned into distributions exactly once by `normalize`.
#[derive(Debug, Clone)]
pub struct Accumulator {
    genes: Vec<GeneDistribution>,
    traits: Vec<TraitDistribution>,
    total_mass: f64,
    steps: u64,
}

impl Accumulator {
    pub fn new(individuals: usize) -> Self {
        Self {
            genes: vec![GeneDistribution::default(); individuals],
            traits: vec![TraitDistribution::default(); individuals],
            total_mass: 0.0,
            steps: 0,
        }
    }

    /// Add `probability` to each person's entries for the values they take
    /// in `assignment`
    pub fn accumulate(&mut self, assignment: &Assignment, probability: f64) {
        debug_assert_eq!(assignment.len(), self.genes.len());
        for (i, (&gene, &has_trait)) in assignment
            .genes
            .iter()
            .zip(&assignment.traits)
            .enumerate()
        {
            self.genes[i].add(gene, probability);
            self.traits[i].add(has_trait, probability);
        }
        self.total_mass += probability;
        self.steps += 1;
    }

    /// Fold a partial accumulator built over a disjoint set of steps into this one
    pub fn merge(&mut self, other: Accumulator) {
        for (mine, theirs) in self.genes.iter_mut().zip(other.genes) {
            mine.zero += theirs.zero;
            mine.one += theirs.one;
            mine.two += theirs.two;
        }
        for (mine, theirs) in self.traits.iter_mut().zip(other.traits) {
            mine.present += theirs.present;
            mine.absent += theirs.absent;
        }
        self.total_mass += other.total_mass;
        self.steps += other.steps;
    }

    /// Sum of every joint probability seen so far
    pub fn total_mass(&self) -> f64 {
        self.total_mass
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn gene(&self, i: usize) -> &GeneDistribution {
        &self.genes[i]
    }

    pub fn trait_(&self, i: usize) -> &TraitDistribution {
        &self.traits[i]
    }

    /// Scale each mapping of each person to sum to 1
    pub fn normalize(self, pedigree: &Pedigree) -> Result<Vec<Posterior>, InferenceError> {
        pedigree
            .names()
            .zip(self.genes.into_iter().zip(self.traits))
            .map(|(name, (gene, trait_))| -> Result<Posterior, InferenceError> {
                let degenerate = |field| InferenceError::DegenerateDistribution {
                    individual: name.to_string(),
                    field,
                };
                Ok(Posterior {
                    name: name.to_string(),
                    gene: gene.normalized().ok_or_else(|| degenerate("gene"))?,
                    trait_: trait_.normalized().ok_or_else(|| degenerate("trait"))?,
                })
            })
            .collect()
    }
}
