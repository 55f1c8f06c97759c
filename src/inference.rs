//! Exact inference by enumeration over the pedigree network.
//!
//! Every person contributes two variables: a gene count (conditioned on the
//! parents' gene counts, or on the prior for founders) and a trait status
//! (conditioned on the person's own gene count). The engine walks every trait
//! assignment that agrees with the evidence and every gene assignment,
//! multiplies out the joint probability of each and sums it into per-person
//! marginals.

use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::ProbabilityTables;
use crate::error::InferenceError;
use crate::pedigree::Pedigree;
use crate::posterior::Accumulator;
use crate::types::{Assignment, GeneCount, GeneDistribution, Posterior};

/// Trait sets are tracked as bitmasks
pub const MAX_INDIVIDUALS: usize = 64;

/// Leading individuals whose gene counts are fixed per parallel work unit
const PREFIX_DEPTH: usize = 4;

/// Probability that a parent with `parent` copies passes the gene on
pub fn transmission_probability(parent: GeneCount, mutation_rate: f64) -> f64 {
    match parent {
        GeneCount::Zero => mutation_rate,
        GeneCount::One => 0.5,
        GeneCount::Two => 1.0 - mutation_rate,
    }
}

/// Distribution of a child's gene count given both parents' gene counts.
///
/// Each parent independently passes on zero or one copy.
pub fn child_gene_distribution(
    mother: GeneCount,
    father: GeneCount,
    mutation_rate: f64,
) -> GeneDistribution {
    let from_mother = transmission_probability(mother, mutation_rate);
    let from_father = transmission_probability(father, mutation_rate);

    GeneDistribution {
        zero: (1.0 - from_mother) * (1.0 - from_father),
        one: from_mother * (1.0 - from_father) + (1.0 - from_mother) * from_father,
        two: from_mother * from_father,
    }
}

/// P(gene count of person `i` | parents' gene counts in `genes`)
pub fn gene_probability(
    pedigree: &Pedigree,
    tables: &ProbabilityTables,
    genes: &[GeneCount],
    i: usize,
) -> f64 {
    match pedigree.parents(i) {
        None => tables.gene_prior.get(genes[i]),
        Some((mother, father)) => {
            child_gene_distribution(genes[mother], genes[father], tables.mutation_rate)
                .get(genes[i])
        }
    }
}

/// Probability of one complete assignment of gene counts and trait statuses
pub fn joint_probability(
    pedigree: &Pedigree,
    tables: &ProbabilityTables,
    assignment: &Assignment,
) -> f64 {
    (0..pedigree.len()).fold(1.0, |joint, i| {
        let gene = assignment.genes[i];
        joint
            * gene_probability(pedigree, tables, &assignment.genes, i)
            * tables.trait_probability(gene, assignment.traits[i])
    })
}

/// Step `genes` to the next combination in base-3 order, lowest index first.
/// Returns false once every combination has been visited (and `genes` is
/// back to all zeros).
pub fn advance_genes(genes: &mut [GeneCount]) -> bool {
    for gene in genes.iter_mut() {
        match *gene {
            GeneCount::Zero => {
                *gene = GeneCount::One;
                return true;
            }
            GeneCount::One => {
                *gene = GeneCount::Two;
                return true;
            }
            GeneCount::Two => *gene = GeneCount::Zero,
        }
    }
    false
}

/// Every gene assignment over `n` individuals (3^n of them)
pub fn gene_assignments(n: usize) -> GeneAssignments {
    GeneAssignments {
        current: Some(vec![GeneCount::Zero; n]),
    }
}

pub struct GeneAssignments {
    current: Option<Vec<GeneCount>>,
}

impl Iterator for GeneAssignments {
    type Item = Vec<GeneCount>;

    fn next(&mut self) -> Option<Self::Item> {
        let out = self.current.take()?;
        let mut next = out.clone();
        if advance_genes(&mut next) {
            self.current = Some(next);
        }
        Some(out)
    }
}

/// Every trait assignment that agrees with the observed evidence.
///
/// All 2^n candidate sets are visited; a set is dropped as soon as it
/// disagrees with any person whose trait status is known.
pub fn trait_sets(pedigree: &Pedigree) -> TraitSets {
    let (known, observed) = evidence_masks(pedigree);
    let n = pedigree.len().min(MAX_INDIVIDUALS);
    TraitSets {
        n,
        next: 0,
        end: 1u128 << n,
        known,
        observed,
    }
}

pub struct TraitSets {
    n: usize,
    next: u128,
    end: u128,
    known: u64,
    observed: u64,
}

impl TraitSets {
    fn consistent(&self, mask: u64) -> bool {
        mask & self.known == self.observed
    }
}

impl Iterator for TraitSets {
    type Item = Vec<bool>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next < self.end {
            let mask = self.next as u64;
            self.next += 1;
            if self.consistent(mask) {
                return Some((0..self.n).map(|i| mask >> i & 1 == 1).collect());
            }
        }
        None
    }
}

/// Bit i of the first mask is set when person i has a known trait status;
/// bit i of the second when that status is "has trait"
fn evidence_masks(pedigree: &Pedigree) -> (u64, u64) {
    (0..pedigree.len().min(MAX_INDIVIDUALS)).fold((0, 0), |(known, observed), i| {
        match pedigree.observed(i) {
            Some(true) => (known | 1 << i, observed | 1 << i),
            Some(false) => (known | 1 << i, observed),
            None => (known, observed),
        }
    })
}

/// How enumeration steps are scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// One accumulator, steps summed in a fixed order
    #[default]
    Sequential,
    /// Work units summed into partial accumulators on the rayon pool and
    /// merged at the end
    Parallel,
}

/// Size of the enumeration for a pedigree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSpace {
    /// Trait sets that survive the evidence filter
    pub trait_sets: u128,
    /// Gene assignments visited per trait set
    pub gene_assignments: u128,
    /// Progress units reported by `run_with_progress`
    pub work_units: u64,
}

impl SearchSpace {
    pub fn steps(&self) -> u128 {
        self.trait_sets.saturating_mul(self.gene_assignments)
    }
}

/// Exact posterior computation for one pedigree and one set of tables
pub struct InferenceEngine<'a> {
    pedigree: &'a Pedigree,
    tables: ProbabilityTables,
    prefixes: Vec<Vec<GeneCount>>,
}

impl<'a> InferenceEngine<'a> {
    pub fn new(pedigree: &'a Pedigree, tables: ProbabilityTables) -> Result<Self, InferenceError> {
        tables.validate()?;
        if pedigree.len() > MAX_INDIVIDUALS {
            return Err(InferenceError::TooManyIndividuals {
                count: pedigree.len(),
                max: MAX_INDIVIDUALS,
            });
        }

        let depth = pedigree.len().min(PREFIX_DEPTH);
        let prefixes = gene_assignments(depth)
            .map(|mut prefix| {
                prefix.resize(pedigree.len(), GeneCount::Zero);
                prefix
            })
            .collect();

        Ok(Self {
            pedigree,
            tables,
            prefixes,
        })
    }

    pub fn tables(&self) -> &ProbabilityTables {
        &self.tables
    }

    pub fn search_space(&self) -> SearchSpace {
        let n = self.pedigree.len();
        let (known, _) = evidence_masks(self.pedigree);
        let free = n as u32 - known.count_ones();
        let trait_sets = 1u128 << free;
        let gene_assignments = 3u128.saturating_pow(n as u32);
        let work_units = trait_sets
            .saturating_mul(self.prefixes.len() as u128)
            .min(u64::MAX as u128) as u64;

        SearchSpace {
            trait_sets,
            gene_assignments,
            work_units,
        }
    }

    pub fn joint_probability(&self, assignment: &Assignment) -> f64 {
        joint_probability(self.pedigree, &self.tables, assignment)
    }

    pub fn run(&self, execution: Execution) -> Result<Vec<Posterior>, InferenceError> {
        self.run_with_progress(execution, || {})
    }

    /// Like `run`, calling `on_unit` after each finished work unit
    pub fn run_with_progress<F>(
        &self,
        execution: Execution,
        on_unit: F,
    ) -> Result<Vec<Posterior>, InferenceError>
    where
        F: Fn() + Sync,
    {
        let accumulator = self.accumulate(execution, on_unit);
        accumulator.normalize(self.pedigree)
    }

    /// Sum every consistent enumeration step into unnormalized marginals
    pub fn accumulate<F>(&self, execution: Execution, on_unit: F) -> Accumulator
    where
        F: Fn() + Sync,
    {
        let space = self.search_space();
        info!(
            "Enumerating {} trait sets x {} gene assignments ({:?})",
            space.trait_sets, space.gene_assignments, execution
        );

        let n = self.pedigree.len();
        let accumulator = match execution {
            Execution::Sequential => {
                let mut acc = Accumulator::new(n);
                for traits in trait_sets(self.pedigree) {
                    for prefix in &self.prefixes {
                        self.sweep(&traits, prefix, &mut acc);
                        on_unit();
                    }
                }
                acc
            }
            Execution::Parallel => trait_sets(self.pedigree)
                .flat_map(|traits| {
                    self.prefixes
                        .iter()
                        .map(move |prefix| (traits.clone(), prefix))
                })
                .par_bridge()
                .fold(
                    || Accumulator::new(n),
                    |mut acc, (traits, prefix)| {
                        self.sweep(&traits, prefix, &mut acc);
                        on_unit();
                        acc
                    },
                )
                .reduce(
                    || Accumulator::new(n),
                    |mut left, right| {
                        left.merge(right);
                        left
                    },
                ),
        };

        debug!(
            "Accumulated {} steps, total joint mass {:e}",
            accumulator.steps(),
            accumulator.total_mass()
        );
        accumulator
    }

    /// Visit every gene assignment that starts with `prefix` under one trait set
    fn sweep(&self, traits: &[bool], prefix: &[GeneCount], acc: &mut Accumulator) {
        let depth = self.pedigree.len().min(PREFIX_DEPTH);
        let mut assignment = Assignment::new(prefix.to_vec(), traits.to_vec());
        loop {
            let p = self.joint_probability(&assignment);
            acc.accumulate(&assignment, p);
            if !advance_genes(&mut assignment.genes[depth..]) {
                break;
            }
        }
    }
}

/// Posterior distributions for every person using the default schedule
pub fn infer(
    pedigree: &Pedigree,
    tables: ProbabilityTables,
) -> Result<Vec<Posterior>, InferenceError> {
    InferenceEngine::new(pedigree, tables)?.run(Execution::Sequential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Individual;

    const EPS: f64 = 1e-9;

    fn harry_potter_family() -> Pedigree {
        Pedigree::new(vec![
            Individual::child("Harry", "Lily", "James", None),
            Individual::founder("James", Some(true)),
            Individual::founder("Lily", Some(false)),
        ])
        .unwrap()
    }

    #[test]
    fn transmission_follows_parent_gene_count() {
        let m = 0.01;
        assert_eq!(transmission_probability(GeneCount::Zero, m), m);
        assert_eq!(transmission_probability(GeneCount::One, m), 0.5);
        assert_eq!(transmission_probability(GeneCount::Two, m), 1.0 - m);
    }

    #[test]
    fn child_of_two_copy_mother_and_zero_copy_father() {
        let m = 0.01;
        let dist = child_gene_distribution(GeneCount::Two, GeneCount::Zero, m);
        assert!((dist.two - (1.0 - m) * m).abs() < EPS);
        assert!((dist.zero - m * (1.0 - m)).abs() < EPS);
        assert!((dist.one - ((1.0 - m) * (1.0 - m) + m * m)).abs() < EPS);
        assert!((dist.total() - 1.0).abs() < EPS);
    }

    #[test]
    fn child_distributions_sum_to_one_for_all_parent_pairs() {
        for mother in GeneCount::ALL {
            for father in GeneCount::ALL {
                let dist = child_gene_distribution(mother, father, 0.2);
                assert!((dist.total() - 1.0).abs() < EPS);
            }
        }
    }

    #[test]
    fn child_of_heterozygous_parents_ignores_mutation() {
        let dist = child_gene_distribution(GeneCount::One, GeneCount::One, 0.3);
        assert!((dist.zero - 0.25).abs() < EPS);
        assert!((dist.one - 0.5).abs() < EPS);
        assert!((dist.two - 0.25).abs() < EPS);
    }

    #[test]
    fn joint_probability_of_known_assignment() {
        let pedigree = harry_potter_family();
        let tables = ProbabilityTables::default();
        // Harry one copy, James two copies, Lily none; only James has the trait
        let assignment = Assignment::new(
            vec![GeneCount::One, GeneCount::Two, GeneCount::Zero],
            vec![false, true, false],
        );
        let m = tables.mutation_rate;
        let harry = ((1.0 - m) * (1.0 - m) + m * m) * 0.44;
        let james = 0.01 * 0.65;
        let lily = 0.96 * 0.99;
        let expected = harry * james * lily;
        let p = joint_probability(&pedigree, &tables, &assignment);
        assert!((p - expected).abs() < 1e-15);
        assert!((p - 0.0026643247488).abs() < 1e-12);
    }

    #[test]
    fn gene_assignments_cover_every_partition() {
        let all: Vec<_> = gene_assignments(3).collect();
        assert_eq!(all.len(), 27);
        let unique: std::collections::HashSet<_> = all.iter().cloned().collect();
        assert_eq!(unique.len(), 27);
        assert_eq!(gene_assignments(0).count(), 1);
    }

    #[test]
    fn trait_sets_respect_evidence() {
        let pedigree = harry_potter_family();
        let sets: Vec<_> = trait_sets(&pedigree).collect();
        assert_eq!(sets, vec![vec![false, true, false], vec![true, true, false]]);
    }

    #[test]
    fn search_space_counts_surviving_trait_sets() {
        let pedigree = harry_potter_family();
        let engine = InferenceEngine::new(&pedigree, ProbabilityTables::default()).unwrap();
        let space = engine.search_space();
        assert_eq!(space.trait_sets, 2);
        assert_eq!(space.gene_assignments, 27);
        assert_eq!(space.steps(), 54);
        assert_eq!(space.work_units, 2 * 27);
    }

    #[test]
    fn single_founder_without_evidence_recovers_prior() {
        let pedigree = Pedigree::new(vec![Individual::founder("Ann", None)]).unwrap();
        let tables = ProbabilityTables::default();
        let posteriors = infer(&pedigree, tables).unwrap();
        let ann = &posteriors[0];

        assert!((ann.gene.zero - 0.96).abs() < EPS);
        assert!((ann.gene.one - 0.03).abs() < EPS);
        assert!((ann.gene.two - 0.01).abs() < EPS);

        let expected_trait: f64 = GeneCount::ALL
            .iter()
            .map(|&g| tables.gene_prior.get(g) * tables.trait_probability(g, true))
            .sum();
        assert!((ann.trait_.present - expected_trait).abs() < EPS);
    }

    #[test]
    fn matches_reference_posteriors() {
        let pedigree = harry_potter_family();
        let posteriors = infer(&pedigree, ProbabilityTables::default()).unwrap();

        let harry = &posteriors[0];
        assert!((harry.gene.two - 0.009183).abs() < 1e-6);
        assert!((harry.gene.one - 0.455698).abs() < 1e-6);
        assert!((harry.gene.zero - 0.535119).abs() < 1e-6);
        assert!((harry.trait_.present - 0.266511).abs() < 1e-6);

        let james = &posteriors[1];
        assert!((james.gene.two - 0.197568).abs() < 1e-6);
        assert!((james.gene.one - 0.510638).abs() < 1e-6);
        assert_eq!(james.trait_.present, 1.0);
        assert_eq!(james.trait_.absent, 0.0);

        let lily = &posteriors[2];
        assert!((lily.gene.zero - 0.982732).abs() < 1e-6);
        assert_eq!(lily.trait_.absent, 1.0);
    }

    #[test]
    fn unnormalized_mass_is_positive() {
        let pedigree = harry_potter_family();
        let engine = InferenceEngine::new(&pedigree, ProbabilityTables::default()).unwrap();
        let acc = engine.accumulate(Execution::Sequential, || {});
        assert_eq!(acc.steps(), 54);
        assert!((acc.total_mass() - 0.03181759).abs() < 1e-10);
    }

    #[test]
    fn zero_mutation_keeps_gene_out_of_zero_copy_family() {
        let pedigree = Pedigree::new(vec![
            Individual::founder("Ann", None),
            Individual::founder("Bob", None),
            Individual::child("Cat", "Ann", "Bob", None),
        ])
        .unwrap();
        let mut tables = ProbabilityTables::default().with_mutation_rate(0.0);
        tables.gene_prior.zero = 1.0;
        tables.gene_prior.one = 0.0;
        tables.gene_prior.two = 0.0;

        let posteriors = infer(&pedigree, tables).unwrap();
        assert_eq!(posteriors[2].gene.zero, 1.0);
        assert_eq!(posteriors[2].gene.one, 0.0);
        assert_eq!(posteriors[2].gene.two, 0.0);
    }

    #[test]
    fn parallel_matches_sequential() {
        let pedigree = Pedigree::new(vec![
            Individual::founder("Ann", None),
            Individual::founder("Bob", Some(true)),
            Individual::child("Cat", "Ann", "Bob", None),
            Individual::child("Dan", "Ann", "Bob", Some(false)),
            Individual::founder("Eve", None),
            Individual::child("Fay", "Cat", "Eve", None),
        ])
        .unwrap();
        let engine = InferenceEngine::new(&pedigree, ProbabilityTables::default()).unwrap();
        let sequential = engine.run(Execution::Sequential).unwrap();
        let parallel = engine.run(Execution::Parallel).unwrap();

        for (s, p) in sequential.iter().zip(&parallel) {
            assert_eq!(s.name, p.name);
            for gene in GeneCount::ALL {
                assert!((s.gene.get(gene) - p.gene.get(gene)).abs() < 1e-12);
            }
            assert!((s.trait_.present - p.trait_.present).abs() < 1e-12);
        }
    }

    #[test]
    fn progress_reports_every_work_unit() {
        use std::sync::atomic::{AtomicU64, Ordering};

        let pedigree = Pedigree::new(vec![
            Individual::founder("Ann", None),
            Individual::founder("Bob", None),
            Individual::child("Cat", "Ann", "Bob", None),
            Individual::child("Dan", "Ann", "Bob", None),
            Individual::child("Eli", "Ann", "Bob", Some(true)),
        ])
        .unwrap();
        let engine = InferenceEngine::new(&pedigree, ProbabilityTables::default()).unwrap();
        let units = AtomicU64::new(0);
        engine
            .run_with_progress(Execution::Parallel, || {
                units.fetch_add(1, Ordering::Relaxed);
            })
            .unwrap();
        assert_eq!(units.into_inner(), engine.search_space().work_units);
    }

    #[test]
    fn rejects_invalid_tables() {
        let pedigree = harry_potter_family();
        let tables = ProbabilityTables::default().with_mutation_rate(-0.1);
        assert!(matches!(
            InferenceEngine::new(&pedigree, tables),
            Err(InferenceError::Config(_))
        ));
    }

    #[test]
    fn impossible_evidence_is_degenerate() {
        let pedigree = Pedigree::new(vec![Individual::founder("Ann", Some(true))]).unwrap();
        let mut tables = ProbabilityTables::default();
        for row in [
            &mut tables.trait_likelihood.zero,
            &mut tables.trait_likelihood.one,
            &mut tables.trait_likelihood.two,
        ] {
            row.present = 0.0;
            row.absent = 1.0;
        }
        assert!(matches!(
            infer(&pedigree, tables),
            Err(InferenceError::DegenerateDistribution { .. })
        ));
    }
}
