use std::collections::HashMap;
use tracing::debug;

use crate::error::PedigreeError;
use crate::types::Individual;

/// Validated family tree with parent references resolved to indices.
///
/// Individuals keep their input order, which is also the order results are
/// reported in. Parents are either both absent (founder) or both present and
/// resolvable. Ancestry cycles longer than self-parenting are not detected.
#[derive(Debug, Clone)]
pub struct Pedigree {
    individuals: Vec<Individual>,
    index: HashMap<String, usize>,
    parents: Vec<Option<(usize, usize)>>,
}

impl Pedigree {
    pub fn new(individuals: Vec<Individual>) -> Result<Self, PedigreeError> {
        if individuals.is_empty() {
            return Err(PedigreeError::Empty);
        }

        let mut index = HashMap::with_capacity(individuals.len());
        for (i, person) in individuals.iter().enumerate() {
            if person.name.trim().is_empty() {
                return Err(PedigreeError::EmptyName);
            }
            if index.insert(person.name.clone(), i).is_some() {
                return Err(PedigreeError::DuplicateIndividual {
                    name: person.name.clone(),
                });
            }
        }

        let parents = individuals
            .iter()
            .map(|person| Self::resolve_parents(person, &index))
            .collect::<Result<Vec<_>, _>>()?;

        let founders = parents.iter().filter(|p| p.is_none()).count();
        debug!(
            "Pedigree resolved: {} individuals, {} founders",
            individuals.len(),
            founders
        );

        Ok(Self {
            individuals,
            index,
            parents,
        })
    }

    fn resolve_parents(
        person: &Individual,
        index: &HashMap<String, usize>,
    ) -> Result<Option<(usize, usize)>, PedigreeError> {
        let (mother, father) = match (&person.mother, &person.father) {
            (None, None) => return Ok(None),
            (Some(mother), Some(father)) => (mother, father),
            (Some(_), None) => {
                return Err(PedigreeError::HalfSpecifiedParents {
                    name: person.name.clone(),
                    present: "mother",
                    missing: "father",
                })
            }
            (None, Some(_)) => {
                return Err(PedigreeError::HalfSpecifiedParents {
                    name: person.name.clone(),
                    present: "father",
                    missing: "mother",
                })
            }
        };

        let lookup = |parent: &String, role: &'static str| {
            if *parent == person.name {
                return Err(PedigreeError::SelfParent {
                    name: person.name.clone(),
                });
            }
            index
                .get(parent)
                .copied()
                .ok_or_else(|| PedigreeError::UnknownParent {
                    name: person.name.clone(),
                    role,
                    parent: parent.clone(),
                })
        };

        Ok(Some((lookup(mother, "mother")?, lookup(father, "father")?)))
    }

    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    pub fn individuals(&self) -> &[Individual] {
        &self.individuals
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.individuals.iter().map(|p| p.name.as_str())
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// `(mother, father)` indices, or `None` for a founder
    pub fn parents(&self, i: usize) -> Option<(usize, usize)> {
        self.parents[i]
    }

    pub fn observed(&self, i: usize) -> Option<bool> {
        self.individuals[i].trait_observed
    }
}
