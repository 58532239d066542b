//! Seed compounds: what a network must take up from its environment.
//!
//! A strongly-connected component is a seed group when no edge enters it
//! from outside, i.e. it is a source of the condensation DAG. Groups are
//! numbered in the order Tarjan's algorithm yields components, which is
//! stable for a given graph.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::network::MetabolicNetwork;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedAnnotation {
    pub seed: bool,
    pub group: Option<usize>,
}

impl SeedAnnotation {
    pub fn seed(group: usize) -> Self {
        Self {
            seed: true,
            group: Some(group),
        }
    }

    pub fn non_seed() -> Self {
        Self {
            seed: false,
            group: None,
        }
    }
}

pub type SeedAnnotations = BTreeMap<String, SeedAnnotation>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedSets {
    groups: BTreeMap<usize, BTreeSet<String>>,
}

impl SeedSets {
    /// Rebuilds groups from stored per-compound annotations.
    pub fn from_annotations(annotations: &SeedAnnotations) -> Self {
        let mut sets = Self::default();
        for (compound, annotation) in annotations {
            if let (true, Some(group)) = (annotation.seed, annotation.group) {
                sets.groups
                    .entry(group)
                    .or_default()
                    .insert(compound.clone());
            }
        }
        sets
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, group: usize) -> Option<&BTreeSet<String>> {
        self.groups.get(&group)
    }

    pub fn groups(&self) -> impl Iterator<Item = (usize, &BTreeSet<String>)> + '_ {
        self.groups.iter().map(|(group, members)| (*group, members))
    }

    pub fn members(&self) -> impl Iterator<Item = &BTreeSet<String>> + '_ {
        self.groups.values()
    }

    /// Union of every group.
    pub fn all_seeds(&self) -> BTreeSet<String> {
        self.groups.values().flatten().cloned().collect()
    }

    pub fn group_of(&self, compound: &str) -> Option<usize> {
        self.groups
            .iter()
            .find(|(_, members)| members.contains(compound))
            .map(|(group, _)| *group)
    }
}

/// A network together with the seed side table computed for it.
#[derive(Debug, Clone)]
pub struct AnnotatedNetwork {
    pub network: MetabolicNetwork,
    pub annotations: SeedAnnotations,
}

impl AnnotatedNetwork {
    pub fn annotation(&self, compound: &str) -> Option<&SeedAnnotation> {
        self.annotations.get(compound)
    }

    pub fn seed_sets(&self) -> SeedSets {
        SeedSets::from_annotations(&self.annotations)
    }
}

/// Runs detection and attaches the annotations to the network.
pub fn detect(network: MetabolicNetwork) -> (AnnotatedNetwork, SeedSets) {
    let (annotations, seeds) = detect_seeds(&network);
    (
        AnnotatedNetwork {
            network,
            annotations,
        },
        seeds,
    )
}

pub fn detect_seeds(network: &MetabolicNetwork) -> (SeedAnnotations, SeedSets) {
    let graph = network.graph();
    let mut annotations = SeedAnnotations::new();
    let mut sets = SeedSets::default();
    let mut next_group = 0usize;

    for component in tarjan_scc(graph) {
        let members: HashSet<_> = component.iter().copied().collect();
        let entered_from_outside = component.iter().any(|&ix| {
            graph
                .neighbors_directed(ix, Direction::Incoming)
                .any(|source| !members.contains(&source))
        });

        if entered_from_outside {
            for &ix in &component {
                annotations.insert(graph[ix].clone(), SeedAnnotation::non_seed());
            }
        } else {
            let group = next_group;
            next_group += 1;
            let names = sets.groups.entry(group).or_default();
            for &ix in &component {
                annotations.insert(graph[ix].clone(), SeedAnnotation::seed(group));
                names.insert(graph[ix].clone());
            }
        }
    }

    debug!(
        compounds = annotations.len(),
        seed_groups = sets.len(),
        "detected seed sets"
    );
    (annotations, sets)
}
