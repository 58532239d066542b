//! Pairwise network comparison.
//!
//! Both scores are fractions of the first organism's seed groups and are
//! asymmetric, so every comparison reports both directions. A side with no
//! seed groups has no denominator and scores [`Score::Undefined`].

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::network::MetabolicNetwork;
use crate::seeds::SeedSets;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Score {
    Value(f64),
    Undefined,
}

impl Score {
    fn ratio(count: usize, total: usize) -> Self {
        if total == 0 {
            Score::Undefined
        } else {
            Score::Value(count as f64 / total as f64)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Score::Value(value) => Some(value),
            Score::Undefined => None,
        }
    }

    pub fn is_undefined(self) -> bool {
        matches!(self, Score::Undefined)
    }

    /// Rounded to two decimals for display.
    pub fn rounded(self) -> Self {
        match self {
            Score::Value(value) => Score::Value((value * 100.0).round() / 100.0),
            Score::Undefined => Score::Undefined,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Value(value) => write!(f, "{value:.2}"),
            Score::Undefined => f.write_str("undefined"),
        }
    }
}

/// Scores of network 1 relative to network 2 and the reverse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Directional {
    pub first_to_second: Score,
    pub second_to_first: Score,
}

impl Directional {
    pub fn rounded(self) -> Self {
        Self {
            first_to_second: self.first_to_second.rounded(),
            second_to_first: self.second_to_first.rounded(),
        }
    }
}

fn touches_network(group: &BTreeSet<String>, network: &MetabolicNetwork) -> bool {
    group.iter().any(|compound| network.contains(compound))
}

fn support(seeds: &SeedSets, other: &MetabolicNetwork) -> Score {
    let supported = seeds
        .members()
        .filter(|group| touches_network(group, other))
        .count();
    Score::ratio(supported, seeds.len())
}

fn complementarity(seeds: &SeedSets, other: &MetabolicNetwork, other_seeds: &SeedSets) -> Score {
    let other_seed_union = other_seeds.all_seeds();
    let complementary = seeds
        .members()
        .filter(|group| touches_network(group, other) && group.is_disjoint(&other_seed_union))
        .count();
    Score::ratio(complementary, seeds.len())
}

/// Biosynthetic support score in both directions.
pub fn bss(
    network1: &MetabolicNetwork,
    seeds1: &SeedSets,
    network2: &MetabolicNetwork,
    seeds2: &SeedSets,
) -> Directional {
    Directional {
        first_to_second: support(seeds1, network2),
        second_to_first: support(seeds2, network1),
    }
}

/// Metabolic complementarity index in both directions.
pub fn mci(
    network1: &MetabolicNetwork,
    seeds1: &SeedSets,
    network2: &MetabolicNetwork,
    seeds2: &SeedSets,
) -> Directional {
    Directional {
        first_to_second: complementarity(seeds1, network2, seeds2),
        second_to_first: complementarity(seeds2, network1, seeds1),
    }
}

/// Seed compounds split by which organism needs them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedComparison {
    pub only_first: BTreeSet<String>,
    pub only_second: BTreeSet<String>,
    pub shared: BTreeSet<String>,
}

impl SeedComparison {
    pub fn new(seeds1: &SeedSets, seeds2: &SeedSets) -> Self {
        let first = seeds1.all_seeds();
        let second = seeds2.all_seeds();
        Self {
            only_first: first.difference(&second).cloned().collect(),
            only_second: second.difference(&first).cloned().collect(),
            shared: first.intersection(&second).cloned().collect(),
        }
    }
}
