//! Compound-to-compound reaction networks.
//!
//! Every reaction contributes an edge from each of its reactants to each of
//! its products. Edges carry no reaction label and collapse when repeated.
//! Reversible reactions are not expanded into a reverse edge.
//!
//! Component filters use weak connectivity; seed detection in
//! [`crate::seeds`] uses strong connectivity.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::Equation;
use crate::exclusion::ExclusionList;

/// Degree above which `filter_common` drops a compound.
pub const COMMON_DEGREE_THRESHOLD: usize = 10;

#[derive(Debug, Clone, Default)]
pub struct MetabolicNetwork {
    graph: StableDiGraph<String, ()>,
    index: HashMap<String, NodeIndex>,
}

impl MetabolicNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a compound node if it is not already present.
    pub fn add_compound(&mut self, id: &str) -> NodeIndex {
        if let Some(&ix) = self.index.get(id) {
            return ix;
        }
        let ix = self.graph.add_node(id.to_string());
        self.index.insert(id.to_string(), ix);
        ix
    }

    /// Adds `source -> target`, creating both nodes; an existing edge is kept
    /// as is.
    pub fn add_edge(&mut self, source: &str, target: &str) {
        let a = self.add_compound(source);
        let b = self.add_compound(target);
        if !self.graph.contains_edge(a, b) {
            self.graph.add_edge(a, b, ());
        }
    }

    /// Adds the reactant × product edges of one reaction.
    pub fn add_reaction(&mut self, equation: &Equation) {
        for reactant in &equation.reactants {
            self.add_compound(reactant);
        }
        for product in &equation.products {
            self.add_compound(product);
        }
        for reactant in &equation.reactants {
            for product in &equation.products {
                self.add_edge(reactant, product);
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Compound ids in insertion order.
    pub fn compounds(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph
            .node_indices()
            .map(move |ix| self.graph[ix].as_str())
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.graph.edge_indices().filter_map(move |edge| {
            let (a, b) = self.graph.edge_endpoints(edge)?;
            Some((self.graph[a].as_str(), self.graph[b].as_str()))
        })
    }

    pub fn node_set(&self) -> BTreeSet<String> {
        self.compounds().map(str::to_string).collect()
    }

    pub fn edge_set(&self) -> BTreeSet<(String, String)> {
        self.edges()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect()
    }

    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        match (self.index.get(source), self.index.get(target)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    /// In-degree plus out-degree; a self-loop counts twice.
    pub fn degree(&self, id: &str) -> Option<usize> {
        self.index.get(id).map(|&ix| self.degree_of(ix))
    }

    fn degree_of(&self, ix: NodeIndex) -> usize {
        self.graph.neighbors_directed(ix, Direction::Outgoing).count()
            + self.graph.neighbors_directed(ix, Direction::Incoming).count()
    }

    pub fn degrees(&self) -> Vec<(String, usize)> {
        self.graph
            .node_indices()
            .map(|ix| (self.graph[ix].clone(), self.degree_of(ix)))
            .collect()
    }

    pub fn remove_compound(&mut self, id: &str) -> bool {
        match self.index.remove(id) {
            Some(ix) => {
                self.graph.remove_node(ix);
                true
            }
            None => false,
        }
    }

    pub fn remove_compounds<'a, I>(&mut self, ids: I) -> usize
    where
        I: IntoIterator<Item = &'a str>,
    {
        ids.into_iter()
            .filter(|id| self.remove_compound(id))
            .count()
    }

    /// Weakly-connected components, ordered by their first-inserted member.
    pub fn weak_components(&self) -> Vec<Vec<String>> {
        let mut seen = HashSet::with_capacity(self.graph.node_count());
        let mut components = Vec::new();
        for start in self.graph.node_indices() {
            if !seen.insert(start) {
                continue;
            }
            let mut queue = VecDeque::from([start]);
            let mut members = Vec::new();
            while let Some(ix) = queue.pop_front() {
                members.push(self.graph[ix].clone());
                for next in self.graph.neighbors_undirected(ix) {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            components.push(members);
        }
        components
    }

    pub fn graph(&self) -> &StableDiGraph<String, ()> {
        &self.graph
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkOptions {
    #[serde(default = "default_true")]
    pub filter_very_common: bool,
    #[serde(default)]
    pub filter_common: bool,
    #[serde(default)]
    pub only_giant: bool,
    #[serde(default)]
    pub min_component_size: Option<usize>,
}

fn default_true() -> bool {
    true
}

impl Default for NetworkOptions {
    fn default() -> Self {
        Self {
            filter_very_common: true,
            filter_common: false,
            only_giant: false,
            min_component_size: None,
        }
    }
}

impl NetworkOptions {
    /// No filtering at all.
    pub fn unfiltered() -> Self {
        Self {
            filter_very_common: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct NetworkBuilder {
    options: NetworkOptions,
    exclusion: Option<ExclusionList>,
}

impl NetworkBuilder {
    pub fn new(options: NetworkOptions) -> Self {
        Self {
            options,
            exclusion: None,
        }
    }

    pub fn with_exclusion_list(mut self, exclusion: Option<ExclusionList>) -> Self {
        self.exclusion = exclusion;
        self
    }

    pub fn options(&self) -> &NetworkOptions {
        &self.options
    }

    /// Same exclusion list, different options.
    pub fn with_options(&self, options: NetworkOptions) -> Self {
        Self {
            options,
            exclusion: self.exclusion.clone(),
        }
    }

    pub fn build<'a, I>(&self, reactions: I) -> MetabolicNetwork
    where
        I: IntoIterator<Item = &'a Equation>,
    {
        let mut network = MetabolicNetwork::new();
        for equation in reactions {
            network.add_reaction(equation);
        }
        debug!(
            nodes = network.node_count(),
            edges = network.edge_count(),
            "built raw network"
        );
        self.apply_filters(&mut network);
        network
    }

    /// Filters run in a fixed order: exclusion list, local degree cut, then
    /// either the giant component or the minimum component size.
    pub fn apply_filters(&self, network: &mut MetabolicNetwork) {
        if self.options.filter_very_common {
            match &self.exclusion {
                Some(list) => {
                    let removed = network.remove_compounds(list.iter());
                    debug!(removed, "removed very common compounds");
                }
                None => warn!("very-common filter requested but no exclusion list is loaded; skipping"),
            }
        }

        if self.options.filter_common {
            let common: Vec<String> = network
                .degrees()
                .into_iter()
                .filter(|(_, degree)| *degree > COMMON_DEGREE_THRESHOLD)
                .map(|(id, _)| id)
                .collect();
            network.remove_compounds(common.iter().map(String::as_str));
        }

        if self.options.only_giant {
            let mut giant: Vec<String> = Vec::new();
            for component in network.weak_components() {
                if component.len() > giant.len() {
                    giant = component;
                }
            }
            let keep: BTreeSet<String> = giant.into_iter().collect();
            let drop: Vec<String> = network
                .compounds()
                .filter(|id| !keep.contains(*id))
                .map(str::to_string)
                .collect();
            network.remove_compounds(drop.iter().map(String::as_str));
        } else if let Some(min_size) = self.options.min_component_size {
            let drop: Vec<String> = network
                .weak_components()
                .into_iter()
                .filter(|component| component.len() < min_size)
                .flatten()
                .collect();
            network.remove_compounds(drop.iter().map(String::as_str));
        }
    }
}

/// Builds with the given options and no exclusion list.
pub fn build_network<'a, I>(reactions: I, options: NetworkOptions) -> MetabolicNetwork
where
    I: IntoIterator<Item = &'a Equation>,
{
    NetworkBuilder::new(options).build(reactions)
}
