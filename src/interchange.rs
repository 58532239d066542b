//! Node/edge-list JSON form of a network, used by the organism store and
//! by analysis output.
//!
//! The layout follows the common `elements.nodes` / `elements.edges` graph
//! document shape. Seed annotations ride along as `Seed` / `SeedGroup`
//! node attributes and are absent before detection has run.

use serde::{Deserialize, Serialize};

use crate::error::MetabError;
use crate::network::MetabolicNetwork;
use crate::seeds::{SeedAnnotation, SeedAnnotations};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkDocument {
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "directed")]
    pub directed: bool,
    #[serde(default)]
    pub multigraph: bool,
    pub elements: Elements,
}

fn directed() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Elements {
    #[serde(default)]
    pub nodes: Vec<NodeElement>,
    #[serde(default)]
    pub edges: Vec<EdgeElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeElement {
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Seed", default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<bool>,
    #[serde(rename = "SeedGroup", default, skip_serializing_if = "Option::is_none")]
    pub seed_group: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeElement {
    pub data: EdgeData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub source: String,
    pub target: String,
}

impl NetworkDocument {
    pub fn from_network(network: &MetabolicNetwork) -> Self {
        Self::build(network, None)
    }

    pub fn from_annotated(network: &MetabolicNetwork, annotations: &SeedAnnotations) -> Self {
        Self::build(network, Some(annotations))
    }

    fn build(network: &MetabolicNetwork, annotations: Option<&SeedAnnotations>) -> Self {
        let nodes = network
            .compounds()
            .map(|id| {
                let annotation = annotations.and_then(|table| table.get(id));
                NodeElement {
                    data: NodeData {
                        id: id.to_string(),
                        name: Some(id.to_string()),
                        seed: annotation.map(|a| a.seed),
                        seed_group: annotation.and_then(|a| a.group),
                    },
                }
            })
            .collect();
        let edges = network
            .edges()
            .map(|(source, target)| EdgeElement {
                data: EdgeData {
                    source: source.to_string(),
                    target: target.to_string(),
                },
            })
            .collect();
        Self {
            data: serde_json::Map::new(),
            directed: true,
            multigraph: false,
            elements: Elements { nodes, edges },
        }
    }

    /// Rebuilds the graph. Annotations are returned only when at least one
    /// node carries a `Seed` attribute.
    pub fn to_network(&self) -> Result<(MetabolicNetwork, Option<SeedAnnotations>), MetabError> {
        if !self.directed {
            return Err(MetabError::Interchange(
                "undirected documents are not supported".to_string(),
            ));
        }

        let mut network = MetabolicNetwork::new();
        let mut annotations = SeedAnnotations::new();
        for node in &self.elements.nodes {
            let data = &node.data;
            if network.contains(&data.id) {
                return Err(MetabError::Interchange(format!("duplicate node {}", data.id)));
            }
            network.add_compound(&data.id);
            if let Some(seed) = data.seed {
                let annotation = match (seed, data.seed_group) {
                    (true, Some(group)) => SeedAnnotation::seed(group),
                    (true, None) => {
                        return Err(MetabError::Interchange(format!(
                            "seed node {} has no SeedGroup",
                            data.id
                        )));
                    }
                    (false, _) => SeedAnnotation::non_seed(),
                };
                annotations.insert(data.id.clone(), annotation);
            }
        }

        for edge in &self.elements.edges {
            let EdgeData { source, target } = &edge.data;
            for endpoint in [source, target] {
                if !network.contains(endpoint) {
                    return Err(MetabError::Interchange(format!(
                        "edge {source} -> {target} references unknown node {endpoint}"
                    )));
                }
            }
            network.add_edge(source, target);
        }

        let annotations = (!annotations.is_empty()).then_some(annotations);
        Ok((network, annotations))
    }

    pub fn to_json(&self) -> Result<serde_json::Value, MetabError> {
        serde_json::to_value(self).map_err(|err| MetabError::Interchange(err.to_string()))
    }

    pub fn from_json(value: serde_json::Value) -> Result<Self, MetabError> {
        serde_json::from_value(value).map_err(|err| MetabError::Interchange(err.to_string()))
    }
}
