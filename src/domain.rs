use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use indexmap::IndexSet;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MetabError;

/// Compound and glycan ids are a letter plus five digits; anything after the
/// sixth character is a stoichiometric suffix such as `(n+1)`.
pub const COMPOUND_ID_LEN: usize = 6;

const ARROW: &str = "=>";

fn reaction_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^R\d{5}$").expect("static regex"))
}

fn ortholog_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^K\d{5}$").expect("static regex"))
}

fn compound_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[CG]\d{5}$").expect("static regex"))
}

fn pathway_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-z]{0,4}\d{5}$").expect("static regex"))
}

pub fn is_reaction_id(value: &str) -> bool {
    reaction_re().is_match(value)
}

pub fn is_ortholog_id(value: &str) -> bool {
    ortholog_re().is_match(value)
}

pub fn is_compound_id(value: &str) -> bool {
    compound_re().is_match(value)
}

/// Pathway ids are stored as their five-digit number; `map00010`,
/// `ko00010` and `rn00010` all normalize to `00010`.
pub fn normalize_pathway_id(value: &str) -> Option<String> {
    let trimmed = value.trim().trim_start_matches("path:");
    if !pathway_re().is_match(trimmed) {
        return None;
    }
    let start = trimmed.len() - 5;
    Some(trimmed[start..].to_string())
}

/// Keeps only tokens naming a compound (`C`) or glycan (`G`), truncated to
/// the fixed id width.
pub fn compound_token(token: &str) -> Option<&str> {
    let first = token.chars().next()?;
    if first != 'C' && first != 'G' {
        return None;
    }
    let end = token
        .char_indices()
        .nth(COMPOUND_ID_LEN)
        .map(|(idx, _)| idx)
        .unwrap_or(token.len());
    Some(&token[..end])
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Equation {
    pub reactants: IndexSet<String>,
    pub products: IndexSet<String>,
    pub reversible: bool,
}

impl Equation {
    pub fn new<L, R>(reactants: L, products: R, reversible: bool) -> Self
    where
        L: IntoIterator,
        L::Item: Into<String>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self {
            reactants: reactants.into_iter().map(Into::into).collect(),
            products: products.into_iter().map(Into::into).collect(),
            reversible,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reactants.is_empty() && self.products.is_empty()
    }

    pub fn compounds(&self) -> impl Iterator<Item = &str> {
        self.reactants
            .iter()
            .chain(self.products.iter())
            .map(String::as_str)
    }
}

impl FromStr for Equation {
    type Err = MetabError;

    /// Parses an `EQUATION` value such as `C00001 + 2 C00002 <=> C00003`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (left, right) = value.split_once(ARROW).ok_or_else(|| MetabError::MalformedRecord {
            family: "equation",
            id: value.trim().to_string(),
            reason: "missing reaction arrow".to_string(),
        })?;
        let (left, reversible) = match left.strip_suffix('<') {
            Some(stripped) => (stripped, true),
            None => (left, false),
        };
        Ok(Self {
            reactants: side_compounds(left),
            products: side_compounds(right),
            reversible,
        })
    }
}

/// Every compound/glycan token on one side of an equation, in order.
pub fn side_compounds(side: &str) -> IndexSet<String> {
    side.split_whitespace()
        .filter_map(compound_token)
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Compound {
    pub id: String,
    pub name: Option<String>,
    pub formula: Option<String>,
    pub mass: Option<String>,
    pub reactions: BTreeSet<String>,
    pub pathways: BTreeSet<String>,
}

impl Compound {
    pub fn is_glycan(&self) -> bool {
        self.id.starts_with('G')
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    pub id: String,
    pub name: Option<String>,
    pub equation: Equation,
    pub orthologs: BTreeSet<String>,
    pub pathways: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ortholog {
    pub id: String,
    pub name: Option<String>,
    pub definition: Option<String>,
    pub reactions: BTreeSet<String>,
    pub pathways: BTreeSet<String>,
    pub classes: Vec<String>,
}

impl Ortholog {
    /// `definition (name)` when both are present, whichever exists otherwise,
    /// and the bare id as a last resort.
    pub fn display_name(&self) -> String {
        match (&self.definition, &self.name) {
            (Some(def), Some(name)) => format!("{def} ({name})"),
            (Some(def), None) => def.clone(),
            (None, Some(name)) => name.clone(),
            (None, None) => self.id.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pathway {
    pub id: String,
    pub name: Option<String>,
    pub orthologs: BTreeSet<String>,
    pub reactions: BTreeSet<String>,
    pub compounds: Vec<String>,
}

/// A knowledge-base lookup target, written `kind:id` on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KbEntity {
    Gene(String),
    Reaction(String),
    Compound(String),
    Pathway(String),
}

impl fmt::Display for KbEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KbEntity::Gene(id) => write!(f, "gene:{id}"),
            KbEntity::Reaction(id) => write!(f, "reaction:{id}"),
            KbEntity::Compound(id) => write!(f, "compound:{id}"),
            KbEntity::Pathway(id) => write!(f, "pathway:{id}"),
        }
    }
}

impl FromStr for KbEntity {
    type Err = MetabError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let (kind, rest) = trimmed
            .split_once(':')
            .ok_or_else(|| invalid("entity", value))?;
        let id = rest.trim();
        match kind {
            "gene" | "ko" if is_ortholog_id(id) => Ok(KbEntity::Gene(id.to_string())),
            "reaction" | "rn" if is_reaction_id(id) => Ok(KbEntity::Reaction(id.to_string())),
            "compound" | "cpd" if is_compound_id(id) => Ok(KbEntity::Compound(id.to_string())),
            "pathway" | "path" => normalize_pathway_id(id)
                .map(KbEntity::Pathway)
                .ok_or_else(|| invalid("pathway", id)),
            "gene" | "ko" => Err(invalid("ortholog", id)),
            "reaction" | "rn" => Err(invalid("reaction", id)),
            "compound" | "cpd" => Err(invalid("compound", id)),
            _ => Err(invalid("entity", value)),
        }
    }
}

fn invalid(kind: &'static str, value: &str) -> MetabError {
    MetabError::InvalidIdentifier {
        kind,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn reversible_equation() {
        let eq: Equation = "C00001 + C00002 <=> C00003".parse().unwrap();
        assert_eq!(eq.reactants.iter().collect::<Vec<_>>(), ["C00001", "C00002"]);
        assert_eq!(eq.products.iter().collect::<Vec<_>>(), ["C00003"]);
        assert!(eq.reversible);
    }

    #[test]
    fn forward_equation_keeps_glycans() {
        let eq: Equation = "C00001 => C00002 + G00001".parse().unwrap();
        assert!(!eq.reversible);
        assert!(eq.products.contains("G00001"));
    }

    #[test]
    fn coefficients_and_suffixes_dropped() {
        let eq: Equation = "2 C00001 + C00404(n) <=> n C00002 + C00013(n+1)"
            .parse()
            .unwrap();
        assert_eq!(eq.reactants.iter().collect::<Vec<_>>(), ["C00001", "C00404"]);
        assert_eq!(eq.products.iter().collect::<Vec<_>>(), ["C00002", "C00013"]);
    }

    #[test]
    fn missing_arrow_is_malformed() {
        let err = "C00001 + C00002".parse::<Equation>().unwrap_err();
        assert_matches!(err, MetabError::MalformedRecord { .. });
    }

    #[test]
    fn pathway_ids_normalize() {
        assert_eq!(normalize_pathway_id("map00010").as_deref(), Some("00010"));
        assert_eq!(normalize_pathway_id("ko01100").as_deref(), Some("01100"));
        assert_eq!(normalize_pathway_id("00010").as_deref(), Some("00010"));
        assert_eq!(normalize_pathway_id("glycolysis"), None);
    }

    #[test]
    fn parse_entity() {
        let entity: KbEntity = "reaction:R00001".parse().unwrap();
        assert_eq!(entity, KbEntity::Reaction("R00001".to_string()));
        let entity: KbEntity = "pathway:map00010".parse().unwrap();
        assert_eq!(entity, KbEntity::Pathway("00010".to_string()));
        let err = "gene:X1".parse::<KbEntity>().unwrap_err();
        assert_matches!(err, MetabError::InvalidIdentifier { kind: "ortholog", .. });
    }

    #[test]
    fn ortholog_display_name_fallbacks() {
        let mut ko = Ortholog {
            id: "K00001".to_string(),
            name: Some("E1.1.1.1".to_string()),
            definition: Some("alcohol dehydrogenase".to_string()),
            reactions: BTreeSet::new(),
            pathways: BTreeSet::new(),
            classes: Vec::new(),
        };
        assert_eq!(ko.display_name(), "alcohol dehydrogenase (E1.1.1.1)");
        ko.definition = None;
        assert_eq!(ko.display_name(), "E1.1.1.1");
        ko.name = None;
        assert_eq!(ko.display_name(), "K00001");
    }
}
