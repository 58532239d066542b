//! Lookup tables over a local KEGG knowledge-base directory.
//!
//! A [`KbReader`] parses nothing up front. Each record family (reactions,
//! orthologs, compounds plus glycans, the mapformula list) is parsed the
//! first time a table derived from it is requested and kept for the life of
//! the reader. Readers do not share caches.
//!
//! Unknown ids in relational lookups (`reactions_for_gene`,
//! `genes_for_pathway`, names, compounds) come back empty. The reaction
//! equation and reaction-to-gene tables are authoritative and answer unknown
//! ids with [`MetabError::NotFound`].

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Read;

use camino::{Utf8Path, Utf8PathBuf};
use flate2::read::GzDecoder;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, warn};

use crate::domain::{
    Compound, Equation, Ortholog, Pathway, Reaction, compound_token, is_reaction_id,
    normalize_pathway_id, side_compounds,
};
use crate::error::MetabError;
use crate::record::{Record, records};

pub const REACTION_FILE: &str = "reaction";
pub const ORTHOLOG_FILE: &str = "ko";
pub const COMPOUND_FILE: &str = "compound";
pub const GLYCAN_FILE: &str = "glycan";
pub const MAPFORMULA_FILE: &str = "reaction_mapformula.lst";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Reactions,
    Orthologs,
    Compounds,
    MapFormula,
}

/// A record that did not fit the field grammar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedEntry {
    pub family: &'static str,
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Default)]
struct ReactionTables {
    reactions: IndexMap<String, Reaction>,
    pathway_reactions: BTreeMap<String, BTreeSet<String>>,
    compound_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
struct OrthologTables {
    orthologs: IndexMap<String, Ortholog>,
    pathway_orthologs: BTreeMap<String, BTreeSet<String>>,
    class_orthologs: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Default)]
struct CompoundTables {
    compounds: IndexMap<String, Compound>,
    pathway_compounds: BTreeMap<String, Vec<String>>,
    pathway_names: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
struct MapFormula {
    equations: BTreeMap<String, Equation>,
    compounds: BTreeSet<String>,
}

pub struct KbReader {
    dir: Utf8PathBuf,
    strict: bool,
    malformed: Vec<MalformedEntry>,
    reactions: Option<ReactionTables>,
    orthologs: Option<OrthologTables>,
    compounds: Option<CompoundTables>,
    mapformula: Option<MapFormula>,
}

impl KbReader {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            strict: false,
            malformed: Vec::new(),
            reactions: None,
            orthologs: None,
            compounds: None,
            mapformula: None,
        }
    }

    /// In strict mode the first malformed record aborts the load instead of
    /// being collected.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    pub fn malformed(&self) -> &[MalformedEntry] {
        &self.malformed
    }

    pub fn is_loaded(&self, family: Family) -> bool {
        match family {
            Family::Reactions => self.reactions.is_some(),
            Family::Orthologs => self.orthologs.is_some(),
            Family::Compounds => self.compounds.is_some(),
            Family::MapFormula => self.mapformula.is_some(),
        }
    }

    pub fn ensure_loaded(&mut self, family: Family) -> Result<(), MetabError> {
        match family {
            Family::Reactions => self.reaction_tables().map(|_| ()),
            Family::Orthologs => self.ortholog_tables().map(|_| ()),
            Family::Compounds => self.compound_tables().map(|_| ()),
            Family::MapFormula => self.mapformula_tables().map(|_| ()),
        }
    }

    // Genes (orthologs)

    /// Reactions catalyzed by an ortholog; empty and warned when unknown.
    pub fn reactions_for_gene(&mut self, gene: &str) -> Result<BTreeSet<String>, MetabError> {
        let tables = self.ortholog_tables()?;
        match tables.orthologs.get(gene) {
            Some(ortholog) => Ok(ortholog.reactions.clone()),
            None => {
                warn!(gene, "ortholog not present in knowledge base");
                Ok(BTreeSet::new())
            }
        }
    }

    pub fn ortholog(&mut self, gene: &str) -> Result<Option<&Ortholog>, MetabError> {
        Ok(self.ortholog_tables()?.orthologs.get(gene))
    }

    pub fn gene_name(&mut self, gene: &str) -> Result<Option<String>, MetabError> {
        Ok(self
            .ortholog_tables()?
            .orthologs
            .get(gene)
            .map(Ortholog::display_name))
    }

    pub fn gene_ids(&mut self) -> Result<Vec<String>, MetabError> {
        Ok(self.ortholog_tables()?.orthologs.keys().cloned().collect())
    }

    pub fn genes_for_class(&mut self, class: &str) -> Result<Vec<String>, MetabError> {
        Ok(self
            .ortholog_tables()?
            .class_orthologs
            .get(class)
            .cloned()
            .unwrap_or_default())
    }

    // Reactions

    /// Authoritative: unknown reactions are an error.
    pub fn equation(&mut self, reaction: &str) -> Result<&Equation, MetabError> {
        self.reaction_tables()?
            .reactions
            .get(reaction)
            .map(|entry| &entry.equation)
            .ok_or_else(|| MetabError::not_found("reaction equations", reaction))
    }

    /// Authoritative: reactions without an `ORTHOLOGY` block are an error.
    pub fn genes_for_reaction(&mut self, reaction: &str) -> Result<&BTreeSet<String>, MetabError> {
        self.reaction_tables()?
            .reactions
            .get(reaction)
            .map(|entry| &entry.orthologs)
            .filter(|orthologs| !orthologs.is_empty())
            .ok_or_else(|| MetabError::not_found("reaction orthologs", reaction))
    }

    pub fn reaction(&mut self, reaction: &str) -> Result<Option<&Reaction>, MetabError> {
        Ok(self.reaction_tables()?.reactions.get(reaction))
    }

    pub fn reaction_name(&mut self, reaction: &str) -> Result<Option<String>, MetabError> {
        Ok(self
            .reaction_tables()?
            .reactions
            .get(reaction)
            .map(|entry| entry.name.clone().unwrap_or_else(|| entry.id.clone())))
    }

    /// Occurrences of every compound across all reaction equations; the
    /// largest counts are the hub compounds.
    pub fn compound_counts(&mut self) -> Result<&BTreeMap<String, usize>, MetabError> {
        Ok(&self.reaction_tables()?.compound_counts)
    }

    // Pathways

    pub fn genes_for_pathway(&mut self, pathway: &str) -> Result<BTreeSet<String>, MetabError> {
        let Some(key) = normalize_pathway_id(pathway) else {
            return Ok(BTreeSet::new());
        };
        Ok(self
            .ortholog_tables()?
            .pathway_orthologs
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    pub fn reactions_for_pathway(&mut self, pathway: &str) -> Result<BTreeSet<String>, MetabError> {
        let Some(key) = normalize_pathway_id(pathway) else {
            return Ok(BTreeSet::new());
        };
        Ok(self
            .reaction_tables()?
            .pathway_reactions
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    pub fn compounds_for_pathway(&mut self, pathway: &str) -> Result<Vec<String>, MetabError> {
        let Some(key) = normalize_pathway_id(pathway) else {
            return Ok(Vec::new());
        };
        Ok(self
            .compound_tables()?
            .pathway_compounds
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    pub fn pathway_name(&mut self, pathway: &str) -> Result<Option<String>, MetabError> {
        let Some(key) = normalize_pathway_id(pathway) else {
            return Ok(None);
        };
        Ok(self.compound_tables()?.pathway_names.get(&key).cloned())
    }

    /// Gathers every table that mentions the pathway; loads three families.
    pub fn pathway(&mut self, pathway: &str) -> Result<Pathway, MetabError> {
        let id = normalize_pathway_id(pathway).unwrap_or_else(|| pathway.to_string());
        Ok(Pathway {
            name: self.pathway_name(&id)?,
            orthologs: self.genes_for_pathway(&id)?,
            reactions: self.reactions_for_pathway(&id)?,
            compounds: self.compounds_for_pathway(&id)?,
            id,
        })
    }

    // Compounds

    pub fn compound(&mut self, compound: &str) -> Result<Option<&Compound>, MetabError> {
        Ok(self.compound_tables()?.compounds.get(compound))
    }

    pub fn compounds(&mut self) -> Result<&IndexMap<String, Compound>, MetabError> {
        Ok(&self.compound_tables()?.compounds)
    }

    // Mapformula

    pub fn mapformula(&mut self) -> Result<&BTreeMap<String, Equation>, MetabError> {
        Ok(&self.mapformula_tables()?.equations)
    }

    pub fn mapformula_compounds(&mut self) -> Result<&BTreeSet<String>, MetabError> {
        Ok(&self.mapformula_tables()?.compounds)
    }

    fn reaction_tables(&mut self) -> Result<&ReactionTables, MetabError> {
        let tables = match self.reactions.take() {
            Some(tables) => tables,
            None => {
                let text = read_kb_file(&self.dir, REACTION_FILE)?;
                let mut sink = Diagnostics::new(self.strict, &mut self.malformed);
                load_reactions(&text, &mut sink)?
            }
        };
        let tables = self.reactions.insert(tables);
        Ok(tables)
    }

    fn ortholog_tables(&mut self) -> Result<&OrthologTables, MetabError> {
        let tables = match self.orthologs.take() {
            Some(tables) => tables,
            None => {
                let text = read_kb_file(&self.dir, ORTHOLOG_FILE)?;
                let mut sink = Diagnostics::new(self.strict, &mut self.malformed);
                load_orthologs(&text, &mut sink)?
            }
        };
        let tables = self.orthologs.insert(tables);
        Ok(tables)
    }

    fn compound_tables(&mut self) -> Result<&CompoundTables, MetabError> {
        let tables = match self.compounds.take() {
            Some(tables) => tables,
            None => {
                let compounds = read_kb_file(&self.dir, COMPOUND_FILE)?;
                let glycans = read_kb_file(&self.dir, GLYCAN_FILE)?;
                let mut sink = Diagnostics::new(self.strict, &mut self.malformed);
                let mut tables = CompoundTables::default();
                load_compounds(&compounds, CompoundFamily::Compound, &mut tables, &mut sink)?;
                load_compounds(&glycans, CompoundFamily::Glycan, &mut tables, &mut sink)?;
                tables
            }
        };
        let tables = self.compounds.insert(tables);
        Ok(tables)
    }

    fn mapformula_tables(&mut self) -> Result<&MapFormula, MetabError> {
        let tables = match self.mapformula.take() {
            Some(tables) => tables,
            None => {
                let text = read_kb_file(&self.dir, MAPFORMULA_FILE)?;
                let mut sink = Diagnostics::new(self.strict, &mut self.malformed);
                load_mapformula(&text, &mut sink)?
            }
        };
        let tables = self.mapformula.insert(tables);
        Ok(tables)
    }
}

/// Reads `<dir>/<name>`, falling back to a gzip-compressed `<name>.gz`.
///
/// Bytes that are not UTF-8 are replaced, so one bad name cannot make a
/// whole record family unreadable.
pub fn read_kb_file(dir: &Utf8Path, name: &str) -> Result<String, MetabError> {
    let plain = dir.join(name);
    if plain.as_std_path().exists() {
        debug!(path = %plain, "reading knowledge-base file");
        let bytes = std::fs::read(plain.as_std_path())
            .map_err(|err| MetabError::Filesystem(format!("read {plain}: {err}")))?;
        return Ok(decode_text(&plain, bytes));
    }
    let gz = dir.join(format!("{name}.gz"));
    if gz.as_std_path().exists() {
        debug!(path = %gz, "reading compressed knowledge-base file");
        let file = File::open(gz.as_std_path())
            .map_err(|err| MetabError::Filesystem(format!("open {gz}: {err}")))?;
        let mut bytes = Vec::new();
        GzDecoder::new(file)
            .read_to_end(&mut bytes)
            .map_err(|err| MetabError::Filesystem(format!("decompress {gz}: {err}")))?;
        return Ok(decode_text(&gz, bytes));
    }
    Err(MetabError::Filesystem(format!(
        "knowledge-base file {name} not found in {dir}"
    )))
}

fn decode_text(path: &Utf8Path, bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            warn!(path = %path, offset = err.utf8_error().valid_up_to(), "invalid UTF-8 replaced");
            String::from_utf8_lossy(err.as_bytes()).into_owned()
        }
    }
}

struct Diagnostics<'a> {
    strict: bool,
    entries: &'a mut Vec<MalformedEntry>,
}

impl<'a> Diagnostics<'a> {
    fn new(strict: bool, entries: &'a mut Vec<MalformedEntry>) -> Self {
        Self { strict, entries }
    }

    fn report(
        &mut self,
        family: &'static str,
        id: &str,
        reason: impl Into<String>,
    ) -> Result<(), MetabError> {
        let reason = reason.into();
        if self.strict {
            return Err(MetabError::MalformedRecord {
                family,
                id: id.to_string(),
                reason,
            });
        }
        warn!(family, id, reason = %reason, "malformed knowledge-base record");
        self.entries.push(MalformedEntry {
            family,
            id: id.to_string(),
            reason,
        });
        Ok(())
    }
}

fn pathway_ids<'a>(record: &'a Record) -> impl Iterator<Item = String> + 'a {
    record
        .leading_tokens("PATHWAY")
        .filter_map(normalize_pathway_id)
}

fn load_reactions(text: &str, sink: &mut Diagnostics<'_>) -> Result<ReactionTables, MetabError> {
    let mut tables = ReactionTables::default();
    for record in records(text) {
        let Some(id) = record.entry_id().map(str::to_string) else {
            sink.report("reaction", "<unknown>", "record without ENTRY")?;
            continue;
        };
        if !is_reaction_id(&id) {
            sink.report("reaction", &id, "reaction id does not match R#####")?;
        }

        let equation = match record.first("EQUATION") {
            Some(raw) => {
                for token in raw.split_whitespace().filter_map(compound_token) {
                    *tables.compound_counts.entry(token.to_string()).or_default() += 1;
                }
                match raw.parse::<Equation>() {
                    Ok(equation) => equation,
                    Err(_) => {
                        sink.report("reaction", &id, format!("equation without arrow: {raw}"))?;
                        Equation::default()
                    }
                }
            }
            None => Equation::default(),
        };

        let pathways: BTreeSet<String> = pathway_ids(&record).collect();
        for pathway in &pathways {
            tables
                .pathway_reactions
                .entry(pathway.clone())
                .or_default()
                .insert(id.clone());
        }

        let reaction = Reaction {
            name: record.first("NAME").map(|name| name.trim_end_matches(';').to_string()),
            orthologs: record
                .leading_tokens("ORTHOLOGY")
                .map(str::to_string)
                .collect(),
            pathways,
            equation,
            id: id.clone(),
        };
        tables.reactions.insert(id, reaction);
    }
    debug!(count = tables.reactions.len(), "loaded reactions");
    Ok(tables)
}

fn strip_ec(definition: &str) -> String {
    match definition.rfind("[EC:") {
        Some(idx) => definition[..idx].trim_end().to_string(),
        None => definition.trim().to_string(),
    }
}

fn load_orthologs(text: &str, sink: &mut Diagnostics<'_>) -> Result<OrthologTables, MetabError> {
    let mut tables = OrthologTables::default();
    for record in records(text) {
        let Some(id) = record.entry_id().map(str::to_string) else {
            sink.report("ortholog", "<unknown>", "record without ENTRY")?;
            continue;
        };

        let reactions: BTreeSet<String> = record
            .values("DBLINKS")
            .filter_map(|line| line.strip_prefix("RN:"))
            .flat_map(str::split_whitespace)
            .map(str::to_string)
            .collect();

        let pathways: BTreeSet<String> = pathway_ids(&record).collect();
        for pathway in &pathways {
            tables
                .pathway_orthologs
                .entry(pathway.clone())
                .or_default()
                .insert(id.clone());
        }

        let classes: Vec<String> = record
            .values("CLASS")
            .filter_map(|line| line.split("; ").nth(1))
            .map(|label| label.trim().to_string())
            .collect();
        for class in &classes {
            tables
                .class_orthologs
                .entry(class.clone())
                .or_default()
                .push(id.clone());
        }

        let ortholog = Ortholog {
            name: record.first("NAME").map(|name| name.trim().to_string()),
            definition: record.first("DEFINITION").map(strip_ec),
            reactions,
            pathways,
            classes,
            id: id.clone(),
        };
        tables.orthologs.insert(id, ortholog);
    }
    debug!(count = tables.orthologs.len(), "loaded orthologs");
    Ok(tables)
}

#[derive(Clone, Copy)]
enum CompoundFamily {
    Compound,
    Glycan,
}

impl CompoundFamily {
    fn label(self) -> &'static str {
        match self {
            CompoundFamily::Compound => "compound",
            CompoundFamily::Glycan => "glycan",
        }
    }

    fn formula_tag(self) -> &'static str {
        match self {
            CompoundFamily::Compound => "FORMULA",
            CompoundFamily::Glycan => "COMPOSITION",
        }
    }

    fn mass(self, record: &Record) -> Option<String> {
        match self {
            CompoundFamily::Compound => record.first("EXACT_MASS").map(|mass| mass.trim().to_string()),
            CompoundFamily::Glycan => record
                .first("MASS")
                .and_then(|mass| mass.split_whitespace().next())
                .map(str::to_string),
        }
    }
}

fn load_compounds(
    text: &str,
    family: CompoundFamily,
    tables: &mut CompoundTables,
    sink: &mut Diagnostics<'_>,
) -> Result<(), MetabError> {
    for record in records(text) {
        let Some(id) = record.entry_id().map(str::to_string) else {
            sink.report(family.label(), "<unknown>", "record without ENTRY")?;
            continue;
        };

        let mut pathways = BTreeSet::new();
        for line in record.values("PATHWAY") {
            let mut tokens = line.split_whitespace();
            let Some(pathway) = tokens.next().and_then(normalize_pathway_id) else {
                continue;
            };
            let name = tokens.collect::<Vec<_>>().join(" ");
            tables.pathway_names.insert(pathway.clone(), name);
            tables
                .pathway_compounds
                .entry(pathway.clone())
                .or_default()
                .push(id.clone());
            pathways.insert(pathway);
        }

        let compound = Compound {
            name: record
                .first("NAME")
                .and_then(|name| name.split(';').next())
                .map(|name| name.trim().to_string()),
            formula: record.first(family.formula_tag()).map(|value| value.trim().to_string()),
            mass: family.mass(&record),
            reactions: record
                .values("REACTION")
                .flat_map(str::split_whitespace)
                .map(str::to_string)
                .collect(),
            pathways,
            id: id.clone(),
        };
        tables.compounds.insert(id, compound);
    }
    Ok(())
}

fn load_mapformula(text: &str, sink: &mut Diagnostics<'_>) -> Result<MapFormula, MetabError> {
    let mut tables = MapFormula::default();
    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let mut parts = line.splitn(3, ':');
        let reaction = parts.next().unwrap_or_default().trim();
        let (Some(_map), Some(formula)) = (parts.next(), parts.next()) else {
            sink.report("mapformula", reaction, "expected `reaction : map : formula`")?;
            continue;
        };

        for token in formula.split_whitespace() {
            if token.len() == 6 && token.starts_with('C') {
                tables.compounds.insert(token.to_string());
            }
        }

        let (left, right, reversible) = if let Some((left, right)) = formula.split_once("<=>") {
            (left, right, true)
        } else if let Some((left, right)) = formula.split_once("=>") {
            (left, right, false)
        } else if let Some((left, right)) = formula.split_once("<=") {
            (left, right, true)
        } else {
            sink.report("mapformula", reaction, format!("formula without arrow: {formula}"))?;
            continue;
        };

        tables.equations.insert(
            reaction.to_string(),
            Equation {
                reactants: side_compounds(left),
                products: side_compounds(right),
                reversible,
            },
        );
    }
    Ok(tables)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REACTIONS: &str = "\
ENTRY       R00001                      Reaction
NAME        polyphosphate polyphosphohydrolase
EQUATION    C00404 + n C00001 <=> (n+1) C02174
ORTHOLOGY   K01507  inorganic pyrophosphatase [EC:3.6.1.1]
            K06019  pyrophosphatase PpaX [EC:3.6.1.1]
PATHWAY     rn00190  Oxidative phosphorylation
///
ENTRY       R00002                      Reaction
EQUATION    C00001 => C00002 + G00001
///
ENTRY       X123                        Reaction
EQUATION    C00001 C00002
///
";

    #[test]
    fn reaction_records_parse() {
        let mut diag = Vec::new();
        let mut sink = Diagnostics::new(false, &mut diag);
        let tables = load_reactions(REACTIONS, &mut sink).unwrap();
        let r1 = &tables.reactions["R00001"];
        assert!(r1.equation.reversible);
        assert_eq!(r1.orthologs.len(), 2);
        assert!(r1.pathways.contains("00190"));
        assert_eq!(r1.name.as_deref(), Some("polyphosphate polyphosphohydrolase"));
        assert_eq!(tables.compound_counts["C00001"], 3);
        assert_eq!(diag.len(), 2);
        assert!(diag.iter().all(|entry| entry.id == "X123"));
    }

    #[test]
    fn strict_mode_fails_on_first_malformed() {
        let mut diag = Vec::new();
        let mut sink = Diagnostics::new(true, &mut diag);
        let err = load_reactions(REACTIONS, &mut sink).unwrap_err();
        assert!(matches!(err, MetabError::MalformedRecord { .. }));
    }

    #[test]
    fn mapformula_lines() {
        let text = "R00005: 00220: C01010 => C00011 + C00014\nR00006: 00770: C00022 <=> C00900\n";
        let mut diag = Vec::new();
        let mut sink = Diagnostics::new(false, &mut diag);
        let tables = load_mapformula(text, &mut sink).unwrap();
        let eq = &tables.equations["R00005"];
        assert!(!eq.reversible);
        assert_eq!(eq.products.len(), 2);
        assert!(tables.equations["R00006"].reversible);
        assert_eq!(tables.compounds.len(), 5);
    }

    #[test]
    fn definition_drops_ec_numbers() {
        assert_eq!(strip_ec("alcohol dehydrogenase [EC:1.1.1.1]"), "alcohol dehydrogenase");
        assert_eq!(strip_ec("chaperone"), "chaperone");
    }
}
