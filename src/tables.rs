//! Organism tables consumed by population: the taxonomy list and the gene
//! content of each organism.

use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, Read};

use camino::Utf8Path;
use clap::ValueEnum;
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::MetabError;

/// Column prefix marking per-organism metadata in a precalculated table.
pub const METADATA_PREFIX: &str = "metadata_";
pub const NSTI_COLUMN: &str = "NSTI";

const PRECALC: &str = "precalculated table";

/// Gene content of one organism, as read from a gene table.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganismGenes {
    pub name: String,
    pub nsti: Option<f64>,
    pub genes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeneTableFormat {
    /// PICRUSt `ko_*_precalculated.tab[.gz]`, one count row per organism
    #[default]
    Precalc,
    /// `name<TAB>nsti<TAB>gene1,gene2,...`
    Tsv,
}

/// Reads the gene content of `ids` (every organism when empty).
///
/// The TSV layout carries no selection; rows for other organisms are
/// returned as well and left to the caller.
pub fn read_gene_content(
    path: &Utf8Path,
    format: GeneTableFormat,
    ids: &[String],
) -> Result<Vec<OrganismGenes>, MetabError> {
    match format {
        GeneTableFormat::Precalc => read_precalc_table(path, ids),
        GeneTableFormat::Tsv => read_gene_table(path),
    }
}

/// Opens a precalculated table, decompressing it when the name ends in
/// `.gz`.
pub fn read_precalc_table(
    path: &Utf8Path,
    ids: &[String],
) -> Result<Vec<OrganismGenes>, MetabError> {
    let file = File::open(path.as_std_path())
        .map_err(|err| MetabError::Filesystem(format!("open {path}: {err}")))?;
    let source: Box<dyn Read> = if path.extension() == Some("gz") {
        debug!(path = %path, "reading compressed precalculated table");
        Box::new(GzDecoder::new(file))
    } else {
        debug!(path = %path, "reading precalculated table");
        Box::new(file)
    };
    parse_precalc(BufReader::new(source), ids).map_err(|err| match err {
        MetabError::Filesystem(reason) => MetabError::Filesystem(format!("read {path}: {reason}")),
        other => other,
    })
}

/// Parses a precalculated count table.
///
/// The header names the organism column, one column per gene and then the
/// `metadata_` columns. Rows whose id starts with `metadata_` describe genes
/// rather than organisms and are skipped. An organism carries every gene
/// whose count is above zero. Only rows for `ids` are parsed; an empty
/// `ids` loads every organism.
pub fn parse_precalc<R: BufRead>(
    reader: R,
    ids: &[String],
) -> Result<Vec<OrganismGenes>, MetabError> {
    let mut lines = reader.lines().enumerate();
    let header = match lines.next() {
        Some((_, line)) => line.map_err(|err| MetabError::Filesystem(err.to_string()))?,
        None => return Err(malformed_row(PRECALC, 1, "missing header row")),
    };
    let columns: Vec<&str> = header.trim_end().split('\t').collect();
    let metadata: Vec<(&str, usize)> = columns
        .iter()
        .enumerate()
        .filter_map(|(idx, column)| column.strip_prefix(METADATA_PREFIX).map(|name| (name, idx)))
        .collect();
    let end_of_data = columns.len() - metadata.len();
    if end_of_data == 0 {
        return Err(malformed_row(PRECALC, 1, "header has no organism column"));
    }
    let gene_ids = &columns[1..end_of_data];
    let nsti_column = metadata
        .iter()
        .find(|(name, _)| *name == NSTI_COLUMN)
        .map(|(_, idx)| *idx);

    let mut pending: BTreeSet<&str> = ids.iter().map(String::as_str).collect();
    let load_all = pending.is_empty();
    let mut organisms = Vec::new();
    for (ix, line) in lines {
        let line = line.map_err(|err| MetabError::Filesystem(err.to_string()))?;
        let line_no = ix + 1;
        let fields: Vec<&str> = line.split('\t').collect();
        let name = fields[0].trim();
        if name.is_empty() || name.starts_with(METADATA_PREFIX) {
            continue;
        }
        if !load_all && !pending.remove(name) {
            continue;
        }
        if fields.len() < columns.len() {
            return Err(malformed_row(
                PRECALC,
                line_no,
                &format!("expected {} columns, found {}", columns.len(), fields.len()),
            ));
        }

        let mut genes = Vec::new();
        for (gene, value) in gene_ids.iter().zip(&fields[1..end_of_data]) {
            let count: f64 = value.trim().parse().map_err(|_| {
                malformed_row(PRECALC, line_no, &format!("count for {gene} is not a number"))
            })?;
            if count > 0.0 {
                genes.push(gene.to_string());
            }
        }
        let nsti = match nsti_column.map(|idx| fields[idx].trim()) {
            None | Some("") => None,
            Some(value) => Some(
                value
                    .parse::<f64>()
                    .map_err(|_| malformed_row(PRECALC, line_no, "NSTI is not a number"))?,
            ),
        };
        organisms.push(OrganismGenes {
            name: name.to_string(),
            nsti,
            genes,
        });
    }

    if organisms.is_empty() {
        return Err(MetabError::NoMatchingOrganisms {
            examples: sample(ids.iter().map(String::as_str)),
        });
    }
    if !pending.is_empty() {
        return Err(MetabError::MissingOrganisms {
            missing: pending.len(),
            examples: sample(pending.iter().copied()),
        });
    }
    debug!(
        organisms = organisms.len(),
        genes = gene_ids.len(),
        "precalculated table loaded"
    );
    Ok(organisms)
}

fn sample<'a>(ids: impl Iterator<Item = &'a str>) -> String {
    ids.take(5).collect::<Vec<_>>().join(", ")
}

fn table_lines(path: &Utf8Path) -> Result<Vec<(usize, String)>, MetabError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| MetabError::Filesystem(format!("read {path}: {err}")))?;
    Ok(content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty() && !line.starts_with('#'))
        .map(|(ix, line)| (ix + 1, line.trim_end().to_string()))
        .collect())
}

fn malformed_row(table: &'static str, line: usize, reason: &str) -> MetabError {
    MetabError::MalformedRecord {
        family: table,
        id: format!("line {line}"),
        reason: reason.to_string(),
    }
}

/// `name<TAB>taxonomy` rows, in file order.
pub fn read_taxonomy_table(path: &Utf8Path) -> Result<Vec<(String, String)>, MetabError> {
    table_lines(path)?
        .into_iter()
        .map(|(line, text)| {
            let (name, taxonomy) = text
                .split_once('\t')
                .ok_or_else(|| malformed_row("taxonomy table", line, "expected name<TAB>taxonomy"))?;
            Ok((name.trim().to_string(), taxonomy.trim().to_string()))
        })
        .collect()
}

/// `name<TAB>nsti<TAB>gene1,gene2,...` rows. An empty nsti column means
/// the score is unknown.
pub fn read_gene_table(path: &Utf8Path) -> Result<Vec<OrganismGenes>, MetabError> {
    table_lines(path)?
        .into_iter()
        .map(|(line, text)| {
            let mut columns = text.split('\t');
            let (Some(name), Some(nsti), Some(genes)) =
                (columns.next(), columns.next(), columns.next())
            else {
                return Err(malformed_row(
                    "gene table",
                    line,
                    "expected name<TAB>nsti<TAB>genes",
                ));
            };
            let nsti = match nsti.trim() {
                "" => None,
                value => Some(
                    value
                        .parse::<f64>()
                        .map_err(|_| malformed_row("gene table", line, "nsti is not a number"))?,
                ),
            };
            let genes = genes
                .split(',')
                .map(str::trim)
                .filter(|gene| !gene.is_empty())
                .map(str::to_string)
                .collect();
            Ok(OrganismGenes {
                name: name.trim().to_string(),
                nsti,
                genes,
            })
        })
        .collect()
}
