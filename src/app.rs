use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use camino::Utf8Path;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::MetabError;
use crate::exclusion::ExclusionList;
use crate::interchange::NetworkDocument;
use crate::metrics::{self, Directional, SeedComparison};
use crate::network::{MetabolicNetwork, NetworkBuilder, NetworkOptions};
use crate::resolver::{LookupWarning, ReactionResolver};
use crate::seeds::{SeedAnnotations, SeedSets, detect_seeds};
use crate::store::{GenomeRecord, Store};
use crate::tables::{GeneTableFormat, OrganismGenes, read_gene_content, read_taxonomy_table};
use crate::taxonomy::pretty_taxonomy;

/// Components smaller than this are pruned from stored organism networks.
pub const POPULATE_MIN_COMPONENT_SIZE: usize = 4;

#[derive(Debug, Clone, Serialize)]
pub struct BuildResult {
    pub genes: usize,
    pub reactions: usize,
    pub nodes: usize,
    pub edges: usize,
    pub warnings: Vec<LookupWarning>,
    pub network: NetworkDocument,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedReport {
    pub seeds: Vec<String>,
    pub seed_groups: BTreeMap<usize, BTreeSet<String>>,
    pub network: NetworkDocument,
}

#[derive(Debug, Clone, Serialize)]
pub struct SingleAnalysis {
    pub name: String,
    pub taxonomy: String,
    pub pretty_taxonomy: String,
    pub nsti: Option<f64>,
    #[serde(flatten)]
    pub report: SeedReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub seeds: SeedComparison,
    pub bss: Directional,
    pub mci: Directional,
    pub bss_rounded: Directional,
    pub mci_rounded: Directional,
    pub first_network: NetworkDocument,
    pub second_network: NetworkDocument,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrganismSummary {
    pub name: String,
    pub taxonomy: String,
    pub pretty_taxonomy: String,
    pub nsti: Option<f64>,
}

impl From<&GenomeRecord> for OrganismSummary {
    fn from(record: &GenomeRecord) -> Self {
        Self {
            name: record.name.clone(),
            taxonomy: record.taxonomy.clone(),
            pretty_taxonomy: pretty_taxonomy(&record.taxonomy),
            nsti: record.nsti,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PairAnalysis {
    pub first: OrganismSummary,
    pub second: OrganismSummary,
    #[serde(flatten)]
    pub comparison: Comparison,
}

#[derive(Debug, Clone, Serialize)]
pub struct HubsResult {
    pub threshold: usize,
    pub reference_nodes: usize,
    pub compounds: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulateResult {
    pub stored: Vec<PopulateItem>,
    pub skipped: Vec<String>,
    pub failed: Vec<PopulateFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulateFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulateItem {
    pub name: String,
    pub nodes: usize,
    pub edges: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListResult {
    pub organisms: Vec<OrganismSummary>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<R: ReactionResolver> {
    store: Store,
    resolver: R,
    builder: NetworkBuilder,
}

impl<R: ReactionResolver> App<R> {
    pub fn new(store: Store, resolver: R, builder: NetworkBuilder) -> Self {
        Self {
            store,
            resolver,
            builder,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn resolver_mut(&mut self) -> &mut R {
        &mut self.resolver
    }

    /// Resolves a gene list and builds its filtered network.
    pub fn build(&mut self, genes: &[String]) -> Result<BuildResult, MetabError> {
        let builder = self.builder.clone();
        self.build_with(&builder, genes)
    }

    fn build_with(
        &mut self,
        builder: &NetworkBuilder,
        genes: &[String],
    ) -> Result<BuildResult, MetabError> {
        let (network, reactions, warnings) = self.resolve_network(builder, genes)?;
        Ok(BuildResult {
            genes: genes.len(),
            reactions,
            nodes: network.node_count(),
            edges: network.edge_count(),
            warnings,
            network: NetworkDocument::from_network(&network),
        })
    }

    fn resolve_network(
        &mut self,
        builder: &NetworkBuilder,
        genes: &[String],
    ) -> Result<(MetabolicNetwork, usize, Vec<LookupWarning>), MetabError> {
        let reactome = self.resolver.resolve_genome(genes)?;
        let equations = self.resolver.resolve_reactions(&reactome)?;
        let network = builder.build(&equations);
        let warnings = self.resolver.take_warnings();
        if !warnings.is_empty() {
            warn!(
                count = warnings.len(),
                "some annotations could not be resolved"
            );
        }
        Ok((network, reactome.len(), warnings))
    }

    /// Builds an unfiltered reference network over `genes` and lists every
    /// compound whose degree reaches `threshold`.
    pub fn hubs(
        &mut self,
        genes: &[String],
        threshold: usize,
    ) -> Result<(ExclusionList, HubsResult), MetabError> {
        let builder = self.builder.with_options(NetworkOptions::unfiltered());
        let (reference, _, _) = self.resolve_network(&builder, genes)?;
        let list = ExclusionList::from_reference(&reference, threshold);
        let result = HubsResult {
            threshold,
            reference_nodes: reference.node_count(),
            compounds: list.iter().map(str::to_string).collect(),
        };
        Ok((list, result))
    }

    /// Builds and stores one organism.
    pub fn add_organism(
        &mut self,
        organism: &OrganismGenes,
        taxonomy: &str,
    ) -> Result<(GenomeRecord, usize), MetabError> {
        let options = NetworkOptions {
            min_component_size: Some(POPULATE_MIN_COMPONENT_SIZE),
            ..*self.builder.options()
        };
        let builder = self.builder.with_options(options);
        let (network, _, warnings) = self.resolve_network(&builder, &organism.genes)?;
        let record = GenomeRecord::new(
            organism.name.clone(),
            taxonomy,
            organism.nsti,
            organism.genes.clone(),
            NetworkDocument::from_network(&network),
        );
        self.store.save(&record)?;
        Ok((record, warnings.len()))
    }

    /// Stores every organism of the taxonomy table that has gene content.
    ///
    /// An organism that cannot be built or saved is recorded in
    /// `failed` and the remaining organisms are still processed.
    pub fn populate(
        &mut self,
        taxonomy_table: &Utf8Path,
        gene_table: &Utf8Path,
        format: GeneTableFormat,
        sink: &dyn ProgressSink,
    ) -> Result<PopulateResult, MetabError> {
        let organisms = read_taxonomy_table(taxonomy_table)?;
        let names: Vec<String> = organisms.iter().map(|(name, _)| name.clone()).collect();
        let genomes = read_gene_content(gene_table, format, &names)?;
        let by_name: BTreeMap<&str, &OrganismGenes> =
            genomes.iter().map(|g| (g.name.as_str(), g)).collect();

        let started = Instant::now();
        let mut stored = Vec::new();
        let mut skipped = Vec::new();
        let mut failed = Vec::new();
        for (name, taxonomy) in &organisms {
            let Some(organism) = by_name.get(name.as_str()) else {
                warn!(organism = %name, "no gene content for organism; skipping");
                skipped.push(name.clone());
                continue;
            };
            let (record, warnings) = match self.add_organism(organism, taxonomy) {
                Ok(added) => added,
                Err(err) => {
                    warn!(organism = %name, error = %err, "failed to store organism");
                    sink.event(ProgressEvent {
                        message: format!("failed {name}: {err}"),
                        elapsed: Some(started.elapsed()),
                    });
                    failed.push(PopulateFailure {
                        name: name.clone(),
                        error: err.to_string(),
                    });
                    continue;
                }
            };
            let item = PopulateItem {
                name: record.name.clone(),
                nodes: record.network.elements.nodes.len(),
                edges: record.network.elements.edges.len(),
                warnings,
            };
            sink.event(ProgressEvent {
                message: format!(
                    "stored {} ({} nodes, {} edges)",
                    item.name, item.nodes, item.edges
                ),
                elapsed: Some(started.elapsed()),
            });
            stored.push(item);
        }
        info!(
            stored = stored.len(),
            skipped = skipped.len(),
            failed = failed.len(),
            "population finished"
        );
        Ok(PopulateResult {
            stored,
            skipped,
            failed,
        })
    }

    pub fn list(&self) -> Result<ListResult, MetabError> {
        let organisms = self
            .store
            .list()?
            .iter()
            .map(OrganismSummary::from)
            .collect();
        Ok(ListResult { organisms })
    }

    pub fn analyze_single(&self, name: &str) -> Result<SingleAnalysis, MetabError> {
        let record = self.store.load(name)?;
        let report = seed_report(&record.network)?;
        Ok(SingleAnalysis {
            pretty_taxonomy: pretty_taxonomy(&record.taxonomy),
            name: record.name,
            taxonomy: record.taxonomy,
            nsti: record.nsti,
            report,
        })
    }

    pub fn analyze_pair(&self, first: &str, second: &str) -> Result<PairAnalysis, MetabError> {
        let first = self.store.load(first)?;
        let second = self.store.load(second)?;
        let comparison = compare_documents(&first.network, &second.network)?;
        Ok(PairAnalysis {
            first: OrganismSummary::from(&first),
            second: OrganismSummary::from(&second),
            comparison,
        })
    }
}

fn analyze(
    document: &NetworkDocument,
) -> Result<(MetabolicNetwork, SeedAnnotations, SeedSets), MetabError> {
    let (network, _) = document.to_network()?;
    let (annotations, seeds) = detect_seeds(&network);
    Ok((network, annotations, seeds))
}

/// Seed detection over a stored or exported network document.
pub fn seed_report(document: &NetworkDocument) -> Result<SeedReport, MetabError> {
    let (network, annotations, seeds) = analyze(document)?;
    Ok(SeedReport {
        seeds: seeds.all_seeds().into_iter().collect(),
        seed_groups: seeds
            .groups()
            .map(|(group, members)| (group, members.clone()))
            .collect(),
        network: NetworkDocument::from_annotated(&network, &annotations),
    })
}

pub fn compare_documents(
    first: &NetworkDocument,
    second: &NetworkDocument,
) -> Result<Comparison, MetabError> {
    let (network1, annotations1, seeds1) = analyze(first)?;
    let (network2, annotations2, seeds2) = analyze(second)?;
    let bss = metrics::bss(&network1, &seeds1, &network2, &seeds2);
    let mci = metrics::mci(&network1, &seeds1, &network2, &seeds2);
    Ok(Comparison {
        seeds: SeedComparison::new(&seeds1, &seeds2),
        bss,
        mci,
        bss_rounded: bss.rounded(),
        mci_rounded: mci.rounded(),
        first_network: NetworkDocument::from_annotated(&network1, &annotations1),
        second_network: NetworkDocument::from_annotated(&network2, &annotations2),
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::fs;
    use std::sync::Mutex;

    use assert_matches::assert_matches;
    use camino::Utf8PathBuf;

    use super::*;
    use crate::domain::Equation;
    use crate::metrics::Score;

    /// Gene `Kn` catalyses reaction `Rn`; equations are fixed per reaction.
    struct MockResolver {
        genes: HashMap<String, Vec<String>>,
        equations: HashMap<String, Equation>,
        calls: Mutex<usize>,
    }

    impl MockResolver {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            let mut genes = HashMap::new();
            let mut equations = HashMap::new();
            for (gene, reaction, equation) in entries {
                genes
                    .entry(gene.to_string())
                    .or_insert_with(Vec::new)
                    .push(reaction.to_string());
                equations.insert(reaction.to_string(), equation.parse().unwrap());
            }
            Self {
                genes,
                equations,
                calls: Mutex::new(0),
            }
        }
    }

    impl ReactionResolver for MockResolver {
        fn resolve_genome(&mut self, genes: &[String]) -> Result<BTreeSet<String>, MetabError> {
            *self.calls.lock().unwrap() += 1;
            Ok(genes
                .iter()
                .filter_map(|gene| self.genes.get(gene))
                .flatten()
                .cloned()
                .collect())
        }

        fn resolve_reactions(
            &mut self,
            reactions: &BTreeSet<String>,
        ) -> Result<Vec<Equation>, MetabError> {
            Ok(reactions
                .iter()
                .filter_map(|r| self.equations.get(r).cloned())
                .collect())
        }

        fn take_warnings(&mut self) -> Vec<LookupWarning> {
            Vec::new()
        }
    }

    struct NullSink;

    impl ProgressSink for NullSink {
        fn event(&self, _event: ProgressEvent) {}
    }

    fn app(temp: &tempfile::TempDir, resolver: MockResolver) -> App<MockResolver> {
        let root = Utf8PathBuf::from_path_buf(temp.path().join("store")).unwrap();
        App::new(
            Store::new(root),
            resolver,
            NetworkBuilder::new(NetworkOptions::unfiltered()),
        )
    }

    fn genes(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn build_resolves_and_filters() {
        let temp = tempfile::tempdir().unwrap();
        let mut app = app(
            &temp,
            MockResolver::new(&[
                ("K00001", "R00001", "C00001 => C00002"),
                ("K00002", "R00002", "C00002 => C00003"),
            ]),
        );
        let result = app.build(&genes(&["K00001", "K00002", "K99999"])).unwrap();
        assert_eq!(result.genes, 3);
        assert_eq!(result.reactions, 2);
        assert_eq!(result.nodes, 3);
        assert_eq!(result.edges, 2);
    }

    #[test]
    fn stored_organisms_drop_small_components() {
        let temp = tempfile::tempdir().unwrap();
        let mut app = app(
            &temp,
            MockResolver::new(&[
                ("K00001", "R00001", "C00001 => C00002 + C00003 + C00004"),
                ("K00002", "R00002", "C00010 => C00011"),
            ]),
        );
        let organism = OrganismGenes {
            name: "otu1".to_string(),
            nsti: Some(0.1),
            genes: genes(&["K00001", "K00002"]),
        };
        let (record, _) = app.add_organism(&organism, "k__Bacteria").unwrap();
        assert_eq!(record.network.elements.nodes.len(), 4);
        assert_eq!(app.store().load("otu1").unwrap(), record);
    }

    #[test]
    fn pair_analysis_reports_both_directions() {
        let temp = tempfile::tempdir().unwrap();
        let mut app = app(
            &temp,
            MockResolver::new(&[
                ("K00001", "R00001", "C00001 => C00002 + C00003 + C00004"),
                ("K00002", "R00002", "C00009 => C00001 + C00005 + C00006"),
            ]),
        );
        for (name, gene) in [("a", "K00001"), ("b", "K00002")] {
            let organism = OrganismGenes {
                name: name.to_string(),
                nsti: None,
                genes: genes(&[gene]),
            };
            app.add_organism(&organism, "k__Bacteria; p__Firmicutes").unwrap();
        }

        let pair = app.analyze_pair("a", "b").unwrap();
        assert_eq!(pair.first.pretty_taxonomy, "Firmicutes phylum");
        assert_eq!(pair.comparison.bss.first_to_second, Score::Value(1.0));
        assert_eq!(pair.comparison.mci.first_to_second, Score::Value(1.0));
        assert_eq!(pair.comparison.bss.second_to_first, Score::Value(0.0));
        assert_eq!(pair.comparison.seeds.only_first, BTreeSet::from(["C00001".to_string()]));
        assert_eq!(pair.comparison.seeds.only_second, BTreeSet::from(["C00009".to_string()]));
        assert!(pair.comparison.seeds.shared.is_empty());
    }

    #[test]
    fn single_analysis_sorts_seeds() {
        let temp = tempfile::tempdir().unwrap();
        let mut app = app(
            &temp,
            MockResolver::new(&[("K00001", "R00001", "C00005 + C00002 => C00003 + C00004")]),
        );
        let organism = OrganismGenes {
            name: "otu".to_string(),
            nsti: None,
            genes: genes(&["K00001"]),
        };
        app.add_organism(&organism, "").unwrap();
        let single = app.analyze_single("otu").unwrap();
        assert_eq!(single.pretty_taxonomy, "Unclassified");
        assert_eq!(single.report.seeds, ["C00002", "C00005"]);
        assert_eq!(single.report.seed_groups.len(), 2);
    }

    #[test]
    fn populate_skips_organisms_without_genes() {
        let temp = tempfile::tempdir().unwrap();
        let taxonomy = Utf8PathBuf::from_path_buf(temp.path().join("taxonomy.tsv")).unwrap();
        let gene_table = Utf8PathBuf::from_path_buf(temp.path().join("genes.tsv")).unwrap();
        fs::write(&taxonomy, "1\tk__Bacteria\n2\tk__Archaea\n").unwrap();
        fs::write(&gene_table, "# name\tnsti\tgenes\n1\t0.05\tK00001,K00002\n").unwrap();

        let mut app = app(
            &temp,
            MockResolver::new(&[("K00001", "R00001", "C00001 => C00002 + C00003 + C00004")]),
        );
        let result = app
            .populate(&taxonomy, &gene_table, GeneTableFormat::Tsv, &NullSink)
            .unwrap();
        assert_eq!(result.stored.len(), 1);
        assert_eq!(result.skipped, ["2"]);
        assert!(result.failed.is_empty());
        assert_eq!(app.store().load("1").unwrap().nsti, Some(0.05));
    }

    #[test]
    fn populate_records_failures_and_continues() {
        let temp = tempfile::tempdir().unwrap();
        let taxonomy = Utf8PathBuf::from_path_buf(temp.path().join("taxonomy.tsv")).unwrap();
        let gene_table = Utf8PathBuf::from_path_buf(temp.path().join("genes.tsv")).unwrap();
        fs::write(&taxonomy, "../bad\tk__Bacteria\n1\tk__Bacteria\n").unwrap();
        fs::write(&gene_table, "../bad\t\tK00001\n1\t\tK00001\n").unwrap();

        let mut app = app(
            &temp,
            MockResolver::new(&[("K00001", "R00001", "C00001 => C00002 + C00003 + C00004")]),
        );
        let result = app
            .populate(&taxonomy, &gene_table, GeneTableFormat::Tsv, &NullSink)
            .unwrap();
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].name, "../bad");
        assert_eq!(result.stored.len(), 1);
        assert_eq!(result.stored[0].name, "1");
        assert!(app.store().load("1").is_ok());
    }

    #[test]
    fn hubs_use_the_unfiltered_reference() {
        let temp = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(temp.path().join("store")).unwrap();
        let resolver = MockResolver::new(&[
            ("K00001", "R00001", "C00001 => C00002 + C00003"),
            ("K00002", "R00002", "C00004 => C00001"),
        ]);
        let builder = NetworkBuilder::new(NetworkOptions {
            only_giant: true,
            ..NetworkOptions::default()
        });
        let mut app = App::new(Store::new(root), resolver, builder);
        let (list, result) = app.hubs(&genes(&["K00001", "K00002"]), 3).unwrap();
        assert_eq!(result.reference_nodes, 4);
        assert_eq!(result.compounds, ["C00001"]);
        assert!(list.contains("C00001"));
        assert_eq!(*app.resolver_mut().calls.lock().unwrap(), 1);
    }

    #[test]
    fn missing_organism_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let app = app(&temp, MockResolver::new(&[]));
        assert_matches!(app.analyze_single("nope"), Err(MetabError::OrganismNotFound(_)));
    }
}
