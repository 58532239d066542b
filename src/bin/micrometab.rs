use std::fs;
use std::process::ExitCode;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use micrometab::annotation::{KeggHttpClient, TogowsHttpClient};
use micrometab::app::{self, App};
use micrometab::config::{ConfigLoader, ResolvedConfig, Source};
use micrometab::domain::KbEntity;
use micrometab::error::MetabError;
use micrometab::exclusion::ExclusionList;
use micrometab::interchange::NetworkDocument;
use micrometab::kb::KbReader;
use micrometab::network::NetworkBuilder;
use micrometab::output::{JsonOutput, StderrProgress};
use micrometab::resolver::{LocalResolver, ReactionResolver, RemoteResolver};
use micrometab::store::Store;
use micrometab::tables::GeneTableFormat;

#[derive(Parser)]
#[command(name = "micrometab")]
#[command(about = "Metabolic networks, seed compounds and pairwise dependency scores from KEGG annotations")]
#[command(version, author)]
struct Cli {
    /// Path to micrometab.json (defaults to ./micrometab.json when present)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Build a network from a list of KEGG orthologs")]
    Build(BuildArgs),
    #[command(about = "Detect seed compounds of a network document")]
    Seeds(SeedsArgs),
    #[command(about = "Compare two network documents (BSS and MCI in both directions)")]
    Compare(CompareArgs),
    #[command(about = "Precompute the very-common compound exclusion list")]
    Hubs(HubsArgs),
    #[command(about = "Build and store networks for every organism in a table")]
    Populate(PopulateArgs),
    #[command(about = "List stored organisms")]
    List,
    #[command(about = "Analyze one stored organism")]
    Show(ShowArgs),
    #[command(about = "Compare two stored organisms")]
    Pair(PairArgs),
    #[command(about = "Look up a gene, reaction, compound or pathway in the knowledge base")]
    Lookup(LookupArgs),
}

#[derive(Args)]
struct BuildArgs {
    /// Ortholog ids (K00001 ...)
    genes: Vec<String>,

    /// File of ortholog ids separated by whitespace or commas
    #[arg(long)]
    genes_file: Option<Utf8PathBuf>,

    /// Write the network document here instead of embedding it in the output
    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct SeedsArgs {
    network: Utf8PathBuf,
}

#[derive(Args)]
struct CompareArgs {
    first: Utf8PathBuf,
    second: Utf8PathBuf,
}

#[derive(Args)]
struct HubsArgs {
    #[arg(long)]
    threshold: Option<usize>,

    /// Destination file (defaults to the configured exclusion list)
    #[arg(long)]
    output: Option<Utf8PathBuf>,
}

#[derive(Args)]
struct PopulateArgs {
    /// name<TAB>taxonomy rows
    taxonomy: Utf8PathBuf,
    /// Gene content per organism, e.g. ko_13_5_precalculated.tab.gz
    genes: Utf8PathBuf,
    #[arg(long, value_enum, default_value_t = GeneTableFormat::Precalc)]
    format: GeneTableFormat,
}

#[derive(Args)]
struct ShowArgs {
    name: String,
}

#[derive(Args)]
struct PairArgs {
    first: String,
    second: String,
}

#[derive(Args)]
struct LookupArgs {
    /// gene:K00001, reaction:R00001, compound:C00001 or pathway:00010
    entity: String,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<MetabError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &MetabError) -> u8 {
    match error {
        MetabError::NotFound { .. }
        | MetabError::OrganismNotFound(_)
        | MetabError::NoMatchingOrganisms { .. }
        | MetabError::MissingOrganisms { .. } => 2,
        MetabError::UpstreamUnavailable { .. }
        | MetabError::UpstreamStatus { .. }
        | MetabError::Http(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;

    match cli.command {
        Commands::Build(args) => run_build(args, &config),
        Commands::Seeds(args) => {
            let report = app::seed_report(&read_document(&args.network)?)?;
            JsonOutput::print_seeds(&report).into_diagnostic()
        }
        Commands::Compare(args) => {
            let comparison = app::compare_documents(
                &read_document(&args.first)?,
                &read_document(&args.second)?,
            )?;
            JsonOutput::print_json(&comparison).into_diagnostic()
        }
        Commands::Hubs(args) => run_hubs(args, &config),
        Commands::Populate(args) => {
            let mut app = make_app(&config, open_kb(&config))?;
            let result = app.populate(&args.taxonomy, &args.genes, args.format, &StderrProgress)?;
            JsonOutput::print_populate(&result).into_diagnostic()
        }
        Commands::List => {
            let app = make_app(&config, open_kb(&config))?;
            JsonOutput::print_list(&app.list()?).into_diagnostic()
        }
        Commands::Show(args) => {
            let app = make_app(&config, open_kb(&config))?;
            JsonOutput::print_single(&app.analyze_single(&args.name)?).into_diagnostic()
        }
        Commands::Pair(args) => {
            let app = make_app(&config, open_kb(&config))?;
            JsonOutput::print_pair(&app.analyze_pair(&args.first, &args.second)?)
                .into_diagnostic()
        }
        Commands::Lookup(args) => run_lookup(args, &config),
    }
}

fn run_build(args: BuildArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let mut genes = args.genes;
    if let Some(path) = &args.genes_file {
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| MetabError::Filesystem(format!("read {path}: {err}")))?;
        genes.extend(
            content
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|gene| !gene.is_empty())
                .map(str::to_string),
        );
    }
    if genes.is_empty() {
        return Err(miette::Report::msg(
            "no genes given (pass ids or --genes-file)",
        ));
    }

    let mut app = make_app(config, open_kb(config))?;
    let result = app.build(&genes)?;
    match &args.output {
        Some(path) => {
            write_json_file(path, &result.network)?;
            info!(path = %path, "wrote network document");
            JsonOutput::print_json(&json!({
                "genes": result.genes,
                "reactions": result.reactions,
                "nodes": result.nodes,
                "edges": result.edges,
                "warnings": result.warnings,
                "network_path": path.as_str(),
            }))
            .into_diagnostic()
        }
        None => JsonOutput::print_build(&result).into_diagnostic(),
    }
}

fn run_hubs(args: HubsArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let mut kb = open_kb(config);
    let genes = kb.gene_ids()?;
    let threshold = args.threshold.unwrap_or(config.hub_threshold);
    let mut app = make_app(config, kb)?;
    let (list, result) = app.hubs(&genes, threshold)?;
    let path = args.output.unwrap_or_else(|| config.exclusion_list.clone());
    list.write(&path)?;
    info!(path = %path, compounds = list.len(), "wrote exclusion list");
    JsonOutput::print_hubs(&result).into_diagnostic()
}

fn run_lookup(args: LookupArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let mut kb = open_kb(config);
    let value = match args.entity.parse::<KbEntity>()? {
        KbEntity::Gene(id) => {
            let ortholog = kb
                .ortholog(&id)?
                .cloned()
                .ok_or_else(|| MetabError::not_found("orthologs", id.as_str()))?;
            json!({ "display_name": ortholog.display_name(), "ortholog": ortholog })
        }
        KbEntity::Reaction(id) => {
            let reaction = kb
                .reaction(&id)?
                .cloned()
                .ok_or_else(|| MetabError::not_found("reactions", id.as_str()))?;
            json!({ "reaction": reaction })
        }
        KbEntity::Compound(id) => {
            let compound = kb
                .compound(&id)?
                .cloned()
                .ok_or_else(|| MetabError::not_found("compounds", id.as_str()))?;
            json!({ "compound": compound })
        }
        KbEntity::Pathway(id) => json!({ "pathway": kb.pathway(&id)? }),
    };
    JsonOutput::print_json(&value).into_diagnostic()
}

fn open_kb(config: &ResolvedConfig) -> KbReader {
    KbReader::new(config.kb_dir.clone()).strict(config.strict_records)
}

/// The knowledge base backs the local source; remote sources ignore it.
fn make_resolver(
    config: &ResolvedConfig,
    kb: KbReader,
) -> Result<Box<dyn ReactionResolver>, MetabError> {
    Ok(match config.source {
        Source::Local => Box::new(LocalResolver::new(kb)),
        Source::Kegg => Box::new(RemoteResolver::new(KeggHttpClient::new()?, config.workers)?),
        Source::Togows => Box::new(RemoteResolver::new(
            TogowsHttpClient::new()?,
            config.workers,
        )?),
    })
}

fn make_app(
    config: &ResolvedConfig,
    kb: KbReader,
) -> Result<App<Box<dyn ReactionResolver>>, MetabError> {
    let exclusion = if config.network.filter_very_common {
        ExclusionList::load_optional(&config.exclusion_list)
    } else {
        None
    };
    let builder = NetworkBuilder::new(config.network).with_exclusion_list(exclusion);
    let store = Store::new(config.store_dir.clone());
    Ok(App::new(store, make_resolver(config, kb)?, builder))
}

fn read_document(path: &Utf8Path) -> Result<NetworkDocument, MetabError> {
    let content = fs::read_to_string(path.as_std_path())
        .map_err(|err| MetabError::Filesystem(format!("read {path}: {err}")))?;
    serde_json::from_str(&content).map_err(|err| MetabError::Interchange(err.to_string()))
}

fn write_json_file(path: &Utf8Path, document: &NetworkDocument) -> Result<(), MetabError> {
    let content = serde_json::to_vec_pretty(document)
        .map_err(|err| MetabError::Interchange(err.to_string()))?;
    fs::write(path.as_std_path(), content)
        .map_err(|err| MetabError::Filesystem(format!("write {path}: {err}")))
}
