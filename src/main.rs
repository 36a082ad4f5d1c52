//! litfetch - literature harvesting for systematic reviews
//!
//! ## Usage
//!
//! ```bash
//! litfetch search --profile review.json --output ./output
//! litfetch grey --limit 50
//! litfetch dedupe --grey
//! litfetch keys set scopus <KEY>
//! ```

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use litfetch::config::{Credentials, SearchProfile};
use litfetch::dedupe::DedupeReport;
use litfetch::pipeline::{Mode, Pipeline, PipelineReport, SourceKind, SourceOptions};
use litfetch::sink::RecordSink;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Harvest, deduplicate and filter bibliographic records
#[derive(Parser)]
#[command(name = "litfetch")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the peer-reviewed sources, then build deduplicated.csv
    Search(HarvestArgs),

    /// Query the grey-literature sources, then build grey_deduplicated.csv
    Grey(HarvestArgs),

    /// Rebuild the canonical table from existing per-source tables
    Dedupe {
        /// Use the grey-literature tables and policy
        #[arg(long)]
        grey: bool,

        /// Search profile JSON (defaults apply when omitted)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Output directory holding the per-source tables
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Comma-separated sources whose tables are merged, in order
        #[arg(long, value_delimiter = ',')]
        sources: Vec<String>,
    },

    /// Manage API keys
    Keys {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Args)]
struct HarvestArgs {
    /// Search profile JSON (defaults apply when omitted)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Output directory
    #[arg(short, long, default_value = "./output")]
    output: PathBuf,

    /// Results per query, overrides the profile
    #[arg(long)]
    limit: Option<usize>,

    /// Comma-separated sources (e.g. "scholar,crossref-acm,pubmed")
    #[arg(long, value_delimiter = ',')]
    sources: Vec<String>,

    /// Proxy URL for the Google Scholar scraper (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    proxy: Option<String>,

    /// Google Scholar mirror site URL
    #[arg(long)]
    mirror: Option<String>,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Show key file path
    Path,
    /// Store an API key (e.g. springer, scopus, pubmed)
    Set { name: String, value: String },
    /// List configured key names
    List,
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt().with_env_filter(filter).with_target(true).with_thread_ids(false).init();

    match cli.command {
        Commands::Search(args) => run_harvest(Mode::Strict, args).await,
        Commands::Grey(args) => run_harvest(Mode::Grey, args).await,
        Commands::Dedupe {
            grey,
            profile,
            output,
            sources,
        } => {
            let mode = if grey { Mode::Grey } else { Mode::Strict };
            run_dedupe(mode, profile, output, sources)
        }
        Commands::Keys { action } => handle_keys(action),
    }
}

// ============================================================================
// Harvest
// ============================================================================

async fn run_harvest(mode: Mode, args: HarvestArgs) -> Result<()> {
    let mut profile = load_profile(args.profile.as_ref())?;
    if let Some(limit) = args.limit {
        if limit == 0 {
            bail!("--limit must be positive");
        }
        profile.max_results = limit;
    }
    let sources = select_sources(mode, &args.sources)?;

    let sink = RecordSink::new(&args.output).context("Failed to create output directory")?;
    let credentials = Credentials::load_default().context("Failed to locate API key file")?;
    let options = SourceOptions {
        proxy: args.proxy,
        scholar_mirror: args.mirror,
    };

    println!("Output folder: {}", sink.dir().display());
    println!("Sources: {}", join_kinds(&sources));
    for query in profile.query_strings() {
        println!("  Query: {}", query);
    }

    let pipeline = Pipeline::new(sink, profile, credentials, options);
    let report = pipeline.run(mode, &sources).await?;

    print_harvest_summary(&report);
    if let Some(dedupe) = &report.dedupe {
        print_dedupe_summary(&pipeline, mode, dedupe);
    }

    let failed = report.failed().count();
    if failed > 0 {
        println!("\n{} of {} sources failed; see log for details.", failed, report.sources.len());
    }

    info!(sources = report.sources.len(), failed = failed, "Run complete");
    Ok(())
}

fn run_dedupe(mode: Mode, profile: Option<PathBuf>, output: PathBuf, sources: Vec<String>) -> Result<()> {
    let profile = load_profile(profile.as_ref())?;
    let sources = select_sources(mode, &sources)?;
    let sink = RecordSink::new(&output).context("Failed to open output directory")?;

    let pipeline = Pipeline::new(sink, profile, Credentials::default(), SourceOptions::default());
    let report = pipeline.dedupe(mode, &sources)?;

    print_dedupe_summary(&pipeline, mode, &report);
    Ok(())
}

fn load_profile(path: Option<&PathBuf>) -> Result<SearchProfile> {
    match path {
        Some(path) => SearchProfile::from_file(path)
            .with_context(|| format!("Failed to load search profile {}", path.display())),
        None => Ok(SearchProfile::default()),
    }
}

fn select_sources(mode: Mode, names: &[String]) -> Result<Vec<SourceKind>> {
    if names.is_empty() {
        return Ok(mode.default_sources());
    }
    names
        .iter()
        .map(|name| name.parse::<SourceKind>().context("Invalid --sources"))
        .collect()
}

fn join_kinds(kinds: &[SourceKind]) -> String {
    kinds.iter().map(|k| k.to_string()).collect::<Vec<_>>().join(", ")
}

fn print_harvest_summary(report: &PipelineReport) {
    println!("\n--- Harvest ---");
    for outcome in &report.sources {
        match (&outcome.harvest, &outcome.error) {
            (Some(harvest), _) => println!(
                "  {:<20} {:>5} written, {:>4} skipped -> {}.csv",
                outcome.source, harvest.written, harvest.skipped, harvest.table
            ),
            (None, Some(error)) => println!("  {:<20} FAILED: {}", outcome.source, error),
            (None, None) => println!("  {:<20} no result", outcome.source),
        }
    }
}

fn print_dedupe_summary(pipeline: &Pipeline, mode: Mode, report: &DedupeReport) {
    println!("\n--- Deduplication ---");
    for line in dedupe_summary(report, &pipeline.sink().table_path(mode.output())) {
        println!("{}", line);
    }
}

fn dedupe_summary(report: &DedupeReport, output: &Path) -> Vec<String> {
    let mut lines = vec![
        format!("  Rows scanned:      {}", report.scanned),
        format!("  Unparseable year:  {}", report.skipped_year),
        format!("  Excluded:          {}", report.excluded),
        format!("  Malformed:         {}", report.malformed),
    ];
    if !report.missing_tables.is_empty() {
        lines.push(format!("  Missing tables:    {}", report.missing_tables.join(", ")));
    }
    lines.push(format!("  Unique records:    {} -> {}", report.retained, output.display()));
    lines
}

// ============================================================================
// Key Management
// ============================================================================

fn handle_keys(action: KeyAction) -> Result<()> {
    let mut credentials = Credentials::load_default().context("Failed to locate API key file")?;

    match action {
        KeyAction::Path => {
            println!("Key file: {:?}", credentials.path());
        }
        KeyAction::Set { name, value } => {
            credentials.set(&name, &value);
            credentials.save().context("Failed to save API keys")?;
            println!("Stored key '{}'.", name);
        }
        KeyAction::List => {
            let names: Vec<&str> = credentials.names().collect();
            if names.is_empty() {
                println!("No keys configured in {:?}", credentials.path());
            } else {
                for name in names {
                    println!("  {}", name);
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_summary_labels_counters() {
        let report = DedupeReport {
            scanned: 10,
            retained: 4,
            skipped_year: 3,
            excluded: 2,
            malformed: 1,
            missing_tables: vec!["scopus".to_string()],
        };
        let lines = dedupe_summary(&report, Path::new("out/deduplicated.csv"));

        assert_eq!(lines[1], "  Unparseable year:  3");
        assert_eq!(lines[2], "  Excluded:          2");
        assert_eq!(lines[4], "  Missing tables:    scopus");
        assert_eq!(lines[5], "  Unique records:    4 -> out/deduplicated.csv");
    }
}
