//! `scorecard` command-line entrypoint.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use scorecard_core::{segment, EvidenceSelector, LexicalIndex, Report, Rubric};
use scorecard_runtime::{RuntimeConfig, ScoringOrchestrator};

#[derive(Debug, Parser)]
#[command(name = "scorecard", version, about = "Score documents against weighted rubrics")]
struct Cli {
    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Score a plain-text document and write JSON and CSV reports
    Score {
        /// UTF-8 plain-text document, paragraphs separated by newlines
        #[arg(short, long)]
        document: PathBuf,

        /// Rubric file (.json, .yaml or .yml)
        #[arg(short, long)]
        rubric: PathBuf,

        /// Runtime configuration file (.yaml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Directory for the report artifacts
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Maximum oracle requests in flight
        #[arg(long)]
        concurrency: Option<usize>,

        /// Per-request timeout, e.g. 90s or 2m
        #[arg(long)]
        timeout: Option<humantime::Duration>,

        /// Model identifier
        #[arg(long)]
        model: Option<String>,

        /// Chat-completions endpoint URL
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Print the evidence bundle a query would receive (no network)
    Evidence {
        #[arg(short, long)]
        document: PathBuf,

        #[arg(short, long)]
        query: String,

        /// Candidate sentences
        #[arg(short, long, default_value_t = scorecard_core::DEFAULT_EVIDENCE_K)]
        k: usize,

        /// Token budget
        #[arg(short, long, default_value_t = scorecard_core::DEFAULT_EVIDENCE_TOKEN_BUDGET)]
        budget: usize,
    },

    /// Load and validate a rubric
    Validate {
        #[arg(short, long)]
        rubric: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Score {
            document,
            rubric,
            config,
            out_dir,
            concurrency,
            timeout,
            model,
            endpoint,
        } => {
            let mut config = match config {
                Some(path) => RuntimeConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => RuntimeConfig::default(),
            }
            .apply_env()
            .context("Invalid environment override")?;

            if let Some(concurrency) = concurrency {
                config.concurrency = concurrency;
            }
            if let Some(timeout) = timeout {
                config.request_timeout = timeout.into();
            }
            if let Some(model) = model {
                config.model = model;
            }
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint;
            }

            run_score(&document, &rubric, config, &out_dir).await
        }
        Command::Evidence {
            document,
            query,
            k,
            budget,
        } => {
            let text = read_document(&document)?;
            let index = LexicalIndex::new(segment(&text));
            let bundle = EvidenceSelector::new(k, budget).select(&index, &query);
            tracing::info!(
                sentences = index.len(),
                selected = bundle.len(),
                tokens = bundle.token_count,
                "Evidence selected"
            );
            println!("{}", bundle);
            Ok(())
        }
        Command::Validate { rubric } => {
            let rubric = load_rubric(&rubric)?;
            for (dimension, count) in rubric.dimension_counts() {
                println!("{}\t{}", dimension, count);
            }
            println!("{} criteria", rubric.criterion_count());
            Ok(())
        }
    }
}

async fn run_score(
    document: &Path,
    rubric: &Path,
    config: RuntimeConfig,
    out_dir: &Path,
) -> Result<()> {
    let text = read_document(document)?;
    let rubric = load_rubric(rubric)?;

    let orchestrator =
        ScoringOrchestrator::from_config(config).context("Failed to set up scoring")?;
    let run = orchestrator
        .score_document(&text, &rubric)
        .await
        .context("Scoring run failed")?;

    let (json_path, csv_path) = write_artifacts(&run.report, out_dir, &artifact_tag())?;

    if run.report.degraded_count() > 0 {
        tracing::warn!(
            degraded = run.report.degraded_count(),
            "Some criteria were scored with sentinel verdicts"
        );
    }

    println!("Total score: {}", run.report.total);
    println!("Reports: {} / {}", json_path.display(), csv_path.display());
    Ok(())
}

fn read_document(path: &Path) -> Result<String> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    if text.trim().is_empty() {
        tracing::warn!(document = %path.display(), "Document is empty");
    }
    Ok(text)
}

fn load_rubric(path: &Path) -> Result<Rubric> {
    Rubric::from_file(path).with_context(|| format!("Invalid rubric {}", path.display()))
}

/// UTC timestamp plus process id, so concurrent runs never share a name.
fn artifact_tag() -> String {
    format!(
        "{}_{}",
        chrono::Utc::now().format("%Y%m%d%H%M%S"),
        std::process::id()
    )
}

fn write_new(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(contents)
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Write `score_<tag>.json` and `score_<tag>.csv` into `out_dir`.
///
/// Existing files are never overwritten.
fn write_artifacts(report: &Report, out_dir: &Path, tag: &str) -> Result<(PathBuf, PathBuf)> {
    if out_dir.exists() && !out_dir.is_dir() {
        bail!("Output path {} is not a directory", out_dir.display());
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let json_path = out_dir.join(format!("score_{}.json", tag));
    let csv_path = out_dir.join(format!("score_{}.csv", tag));

    let json = report.to_json_pretty().context("Failed to serialize report")?;
    write_new(&json_path, json.as_bytes())?;
    write_new(&csv_path, report.to_csv().as_bytes())?;

    Ok((json_path, csv_path))
}
