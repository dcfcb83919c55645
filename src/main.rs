//! # Advisory Harness CLI (`advisor`)
//!
//! Operator surface over the harness library: resolve the remote index,
//! ingest a knowledge base, inspect the cooldown gate, and run the
//! output parser and visual heuristics by hand.
//!
//! ## Usage
//!
//! ```bash
//! advisor --config ./config/advisor.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `advisor index` | Resolve (or create) the remote document index |
//! | `advisor upload <paths…>` | Upload files, skipping content already indexed |
//! | `advisor ingest` | Upload every document under the knowledge base |
//! | `advisor gate check <topic>` | Show whether a generation would run now |
//! | `advisor gate record <topic>` | Record a generation for a topic |
//! | `advisor parse [file]` | Extract a record from model output |
//! | `advisor svg [file]` | Extract an SVG document from model output |
//! | `advisor decide "<question>"` | Visual-intent keyword decision |
//! | `advisor classify "<question>"` | Visual-vs-text classification |
//! | `advisor infographic "<topic>"` | Generate a gated infographic |
//!
//! `parse`, `svg` and `decide` need no config file. Results go to stdout;
//! logs and progress go to stderr.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::Read;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use advisory_harness::config::load_config;
use advisory_harness::harness::Harness;
use advisory_harness::progress::ProgressMode;
use advisory_harness_core::cooldown::GateDecision;
use advisory_harness_core::models::IngestSummary;
use advisory_harness_core::parse::{extract, extract_svg};
use advisory_harness_core::visual::decide_visual;

/// Advisory Harness CLI: deduplicated knowledge-base ingestion, generation
/// cooldowns, and resilient model-output parsing.
#[derive(Parser)]
#[command(
    name = "advisor",
    about = "Advisory Harness — deduplicated ingestion, generation cooldowns, and model-output parsing",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/advisor.toml")]
    config: PathBuf,

    /// Progress output for uploads (stderr). Defaults to human output on a
    /// TTY, off otherwise.
    #[arg(long, global = true, value_enum, default_value = "auto")]
    progress: ProgressArg,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ProgressArg {
    Auto,
    Off,
    Human,
    Json,
}

impl ProgressArg {
    fn mode(self) -> ProgressMode {
        match self {
            ProgressArg::Auto => ProgressMode::default_for_tty(),
            ProgressArg::Off => ProgressMode::Off,
            ProgressArg::Human => ProgressMode::Human,
            ProgressArg::Json => ProgressMode::Json,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve the remote index, creating and persisting it on first use.
    Index,

    /// Upload files, skipping any whose content is already in the index.
    Upload {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Upload every whitelisted document under the knowledge base.
    Ingest {
        /// Knowledge-base root (defaults to `ingest.root`).
        #[arg(long)]
        root: Option<PathBuf>,
    },

    /// Inspect or update the generation cooldown gate.
    Gate {
        #[command(subcommand)]
        action: GateAction,
    },

    /// Extract a structured record from model output (stdin when no file).
    Parse { file: Option<PathBuf> },

    /// Extract an SVG document from model output (stdin when no file).
    Svg { file: Option<PathBuf> },

    /// Decide whether a question warrants a visual answer (keywords only).
    Decide { question: String },

    /// Classify a question as visual or text.
    Classify { question: String },

    /// Generate an infographic image for a topic, subject to the cooldown.
    Infographic {
        topic: String,

        /// Context for the image (truncated).
        #[arg(long, default_value = "")]
        content: String,

        #[arg(long, default_value = "english")]
        language: String,

        /// Attach reference images from this category folder.
        #[arg(long)]
        reference: Option<String>,

        /// Ignore the cooldown.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum GateAction {
    /// Show whether a generation for `topic` would run now.
    Check {
        topic: String,
        #[arg(long)]
        force: bool,
    },
    /// Record a generation for `topic` now.
    Record { topic: String },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    match &cli.command {
        Commands::Parse { file } => return run_parse(file.as_ref()),
        Commands::Svg { file } => return run_svg(file.as_ref()),
        Commands::Decide { question } => {
            println!("{}", serde_json::to_string_pretty(&decide_visual(question))?);
            return Ok(());
        }
        _ => {}
    }

    let cfg = load_config(&cli.config)?;
    let harness = Harness::from_config(cfg);
    let progress = cli.progress.mode().reporter();

    match cli.command {
        Commands::Index => {
            let handle = harness.ensure_index()?;
            println!("{}", serde_json::to_string_pretty(&handle)?);
        }
        Commands::Upload { paths } => {
            let summary = harness.upload_files(&paths, progress.as_ref())?;
            print_summary(&summary);
        }
        Commands::Ingest { root } => {
            let summary = harness.ingest_directory(root.as_deref(), progress.as_ref())?;
            print_summary(&summary);
        }
        Commands::Gate { action } => match action {
            GateAction::Check { topic, force } => {
                let decision = harness.evaluate_gate(&topic, force);
                println!("{}", serde_json::to_string_pretty(&decision_json(&decision))?);
            }
            GateAction::Record { topic } => {
                if !harness.record_generation(&topic) {
                    bail!("failed to persist cooldown for '{}'", topic);
                }
                println!("Recorded generation for '{}'.", topic);
            }
        },
        Commands::Classify { question } => {
            let classification = harness.classify_query(&question);
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Commands::Infographic {
            topic,
            content,
            language,
            reference,
            force,
        } => {
            match harness.generate_infographic(
                &content,
                &topic,
                &language,
                force,
                reference.as_deref(),
            )? {
                Some(path) => println!(
                    "{}",
                    harness.config().storage.output_dir.join(path).display()
                ),
                None => println!("No infographic generated (cooling down or no image returned)."),
            }
        }
        Commands::Parse { .. } | Commands::Svg { .. } | Commands::Decide { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

fn read_input(file: Option<&PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn run_parse(file: Option<&PathBuf>) -> Result<()> {
    let raw = read_input(file)?;
    match extract(&raw) {
        Some(extraction) => {
            tracing::debug!(
                strategy = ?extraction.strategy,
                region = ?extraction.region,
                "record extracted"
            );
            println!("{}", serde_json::to_string_pretty(&extraction.record)?);
            Ok(())
        }
        None => bail!("No structured record found in input"),
    }
}

fn run_svg(file: Option<&PathBuf>) -> Result<()> {
    let raw = read_input(file)?;
    match extract_svg(&raw) {
        Some(svg) => {
            println!("{}", svg);
            Ok(())
        }
        None => bail!("No SVG document found in input"),
    }
}

fn decision_json(decision: &GateDecision) -> serde_json::Value {
    let (kind, detail) = match decision {
        GateDecision::Forced => ("forced", serde_json::Value::Null),
        GateDecision::Override { token } => ("override", serde_json::json!({ "token": token })),
        GateDecision::Fresh => ("fresh", serde_json::Value::Null),
        GateDecision::Expired { elapsed } => (
            "expired",
            serde_json::json!({ "elapsed_secs": elapsed.num_seconds() }),
        ),
        GateDecision::CoolingDown { remaining } => (
            "cooling_down",
            serde_json::json!({ "remaining_secs": remaining.num_seconds() }),
        ),
    };
    serde_json::json!({
        "allow": decision.allows(),
        "decision": kind,
        "detail": detail,
    })
}

fn print_summary(summary: &IngestSummary) {
    println!(
        "Ingested {}/{} files ({} uploaded, {} skipped, {} failed).",
        summary.succeeded,
        summary.attempted,
        summary.uploaded(),
        summary.skipped(),
        summary.failed()
    );
    for outcome in summary.results.iter().filter(|o| !o.is_success()) {
        println!(
            "  failed: {} ({})",
            outcome.path.display(),
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
}
