//! Command line interface for alignment preparation
//!
//! Builds synchronous products of a model and the traces of a log (for an external model checker),
//! and turns the marking traces found by that checker back into alignments.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sync_align::{
    conformance::replay::ReplayMode,
    petri_net::image_export::{export_petri_net_image_svg, petri_net_to_dot},
    pipeline, AlignConfig,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sync-align")]
#[command(about = "Synchronous products and marking-trace replay for alignment-based conformance checking", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a synchronous product and a reachability constraint for each trace of a log
    ///
    /// Writes 'syncmodel-i.pnml' and 'invariant-i.txt' for every trace i.
    BuildProduct {
        /// Accepting Petri net (.pnml)
        model: PathBuf,
        /// Event log (.csv, .xes or .xes.gz)
        log: PathBuf,
        /// Existing output directory
        outdir: PathBuf,
        /// Also write 'syncmodel-i.dot'
        #[arg(long)]
        dot: bool,
        /// Process traces one after another
        #[arg(long)]
        sequential: bool,
    },

    /// Turn a marking trace of a synchronous product into an alignment
    Replay {
        /// Synchronous product (.pnml)
        product: PathBuf,
        /// Marking trace reported by the model checker
        trace: PathBuf,
        /// Match moves by their touched places instead of complete markings
        #[arg(long)]
        legacy: bool,
        /// Render the product with the fired transitions highlighted (.dot or .svg)
        #[arg(long, value_name = "FILE")]
        dot: Option<PathBuf>,
        /// Print the alignment as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the number of places, transitions and arcs of a net
    Inspect {
        /// Petri net (.pnml)
        model: PathBuf,
    },

    /// Write the reachable markings of a net as DOT
    MarkingGraph {
        /// Petri net (.pnml)
        model: PathBuf,
        /// Output file (.dot)
        out: PathBuf,
        /// Maximal number of states
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn load_config(path: Option<&Path>) -> Result<AlignConfig> {
    match path {
        Some(path) => AlignConfig::from_path(path)
            .with_context(|| format!("failed to read config {}", path.display())),
        None => Ok(AlignConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::BuildProduct {
            model,
            log,
            outdir,
            dot,
            sequential,
        } => {
            config.write_dot |= dot;
            config.parallel &= !sequential;
            let outcomes = pipeline::build_products(&model, &log, &outdir, &config)
                .with_context(|| format!("failed to build products for {}", model.display()))?;
            let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
            tracing::info!(
                "Built {} of {} synchronous products in {}",
                outcomes.len() - failed,
                outcomes.len(),
                outdir.display()
            );
            if failed > 0 {
                bail!("{failed} traces failed");
            }
        }

        Commands::Replay {
            product,
            trace,
            legacy,
            dot,
            json,
        } => {
            if legacy {
                config.replay_mode = ReplayMode::Signature;
            }
            let (net, outcome) = pipeline::replay_files(&product, &trace, &config)
                .with_context(|| format!("failed to replay {}", trace.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.alignment)?);
            } else {
                print!("{}", outcome.alignment);
            }
            if let Some(path) = dot {
                let written = if path.extension().is_some_and(|ext| ext == "svg") {
                    export_petri_net_image_svg(&net, Some(&outcome.fired), &path)
                } else {
                    std::fs::write(&path, petri_net_to_dot(&net, Some(&outcome.fired)))
                };
                written.with_context(|| format!("failed to write {}", path.display()))?;
            }
        }

        Commands::Inspect { model } => {
            let statistics = pipeline::inspect(&model)
                .with_context(|| format!("failed to read {}", model.display()))?;
            println!("{statistics}");
        }

        Commands::MarkingGraph { model, out, limit } => {
            if let Some(limit) = limit {
                config.marking_graph_limit = limit;
            }
            let (states, complete) = pipeline::write_marking_graph(&model, &out, &config)
                .with_context(|| format!("failed to write marking graph of {}", model.display()))?;
            if complete {
                tracing::info!("Wrote {states} states to {}", out.display());
            } else {
                tracing::warn!(
                    "Stopped after {states} states, {} is incomplete",
                    out.display()
                );
            }
        }
    }

    Ok(())
}
