//! graphshot CLI - few-shot episode sampling over citation graphs
//!
//! Builds the neighbor cache, inspects label partitions and subgraphs, and
//! dry-runs the episodic data loader from the command line.

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commands;
mod config;
mod output;

use commands::*;
use config::{GraphshotConfig, CONFIG_FILE};
use graphshot_core::{NodeId, Split, TaskKind};
use output::{OutputConfig, OutputFormat};

/// Few-shot episodic sampling over large citation graphs.
#[derive(Parser)]
#[command(name = "graphshot")]
#[command(author, version)]
#[command(about = "Few-shot episodic sampling over large citation graphs")]
#[command(propagate_version = true)]
#[command(after_help = "Quick Start:
  graphshot build-cache data/mag240m        Build the neighbor cache (run this first)
  graphshot info data/mag240m               Show graph and cache statistics
  graphshot sample data/mag240m -s val      Dry-run the validation loader

Examples:
  graphshot labels --num-classes 153 --split test
  graphshot subgraph data/mag240m --nodes 17,42 --hops 1")]
pub struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose output (debug logging)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format (overrides config default)
    #[arg(long, global = true, value_enum)]
    format: Option<OutputFormat>,

    /// Config file (defaults to ./.graphshot.toml)
    #[arg(long, global = true, env = "GRAPHSHOT_CONFIG")]
    config: Option<PathBuf>,

    /// Fail on config errors instead of silently using defaults
    #[arg(long, global = true)]
    strict: bool,
}

/// Dataset location flags shared by commands that open a graph.
#[derive(clap::Args, Debug, Clone)]
pub struct DatasetArgs {
    /// Dataset directory (defaults to [dataset] root, then the current directory)
    pub root: Option<PathBuf>,

    /// Use the subset graph under subset/ when it exists
    #[arg(long)]
    pub subset: bool,

    /// Subset size selecting subset/subset_<size>.safetensors
    #[arg(long)]
    pub subset_size: Option<usize>,

    /// Default hop count stored in the neighbor cache
    #[arg(long = "n-hop")]
    pub n_hop: Option<usize>,

    /// Accept a neighbor cache whose fingerprint does not match the graph
    #[arg(long)]
    pub no_verify: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the neighbor cache for a dataset (single-threaded, run once)
    #[command(visible_alias = "build")]
    BuildCache {
        #[command(flatten)]
        dataset: DatasetArgs,
    },

    /// Print the label partition for each split
    Labels {
        /// Number of classes in the label space
        #[arg(short = 'n', long)]
        num_classes: Option<usize>,

        /// Only show this split
        #[arg(short, long)]
        split: Option<Split>,

        /// Keep the arXiv CS labels in the train/val pool
        #[arg(long)]
        keep_cs: bool,

        /// Partition seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Extract the subgraph around seed nodes
    #[command(visible_alias = "sg")]
    Subgraph {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Seed node ids, comma separated
        #[arg(short, long = "nodes", required = true, value_delimiter = ',')]
        nodes: Vec<NodeId>,

        /// Hop count (defaults to the dataset's n_hop)
        #[arg(long)]
        hops: Option<usize>,
    },

    /// Run the data loader for a split and summarize each batch
    Sample {
        #[command(flatten)]
        dataset: DatasetArgs,

        /// Split to sample
        #[arg(short, long, default_value = "train")]
        split: Split,

        /// Episode task (same_graph, neighbor_matching, classification)
        #[arg(short, long)]
        task: Option<TaskKind>,

        /// Number of batches
        #[arg(short = 'b', long)]
        batches: Option<usize>,

        /// Parallel batch workers
        #[arg(short = 'w', long)]
        workers: Option<usize>,

        /// Sampler seed (defaults to the split's seed)
        #[arg(long)]
        seed: Option<u64>,

        /// Augmentation policy, e.g. "drop_feature:0.1,noise:0.05"
        #[arg(long)]
        aug: Option<String>,

        /// Augment val and test batches too
        #[arg(long)]
        aug_test: bool,

        /// Safetensors file with [num_classes, dim] label features
        #[arg(long)]
        label_meta: Option<PathBuf>,
    },

    /// Show graph and neighbor cache statistics
    Info {
        #[command(flatten)]
        dataset: DatasetArgs,
    },
}

fn setup_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "warn"
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    let config = if cli.strict {
        GraphshotConfig::load_strict(&config_path)?
    } else {
        GraphshotConfig::load(&config_path)
    };

    // Resolve output format: CLI flag > config default > Table
    let format = cli.format.unwrap_or_else(|| {
        config
            .default_format()
            .and_then(|f| f.parse().ok())
            .unwrap_or(OutputFormat::Table)
    });
    let output = OutputConfig::auto_detect(format, config.use_color())
        .with_compact(config.output.compact);

    let command = match cli.command {
        Some(cmd) => cmd,
        None => {
            let _ = Cli::command().print_help();
            println!();
            return Ok(());
        }
    };

    match command {
        Commands::BuildCache { dataset } => build_cache::run(&dataset, &config, &output),
        Commands::Labels {
            num_classes,
            split,
            keep_cs,
            seed,
        } => labels::run(
            labels::LabelsArgs {
                num_classes,
                split,
                keep_cs,
                seed,
            },
            &config,
            &output,
        ),
        Commands::Subgraph {
            dataset,
            nodes,
            hops,
        } => subgraph::run(&dataset, &nodes, hops, &config, &output),
        Commands::Sample {
            dataset,
            split,
            task,
            batches,
            workers,
            seed,
            aug,
            aug_test,
            label_meta,
        } => sample::run(
            &dataset,
            sample::SampleArgs {
                split,
                task,
                batches,
                workers,
                seed,
                aug,
                aug_test,
                label_meta,
            },
            &config,
            &output,
        ),
        Commands::Info { dataset } => info::run(&dataset, &config, &output),
    }
}
