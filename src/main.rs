use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fdeb::io::{self, BundledDocument};
use fdeb::{BundleConfig, BundledGraph, Graph, OverflowPolicy, Strategy};

/// Force-directed edge bundling for node-link graphs.
#[derive(Parser)]
#[command(name = "fdeb")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Bundle the edges of a graph document
    Bundle(BundleArgs),
    /// Print the default configuration as JSON
    Defaults,
}

#[derive(Args, Debug)]
struct BundleArgs {
    /// Input graph document (.json, .yaml)
    #[arg(short, long)]
    input: PathBuf,

    /// Output JSON file (stdout when absent)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config document (.json, .yaml); flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    strategy: Option<Strategy>,

    /// Run the parallel strategy on the GPU
    #[arg(long)]
    gpu: bool,

    /// Number of cycles after the first
    #[arg(long)]
    cycles: Option<u32>,

    /// Iterations of the first cycle
    #[arg(long)]
    iterations: Option<f64>,

    /// Compatibility threshold
    #[arg(long)]
    threshold: Option<f64>,

    /// Bundling stiffness K
    #[arg(long)]
    stiffness: Option<f64>,

    /// Initial step size S
    #[arg(long)]
    step_size: Option<f64>,

    /// Per-edge compatible edge capacity of the parallel strategy
    #[arg(long)]
    max_compatible: Option<u32>,

    /// Keep the first compatible edges instead of failing on overflow
    #[arg(long)]
    truncate: bool,

    /// Maximum buffer extent of the parallel strategy
    #[arg(long)]
    tile_extent: Option<u32>,
}

impl BundleArgs {
    /// Apply flag overrides on top of `config`
    fn apply(&self, mut config: BundleConfig) -> BundleConfig {
        if let Some(strategy) = self.strategy {
            config.strategy = strategy;
        }
        if self.gpu {
            config.strategy = Strategy::Parallel;
        }
        if let Some(cycles) = self.cycles {
            config.cycles = cycles;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        if let Some(threshold) = self.threshold {
            config.compatibility_threshold = threshold;
        }
        if let Some(stiffness) = self.stiffness {
            config.stiffness = stiffness;
        }
        if let Some(step_size) = self.step_size {
            config.step_size = step_size;
        }
        if let Some(capacity) = self.max_compatible {
            config.max_compatible_edges = capacity;
        }
        if self.truncate {
            config.overflow = OverflowPolicy::Truncate;
        }
        if let Some(extent) = self.tile_extent {
            config.max_extent = Some(extent);
        }
        config
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(feature = "gpu")]
fn bundle_on_gpu(graph: &Graph, config: &BundleConfig) -> anyhow::Result<BundledGraph> {
    let mut substrate =
        fdeb::gpu::WgpuSubstrate::new().context("failed to initialize GPU substrate")?;
    Ok(fdeb::bundle_with_substrate(graph, config, &mut substrate)?)
}

#[cfg(not(feature = "gpu"))]
fn bundle_on_gpu(_graph: &Graph, _config: &BundleConfig) -> anyhow::Result<BundledGraph> {
    anyhow::bail!("--gpu requires fdeb to be built with the `gpu` feature")
}

fn run_bundle(args: &BundleArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => io::read_config(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => BundleConfig::default(),
    };
    let config = args.apply(config);

    let graph = io::read_graph(&args.input)
        .with_context(|| format!("failed to read graph {}", args.input.display()))?;

    let bundled = if args.gpu {
        bundle_on_gpu(&graph, &config)?
    } else {
        fdeb::bundle(&graph, &config)?
    };

    let document = BundledDocument::new(&graph, &bundled);
    write_output(&document, args.output.as_deref())?;
    if let Some(output) = &args.output {
        eprintln!(
            "Bundled {} edges into {}",
            document.edges.len(),
            output.display()
        );
    }
    Ok(())
}

fn write_output(document: &BundledDocument, output: Option<&Path>) -> anyhow::Result<()> {
    match output {
        Some(path) => document
            .write(path)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", document.to_json()?),
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Bundle(args) => run_bundle(&args)?,
        Commands::Defaults => {
            println!("{}", serde_json::to_string_pretty(&BundleConfig::default())?);
        }
    }

    Ok(())
}
