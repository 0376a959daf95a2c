use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use vecbench_core::{
    Config, DefaultFactory, Error, LoadRunner, PartialBatchPolicy, RunOptions, RunSummary,
    SearchRunner, TargetOutcome,
};

const USAGE: &str = "\
Unknown option: Valid options are vecbench load or vecbench search
- Run load config tests   -- vecbench load
- Run search config tests -- vecbench search";

#[derive(Parser)]
#[command(name = "vecbench")]
#[command(about = "Load and search benchmarks for vector databases", long_about = None)]
struct Cli {
    /// Benchmark to run: `load` or `search`
    mode: Option<String>,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Directory result files are written to
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,

    /// Default handling of a trailing batch smaller than the batch size
    #[arg(long, value_enum, default_value = "flush")]
    partial_batch: PartialBatchArg,

    /// Disable progress bars
    #[arg(long)]
    no_progress: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum PartialBatchArg {
    #[default]
    Flush,
    Drop,
}

impl From<PartialBatchArg> for PartialBatchPolicy {
    fn from(arg: PartialBatchArg) -> Self {
        match arg {
            PartialBatchArg::Flush => PartialBatchPolicy::Flush,
            PartialBatchArg::Drop => PartialBatchPolicy::Drop,
        }
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Load,
    Search,
}

impl Mode {
    fn parse(arg: Option<&str>) -> Option<Self> {
        match arg? {
            "load" => Some(Mode::Load),
            "search" => Some(Mode::Search),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let Some(mode) = Mode::parse(cli.mode.as_deref()) else {
        println!("{USAGE}");
        return Ok(ExitCode::FAILURE);
    };

    // Load configuration
    debug!(config = %cli.config.display(), "Loading configuration");
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to read config {}", cli.config.display()))?;

    let options = RunOptions {
        out_dir: cli.out_dir,
        partial_batch: cli.partial_batch.into(),
        show_progress: !cli.no_progress,
    };
    let factory = DefaultFactory;

    let result = match mode {
        Mode::Load => {
            LoadRunner::new(&factory, options)
                .run(config.load_targets())
                .await
        }
        Mode::Search => {
            SearchRunner::new(&factory, options)
                .run(config.search_targets())
                .await
        }
    };

    match result {
        Ok(summary) => {
            print_summary(&summary);
            if summary.has_failures() {
                Ok(ExitCode::FAILURE)
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
        Err(err @ Error::MissingSection(_)) => {
            println!("{err}");
            Ok(ExitCode::FAILURE)
        }
        Err(err) => Err(err.into()),
    }
}

fn print_summary(summary: &RunSummary) {
    for outcome in &summary.outcomes {
        match outcome {
            TargetOutcome::Written {
                collection,
                path,
                duration,
            } => println!("{collection}: {duration:.3}s -> {}", path.display()),
            TargetOutcome::Skipped { db_type } => println!("skipped unknown type '{db_type}'"),
            TargetOutcome::Failed { collection, error } => {
                println!("{collection}: failed: {error}")
            }
        }
    }
    println!(
        "{} written, {} skipped, {} failed",
        summary.written(),
        summary.skipped(),
        summary.failed()
    );
}
