use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use common::log_setup::setup_logging;
use puncta::{BatchConfig, BatchOrchestrator};

#[derive(Parser)]
#[command(name = "puncta")]
#[command(
    version,
    about = "Mask cells, measure slices and count puncta in microscopy Z-stacks",
    long_about = None
)]
struct Cli {
    /// Root directory searched recursively for stacks
    #[arg(value_name = "INPUT_DIR")]
    input: PathBuf,

    /// Directory for masked stacks, Peaks.csv and Results.csv
    #[arg(value_name = "OUTPUT_DIR")]
    output: PathBuf,

    /// Required file name suffix [default: .tif]
    #[arg(long, value_name = "SUFFIX")]
    ext: Option<String>,

    /// Required file name substring [default: crop]
    #[arg(long, value_name = "TEXT")]
    contains: Option<String>,

    /// Auto-threshold method: Default, Huang, Huang2, Li, Mean, Otsu or Triangle [default: Huang]
    #[arg(long, value_name = "METHOD")]
    method: Option<String>,

    /// Channel to analyse, 0-based [default: 0]
    #[arg(long, value_name = "INDEX")]
    channel: Option<usize>,

    /// YAML or JSON batch configuration; flags given here take precedence
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a max-projection PNG with the detected puncta per file
    #[arg(long)]
    overlays: bool,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Also write daily rolling log files to this directory
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<BatchConfig> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::load(path)
                .with_context(|| format!("Failed to load config '{}'", path.display()))?,
            None => BatchConfig::default(),
        };

        config.input_dir = self.input;
        config.output_dir = self.output;
        if let Some(ext) = self.ext {
            config.extension = ext;
        }
        if let Some(contains) = self.contains {
            config.contains = contains;
        }
        if let Some(method) = self.method {
            config.mask.method = method;
        }
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
        if self.overlays {
            config.save_overlays = true;
        }
        Ok(config)
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    setup_logging(&cli.log_level, cli.log_dir.as_deref())?;

    let config = cli.into_config()?;
    let report = BatchOrchestrator::new(config)
        .run()
        .context("Batch aborted")?;

    for failure in &report.failed {
        eprintln!("failed: {}: {}", failure.path.display(), failure.error);
    }
    Ok(ExitCode::from(report.exit_code() as u8))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
