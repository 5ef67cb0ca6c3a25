//! Validate an analysis plan and release its statistics.
//!
//! Usage:
//!   dp-release --plan plan.json --validate-only
//!   dp-release --plan plan.json --data data.csv [--separator ,]
//!
//! The resulting JSON goes to stdout; logs go to stderr (`RUST_LOG`
//! overrides the default `info` level).

use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dpcreator::{AnalysisPlan, DpConfig};

#[derive(Parser)]
#[command(name = "dp-release")]
#[command(version)]
#[command(about = "Validate a DP analysis plan and release its statistics", long_about = None)]
struct Cli {
    /// Analysis plan (JSON)
    #[arg(short, long)]
    plan: PathBuf,

    /// Delimited data file with a header row
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Field separator of the data file
    #[arg(short, long, default_value_t = ',')]
    separator: char,

    /// Only validate the plan; do not read data
    #[arg(long)]
    validate_only: bool,
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = DpConfig::from_env_or_default();
    config.validate().context("invalid configuration")?;

    let text = fs::read_to_string(&cli.plan)
        .with_context(|| format!("failed to read {}", cli.plan.display()))?;
    let plan = AnalysisPlan::from_json(&text)
        .with_context(|| format!("failed to load {}", cli.plan.display()))?;

    let mut stdout = io::stdout().lock();
    if cli.validate_only {
        let validation = plan.validate(&config);
        serde_json::to_writer_pretty(&mut stdout, &validation)?;
        writeln!(stdout)?;
        return Ok(if validation.is_valid() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let Some(data_path) = cli.data else {
        bail!("--data is required unless --validate-only is given");
    };
    let file = File::open(&data_path)
        .with_context(|| format!("failed to open {}", data_path.display()))?;
    let release = plan
        .run_release(&config, BufReader::new(file), cli.separator)
        .context("release failed")?;
    serde_json::to_writer_pretty(&mut stdout, &release)?;
    writeln!(stdout)?;
    Ok(ExitCode::SUCCESS)
}
