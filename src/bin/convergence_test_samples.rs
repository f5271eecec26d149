//! Compares two sample files and exits with `1` if they agree, so that a pipeline repeating a
//! run until convergence stops.

use anyhow::{bail, Context, Result};
use clap::Parser;
use mcsampler::convergence::{ConvergenceTest, TestMethod, TestOutcome};
use mcsampler::io::load_sample_table;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "convergence_test_samples")]
#[command(about = "Test whether two sets of samples describe the same distribution")]
#[command(version)]
struct Cli {
    /// Sample file with a header row naming the columns; give twice
    #[arg(long)]
    samples: Vec<PathBuf>,

    /// Parameter (column) used in the test; may be repeated
    #[arg(long)]
    parameter: Vec<String>,

    /// Test to perform: lame|ks1d
    #[arg(long, default_value = "lame")]
    method: TestMethod,

    /// Threshold below which the test passes. Defaults to a value depending on the test
    #[arg(long)]
    threshold: Option<f64>,

    /// File receiving one line: the pass flag (1 or 0) and the statistic
    #[arg(long)]
    test_output: Option<PathBuf>,

    /// Column delimiter of the sample files
    #[arg(long, default_value = " ")]
    delimiter: char,

    /// Log verbosity level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: tracing::Level,
}

fn run(cli: &Cli) -> Result<TestOutcome> {
    if !cli.delimiter.is_ascii() {
        bail!("delimiter '{}' is not an ASCII character", cli.delimiter);
    }
    let delimiter = cli.delimiter as u8;

    if cli.samples.len() > 2 {
        warn!("only the first two of {} sample files are compared", cli.samples.len());
    }

    let first = load_sample_table(&cli.samples[0], delimiter)
        .with_context(|| format!("failed to read {}", cli.samples[0].display()))?;
    let second = load_sample_table(&cli.samples[1], delimiter)
        .with_context(|| format!("failed to read {}", cli.samples[1].display()))?;

    let mut test = ConvergenceTest::new(cli.method);
    if let Some(threshold) = cli.threshold {
        test = test.with_threshold(threshold);
    }

    let outcome = test.run(&first, &second, &cli.parameter)?;
    info!(
        "{} statistic {} (threshold {}) over {:?}",
        cli.method, outcome.statistic, outcome.threshold, cli.parameter
    );
    println!("{}", outcome.statistic);

    if let Some(path) = &cli.test_output {
        fs::write(path, format!("{} {}\n", outcome.exit_code(), outcome.statistic))
            .with_context(|| format!("failed to write {}", path.display()))?;
    }

    Ok(outcome)
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level)
        .with_target(false)
        .init();

    if cli.samples.len() < 2 {
        warn!("need at least two sets of samples");
        return ExitCode::SUCCESS;
    }

    match run(&cli) {
        Ok(outcome) => ExitCode::from(u8::from(outcome.passed)),
        Err(err) => {
            error!("{:#}", err);
            ExitCode::from(2)
        }
    }
}
