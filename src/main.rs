//! runcheck - verify a submission against its test cases
//!
//! Reads a submission as JSON from a file or stdin and prints the verdicts as
//! a JSON array. With `--probe` the binary acts as the timeout-probe worker.

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use runcheck::verifier::{serve_probe, WorkerCommand};
use runcheck::{Submission, Verifier, VerifierConfig};

/// Command-line options
#[derive(Clone, Debug, Default)]
struct CliOptions {
    /// Run as the probe worker
    probe: bool,
    /// Pretty-print the results
    pretty: bool,
    /// Submission file, stdin when absent
    input: Option<PathBuf>,
}

fn parse_args() -> anyhow::Result<CliOptions> {
    let mut options = CliOptions::default();

    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            WorkerCommand::PROBE_FLAG => options.probe = true,
            "--pretty" => options.pretty = true,
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("runcheck {}", runcheck::VERSION);
                std::process::exit(0);
            }
            flag if flag.starts_with('-') && flag != "-" => {
                anyhow::bail!("unknown option '{flag}' (see --help)");
            }
            path => {
                if options.input.is_some() {
                    anyhow::bail!("more than one input file given");
                }
                if path != "-" {
                    options.input = Some(PathBuf::from(path));
                }
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("runcheck {}", runcheck::VERSION);
    println!();
    println!("USAGE:");
    println!("    runcheck [OPTIONS] [FILE]");
    println!();
    println!("Reads a submission as JSON from FILE (or stdin) and prints one verdict");
    println!("per test case as a JSON array.");
    println!();
    println!("OPTIONS:");
    println!("    --pretty          Pretty-print the results");
    println!("    --probe           Run as the timeout-probe worker (reads a probe request)");
    println!("    -V, --version     Print version");
    println!("    -h, --help        Print help");
    println!();
    println!("ENVIRONMENT:");
    println!("    RUNCHECK_LOG          Log filter (default: warn)");
    println!("    RUNCHECK_TIMEOUT_MS   Per-call time budget in milliseconds (default: 3000)");
    println!("    RUNCHECK_WORKER       Probe worker program (default: this executable)");
}

fn read_submission(input: Option<&PathBuf>) -> anyhow::Result<Submission> {
    let text = match input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read submission from stdin")?;
            text
        }
    };
    serde_json::from_str(&text).context("invalid submission JSON")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the results.
    let filter = EnvFilter::try_from_env("RUNCHECK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let options = parse_args()?;
    let config = VerifierConfig::from_env();

    if options.probe {
        serve_probe(std::io::stdin().lock(), config.sandbox.max_stack_bytes)?;
        return Ok(());
    }

    let submission = read_submission(options.input.as_ref())?;
    debug!(tests = submission.tests.len(), "submission received");

    let verifier = Verifier::new(config);
    let results = verifier.run_tests(&submission).await?;

    let json = if options.pretty {
        serde_json::to_string_pretty(&results)?
    } else {
        serde_json::to_string(&results)?
    };
    println!("{json}");
    Ok(())
}
