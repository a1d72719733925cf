use std::io::IsTerminal;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use hashit::cli::Cli;
use hashit::config::Config;
use hashit::hash::{self, Algorithm};
use hashit::{logging, output};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.log_level());

    if cli.list_hashes {
        print_algorithms();
        return ExitCode::SUCCESS;
    }

    let stdin_piped = !std::io::stdin().is_terminal();
    let config = cli.into_config(stdin_piped);

    match run(&config) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Returns the report validity
fn run(config: &Config) -> Result<bool> {
    let report = hash::run(config)?;

    let rendered = output::render(&report, config.format, config.encoding, &config.algorithms)?;
    output::write_output(&rendered, config.output.as_deref()).context("failed to write report")?;

    Ok(report.valid)
}

fn print_algorithms() {
    println!("Supported hash algorithms:");
    for info in Algorithm::list_algorithms() {
        let note = if info.legacy { "  (legacy, not collision resistant)" } else { "" };
        println!("  {:<12} {:>4} bits{}", info.name, info.output_bits, note);
    }
}
