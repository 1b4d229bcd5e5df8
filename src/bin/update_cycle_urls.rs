use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;

use merkle_cycle_tools::cli::{fail, init_tracing, parse_args};
use merkle_cycle_tools::config::RewriteOptions;
use merkle_cycle_tools::output::JsonOutput;
use merkle_cycle_tools::rewrite::{DEFAULT_RAW_PREFIX, update_values_file};

#[derive(Parser)]
#[command(name = "update-cycle-urls")]
#[command(about = "Point versioned merkle file URLs in a values file at the newest cycle")]
#[command(version)]
struct Cli {
    /// Path to the values file to rewrite in place
    #[arg(long)]
    values: Utf8PathBuf,

    /// Path to the cycle-N directory of fetched merkle files
    #[arg(long)]
    cycle_dir: Utf8PathBuf,

    /// URL prefix the cycle-N/ paths hang off
    #[arg(long, default_value = DEFAULT_RAW_PREFIX)]
    raw_prefix: String,

    /// Report replacements without writing the file
    #[arg(long)]
    dry_run: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = match parse_args::<Cli>() {
        Ok(cli) => cli,
        Err(message) => return fail(message),
    };
    init_tracing();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => fail(report),
    }
}

fn run(cli: Cli) -> miette::Result<()> {
    let options = RewriteOptions {
        values: cli.values,
        cycle_dir: cli.cycle_dir,
        raw_prefix: cli.raw_prefix,
        dry_run: cli.dry_run,
    };
    let result = update_values_file(&options)?;
    if cli.json {
        JsonOutput::print_rewrite(&result).into_diagnostic()?;
    } else {
        println!("{}", result.summary());
    }
    Ok(())
}
