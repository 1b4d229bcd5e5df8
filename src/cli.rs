//! Process-level plumbing shared by the binaries: logging setup, argument
//! parsing and the `ERROR:` exit convention.

use std::process::ExitCode;

use clap::Parser;
use clap::error::ErrorKind;
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Parses arguments; usage errors are reported like every other fatal error.
/// `--help` and `--version` still print and exit normally.
pub fn parse_args<P: Parser>() -> Result<P, String> {
    P::try_parse().map_err(|err| match err.kind() {
        ErrorKind::DisplayHelp
        | ErrorKind::DisplayVersion
        | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => err.exit(),
        _ => single_line(&err.to_string()),
    })
}

pub fn fail(message: impl std::fmt::Display) -> ExitCode {
    let message = single_line(&message.to_string());
    eprintln!("ERROR: {message}");
    ExitCode::from(1)
}

/// Collapses a possibly multi-line message (clap usage errors, HTTP bodies)
/// onto one line, dropping clap's own prefix and usage footer.
fn single_line(message: &str) -> String {
    let joined = message
        .lines()
        .take_while(|line| !line.trim_start().starts_with("Usage:"))
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    joined
        .strip_prefix("error: ")
        .map(str::to_string)
        .unwrap_or(joined)
}
