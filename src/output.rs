use std::io::{self, Write};

use serde::Serialize;
use tracing::info;

use crate::app::{FetchResult, ProgressEvent, ProgressSink};
use crate::rewrite::RewriteResult;

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_fetch(result: &FetchResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_rewrite(result: &RewriteResult) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Forwards progress to the tracing subscriber (stderr).
pub struct LogSink;

impl ProgressSink for LogSink {
    fn event(&self, event: ProgressEvent) {
        info!("{}", event.message);
    }
}

/// Human-readable line printed on stdout after a fetch.
pub fn fetch_summary(result: &FetchResult) -> String {
    if result.dry_run {
        format!(
            "Would download {} files into {} (dry run)",
            result.files.len(),
            result.directory
        )
    } else {
        format!(
            "Downloaded {} files into {}",
            result.files.len(),
            result.directory
        )
    }
}
