use std::collections::BTreeSet;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::RewriteOptions;
use crate::domain::{MerkleFileName, RewardKey};
use crate::error::SyncError;
use crate::store::replace_file_contents;

pub const DEFAULT_RAW_PREFIX: &str =
    "https://raw.githubusercontent.com/KyberNetwork/fairflow-reward/refs/heads/main";

/// Chain/type pairs present in a cycle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleScan {
    cycle: u32,
    pairs: BTreeSet<RewardKey>,
}

impl CycleScan {
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn pairs(&self) -> &BTreeSet<RewardKey> {
        &self.pairs
    }
}

pub fn scan_cycle_dir(dir: &Utf8Path) -> Result<CycleScan, SyncError> {
    let entries = fs::read_dir(dir.as_std_path())
        .map_err(|err| SyncError::Filesystem(format!("read {dir}: {err}")))?;

    let mut cycle: Option<u32> = None;
    let mut pairs = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(|err| SyncError::Filesystem(err.to_string()))?;
        let file_type = entry
            .file_type()
            .map_err(|err| SyncError::Filesystem(err.to_string()))?;
        if file_type.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        let Some(parsed) = MerkleFileName::parse(&name)? else {
            debug!(file = %name, "ignoring non-merkle file");
            continue;
        };
        match cycle {
            None => cycle = Some(parsed.cycle),
            Some(seen) if seen != parsed.cycle => {
                return Err(SyncError::MixedCycles(dir.to_path_buf()));
            }
            Some(_) => {}
        }
        pairs.insert(parsed.key);
    }

    let Some(cycle) = cycle else {
        return Err(SyncError::NoMerkleFiles(dir.to_path_buf()));
    };
    if cycle < 2 {
        return Err(SyncError::CycleTooSmall(cycle));
    }
    Ok(CycleScan { cycle, pairs })
}

pub fn cycle_url(prefix: &str, cycle: u32, key: &RewardKey) -> String {
    format!("{prefix}/cycle-{cycle}/{}", key.file_name(cycle))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Replacement {
    pub from: String,
    pub to: String,
    pub occurrences: usize,
}

/// Shifts every previous-cycle URL to the new cycle and every cycle-before
/// URL to the previous cycle. Only literal matches are touched.
pub fn rewrite_urls(text: &str, prefix: &str, scan: &CycleScan) -> (String, Vec<Replacement>) {
    let new_cycle = scan.cycle;
    let (Some(prev_cycle), Some(old_cycle)) = (new_cycle.checked_sub(1), new_cycle.checked_sub(2))
    else {
        return (text.to_string(), Vec::new());
    };

    let mut updated = text.to_string();
    let mut replacements = Vec::new();
    for key in &scan.pairs {
        let old_url = cycle_url(prefix, old_cycle, key);
        let prev_url = cycle_url(prefix, prev_cycle, key);
        let new_url = cycle_url(prefix, new_cycle, key);

        for (from, to) in [(prev_url.clone(), new_url), (old_url, prev_url)] {
            let occurrences = updated.matches(from.as_str()).count();
            if occurrences == 0 {
                continue;
            }
            updated = updated.replace(from.as_str(), &to);
            replacements.push(Replacement {
                from,
                to,
                occurrences,
            });
        }
    }
    (updated, replacements)
}

#[derive(Debug, Clone, Serialize)]
pub struct RewriteResult {
    pub values: Utf8PathBuf,
    pub cycle: u32,
    pub pairs: Vec<RewardKey>,
    pub replacements: Vec<Replacement>,
    pub changed: bool,
    pub written: bool,
}

impl RewriteResult {
    pub fn summary(&self) -> String {
        if !self.changed {
            format!("No changes made to {} (nothing matched).", self.values)
        } else if self.written {
            format!("Updated {} via URL string replacement only.", self.values)
        } else {
            format!(
                "Would update {} ({} replacements, dry run).",
                self.values,
                self.replacements.len()
            )
        }
    }
}

pub fn update_values_file(options: &RewriteOptions) -> Result<RewriteResult, SyncError> {
    let scan = scan_cycle_dir(&options.cycle_dir)?;
    info!(cycle = scan.cycle, pairs = scan.pairs.len(), "scanned cycle directory");

    let original = fs::read_to_string(options.values.as_std_path())
        .map_err(|err| SyncError::Filesystem(format!("read {}: {err}", options.values)))?;
    let (updated, replacements) = rewrite_urls(&original, &options.raw_prefix, &scan);
    for replacement in &replacements {
        info!(
            from = %replacement.from,
            to = %replacement.to,
            occurrences = replacement.occurrences,
            "replaced url"
        );
    }

    let changed = !replacements.is_empty();
    let written = changed && !options.dry_run;
    if written {
        replace_file_contents(&options.values, &updated)?;
    }

    Ok(RewriteResult {
        values: options.values.clone(),
        cycle: scan.cycle,
        pairs: scan.pairs.into_iter().collect(),
        replacements,
        changed,
        written,
    })
}
