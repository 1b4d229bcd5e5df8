use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use clap::ValueEnum;
use regex::Regex;
use serde::Serialize;

use crate::error::SyncError;

static MERKLE_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)_([A-Za-z]+)_([0-9]+)\.json$").expect("merkle file pattern compiles")
});

/// A reward-distribution period. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cycle(u32);

impl Cycle {
    pub fn new(value: u32) -> Result<Self, SyncError> {
        if value == 0 {
            return Err(SyncError::InvalidCycle(value.to_string()));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    /// Text the Notion row title must contain, e.g. `Cycle 20`.
    pub fn label(self) -> String {
        format!("Cycle {}", self.0)
    }

    pub fn dir_name(self) -> String {
        format!("cycle-{}", self.0)
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Cycle {
    type Err = SyncError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parsed = value
            .trim()
            .parse::<u32>()
            .map_err(|_| SyncError::InvalidCycle(value.to_string()))?;
        Self::new(parsed)
    }
}

/// Identifies one merkle file within a cycle: the internal chain id and the
/// reward-type code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct RewardKey {
    pub chain_id: String,
    pub reward_type: String,
}

impl RewardKey {
    pub fn new(chain_id: impl Into<String>, reward_type: impl Into<String>) -> Self {
        Self {
            chain_id: chain_id.into(),
            reward_type: reward_type.into(),
        }
    }

    pub fn file_name(&self, cycle: u32) -> String {
        format!("{}_{}_{}.json", self.chain_id, self.reward_type, cycle)
    }
}

impl fmt::Display for RewardKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain_id, self.reward_type)
    }
}

/// A parsed `{chainID}_{TYPE}_{cycle}.json` file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleFileName {
    pub key: RewardKey,
    pub cycle: u32,
}

impl MerkleFileName {
    /// Returns `Ok(None)` for names that do not follow the convention. The
    /// reward type is upper-cased.
    pub fn parse(name: &str) -> Result<Option<Self>, SyncError> {
        let Some(captures) = MERKLE_FILE_RE.captures(name) else {
            return Ok(None);
        };
        let cycle = captures[3]
            .parse::<u32>()
            .map_err(|err| SyncError::InvalidFileCycle {
                name: name.to_string(),
                message: err.to_string(),
            })?;
        Ok(Some(Self {
            key: RewardKey::new(&captures[1], captures[2].to_uppercase()),
            cycle,
        }))
    }
}

/// How the status property is represented in the Notion database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusKind {
    Status,
    Select,
}

impl StatusKind {
    /// Key used for the status condition in a query filter.
    pub fn filter_key(self) -> &'static str {
        match self {
            StatusKind::Status => "status",
            StatusKind::Select => "select",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.filter_key())
    }
}
