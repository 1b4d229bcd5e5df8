use std::collections::BTreeMap;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};

use crate::domain::{Cycle, StatusKind};
use crate::error::SyncError;

pub const DEFAULT_MAPPING_PATH: &str = "config/notion_mappings.json";

/// Display-name lookup tables read from the mapping file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Mapping {
    #[serde(default)]
    pub chains: BTreeMap<String, String>,
    #[serde(default)]
    pub types: BTreeMap<String, String>,
}

impl Mapping {
    pub fn load(path: &Utf8Path) -> Result<Self, SyncError> {
        let content =
            fs::read_to_string(path.as_std_path()).map_err(|err| SyncError::MappingRead {
                path: path.to_path_buf(),
                message: err.to_string(),
            })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SyncError> {
        serde_json::from_str(content).map_err(|err| SyncError::MappingParse(err.to_string()))
    }

    pub fn chain_id(&self, name: &str) -> Option<&str> {
        self.chains.get(name).map(String::as_str)
    }

    pub fn reward_type(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(String::as_str)
    }
}

/// Names of the Notion properties read from each row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNames {
    pub title: String,
    pub status: String,
    pub chain: String,
    pub reward_type: String,
    pub file: String,
}

impl Default for PropertyNames {
    fn default() -> Self {
        Self {
            title: "Task name".to_string(),
            status: "Status".to_string(),
            chain: "Chain".to_string(),
            reward_type: "Type".to_string(),
            file: "Merkle file".to_string(),
        }
    }
}

/// Which status value marks a row as finished, and how it is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusFilter {
    pub done: String,
    pub kind: StatusKind,
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self {
            done: "Done".to_string(),
            kind: StatusKind::Status,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub database_id: String,
    pub cycle: Cycle,
    pub out_dir: Utf8PathBuf,
    pub allow_existing: bool,
    pub properties: PropertyNames,
    pub status: StatusFilter,
    pub page_size: u32,
    pub dry_run: bool,
}

impl FetchOptions {
    pub fn target_dir(&self) -> Utf8PathBuf {
        self.out_dir.join(self.cycle.dir_name())
    }
}

#[derive(Debug, Clone)]
pub struct RewriteOptions {
    pub values: Utf8PathBuf,
    pub cycle_dir: Utf8PathBuf,
    pub raw_prefix: String,
    pub dry_run: bool,
}
