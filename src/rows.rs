use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::config::{Mapping, PropertyNames};
use crate::domain::RewardKey;
use crate::error::SyncError;
use crate::notion::{Page, PropertyValue};

/// A validated row: what to download and under which key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadItem {
    pub key: RewardKey,
    pub page_id: String,
    pub source_url: String,
}

pub struct RowRules<'a> {
    mapping: &'a Mapping,
    properties: &'a PropertyNames,
    cycle_label: String,
}

impl<'a> RowRules<'a> {
    pub fn new(mapping: &'a Mapping, properties: &'a PropertyNames, cycle_label: String) -> Self {
        Self {
            mapping,
            properties,
            cycle_label,
        }
    }

    pub fn cycle_label(&self) -> &str {
        &self.cycle_label
    }

    /// Turns a queried page into a download item. Pages whose title does not
    /// mention the cycle are skipped; every other deviation is an error.
    pub fn validate(&self, page: &Page) -> Result<Option<DownloadItem>, SyncError> {
        let title = self.title(page)?;
        if !title.contains(&self.cycle_label) {
            debug!(page_id = %page.id, title = %title, "skipping row without cycle label");
            return Ok(None);
        }

        let chain_id = self.chain_id(page)?;
        let reward_type = self.reward_type(page)?;
        let source_url = self.source_url(page)?;

        Ok(Some(DownloadItem {
            key: RewardKey::new(chain_id, reward_type),
            page_id: page.id.clone(),
            source_url,
        }))
    }

    fn title(&self, page: &Page) -> Result<String, SyncError> {
        match page.properties.get(&self.properties.title) {
            Some(PropertyValue::Title { title }) => Ok(title.plain_text()),
            _ => Err(SyncError::InvalidTitle {
                page_id: page.id.clone(),
                property: self.properties.title.clone(),
            }),
        }
    }

    fn chain_id(&self, page: &Page) -> Result<&'a str, SyncError> {
        let name = match page.properties.get(&self.properties.chain) {
            Some(PropertyValue::Select {
                select: Some(option),
            }) if !option.name.is_empty() => option.name.as_str(),
            _ => {
                return Err(SyncError::MissingChain {
                    page_id: page.id.clone(),
                    property: self.properties.chain.clone(),
                });
            }
        };
        self.mapping
            .chain_id(name)
            .ok_or_else(|| SyncError::UnmappedChain {
                page_id: page.id.clone(),
                name: name.to_string(),
            })
    }

    fn reward_type(&self, page: &Page) -> Result<&'a str, SyncError> {
        let options = match page.properties.get(&self.properties.reward_type) {
            Some(PropertyValue::MultiSelect { multi_select }) => multi_select,
            _ => {
                return Err(SyncError::MissingType {
                    page_id: page.id.clone(),
                    property: self.properties.reward_type.clone(),
                });
            }
        };
        let [option] = options.as_slice() else {
            return Err(SyncError::TypeCardinality {
                page_id: page.id.clone(),
                count: options.len(),
            });
        };
        self.mapping
            .reward_type(&option.name)
            .ok_or_else(|| SyncError::UnmappedType {
                page_id: page.id.clone(),
                name: option.name.clone(),
            })
    }

    fn source_url(&self, page: &Page) -> Result<String, SyncError> {
        let files = match page.properties.get(&self.properties.file) {
            Some(PropertyValue::Files { files }) => files,
            _ => {
                return Err(SyncError::MissingFiles {
                    page_id: page.id.clone(),
                    property: self.properties.file.clone(),
                });
            }
        };
        let [file] = files.as_slice() else {
            return Err(SyncError::FileCardinality {
                page_id: page.id.clone(),
                count: files.len(),
            });
        };
        file.download_url()
            .map(str::to_string)
            .ok_or_else(|| SyncError::NoFileUrl {
                page_id: page.id.clone(),
                name: file.name.clone(),
            })
    }
}

/// Accumulates download items, rejecting a second row for the same
/// chain/type pair.
#[derive(Debug, Default)]
pub struct ItemSet {
    items: Vec<DownloadItem>,
    seen: BTreeSet<RewardKey>,
}

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn insert(&mut self, item: DownloadItem) -> Result<(), SyncError> {
        if !self.seen.insert(item.key.clone()) {
            return Err(SyncError::DuplicatePair {
                page_id: item.page_id,
                key: item.key.to_string(),
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Checks that at least one row was accepted and that every mapped chain
    /// has a row.
    pub fn finish(
        self,
        mapping: &Mapping,
        cycle_label: &str,
    ) -> Result<Vec<DownloadItem>, SyncError> {
        if self.items.is_empty() {
            return Err(SyncError::NoRows(cycle_label.to_string()));
        }
        let chains = self
            .seen
            .iter()
            .map(|key| key.chain_id.as_str())
            .collect::<BTreeSet<_>>();
        if let Some((name, chain_id)) = mapping
            .chains
            .iter()
            .find(|(_, chain_id)| !chains.contains(chain_id.as_str()))
        {
            return Err(SyncError::MissingChainRows {
                name: name.clone(),
                chain_id: chain_id.clone(),
                label: cycle_label.to_string(),
            });
        }
        Ok(self.items)
    }
}
