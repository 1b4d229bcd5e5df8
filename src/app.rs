use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::debug;

use crate::config::{FetchOptions, Mapping};
use crate::error::SyncError;
use crate::notion::{NotionClient, build_query};
use crate::rows::{DownloadItem, ItemSet, RowRules};
use crate::store::{CycleDir, write_file_atomic};

#[derive(Debug, Clone, Serialize)]
pub struct FetchResult {
    pub cycle: u32,
    pub directory: Utf8PathBuf,
    pub dry_run: bool,
    pub files: Vec<FetchedFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchedFile {
    pub chain_id: String,
    pub reward_type: String,
    pub page_id: String,
    pub file_name: String,
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
}

impl ProgressEvent {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

pub struct App<C: NotionClient> {
    client: C,
    mapping: Mapping,
}

impl<C: NotionClient> App<C> {
    pub fn new(client: C, mapping: Mapping) -> Self {
        Self { client, mapping }
    }

    pub fn fetch(
        &self,
        options: &FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<FetchResult, SyncError> {
        let database = self.client.retrieve_database(&options.database_id)?;
        let data_source = database
            .data_sources
            .first()
            .ok_or(SyncError::NoDataSource)?;
        sink.event(ProgressEvent::new(format!(
            "phase=Resolve; data source {} ({})",
            data_source.id, data_source.name
        )));

        let target = CycleDir::new(options.target_dir());
        target.check_reusable(options.allow_existing)?;

        let items = self.collect_items(&data_source.id, options, sink)?;

        let cycle = options.cycle.get();
        let mut files = Vec::with_capacity(items.len());
        if options.dry_run {
            for item in items {
                let file_name = item.key.file_name(cycle);
                sink.event(ProgressEvent::new(format!(
                    "phase=Plan; would download {file_name} from page {}",
                    item.page_id
                )));
                files.push(fetched_file(item, file_name, None));
            }
        } else {
            target.ensure()?;
            for item in items {
                let file_name = item.key.file_name(cycle);
                let bytes = self.download_item(&target, &item, &file_name)?;
                sink.event(ProgressEvent::new(format!(
                    "phase=Download; {file_name} ({bytes} bytes)"
                )));
                files.push(fetched_file(item, file_name, Some(bytes)));
            }
        }

        Ok(FetchResult {
            cycle,
            directory: target.path().to_path_buf(),
            dry_run: options.dry_run,
            files,
        })
    }

    fn collect_items(
        &self,
        data_source_id: &str,
        options: &FetchOptions,
        sink: &dyn ProgressSink,
    ) -> Result<Vec<DownloadItem>, SyncError> {
        let rules = RowRules::new(&self.mapping, &options.properties, options.cycle.label());
        let mut items = ItemSet::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let body = build_query(
                &options.properties,
                &options.status,
                rules.cycle_label(),
                options.page_size,
                cursor.as_deref(),
            );
            let response = self.client.query_data_source(data_source_id, &body)?;
            pages += 1;
            debug!(page = pages, rows = response.results.len(), "queried data source");

            for page in &response.results {
                if let Some(item) = rules.validate(page)? {
                    items.insert(item)?;
                }
            }

            match response.continuation() {
                Some(next) => cursor = Some(next.to_string()),
                None => break,
            }
        }

        sink.event(ProgressEvent::new(format!(
            "phase=Query; {} rows accepted across {pages} result pages",
            items.len()
        )));
        items.finish(&self.mapping, rules.cycle_label())
    }

    fn download_item(
        &self,
        target: &CycleDir,
        item: &DownloadItem,
        file_name: &str,
    ) -> Result<u64, SyncError> {
        let dest = target.file_path(file_name);
        write_file_atomic(&dest, |writer| {
            self.client
                .download(&item.source_url, writer)
                .map_err(|err| SyncError::Download {
                    file: file_name.to_string(),
                    message: err.to_string(),
                })
        })
    }
}

fn fetched_file(item: DownloadItem, file_name: String, bytes: Option<u64>) -> FetchedFile {
    FetchedFile {
        chain_id: item.key.chain_id,
        reward_type: item.key.reward_type,
        page_id: item.page_id,
        file_name,
        bytes,
    }
}
