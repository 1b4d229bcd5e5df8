use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("invalid cycle {0:?} (must be a positive integer)")]
    InvalidCycle(String),

    #[error("missing Notion token (set NOTION_TOKEN or --notion-token)")]
    MissingToken,

    #[error("invalid header value for {name}: {message}")]
    InvalidHeader { name: &'static str, message: String },

    #[error("read mapping {path}: {message}")]
    MappingRead { path: Utf8PathBuf, message: String },

    #[error("parse mapping json: {0}")]
    MappingParse(String),

    #[error("Notion request failed: {0}")]
    NotionHttp(String),

    #[error("{operation} failed: {status}: {message}")]
    NotionStatus {
        operation: &'static str,
        status: u16,
        message: String,
    },

    #[error("database has no data_sources")]
    NoDataSource,

    #[error("page {page_id}: missing/invalid title property {property:?}")]
    InvalidTitle { page_id: String, property: String },

    #[error("page {page_id}: missing chain select {property:?}")]
    MissingChain { page_id: String, property: String },

    #[error("page {page_id}: chain {name:?} not found in mapping")]
    UnmappedChain { page_id: String, name: String },

    #[error("page {page_id}: missing type multi_select {property:?}")]
    MissingType { page_id: String, property: String },

    #[error("page {page_id}: expected exactly 1 Type, got {count}")]
    TypeCardinality { page_id: String, count: usize },

    #[error("page {page_id}: type {name:?} not found in mapping")]
    UnmappedType { page_id: String, name: String },

    #[error("page {page_id}: missing files property {property:?}")]
    MissingFiles { page_id: String, property: String },

    #[error("page {page_id}: expected exactly 1 merkle file, got {count}")]
    FileCardinality { page_id: String, count: usize },

    #[error("page {page_id}: file entry {name:?} has no downloadable URL")]
    NoFileUrl { page_id: String, name: String },

    #[error("page {page_id}: duplicate chain/type {key}")]
    DuplicatePair { page_id: String, key: String },

    #[error("no matching Notion rows found for {0}")]
    NoRows(String),

    #[error("no merkle files found for chain {name:?} (id {chain_id}) in {label}")]
    MissingChainRows {
        name: String,
        chain_id: String,
        label: String,
    },

    #[error("target folder {0} already exists and is not empty (use --allow-existing)")]
    DirectoryNotEmpty(Utf8PathBuf),

    #[error("download {file}: {message}")]
    Download { file: String, message: String },

    #[error("downloaded file is empty: {0}")]
    EmptyDownload(Utf8PathBuf),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("invalid cycle in filename {name:?}: {message}")]
    InvalidFileCycle { name: String, message: String },

    #[error("multiple cycle numbers found in {0}")]
    MixedCycles(Utf8PathBuf),

    #[error("no matching merkle files found in {0}")]
    NoMerkleFiles(Utf8PathBuf),

    #[error("cycle too small: {0}")]
    CycleTooSmall(u32),

    #[error("failed to encode result: {0}")]
    Output(String),
}
