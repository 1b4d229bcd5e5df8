use std::collections::HashMap;
use std::io::Write;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::config::{PropertyNames, StatusFilter};
use crate::error::SyncError;

pub const NOTION_BASE_URL: &str = "https://api.notion.com/v1";
pub const NOTION_API_VERSION: &str = "2025-09-03";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseResponse {
    #[serde(default)]
    pub data_sources: Vec<DataSource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataSource {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<Page>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl QueryResponse {
    /// Cursor for the following page, if the server reported one.
    pub fn continuation(&self) -> Option<&str> {
        if !self.has_more {
            return None;
        }
        self.next_cursor.as_deref().filter(|cursor| !cursor.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub properties: HashMap<String, PropertyValue>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title {
        #[serde(default)]
        title: TitleValue,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    MultiSelect {
        #[serde(default)]
        multi_select: Vec<SelectOption>,
    },
    Status {
        #[serde(default)]
        status: Option<SelectOption>,
    },
    Files {
        #[serde(default)]
        files: Vec<NotionFile>,
    },
    #[serde(other)]
    Other,
}

/// Title content. Page objects carry a plain rich-text array; the property
/// item endpoint wraps it in a paginated `results` list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TitleValue {
    Items(Vec<RichText>),
    Paged {
        #[serde(default)]
        title: Vec<RichText>,
        #[serde(default)]
        results: Vec<RichText>,
    },
}

impl Default for TitleValue {
    fn default() -> Self {
        TitleValue::Items(Vec::new())
    }
}

impl TitleValue {
    pub fn plain_text(&self) -> String {
        match self {
            TitleValue::Items(items) => join_plain_text(items.iter()),
            TitleValue::Paged { title, results } => join_plain_text(title.iter().chain(results)),
        }
    }
}

fn join_plain_text<'a>(items: impl Iterator<Item = &'a RichText>) -> String {
    items.map(|item| item.plain_text.as_str()).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotionFile {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub file: Option<FileUrl>,
    #[serde(default)]
    pub external: Option<FileUrl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileUrl {
    #[serde(default)]
    pub url: String,
}

impl NotionFile {
    fn hosted_url(&self) -> Option<&str> {
        self.file
            .as_ref()
            .map(|file| file.url.as_str())
            .filter(|url| !url.is_empty())
    }

    fn external_url(&self) -> Option<&str> {
        self.external
            .as_ref()
            .map(|file| file.url.as_str())
            .filter(|url| !url.is_empty())
    }

    /// The URL the file can be downloaded from. The declared type wins when it
    /// carries a URL; otherwise a Notion-hosted URL is preferred over an
    /// external one.
    pub fn download_url(&self) -> Option<&str> {
        let declared = match self.kind.as_str() {
            "file" => self.hosted_url(),
            "external" => self.external_url(),
            _ => None,
        };
        declared
            .or_else(|| self.hosted_url())
            .or_else(|| self.external_url())
    }
}

/// Body of a data source query selecting finished rows of one cycle that have
/// a merkle file attached.
pub fn build_query(
    properties: &PropertyNames,
    status: &StatusFilter,
    cycle_label: &str,
    page_size: u32,
    start_cursor: Option<&str>,
) -> Value {
    let mut status_condition = json!({ "property": properties.status });
    status_condition[status.kind.filter_key()] = json!({ "equals": status.done });

    let mut body = json!({
        "page_size": page_size,
        "filter": {
            "and": [
                {
                    "property": properties.title,
                    "title": { "contains": cycle_label },
                },
                status_condition,
                {
                    "property": properties.file,
                    "files": { "is_not_empty": true },
                },
            ],
        },
    });
    if let Some(cursor) = start_cursor {
        body["start_cursor"] = json!(cursor);
    }
    body
}

pub trait NotionClient {
    fn retrieve_database(&self, database_id: &str) -> Result<DatabaseResponse, SyncError>;
    fn query_data_source(
        &self,
        data_source_id: &str,
        body: &Value,
    ) -> Result<QueryResponse, SyncError>;
    /// Streams the file at `url` into `destination`, returning the byte count.
    fn download(&self, url: &str, destination: &mut dyn Write) -> Result<u64, SyncError>;
}

impl<T: NotionClient + ?Sized> NotionClient for &T {
    fn retrieve_database(&self, database_id: &str) -> Result<DatabaseResponse, SyncError> {
        (**self).retrieve_database(database_id)
    }

    fn query_data_source(
        &self,
        data_source_id: &str,
        body: &Value,
    ) -> Result<QueryResponse, SyncError> {
        (**self).query_data_source(data_source_id, body)
    }

    fn download(&self, url: &str, destination: &mut dyn Write) -> Result<u64, SyncError> {
        (**self).download(url, destination)
    }
}

#[derive(Clone)]
pub struct NotionHttpClient {
    client: Client,
    base_url: String,
    token: String,
    version: String,
}

impl NotionHttpClient {
    pub fn new(token: &str, version: &str) -> Result<Self, SyncError> {
        Self::with_base_url(token, version, NOTION_BASE_URL)
    }

    pub fn with_base_url(token: &str, version: &str, base_url: &str) -> Result<Self, SyncError> {
        if token.trim().is_empty() {
            return Err(SyncError::MissingToken);
        }
        // Validate once so per-request header construction cannot fail.
        HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
            SyncError::InvalidHeader {
                name: "Authorization",
                message: err.to_string(),
            }
        })?;
        HeaderValue::from_str(version).map_err(|err| SyncError::InvalidHeader {
            name: "Notion-Version",
            message: err.to_string(),
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("merkle-cycle-tools/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| SyncError::InvalidHeader {
                    name: "User-Agent",
                    message: err.to_string(),
                })?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| SyncError::NotionHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            version: version.to_string(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header("Notion-Version", &self.version)
            .header(ACCEPT, "application/json")
    }

    fn handle_status(operation: &'static str, response: Response) -> Result<Response, SyncError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().unwrap_or_default();
        Err(SyncError::NotionStatus {
            operation,
            status,
            message,
        })
    }
}

impl NotionClient for NotionHttpClient {
    fn retrieve_database(&self, database_id: &str) -> Result<DatabaseResponse, SyncError> {
        let url = format!("{}/databases/{}", self.base_url, database_id);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .map_err(|err| SyncError::NotionHttp(err.to_string()))?;
        let response = Self::handle_status("retrieve database", response)?;
        response
            .json()
            .map_err(|err| SyncError::NotionHttp(err.to_string()))
    }

    fn query_data_source(
        &self,
        data_source_id: &str,
        body: &Value,
    ) -> Result<QueryResponse, SyncError> {
        let url = format!("{}/data_sources/{}/query", self.base_url, data_source_id);
        let response = self
            .authorized(self.client.post(&url))
            .header(CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .map_err(|err| SyncError::NotionHttp(err.to_string()))?;
        let response = Self::handle_status("query data source", response)?;
        response
            .json()
            .map_err(|err| SyncError::NotionHttp(err.to_string()))
    }

    fn download(&self, url: &str, destination: &mut dyn Write) -> Result<u64, SyncError> {
        // File URLs are pre-signed; Notion credentials must not be sent along.
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SyncError::NotionHttp(err.to_string()))?;
        let mut response = Self::handle_status("download", response)?;
        std::io::copy(&mut response, destination)
            .map_err(|err| SyncError::Filesystem(err.to_string()))
    }
}
