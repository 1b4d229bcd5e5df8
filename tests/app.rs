use std::collections::HashMap;
use std::io::Write;
use std::sync::Mutex;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;
use serde_json::{Value, json};

use merkle_cycle_tools::app::App;
use merkle_cycle_tools::config::{FetchOptions, Mapping, PropertyNames, StatusFilter};
use merkle_cycle_tools::domain::Cycle;
use merkle_cycle_tools::error::SyncError;
use merkle_cycle_tools::notion::{DatabaseResponse, NotionClient, Page, QueryResponse};
use merkle_cycle_tools::output::JsonOutput;

#[derive(Default)]
struct MockNotion {
    data_sources: Vec<&'static str>,
    responses: Vec<QueryResponse>,
    files: HashMap<String, Vec<u8>>,
    bodies: Mutex<Vec<Value>>,
    downloads: Mutex<Vec<String>>,
}

impl MockNotion {
    fn new(pages: Vec<Vec<Page>>) -> Self {
        let count = pages.len();
        let responses = pages
            .into_iter()
            .enumerate()
            .map(|(index, results)| QueryResponse {
                results,
                has_more: index + 1 < count,
                next_cursor: (index + 1 < count).then(|| format!("cursor-{}", index + 1)),
            })
            .collect();
        Self {
            data_sources: vec!["ds-1", "ds-2"],
            responses,
            ..Self::default()
        }
    }

    fn with_file(mut self, url: &str, content: &[u8]) -> Self {
        self.files.insert(url.to_string(), content.to_vec());
        self
    }
}

impl NotionClient for MockNotion {
    fn retrieve_database(&self, _database_id: &str) -> Result<DatabaseResponse, SyncError> {
        let sources = self
            .data_sources
            .iter()
            .map(|id| json!({ "id": id, "name": "Rewards" }))
            .collect::<Vec<_>>();
        Ok(serde_json::from_value(json!({ "data_sources": sources })).unwrap())
    }

    fn query_data_source(
        &self,
        data_source_id: &str,
        body: &Value,
    ) -> Result<QueryResponse, SyncError> {
        assert_eq!(data_source_id, "ds-1");
        let mut bodies = self.bodies.lock().unwrap();
        let index = bodies.len();
        bodies.push(body.clone());
        Ok(self.responses.get(index).cloned().unwrap_or_default())
    }

    fn download(&self, url: &str, destination: &mut dyn Write) -> Result<u64, SyncError> {
        self.downloads.lock().unwrap().push(url.to_string());
        let content = self.files.get(url).ok_or_else(|| SyncError::NotionStatus {
            operation: "download",
            status: 404,
            message: "missing".to_string(),
        })?;
        destination.write_all(content).unwrap();
        Ok(content.len() as u64)
    }
}

fn page(id: &str, title: &str, chain: &str, types: &[&str], urls: &[&str]) -> Page {
    serde_json::from_value(page_json(id, title, chain, types, urls)).unwrap()
}

/// A "Cycle 12" Base row whose `property` is replaced by `value`.
fn broken_page(property: &str, value: Value) -> Page {
    let mut page = page_json("p2", "Cycle 12", "Base", &["LP Rewards"], &["https://f/2"]);
    page["properties"][property] = value;
    serde_json::from_value(page).unwrap()
}

fn page_json(id: &str, title: &str, chain: &str, types: &[&str], urls: &[&str]) -> Value {
    let multi_select = types
        .iter()
        .map(|name| json!({ "name": name }))
        .collect::<Vec<_>>();
    let files = urls
        .iter()
        .map(|url| json!({ "name": "merkle.json", "type": "file", "file": { "url": url } }))
        .collect::<Vec<_>>();
    json!({
        "id": id,
        "properties": {
            "Task name": { "type": "title", "title": [{ "plain_text": title }] },
            "Chain": { "type": "select", "select": { "name": chain } },
            "Type": { "type": "multi_select", "multi_select": multi_select },
            "Status": { "type": "status", "status": { "name": "Done" } },
            "Merkle file": { "type": "files", "files": files },
        }
    })
}

fn mapping() -> Mapping {
    Mapping::from_json(
        r#"{
            "chains": {"Ethereum": "1", "Base": "8453"},
            "types": {"LP Rewards": "LP", "Trading": "TRADE"}
        }"#,
    )
    .unwrap()
}

fn options(out_dir: &std::path::Path) -> FetchOptions {
    FetchOptions {
        database_id: "db-1".to_string(),
        cycle: Cycle::new(12).unwrap(),
        out_dir: Utf8PathBuf::from_path_buf(out_dir.to_path_buf()).unwrap(),
        allow_existing: false,
        properties: PropertyNames::default(),
        status: StatusFilter::default(),
        page_size: 2,
        dry_run: false,
    }
}

#[test]
fn fetch_downloads_every_row_across_pages() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockNotion::new(vec![
        vec![
            page("p1", "Cycle 12 - ETH LP", "Ethereum", &["LP Rewards"], &["https://f/1"]),
            page("p2", "Cycle 12 - ETH trade", "Ethereum", &["Trading"], &["https://f/2"]),
        ],
        vec![page("p3", "Cycle 12 - Base LP", "Base", &["LP Rewards"], &["https://f/3"])],
    ])
    .with_file("https://f/1", b"{\"root\":\"0x1\"}")
    .with_file("https://f/2", b"{\"root\":\"0x2\"}")
    .with_file("https://f/3", b"{\"root\":\"0x3\"}");

    let app = App::new(client, mapping());
    let result = app.fetch(&options(temp.path()), &JsonOutput).unwrap();

    assert_eq!(result.files.len(), 3);
    let dir = temp.path().join("cycle-12");
    let mut names = std::fs::read_dir(&dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    names.sort();
    assert_eq!(names, vec!["1_LP_12.json", "1_TRADE_12.json", "8453_LP_12.json"]);
    for name in &names {
        assert!(std::fs::metadata(dir.join(name)).unwrap().len() > 0);
    }
    assert_eq!(
        std::fs::read_to_string(dir.join("8453_LP_12.json")).unwrap(),
        "{\"root\":\"0x3\"}"
    );
}

#[test]
fn fetch_sends_cursor_for_following_pages() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockNotion::new(vec![
        vec![page("p1", "Cycle 12", "Ethereum", &["LP Rewards"], &["https://f/1"])],
        vec![page("p2", "Cycle 12", "Base", &["LP Rewards"], &["https://f/2"])],
    ])
    .with_file("https://f/1", b"1")
    .with_file("https://f/2", b"2");

    let app = App::new(&client, mapping());
    app.fetch(&options(temp.path()), &JsonOutput).unwrap();

    let bodies = client.bodies.lock().unwrap();
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0].get("start_cursor").is_none());
    assert_eq!(bodies[1]["start_cursor"], "cursor-1");
    assert_eq!(bodies[0]["page_size"], 2);
    assert_eq!(bodies[0]["filter"]["and"][0]["title"]["contains"], "Cycle 12");
}

#[test]
fn missing_chain_fails_without_writing() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockNotion::new(vec![vec![page(
        "p1",
        "Cycle 12",
        "Ethereum",
        &["LP Rewards"],
        &["https://f/1"],
    )]])
    .with_file("https://f/1", b"1");

    let app = App::new(client, mapping());
    let err = app.fetch(&options(temp.path()), &JsonOutput).unwrap_err();

    assert_matches!(err, SyncError::MissingChainRows { ref chain_id, .. } if chain_id == "8453");
    assert!(!temp.path().join("cycle-12").exists());
}

#[test]
fn two_types_fail_before_download() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockNotion::new(vec![vec![
        page("p1", "Cycle 12", "Base", &["LP Rewards"], &["https://f/1"]),
        page("p2", "Cycle 12", "Ethereum", &["LP Rewards", "Trading"], &["https://f/2"]),
    ]])
    .with_file("https://f/1", b"1")
    .with_file("https://f/2", b"2");

    let app = App::new(&client, mapping());
    let err = app.fetch(&options(temp.path()), &JsonOutput).unwrap_err();

    assert_matches!(err, SyncError::TypeCardinality { count: 2, .. });
    assert!(client.downloads.lock().unwrap().is_empty());
    assert!(!temp.path().join("cycle-12").exists());
}

#[test]
fn invalid_rows_fail_before_any_download() {
    let file = |name: &str, url: &str| json!({ "name": name, "type": "file", "file": { "url": url } });
    let cases = [
        ("Chain", json!({ "type": "select", "select": { "name": "Solana" } })),
        ("Chain", json!({ "type": "select", "select": null })),
        ("Chain", json!({ "type": "select", "select": { "name": "" } })),
        ("Type", json!({ "type": "multi_select", "multi_select": [{ "name": "Staking" }] })),
        ("Type", json!({ "type": "multi_select", "multi_select": [] })),
        ("Merkle file", json!({ "type": "files", "files": [] })),
        (
            "Merkle file",
            json!({ "type": "files", "files": [file("a.json", "https://f/a"), file("b.json", "https://f/b")] }),
        ),
        ("Merkle file", json!({ "type": "files", "files": [file("m.json", "")] })),
        ("Task name", json!({ "type": "rich_text", "rich_text": [] })),
    ];

    for (property, value) in cases {
        let temp = tempfile::tempdir().unwrap();
        let client = MockNotion::new(vec![vec![
            page("p1", "Cycle 12", "Ethereum", &["LP Rewards"], &["https://f/1"]),
            broken_page(property, value.clone()),
        ]])
        .with_file("https://f/1", b"1")
        .with_file("https://f/2", b"2");

        let app = App::new(&client, mapping());
        let err = app.fetch(&options(temp.path()), &JsonOutput).unwrap_err();

        match property {
            "Chain" => assert_matches!(
                err,
                SyncError::UnmappedChain { .. } | SyncError::MissingChain { .. },
                "{value}"
            ),
            "Type" => assert_matches!(
                err,
                SyncError::UnmappedType { .. } | SyncError::TypeCardinality { count: 0, .. },
                "{value}"
            ),
            "Merkle file" => assert_matches!(
                err,
                SyncError::FileCardinality { count: 0 | 2, .. } | SyncError::NoFileUrl { .. },
                "{value}"
            ),
            _ => assert_matches!(err, SyncError::InvalidTitle { .. }, "{value}"),
        }
        assert!(client.downloads.lock().unwrap().is_empty(), "{value}");
        assert!(!temp.path().join("cycle-12").exists(), "{value}");
    }
}

#[test]
fn missing_title_fails_before_any_download() {
    let temp = tempfile::tempdir().unwrap();
    let mut broken = page_json("p2", "Cycle 12", "Base", &["LP Rewards"], &["https://f/2"]);
    broken["properties"]
        .as_object_mut()
        .unwrap()
        .remove("Task name");
    let client = MockNotion::new(vec![vec![
        page("p1", "Cycle 12", "Ethereum", &["LP Rewards"], &["https://f/1"]),
        serde_json::from_value(broken).unwrap(),
    ]])
    .with_file("https://f/1", b"1");

    let app = App::new(&client, mapping());
    let err = app.fetch(&options(temp.path()), &JsonOutput).unwrap_err();

    assert_matches!(err, SyncError::InvalidTitle { ref page_id, .. } if page_id == "p2");
    assert!(client.downloads.lock().unwrap().is_empty());
    assert!(!temp.path().join("cycle-12").exists());
}

#[test]
fn duplicate_pair_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockNotion::new(vec![vec![
        page("p1", "Cycle 12", "Base", &["LP Rewards"], &["https://f/1"]),
        page("p2", "Cycle 12 again", "Base", &["LP Rewards"], &["https://f/2"]),
    ]]);

    let app = App::new(client, mapping());
    let err = app.fetch(&options(temp.path()), &JsonOutput).unwrap_err();

    assert_eq!(err.to_string(), "page p2: duplicate chain/type 8453:LP");
}

#[test]
fn rows_without_cycle_label_are_skipped() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockNotion::new(vec![vec![
        page("p1", "Cycle 12", "Base", &["LP Rewards"], &["https://f/1"]),
        page("p2", "Cycle 1 backfill", "Base", &["LP Rewards"], &["https://f/2"]),
        page("p3", "Cycle 12", "Ethereum", &["LP Rewards"], &["https://f/3"]),
    ]])
    .with_file("https://f/1", b"1")
    .with_file("https://f/3", b"3");

    let app = App::new(client, mapping());
    let result = app.fetch(&options(temp.path()), &JsonOutput).unwrap();

    assert_eq!(result.files.len(), 2);
}

#[test]
fn non_empty_directory_requires_allow_existing() {
    let temp = tempfile::tempdir().unwrap();
    let dir = temp.path().join("cycle-12");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("1_LP_12.json"), b"stale").unwrap();

    let rows = || {
        vec![vec![
            page("p1", "Cycle 12", "Ethereum", &["LP Rewards"], &["https://f/1"]),
            page("p2", "Cycle 12", "Base", &["LP Rewards"], &["https://f/2"]),
        ]]
    };

    let app = App::new(MockNotion::new(rows()), mapping());
    let err = app.fetch(&options(temp.path()), &JsonOutput).unwrap_err();
    assert_matches!(err, SyncError::DirectoryNotEmpty(_));

    let client = MockNotion::new(rows())
        .with_file("https://f/1", b"fresh")
        .with_file("https://f/2", b"2");
    let app = App::new(client, mapping());
    let mut opts = options(temp.path());
    opts.allow_existing = true;
    app.fetch(&opts, &JsonOutput).unwrap();
    assert_eq!(std::fs::read(dir.join("1_LP_12.json")).unwrap(), b"fresh");
}

#[test]
fn empty_download_is_fatal_and_leaves_no_file() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockNotion::new(vec![vec![
        page("p1", "Cycle 12", "Ethereum", &["LP Rewards"], &["https://f/1"]),
        page("p2", "Cycle 12", "Base", &["LP Rewards"], &["https://f/2"]),
    ]])
    .with_file("https://f/1", b"")
    .with_file("https://f/2", b"2");

    let app = App::new(client, mapping());
    let err = app.fetch(&options(temp.path()), &JsonOutput).unwrap_err();

    assert_matches!(err, SyncError::EmptyDownload(_));
    let dir = temp.path().join("cycle-12");
    assert_eq!(std::fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn no_data_source_is_fatal() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockNotion {
        data_sources: Vec::new(),
        ..MockNotion::default()
    };
    let app = App::new(client, mapping());
    let err = app.fetch(&options(temp.path()), &JsonOutput).unwrap_err();
    assert_matches!(err, SyncError::NoDataSource);
}

#[test]
fn dry_run_downloads_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let client = MockNotion::new(vec![vec![
        page("p1", "Cycle 12", "Ethereum", &["LP Rewards"], &["https://f/1"]),
        page("p2", "Cycle 12", "Base", &["Trading"], &["https://f/2"]),
    ]]);

    let app = App::new(client, mapping());
    let mut opts = options(temp.path());
    opts.dry_run = true;
    let result = app.fetch(&opts, &JsonOutput).unwrap();

    assert!(result.dry_run);
    assert_eq!(result.files[1].file_name, "8453_TRADE_12.json");
    assert!(result.files.iter().all(|file| file.bytes.is_none()));
    assert!(!temp.path().join("cycle-12").exists());
}
