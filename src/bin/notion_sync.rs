use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use miette::IntoDiagnostic;

use merkle_cycle_tools::app::App;
use merkle_cycle_tools::cli::{fail, init_tracing, parse_args};
use merkle_cycle_tools::config::{
    DEFAULT_MAPPING_PATH, FetchOptions, Mapping, PropertyNames, StatusFilter,
};
use merkle_cycle_tools::domain::{Cycle, StatusKind};
use merkle_cycle_tools::notion::{NOTION_API_VERSION, NotionHttpClient};
use merkle_cycle_tools::output::{JsonOutput, LogSink, fetch_summary};

#[derive(Parser)]
#[command(name = "notion-sync")]
#[command(about = "Download a cycle's merkle reward files attached to Notion rows")]
#[command(version)]
struct Cli {
    /// Notion database ID
    #[arg(long, value_parser = NonEmptyStringValueParser::new())]
    database_id: String,

    /// Cycle number to fetch (e.g. 20)
    #[arg(long)]
    cycle: Cycle,

    /// Repo root output directory
    #[arg(long, default_value = ".")]
    out_dir: Utf8PathBuf,

    /// JSON mapping file
    #[arg(long, default_value = DEFAULT_MAPPING_PATH)]
    mapping: Utf8PathBuf,

    /// Notion token
    #[arg(long, env = "NOTION_TOKEN", hide_env_values = true, default_value = "")]
    notion_token: String,

    /// Notion API version for the Notion-Version header
    #[arg(long, default_value = NOTION_API_VERSION)]
    notion_version: String,

    /// Allow an existing, non-empty cycle directory (re-download and overwrite files)
    #[arg(long)]
    allow_existing: bool,

    /// Title property name
    #[arg(long, default_value = "Task name")]
    prop_title: String,

    /// Status property name
    #[arg(long, default_value = "Status")]
    prop_status: String,

    /// Select property name
    #[arg(long, default_value = "Chain")]
    prop_chain: String,

    /// Multi-select property name
    #[arg(long, default_value = "Type")]
    prop_type: String,

    /// Files property name
    #[arg(long, default_value = "Merkle file")]
    prop_file: String,

    /// Status value to match
    #[arg(long, default_value = "Done")]
    status_done: String,

    /// Status property type
    #[arg(long, value_enum, default_value_t = StatusKind::Status)]
    status_type: StatusKind,

    /// Notion query page_size
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=100))]
    page_size: u32,

    /// Validate rows and list the files without downloading
    #[arg(long)]
    dry_run: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = match parse_args::<Cli>() {
        Ok(cli) => cli,
        Err(message) => return fail(message),
    };
    init_tracing();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => fail(report),
    }
}

fn run(cli: Cli) -> miette::Result<()> {
    let client = NotionHttpClient::new(&cli.notion_token, &cli.notion_version)?;
    let mapping = Mapping::load(&cli.mapping)?;
    let options = FetchOptions {
        database_id: cli.database_id,
        cycle: cli.cycle,
        out_dir: cli.out_dir,
        allow_existing: cli.allow_existing,
        properties: PropertyNames {
            title: cli.prop_title,
            status: cli.prop_status,
            chain: cli.prop_chain,
            reward_type: cli.prop_type,
            file: cli.prop_file,
        },
        status: StatusFilter {
            done: cli.status_done,
            kind: cli.status_type,
        },
        page_size: cli.page_size,
        dry_run: cli.dry_run,
    };

    let app = App::new(client, mapping);
    if cli.json {
        let result = app.fetch(&options, &JsonOutput)?;
        JsonOutput::print_fetch(&result).into_diagnostic()?;
    } else {
        let result = app.fetch(&options, &LogSink)?;
        println!("{}", fetch_summary(&result));
    }
    Ok(())
}
