use std::path::PathBuf;

use bento_sync::config::Config;
use bento_sync::engine::SyncEngine;
use bento_sync::store::RestStore;
use bento_sync::sync;
use bento_sync::{Result, SyncError};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

/// Exit code used when `--fail-on-error` is set and some items failed.
const EXIT_ITEM_FAILURES: i32 = 2;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing(cli.verbose) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            eprintln!("error: {error}");
            std::process::exit(1);
        }
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| SyncError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Sync(args) => execute_sync(args),
        Command::Flatten(args) => execute_flatten(args),
    }
}

fn execute_sync(args: SyncArgs) -> Result<i32> {
    let config = args.resolve_config()?;
    let options = config.plan_options();

    if args.dry_run {
        let plan = sync::plan_file(&args.input, &options)?;
        println!(
            "planned {} categories, {} subcategories, {} resources from {} rows",
            plan.categories.len(),
            plan.subcategories.len(),
            plan.resources.len(),
            plan.input_rows
        );
        for rejection in &plan.rejections {
            println!("  {rejection}");
        }
        return Ok(0);
    }

    let store = RestStore::new(
        config.store.require_base_url()?,
        config.store.api_key.clone(),
        config.store.timeout(),
    )?;
    let engine = SyncEngine::new(store)
        .with_collections(config.store.collections.clone())
        .with_concurrency(config.sync.concurrency);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = runtime.block_on(sync::sync_file(&args.input, &engine, &options))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }

    if args.fail_on_error && report.has_failures() {
        return Ok(EXIT_ITEM_FAILURES);
    }
    Ok(0)
}

fn execute_flatten(args: FlattenArgs) -> Result<i32> {
    let rows = sync::catalog_to_tabular(&args.input, &args.output)?;
    println!("wrote {rows} rows to {}", args.output.display());
    Ok(0)
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Keep the curated resource catalog in sync with its remote store."
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Push a tabular export (.csv or .xlsx) into the remote store.
    Sync(SyncArgs),
    /// Flatten hierarchical catalog JSON into a tabular export.
    Flatten(FlattenArgs),
}

#[derive(clap::Args)]
struct SyncArgs {
    /// Tabular export to read.
    #[arg(long)]
    input: PathBuf,

    /// Optional TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the store's data API.
    #[arg(long, env = "BENTO_STORE_URL")]
    base_url: Option<String>,

    /// API key sent with every request.
    #[arg(long, env = "BENTO_STORE_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Items reconciled concurrently within a phase.
    #[arg(long)]
    concurrency: Option<usize>,

    /// Parse and plan only; never contact the store.
    #[arg(long)]
    dry_run: bool,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Exit with status 2 when any item failed.
    #[arg(long)]
    fail_on_error: bool,
}

impl SyncArgs {
    /// File configuration with command-line and environment overrides applied.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(base_url) = &self.base_url {
            config.store.base_url = Some(base_url.clone());
        }
        if let Some(api_key) = &self.api_key {
            config.store.api_key = Some(api_key.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.sync.concurrency = concurrency;
        }
        Ok(config)
    }
}

#[derive(clap::Args)]
struct FlattenArgs {
    /// Catalog JSON file, or a directory of per-category JSON files.
    #[arg(long)]
    input: PathBuf,

    /// Output path; the extension (.csv or .xlsx) selects the format.
    #[arg(long)]
    output: PathBuf,
}
