use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use movie_catalog_api::{titles_from_lines, API_CONTRACT_VERSION};
use movie_catalog_service::logging::init_tracing;
use movie_catalog_service::{
    serve, ServiceConfig, ServiceState, DEFAULT_BIND, DEFAULT_DATABASE_LOCATION,
    SERVICE_CONTRACT_VERSION,
};
use movie_catalog_store_sqlite::SqliteStore;
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "movie-catalog-service")]
#[command(about = "Read-only HTTP service for the movie catalog")]
struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_DATABASE_LOCATION)]
    db: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Serve(ServeArgs),
    Seed(SeedArgs),
    SchemaVersion,
}

#[derive(Debug, Args)]
struct ServeArgs {
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: SocketAddr,
    #[arg(long, default_value_t = false)]
    track_mutations: bool,
    #[arg(long, default_value_t = false)]
    compact_json: bool,
}

/// Load the deployment's titles into an empty store; a populated store is refused.
#[derive(Debug, Args)]
struct SeedArgs {
    /// File with one movie title per line; blank lines are skipped.
    #[arg(long)]
    titles_file: PathBuf,
}

fn emit_json(value: Value) -> Result<()> {
    let value = match value {
        Value::Object(mut object) => {
            object.insert(
                "service_contract_version".to_string(),
                Value::String(SERVICE_CONTRACT_VERSION.to_string()),
            );
            object.insert(
                "api_contract_version".to_string(),
                Value::String(API_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => other,
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => run_serve(cli.db, args).await,
        Command::Seed(args) => run_seed(cli.db, &args),
        Command::SchemaVersion => run_schema_version(&cli.db),
    }
}

async fn run_serve(db: PathBuf, args: ServeArgs) -> Result<()> {
    let config = ServiceConfig {
        database_location: db,
        track_mutations: args.track_mutations,
        compact_json: args.compact_json,
        ..ServiceConfig::default()
    };
    tracing::info!(database = %config.database_location.display(), "opening movie store");
    let state = ServiceState::from_config(config)?;
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    serve(listener, state).await
}

fn run_seed(db: PathBuf, args: &SeedArgs) -> Result<()> {
    let content = std::fs::read_to_string(&args.titles_file).with_context(|| {
        format!("failed to read titles file {}", args.titles_file.display())
    })?;
    let titles = titles_from_lines(&content);
    let config =
        ServiceConfig { database_location: db, track_mutations: true, ..ServiceConfig::default() };
    let api = config.open_api()?;
    let result = api.seed_titles(titles)?;
    emit_json(serde_json::json!({
        "titles_file": args.titles_file,
        "inserted": result.inserted,
        "total": result.total
    }))
}

fn run_schema_version(db: &Path) -> Result<()> {
    let status = SqliteStore::open(db)?.schema_status()?;
    emit_json(serde_json::json!({
        "current_version": status.current_version,
        "target_version": status.target_version,
        "pending_versions": status.pending_versions,
        "up_to_date": status.pending_versions.is_empty()
    }))
}
