use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use movie_catalog_harness::{run_layers, HarnessProfile, Layer, HARNESS_CONTRACT_VERSION};
use movie_catalog_service::logging::init_tracing;
use serde_json::Value;

#[derive(Debug, Parser)]
#[command(name = "movie-harness")]
#[command(about = "Verify the movie catalog service, its wiring, and the running processes")]
struct Cli {
    /// YAML profile with artifact and live expectations; defaults apply when omitted.
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// In-process contract checks against an ephemeral store.
    Contract,
    /// Static checks over the configuration files.
    Artifacts,
    /// Checks against the already-running service and client host.
    Live,
    /// Every layer, in order.
    All,
}

#[derive(Debug, Args)]
struct Overrides {
    #[arg(long, global = true)]
    root: Option<PathBuf>,
    #[arg(long, global = true)]
    database_file: Option<PathBuf>,
    #[arg(long, global = true)]
    api_base: Option<String>,
    #[arg(long, global = true)]
    ui_base: Option<String>,
    #[arg(long, global = true)]
    expected_population: Option<usize>,
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

impl Overrides {
    fn apply(self, profile: &mut HarnessProfile) {
        if let Some(root) = self.root {
            profile.artifacts.root = root;
        }
        if let Some(database_file) = self.database_file {
            profile.artifacts.database_file = Some(database_file);
        }
        if let Some(api_base) = self.api_base {
            profile.live.api_base = api_base;
        }
        if let Some(ui_base) = self.ui_base {
            profile.live.ui_base = ui_base;
        }
        if let Some(expected_population) = self.expected_population {
            profile.live.expected_population = expected_population;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            profile.live.timeout_ms = timeout_ms;
        }
    }
}

fn load_profile(path: Option<&Path>, overrides: Overrides) -> Result<HarnessProfile> {
    let mut profile = match path {
        Some(path) => HarnessProfile::from_path(path)
            .with_context(|| format!("failed to load profile {}", path.display()))?,
        None => HarnessProfile::default(),
    };
    overrides.apply(&mut profile);
    profile.validate().context("invalid harness profile")?;
    Ok(profile)
}

fn emit_json(value: Value) -> Result<()> {
    let value = match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(HARNESS_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => other,
    };
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let profile = load_profile(cli.profile.as_deref(), cli.overrides)?;

    let layers: &[Layer] = match cli.command {
        Command::Contract => &[Layer::Contract],
        Command::Artifacts => &[Layer::Artifacts],
        Command::Live => &[Layer::Live],
        Command::All => &[Layer::Contract, Layer::Artifacts, Layer::Live],
    };

    let report = run_layers(&profile, layers);
    emit_json(serde_json::to_value(&report)?)?;

    if !report.passed() {
        bail!("{} of {} checks failed", report.failure_count(), report.check_count());
    }
    Ok(())
}
