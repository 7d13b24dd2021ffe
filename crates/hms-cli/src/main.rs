//! # hms CLI entry point
//!
//! Parses command-line arguments, loads configuration, connects to
//! PostgreSQL and dispatches to subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use hms_cli::admission::{run_admission, AdmissionArgs};
use hms_cli::audit::run_audit;
use hms_cli::config::CliConfig;
use hms_cli::room::{run_room, RoomArgs};
use hms_cli::{resolve_actor, Session};
use hms_core::Role;
use hms_occupancy::OccupancyService;
use hms_store::PgStore;

/// Hospital room occupancy CLI
///
/// Admits, transfers and discharges patients and edits rooms while keeping
/// every room's status consistent with its admissions.
#[derive(Parser, Debug)]
#[command(name = "hms", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    /// User id recorded as the caller. Required by every command except
    /// `migrate`.
    #[arg(long, global = true, env = "HMS_ACTOR_ID")]
    as_user: Option<i64>,

    /// Role the caller was authorized under.
    #[arg(long, global = true, env = "HMS_ACTOR_ROLE", default_value = "staff")]
    as_role: Role,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply the embedded database migrations.
    Migrate,

    /// Room create, update, delete and lookup.
    Room(RoomArgs),

    /// Admit, transfer, discharge and delete admissions.
    Admission(AdmissionArgs),

    /// Report rooms whose status disagrees with their open admissions.
    Audit,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "hms CLI starting");

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> Result<u8> {
    let config = CliConfig::load(cli.config.as_deref())?;
    tracing::debug!(?config, "configuration loaded");

    let actor = match cli.command {
        Commands::Migrate => None,
        _ => Some(resolve_actor(cli.as_user, cli.as_role)?),
    };

    let store = PgStore::connect(config.database_url()?, config.store_config())
        .await
        .context("failed to connect to PostgreSQL")?;

    let Some(actor) = actor else {
        store.migrate().await.context("failed to apply migrations")?;
        println!("OK: migrations applied");
        return Ok(0);
    };

    let session = Session::new(OccupancyService::new(store), actor, cli.json);
    match &cli.command {
        Commands::Room(args) => run_room(args, &session).await,
        Commands::Admission(args) => run_admission(args, &session).await,
        Commands::Audit => run_audit(&session).await,
        Commands::Migrate => Ok(0),
    }
}
