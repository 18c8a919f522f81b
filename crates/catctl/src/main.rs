//! Operational CLI over the catalog core.
//!
//! Exit codes: 0 success; 1 malformed arguments or unknown subcommand;
//! 2 permission denied; 3 not found; 4 lock or concurrency conflict;
//! 5 internal.

use catalog::{CatalogConfig, CatalogManager};
use catalog_store::MemoryStore;
use catalog_types::{CatalogError, Member};
use clap::Parser;
use gridengine::{SchedulerConfig, SgeScheduler};
use std::process::ExitCode;
use std::sync::Arc;

mod acl;
mod job;
mod seed;
mod study;

/// Catalog administration CLI.
#[derive(Debug, Parser)]
#[command(about, version)]
struct Opt {
    /// TOML configuration; built-in defaults are used when omitted
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    /// JSON catalog snapshot to load into the embedded store
    #[arg(long)]
    catalog: Option<std::path::PathBuf>,

    /// The principal issuing the request (user id, 'anonymous' or 'admin')
    #[arg(long, default_value = "anonymous")]
    user: String,

    #[command(subcommand)]
    cmd: SubCommand,
}

#[derive(Debug, Parser)]
enum SubCommand {
    #[command(subcommand)]
    Job(job::JobCommand),
    #[command(subcommand)]
    Acl(acl::AclCommand),
    #[command(subcommand)]
    Study(study::StudyCommand),
}

pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CatalogError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CatalogError::Internal(anyhow::anyhow!(err)))?;
    println!("{text}");
    Ok(())
}

fn default_config() -> CatalogConfig {
    CatalogConfig {
        id_offset: 1000,
        scheduler: SchedulerConfig {
            qsub_binary: "qsub".into(),
            qstat_binary: "qstat".into(),
            qacct_binary: "qacct".into(),
            default_queue: "all.q".into(),
            queues: vec![],
            probe_timeout_secs: 10,
        },
    }
}

fn load_config(opts: &Opt) -> Result<CatalogConfig, CatalogError> {
    match &opts.config {
        None => Ok(default_config()),
        Some(path) => {
            let text = std::fs::read_to_string(path).map_err(|err| {
                CatalogError::InvalidArgument(format!(
                    "cannot read config {}: {err}",
                    path.display()
                ))
            })?;
            toml::from_str(&text).map_err(|err| {
                CatalogError::InvalidArgument(format!(
                    "cannot parse config {}: {err}",
                    path.display()
                ))
            })
        }
    }
}

async fn run(opts: Opt) -> Result<(), CatalogError> {
    let config = load_config(&opts)?;
    let store = Arc::new(MemoryStore::new(config.id_offset));

    if let Some(path) = &opts.catalog {
        seed::load_catalog(store.as_ref(), path).await?;
    }

    let scheduler = Arc::new(SgeScheduler::new(config.scheduler.clone()));
    let manager = CatalogManager::new(store, scheduler, config);

    let caller: Member = opts
        .user
        .parse()
        .map_err(CatalogError::InvalidArgument)?;

    match &opts.cmd {
        SubCommand::Job(cmd) => cmd.run(&manager, &caller).await,
        SubCommand::Acl(cmd) => cmd.run(&manager, &caller).await,
        SubCommand::Study(cmd) => cmd.run(&manager, &caller).await,
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let opts = match Opt::try_parse() {
        Ok(opts) => opts,
        Err(err) => {
            // clap would exit 2; the documented contract is 1 for malformed
            // arguments and unknown subcommands
            let _ = err.print();
            return ExitCode::from(1);
        }
    };

    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
