//! CLI front-end wiring [`taskbridge`]'s sync engine to a concrete Device/Host pair.

use clap::{Parser, Subcommand};
use log::error;

use taskbridge::device::{DeviceConnection, DeviceSqlAdapter};
use taskbridge::host::{HostCliAdapter, HostCliPaths};
use taskbridge::{SyncConfig, SyncEngine, SyncStateStore};

#[derive(Parser)]
#[command(name = "taskbridge", about = "Bidirectional Device <-> Host task sync")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Name of the container running the device's SQL client.
    #[arg(long, env = "DEVICE_CONTAINER", global = true, default_value = "device-db")]
    device_container: String,

    #[arg(long, env = "DEVICE_DB_USER", global = true, default_value = "device")]
    device_user: String,

    #[arg(long, env = "DEVICE_DB_PASSWORD", global = true, default_value = "")]
    device_password: String,

    #[arg(long, env = "DEVICE_DB_NAME", global = true, default_value = "device")]
    device_database: String,

    /// Path to a reminders-cli-compatible binary.
    #[arg(long, env = "HOST_REMINDERS_BIN", global = true, default_value = "reminders")]
    reminders_bin: String,
}

#[derive(Subcommand)]
enum Command {
    /// Creates the sync-state store file if it does not already exist.
    Init,
    /// Runs one sync pass.
    Sync {
        /// Plan and report actions without touching either store or the sync-state store.
        #[arg(long)]
        dry_run: bool,
    },
    /// Prints task counts and the sync-state store's pairing stats.
    Status,
    /// Checks connectivity to both Device and Host.
    Test,
    /// Prints the active configuration.
    Config,
    /// Reconciles Device categories and Host lists without syncing tasks.
    Categories,
    /// Wipes all pairing state and the audit log.
    ClearState {
        #[arg(long)]
        yes: bool,
    },
}

type Engine = SyncEngine<DeviceSqlAdapter, HostCliAdapter>;

fn build_engine(cli: &Cli, config: SyncConfig) -> taskbridge::SyncResult<Engine> {
    let device = DeviceSqlAdapter::new(DeviceConnection {
        container: cli.device_container.clone(),
        user: cli.device_user.clone(),
        password: cli.device_password.clone(),
        database: cli.device_database.clone(),
    });
    let host = HostCliAdapter::new(HostCliPaths {
        reminders_bin: cli.reminders_bin.clone(),
    });
    let store = SyncStateStore::open(&config.sync_state_path)?;
    Ok(SyncEngine::new(device, host, store, config))
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = match SyncConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let exit_code = match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {e}");
            eprintln!("error: {e}");
            1
        }
    };
    std::process::exit(exit_code);
}

async fn run(cli: Cli, config: SyncConfig) -> taskbridge::SyncResult<i32> {
    match &cli.command {
        Command::Init => {
            let _ = SyncStateStore::open(&config.sync_state_path)?;
            println!("sync-state store ready at {}", config.sync_state_path);
            Ok(0)
        }
        Command::Config => {
            config.print();
            Ok(0)
        }
        Command::Test => {
            let engine = build_engine(&cli, config)?;
            let (device_ok, host_ok) = engine.test_connections().await?;
            println!("device: {}", if device_ok { "ok" } else { "unreachable" });
            println!("host: {}", if host_ok { "ok" } else { "unreachable" });
            Ok(if device_ok && host_ok { 0 } else { 1 })
        }
        Command::Status => {
            let engine = build_engine(&cli, config)?;
            let status = engine.status().await?;
            println!("device tasks: {}", status.device_tasks);
            println!("host reminders: {}", status.host_reminders);
            println!(
                "sync state: {} paired, {} host-only, {} device-only",
                status.sync_state.both, status.sync_state.host_only, status.sync_state.device_only
            );
            for entry in &status.recent_logs {
                println!(
                    "[{}] {} {}",
                    entry.timestamp,
                    entry.action,
                    entry.details.as_deref().unwrap_or("")
                );
            }
            Ok(0)
        }
        Command::Categories => {
            let engine = build_engine(&cli, config)?;
            engine.reconcile_categories_only().await?;
            println!("categories reconciled");
            Ok(0)
        }
        Command::ClearState { yes } => {
            if !yes {
                eprintln!("refusing to clear sync state without --yes");
                return Ok(1);
            }
            let engine = build_engine(&cli, config)?;
            engine.clear_state()?;
            println!("sync state cleared");
            Ok(0)
        }
        Command::Sync { dry_run } => {
            let engine = build_engine(&cli, config)?;
            let result = engine.run(*dry_run).await?;
            println!(
                "created: device={} host={}; updated: device={} host={}; deleted: device={} host={}",
                result.created_on_device,
                result.created_on_host,
                result.updated_on_device,
                result.updated_on_host,
                result.deleted_on_device,
                result.deleted_on_host,
            );
            println!(
                "conflicts_resolved={} no_change={} deduped={}",
                result.conflicts_resolved, result.no_change, result.deduped
            );
            if !result.errors.is_empty() {
                for err in &result.errors {
                    eprintln!("action error: {err}");
                }
                return Ok(1);
            }
            Ok(0)
        }
    }
}
