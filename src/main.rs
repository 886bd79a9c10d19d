mod api;
mod config;
mod display;
mod error;
mod manager;
mod schedule;
mod servers;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use api::HttpCompute;
use config::Config;
use error::ScheduleError;
use manager::BackupScheduleManager;
use schedule::{pretty_choice_list, RawOverrides, ScheduleOverrides, DAY_CHOICES, HOUR_CHOICES};
use servers::{find_server, ServerRef};

#[derive(Parser, Debug)]
#[command(name = "rax-backup-schedule", version, about)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log requests and decisions to stderr
    #[arg(long, short = 'v', global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show or edit the backup schedule for a server.
    ///
    /// With no flags, the backup schedule will be shown. If flags are given,
    /// the backup schedule will be modified accordingly.
    BackupSchedule(ScheduleArgs),
    /// Delete the backup schedule for a server.
    BackupScheduleDelete(ServerArgs),
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Name or ID of server.
    #[arg(value_name = "SERVER")]
    server: String,
}

#[derive(Args, Debug)]
struct ScheduleArgs {
    /// Name or ID of server.
    #[arg(value_name = "SERVER")]
    server: String,

    /// Enable backups.
    #[arg(long, conflicts_with = "disable")]
    enable: bool,

    /// Disable backups.
    #[arg(long)]
    disable: bool,

    #[arg(long, value_name = "DAY", help = weekly_help())]
    weekly: Option<String>,

    #[arg(long, value_name = "TIME_WINDOW", help = daily_help())]
    daily: Option<String>,

    /// Number of extra backups to keep around.
    #[arg(long, value_name = "N", allow_hyphen_values = true)]
    rotation: Option<String>,
}

impl ScheduleArgs {
    fn raw_overrides(&self) -> RawOverrides {
        let enabled = match (self.enable, self.disable) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        };

        RawOverrides {
            enabled,
            weekly: self.weekly.clone(),
            daily: self.daily.clone(),
            rotation: self.rotation.clone(),
        }
    }
}

fn weekly_help() -> String {
    format!(
        "Schedule a weekly backup for <DAY> (one of: {}).",
        pretty_choice_list(&DAY_CHOICES)
    )
}

fn daily_help() -> String {
    format!(
        "Schedule a daily backup during <TIME_WINDOW> (one of: {}).",
        pretty_choice_list(&HOUR_CHOICES)
    )
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::BackupSchedule(args) => handle_schedule(args, cli.config),
        Command::BackupScheduleDelete(args) => handle_delete(args, cli.config),
    }
}

fn handle_schedule(args: ScheduleArgs, config_path: Option<PathBuf>) -> Result<()> {
    // Reject bad values before touching the network
    let overrides = ScheduleOverrides::validate(&args.raw_overrides())?;

    let config = config::load(config_path.as_deref())?;
    let api = connect(&config)?;
    let server = find_server(&api, &args.server)?;
    let manager = BackupScheduleManager::new(&api);

    if overrides.is_empty() {
        match manager.get(&server) {
            Ok(schedule) => println!("{}", display::render_schedule(schedule.spec())),
            Err(ScheduleError::NotFound(_)) => {
                println!("No backup schedule configured for server {}.", describe(&server));
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to fetch backup schedule for server {}", describe(&server))
                })
            }
        }
        return Ok(());
    }

    let mut schedule = manager
        .update_or_create(&server, &overrides)
        .with_context(|| format!("failed to update backup schedule for server {}", describe(&server)))?;

    // Show what the API stored; fall back to the submitted document
    if let Err(e) = schedule.refresh() {
        tracing::warn!(
            "backup schedule for server {} was submitted but could not be re-read: {}",
            describe(schedule.server()),
            e
        );
    }

    println!("{}", display::render_schedule(schedule.spec()));
    Ok(())
}

fn handle_delete(args: ServerArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = config::load(config_path.as_deref())?;
    let api = connect(&config)?;
    let server = find_server(&api, &args.server)?;
    let manager = BackupScheduleManager::new(&api);

    let result = manager.get(&server).and_then(|schedule| schedule.delete());
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            println!("No backup schedule configured for server {}.", describe(&server));
            Ok(())
        }
        Err(e) => Err(e).with_context(|| {
            format!("failed to delete backup schedule for server {}", describe(&server))
        }),
    }
}

fn connect(config: &Config) -> Result<HttpCompute> {
    if let Some(ref path) = config.config_path {
        tracing::debug!("loaded configuration from {}", path.display());
    }
    if config.api.auth_token.is_none() {
        eprintln!("warning: no auth token configured; requests will be unauthenticated");
    }
    HttpCompute::new(&config.api).context("failed to set up compute API client")
}

fn describe(server: &ServerRef) -> String {
    if server.name.is_empty() || server.name == server.id {
        server.id.clone()
    } else {
        format!("{} ({})", server.name, server.id)
    }
}

// =============================================================================
// Initialization
// =============================================================================

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
