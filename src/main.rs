//! # TaskPulse: task timers, auto-scheduling and start reminders
//!
//! Usage:
//!   taskpulse run                         # Interactive session against the task backend
//!   taskpulse run --offline --tasks t.json
//!   taskpulse slot --minutes 45           # Where would a 45-minute task go right now?
//!   taskpulse init-config                 # Write ~/.taskpulse/config.toml

mod host;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use taskpulse_core::TaskPulseConfig;
use taskpulse_core::traits::TaskStore;
use taskpulse_scheduler::auto::occupied_by_others;
use taskpulse_scheduler::slot::{ScheduleRequest, SlotRules, compute_slot_with, effective_duration, fallback_slot};
use taskpulse_store::{MemoryTaskStore, RestTaskStore};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "taskpulse", version, about = "⏱️ TaskPulse: task timers, auto-scheduling and reminders")]
struct Cli {
    /// Config file (default: ~/.taskpulse/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive session: timers, reminders and scheduling on stdin
    Run {
        /// Use an in-memory task store instead of the REST backend
        #[arg(long)]
        offline: bool,

        /// JSON task list to seed the offline store with
        #[arg(long, requires = "offline")]
        tasks: Option<String>,
    },
    /// Print the slot a new task would get right now
    Slot {
        #[arg(short, long, default_value = "30")]
        minutes: i64,

        #[arg(short, long)]
        domain: Option<String>,

        /// Ignore the backend's existing tasks
        #[arg(long)]
        offline: bool,
    },
    /// Write the default config file
    InitConfig,
}

fn expand_path(p: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(p).to_string())
}

fn load_config(path: Option<&str>) -> Result<TaskPulseConfig> {
    let config = match path {
        Some(p) => TaskPulseConfig::load_from(&expand_path(p))?,
        None => TaskPulseConfig::load()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "taskpulse=debug,taskpulse_core=debug,taskpulse_timer=debug,taskpulse_scheduler=debug,taskpulse_store=debug"
    } else {
        "taskpulse=info,taskpulse_core=info,taskpulse_timer=info,taskpulse_scheduler=info,taskpulse_store=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::InitConfig => {
            let path = cli
                .config
                .as_deref()
                .map(expand_path)
                .unwrap_or_else(TaskPulseConfig::default_path);
            if path.exists() {
                println!("⚠️  Config already exists at {}", path.display());
            } else {
                TaskPulseConfig::default().save_to(&path)?;
                println!("✅ Default config written to {}", path.display());
            }
        }
        Command::Slot {
            minutes,
            domain,
            offline,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let store: Arc<dyn TaskStore> = if offline {
                Arc::new(MemoryTaskStore::default())
            } else {
                Arc::new(RestTaskStore::new(&config.store)?)
            };
            let rules = SlotRules::from(&config.scheduler);
            let now = Local::now().naive_local();
            let duration = effective_duration(minutes, &rules);
            let start = match store.list().await {
                Ok(tasks) => {
                    let request = ScheduleRequest {
                        duration_minutes: duration,
                        domain,
                        occupied: occupied_by_others(&tasks, ""),
                    };
                    compute_slot_with(&request, &config.work_window, &rules, now)
                }
                Err(e) => {
                    tracing::warn!("⚠️ Task list unavailable, using fallback slot: {e}");
                    fallback_slot(now, &rules)
                }
            };
            println!(
                "📅 {} → {} ({duration} min)",
                start.format("%a %Y-%m-%d %H:%M"),
                (start + chrono::Duration::minutes(duration)).format("%H:%M")
            );
        }
        Command::Run { offline, tasks } => {
            let config = load_config(cli.config.as_deref())?;
            let store: Arc<dyn TaskStore> = if offline {
                Arc::new(host::offline_store(tasks.as_deref().map(expand_path).as_deref())?)
            } else {
                let rest = RestTaskStore::new(&config.store)?;
                tracing::info!("🌐 Task backend: {}", rest.base_url());
                Arc::new(rest)
            };
            host::run(config, store, offline).await?;
        }
    }

    Ok(())
}
