//! Roster Sync CLI
//!
//! Local execution entry point for one-shot syncs, auto-sync loops and
//! single-record maintenance.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use futures::FutureExt;
use futures::future::{self, BoxFuture, Shared};
use log::LevelFilter;
use roster_sync::{
    error::{AppError, Result},
    models::{ArtifactKind, Config, DirectoryConfig, Record},
    pipeline::{
        CycleJob, GitPublisher, PageBuilder, PublishJob, PublishOutcome, PublishStatus,
        SyncEngine, SyncJob, SyncRun, SyncScheduler,
    },
    services::{SheetClient, SheetSource},
    storage::Removal,
};

/// roster-sync - Google Sheets roster to static pages
#[derive(Parser, Debug)]
#[command(
    name = "roster-sync",
    version,
    about = "Keeps student pages and teacher dashboards in sync with the roster sheet"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "roster.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage student pages
    Students {
        #[command(subcommand)]
        action: Action,
    },

    /// Manage teacher dashboards
    Teachers {
        #[command(subcommand)]
        action: Action,
    },

    /// Student pages and teacher dashboards together
    All {
        #[command(subcommand)]
        action: AllAction,
    },

    /// Commit and push the extra directories in `publish.directories`
    Publish {
        #[command(subcommand)]
        action: PublishAction,
    },

    /// Validate the configuration file
    Validate,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Reconcile once, then publish
    Sync,

    /// Reconcile on a fixed interval until interrupted
    Auto {
        /// Interval in minutes (default from config)
        #[arg(value_parser = clap::value_parser!(u64).range(1..=MAX_AUTO_MINUTES))]
        minutes: Option<u64>,
    },

    /// List sheet records and whether their page exists
    List,

    /// Generate the page for one record
    Create {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Delete the page for one record
    Delete {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },

    /// Show the sheet data for one record
    Info {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AllAction {
    /// Reconcile both kinds once
    Sync,

    /// Run both auto-sync loops until interrupted
    Auto {
        /// Interval in minutes for both loops
        #[arg(value_parser = clap::value_parser!(u64).range(1..=MAX_AUTO_MINUTES))]
        minutes: Option<u64>,
    },
}

#[derive(Subcommand, Debug)]
enum PublishAction {
    /// Publish every configured directory once
    Sync,

    /// Publish each directory on its own interval until interrupted
    Auto {
        /// Interval in minutes for every directory (default from config)
        #[arg(value_parser = clap::value_parser!(u64).range(1..=MAX_AUTO_MINUTES))]
        minutes: Option<u64>,
    },

    /// Show uncommitted changes per directory
    Status,
}

/// Default interval for `all auto`.
const ALL_AUTO_MINUTES: u64 = 2;

/// Upper bound for `auto` intervals given on the command line (one day).
const MAX_AUTO_MINUTES: u64 = 24 * 60;

type ShutdownSignal = Shared<BoxFuture<'static, ()>>;

/// Initialize logging based on verbosity flag.
///
/// Returns whether the level is pinned by `-v` or `RUST_LOG`. Otherwise the
/// logger starts at info and `logging.level` from the config applies once the
/// file is loaded.
fn init_logging(verbose: bool) -> bool {
    let pinned = verbose || std::env::var_os("RUST_LOG").is_some();
    let level = if verbose { "debug" } else { "trace" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
    if !pinned {
        log::set_max_level(LevelFilter::Info);
    }
    pinned
}

fn apply_log_level(level: &str) {
    match level.parse::<LevelFilter>() {
        Ok(filter) => log::set_max_level(filter),
        Err(_) => log::warn!("Unknown logging.level {level:?}, staying at info"),
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    log::info!("🛑 Shutdown signal received");
}

fn shutdown_signal() -> ShutdownSignal {
    wait_for_shutdown_signal().boxed().shared()
}

fn log_run(kind: ArtifactKind, run: &SyncRun) {
    log::info!(
        "📊 {}: {} created, {} updated, {} deleted, {} total",
        kind.label(),
        run.tally.created,
        run.tally.updated,
        run.tally.deleted,
        run.tally.total
    );
    match &run.published {
        PublishStatus::Disabled => {}
        PublishStatus::Published(outcome) => log_outcome(outcome),
        PublishStatus::Failed { step, message } => {
            log::error!("✗ Publish failed during {step}: {message}")
        }
    }
}

fn log_outcome(outcome: &PublishOutcome) {
    if outcome.pushed {
        log::info!("🚀 Published {} changed file(s)", outcome.changed_files);
    } else if let Some(reason) = &outcome.reason {
        log::info!("Nothing published: {reason}");
    }
}

/// Turn a failed publish into the command's error.
fn check_published(run: &SyncRun) -> Result<()> {
    match run.publish_error() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Build a job and seed its inventory from disk.
async fn seeded_job<B: PageBuilder + 'static>(
    config: &Config,
    mut engine: SyncEngine<B>,
) -> Result<SyncJob<B>> {
    engine.seed().await?;
    Ok(SyncJob::from_config(engine, config))
}

fn minutes(m: u64) -> Duration {
    Duration::from_secs(m.saturating_mul(60))
}

/// Drive a job until shutdown and report its counters.
async fn run_scheduled<J: CycleJob>(
    config: &Config,
    job: Arc<J>,
    interval: Duration,
    shutdown: ShutdownSignal,
) {
    let name = job.name();
    let scheduler = SyncScheduler::new(job, interval)
        .with_grace(Duration::from_secs(config.schedule.shutdown_grace_secs));
    scheduler.run_until(shutdown).await;

    let stats = scheduler.stats();
    log::info!(
        "{name} auto-sync stopped: {} cycle(s) run, {} skipped, {} failed",
        stats.started,
        stats.skipped,
        stats.failed
    );
}

async fn auto_sync<B: PageBuilder + 'static>(
    config: &Config,
    engine: SyncEngine<B>,
    interval: Duration,
    shutdown: ShutdownSignal,
) -> Result<()> {
    let job = Arc::new(seeded_job(config, engine).await?);
    run_scheduled(config, job, interval, shutdown).await;
    Ok(())
}

fn publish_directories(config: &Config) -> Result<&[DirectoryConfig]> {
    if config.publish.directories.is_empty() {
        return Err(AppError::config(
            "no [[publish.directories]] entries configured",
        ));
    }
    Ok(&config.publish.directories)
}

async fn run_publish(config: &Config, action: PublishAction) -> Result<()> {
    let directories = publish_directories(config)?;

    match action {
        PublishAction::Sync => {
            let mut first_error = None;
            for dir in directories {
                match PublishJob::for_directory(config, dir).run_once().await {
                    Ok(outcome) => {
                        log::info!("📁 {}", dir.name);
                        log_outcome(&outcome);
                    }
                    Err(e) => {
                        log::error!("✗ {} publish failed: {e}", dir.name);
                        first_error.get_or_insert(e);
                    }
                }
            }
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        PublishAction::Auto { minutes: every } => {
            let shutdown = shutdown_signal();
            let loops = directories.iter().map(|dir| {
                let job = Arc::new(PublishJob::for_directory(config, dir));
                let interval = every.map(minutes).unwrap_or_else(|| dir.interval());
                run_scheduled(config, job, interval, shutdown.clone())
            });
            future::join_all(loops).await;
        }

        PublishAction::Status => {
            for dir in directories {
                let publisher = GitPublisher::for_directory(config, dir);
                let changes = publisher.changes().await?;
                println!(
                    "{} ({}): {} change(s)",
                    dir.name,
                    dir.path.display(),
                    changes.len()
                );
                for change in &changes {
                    println!("  {} {}", change.symbol(), change.path);
                }
            }
        }
    }

    Ok(())
}

async fn run_action<B: PageBuilder + 'static>(
    config: &Config,
    mut engine: SyncEngine<B>,
    action: Action,
) -> Result<()> {
    let kind = engine.kind();

    match action {
        Action::Sync => {
            let job = seeded_job(config, engine).await?;
            let run = job.run_once().await?;
            log_run(kind, &run);
            check_published(&run)?;
        }

        Action::Auto { minutes } => {
            let interval = minutes
                .map(self::minutes)
                .unwrap_or_else(|| config.interval(kind));
            auto_sync(config, engine, interval, shutdown_signal()).await?;
        }

        Action::List => {
            let entries = engine.listing().await?;
            println!("{} in the sheet ({}):", kind.label(), entries.len());
            for entry in &entries {
                let mark = if entry.exists { "✅" } else { "❌" };
                println!("  {mark} {} → {}", entry.name, entry.file_name);
            }
        }

        Action::Create { name } => {
            let name = name.join(" ");
            match engine.create_one(&name).await? {
                Some(key) => println!("✓ Wrote {key}"),
                None => {
                    return Err(AppError::validation(format!(
                        "{name:?} not found in the sheet"
                    )));
                }
            }
        }

        Action::Delete { name } => {
            let name = name.join(" ");
            match engine.remove_one(&name).await? {
                Removal::Deleted => println!("🗑️ Deleted {name}"),
                Removal::Missing => println!("Nothing to delete for {name}"),
                Removal::Refused => {
                    return Err(AppError::validation(format!(
                        "refusing to delete {name:?}: not a generated {kind}"
                    )));
                }
            }
        }

        Action::Info { name } => {
            let name = name.join(" ");
            let Some(record) = engine.find(&name).await? else {
                return Err(AppError::validation(format!(
                    "{name:?} not found in the sheet"
                )));
            };
            println!("{}", serde_json::to_string_pretty(&record)?);
            println!("file: {}", record.artifact_key().file_name());
        }
    }

    Ok(())
}

fn sheet_source(config: &Config) -> Result<Arc<dyn SheetSource>> {
    Ok(Arc::new(SheetClient::from_config(config)?))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let pinned = init_logging(cli.verbose);

    let config = Config::load_or_default(&cli.config);
    if !pinned {
        apply_log_level(&config.logging.level);
    }
    log::info!("Using configuration from {}", cli.config.display());

    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    match cli.command {
        Command::Students { action } => {
            let engine = SyncEngine::for_students(&config, sheet_source(&config)?);
            run_action(&config, engine, action).await?;
        }

        Command::Teachers { action } => {
            let engine = SyncEngine::for_teachers(&config, sheet_source(&config)?);
            run_action(&config, engine, action).await?;
        }

        Command::All { action } => {
            let source = sheet_source(&config)?;
            let students = SyncEngine::for_students(&config, Arc::clone(&source));
            let teachers = SyncEngine::for_teachers(&config, source);

            match action {
                AllAction::Sync => {
                    let students = seeded_job(&config, students).await?.run_once().await?;
                    log_run(ArtifactKind::StudentPage, &students);
                    let teachers = seeded_job(&config, teachers).await?.run_once().await?;
                    log_run(ArtifactKind::TeacherDashboard, &teachers);
                    check_published(&students)?;
                    check_published(&teachers)?;
                }

                AllAction::Auto { minutes } => {
                    let interval = self::minutes(minutes.unwrap_or(ALL_AUTO_MINUTES));
                    let shutdown = shutdown_signal();
                    let (students, teachers) = future::join(
                        auto_sync(&config, students, interval, shutdown.clone()),
                        auto_sync(&config, teachers, interval, shutdown),
                    )
                    .await;
                    students?;
                    teachers?;
                }
            }
        }

        Command::Publish { action } => {
            run_publish(&config, action).await?;
        }

        Command::Validate => {
            log::info!("✓ Config OK");
            log::info!("  sheet: {}", config.export_url());
            log::info!(
                "  pages: {} and {}",
                config.artifact_dir(ArtifactKind::StudentPage).display(),
                config.artifact_dir(ArtifactKind::TeacherDashboard).display()
            );
        }
    }

    Ok(())
}
