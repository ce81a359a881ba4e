// src/pipeline/schedule.rs

//! Fixed-interval driver for sync cycles.
//!
//! Each tick spawns the cycle as its own task. A busy flag claimed with
//! `swap` keeps cycles from overlapping: a tick that finds the flag set is
//! dropped, not queued.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{AppError, Result};
use crate::models::{ArtifactKind, Config, DirectoryConfig, SyncTally};
use crate::pipeline::publish::{GitPublisher, PublishOutcome, Publisher};
use crate::pipeline::sync::{PageBuilder, SyncEngine};

/// Work the scheduler runs on every tick.
#[async_trait]
pub trait CycleJob: Send + Sync + 'static {
    /// Name for logs.
    fn name(&self) -> String;

    async fn run(&self) -> Result<()>;
}

/// How the publish step of a run went.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub enum PublishStatus {
    /// No publisher attached
    #[default]
    Disabled,
    Published(PublishOutcome),
    /// The git step that failed and its message
    Failed { step: String, message: String },
}

impl From<Result<PublishOutcome>> for PublishStatus {
    fn from(result: Result<PublishOutcome>) -> Self {
        match result {
            Ok(outcome) => PublishStatus::Published(outcome),
            Err(AppError::Publish { step, message }) => PublishStatus::Failed { step, message },
            Err(e) => PublishStatus::Failed {
                step: "publish".into(),
                message: e.to_string(),
            },
        }
    }
}

/// What one sync-and-publish run did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncRun {
    pub tally: SyncTally,
    pub published: PublishStatus,
}

impl SyncRun {
    /// The publish failure as an error, if there was one.
    ///
    /// The tally and inventory stand either way; nothing is rolled back.
    pub fn publish_error(&self) -> Option<AppError> {
        match &self.published {
            PublishStatus::Failed { step, message } => {
                Some(AppError::publish(step.as_str(), message))
            }
            _ => None,
        }
    }
}

/// Reconcile, then publish.
pub struct SyncJob<B: PageBuilder> {
    engine: Mutex<SyncEngine<B>>,
    publisher: Option<Arc<dyn Publisher>>,
    kind: ArtifactKind,
}

impl<B: PageBuilder> SyncJob<B> {
    pub fn new(engine: SyncEngine<B>, publisher: Option<Arc<dyn Publisher>>) -> Self {
        let kind = engine.kind();
        Self {
            engine: Mutex::new(engine),
            publisher,
            kind,
        }
    }

    /// Attach the git publisher when publishing is enabled.
    pub fn from_config(engine: SyncEngine<B>, config: &Config) -> Self {
        let publisher: Option<Arc<dyn Publisher>> = if config.publish.enabled {
            Some(Arc::new(GitPublisher::from_config(config, engine.kind())))
        } else {
            None
        };
        Self::new(engine, publisher)
    }

    pub fn engine(&self) -> &Mutex<SyncEngine<B>> {
        &self.engine
    }

    /// One cycle plus publish.
    ///
    /// `Err` means the cycle itself aborted. A publish failure comes back as
    /// [`PublishStatus::Failed`] after the cycle's changes are in place.
    pub async fn run_once(&self) -> Result<SyncRun> {
        let tally = self.engine.lock().await.run_cycle().await?;

        let published = match &self.publisher {
            None => PublishStatus::Disabled,
            Some(publisher) => {
                let status = PublishStatus::from(
                    publisher.publish(self.kind.publish_description()).await,
                );
                if let PublishStatus::Failed { step, message } = &status {
                    log::error!("✗ {} publish failed during {step}: {message}", self.kind.label());
                }
                status
            }
        };

        Ok(SyncRun { tally, published })
    }
}

#[async_trait]
impl<B: PageBuilder + 'static> CycleJob for SyncJob<B> {
    fn name(&self) -> String {
        self.kind.label().to_string()
    }

    async fn run(&self) -> Result<()> {
        let run = self.run_once().await?;
        match run.publish_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Commit and push one directory, with no reconciliation.
pub struct PublishJob {
    name: String,
    description: String,
    publisher: Arc<dyn Publisher>,
}

impl PublishJob {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        publisher: Arc<dyn Publisher>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            publisher,
        }
    }

    /// Job for one entry of `publish.directories`.
    pub fn for_directory(config: &Config, dir: &DirectoryConfig) -> Self {
        Self::new(
            &dir.name,
            &dir.description,
            Arc::new(GitPublisher::for_directory(config, dir)),
        )
    }

    pub async fn run_once(&self) -> Result<PublishOutcome> {
        self.publisher.publish(&self.description).await
    }
}

#[async_trait]
impl CycleJob for PublishJob {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn run(&self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}

/// Counters exposed for observability and tests.
#[derive(Debug, Default)]
struct SchedulerStats {
    started: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub started: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// Clears the busy flag when the cycle task ends, however it ends.
struct BusyGuard(Arc<AtomicBool>);

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs a [`CycleJob`] on a fixed interval.
pub struct SyncScheduler<J: CycleJob> {
    job: Arc<J>,
    interval: Duration,
    grace: Duration,
    busy: Arc<AtomicBool>,
    stats: Arc<SchedulerStats>,
}

impl<J: CycleJob> SyncScheduler<J> {
    pub fn new(job: Arc<J>, interval: Duration) -> Self {
        Self {
            job,
            interval,
            grace: Duration::from_secs(30),
            busy: Arc::new(AtomicBool::new(false)),
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    /// How long shutdown waits for an in-flight cycle before aborting it.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            started: self.stats.started.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            failed: self.stats.failed.load(Ordering::Relaxed),
        }
    }

    /// Start a cycle unless one is already running.
    pub fn trigger(&self) -> Option<JoinHandle<()>> {
        if self.busy.swap(true, Ordering::AcqRel) {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            log::info!("⏭ Already processing {}, skipping", self.job.name());
            return None;
        }
        self.stats.started.fetch_add(1, Ordering::Relaxed);

        let guard = BusyGuard(Arc::clone(&self.busy));
        let job = Arc::clone(&self.job);
        let stats = Arc::clone(&self.stats);

        Some(tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = job.run().await {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                log::error!("✗ {} cycle failed: {e}", job.name());
            }
        }))
    }

    /// Tick until `shutdown` resolves, then drain the running cycle.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        log::info!(
            "🔄 {} auto-sync every {:?}",
            self.job.name(),
            self.interval
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut in_flight: Option<JoinHandle<()>> = None;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Some(handle) = self.trigger() {
                        in_flight = Some(handle);
                    }
                }
            }
        }

        log::info!("🛑 Stopping {} auto-sync", self.job.name());
        let Some(mut handle) = in_flight else {
            return;
        };
        if handle.is_finished() {
            return;
        }

        log::info!(
            "Waiting up to {:?} for the running {} cycle",
            self.grace,
            self.job.name()
        );
        match tokio::time::timeout(self.grace, &mut handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::error!("✗ {} cycle task ended abnormally: {e}", self.job.name()),
            Err(_) => {
                log::warn!(
                    "{} cycle still running after {:?}; aborting",
                    self.job.name(),
                    self.grace
                );
                handle.abort();
                let _ = handle.await;
            }
        }
    }
}
