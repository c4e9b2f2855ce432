//! Periodic task scheduler with per-task single-flight.
//!
//! Each registered task gets its own timer loop. A tick that finds the task
//! still running (from the previous tick or a manual trigger) is skipped,
//! never queued.
//!
//! # Configuration
//!
//! | Task | Setting | Default |
//! |------|---------|---------|
//! | `expiration_sweep` | `scheduler.sweep_interval_secs` | 3600s |
//! | `renewal_reminder` | `scheduler.reminder_interval_secs` | 86400s |
//! | `daily_stats` | `scheduler.daily_stats_interval_secs` | 86400s |
//!
//! The loops stop when the shutdown watch channel flips to `true`; a run
//! in progress is allowed to finish.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::domain::foundation::Timestamp;

/// Errors returned by the scheduler and its tasks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("task '{0}' is already running")]
    AlreadyRunning(String),

    #[error("unknown task '{0}'")]
    UnknownTask(String),

    #[error("task failed: {0}")]
    Failed(String),
}

/// A unit of work run on a fixed interval.
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    /// Stable name used in logs and manual triggers.
    fn name(&self) -> &'static str;

    /// Runs once and returns a short summary for the log.
    async fn run_once(&self, now: Timestamp) -> Result<String, TaskError>;
}

/// Shared in-progress flag.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight {
    running: Arc<AtomicBool>,
}

/// Clears the flag on drop, including when the run panics.
#[derive(Debug)]
pub struct FlightGuard {
    running: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the flag, or `None` when it is already held.
    pub fn try_acquire(&self) -> Option<FlightGuard> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard {
                running: Arc::clone(&self.running),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
struct ScheduledTask {
    task: Arc<dyn PeriodicTask>,
    interval: Duration,
    flight: SingleFlight,
}

impl ScheduledTask {
    async fn run_guarded(&self) -> Result<String, TaskError> {
        let name = self.task.name();
        let _guard = self
            .flight
            .try_acquire()
            .ok_or_else(|| TaskError::AlreadyRunning(name.to_string()))?;
        self.task.run_once(Timestamp::now()).await
    }

    async fn run_loop(self, mut shutdown: watch::Receiver<bool>) {
        let name = self.task.name();
        let mut interval = time::interval_at(Instant::now() + self.interval, self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!(task = name, "Periodic task stopped");
                        return;
                    }
                }
                _ = interval.tick() => {
                    match self.run_guarded().await {
                        Ok(summary) => info!(task = name, summary = %summary, "Periodic task finished"),
                        Err(TaskError::AlreadyRunning(_)) => {
                            debug!(task = name, "Previous run still in progress, skipping tick");
                        }
                        Err(e) => error!(task = name, error = %e, "Periodic task failed"),
                    }
                }
            }
        }
    }
}

/// Registry of periodic tasks.
#[derive(Clone, Default)]
pub struct Scheduler {
    tasks: Vec<ScheduledTask>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task to run every `interval`.
    pub fn with_task(mut self, task: Arc<dyn PeriodicTask>, interval: Duration) -> Self {
        self.tasks.push(ScheduledTask {
            task,
            interval,
            flight: SingleFlight::new(),
        });
        self
    }

    pub fn task_names(&self) -> Vec<&'static str> {
        self.tasks.iter().map(|t| t.task.name()).collect()
    }

    /// Runs the named task now, sharing the single-flight flag with its
    /// timer loop.
    pub async fn trigger(&self, name: &str) -> Result<String, TaskError> {
        let scheduled = self
            .tasks
            .iter()
            .find(|t| t.task.name() == name)
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))?;
        scheduled.run_guarded().await
    }

    /// Runs every task loop until shutdown is signalled.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!(tasks = ?self.task_names(), "Scheduler started");
        let loops = self
            .tasks
            .iter()
            .cloned()
            .map(|task| tokio::spawn(task.run_loop(shutdown.clone())));

        for result in futures::future::join_all(loops).await {
            if let Err(e) = result {
                error!(error = %e, "Periodic task loop aborted");
            }
        }
    }
}
