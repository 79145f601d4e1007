//! Worker poll loop and the group that runs one loop per job.
//!
//! A loop refreshes its job definition through its own [`JobCache`],
//! acquires tasks, runs them one after another and sleeps with jitter when
//! there is nothing to do. Shutdown is only observed between tasks, so a
//! running batch is never cut short.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::job_cache::JobCache;
use super::runner::TaskRunner;
use crate::config::WorkerConfig;
use crate::domain::WorkerIdentity;
use crate::error::Result;
use crate::ports::{AcquireParams, Coordinator};
use crate::typed::Job;

pub struct JobPollLoop {
    name: String,
    job: Arc<dyn Job>,
    coordinator: Arc<dyn Coordinator>,
    runner: Arc<TaskRunner>,
    cache: JobCache,
    worker: WorkerIdentity,
    config: WorkerConfig,
}

impl JobPollLoop {
    pub fn new(
        job: Arc<dyn Job>,
        coordinator: Arc<dyn Coordinator>,
        runner: Arc<TaskRunner>,
        worker: WorkerIdentity,
        config: WorkerConfig,
    ) -> Self {
        let name = job.name();
        let cache = JobCache::new(name.clone(), config.job_refresh_interval);
        Self {
            name,
            job,
            coordinator,
            runner,
            cache,
            worker,
            config,
        }
    }

    pub fn job_name(&self) -> &str {
        &self.name
    }

    /// One poll cycle. Returns the number of tasks processed.
    pub async fn run_once(&mut self) -> Result<usize> {
        let Some(def) = self.cache.get(self.coordinator.as_ref()).await? else {
            tracing::debug!(job = %self.name, "Job not known to coordinator yet");
            return Ok(0);
        };
        if !def.enabled {
            return Ok(0);
        }

        let tasks = self
            .coordinator
            .acquire(
                &def.name,
                self.config.acquire_count,
                &AcquireParams::default(),
                &self.worker,
            )
            .await?;

        let leased = tasks.len();
        for task in tasks {
            tracing::debug!(job = %def.name, task_id = %task.id, "Running task");
            self.runner.run(Arc::clone(&self.job), task).await;
        }
        Ok(leased)
    }

    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(job = %self.name, worker = %self.worker, "Poll loop started");
        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.run_once().await {
                Ok(0) => true,
                Ok(_) => false,
                Err(err) => {
                    tracing::warn!(job = %self.name, error = %err, "Poll cycle failed");
                    true
                }
            };

            if idle {
                tokio::select! {
                    changed = shutdown.changed() => {
                        // sender gone: the group handle was dropped
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.config.jittered_idle_delay()) => {}
                }
            }
        }
        tracing::info!(job = %self.name, "Poll loop stopped");
    }
}

/// Handle over a set of running poll loops.
///
/// Dropping the handle without calling [`WorkerGroup::shutdown_and_join`]
/// also stops the loops, since their shutdown receivers see the sender go.
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    pub fn spawn(loops: Vec<JobPollLoop>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let joins = loops
            .into_iter()
            .map(|poll| tokio::spawn(poll.run(shutdown_rx.clone())))
            .collect();
        Self { shutdown_tx, joins }
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    /// Stop taking new tasks. In-flight tasks run to completion.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                tracing::error!(error = %err, "Poll loop terminated abnormally");
            }
        }
    }
}
