//! In-process coordinator.
//!
//! Serves the [`Coordinator`] calls straight from a [`TaskStore`], and owns
//! the coordinator-side maintenance: window production, ad-hoc triggers,
//! lease expiry and retention cleanup.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::CoordinatorConfig;
use crate::domain::{
    JobDefinition, JobId, JobMode, NewTask, NextWindow, Task, TaskId, TaskReport, WorkerIdentity,
    next_window,
};
use crate::error::{Result, StrideError};
use crate::lease::{AcquireRequest, LeaseAllocator};
use crate::observability::TaskCounts;
use crate::ports::{AcquireParams, Clock, Coordinator, ProduceOptions, TaskFilter, TaskStore};

struct JobTable {
    by_name: BTreeMap<String, JobDefinition>,
    next_id: u64,
}

impl JobTable {
    fn allocate_id(&mut self) -> JobId {
        let id = JobId::new(self.next_id);
        self.next_id += 1;
        id
    }
}

pub struct LocalCoordinator<S: ?Sized, C> {
    config: CoordinatorConfig,
    store: Arc<S>,
    clock: C,
    allocator: LeaseAllocator<S, C>,
    jobs: RwLock<JobTable>,
}

impl<S, C> LocalCoordinator<S, C>
where
    S: TaskStore + ?Sized,
    C: Clock + Clone,
{
    pub fn new(config: CoordinatorConfig, store: Arc<S>, clock: C) -> Self {
        let allocator =
            LeaseAllocator::new(Arc::clone(&store), clock.clone(), config.policy.clone());
        Self {
            config,
            store,
            clock,
            allocator,
            jobs: RwLock::new(JobTable {
                by_name: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    async fn job(&self, name: &str) -> Result<JobDefinition> {
        self.jobs
            .read()
            .await
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| StrideError::JobNotFound(name.to_string()))
    }

    fn job_id(job: &JobDefinition) -> Result<JobId> {
        job.id.ok_or_else(|| StrideError::JobNotFound(job.name.clone()))
    }

    /// Cut and insert pending windows for every enabled windowed job.
    ///
    /// Returns the tasks created. A job stops at `CaughtUp`, `Exhausted` or
    /// after `max_windows_per_tick` windows, whichever comes first. Each
    /// insert is conditional on the job's last window end, so a tick racing
    /// another producer backs off instead of cutting the same window twice.
    pub async fn schedule_windows(&self) -> Result<Vec<Task>> {
        let jobs: Vec<JobDefinition> =
            self.jobs.read().await.by_name.values().cloned().collect();
        let now = self.clock.now();
        let mut created = Vec::new();

        for job in jobs
            .iter()
            .filter(|j| j.enabled && j.mode == JobMode::TimeWindow && j.step_secs > 0)
        {
            let job_id = Self::job_id(job)?;
            let params = job.window_params();
            let mut last_end = self.store.last_window_end(job_id).await?;

            for _ in 0..self.config.max_windows_per_tick {
                let NextWindow::Window(window) = next_window(&params, last_end, now) else {
                    break;
                };
                let new_task = NewTask::window(job_id, &self.config.app_id, window);
                let Some(task) = self.store.insert_window_after(last_end, new_task, now).await?
                else {
                    tracing::debug!(job = %job.name, "Window already produced elsewhere");
                    break;
                };
                tracing::info!(
                    job = %job.name,
                    task_id = %task.id,
                    start = %window.start,
                    end = %window.end,
                    "Window task created"
                );
                last_end = Some(window.end);
                created.push(task);
            }
        }
        Ok(created)
    }

    /// Insert one window-less task for a `step = 0` job.
    pub async fn trigger(&self, job_name: &str) -> Result<Task> {
        let job = self.job(job_name).await?;
        if job.mode != JobMode::TimeWindow
            || next_window(&job.window_params(), None, self.clock.now()) != NextWindow::AdHoc
        {
            return Err(StrideError::Misconfigured {
                job: job.name,
                reason: "only jobs with step 0 can be triggered".to_string(),
            });
        }
        let task = self
            .store
            .insert(
                NewTask::ad_hoc(Self::job_id(&job)?, &self.config.app_id),
                self.clock.now(),
            )
            .await?;
        tracing::info!(job = %job.name, task_id = %task.id, "Ad-hoc task created");
        Ok(task)
    }

    /// Expire leases older than `lease_ttl`. No-op when no TTL is set.
    pub async fn reap_expired_leases(&self) -> Result<Vec<TaskId>> {
        let Some(ttl) = self.config.lease_ttl else {
            return Ok(Vec::new());
        };
        let now = self.clock.now();
        let expired = self.store.expire_leases(now - ttl, now).await?;
        for id in &expired {
            tracing::warn!(task_id = %id, "Lease expired without a finish report");
        }
        Ok(expired)
    }

    pub async fn counts(&self, job_name: &str) -> Result<TaskCounts> {
        let job = self.job(job_name).await?;
        self.store.counts(TaskFilter::Job(Self::job_id(&job)?)).await
    }

    pub async fn tasks(&self, job_name: &str) -> Result<Vec<Task>> {
        let job = self.job(job_name).await?;
        self.store.list(TaskFilter::Job(Self::job_id(&job)?)).await
    }

    pub async fn reset(&self, id: TaskId) -> Result<Task> {
        self.allocator.reset(id).await
    }

    pub async fn delete_up_to(&self, job_name: &str, max_id: TaskId) -> Result<usize> {
        let job = self.job(job_name).await?;
        self.allocator.delete_up_to(Self::job_id(&job)?, max_id).await
    }

    pub async fn delete_all(&self) -> Result<usize> {
        self.allocator.delete_all(&self.config.app_id).await
    }

    /// Flip a job's `enabled` flag. Registration never overrides it.
    pub async fn set_enabled(&self, job_name: &str, enabled: bool) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .by_name
            .get_mut(job_name)
            .ok_or_else(|| StrideError::JobNotFound(job_name.to_string()))?;
        job.enabled = enabled;
        Ok(())
    }
}

#[async_trait]
impl<S, C> Coordinator for LocalCoordinator<S, C>
where
    S: TaskStore + ?Sized,
    C: Clock + Clone,
{
    async fn get_jobs(&self, names: &[String]) -> Result<Vec<JobDefinition>> {
        let jobs = self.jobs.read().await;
        if names.is_empty() {
            return Ok(jobs.by_name.values().cloned().collect());
        }
        Ok(names
            .iter()
            .filter_map(|n| jobs.by_name.get(n).cloned())
            .collect())
    }

    async fn add_jobs(&self, defs: Vec<JobDefinition>) -> Result<Vec<JobDefinition>> {
        for def in &defs {
            def.validate().map_err(|reason| StrideError::Misconfigured {
                job: def.name.clone(),
                reason,
            })?;
        }

        let mut jobs = self.jobs.write().await;
        let mut stored = Vec::with_capacity(defs.len());
        for mut def in defs {
            let entry = match jobs.by_name.get_mut(&def.name) {
                Some(existing) => {
                    existing.update_from(&def);
                    tracing::debug!(job = %existing.name, "Job definition updated");
                    existing.clone()
                }
                None => {
                    def.id = Some(jobs.allocate_id());
                    def.app_id = self.config.app_id.clone();
                    tracing::info!(job = %def.name, mode = ?def.mode, "Job registered");
                    jobs.by_name.insert(def.name.clone(), def.clone());
                    def
                }
            };
            stored.push(entry);
        }
        Ok(stored)
    }

    async fn acquire(
        &self,
        job_name: &str,
        count: usize,
        params: &AcquireParams,
        worker: &WorkerIdentity,
    ) -> Result<Vec<Task>> {
        let job = self.job(job_name).await?;
        if !job.enabled {
            return Ok(Vec::new());
        }
        let request = AcquireRequest::new(Self::job_id(&job)?, count)
            .with_max_attempts(job.max_attempts)
            .with_exclude_end(params.exclude_end);
        self.allocator.acquire_tasks(&request, worker).await
    }

    async fn report(&self, report: &TaskReport) -> Result<()> {
        let task = self.store.apply_report(report, self.clock.now()).await?;
        if let TaskReport::Finish(finish) = report {
            tracing::debug!(
                task_id = %task.id,
                status = %task.status,
                success = finish.success,
                total = finish.total,
                "Task finished"
            );
        }
        Ok(())
    }

    async fn produce(
        &self,
        topic: &str,
        messages: Vec<String>,
        options: &ProduceOptions,
    ) -> Result<usize> {
        if topic.is_empty() || messages.is_empty() {
            return Ok(0);
        }

        let subscribers: Vec<JobDefinition> = self
            .jobs
            .read()
            .await
            .by_name
            .values()
            .filter(|j| {
                j.enabled && j.mode == JobMode::Message && j.topic.as_deref() == Some(topic)
            })
            .cloned()
            .collect();
        if subscribers.is_empty() {
            tracing::debug!(topic, "No job subscribes to topic");
            return Ok(0);
        }

        // every chunk of every subscriber lands together or not at all
        let mut batches = Vec::new();
        for job in &subscribers {
            let job_id = Self::job_id(job)?;
            let size = options
                .batch_size
                .filter(|n| *n > 0)
                .or((job.batch_size > 0).then_some(job.batch_size))
                .unwrap_or(messages.len());
            for chunk in messages.chunks(size) {
                let data = serde_json::to_string(chunk)?;
                batches.push(NewTask::batch(job_id, &self.config.app_id, data));
            }
        }
        let created = self.store.insert_batch(batches, self.clock.now()).await?;

        for job in &subscribers {
            tracing::info!(job = %job.name, topic, messages = messages.len(), "Messages produced");
        }
        tracing::debug!(topic, tasks = created.len(), "Batch tasks created");
        Ok(messages.len())
    }
}
