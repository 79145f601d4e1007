//! Coordinator port - the RPC surface a worker talks to.
//!
//! Transport and authentication are the implementation's business. The
//! in-process [`LocalCoordinator`](crate::impls::LocalCoordinator) serves the
//! same calls directly over a [`TaskStore`](super::TaskStore).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{JobDefinition, Task, TaskReport, WorkerIdentity};
use crate::error::Result;

/// Extra acquire parameters beyond job name and count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquireParams {
    /// Skip tasks touched at or after this instant.
    #[serde(default)]
    pub exclude_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProduceOptions {
    /// Messages per task. Falls back to the job's `batch_size`.
    #[serde(default)]
    pub batch_size: Option<usize>,
}

#[async_trait]
pub trait Coordinator: Send + Sync {
    /// Definitions for `names`; every job of the application when empty.
    async fn get_jobs(&self, names: &[String]) -> Result<Vec<JobDefinition>>;

    /// Idempotent upsert by name. Returns the stored definitions.
    async fn add_jobs(&self, jobs: Vec<JobDefinition>) -> Result<Vec<JobDefinition>>;

    /// Lease up to `count` tasks of `job_name` to `worker`.
    async fn acquire(
        &self,
        job_name: &str,
        count: usize,
        params: &AcquireParams,
        worker: &WorkerIdentity,
    ) -> Result<Vec<Task>>;

    /// Progress heartbeat or finish report.
    async fn report(&self, report: &TaskReport) -> Result<()>;

    /// Inject messages as message-mode tasks. Returns messages accepted.
    async fn produce(
        &self,
        topic: &str,
        messages: Vec<String>,
        options: &ProduceOptions,
    ) -> Result<usize>;
}
