//! Scripted coordinator for worker-side tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::DateTime;

use crate::domain::{JobDefinition, Task, TaskReport, WorkerIdentity};
use crate::error::{Result, StrideError};
use crate::ports::{AcquireParams, Coordinator, ProduceOptions};

#[derive(Default)]
pub struct RecordingCoordinator {
    pub jobs: Mutex<Vec<JobDefinition>>,
    pub pending: Mutex<Vec<Task>>,
    pub reports: Mutex<Vec<TaskReport>>,
    pub get_jobs_calls: AtomicUsize,
    pub fail_get_jobs: AtomicBool,
    pub fail_reports: AtomicBool,
}

impl RecordingCoordinator {
    pub fn with_job(def: JobDefinition) -> Self {
        let this = Self::default();
        this.jobs.lock().unwrap().push(def);
        this
    }

    pub fn windowed(name: &str) -> Self {
        Self::with_job(JobDefinition::windowed(name, DateTime::UNIX_EPOCH, 60))
    }

    pub fn push_task(&self, task: Task) {
        self.pending.lock().unwrap().push(task);
    }

    pub fn reports(&self) -> Vec<TaskReport> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Coordinator for RecordingCoordinator {
    async fn get_jobs(&self, names: &[String]) -> Result<Vec<JobDefinition>> {
        self.get_jobs_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_get_jobs.load(Ordering::SeqCst) {
            return Err(StrideError::Transport("coordinator unreachable".to_string()));
        }
        let jobs = self.jobs.lock().unwrap();
        Ok(jobs
            .iter()
            .filter(|j| names.is_empty() || names.contains(&j.name))
            .cloned()
            .collect())
    }

    async fn add_jobs(&self, defs: Vec<JobDefinition>) -> Result<Vec<JobDefinition>> {
        self.jobs.lock().unwrap().extend(defs.iter().cloned());
        Ok(defs)
    }

    async fn acquire(
        &self,
        _job_name: &str,
        count: usize,
        _params: &AcquireParams,
        _worker: &WorkerIdentity,
    ) -> Result<Vec<Task>> {
        let mut pending = self.pending.lock().unwrap();
        let n = count.min(pending.len());
        Ok(pending.drain(..n).collect())
    }

    async fn report(&self, report: &TaskReport) -> Result<()> {
        if self.fail_reports.load(Ordering::SeqCst) {
            return Err(StrideError::Transport("connection reset".to_string()));
        }
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }

    async fn produce(
        &self,
        _topic: &str,
        _messages: Vec<String>,
        _options: &ProduceOptions,
    ) -> Result<usize> {
        Ok(0)
    }
}
