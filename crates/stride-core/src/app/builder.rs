//! WorkerBuilder - registers jobs and validates them before anything runs.
//!
//! Misconfiguration is the one fatal error class, so it is caught here:
//! duplicate job names, invalid definitions (a message job without a topic)
//! and jobs the deployment expects but nobody registered.

use std::sync::Arc;

use super::reporter::Reporter;
use super::runner::TaskRunner;
use super::worker_loop::{JobPollLoop, WorkerGroup};
use crate::config::WorkerConfig;
use crate::domain::{JobDefinition, WorkerIdentity};
use crate::error::StrideError;
use crate::ports::Coordinator;
use crate::typed::{Job, JobRegistry};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing jobs: {0:?}. These jobs were expected but not registered")]
    MissingJobs(Vec<String>),

    #[error(transparent)]
    Invalid(#[from] StrideError),
}

pub struct WorkerBuilder {
    config: WorkerConfig,
    registry: JobRegistry,
    expected_jobs: Option<Vec<String>>,
    identity: Option<WorkerIdentity>,
}

impl WorkerBuilder {
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            config,
            registry: JobRegistry::new(),
            expected_jobs: None,
            identity: None,
        }
    }

    pub fn register<J: Job>(mut self, job: J) -> Result<Self, BuildError> {
        self.registry.register(job)?;
        Ok(self)
    }

    /// Fail `build()` unless every name here has been registered.
    pub fn expect_jobs(mut self, names: &[&str]) -> Self {
        self.expected_jobs = Some(names.iter().map(|n| n.to_string()).collect());
        self
    }

    /// Override the machine/process identity reported to the coordinator.
    pub fn with_identity(mut self, identity: WorkerIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn build(self) -> Result<Worker, BuildError> {
        for job in self.registry.jobs() {
            let def = job.definition();
            def.validate().map_err(|reason| StrideError::Misconfigured {
                job: def.name.clone(),
                reason,
            })?;
        }

        if let Some(expected) = &self.expected_jobs {
            let registered = self.registry.names();
            let missing: Vec<String> = expected
                .iter()
                .filter(|name| !registered.contains(name))
                .cloned()
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingJobs(missing));
            }
        }

        Ok(Worker {
            config: self.config,
            registry: self.registry,
            identity: self.identity.unwrap_or_else(WorkerIdentity::current),
        })
    }
}

/// A validated set of jobs ready to be started against a coordinator.
pub struct Worker {
    config: WorkerConfig,
    registry: JobRegistry,
    identity: WorkerIdentity,
}

impl Worker {
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn identity(&self) -> &WorkerIdentity {
        &self.identity
    }

    pub fn job_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Definitions as published on start, stamped with this worker's app.
    pub fn definitions(&self) -> Vec<JobDefinition> {
        self.registry
            .jobs()
            .map(|job| JobDefinition {
                app_id: self.config.app_id.clone(),
                ..job.definition()
            })
            .collect()
    }

    /// One poll loop per job, sharing a reporter and a runner.
    pub fn poll_loops(&self, coordinator: Arc<dyn Coordinator>) -> Vec<JobPollLoop> {
        let reporter = Arc::new(Reporter::new(
            Arc::clone(&coordinator),
            self.identity.clone(),
            self.config.message_limit,
        ));
        let runner = Arc::new(TaskRunner::new(reporter, self.config.progress_interval));
        self.registry
            .jobs()
            .map(|job| {
                JobPollLoop::new(
                    Arc::clone(job),
                    Arc::clone(&coordinator),
                    Arc::clone(&runner),
                    self.identity.clone(),
                    self.config.clone(),
                )
            })
            .collect()
    }

    /// Publish the job definitions, then spawn the poll loops.
    pub async fn start(
        self,
        coordinator: Arc<dyn Coordinator>,
    ) -> Result<WorkerGroup, StrideError> {
        let stored = coordinator.add_jobs(self.definitions()).await?;
        tracing::info!(
            app = %self.config.app_id,
            worker = %self.identity,
            jobs = stored.len(),
            "Worker starting"
        );
        Ok(WorkerGroup::spawn(self.poll_loops(coordinator)))
    }
}
