//! Task record: one leasable unit of work (a time window or a message batch).
//!
//! All state transitions go through methods here. Stores call them while
//! holding their row lock, so the counter bumps in `finish` are applied
//! store-side rather than read-modify-written by workers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::WorkerIdentity;
use super::ids::{JobId, TaskId};
use super::report::{FinishOutcome, FinishReport, ProgressReport};
use super::state::TaskStatus;
use super::window::Window;
use crate::error::{Result, StrideError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub job_id: JobId,
    pub app_id: String,

    /// `None` for message batches and ad-hoc tasks.
    pub window: Option<Window>,

    pub total: u64,
    pub success: u64,
    /// Items per second.
    pub speed: u64,
    /// Processing seconds of the last completed attempt.
    pub cost: u64,

    /// Failed attempts. Only ever increases (except on reset).
    pub error_count: u32,
    /// Finished attempts ("times"). Only ever increases (except on reset).
    pub attempts: u32,

    pub status: TaskStatus,

    /// Last worker that touched this task.
    pub server: Option<String>,
    pub process_id: Option<u32>,

    /// Opaque checkpoint blob (message batch payload, resume data).
    pub data: Option<String>,
    /// Last processed item key.
    pub key: Option<String>,
    /// Last human-readable outcome.
    pub message: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task about to be inserted; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub job_id: JobId,
    pub app_id: String,
    pub window: Option<Window>,
    pub data: Option<String>,
}

impl NewTask {
    pub fn window(job_id: JobId, app_id: impl Into<String>, window: Window) -> Self {
        Self {
            job_id,
            app_id: app_id.into(),
            window: Some(window),
            data: None,
        }
    }

    pub fn ad_hoc(job_id: JobId, app_id: impl Into<String>) -> Self {
        Self {
            job_id,
            app_id: app_id.into(),
            window: None,
            data: None,
        }
    }

    pub fn batch(job_id: JobId, app_id: impl Into<String>, data: String) -> Self {
        Self {
            job_id,
            app_id: app_id.into(),
            window: None,
            data: Some(data),
        }
    }
}

impl Task {
    /// Materialize a new Ready task.
    pub fn from_new(id: TaskId, new: NewTask, now: DateTime<Utc>) -> Self {
        Self {
            id,
            job_id: new.job_id,
            app_id: new.app_id,
            window: new.window,
            total: 0,
            success: 0,
            speed: 0,
            cost: 0,
            error_count: 0,
            attempts: 0,
            status: TaskStatus::Ready,
            server: None,
            process_id: None,
            data: new.data,
            key: None,
            message: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: TaskStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(StrideError::InvalidTransition {
                task: self.id,
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn touch(&mut self, worker: &WorkerIdentity, now: DateTime<Utc>) {
        self.server = Some(worker.server.clone());
        self.process_id = Some(worker.process_id);
        // updated_at never goes backwards, even with a skewed caller clock
        self.updated_at = self.updated_at.max(now);
    }

    /// Ready/Errored -> Leased.
    pub fn lease(&mut self, holder: &WorkerIdentity, now: DateTime<Utc>) -> Result<()> {
        self.transition(TaskStatus::Leased)?;
        self.touch(holder, now);
        Ok(())
    }

    /// Heartbeat. Keeps the status; leaves the error/attempt counters alone.
    pub fn record_progress(&mut self, report: &ProgressReport, now: DateTime<Utc>) -> Result<()> {
        if self.status != TaskStatus::Leased {
            return Err(StrideError::InvalidTransition {
                task: self.id,
                from: self.status,
                to: TaskStatus::Leased,
            });
        }
        self.speed = report.speed;
        self.total = report.total;
        self.success = report.success;
        self.touch(&report.worker, now);
        Ok(())
    }

    /// Leased -> Completed | Errored. Always counts one attempt.
    pub fn finish(&mut self, report: &FinishReport, now: DateTime<Utc>) -> Result<()> {
        match &report.outcome {
            FinishOutcome::Completed { cost_secs, message } => {
                self.transition(TaskStatus::Completed)?;
                self.cost = *cost_secs;
                if let Some(message) = message {
                    self.message = Some(message.clone());
                }
            }
            FinishOutcome::Errored { message } => {
                self.transition(TaskStatus::Errored)?;
                self.error_count = self.error_count.saturating_add(1);
                self.message = Some(message.clone());
            }
        }
        self.attempts = self.attempts.saturating_add(1);
        self.speed = report.speed;
        self.total = report.total;
        self.success = report.success;
        if report.key.is_some() {
            self.key = report.key.clone();
        }
        self.touch(&report.worker, now);
        Ok(())
    }

    /// Any -> Ready with counters zeroed. Manual requeue.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.status = TaskStatus::Ready;
        self.total = 0;
        self.success = 0;
        self.speed = 0;
        self.error_count = 0;
        self.attempts = 0;
        self.updated_at = self.updated_at.max(now);
    }

    /// Leased -> Errored after the lease outlived its TTL without a finish.
    pub fn expire_lease(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(TaskStatus::Errored)?;
        self.error_count = self.error_count.saturating_add(1);
        self.attempts = self.attempts.saturating_add(1);
        self.message = Some("lease expired".to_string());
        self.updated_at = self.updated_at.max(now);
        Ok(())
    }
}
