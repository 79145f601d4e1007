//! Worker side of the reporting protocol.
//!
//! Send failures are logged and swallowed: a lost heartbeat only delays
//! observability, and a lost finish leaves the task Leased until a reset or
//! lease expiry. Neither may take the poll loop down.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::report::{error_message_for_store, truncate_chars};
use crate::domain::{
    FinishOutcome, FinishReport, ProgressReport, TaskId, TaskReport, WorkerIdentity,
};
use crate::error::JobError;
use crate::ports::Coordinator;
use crate::typed::ProgressSnapshot;

/// How a task body ended, before it is turned into a finish report.
#[derive(Debug)]
pub enum TaskOutcome {
    Succeeded {
        success: u64,
        message: Option<String>,
        remark: Option<String>,
    },
    Failed(JobError),
    Panicked(String),
}

pub struct Reporter {
    coordinator: Arc<dyn Coordinator>,
    worker: WorkerIdentity,
    message_limit: usize,
}

impl Reporter {
    pub fn new(
        coordinator: Arc<dyn Coordinator>,
        worker: WorkerIdentity,
        message_limit: usize,
    ) -> Self {
        Self {
            coordinator,
            worker,
            message_limit,
        }
    }

    pub fn worker(&self) -> &WorkerIdentity {
        &self.worker
    }

    /// Heartbeat. Skipped while the task is still fetching its payload.
    pub async fn progress(&self, task_id: TaskId, snapshot: ProgressSnapshot, elapsed: Duration) {
        if snapshot.phase_fetching {
            return;
        }
        let report = TaskReport::Progress(ProgressReport {
            task_id,
            speed: speed(snapshot.success, elapsed),
            total: snapshot.total,
            success: snapshot.success,
            worker: self.worker.clone(),
        });
        self.send(&report).await;
    }

    /// Build and send the one finish report of a lease.
    pub async fn finish(
        &self,
        task_id: TaskId,
        outcome: TaskOutcome,
        snapshot: ProgressSnapshot,
        elapsed: Duration,
        key: Option<String>,
    ) -> FinishReport {
        let report = self.build_finish(task_id, outcome, snapshot, elapsed, key);
        self.send(&TaskReport::Finish(report.clone())).await;
        report
    }

    pub fn build_finish(
        &self,
        task_id: TaskId,
        outcome: TaskOutcome,
        snapshot: ProgressSnapshot,
        elapsed: Duration,
        key: Option<String>,
    ) -> FinishReport {
        let (success, outcome) = match outcome {
            TaskOutcome::Succeeded {
                success,
                message,
                remark,
            } => {
                let message = message
                    .or(remark)
                    .map(|m| truncate_chars(&m, self.message_limit).to_string());
                (
                    success,
                    FinishOutcome::Completed {
                        cost_secs: elapsed.as_secs(),
                        message,
                    },
                )
            }
            TaskOutcome::Failed(err) => (
                snapshot.success,
                FinishOutcome::Errored {
                    message: error_message_for_store(&err.innermost_message(), self.message_limit),
                },
            ),
            TaskOutcome::Panicked(panic) => (
                snapshot.success,
                FinishOutcome::Errored {
                    message: error_message_for_store(&panic, self.message_limit),
                },
            ),
        };

        FinishReport {
            task_id,
            speed: speed(success, elapsed),
            total: snapshot.total.max(success),
            success,
            worker: self.worker.clone(),
            outcome,
            key,
        }
    }

    async fn send(&self, report: &TaskReport) {
        if let Err(err) = self.coordinator.report(report).await {
            tracing::warn!(task_id = %report.task_id(), error = %err, "Failed to send task report");
        }
    }
}

/// Items per second, rounding sub-second runs up to one second.
fn speed(success: u64, elapsed: Duration) -> u64 {
    success / elapsed.as_secs().max(1)
}
