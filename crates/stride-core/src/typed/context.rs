//! Per-task execution context handed to job code.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::domain::{Task, Window};

/// Where a running task is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Loading the payload. Progress heartbeats are suppressed.
    Fetching,
    Processing,
}

#[derive(Debug, Default)]
struct Counters {
    total: AtomicU64,
    success: AtomicU64,
    fetching: AtomicBool,
}

/// Point-in-time copy of the progress counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub total: u64,
    pub success: u64,
    pub phase_fetching: bool,
}

/// Shared progress counters.
///
/// The job body updates them through its [`JobContext`]; the runner reads
/// them from outside the body to send heartbeats and, if the body panics,
/// the final counts.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle(Arc<Counters>);

impl ProgressHandle {
    pub fn set_total(&self, total: u64) {
        self.0.total.store(total, Ordering::Relaxed);
    }

    pub fn add_success(&self, n: u64) {
        self.0.success.fetch_add(n, Ordering::Relaxed);
    }

    pub fn set_phase(&self, phase: Phase) {
        self.0
            .fetching
            .store(phase == Phase::Fetching, Ordering::Relaxed);
    }

    pub fn phase(&self) -> Phase {
        if self.0.fetching.load(Ordering::Relaxed) {
            Phase::Fetching
        } else {
            Phase::Processing
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.0.total.load(Ordering::Relaxed),
            success: self.0.success.load(Ordering::Relaxed),
            phase_fetching: self.0.fetching.load(Ordering::Relaxed),
        }
    }
}

/// Everything a job sees while processing one leased task.
#[derive(Debug)]
pub struct JobContext {
    task: Task,
    progress: ProgressHandle,

    /// Last processed item key, reported with the finish.
    pub key: Option<String>,

    /// Explicit finish message. Overrides `remark` on success.
    pub message: Option<String>,

    /// Free-form note used as the completion message when none is set.
    pub remark: Option<String>,
}

impl JobContext {
    pub fn new(task: Task, progress: ProgressHandle) -> Self {
        Self {
            task,
            progress,
            key: None,
            message: None,
            remark: None,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The task's time slice; `None` for message batches and ad-hoc tasks.
    pub fn window(&self) -> Option<Window> {
        self.task.window
    }

    pub fn progress(&self) -> &ProgressHandle {
        &self.progress
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = Some(key.into());
    }

    pub fn set_remark(&mut self, remark: impl Into<String>) {
        self.remark = Some(remark.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_counters() {
        let progress = ProgressHandle::default();
        let other = progress.clone();

        progress.set_total(5);
        progress.add_success(2);
        other.add_success(1);
        other.set_phase(Phase::Fetching);

        let snap = progress.snapshot();
        assert_eq!(snap.total, 5);
        assert_eq!(snap.success, 3);
        assert_eq!(progress.phase(), Phase::Fetching);
    }
}
