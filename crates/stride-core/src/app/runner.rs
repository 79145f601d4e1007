//! Runs one leased task: fetch, execute, heartbeats, finish.
//!
//! The job body runs on its own tokio task so a panic is contained to the
//! `JoinHandle`. Whatever happens to the body, exactly one finish report
//! is sent.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use super::reporter::{Reporter, TaskOutcome};
use crate::domain::{FinishReport, Task};
use crate::error::JobError;
use crate::typed::{Job, JobContext, Phase, ProgressHandle};

pub struct TaskRunner {
    reporter: Arc<Reporter>,
    progress_interval: Duration,
}

impl TaskRunner {
    pub fn new(reporter: Arc<Reporter>, progress_interval: Duration) -> Self {
        Self {
            reporter,
            progress_interval,
        }
    }

    pub async fn run(&self, job: Arc<dyn Job>, task: Task) -> FinishReport {
        let task_id = task.id;
        let started = Instant::now();
        let progress = ProgressHandle::default();
        let ctx = JobContext::new(task, progress.clone());

        let mut body = tokio::spawn(async move {
            let mut ctx = ctx;
            let result = execute(job.as_ref(), &mut ctx).await;
            (ctx, result)
        });

        let period = self.progress_interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(started + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let joined = loop {
            tokio::select! {
                joined = &mut body => break joined,
                _ = ticker.tick() => {
                    self.reporter
                        .progress(task_id, progress.snapshot(), started.elapsed())
                        .await;
                }
            }
        };

        let (outcome, key) = match joined {
            Ok((ctx, Ok(success))) => (
                TaskOutcome::Succeeded {
                    success,
                    message: ctx.message,
                    remark: ctx.remark,
                },
                ctx.key,
            ),
            Ok((ctx, Err(err))) => {
                tracing::warn!(task_id = %task_id, error = %err.innermost_message(), "Task failed");
                (TaskOutcome::Failed(err), ctx.key)
            }
            Err(join_err) => {
                let message = if join_err.is_panic() {
                    panic_message(join_err.into_panic())
                } else {
                    "task cancelled".to_string()
                };
                tracing::warn!(task_id = %task_id, panic = %message, "Task body panicked");
                (TaskOutcome::Panicked(message), None)
            }
        };

        self.reporter
            .finish(task_id, outcome, progress.snapshot(), started.elapsed(), key)
            .await
    }
}

async fn execute(job: &dyn Job, ctx: &mut JobContext) -> Result<u64, JobError> {
    ctx.progress().set_phase(Phase::Fetching);
    let payload = job.fetch(ctx).await;
    ctx.progress().set_phase(Phase::Processing);

    match payload? {
        Some(payload) => job.execute(ctx, payload).await,
        None => Ok(0),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
