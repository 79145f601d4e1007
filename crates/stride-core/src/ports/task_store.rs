//! TaskStore port - durable source of truth for task rows.
//!
//! The lease engine needs four things from storage: an eligibility search,
//! a conditional lease transition, report application, and bulk delete.
//!
//! # Concurrency contract
//! - `try_lease` must re-check the eligibility predicate and flip the row to
//!   Leased in one atomic step (e.g. `UPDATE ... WHERE id = ? AND status IN (...)`).
//!   Then two concurrent acquires can never both win the same row.
//! - A store that can only do a plain read followed by a separate write still
//!   works, but delivery degrades to at-least-once and jobs must tolerate
//!   reprocessing a window.
//! - `insert_window_after` compares the job's latest window end with the
//!   caller's view and inserts only if they still agree, so concurrent
//!   producers can never cut the same window twice.
//! - `insert_batch` applies every row or none.
//! - Counter bumps (`error_count`, `attempts`) happen inside `apply_report`,
//!   never as read-modify-write in worker code.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::report::{DEFAULT_MESSAGE_LIMIT, truncate_chars};
use crate::domain::{JobId, NewTask, Task, TaskId, TaskReport, TaskStatus, WorkerIdentity};
use crate::error::{Result, StrideError};
use crate::observability::TaskCounts;

/// Eligibility predicate of `AcquireTasks`. Every clause must hold.
#[derive(Debug, Clone, PartialEq)]
pub struct EligibilityQuery {
    pub job_id: JobId,

    /// When set, only tasks last touched before this instant qualify.
    pub exclude_end: Option<DateTime<Utc>>,

    /// `attempts < max_attempts`; 0 disables the cap.
    pub max_attempts: u32,

    pub statuses: Vec<TaskStatus>,

    /// Tasks not touched since this instant are stale.
    pub fresh_after: DateTime<Utc>,

    /// Hard ceiling on `error_count`, independent of `max_attempts`.
    pub max_errors: u32,

    pub limit: usize,
}

impl EligibilityQuery {
    pub fn matches(&self, task: &Task) -> bool {
        task.job_id == self.job_id
            && self.statuses.contains(&task.status)
            && (self.max_attempts == 0 || task.attempts < self.max_attempts)
            && task.updated_at >= self.fresh_after
            && task.error_count < self.max_errors
            && self.exclude_end.is_none_or(|end| task.updated_at < end)
    }
}

/// Row selector for listing and retention cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter<'a> {
    All,
    Job(JobId),
    /// Tasks of `job_id` with `id <= max_id`.
    JobUpTo { job_id: JobId, max_id: TaskId },
    App(&'a str),
}

impl TaskFilter<'_> {
    pub fn matches(&self, task: &Task) -> bool {
        match *self {
            TaskFilter::All => true,
            TaskFilter::Job(job_id) => task.job_id == job_id,
            TaskFilter::JobUpTo { job_id, max_id } => task.job_id == job_id && task.id <= max_id,
            TaskFilter::App(app_id) => task.app_id == app_id,
        }
    }
}

/// Column widths enforced on every write.
///
/// An overlong `message` is truncated (never rejected); an overlong `data`
/// blob is a validation error since a cut checkpoint would be corrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLimits {
    pub message: usize,
    pub data: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE_LIMIT,
            data: 65_536,
        }
    }
}

impl FieldLimits {
    pub fn apply(&self, task: &mut Task) -> Result<()> {
        if self.data > 0
            && let Some(data) = &task.data
            && data.chars().count() > self.data
        {
            return Err(StrideError::FieldTooLong {
                field: "data",
                limit: self.data,
            });
        }
        if let Some(message) = &mut task.message {
            let cut = truncate_chars(message, self.message).len();
            message.truncate(cut);
        }
        Ok(())
    }
}

#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Insert a Ready task, assigning the next (ascending) id.
    async fn insert(&self, task: NewTask, now: DateTime<Utc>) -> Result<Task>;

    /// Insert all rows with consecutive ids, or none if any fails validation.
    async fn insert_batch(&self, tasks: Vec<NewTask>, now: DateTime<Utc>) -> Result<Vec<Task>>;

    /// Insert a window task only while the job's latest window end still
    /// equals `expected_last_end`. `Ok(None)` when another producer moved it.
    async fn insert_window_after(
        &self,
        expected_last_end: Option<DateTime<Utc>>,
        task: NewTask,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>>;

    async fn get(&self, id: TaskId) -> Result<Option<Task>>;

    /// Matching tasks in ascending id order, at most `query.limit`.
    async fn find_eligible(&self, query: &EligibilityQuery) -> Result<Vec<Task>>;

    /// Atomically re-check `query` against row `id` and lease it.
    /// `Ok(None)` when another caller got there first or it no longer qualifies.
    async fn try_lease(
        &self,
        id: TaskId,
        query: &EligibilityQuery,
        holder: &WorkerIdentity,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>>;

    /// Overwrite a row after field validation.
    async fn save(&self, task: Task) -> Result<Task>;

    /// Apply a progress or finish report to its task.
    async fn apply_report(&self, report: &TaskReport, now: DateTime<Utc>) -> Result<Task>;

    async fn reset(&self, id: TaskId, now: DateTime<Utc>) -> Result<Task>;

    /// Returns the number of rows removed.
    async fn delete(&self, filter: TaskFilter<'_>) -> Result<usize>;

    async fn list(&self, filter: TaskFilter<'_>) -> Result<Vec<Task>>;

    /// End of the most recently produced window of `job_id`.
    async fn last_window_end(&self, job_id: JobId) -> Result<Option<DateTime<Utc>>>;

    /// Move tasks Leased and untouched since `leased_before` to Errored.
    async fn expire_leases(
        &self,
        leased_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskId>>;

    async fn counts(&self, filter: TaskFilter<'_>) -> Result<TaskCounts>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::task::NewTask;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
    }

    fn query() -> EligibilityQuery {
        EligibilityQuery {
            job_id: JobId::new(1),
            exclude_end: None,
            max_attempts: 5,
            statuses: TaskStatus::LEASABLE.to_vec(),
            fresh_after: now() - Duration::days(7),
            max_errors: 32,
            limit: 10,
        }
    }

    fn task() -> Task {
        Task::from_new(TaskId::new(1), NewTask::ad_hoc(JobId::new(1), "app"), now())
    }

    #[rstest]
    #[case::ready(|_t: &mut Task| {}, true)]
    #[case::errored(|t: &mut Task| t.status = TaskStatus::Errored, true)]
    #[case::leased(|t: &mut Task| t.status = TaskStatus::Leased, false)]
    #[case::completed(|t: &mut Task| t.status = TaskStatus::Completed, false)]
    #[case::other_job(|t: &mut Task| t.job_id = JobId::new(2), false)]
    #[case::attempts_at_cap(|t: &mut Task| t.attempts = 5, false)]
    #[case::attempts_below_cap(|t: &mut Task| t.attempts = 4, true)]
    #[case::error_ceiling(|t: &mut Task| t.error_count = 32, false)]
    #[case::below_error_ceiling(|t: &mut Task| t.error_count = 31, true)]
    #[case::stale(|t: &mut Task| t.updated_at = now() - Duration::days(8), false)]
    fn eligibility_predicate(#[case] mutate: fn(&mut Task), #[case] eligible: bool) {
        let mut t = task();
        mutate(&mut t);
        assert_eq!(query().matches(&t), eligible);
    }

    #[test]
    fn zero_max_attempts_disables_cap() {
        let mut q = query();
        q.max_attempts = 0;
        let mut t = task();
        t.attempts = 1_000;
        assert!(q.matches(&t));

        t.error_count = 32;
        assert!(!q.matches(&t));
    }

    #[test]
    fn exclude_end_filters_recently_touched() {
        let mut q = query();
        q.exclude_end = Some(now());
        assert!(!q.matches(&task()));

        q.exclude_end = Some(now() + Duration::seconds(1));
        assert!(q.matches(&task()));
    }

    #[test]
    fn limits_truncate_message_but_reject_data() {
        let limits = FieldLimits {
            message: 4,
            data: 3,
        };
        let mut t = task();
        t.message = Some("overlong".to_string());
        limits.apply(&mut t).unwrap();
        assert_eq!(t.message.as_deref(), Some("over"));

        t.data = Some("[1,2]".to_string());
        assert!(matches!(
            limits.apply(&mut t),
            Err(StrideError::FieldTooLong { field: "data", .. })
        ));
    }

    #[test]
    fn filter_up_to_is_inclusive() {
        let filter = TaskFilter::JobUpTo {
            job_id: JobId::new(1),
            max_id: TaskId::new(1),
        };
        assert!(filter.matches(&task()));
        assert!(!TaskFilter::App("other").matches(&task()));
    }
}
