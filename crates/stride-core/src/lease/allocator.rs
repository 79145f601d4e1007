//! Lease allocator: picks leasable tasks for a job and marks them Leased.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::policy::EligibilityPolicy;
use crate::domain::{JobId, Task, TaskId, TaskStatus, WorkerIdentity};
use crate::error::Result;
use crate::ports::{Clock, EligibilityQuery, TaskFilter, TaskStore};

/// Arguments of `AcquireTasks`.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireRequest {
    pub job_id: JobId,
    pub exclude_end: Option<DateTime<Utc>>,
    /// 0 disables the attempt cap.
    pub max_attempts: u32,
    /// Empty means the policy's default statuses.
    pub statuses: Vec<TaskStatus>,
    pub count: usize,
}

impl AcquireRequest {
    pub fn new(job_id: JobId, count: usize) -> Self {
        Self {
            job_id,
            exclude_end: None,
            max_attempts: 0,
            statuses: Vec::new(),
            count,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_exclude_end(mut self, exclude_end: Option<DateTime<Utc>>) -> Self {
        self.exclude_end = exclude_end;
        self
    }

    pub fn with_statuses(mut self, statuses: &[TaskStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }
}

/// Implements `AcquireTasks` plus the bulk maintenance operations.
///
/// Candidates come back oldest-id first; each one is then leased through
/// `TaskStore::try_lease`, which re-checks eligibility atomically. A candidate
/// taken by a concurrent caller in between is simply skipped, so a call may
/// return fewer than `count` tasks.
pub struct LeaseAllocator<S: ?Sized, C> {
    store: Arc<S>,
    clock: C,
    policy: EligibilityPolicy,
}

impl<S: TaskStore + ?Sized, C: Clock> LeaseAllocator<S, C> {
    pub fn new(store: Arc<S>, clock: C, policy: EligibilityPolicy) -> Self {
        Self {
            store,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> &EligibilityPolicy {
        &self.policy
    }

    /// Build the store-level predicate for `request` at `now`.
    pub fn query(&self, request: &AcquireRequest, now: DateTime<Utc>) -> EligibilityQuery {
        let statuses = if request.statuses.is_empty() {
            self.policy.default_statuses.clone()
        } else {
            request.statuses.clone()
        };
        EligibilityQuery {
            job_id: request.job_id,
            exclude_end: request.exclude_end,
            max_attempts: request.max_attempts,
            statuses,
            fresh_after: now - self.policy.staleness_window,
            max_errors: self.policy.max_errors,
            limit: request.count,
        }
    }

    pub async fn acquire_tasks(
        &self,
        request: &AcquireRequest,
        holder: &WorkerIdentity,
    ) -> Result<Vec<Task>> {
        if request.count == 0 {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let query = self.query(request, now);
        let candidates = self.store.find_eligible(&query).await?;

        let mut leased = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match self.store.try_lease(candidate.id, &query, holder, now).await? {
                Some(task) => {
                    tracing::debug!(
                        task_id = %task.id,
                        job_id = %task.job_id,
                        holder = %holder,
                        "Task leased"
                    );
                    leased.push(task);
                }
                None => {
                    tracing::debug!(task_id = %candidate.id, "Lease lost to a concurrent acquire");
                }
            }
        }
        Ok(leased)
    }

    /// Manual requeue: counters zeroed, status Ready.
    pub async fn reset(&self, id: TaskId) -> Result<Task> {
        let task = self.store.reset(id, self.clock.now()).await?;
        tracing::info!(task_id = %id, "Task reset");
        Ok(task)
    }

    /// Retention cleanup of `job_id` tasks with id <= `max_id`.
    pub async fn delete_up_to(&self, job_id: JobId, max_id: TaskId) -> Result<usize> {
        if max_id.get() == 0 {
            return Ok(0);
        }
        self.store
            .delete(TaskFilter::JobUpTo { job_id, max_id })
            .await
    }

    pub async fn delete_all(&self, app_id: &str) -> Result<usize> {
        self.store.delete(TaskFilter::App(app_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewTask;
    use crate::impls::InMemoryTaskStore;
    use crate::ports::FixedClock;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn holder() -> WorkerIdentity {
        WorkerIdentity::new("node-a", 1)
    }

    async fn seeded(n: usize) -> (Arc<InMemoryTaskStore>, FixedClock, Vec<Task>) {
        let store = Arc::new(InMemoryTaskStore::new());
        let clock = FixedClock::new(start());
        let mut tasks = Vec::new();
        for _ in 0..n {
            tasks.push(
                store
                    .insert(NewTask::ad_hoc(JobId::new(1), "app"), start())
                    .await
                    .unwrap(),
            );
        }
        (store, clock, tasks)
    }

    fn allocator(
        store: Arc<InMemoryTaskStore>,
        clock: FixedClock,
    ) -> LeaseAllocator<InMemoryTaskStore, FixedClock> {
        LeaseAllocator::new(store, clock, EligibilityPolicy::default())
    }

    #[tokio::test]
    async fn acquires_oldest_ids_first() {
        let (store, clock, _) = seeded(8).await;
        // leave ids 1, 2, 5 and 8 eligible
        for id in [3, 4, 6, 7] {
            let mut t = store.get(TaskId::new(id)).await.unwrap().unwrap();
            t.status = TaskStatus::Completed;
            store.save(t).await.unwrap();
        }

        let alloc = allocator(store, clock);
        let got = alloc
            .acquire_tasks(&AcquireRequest::new(JobId::new(1), 2), &holder())
            .await
            .unwrap();

        let ids: Vec<u64> = got.iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(got.iter().all(|t| t.status == TaskStatus::Leased));
        assert!(got.iter().all(|t| t.server.as_deref() == Some("node-a")));
    }

    #[tokio::test]
    async fn leased_tasks_are_not_offered_twice() {
        let (store, clock, _) = seeded(1).await;
        let alloc = allocator(store, clock);
        let req = AcquireRequest::new(JobId::new(1), 5);

        assert_eq!(alloc.acquire_tasks(&req, &holder()).await.unwrap().len(), 1);
        assert!(alloc.acquire_tasks(&req, &holder()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn error_ceiling_excludes_regardless_of_attempt_cap() {
        let (store, clock, tasks) = seeded(1).await;
        let mut t = tasks[0].clone();
        t.status = TaskStatus::Errored;
        t.error_count = 32;
        store.save(t).await.unwrap();

        let alloc = allocator(store, clock);
        let req = AcquireRequest::new(JobId::new(1), 1).with_max_attempts(0);
        assert!(alloc.acquire_tasks(&req, &holder()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn stale_tasks_are_excluded() {
        let (store, clock, _) = seeded(1).await;
        clock.advance(Duration::days(7) + Duration::seconds(1));

        let alloc = allocator(store, clock);
        let got = alloc
            .acquire_tasks(&AcquireRequest::new(JobId::new(1), 1), &holder())
            .await
            .unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn configurable_ceilings_are_honored() {
        let (store, clock, tasks) = seeded(1).await;
        let mut t = tasks[0].clone();
        t.status = TaskStatus::Errored;
        t.error_count = 3;
        store.save(t).await.unwrap();

        let strict = LeaseAllocator::new(
            store.clone(),
            clock.clone(),
            EligibilityPolicy::default().with_max_errors(3),
        );
        let req = AcquireRequest::new(JobId::new(1), 1);
        assert!(strict.acquire_tasks(&req, &holder()).await.unwrap().is_empty());

        let lenient = allocator(store, clock);
        assert_eq!(lenient.acquire_tasks(&req, &holder()).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_acquires_lease_single_task_once() {
        for _ in 0..20 {
            let (store, clock, _) = seeded(1).await;
            let alloc = Arc::new(allocator(store, clock));

            let mut handles = Vec::new();
            for n in 0..2u32 {
                let alloc = Arc::clone(&alloc);
                handles.push(tokio::spawn(async move {
                    alloc
                        .acquire_tasks(
                            &AcquireRequest::new(JobId::new(1), 1),
                            &WorkerIdentity::new("node", n),
                        )
                        .await
                        .unwrap()
                        .len()
                }));
            }

            let mut total = 0;
            for h in handles {
                total += h.await.unwrap();
            }
            assert_eq!(total, 1);
        }
    }

    #[tokio::test]
    async fn delete_up_to_respects_bounds() {
        let (store, clock, _) = seeded(5).await;
        let alloc = allocator(store.clone(), clock);

        assert_eq!(alloc.delete_up_to(JobId::new(1), TaskId::new(0)).await.unwrap(), 0);
        assert_eq!(alloc.delete_up_to(JobId::new(1), TaskId::new(3)).await.unwrap(), 3);
        assert_eq!(store.list(TaskFilter::All).await.unwrap().len(), 2);
        assert_eq!(alloc.delete_all("app").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn reset_requeues_exhausted_task() {
        let (store, clock, tasks) = seeded(1).await;
        let mut t = tasks[0].clone();
        t.status = TaskStatus::Errored;
        t.error_count = 32;
        t.attempts = 40;
        store.save(t).await.unwrap();

        let alloc = allocator(store, clock);
        let reset = alloc.reset(TaskId::new(1)).await.unwrap();
        assert_eq!(reset.status, TaskStatus::Ready);

        let got = alloc
            .acquire_tasks(&AcquireRequest::new(JobId::new(1), 1), &holder())
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
    }
}
