//! In-memory task store.
//!
//! One `tokio::sync::Mutex` guards every row, so the eligibility re-check in
//! `try_lease` and the lease transition happen as one step. Rows live in a
//! `BTreeMap` keyed by id, which keeps `find_eligible` in ascending id order
//! without a sort.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{JobId, NewTask, Task, TaskId, TaskReport, TaskStatus, WorkerIdentity};
use crate::error::{Result, StrideError};
use crate::observability::TaskCounts;
use crate::ports::{EligibilityQuery, FieldLimits, TaskFilter, TaskStore};

struct StoreState {
    tasks: BTreeMap<TaskId, Task>,

    /// Next id to assign. Ids are never reused, even after delete.
    next_id: u64,
}

impl StoreState {
    fn new() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn row_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        self.tasks.get_mut(&id).ok_or(StrideError::TaskNotFound(id))
    }

    fn last_window_end(&self, job_id: JobId) -> Option<DateTime<Utc>> {
        self.tasks
            .values()
            .filter(|t| t.job_id == job_id)
            .filter_map(|t| t.window.map(|w| w.end))
            .max()
    }

    /// Build the row the next insert would store, without committing it.
    fn draft(
        &self,
        offset: u64,
        task: NewTask,
        limits: &FieldLimits,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let mut row = Task::from_new(TaskId::new(self.next_id + offset), task, now);
        limits.apply(&mut row)?;
        Ok(row)
    }

    fn commit(&mut self, row: &Task) {
        let id = self.allocate_id();
        self.tasks.insert(id, row.clone());
    }
}

pub struct InMemoryTaskStore {
    state: Mutex<StoreState>,
    limits: FieldLimits,
}

impl Default for InMemoryTaskStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryTaskStore {
    pub fn new() -> Self {
        Self::with_limits(FieldLimits::default())
    }

    pub fn with_limits(limits: FieldLimits) -> Self {
        Self {
            state: Mutex::new(StoreState::new()),
            limits,
        }
    }

    pub fn limits(&self) -> FieldLimits {
        self.limits
    }
}

#[async_trait]
impl TaskStore for InMemoryTaskStore {
    async fn insert(&self, task: NewTask, now: DateTime<Utc>) -> Result<Task> {
        let mut state = self.state.lock().await;
        let row = state.draft(0, task, &self.limits, now)?;
        state.commit(&row);
        Ok(row)
    }

    async fn insert_batch(&self, tasks: Vec<NewTask>, now: DateTime<Utc>) -> Result<Vec<Task>> {
        let mut state = self.state.lock().await;
        let rows = (0u64..)
            .zip(tasks)
            .map(|(offset, task)| state.draft(offset, task, &self.limits, now))
            .collect::<Result<Vec<_>>>()?;
        for row in &rows {
            state.commit(row);
        }
        Ok(rows)
    }

    async fn insert_window_after(
        &self,
        expected_last_end: Option<DateTime<Utc>>,
        task: NewTask,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>> {
        let mut state = self.state.lock().await;
        if state.last_window_end(task.job_id) != expected_last_end {
            return Ok(None);
        }
        let row = state.draft(0, task, &self.limits, now)?;
        state.commit(&row);
        Ok(Some(row))
    }

    async fn get(&self, id: TaskId) -> Result<Option<Task>> {
        let state = self.state.lock().await;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_eligible(&self, query: &EligibilityQuery) -> Result<Vec<Task>> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|t| query.matches(t))
            .take(query.limit)
            .cloned()
            .collect())
    }

    async fn try_lease(
        &self,
        id: TaskId,
        query: &EligibilityQuery,
        holder: &WorkerIdentity,
        now: DateTime<Utc>,
    ) -> Result<Option<Task>> {
        let mut state = self.state.lock().await;
        let Some(row) = state.tasks.get_mut(&id) else {
            return Ok(None);
        };
        if !query.matches(row) {
            return Ok(None);
        }
        row.lease(holder, now)?;
        Ok(Some(row.clone()))
    }

    async fn save(&self, mut task: Task) -> Result<Task> {
        self.limits.apply(&mut task)?;
        let mut state = self.state.lock().await;
        let row = state.row_mut(task.id)?;
        *row = task.clone();
        Ok(task)
    }

    async fn apply_report(&self, report: &TaskReport, now: DateTime<Utc>) -> Result<Task> {
        let mut state = self.state.lock().await;
        let row = state.row_mut(report.task_id())?;

        // Apply to a copy so a rejected report leaves the row untouched.
        let mut next = row.clone();
        match report {
            TaskReport::Progress(p) => next.record_progress(p, now)?,
            TaskReport::Finish(f) => next.finish(f, now)?,
        }
        self.limits.apply(&mut next)?;
        *row = next.clone();
        Ok(next)
    }

    async fn reset(&self, id: TaskId, now: DateTime<Utc>) -> Result<Task> {
        let mut state = self.state.lock().await;
        let row = state.row_mut(id)?;
        row.reset(now);
        Ok(row.clone())
    }

    async fn delete(&self, filter: TaskFilter<'_>) -> Result<usize> {
        let mut state = self.state.lock().await;
        let before = state.tasks.len();
        state.tasks.retain(|_, t| !filter.matches(t));
        Ok(before - state.tasks.len())
    }

    async fn list(&self, filter: TaskFilter<'_>) -> Result<Vec<Task>> {
        let state = self.state.lock().await;
        Ok(state
            .tasks
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn last_window_end(&self, job_id: JobId) -> Result<Option<DateTime<Utc>>> {
        let state = self.state.lock().await;
        Ok(state.last_window_end(job_id))
    }

    async fn expire_leases(
        &self,
        leased_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<TaskId>> {
        let mut state = self.state.lock().await;
        let mut expired = Vec::new();
        for row in state.tasks.values_mut() {
            if row.status == TaskStatus::Leased && row.updated_at < leased_before {
                row.expire_lease(now)?;
                expired.push(row.id);
            }
        }
        Ok(expired)
    }

    async fn counts(&self, filter: TaskFilter<'_>) -> Result<TaskCounts> {
        let state = self.state.lock().await;
        let mut counts = TaskCounts::default();
        for row in state.tasks.values().filter(|t| filter.matches(t)) {
            counts.add(row.status);
        }
        Ok(counts)
    }
}
