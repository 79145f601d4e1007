//! Error types.
//!
//! - [`StrideError`]: coordination / storage failures (task missing, bad transition, ...).
//! - [`JobError`]: failures raised by job logic. These never crash a worker; they
//!   become the task's Errored finish report.

use std::fmt;

use thiserror::Error;

use crate::domain::{TaskId, TaskStatus};

#[derive(Debug, Error)]
pub enum StrideError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("invalid transition for {task}: {from} -> {to}")]
    InvalidTransition {
        task: TaskId,
        from: TaskStatus,
        to: TaskStatus,
    },

    #[error("field `{field}` exceeds {limit} characters")]
    FieldTooLong { field: &'static str, limit: usize },

    #[error("job `{job}` is misconfigured: {reason}")]
    Misconfigured { job: String, reason: String },

    #[error("job `{0}` is already registered")]
    DuplicateJob(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StrideError>;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure raised by a job's fetch/execute path or by a single batch item.
#[derive(Debug)]
pub struct JobError {
    message: String,
    source: Option<BoxError>,
}

impl JobError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an underlying error, keeping it as the source.
    pub fn wrap(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message of the deepest error in the `source()` chain.
    pub fn innermost_message(&self) -> String {
        let mut current: &(dyn std::error::Error + 'static) = self;
        while let Some(next) = current.source() {
            current = next;
        }
        current.to_string()
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for JobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<serde_json::Error> for JobError {
    fn from(e: serde_json::Error) -> Self {
        JobError::wrap("json decode", e)
    }
}

impl From<StrideError> for JobError {
    fn from(e: StrideError) -> Self {
        JobError::wrap("coordinator", e)
    }
}
