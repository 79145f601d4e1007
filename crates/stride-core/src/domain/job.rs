//! Job definition: the recurring work description owned by configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::JobId;
use super::window::WindowParams;

/// Upper bound on `step_secs` and `offset_secs` (about a century).
pub const MAX_SPAN_SECS: i64 = 100 * 365 * 86_400;

/// How a job's tasks are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Tasks are consecutive time windows cut by the partitioner.
    TimeWindow,

    /// One task per produced message batch; the partitioner is bypassed.
    Message,
}

/// A recurring work definition.
///
/// Created and updated through registration only; workers never mutate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDefinition {
    /// Assigned by the coordinator on first registration.
    #[serde(default)]
    pub id: Option<JobId>,
    #[serde(default)]
    pub app_id: String,
    pub name: String,
    pub mode: JobMode,

    /// Minimum start used when the job has produced no task yet.
    pub start: DateTime<Utc>,

    /// Hard end bound; no window starts at or after it.
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,

    /// Seconds windows must stay behind real time.
    #[serde(default)]
    pub offset_secs: i64,

    /// Maximum window width in seconds. 0 disables windowing.
    #[serde(default)]
    pub step_secs: i64,

    /// Items per fetch (message jobs: messages per task).
    #[serde(default)]
    pub batch_size: usize,

    /// Attempt cap fed to the eligibility query. 0 disables it.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Message topic. Required for message-mode jobs.
    #[serde(default)]
    pub topic: Option<String>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_max_attempts() -> u32 {
    10
}

fn default_enabled() -> bool {
    true
}

impl JobDefinition {
    /// Time-windowed job starting at `start`, cutting windows of `step_secs`.
    pub fn windowed(name: impl Into<String>, start: DateTime<Utc>, step_secs: i64) -> Self {
        Self {
            id: None,
            app_id: String::new(),
            name: name.into(),
            mode: JobMode::TimeWindow,
            start,
            end: None,
            offset_secs: 0,
            step_secs,
            batch_size: 0,
            max_attempts: default_max_attempts(),
            topic: None,
            enabled: true,
            description: None,
        }
    }

    /// Message-driven job subscribed to `topic`.
    pub fn message(name: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            mode: JobMode::Message,
            topic: Some(topic.into()),
            ..Self::windowed(name, DateTime::<Utc>::UNIX_EPOCH, 0)
        }
    }

    pub fn with_offset(mut self, offset_secs: i64) -> Self {
        self.offset_secs = offset_secs;
        self
    }

    pub fn with_end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn window_params(&self) -> WindowParams {
        WindowParams {
            start: self.start,
            end: self.end,
            offset_secs: self.offset_secs,
            step_secs: self.step_secs,
        }
    }

    /// Startup check. A message job without a topic can never receive work.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("job name is empty".to_string());
        }
        if self.mode == JobMode::Message && self.topic.as_deref().is_none_or(str::is_empty) {
            return Err("message job requires a topic".to_string());
        }
        if self.step_secs < 0 || self.offset_secs < 0 {
            return Err("step and offset must not be negative".to_string());
        }
        if self.step_secs > MAX_SPAN_SECS || self.offset_secs > MAX_SPAN_SECS {
            return Err(format!("step and offset must not exceed {MAX_SPAN_SECS} seconds"));
        }
        Ok(())
    }

    /// Copy schedule parameters from a newer registration, keeping identity
    /// and the operator-controlled `enabled` flag.
    pub fn update_from(&mut self, newer: &JobDefinition) {
        self.mode = newer.mode;
        self.start = newer.start;
        self.end = newer.end;
        self.offset_secs = newer.offset_secs;
        self.step_secs = newer.step_secs;
        self.batch_size = newer.batch_size;
        self.max_attempts = newer.max_attempts;
        self.topic = newer.topic.clone();
        if newer.description.is_some() {
            self.description = newer.description.clone();
        }
    }
}
