//! Reporting protocol: what a worker sends back about a leased task.
//!
//! - `Progress`: zero or more per lease. Observability/liveness only; never
//!   changes status or the error/attempt counters.
//! - `Finish`: exactly one per lease. Terminal; bumps the attempt counter and
//!   moves the task to Completed or Errored.

use serde::{Deserialize, Serialize};

use super::identity::WorkerIdentity;
use super::ids::TaskId;

/// Default store limit for the `message` column, in characters.
pub const DEFAULT_MESSAGE_LIMIT: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressReport {
    pub task_id: TaskId,
    pub speed: u64,
    pub total: u64,
    pub success: u64,
    pub worker: WorkerIdentity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FinishOutcome {
    Completed {
        /// Elapsed processing time in whole seconds.
        cost_secs: u64,
        #[serde(default)]
        message: Option<String>,
    },
    Errored {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishReport {
    pub task_id: TaskId,
    pub speed: u64,
    pub total: u64,
    pub success: u64,
    pub worker: WorkerIdentity,
    pub outcome: FinishOutcome,
    /// Last processed item key, for resumable cursors.
    #[serde(default)]
    pub key: Option<String>,
}

impl FinishReport {
    pub fn is_error(&self) -> bool {
        matches!(self.outcome, FinishOutcome::Errored { .. })
    }
}

/// One message on the report channel, tagged by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskReport {
    Progress(ProgressReport),
    Finish(FinishReport),
}

impl TaskReport {
    pub fn task_id(&self) -> TaskId {
        match self {
            TaskReport::Progress(p) => p.task_id,
            TaskReport::Finish(f) => f.task_id,
        }
    }
}

/// Cut `s` to at most `limit` characters, on a char boundary.
///
/// `limit == 0` means unlimited.
pub fn truncate_chars(s: &str, limit: usize) -> &str {
    if limit == 0 {
        return s;
    }
    match s.char_indices().nth(limit) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Strip a leading `SomeException:` / `SomeError:` style type prefix.
///
/// Only a single whitespace-free token ending in the marker counts as a
/// prefix, so ordinary sentences containing "error:" are left alone.
pub fn strip_error_prefix(message: &str) -> &str {
    let trimmed = message.trim();
    for marker in ["Exception:", "Error:"] {
        if let Some(pos) = trimmed.find(marker) {
            let head = &trimmed[..pos];
            if !head.contains(char::is_whitespace) {
                let rest = trimmed[pos + marker.len()..].trim();
                if !rest.is_empty() {
                    return rest;
                }
            }
        }
    }
    trimmed
}

/// Shape a failure message for storage: strip the type prefix, then truncate.
pub fn error_message_for_store(raw: &str, limit: usize) -> String {
    truncate_chars(strip_error_prefix(raw), limit).to_string()
}
