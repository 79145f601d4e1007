//! Eligibility policy: the global knobs of the acquire predicate.

use chrono::Duration;

use crate::domain::TaskStatus;

/// Retry gating shared by every job.
///
/// Per-job `max_attempts` lives on the job definition; these two ceilings
/// apply regardless of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EligibilityPolicy {
    /// Tasks untouched for longer than this are never re-leased.
    pub staleness_window: Duration,

    /// Circuit breaker: tasks with this many errors stop being offered.
    pub max_errors: u32,

    /// Statuses used when an acquire request names none.
    pub default_statuses: Vec<TaskStatus>,
}

impl Default for EligibilityPolicy {
    fn default() -> Self {
        Self {
            staleness_window: Duration::days(7),
            max_errors: 32,
            default_statuses: TaskStatus::LEASABLE.to_vec(),
        }
    }
}

impl EligibilityPolicy {
    pub fn with_staleness_window(mut self, window: Duration) -> Self {
        self.staleness_window = window;
        self
    }

    pub fn with_max_errors(mut self, max_errors: u32) -> Self {
        self.max_errors = max_errors;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let policy = EligibilityPolicy::default();
        assert_eq!(policy.staleness_window, Duration::days(7));
        assert_eq!(policy.max_errors, 32);
        assert_eq!(policy.default_statuses, vec![TaskStatus::Ready, TaskStatus::Errored]);
    }
}
