//! Task state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of one task instance.
///
/// State transitions:
/// - Ready -> Leased (acquire)
/// - Leased -> Completed (finish without error)
/// - Leased -> Errored (finish with error, or lease expiry when a TTL is configured)
/// - Errored -> Leased (a later acquire, while still under the retry caps)
/// - any -> Ready (manual reset)
///
/// Completed has no way out except reset or retention cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Eligible for leasing.
    Ready,

    /// Held by a worker (fetching or processing).
    Leased,

    /// Window processed. A new window is a new task.
    Completed,

    /// Last attempt failed; re-enters the pool on the next acquire.
    Errored,
}

impl TaskStatus {
    /// Statuses `AcquireTasks` considers when the caller gives none.
    pub const LEASABLE: [TaskStatus; 2] = [TaskStatus::Ready, TaskStatus::Errored];

    /// Transition table. `Ready` is reachable from anywhere via reset.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Ready, Leased)
                | (Errored, Leased)
                | (Leased, Completed)
                | (Leased, Errored)
                | (_, Ready)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Ready => write!(f, "ready"),
            TaskStatus::Leased => write!(f, "leased"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Errored => write!(f, "errored"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use TaskStatus::*;

    #[rstest]
    #[case(Ready, Leased, true)]
    #[case(Errored, Leased, true)]
    #[case(Leased, Completed, true)]
    #[case(Leased, Errored, true)]
    #[case(Completed, Ready, true)]
    #[case(Errored, Ready, true)]
    #[case(Completed, Leased, false)]
    #[case(Ready, Completed, false)]
    #[case(Leased, Leased, false)]
    #[case(Completed, Errored, false)]
    fn transition_table(#[case] from: TaskStatus, #[case] to: TaskStatus, #[case] allowed: bool) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Errored).unwrap(), "\"errored\"");
    }
}
