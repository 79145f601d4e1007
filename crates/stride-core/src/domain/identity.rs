use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine name + process id of the worker holding or reporting a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity {
    pub server: String,
    pub process_id: u32,
}

impl WorkerIdentity {
    pub fn new(server: impl Into<String>, process_id: u32) -> Self {
        Self {
            server: server.into(),
            process_id,
        }
    }

    /// Identity of the current process.
    pub fn current() -> Self {
        let server = ["HOSTNAME", "COMPUTERNAME"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .unwrap_or_else(|| "localhost".to_string());
        Self::new(server, std::process::id())
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.server, self.process_id)
    }
}
