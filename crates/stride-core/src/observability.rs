use serde::{Deserialize, Serialize};

use crate::domain::TaskStatus;

/// Task rows per status, for operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub ready: usize,
    pub leased: usize,
    pub completed: usize,
    pub errored: usize,
}

impl TaskCounts {
    pub fn add(&mut self, status: TaskStatus) {
        match status {
            TaskStatus::Ready => self.ready += 1,
            TaskStatus::Leased => self.leased += 1,
            TaskStatus::Completed => self.completed += 1,
            TaskStatus::Errored => self.errored += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.ready + self.leased + self.completed + self.errored
    }
}
