//! Job registry: jobs keyed by name.
//!
//! Built during startup and read-only afterwards, so it needs no lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::job::Job;
use crate::error::{Result, StrideError};

#[derive(Default)]
pub struct JobRegistry {
    jobs: BTreeMap<String, Arc<dyn Job>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            jobs: BTreeMap::new(),
        }
    }

    /// Register `job` under its definition name. Names are unique.
    pub fn register<J: Job>(&mut self, job: J) -> Result<()> {
        let name = job.name();
        if self.jobs.contains_key(&name) {
            return Err(StrideError::DuplicateJob(name));
        }
        self.jobs.insert(name, Arc::new(job));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Job>> {
        self.jobs.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.jobs.keys().cloned().collect()
    }

    pub fn jobs(&self) -> impl Iterator<Item = &Arc<dyn Job>> {
        self.jobs.values()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
