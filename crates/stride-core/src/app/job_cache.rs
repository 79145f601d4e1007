//! Per-loop cache of one job definition.
//!
//! Each poll loop owns its cache, so there is no shared job list to lock.
//! The definition is re-fetched from the coordinator once it is older than
//! the refresh interval.

use std::time::Duration;

use tokio::time::Instant;

use crate::domain::JobDefinition;
use crate::error::Result;
use crate::ports::Coordinator;

pub struct JobCache {
    name: String,
    ttl: Duration,
    entry: Option<(JobDefinition, Instant)>,
}

impl JobCache {
    pub fn new(name: impl Into<String>, ttl: Duration) -> Self {
        Self {
            name: name.into(),
            ttl,
            entry: None,
        }
    }

    pub fn is_fresh(&self) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|(_, fetched)| fetched.elapsed() < self.ttl)
    }

    /// Current definition, refreshed when stale.
    ///
    /// `Ok(None)` when the coordinator does not know the job. A failed
    /// refresh falls back to the stale copy if there is one.
    pub async fn get(&mut self, coordinator: &dyn Coordinator) -> Result<Option<JobDefinition>> {
        if self.is_fresh() {
            return Ok(self.entry.as_ref().map(|(def, _)| def.clone()));
        }

        match coordinator.get_jobs(std::slice::from_ref(&self.name)).await {
            Ok(jobs) => {
                let def = jobs.into_iter().find(|j| j.name == self.name);
                self.entry = def.clone().map(|d| (d, Instant::now()));
                Ok(def)
            }
            Err(err) => match &self.entry {
                Some((stale, _)) => {
                    tracing::warn!(
                        job = %self.name,
                        error = %err,
                        "Job refresh failed, using cached definition"
                    );
                    Ok(Some(stale.clone()))
                }
                None => Err(err),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::Ordering;

    use crate::app::testing::RecordingCoordinator;

    #[tokio::test(start_paused = true)]
    async fn refreshes_only_after_interval() {
        let coordinator = RecordingCoordinator::windowed("etl");
        let mut cache = JobCache::new("etl", Duration::from_secs(5));

        for _ in 0..3 {
            assert!(cache.get(&coordinator).await.unwrap().is_some());
        }
        assert_eq!(coordinator.get_jobs_calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(6)).await;
        cache.get(&coordinator).await.unwrap();
        assert_eq!(coordinator.get_jobs_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_serves_stale_copy() {
        let coordinator = RecordingCoordinator::windowed("etl");
        let mut cache = JobCache::new("etl", Duration::from_secs(5));
        cache.get(&coordinator).await.unwrap();

        coordinator.fail_get_jobs.store(true, Ordering::SeqCst);
        tokio::time::advance(Duration::from_secs(6)).await;
        let def = cache.get(&coordinator).await.unwrap();
        assert_eq!(def.map(|d| d.name), Some("etl".to_string()));

        let mut cold = JobCache::new("etl", Duration::from_secs(5));
        assert!(cold.get(&coordinator).await.is_err());
    }

    #[tokio::test]
    async fn unknown_job_is_none() {
        let coordinator = RecordingCoordinator::windowed("etl");
        let mut cache = JobCache::new("other", Duration::from_secs(5));
        assert!(cache.get(&coordinator).await.unwrap().is_none());
        assert!(!cache.is_fresh());
    }
}
