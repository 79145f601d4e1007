//! ReaperLoop - returns expired leases to the pool.
//!
//! Only does work when the coordinator has a lease TTL configured.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::impls::LocalCoordinator;
use crate::ports::{Clock, TaskStore};

pub struct ReaperLoop<S: ?Sized, C> {
    coordinator: Arc<LocalCoordinator<S, C>>,
    interval: Duration,
}

impl<S, C> ReaperLoop<S, C>
where
    S: TaskStore + ?Sized + 'static,
    C: Clock + Clone + 'static,
{
    pub fn new(coordinator: Arc<LocalCoordinator<S, C>>, interval: Duration) -> Self {
        Self {
            coordinator,
            interval,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        if self.coordinator.config().lease_ttl.is_none() {
            tracing::debug!("No lease TTL configured, reaper idle");
            return;
        }
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            if let Err(err) = self.coordinator.reap_expired_leases().await {
                tracing::warn!(error = %err, "Lease reaping failed");
            }
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    use crate::config::CoordinatorConfig;
    use crate::domain::{JobDefinition, TaskStatus, WorkerIdentity};
    use crate::impls::InMemoryTaskStore;
    use crate::ports::{AcquireParams, Coordinator, FixedClock};

    #[tokio::test(start_paused = true)]
    async fn expires_stuck_leases() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(t0);
        let coordinator = Arc::new(LocalCoordinator::new(
            CoordinatorConfig::default().with_lease_ttl(chrono::Duration::minutes(1)),
            Arc::new(InMemoryTaskStore::new()),
            clock.clone(),
        ));
        coordinator
            .add_jobs(vec![JobDefinition::windowed("adhoc", t0, 0)])
            .await
            .unwrap();
        coordinator.trigger("adhoc").await.unwrap();
        coordinator
            .acquire("adhoc", 1, &AcquireParams::default(), &WorkerIdentity::new("gone", 1))
            .await
            .unwrap();
        clock.advance(chrono::Duration::minutes(2));

        let (tx, rx) = watch::channel(false);
        let handle = ReaperLoop::new(Arc::clone(&coordinator), Duration::from_secs(1)).spawn(rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        let tasks = coordinator.tasks("adhoc").await.unwrap();
        assert_eq!(tasks[0].status, TaskStatus::Errored);
    }
}
