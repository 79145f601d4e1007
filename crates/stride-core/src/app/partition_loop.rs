//! PartitionLoop - periodically cuts new windows for windowed jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::impls::LocalCoordinator;
use crate::ports::{Clock, TaskStore};

pub struct PartitionLoop<S: ?Sized, C> {
    coordinator: Arc<LocalCoordinator<S, C>>,
    interval: Duration,
}

impl<S, C> PartitionLoop<S, C>
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
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            match self.coordinator.schedule_windows().await {
                Ok(created) if !created.is_empty() => {
                    tracing::debug!(count = created.len(), "Partition tick produced tasks");
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(error = %err, "Partition tick failed"),
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
    use crate::domain::JobDefinition;
    use crate::impls::InMemoryTaskStore;
    use crate::ports::{Coordinator, FixedClock};

    #[tokio::test(start_paused = true)]
    async fn ticks_until_shutdown() {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = FixedClock::new(t0 + chrono::Duration::minutes(3));
        let coordinator = Arc::new(LocalCoordinator::new(
            CoordinatorConfig::default(),
            Arc::new(InMemoryTaskStore::new()),
            clock,
        ));
        coordinator
            .add_jobs(vec![JobDefinition::windowed("etl", t0, 60)])
            .await
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = PartitionLoop::new(Arc::clone(&coordinator), Duration::from_secs(1)).spawn(rx);

        tokio::time::sleep(Duration::from_millis(1500)).await;
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(coordinator.counts("etl").await.unwrap().ready, 3);
    }
}
