use super::super::dedup::DedupCache;
use super::super::store::SubscriptionStore;
use crate::domain::keys;
use crate::library::storage::{DistributedMutex, KeyValueStore};
use crate::library::{BoxedError, EmptyResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jatsl::{Job, JobManager};
use std::time::Duration;
use tokio::select;
use tokio::time::interval;
use tracing::{debug, info, warn};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Counts of the records removed by a single maintenance cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Push attempts which left the deduplication window
    pub evicted_attempts: usize,
    /// Subscriptions past their termination time
    pub expired_subscriptions: usize,
}

/// Periodically purges stale state from the shared substrate
///
/// Only one instance runs a cycle at a time. Instances which fail to acquire the
/// maintenance lock skip the cycle.
pub struct MaintenanceJob<S, M> {
    store: SubscriptionStore<S>,
    dedup: DedupCache<S>,
    mutex: M,
    interval: Duration,
}

impl<S, M> MaintenanceJob<S, M>
where
    S: KeyValueStore,
    M: DistributedMutex,
{
    /// Creates a new instance running a cycle every `interval`, at most once per second
    pub fn new(store: SubscriptionStore<S>, dedup: DedupCache<S>, mutex: M, interval: Duration) -> Self {
        Self {
            store,
            dedup,
            mutex,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    /// Runs a single cycle, returns `None` if another instance holds the lock
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<Option<MaintenanceReport>, BoxedError> {
        // Lock expires by the next tick at the latest
        if !self
            .mutex
            .try_acquire(keys::lock::MAINTENANCE, self.interval)
            .await?
        {
            debug!("Maintenance is running elsewhere");
            return Ok(None);
        }

        let result = self.purge(now).await;

        if let Err(error) = self.mutex.release(keys::lock::MAINTENANCE).await {
            warn!(?error, "Unable to release maintenance lock");
        }

        result.map(Some)
    }

    async fn purge(&self, now: DateTime<Utc>) -> Result<MaintenanceReport, BoxedError> {
        let evicted_attempts = self.dedup.evict_expired(now).await?;
        let mut expired_subscriptions = 0;

        for subscription in self.store.list_all().await? {
            if subscription.is_expired(now) && self.store.remove(&subscription.id).await?.is_some() {
                debug!(id = subscription.id.as_str(), "Removed expired subscription");
                expired_subscriptions += 1;
            }
        }

        Ok(MaintenanceReport {
            evicted_attempts,
            expired_subscriptions,
        })
    }
}

#[async_trait]
impl<S, M> Job for MaintenanceJob<S, M>
where
    S: KeyValueStore + Clone + 'static,
    M: DistributedMutex + 'static,
{
    const NAME: &'static str = module_path!();
    const SUPPORTS_GRACEFUL_TERMINATION: bool = true;

    async fn execute(&self, manager: JobManager) -> EmptyResult {
        manager.ready().await;

        let mut interval = interval(self.interval);

        loop {
            select! {
                _ = interval.tick() => {},
                _ = manager.termination_signal() => return Ok(()),
            }

            match self.run_cycle(Utc::now()).await {
                Ok(Some(report)) => info!(
                    evicted = report.evicted_attempts,
                    expired = report.expired_subscriptions,
                    "Completed maintenance cycle"
                ),
                Ok(None) => {}
                Err(error) => warn!(?error, "Maintenance cycle failed"),
            }
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::Subscription;
    use crate::library::storage::{MemoryKeyValueStore, MemoryMutex};
    use chrono::Duration as ChronoDuration;
    use pretty_assertions::assert_eq;

    fn job() -> (
        SubscriptionStore<MemoryKeyValueStore>,
        DedupCache<MemoryKeyValueStore>,
        MemoryMutex,
        MaintenanceJob<MemoryKeyValueStore, MemoryMutex>,
    ) {
        let kv = MemoryKeyValueStore::new();
        let store = SubscriptionStore::new(kv.clone());
        let dedup = DedupCache::new(kv, Duration::from_secs(60));
        let mutex = MemoryMutex::new();
        let job = MaintenanceJob::new(store.clone(), dedup.clone(), mutex.clone(), Duration::from_secs(30));

        (store, dedup, mutex, job)
    }

    fn terminating_at(name: &str, termination: DateTime<Utc>) -> Subscription {
        Subscription {
            name: Some(name.into()),
            push_address: "http://client".into(),
            line_refs: vec!["L1".to_owned()].into_iter().collect(),
            initial_termination_time: Some(termination),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn purge_expired_state() {
        let (store, dedup, _, job) = job();
        let now = Utc::now();
        store
            .add(terminating_at("short", now + ChronoDuration::minutes(1)))
            .await
            .unwrap();
        store
            .add(terminating_at("long", now + ChronoDuration::hours(1)))
            .await
            .unwrap();
        dedup.check_and_record("s1", "fp", now).await.unwrap();

        let later = now + ChronoDuration::minutes(2);
        let report = job.run_cycle(later).await.unwrap();

        assert_eq!(
            report,
            Some(MaintenanceReport {
                evicted_attempts: 1,
                expired_subscriptions: 1,
            })
        );
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(store.get_by_name("long").await.unwrap().is_some());
    }

    #[test]
    fn clamp_zero_interval() {
        let (store, dedup, mutex, _) = job();

        let job = MaintenanceJob::new(store, dedup, mutex, Duration::ZERO);

        assert_eq!(job.interval, MIN_INTERVAL);
    }

    #[tokio::test]
    async fn skip_while_locked_elsewhere() {
        let (_, _, mutex, job) = job();
        mutex
            .try_acquire(keys::lock::MAINTENANCE, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(job.run_cycle(Utc::now()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn release_lock_after_cycle() {
        let (_, _, mutex, job) = job();

        job.run_cycle(Utc::now()).await.unwrap();

        assert!(mutex
            .try_acquire(keys::lock::MAINTENANCE, Duration::from_secs(60))
            .await
            .unwrap());
    }
}
