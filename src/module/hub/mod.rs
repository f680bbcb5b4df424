//! Subscription based distribution of real-time transit events
//!
//! Clients register their interest in stop pairs, lines, or codespaces. Every
//! incoming event is matched against the registered interests, trimmed down to
//! the relevant parts, and pushed to the address of each matching subscription.
//!
//! State is kept in a shared substrate so that multiple instances may cooperate:
//!
//! - [`SubscriptionStore`] holds the records and maintains the [`InterestIndex`]
//! - [`MatchingEngine`] resolves events to subscriptions using the index
//! - [`PushDispatcher`] delivers messages, consults the [`DedupCache`], and
//!   maintains failure counters
//! - [`MaintenanceJob`] purges stale state under a distributed mutex

use async_trait::async_trait;
use jatsl::{schedule, JobScheduler};
use std::sync::Arc;
use tracing::info;

mod dedup;
mod dispatcher;
mod index;
mod jobs;
mod manager;
mod matching;
mod options;
mod processor;
mod redactor;
mod store;

pub use dedup::DedupCache;
pub use dispatcher::{fingerprint, DispatchOutcome, PushDispatcher, RemovalReason};
pub use index::InterestIndex;
pub use jobs::{routes, MaintenanceJob, MaintenanceReport, ServerJob};
pub use manager::SubscriptionManager;
pub use matching::{Matches, MatchingEngine};
pub use options::Options;
pub use processor::{EventProcessor, ProcessingSummary};
pub use redactor::{redact, redact_journey, redact_situation};
pub use store::{StoreError, SubscriptionStore};

use crate::harness::{Heart, Module};
use crate::library::http::ReqwestPushClient;
use crate::library::storage::{RedisKeyValueStore, RedisMutex};
use crate::library::{BoxedError, EmptyResult};

/// Module implementation
pub struct Hub {
    options: Options,
    kv: Option<RedisKeyValueStore>,
    mutex: Option<RedisMutex>,
}

impl Hub {
    /// Creates a new instance from raw parts
    pub fn new(options: Options) -> Self {
        Self {
            options,
            kv: None,
            mutex: None,
        }
    }
}

#[async_trait]
impl Module for Hub {
    async fn pre_startup(&mut self) -> EmptyResult {
        let url = &self.options.redis.url;

        self.kv = Some(RedisKeyValueStore::connect(url).await?);
        self.mutex = Some(RedisMutex::connect(url).await?);

        Ok(())
    }

    async fn run(&mut self, scheduler: &JobScheduler) -> Result<Option<Heart>, BoxedError> {
        let kv = self.kv.clone().ok_or("substrate not connected")?;
        let mutex = self.mutex.clone().ok_or("substrate not connected")?;

        let store = SubscriptionStore::new(kv.clone());
        let dedup = DedupCache::new(kv, self.options.dedup_retention);
        let client = ReqwestPushClient::new(self.options.push_timeout)?;

        let dispatcher = PushDispatcher::new(
            store.clone(),
            dedup.clone(),
            client,
            self.options.max_failed_pushes,
        );
        let engine = MatchingEngine::new(store.index().clone());
        let processor = EventProcessor::new(engine, dispatcher, self.options.push_concurrency);

        info!(
            max_failed_pushes = self.options.max_failed_pushes,
            dedup_retention = ?self.options.dedup_retention,
            "Distributing events"
        );

        let server_job = ServerJob::new(
            self.options.port,
            SubscriptionManager::new(store.clone()),
            Arc::new(processor),
        );
        let maintenance_job =
            MaintenanceJob::new(store, dedup, mutex, self.options.maintenance_interval);

        schedule!(scheduler, { server_job, maintenance_job });

        Ok(Some(Heart::without_heart_stone()))
    }
}
