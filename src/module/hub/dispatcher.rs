//! Delivery of redacted events and interpretation of the subscriber's response

use super::dedup::DedupCache;
use super::store::SubscriptionStore;
use crate::constants::{PUSH_RESPONSE_FORGET_ME, PUSH_RESPONSE_OK};
use crate::domain::event::TransitEvent;
use crate::domain::Subscription;
use crate::library::helpers::join_url;
use crate::library::http::{PushClient, PushError, PushResponse};
use crate::library::storage::KeyValueStore;
use crate::library::BoxedError;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

/// Why a subscription has been removed while dispatching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    /// Subscriber responded with `FORGET_ME`
    ForgetMe,
    /// Failure counter exceeded the configured maximum
    TooManyFailures,
}

/// Result of a single [`PushDispatcher::dispatch`] call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Subscriber acknowledged the push
    Delivered,
    /// Same message has been pushed recently
    Skipped,
    /// Push has not been acknowledged, carries the new failure counter if the subscription still exists
    Failed(Option<u32>),
    #[allow(missing_docs)]
    Removed(RemovalReason),
}

/// Interpretation of a push response
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    Acknowledged,
    ForgetMe,
    Failure,
}

impl From<&Result<PushResponse, PushError>> for Verdict {
    fn from(result: &Result<PushResponse, PushError>) -> Self {
        match result {
            Ok(response) if response.is_success() => match response.body.trim() {
                PUSH_RESPONSE_OK => Verdict::Acknowledged,
                PUSH_RESPONSE_FORGET_ME => Verdict::ForgetMe,
                _ => Verdict::Failure,
            },
            _ => Verdict::Failure,
        }
    }
}

/// Fingerprint identifying a message sent to a subscription
pub fn fingerprint(subscription_id: &str, payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(subscription_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload);
    format!("{:x}", hasher.finalize())
}

/// Pushes messages to subscribers and maintains their failure counters
///
/// Messages are not retried. A failed delivery only increments the counter, the
/// next matching event is the next chance for the subscriber.
pub struct PushDispatcher<S, C> {
    store: SubscriptionStore<S>,
    dedup: DedupCache<S>,
    client: C,
    max_failed_pushes: u32,
}

impl<S, C> PushDispatcher<S, C>
where
    S: KeyValueStore,
    C: PushClient,
{
    /// Creates a new instance removing subscriptions once their counter exceeds `max_failed_pushes`
    pub fn new(
        store: SubscriptionStore<S>,
        dedup: DedupCache<S>,
        client: C,
        max_failed_pushes: u32,
    ) -> Self {
        Self {
            store,
            dedup,
            client,
            max_failed_pushes,
        }
    }

    /// Delivers an already redacted message to the subscriber
    #[instrument(skip(self, subscription, message), fields(id = subscription.id.as_str(), kind = %message.kind()))]
    pub async fn dispatch(
        &self,
        subscription: &Subscription,
        message: &TransitEvent,
    ) -> Result<DispatchOutcome, BoxedError> {
        let payload = serde_json::to_vec(message)?;
        let fingerprint = fingerprint(&subscription.id, &payload);

        if !self
            .dedup
            .check_and_record(&subscription.id, &fingerprint, Utc::now())
            .await?
        {
            debug!(fingerprint = fingerprint.as_str(), "Skipping message pushed before");
            return Ok(DispatchOutcome::Skipped);
        }

        let url = join_url(&subscription.push_address, message.kind().push_suffix());
        let result = self.client.push(&url, payload).await;

        match Verdict::from(&result) {
            Verdict::Acknowledged => self.reset_failures(&subscription.id).await,
            Verdict::ForgetMe => {
                info!("Subscriber asked to be forgotten");
                self.store.remove(&subscription.id).await?;
                Ok(DispatchOutcome::Removed(RemovalReason::ForgetMe))
            }
            Verdict::Failure => {
                match &result {
                    Ok(response) => warn!(status = response.status, "Push has not been acknowledged"),
                    Err(error) => warn!(?error, "Push failed"),
                }

                self.record_failure(&subscription.id).await
            }
        }
    }

    async fn reset_failures(&self, id: &str) -> Result<DispatchOutcome, BoxedError> {
        if let Some(mut current) = self.store.get_by_id(id).await? {
            if current.failed_push_counter != 0 {
                current.failed_push_counter = 0;
                self.store.update(current).await?;
            }
        }

        Ok(DispatchOutcome::Delivered)
    }

    async fn record_failure(&self, id: &str) -> Result<DispatchOutcome, BoxedError> {
        let mut current = match self.store.get_by_id(id).await? {
            Some(current) => current,
            None => return Ok(DispatchOutcome::Failed(None)),
        };

        current.failed_push_counter = current.failed_push_counter.saturating_add(1);
        let counter = current.failed_push_counter;

        if counter > self.max_failed_pushes {
            info!(counter, "Removing subscription after repeated failures");
            self.store.remove(id).await?;
            Ok(DispatchOutcome::Removed(RemovalReason::TooManyFailures))
        } else {
            self.store.update(current).await?;
            Ok(DispatchOutcome::Failed(Some(counter)))
        }
    }
}


#[cfg(test)]
mod does {
    use super::mock::MockPushClient;
    use super::*;
    use crate::domain::event::et::EstimatedVehicleJourney;
    use crate::library::storage::MemoryKeyValueStore;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    struct Fixture {
        store: SubscriptionStore<MemoryKeyValueStore>,
        client: MockPushClient,
        dispatcher: PushDispatcher<MemoryKeyValueStore, MockPushClient>,
        subscription: Subscription,
    }

    async fn fixture() -> Fixture {
        let kv = MemoryKeyValueStore::new();
        let store = SubscriptionStore::new(kv.clone());
        let dedup = DedupCache::new(kv, Duration::from_secs(3600));
        let client = MockPushClient::default();
        let dispatcher = PushDispatcher::new(store.clone(), dedup, client.clone(), 3);

        let subscription = store
            .add(Subscription {
                push_address: "http://subscriber/push/".into(),
                line_refs: vec!["L1".to_owned()].into_iter().collect(),
                ..Default::default()
            })
            .await
            .unwrap();

        Fixture {
            store,
            client,
            dispatcher,
            subscription,
        }
    }

    /// Distinct message per call so that deduplication does not interfere
    fn message(sequence: u32) -> TransitEvent {
        EstimatedVehicleJourney {
            dated_vehicle_journey_ref: Some(format!("journey-{}", sequence).as_str().into()),
            ..Default::default()
        }
        .into()
    }

    async fn counter(fixture: &Fixture) -> Option<u32> {
        fixture
            .store
            .get_by_id(&fixture.subscription.id)
            .await
            .unwrap()
            .map(|s| s.failed_push_counter)
    }

    #[tokio::test]
    async fn push_to_kind_specific_path() {
        let f = fixture().await;

        let outcome = f.dispatcher.dispatch(&f.subscription, &message(1)).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert_eq!(f.client.urls(), vec!["http://subscriber/push/et"]);
    }

    #[tokio::test]
    async fn remove_after_four_failures() {
        let f = fixture().await;

        for _ in 0..4 {
            f.client.respond_with(200, "NOPE");
        }

        let mut outcomes = Vec::new();
        for i in 0..4 {
            outcomes.push(f.dispatcher.dispatch(&f.subscription, &message(i)).await.unwrap());
        }

        assert_eq!(
            outcomes,
            vec![
                DispatchOutcome::Failed(Some(1)),
                DispatchOutcome::Failed(Some(2)),
                DispatchOutcome::Failed(Some(3)),
                DispatchOutcome::Removed(RemovalReason::TooManyFailures),
            ]
        );
        assert_eq!(counter(&f).await, None);
    }

    #[tokio::test]
    async fn reset_counter_on_acknowledgement() {
        let f = fixture().await;
        f.client.respond_with(500, "OK");
        f.client.respond_with(200, "");
        f.client.respond_with(200, " OK\n");

        for i in 0..3 {
            f.dispatcher.dispatch(&f.subscription, &message(i)).await.unwrap();
        }

        assert_eq!(counter(&f).await, Some(0));
    }

    #[tokio::test]
    async fn forget_subscriptions_on_request() {
        let f = fixture().await;
        f.client.respond_with(200, "FORGET_ME");

        let outcome = f.dispatcher.dispatch(&f.subscription, &message(1)).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Removed(RemovalReason::ForgetMe));
        assert_eq!(f.store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn deliver_identical_messages_once() {
        let f = fixture().await;

        let first = f.dispatcher.dispatch(&f.subscription, &message(1)).await.unwrap();
        let second = f.dispatcher.dispatch(&f.subscription, &message(1)).await.unwrap();

        assert_eq!(first, DispatchOutcome::Delivered);
        assert_eq!(second, DispatchOutcome::Skipped);
        assert_eq!(f.client.urls().len(), 1);
    }

    #[tokio::test]
    async fn leave_vanished_subscriptions_alone() {
        let f = fixture().await;
        f.store.remove(&f.subscription.id).await.unwrap();
        f.client.respond_with(503, "");

        let outcome = f.dispatcher.dispatch(&f.subscription, &message(1)).await.unwrap();

        assert_eq!(outcome, DispatchOutcome::Failed(None));
        assert_eq!(f.store.count().await.unwrap(), 0);
    }

    #[test]
    fn fingerprint_per_subscription() {
        assert_eq!(fingerprint("a", b"payload"), fingerprint("a", b"payload"));
        assert_ne!(fingerprint("a", b"payload"), fingerprint("b", b"payload"));
        assert_ne!(fingerprint("a", b"payload"), fingerprint("a", b"other"));
    }
}
