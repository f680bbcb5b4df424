//! Durable registry of subscriptions

use super::index::InterestIndex;
use crate::domain::keys;
use crate::domain::{Subscription, SubscriptionError, SubscriptionIdentifier};
use crate::library::storage::KeyValueStore;
use crate::library::BoxedError;
use chrono::Utc;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Errors raised while mutating the store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Subscription does not satisfy its invariants
    #[error("invalid subscription")]
    Invalid(#[from] SubscriptionError),
    /// Substrate could not be read or written
    #[error("subscription storage failed")]
    Storage(#[from] BoxedError),
}

/// Single source of truth for subscriptions and owner of the [`InterestIndex`]
///
/// Every mutation is mirrored into the index by applying the difference between the
/// previous and the next version of the affected record.
#[derive(Clone)]
pub struct SubscriptionStore<S> {
    kv: S,
    index: InterestIndex<S>,
}

impl<S: KeyValueStore + Clone> SubscriptionStore<S> {
    /// Creates a new instance on top of the given substrate
    pub fn new(kv: S) -> Self {
        Self {
            index: InterestIndex::new(kv.clone()),
            kv,
        }
    }
}

impl<S: KeyValueStore> SubscriptionStore<S> {
    /// Index maintained by this store
    pub fn index(&self) -> &InterestIndex<S> {
        &self.index
    }

    /// Validates and stores a new subscription with a freshly assigned identifier
    #[instrument(skip(self, subscription), fields(push_address = subscription.push_address.as_str()))]
    pub async fn add(&self, mut subscription: Subscription) -> Result<Subscription, StoreError> {
        subscription.validate(Utc::now())?;
        subscription.id = self.unused_identifier().await?;
        subscription.failed_push_counter = 0;

        self.write(None, &subscription).await?;
        info!(id = subscription.id.as_str(), "Added subscription");

        Ok(subscription)
    }

    /// Stores a subscription, replacing the one with the same derived name if requested
    ///
    /// A replaced subscription keeps its identifier while everything else, including the
    /// failure counter, is taken from the new version.
    pub async fn add_or_replace(
        &self,
        mut subscription: Subscription,
        match_by_name: bool,
    ) -> Result<Subscription, StoreError> {
        if !match_by_name {
            return self.add(subscription).await;
        }

        subscription.validate(Utc::now())?;

        match self.get_by_name(&subscription.derived_name()).await? {
            Some(existing) => {
                subscription.id = existing.id.clone();
                subscription.failed_push_counter = 0;

                self.write(Some(&existing), &subscription).await?;
                info!(id = subscription.id.as_str(), "Replaced subscription");

                Ok(subscription)
            }
            None => self.add(subscription).await,
        }
    }

    /// Deletes a subscription and its index entries
    pub async fn remove(&self, id: &str) -> Result<Option<Subscription>, BoxedError> {
        let removed: Option<Subscription> = self.kv.remove(keys::subscription::RECORDS, id).await?;

        if let Some(subscription) = &removed {
            self.index.apply(Some(subscription), None).await?;
            self.unlink_name(&subscription.derived_name(), id).await?;
            info!(id, "Removed subscription");
        }

        Ok(removed)
    }

    /// Replaces an existing subscription
    ///
    /// Unknown identifiers are ignored so that a subscription removed concurrently
    /// is never brought back.
    pub async fn update(&self, subscription: Subscription) -> Result<Option<Subscription>, BoxedError> {
        match self.get_by_id(&subscription.id).await? {
            Some(existing) => {
                self.write(Some(&existing), &subscription).await?;
                Ok(Some(subscription))
            }
            None => {
                debug!(id = subscription.id.as_str(), "Ignoring update of unknown subscription");
                Ok(None)
            }
        }
    }

    /// Looks up a subscription by its derived name
    ///
    /// Names resolve through a dedicated map, records whose name has changed in the
    /// meantime are skipped.
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Subscription>, BoxedError> {
        let ids: BTreeSet<SubscriptionIdentifier> = self
            .kv
            .get(keys::subscription::NAMES, name)
            .await?
            .unwrap_or_default();

        for id in ids {
            if let Some(subscription) = self.get_by_id(&id).await? {
                if subscription.derived_name() == name {
                    return Ok(Some(subscription));
                }
            }
        }

        Ok(None)
    }

    #[allow(missing_docs)]
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Subscription>, BoxedError> {
        self.kv.get(keys::subscription::RECORDS, id).await
    }

    /// Every stored subscription in no particular order
    pub async fn list_all(&self) -> Result<Vec<Subscription>, BoxedError> {
        let entries = self.kv.entries(keys::subscription::RECORDS).await?;
        Ok(entries.into_iter().map(|(_, s)| s).collect())
    }

    /// Number of stored subscriptions
    pub async fn count(&self) -> Result<usize, BoxedError> {
        self.kv.len(keys::subscription::RECORDS).await
    }

    async fn write(
        &self,
        previous: Option<&Subscription>,
        subscription: &Subscription,
    ) -> Result<(), BoxedError> {
        self.kv
            .put(keys::subscription::RECORDS, &subscription.id, subscription)
            .await?;
        self.index.apply(previous, Some(subscription)).await?;

        let name = subscription.derived_name();

        if let Some(previous) = previous {
            let previous_name = previous.derived_name();

            if previous_name == name {
                return Ok(());
            }

            self.unlink_name(&previous_name, &previous.id).await?;
        }

        self.modify_name(&name, |ids| {
            ids.insert(subscription.id.clone());
        })
        .await
    }

    async fn unlink_name(&self, name: &str, id: &str) -> Result<(), BoxedError> {
        self.modify_name(name, |ids| {
            ids.remove(id);
        })
        .await
    }

    /// Read-modify-write of a single name entry, empty entries are removed
    async fn modify_name(
        &self,
        name: &str,
        f: impl FnOnce(&mut BTreeSet<SubscriptionIdentifier>) + Send,
    ) -> Result<(), BoxedError> {
        let mut ids: BTreeSet<SubscriptionIdentifier> = self
            .kv
            .get(keys::subscription::NAMES, name)
            .await?
            .unwrap_or_default();

        f(&mut ids);

        if ids.is_empty() {
            self.kv
                .remove::<BTreeSet<SubscriptionIdentifier>>(keys::subscription::NAMES, name)
                .await?;
        } else {
            self.kv.put(keys::subscription::NAMES, name, &ids).await?;
        }

        Ok(())
    }

    async fn unused_identifier(&self) -> Result<SubscriptionIdentifier, BoxedError> {
        loop {
            let id = Uuid::new_v4().to_string();

            if self.get_by_id(&id).await?.is_none() {
                return Ok(id);
            }
        }
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use crate::domain::event::EventKind;
    use crate::library::storage::{MemoryKeyValueStore, RawKeyValueStore};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn store() -> SubscriptionStore<MemoryKeyValueStore> {
        SubscriptionStore::new(MemoryKeyValueStore::new())
    }

    fn directional(from: &str, to: &str) -> Subscription {
        Subscription {
            name: Some("commute".into()),
            push_address: "http://localhost/push".into(),
            from_stop_points: vec![from.to_owned()].into_iter().collect(),
            to_stop_points: vec![to.to_owned()].into_iter().collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn assign_identifiers() {
        let store = store();
        let mut subscription = directional("A", "B");
        subscription.id = "client chosen".into();
        subscription.failed_push_counter = 7;

        let added = store.add(subscription).await.unwrap();

        assert_ne!(added.id, "client chosen");
        assert_eq!(added.failed_push_counter, 0);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(
            store.get_by_id(&added.id).await.unwrap().map(|s| s.id),
            Some(added.id.clone())
        );
    }

    #[tokio::test]
    async fn reject_invalid_subscriptions() {
        let store = store();
        let mut subscription = directional("A", "B");
        subscription.initial_termination_time = Some(Utc::now() - Duration::hours(1));

        let result = store.add(subscription).await;

        assert!(matches!(
            result,
            Err(StoreError::Invalid(SubscriptionError::TerminationTimeInPast(_)))
        ));
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn replace_subscriptions_with_same_name() {
        let store = store();
        let first = store
            .add_or_replace(directional("A", "B"), true)
            .await
            .unwrap();
        let second = store
            .add_or_replace(directional("A", "C"), true)
            .await
            .unwrap();

        let stale = store
            .index()
            .subscriptions_for_stop("B", EventKind::Et)
            .await
            .unwrap();
        let fresh = store
            .index()
            .subscriptions_for_stop("C", EventKind::Et)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.count().await.unwrap(), 1);
        assert!(stale.is_empty());
        assert_eq!(fresh.len(), 1);
    }

    #[tokio::test]
    async fn add_duplicates_without_name_matching() {
        let store = store();
        let first = store.add_or_replace(directional("A", "B"), false).await.unwrap();
        let second = store.add_or_replace(directional("A", "B"), false).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn remove_subscriptions_and_index_entries() {
        let store = store();
        let added = store.add(directional("A", "B")).await.unwrap();

        let removed = store.remove(&added.id).await.unwrap();
        let indexed = store
            .index()
            .subscriptions_for_stop("A", EventKind::Et)
            .await
            .unwrap();

        assert_eq!(removed.map(|s| s.id), Some(added.id.clone()));
        assert!(indexed.is_empty());
        assert_eq!(store.remove(&added.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn ignore_updates_of_unknown_subscriptions() {
        let store = store();
        let mut ghost = directional("A", "B");
        ghost.id = "ghost".into();

        assert_eq!(store.update(ghost).await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn persist_updates() {
        let store = store();
        let mut added = store.add(directional("A", "B")).await.unwrap();
        added.failed_push_counter = 2;

        store.update(added.clone()).await.unwrap();
        let stored = store.get_by_id(&added.id).await.unwrap().unwrap();

        assert_eq!(stored.failed_push_counter, 2);
    }

    #[tokio::test]
    async fn find_subscriptions_by_derived_name() {
        let store = store();
        let mut unnamed = directional("A", "B");
        unnamed.name = None;
        let expected_name = unnamed.derived_name();

        let added = store.add(unnamed).await.unwrap();
        let found = store.get_by_name(&expected_name).await.unwrap();

        assert_eq!(found.map(|s| s.id), Some(added.id));
    }

    #[tokio::test]
    async fn follow_renamed_subscriptions() {
        let store = store();
        let mut added = store.add(directional("A", "B")).await.unwrap();
        added.name = Some("renamed".into());

        store.update(added.clone()).await.unwrap();

        assert_eq!(store.get_by_name("commute").await.unwrap(), None);
        assert_eq!(
            store.get_by_name("renamed").await.unwrap().map(|s| s.id),
            Some(added.id)
        );
    }

    #[tokio::test]
    async fn keep_names_shared_by_remaining_subscriptions() {
        let store = store();
        let first = store.add(directional("A", "B")).await.unwrap();
        let second = store.add(directional("A", "B")).await.unwrap();

        store.remove(&second.id).await.unwrap();
        let found = store.get_by_name("commute").await.unwrap();
        store.remove(&first.id).await.unwrap();

        assert_eq!(found.map(|s| s.id), Some(first.id));
        assert_eq!(store.get_by_name("commute").await.unwrap(), None);
        assert_eq!(
            store.kv.len(keys::subscription::NAMES).await.unwrap(),
            0
        );
    }
}
