//! Inverted indices from references to the subscriptions interested in them

use crate::domain::event::EventKind;
use crate::domain::keys;
use crate::domain::{Subscription, SubscriptionIdentifier};
use crate::library::storage::KeyValueStore;
use crate::library::{BoxedError, EmptyResult};
use std::collections::BTreeSet;
use tracing::trace;

type IdSet = BTreeSet<SubscriptionIdentifier>;

/// Keys under which a subscription is listed in each index map
#[derive(Debug, Default, PartialEq, Eq)]
struct IndexKeys<'a> {
    stops: BTreeSet<&'a str>,
    lines: BTreeSet<&'a str>,
    codespaces: BTreeSet<&'a str>,
}

impl<'a> IndexKeys<'a> {
    fn of(subscription: Option<&'a Subscription>) -> Self {
        let subscription = match subscription {
            Some(subscription) => subscription,
            None => return Self::default(),
        };

        if subscription.has_stop_points() {
            Self {
                stops: subscription.stop_points(),
                ..Default::default()
            }
        } else {
            Self {
                stops: BTreeSet::new(),
                lines: subscription.line_refs.iter().map(String::as_str).collect(),
                codespaces: subscription.codespaces.iter().map(String::as_str).collect(),
            }
        }
    }
}

/// Lookup of subscriptions by stop point, line, or codespace
///
/// Stop points index every subscription that has them. Lines and codespaces only
/// index subscriptions without any stop points, since the stop points take precedence
/// for those that have both.
///
/// Entries are kept in the shared substrate and updated with a read-modify-write
/// cycle per key. Concurrent updates of the same key by multiple instances may
/// therefore lose one of the writes. Lookups skip identifiers whose record no
/// longer exists.
#[derive(Clone)]
pub struct InterestIndex<S> {
    kv: S,
}

impl<S: KeyValueStore> InterestIndex<S> {
    /// Creates a new instance on top of the given substrate
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    /// Applies the difference between two versions of a subscription
    ///
    /// Passing `None` as the previous version indexes a new subscription, passing `None`
    /// as the next version removes it. Keys present in both versions are not touched.
    pub async fn apply(
        &self,
        previous: Option<&Subscription>,
        next: Option<&Subscription>,
    ) -> EmptyResult {
        let id = match next.or(previous) {
            Some(subscription) => subscription.id.as_str(),
            None => return Ok(()),
        };

        let old = IndexKeys::of(previous);
        let new = IndexKeys::of(next);

        self.apply_map(keys::index::STOPS, id, &old.stops, &new.stops)
            .await?;
        self.apply_map(keys::index::LINES, id, &old.lines, &new.lines)
            .await?;
        self.apply_map(keys::index::CODESPACES, id, &old.codespaces, &new.codespaces)
            .await?;

        Ok(())
    }

    async fn apply_map(
        &self,
        map: &str,
        id: &str,
        old: &BTreeSet<&str>,
        new: &BTreeSet<&str>,
    ) -> EmptyResult {
        for key in old.difference(new) {
            self.modify(map, key, |ids| {
                ids.remove(id);
            })
            .await?;
        }

        for key in new.difference(old) {
            self.modify(map, key, |ids| {
                ids.insert(id.to_owned());
            })
            .await?;
        }

        Ok(())
    }

    async fn modify(&self, map: &str, key: &str, change: impl FnOnce(&mut IdSet)) -> EmptyResult {
        let mut ids: IdSet = self.kv.get(map, key).await?.unwrap_or_default();
        change(&mut ids);

        trace!(map, key, size = ids.len(), "Writing index entry");

        if ids.is_empty() {
            self.kv.remove::<IdSet>(map, key).await?;
        } else {
            self.kv.put(map, key, &ids).await?;
        }

        Ok(())
    }

    /// Subscriptions listening to the given stop point or stop place
    pub async fn subscriptions_for_stop(
        &self,
        stop: &str,
        kind: EventKind,
    ) -> Result<Vec<Subscription>, BoxedError> {
        self.resolve(keys::index::STOPS, stop, kind).await
    }

    /// Subscriptions without stop points listening to the given line
    pub async fn subscriptions_for_line_no_stops(
        &self,
        line: &str,
        kind: EventKind,
    ) -> Result<Vec<Subscription>, BoxedError> {
        self.resolve(keys::index::LINES, line, kind).await
    }

    /// Subscriptions without stop points listening to the given codespace
    pub async fn subscriptions_for_codespace_no_stops(
        &self,
        codespace: &str,
        kind: EventKind,
    ) -> Result<Vec<Subscription>, BoxedError> {
        self.resolve(keys::index::CODESPACES, codespace, kind).await
    }

    async fn resolve(
        &self,
        map: &str,
        key: &str,
        kind: EventKind,
    ) -> Result<Vec<Subscription>, BoxedError> {
        let ids: IdSet = self.kv.get(map, key).await?.unwrap_or_default();
        let mut subscriptions = Vec::with_capacity(ids.len());

        for id in ids {
            let record: Option<Subscription> =
                self.kv.get(keys::subscription::RECORDS, &id).await?;

            match record {
                Some(subscription) if subscription.accepts(kind) => subscriptions.push(subscription),
                Some(_) => {}
                None => trace!(map, key, id = id.as_str(), "Skipping dangling index entry"),
            }
        }

        Ok(subscriptions)
    }
}
