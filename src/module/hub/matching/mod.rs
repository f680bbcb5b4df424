//! Resolution of the subscriptions interested in an event
//!
//! Candidates are looked up through the [`InterestIndex`]. Subscriptions with stop points
//! express a direction of travel, thus a candidate found through a sequence of stops only
//! matches if one of its from stops is visited before one of its to stops. Subscriptions
//! without stop points match solely on lines and codespaces.

mod et;
mod route;
mod sx;

pub use route::departs_before_arrival;

use super::index::InterestIndex;
use crate::domain::event::{EventKind, TransitEvent};
use crate::domain::{Subscription, SubscriptionIdentifier};
use crate::library::storage::KeyValueStore;
use crate::library::BoxedError;
use std::collections::{BTreeMap, BTreeSet};

/// Union of matched subscriptions, deduplicated by identifier
#[derive(Debug, Default)]
pub struct Matches {
    subscriptions: BTreeMap<SubscriptionIdentifier, Subscription>,
}

impl Matches {
    fn insert(&mut self, subscription: Subscription) {
        self.subscriptions
            .entry(subscription.id.clone())
            .or_insert(subscription);
    }

    fn extend(&mut self, subscriptions: impl IntoIterator<Item = Subscription>) {
        for subscription in subscriptions {
            self.insert(subscription);
        }
    }

    #[allow(missing_docs)]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    #[allow(missing_docs)]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Identifiers of all matched subscriptions in ascending order
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.keys().map(String::as_str)
    }

    /// Consumes the matches, returning the subscriptions ordered by identifier
    pub fn into_subscriptions(self) -> Vec<Subscription> {
        self.subscriptions.into_values().collect()
    }
}

/// Matches events against the subscriptions registered in an [`InterestIndex`]
#[derive(Clone)]
pub struct MatchingEngine<S> {
    index: InterestIndex<S>,
}

impl<S: KeyValueStore> MatchingEngine<S> {
    /// Creates a new instance using the given index for lookups
    pub fn new(index: InterestIndex<S>) -> Self {
        Self { index }
    }

    /// Subscriptions which should receive the given event
    pub async fn match_event(&self, event: &TransitEvent) -> Result<Matches, BoxedError> {
        match event {
            TransitEvent::EstimatedTimetable(journey) => self.match_journey(journey).await,
            TransitEvent::Situation(situation) => self.match_situation(situation).await,
        }
    }

    /// Subscriptions indexed under any of the stops, each listed once
    async fn candidates_along(
        &self,
        sequence: &[&str],
        kind: EventKind,
    ) -> Result<Vec<Subscription>, BoxedError> {
        let distinct: BTreeSet<&str> = sequence.iter().copied().collect();
        let mut candidates = Matches::default();

        for stop in distinct {
            candidates.extend(self.index.subscriptions_for_stop(stop, kind).await?);
        }

        Ok(candidates.into_subscriptions())
    }

    /// Adds subscriptions without stop points that listen to the line or codespace
    async fn match_line_interest<'a>(
        &self,
        matches: &mut Matches,
        lines: impl IntoIterator<Item = &'a str>,
        codespace: Option<&str>,
        kind: EventKind,
    ) -> Result<(), BoxedError> {
        for line in lines {
            matches.extend(self.index.subscriptions_for_line_no_stops(line, kind).await?);
        }

        if let Some(codespace) = codespace {
            matches.extend(
                self.index
                    .subscriptions_for_codespace_no_stops(codespace, kind)
                    .await?,
            );
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::super::store::SubscriptionStore;
    use crate::domain::{Subscription, SubscriptionType};
    use crate::library::storage::MemoryKeyValueStore;

    pub fn directional(name: &str, from: &[&str], to: &[&str]) -> Subscription {
        Subscription {
            name: Some(name.into()),
            push_address: "http://localhost/push".into(),
            from_stop_points: from.iter().map(|s| s.to_string()).collect(),
            to_stop_points: to.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn line_interest(name: &str, lines: &[&str], codespaces: &[&str]) -> Subscription {
        Subscription {
            name: Some(name.into()),
            push_address: "http://localhost/push".into(),
            line_refs: lines.iter().map(|s| s.to_string()).collect(),
            codespaces: codespaces.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    pub fn typed(mut subscription: Subscription, kind: SubscriptionType) -> Subscription {
        subscription.subscription_type = kind;
        subscription
    }

    /// Stores the subscriptions and returns the stored identifiers by name
    pub async fn populated(
        subscriptions: Vec<Subscription>,
    ) -> (SubscriptionStore<MemoryKeyValueStore>, Vec<(String, String)>) {
        let store = SubscriptionStore::new(MemoryKeyValueStore::new());
        let mut ids = Vec::new();

        for subscription in subscriptions {
            let stored = store.add(subscription).await.unwrap();
            ids.push((stored.name.clone().unwrap_or_default(), stored.id));
        }

        (store, ids)
    }

    /// Names of the matched subscriptions, sorted
    pub fn names(ids: &[(String, String)], matched: &super::Matches) -> Vec<String> {
        let mut names: Vec<String> = matched
            .ids()
            .filter_map(|id| ids.iter().find(|(_, i)| i == id).map(|(n, _)| n.clone()))
            .collect();
        names.sort();
        names
    }
}
