//! Fan-out of a single event to all interested subscribers

use super::dispatcher::{DispatchOutcome, PushDispatcher};
use super::matching::MatchingEngine;
use super::redactor::redact;
use crate::domain::event::TransitEvent;
use crate::library::http::PushClient;
use crate::library::storage::KeyValueStore;
use crate::library::BoxedError;
use futures::{stream, StreamExt};
use serde::Serialize;
use std::ops::AddAssign;
use tracing::{debug, error, instrument};

/// Tally of the dispatch outcomes for one or more events
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingSummary {
    /// Events which have been matched successfully
    pub events: usize,
    /// Subscriptions matched across all events
    pub matched: usize,
    #[allow(missing_docs)]
    pub delivered: usize,
    /// Pushes suppressed by deduplication
    pub skipped: usize,
    /// Pushes that have not been acknowledged or could not be attempted
    pub failed: usize,
    /// Subscriptions removed as a result of a push
    pub removed: usize,
}

impl ProcessingSummary {
    fn record(&mut self, outcome: &Result<DispatchOutcome, BoxedError>) {
        match outcome {
            Ok(DispatchOutcome::Delivered) => self.delivered += 1,
            Ok(DispatchOutcome::Skipped) => self.skipped += 1,
            Ok(DispatchOutcome::Failed(_)) | Err(_) => self.failed += 1,
            Ok(DispatchOutcome::Removed(_)) => self.removed += 1,
        }
    }
}

impl AddAssign for ProcessingSummary {
    fn add_assign(&mut self, other: Self) {
        self.events += other.events;
        self.matched += other.matched;
        self.delivered += other.delivered;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.removed += other.removed;
    }
}

/// Matches, redacts, and dispatches events
///
/// Pushes for a single event run concurrently up to the configured limit. A failure
/// affecting one subscription is logged and never prevents delivery to the others.
pub struct EventProcessor<S, C> {
    engine: MatchingEngine<S>,
    dispatcher: PushDispatcher<S, C>,
    concurrency: usize,
}

impl<S, C> EventProcessor<S, C>
where
    S: KeyValueStore,
    C: PushClient,
{
    /// Creates a new instance with at most `concurrency` pushes in flight per event
    pub fn new(engine: MatchingEngine<S>, dispatcher: PushDispatcher<S, C>, concurrency: usize) -> Self {
        Self {
            engine,
            dispatcher,
            concurrency: concurrency.max(1),
        }
    }

    /// Delivers the event to every interested subscription
    ///
    /// Only errors raised while matching are returned.
    #[instrument(skip(self, event), fields(kind = %event.kind()))]
    pub async fn process(&self, event: &TransitEvent) -> Result<ProcessingSummary, BoxedError> {
        let matches = self.engine.match_event(event).await?;

        let mut summary = ProcessingSummary {
            events: 1,
            matched: matches.len(),
            ..Default::default()
        };

        debug!(matched = summary.matched, "Matched event");

        let outcomes: Vec<_> = stream::iter(matches.into_subscriptions())
            .map(|subscription| async move {
                let message = redact(event, &subscription);
                let outcome = self.dispatcher.dispatch(&subscription, &message).await;

                if let Err(error) = &outcome {
                    error!(id = subscription.id.as_str(), ?error, "Failed to dispatch event");
                }

                outcome
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for outcome in outcomes.iter() {
            summary.record(outcome);
        }

        Ok(summary)
    }
}
