//! Subscription management on behalf of clients and administrators

use super::store::{StoreError, SubscriptionStore};
use crate::constants::REDACTED_PLACEHOLDER;
use crate::domain::request::{
    SubscriptionRequest, SubscriptionResponse, TerminationRequest, TerminationResponse,
};
use crate::domain::Subscription;
use crate::library::storage::KeyValueStore;
use crate::library::BoxedError;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

/// Implements the subscribe and terminate protocol as well as direct management
#[derive(Clone)]
pub struct SubscriptionManager<S> {
    store: SubscriptionStore<S>,
}

impl<S: KeyValueStore> SubscriptionManager<S> {
    /// Creates a new instance operating on the given store
    pub fn new(store: SubscriptionStore<S>) -> Self {
        Self { store }
    }

    /// Creates or replaces the subscription described by the request
    ///
    /// Invalid requests are answered with a failed response listing every problem.
    /// Only substrate failures are returned as errors.
    #[instrument(skip(self, request), fields(requestor = request.requestor_ref.as_str()))]
    pub async fn subscribe(
        &self,
        request: &SubscriptionRequest,
    ) -> Result<SubscriptionResponse, BoxedError> {
        let subscription_ref = request.subscription_ref.clone();
        let errors = request.validate(Utc::now());

        if !errors.is_empty() {
            warn!(?errors, "Rejecting subscription request");
            return Ok(SubscriptionResponse::failure(subscription_ref, &errors));
        }

        match self.store.add_or_replace(request.to_subscription(), true).await {
            Ok(subscription) => {
                info!(id = subscription.id.as_str(), "Subscribed through request");
                Ok(SubscriptionResponse::success(subscription_ref))
            }
            Err(StoreError::Invalid(error)) => {
                warn!(%error, "Rejecting subscription request");
                Ok(SubscriptionResponse::failure(subscription_ref, &[error]))
            }
            Err(StoreError::Storage(error)) => Err(error),
        }
    }

    /// Removes the subscription named by the request if it exists
    ///
    /// Well-formed requests are always acknowledged, whether a subscription has been
    /// removed or not.
    #[instrument(skip(self, request), fields(requestor = request.requestor_ref.as_str()))]
    pub async fn terminate(
        &self,
        request: &TerminationRequest,
    ) -> Result<TerminationResponse, BoxedError> {
        let errors = request.validate();

        if !errors.is_empty() {
            return Ok(TerminationResponse {
                status: false,
                errors: errors.iter().map(ToString::to_string).collect(),
            });
        }

        if let Some(name) = request.subscription_name() {
            match self.store.get_by_name(&name).await? {
                Some(existing) => {
                    self.store.remove(&existing.id).await?;
                }
                None => debug!("No subscription to terminate"),
            }
        }

        Ok(TerminationResponse {
            status: true,
            errors: Vec::new(),
        })
    }

    /// Stores a subscription, replacing an existing one with the same derived name
    pub async fn add(&self, subscription: Subscription) -> Result<Subscription, StoreError> {
        self.store.add_or_replace(subscription, true).await
    }

    /// Removes a subscription, unknown identifiers are ignored
    pub async fn remove(&self, id: &str) -> Result<(), BoxedError> {
        self.store.remove(id).await?;
        Ok(())
    }

    /// Every subscription with its identifier and push address hidden
    pub async fn list_redacted(&self) -> Result<Vec<Subscription>, BoxedError> {
        let mut subscriptions = self.store.list_all().await?;

        for subscription in subscriptions.iter_mut() {
            subscription.id = REDACTED_PLACEHOLDER.to_owned();
            subscription.push_address = REDACTED_PLACEHOLDER.to_owned();
        }

        subscriptions.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(subscriptions)
    }
}
