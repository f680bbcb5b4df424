//! Subscribe and terminate requests exchanged with feed protocol clients

use super::subscription::{Subscription, SubscriptionType};
use crate::library::helpers::{non_blank, normalize_refs};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Problems found in a subscribe or terminate request
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[allow(missing_docs)]
    #[error("missing requestor ref")]
    MissingRequestorRef,
    #[allow(missing_docs)]
    #[error("missing address")]
    MissingAddress,
    #[allow(missing_docs)]
    #[error("missing subscription ref")]
    MissingSubscriptionRef,
    /// Estimated timetable subscriptions need a codespace or at least one line
    #[error("missing codespace or line refs")]
    MissingCodespaceOrLines,
    /// Situation subscriptions need a codespace
    #[error("missing codespace")]
    MissingCodespace,
    #[allow(missing_docs)]
    #[error("initial termination time has already passed")]
    TerminationTimeInPast,
    /// Termination requests have to name exactly one subscription
    #[error("exactly one subscription ref is required, got {0}")]
    SubscriptionRefCount(usize),
}

/// Kind specific part of a [`SubscriptionRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SubscriptionRequestKind {
    /// Subscribe to estimated timetables, optionally limited to some lines
    #[serde(rename_all = "camelCase")]
    EstimatedTimetable {
        #[allow(missing_docs)]
        #[serde(default)]
        line_refs: Vec<String>,
    },
    /// Subscribe to situations
    SituationExchange,
}

/// Request to create or replace a subscription on behalf of a requestor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRequest {
    /// Identifies the requesting party
    #[serde(default)]
    pub requestor_ref: String,
    /// Identifier chosen by the requestor, unique per requestor
    #[serde(default)]
    pub subscription_ref: String,
    /// Base URL to which events are pushed
    #[serde(default)]
    pub address: String,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_termination_time: Option<DateTime<Utc>>,
    /// Heartbeat interval in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<u64>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codespace: Option<String>,
    #[allow(missing_docs)]
    #[serde(flatten)]
    pub kind: SubscriptionRequestKind,
}

impl SubscriptionRequest {
    /// Name under which the resulting subscription is stored
    pub fn subscription_name(&self) -> String {
        format!(
            "{}-{}",
            self.requestor_ref.trim(),
            self.subscription_ref.trim()
        )
    }

    /// Collects every problem of the request
    pub fn validate(&self, now: DateTime<Utc>) -> Vec<RequestError> {
        let mut errors = Vec::new();

        if non_blank(&self.requestor_ref).is_none() {
            errors.push(RequestError::MissingRequestorRef);
        }

        if non_blank(&self.address).is_none() {
            errors.push(RequestError::MissingAddress);
        }

        if non_blank(&self.subscription_ref).is_none() {
            errors.push(RequestError::MissingSubscriptionRef);
        }

        let has_codespace = self.codespace.as_deref().and_then(non_blank).is_some();

        match &self.kind {
            SubscriptionRequestKind::EstimatedTimetable { line_refs } => {
                if !has_codespace && normalize_refs(line_refs).is_empty() {
                    errors.push(RequestError::MissingCodespaceOrLines);
                }
            }
            SubscriptionRequestKind::SituationExchange => {
                if !has_codespace {
                    errors.push(RequestError::MissingCodespace);
                }
            }
        }

        if matches!(self.initial_termination_time, Some(t) if t < now) {
            errors.push(RequestError::TerminationTimeInPast);
        }

        errors
    }

    /// Builds the subscription described by this request
    ///
    /// The result carries no stop points. Line refs are only taken over for
    /// estimated timetable requests.
    pub fn to_subscription(&self) -> Subscription {
        let (subscription_type, line_refs) = match &self.kind {
            SubscriptionRequestKind::EstimatedTimetable { line_refs } => {
                (SubscriptionType::Et, normalize_refs(line_refs))
            }
            SubscriptionRequestKind::SituationExchange => (SubscriptionType::Sx, Default::default()),
        };

        Subscription {
            name: Some(self.subscription_name()),
            push_address: self.address.trim().to_owned(),
            line_refs,
            codespaces: normalize_refs(self.codespace.iter()),
            subscription_type,
            heartbeat_interval: self.heartbeat_interval,
            initial_termination_time: self.initial_termination_time,
            use_siri_subscription_model: true,
            ..Default::default()
        }
    }
}

/// Acknowledgement of a [`SubscriptionRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    /// Whether the subscription has been stored
    pub status: bool,
    /// Human readable description of every problem, empty on success
    #[serde(default)]
    pub errors: Vec<String>,
    /// Echo of the requested subscription ref
    pub subscription_ref: String,
}

impl SubscriptionResponse {
    /// Successful acknowledgement
    pub fn success(subscription_ref: impl Into<String>) -> Self {
        Self {
            status: true,
            errors: Vec::new(),
            subscription_ref: subscription_ref.into(),
        }
    }

    /// Failed acknowledgement listing the given errors
    pub fn failure<E: ToString>(subscription_ref: impl Into<String>, errors: &[E]) -> Self {
        Self {
            status: false,
            errors: errors.iter().map(ToString::to_string).collect(),
            subscription_ref: subscription_ref.into(),
        }
    }
}

/// Request to remove a subscription previously created by the requestor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationRequest {
    #[allow(missing_docs)]
    #[serde(default)]
    pub requestor_ref: String,
    #[allow(missing_docs)]
    #[serde(default)]
    pub subscription_refs: Vec<String>,
}

impl TerminationRequest {
    /// Collects every problem of the request
    pub fn validate(&self) -> Vec<RequestError> {
        let mut errors = Vec::new();

        if non_blank(&self.requestor_ref).is_none() {
            errors.push(RequestError::MissingRequestorRef);
        }

        if self.subscription_refs.len() != 1 {
            errors.push(RequestError::SubscriptionRefCount(
                self.subscription_refs.len(),
            ));
        } else if non_blank(&self.subscription_refs[0]).is_none() {
            errors.push(RequestError::MissingSubscriptionRef);
        }

        errors
    }

    /// Name of the subscription to terminate, only meaningful for valid requests
    pub fn subscription_name(&self) -> Option<String> {
        self.subscription_refs
            .first()
            .map(|r| format!("{}-{}", self.requestor_ref.trim(), r.trim()))
    }
}

/// Acknowledgement of a [`TerminationRequest`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminationResponse {
    #[allow(missing_docs)]
    pub status: bool,
    #[allow(missing_docs)]
    #[serde(default)]
    pub errors: Vec<String>,
}
