//! Registered interest of a single subscriber

use super::event::EventKind;
use crate::library::helpers::normalize_refs;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use thiserror::Error;

/// Opaque, unique, and immutable identifier of a subscription
pub type SubscriptionIdentifier = String;

/// Kinds of events a subscription receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionType {
    /// Estimated timetables only
    Et,
    /// Situations only
    Sx,
    /// Every kind of event
    All,
}

impl SubscriptionType {
    /// Whether events of the given kind are delivered
    pub fn accepts(&self, kind: EventKind) -> bool {
        matches!(
            (self, kind),
            (SubscriptionType::All, _)
                | (SubscriptionType::Et, EventKind::Et)
                | (SubscriptionType::Sx, EventKind::Sx)
        )
    }
}

impl Default for SubscriptionType {
    fn default() -> Self {
        SubscriptionType::All
    }
}

impl fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscriptionType::Et => write!(f, "ET"),
            SubscriptionType::Sx => write!(f, "SX"),
            SubscriptionType::All => write!(f, "ALL"),
        }
    }
}

/// Reasons why a subscription is rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// Push address is missing or blank
    #[error("push address must not be blank")]
    BlankPushAddress,
    /// Only one of the from and to stop point sets is populated
    #[error("both from and to stop points are required when either is given")]
    MissingStopPoints,
    /// Neither stop points nor lines nor codespaces are given
    #[error("at least one line or codespace is required when no stop points are given")]
    NoInterest,
    /// Termination time lies in the past
    #[error("initial termination time {0} has already passed")]
    TerminationTimeInPast(DateTime<Utc>),
}

/// Registered interest in events together with the address they are pushed to
///
/// Two subscriptions are considered equal if they share the same `id`, regardless of
/// their remaining content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    /// Assigned by the store on creation, any value provided by clients is discarded
    #[serde(default)]
    pub id: SubscriptionIdentifier,
    /// Secondary identifier used to replace an existing subscription
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Base URL to which matching events are pushed
    #[serde(default)]
    pub push_address: String,
    /// Stop points at which a journey of interest departs
    #[serde(default)]
    pub from_stop_points: BTreeSet<String>,
    /// Stop points at which a journey of interest arrives
    #[serde(default)]
    pub to_stop_points: BTreeSet<String>,
    /// Lines of interest, only considered without stop points
    #[serde(default)]
    pub line_refs: BTreeSet<String>,
    /// Codespaces of interest, only considered without stop points
    #[serde(default)]
    pub codespaces: BTreeSet<String>,
    #[allow(missing_docs)]
    #[serde(default, rename = "type")]
    pub subscription_type: SubscriptionType,
    /// Consecutive pushes that have not been acknowledged
    #[serde(default)]
    pub failed_push_counter: u32,
    /// Interval in seconds at which the subscriber expects a sign of life
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heartbeat_interval: Option<u64>,
    /// Point in time after which the subscription is removed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_termination_time: Option<DateTime<Utc>>,
    /// Set when the subscription was created through the subscribe request protocol
    #[serde(default)]
    pub use_siri_subscription_model: bool,
}

impl Subscription {
    /// Whether the subscription expresses its interest through stop points
    pub fn has_stop_points(&self) -> bool {
        !self.from_stop_points.is_empty() || !self.to_stop_points.is_empty()
    }

    /// Union of from and to stop points
    pub fn stop_points(&self) -> BTreeSet<&str> {
        self.from_stop_points
            .iter()
            .chain(self.to_stop_points.iter())
            .map(String::as_str)
            .collect()
    }

    /// Whether the subscription receives events of the given kind
    pub fn accepts(&self, kind: EventKind) -> bool {
        self.subscription_type.accepts(kind)
    }

    /// Explicit name or a hash over the structural content of the subscription
    ///
    /// The hash covers the push address, the type, and all reference sets. It
    /// does not include the identifier, so two otherwise identical subscriptions
    /// share the same derived name.
    pub fn derived_name(&self) -> String {
        if let Some(name) = self.name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return name.to_owned();
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(self.push_address.trim().as_bytes());
        hasher.update([0u8]);
        hasher.update(self.subscription_type.to_string().as_bytes());

        for set in [
            &self.from_stop_points,
            &self.to_stop_points,
            &self.line_refs,
            &self.codespaces,
        ] {
            hasher.update([0u8]);
            for entry in set {
                hasher.update(entry.as_bytes());
                hasher.update([1u8]);
            }
        }

        format!("{:x}", hasher.finalize())
    }

    /// Trims every reference and drops blank ones
    pub fn normalize(&mut self) {
        self.push_address = self.push_address.trim().to_owned();
        self.from_stop_points = normalize_refs(&self.from_stop_points);
        self.to_stop_points = normalize_refs(&self.to_stop_points);
        self.line_refs = normalize_refs(&self.line_refs);
        self.codespaces = normalize_refs(&self.codespaces);
        self.name = self
            .name
            .take()
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
    }

    /// Normalizes the subscription and verifies that it can be stored
    pub fn validate(&mut self, now: DateTime<Utc>) -> Result<(), SubscriptionError> {
        self.normalize();

        if self.push_address.is_empty() {
            return Err(SubscriptionError::BlankPushAddress);
        }

        let has_from = !self.from_stop_points.is_empty();
        let has_to = !self.to_stop_points.is_empty();

        if has_from != has_to {
            return Err(SubscriptionError::MissingStopPoints);
        }

        if !has_from && self.line_refs.is_empty() && self.codespaces.is_empty() {
            return Err(SubscriptionError::NoInterest);
        }

        if let Some(termination) = self.initial_termination_time {
            if termination < now {
                return Err(SubscriptionError::TerminationTimeInPast(termination));
            }
        }

        Ok(())
    }

    /// Whether the termination time has been reached
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.initial_termination_time, Some(t) if t <= now)
    }
}

impl PartialEq for Subscription {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscription {}

impl Hash for Subscription {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod does {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn directional() -> Subscription {
        Subscription {
            push_address: "http://localhost/push".into(),
            from_stop_points: set(&["A"]),
            to_stop_points: set(&["B"]),
            ..Default::default()
        }
    }

    #[test]
    fn compare_by_id_only() {
        let mut a = directional();
        let mut b = directional();
        a.id = "1".into();
        b.id = "1".into();
        b.push_address = "http://elsewhere".into();

        assert_eq!(a, b);

        b.id = "2".into();
        assert_ne!(a, b);
    }

    #[test]
    fn derive_equal_names_for_equal_content() {
        let mut a = directional();
        let b = directional();
        a.id = "something else".into();

        assert_eq!(a.derived_name(), b.derived_name());
    }

    #[test]
    fn derive_different_names_for_different_content() {
        let a = directional();
        let mut b = directional();
        b.subscription_type = SubscriptionType::Et;

        assert_ne!(a.derived_name(), b.derived_name());
    }

    #[test]
    fn prefer_explicit_name() {
        let mut subscription = directional();
        subscription.name = Some(" named ".into());

        assert_eq!(subscription.derived_name(), "named");
    }

    #[test]
    fn reject_blank_push_address() {
        let mut subscription = directional();
        subscription.push_address = "   ".into();

        assert_eq!(
            subscription.validate(Utc::now()),
            Err(SubscriptionError::BlankPushAddress)
        );
    }

    #[test]
    fn reject_one_sided_stop_points() {
        let mut subscription = directional();
        subscription.to_stop_points = set(&["  ", ""]);

        assert_eq!(
            subscription.validate(Utc::now()),
            Err(SubscriptionError::MissingStopPoints)
        );
    }

    #[test]
    fn reject_missing_interest() {
        let mut subscription = Subscription {
            push_address: "http://localhost".into(),
            line_refs: set(&[" "]),
            ..Default::default()
        };

        assert_eq!(
            subscription.validate(Utc::now()),
            Err(SubscriptionError::NoInterest)
        );
    }

    #[test]
    fn reject_past_termination_time() {
        let now = Utc::now();
        let mut subscription = directional();
        subscription.initial_termination_time = Some(now - Duration::seconds(1));

        assert!(matches!(
            subscription.validate(now),
            Err(SubscriptionError::TerminationTimeInPast(_))
        ));
    }

    #[test]
    fn accept_line_interest_and_normalize() {
        let mut subscription = Subscription {
            push_address: " http://localhost ".into(),
            line_refs: set(&[" L1 ", ""]),
            ..Default::default()
        };

        assert_eq!(subscription.validate(Utc::now()), Ok(()));
        assert_eq!(subscription.push_address, "http://localhost");
        assert_eq!(subscription.line_refs, set(&["L1"]));
    }

    #[test]
    fn filter_event_kinds_by_type() {
        assert!(SubscriptionType::All.accepts(EventKind::Et));
        assert!(SubscriptionType::All.accepts(EventKind::Sx));
        assert!(SubscriptionType::Et.accepts(EventKind::Et));
        assert!(!SubscriptionType::Et.accepts(EventKind::Sx));
        assert!(!SubscriptionType::Sx.accepts(EventKind::Et));
    }

    #[test]
    fn parse_client_json() {
        let subscription: Subscription = serde_json::from_str(
            r#"{
                "pushAddress": "http://localhost",
                "fromStopPoints": ["A"],
                "toStopPoints": ["B"],
                "type": "ET"
            }"#,
        )
        .unwrap();

        assert_eq!(subscription.subscription_type, SubscriptionType::Et);
        assert_eq!(subscription.failed_push_counter, 0);
        assert_eq!(subscription.stop_points().len(), 2);
    }
}
