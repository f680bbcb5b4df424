//! Real-time events received from upstream feeds
//!
//! The structures mirror the subset of the SIRI profile the hub works with.
//! Estimated timetables ([`et`]) describe predictions for the calls of a single
//! vehicle journey, situations ([`sx`]) describe disruptions affecting stops,
//! lines, or journeys. Both are exchanged as camel-cased JSON.

mod value;

pub mod et;
pub mod sx;

pub use value::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of event a subscription may receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    /// Estimated timetable
    Et,
    /// Situation exchange
    Sx,
}

impl EventKind {
    /// Path appended to the push address of a subscriber
    pub fn push_suffix(&self) -> &'static str {
        match self {
            EventKind::Et => "et",
            EventKind::Sx => "sx",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Et => write!(f, "ET"),
            EventKind::Sx => write!(f, "SX"),
        }
    }
}

/// Any event which can be matched and pushed
///
/// Serializes to the contained event without any wrapping.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TransitEvent {
    /// Estimated timetable of a vehicle journey
    EstimatedTimetable(et::EstimatedVehicleJourney),
    /// Disruption
    Situation(sx::PtSituationElement),
}

impl TransitEvent {
    /// Kind of the contained event
    pub fn kind(&self) -> EventKind {
        match self {
            TransitEvent::EstimatedTimetable(_) => EventKind::Et,
            TransitEvent::Situation(_) => EventKind::Sx,
        }
    }
}

impl From<et::EstimatedVehicleJourney> for TransitEvent {
    fn from(journey: et::EstimatedVehicleJourney) -> Self {
        TransitEvent::EstimatedTimetable(journey)
    }
}

impl From<sx::PtSituationElement> for TransitEvent {
    fn from(situation: sx::PtSituationElement) -> Self {
        TransitEvent::Situation(situation)
    }
}
