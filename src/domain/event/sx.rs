//! Situation exchange structures

use super::{
    value_of, ConnectionLinkRef, DatedVehicleJourneyRef, LineRef, LinkRef, ParticipantRef,
    SectionRef, SituationNumber, StopPlaceRef, StopPointRef,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Disruption or incident published by a participant
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtSituationElement {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_time: Option<DateTime<Utc>>,
    /// Codespace of the publishing participant
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_ref: Option<ParticipantRef>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situation_number: Option<SituationNumber>,
    /// Short, human readable descriptions
    #[serde(default)]
    pub summaries: Vec<String>,
    /// Detailed, human readable descriptions
    #[serde(default)]
    pub descriptions: Vec<String>,
    /// Periods during which the situation applies
    #[serde(default)]
    pub validity_periods: Vec<ValidityPeriod>,
    /// Everything affected by the situation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affects: Option<Affects>,
}

impl PtSituationElement {
    /// Codespace of the situation as given by its participant
    pub fn codespace(&self) -> Option<&str> {
        value_of(&self.participant_ref)
    }

    /// Lines declared as affected either network-wide or through a vehicle journey
    pub fn declared_lines(&self) -> BTreeSet<&str> {
        let mut lines = BTreeSet::new();

        if let Some(affects) = &self.affects {
            let network_lines = affects
                .networks
                .iter()
                .flat_map(|n| n.affected_lines.iter())
                .filter_map(|l| value_of(&l.line_ref));

            let journey_lines = affects
                .vehicle_journeys
                .iter()
                .filter_map(|j| value_of(&j.line_ref));

            lines.extend(network_lines);
            lines.extend(journey_lines);
        }

        lines
    }
}

/// Time span with optional bounds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidityPeriod {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

/// Components affected by a situation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affects {
    #[allow(missing_docs)]
    #[serde(default)]
    pub networks: Vec<AffectedNetwork>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub stop_points: Vec<AffectedStopPoint>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub stop_places: Vec<AffectedStopPlace>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub vehicle_journeys: Vec<AffectedVehicleJourney>,
}

/// Network in which lines are affected as a whole
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedNetwork {
    #[allow(missing_docs)]
    #[serde(default)]
    pub affected_lines: Vec<AffectedLine>,
}

/// Line affected as a whole
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedLine {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_ref: Option<LineRef>,
}

/// Affected boarding point
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedStopPoint {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_point_ref: Option<StopPointRef>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_point_name: Option<String>,
    /// Not part of the supported profile, never forwarded
    #[serde(default)]
    pub connection_links: Vec<AffectedConnectionLink>,
}

impl AffectedStopPoint {
    /// Stop point reference of the entry
    pub fn stop_point(&self) -> Option<&str> {
        value_of(&self.stop_point_ref)
    }
}

/// Connection between two boarding points
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedConnectionLink {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_link_ref: Option<ConnectionLinkRef>,
}

/// Affected stop place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedStopPlace {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_place_ref: Option<StopPlaceRef>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
}

impl AffectedStopPlace {
    /// Stop place reference of the entry
    pub fn stop_place(&self) -> Option<&str> {
        value_of(&self.stop_place_ref)
    }
}

/// Affected vehicle journey and the routes it takes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedVehicleJourney {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_ref: Option<LineRef>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dated_vehicle_journey_ref: Option<DatedVehicleJourneyRef>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub routes: Vec<AffectedRoute>,
    /// Not part of the supported profile, never forwarded
    #[serde(default)]
    pub calls: Vec<AffectedCall>,
}

/// Call of an affected vehicle journey
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedCall {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_point_ref: Option<StopPointRef>,
}

/// Route of an affected vehicle journey
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedRoute {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_points: Option<AffectedRouteStopPoints>,
    /// Not part of the supported profile, never forwarded
    #[serde(default)]
    pub sections: Vec<AffectedSection>,
}

impl AffectedRoute {
    /// Stop points of the route in order, link projections are skipped
    pub fn stop_sequence(&self) -> Vec<&str> {
        self.stop_points
            .iter()
            .flat_map(|s| s.entries.iter())
            .filter_map(RouteEntry::stop_point)
            .collect()
    }

    /// Whether the route only enumerates the affected subset of its stops
    ///
    /// When set, the order of the listed stops can not be used to determine a direction.
    pub fn is_affected_only(&self) -> bool {
        self.stop_points
            .as_ref()
            .and_then(|s| s.affected_only)
            .unwrap_or(false)
    }
}

/// Ordered stop list of a route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedRouteStopPoints {
    /// Set if only the affected stops are listed instead of the full sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affected_only: Option<bool>,
    #[allow(missing_docs)]
    #[serde(default)]
    pub entries: Vec<RouteEntry>,
}

/// Element of a route's stop list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteEntry {
    /// Boarding point on the route
    StopPoint(AffectedStopPoint),
    /// Geometry between two stops
    LinkProjection(LinkProjection),
}

impl RouteEntry {
    /// Stop point reference if this entry is a stop point
    pub fn stop_point(&self) -> Option<&str> {
        match self {
            RouteEntry::StopPoint(stop) => stop.stop_point(),
            RouteEntry::LinkProjection(_) => None,
        }
    }
}

/// Projection of a route onto a link
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkProjection {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_ref: Option<LinkRef>,
}

/// Section of a route
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedSection {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_ref: Option<SectionRef>,
}
