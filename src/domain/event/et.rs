//! Estimated timetable structures

use super::{
    value_of, DataSource, DatedVehicleJourneyRef, LineRef, OperatorRef, StopPointRef,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Call of a vehicle journey at a stop point
pub trait StopCall {
    /// Stop point at which the call takes place
    fn stop_point(&self) -> Option<&str>;
}

/// Predictions for all calls of a single vehicle journey
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedVehicleJourney {
    /// Line the journey belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_ref: Option<LineRef>,
    /// Codespace of the producing data source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,
    /// Operator running the journey
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator_ref: Option<OperatorRef>,
    /// Journey the predictions are made for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dated_vehicle_journey_ref: Option<DatedVehicleJourneyRef>,
    /// Whether the calls enumerate every stop of the journey
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_complete_stop_sequence: Option<bool>,
    /// Calls that already took place, in journey order
    #[serde(default)]
    pub recorded_calls: Vec<RecordedCall>,
    /// Upcoming calls, in journey order
    #[serde(default)]
    pub estimated_calls: Vec<EstimatedCall>,
}

impl EstimatedVehicleJourney {
    /// Line reference of the journey
    pub fn line(&self) -> Option<&str> {
        value_of(&self.line_ref)
    }

    /// Codespace of the journey as given by its data source
    pub fn codespace(&self) -> Option<&str> {
        value_of(&self.data_source)
    }

    /// Stop points of all recorded calls followed by those of all estimated calls
    ///
    /// Calls without a stop point are skipped, repeated stops are retained.
    pub fn stop_sequence(&self) -> Vec<&str> {
        let recorded = self.recorded_calls.iter().filter_map(StopCall::stop_point);
        let estimated = self.estimated_calls.iter().filter_map(StopCall::stop_point);

        recorded.chain(estimated).collect()
    }
}

/// Call that has already taken place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedCall {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_point_ref: Option<StopPointRef>,
    /// Position of the call within the journey
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aimed_arrival_time: Option<DateTime<Utc>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_arrival_time: Option<DateTime<Utc>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aimed_departure_time: Option<DateTime<Utc>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_departure_time: Option<DateTime<Utc>>,
}

impl StopCall for RecordedCall {
    fn stop_point(&self) -> Option<&str> {
        value_of(&self.stop_point_ref)
    }
}

/// Call that is yet to take place
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimatedCall {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_point_ref: Option<StopPointRef>,
    /// Position of the call within the journey
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,
    /// Whether the vehicle will skip this stop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancellation: Option<bool>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aimed_arrival_time: Option<DateTime<Utc>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_arrival_time: Option<DateTime<Utc>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aimed_departure_time: Option<DateTime<Utc>>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_departure_time: Option<DateTime<Utc>>,
}

impl StopCall for EstimatedCall {
    fn stop_point(&self) -> Option<&str> {
        value_of(&self.stop_point_ref)
    }
}
