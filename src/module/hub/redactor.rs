//! Trims events down to the parts a subscription is interested in

use crate::domain::event::et::{EstimatedVehicleJourney, StopCall};
use crate::domain::event::sx::{AffectedRoute, PtSituationElement, RouteEntry};
use crate::domain::event::TransitEvent;
use crate::domain::Subscription;
use std::collections::BTreeSet;

/// Private copy of the event containing only what is relevant to the subscription
///
/// Subscriptions without stop points receive every stop. Fields outside the
/// supported situation profile are always removed.
pub fn redact(event: &TransitEvent, subscription: &Subscription) -> TransitEvent {
    match event {
        TransitEvent::EstimatedTimetable(journey) => redact_journey(journey, subscription).into(),
        TransitEvent::Situation(situation) => redact_situation(situation, subscription).into(),
    }
}

/// Removes calls at stops the subscription does not listen to
pub fn redact_journey(
    journey: &EstimatedVehicleJourney,
    subscription: &Subscription,
) -> EstimatedVehicleJourney {
    let mut journey = journey.clone();

    if !subscription.has_stop_points() {
        return journey;
    }

    let stops = subscription.stop_points();
    let keep = |call: &dyn StopCall| matches!(call.stop_point(), Some(s) if stops.contains(s));

    journey.recorded_calls.retain(|c| keep(c));
    journey.estimated_calls.retain(|c| keep(c));
    journey.is_complete_stop_sequence = None;

    journey
}

/// Removes affected stops, routes, and journeys the subscription does not listen to
pub fn redact_situation(
    situation: &PtSituationElement,
    subscription: &Subscription,
) -> PtSituationElement {
    let mut situation = situation.clone();
    let stops = if subscription.has_stop_points() {
        Some(subscription.stop_points())
    } else {
        None
    };

    if let Some(affects) = situation.affects.as_mut() {
        for stop_point in affects.stop_points.iter_mut() {
            stop_point.connection_links.clear();
        }

        for journey in affects.vehicle_journeys.iter_mut() {
            journey.calls.clear();

            for route in journey.routes.iter_mut() {
                route.sections.clear();

                for entry in route.stop_points.iter_mut().flat_map(|s| s.entries.iter_mut()) {
                    if let RouteEntry::StopPoint(stop_point) = entry {
                        stop_point.connection_links.clear();
                    }
                }
            }
        }

        if let Some(stops) = stops {
            affects
                .stop_points
                .retain(|s| matches!(s.stop_point(), Some(r) if stops.contains(r)));
            affects
                .stop_places
                .retain(|s| matches!(s.stop_place(), Some(r) if stops.contains(r)));

            affects.vehicle_journeys.retain_mut(|journey| {
                if journey.routes.is_empty() {
                    return true;
                }

                journey.routes.retain_mut(|route| retain_route_stops(route, &stops));
                !journey.routes.is_empty()
            });
        }
    }

    situation
}

/// Keeps only listed stop points, returns whether any remain
fn retain_route_stops(route: &mut AffectedRoute, stops: &BTreeSet<&str>) -> bool {
    match route.stop_points.as_mut() {
        Some(stop_points) => {
            stop_points
                .entries
                .retain(|e| matches!(e.stop_point(), Some(s) if stops.contains(s)));
            !stop_points.entries.is_empty()
        }
        None => false,
    }
}
