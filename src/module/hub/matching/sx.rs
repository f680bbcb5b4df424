use super::{departs_before_arrival, Matches, MatchingEngine};
use crate::domain::event::sx::PtSituationElement;
use crate::domain::event::EventKind;
use crate::library::storage::KeyValueStore;
use crate::library::BoxedError;

impl<S: KeyValueStore> MatchingEngine<S> {
    /// Subscriptions interested in a situation
    ///
    /// Affected stop points and stop places match every subscription listening to them
    /// regardless of direction. Routes of affected vehicle journeys are checked for the
    /// direction of travel unless they only list the affected subset of their stops, in
    /// which case the order carries no meaning and every candidate matches.
    pub async fn match_situation(&self, situation: &PtSituationElement) -> Result<Matches, BoxedError> {
        let mut matches = Matches::default();

        if let Some(affects) = &situation.affects {
            let stops = affects
                .stop_points
                .iter()
                .filter_map(|s| s.stop_point())
                .chain(affects.stop_places.iter().filter_map(|s| s.stop_place()));

            for stop in stops {
                matches.extend(self.index.subscriptions_for_stop(stop, EventKind::Sx).await?);
            }

            for route in affects.vehicle_journeys.iter().flat_map(|j| j.routes.iter()) {
                let sequence = route.stop_sequence();
                let candidates = self.candidates_along(&sequence, EventKind::Sx).await?;

                if route.is_affected_only() {
                    matches.extend(candidates);
                } else {
                    matches.extend(
                        candidates
                            .into_iter()
                            .filter(|c| departs_before_arrival(&sequence, c)),
                    );
                }
            }
        }

        self.match_line_interest(
            &mut matches,
            situation.declared_lines(),
            situation.codespace(),
            EventKind::Sx,
        )
        .await?;

        Ok(matches)
    }
}
