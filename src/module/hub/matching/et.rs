use super::{departs_before_arrival, Matches, MatchingEngine};
use crate::domain::event::et::EstimatedVehicleJourney;
use crate::domain::event::EventKind;
use crate::library::storage::KeyValueStore;
use crate::library::BoxedError;
use tracing::trace;

impl<S: KeyValueStore> MatchingEngine<S> {
    /// Subscriptions interested in an estimated timetable
    ///
    /// Recorded calls are visited before estimated calls when checking the direction
    /// of travel.
    pub async fn match_journey(&self, journey: &EstimatedVehicleJourney) -> Result<Matches, BoxedError> {
        let sequence = journey.stop_sequence();
        let mut matches = Matches::default();

        for candidate in self.candidates_along(&sequence, EventKind::Et).await? {
            if departs_before_arrival(&sequence, &candidate) {
                matches.insert(candidate);
            } else {
                trace!(id = candidate.id.as_str(), "Journey runs against subscribed direction");
            }
        }

        self.match_line_interest(
            &mut matches,
            journey.line(),
            journey.codespace(),
            EventKind::Et,
        )
        .await?;

        Ok(matches)
    }
}

#[cfg(test)]
mod does {
    use super::super::fixtures::*;
    use super::*;
    use crate::domain::event::et::{EstimatedCall, RecordedCall};
    use crate::domain::SubscriptionType;
    use pretty_assertions::assert_eq;

    fn journey(recorded: &[&str], estimated: &[&str]) -> EstimatedVehicleJourney {
        EstimatedVehicleJourney {
            line_ref: Some("RUT:Line:1".into()),
            data_source: Some("RUT".into()),
            recorded_calls: recorded
                .iter()
                .map(|s| RecordedCall {
                    stop_point_ref: Some((*s).into()),
                    ..Default::default()
                })
                .collect(),
            estimated_calls: estimated
                .iter()
                .map(|s| EstimatedCall {
                    stop_point_ref: Some((*s).into()),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn match_in_direction_of_travel() {
        let (store, ids) = populated(vec![
            directional("s1", &["NSR:StopPlace:2"], &["NSR:StopPlace:3"]),
            directional("reverse", &["NSR:StopPlace:3"], &["NSR:StopPlace:2"]),
        ])
        .await;
        let engine = MatchingEngine::new(store.index().clone());

        let forward = journey(&[], &["NSR:StopPlace:2", "NSR:StopPlace:3", "NSR:StopPlace:4"]);
        let backward = journey(&[], &["NSR:StopPlace:4", "NSR:StopPlace:3", "NSR:StopPlace:2"]);

        let forward_matches = engine.match_journey(&forward).await.unwrap();
        let backward_matches = engine.match_journey(&backward).await.unwrap();

        assert_eq!(names(&ids, &forward_matches), vec!["s1"]);
        assert_eq!(names(&ids, &backward_matches), vec!["reverse"]);
    }

    #[tokio::test]
    async fn visit_recorded_calls_first() {
        let (store, ids) = populated(vec![directional("s1", &["A"], &["B"])]).await;
        let engine = MatchingEngine::new(store.index().clone());

        let matches = engine.match_journey(&journey(&["A"], &["B"])).await.unwrap();

        assert_eq!(names(&ids, &matches), vec!["s1"]);
    }

    #[tokio::test]
    async fn match_line_and_codespace_interest() {
        let (store, ids) = populated(vec![
            line_interest("line", &["RUT:Line:1"], &[]),
            line_interest("codespace", &[], &["RUT"]),
            line_interest("other", &["RUT:Line:2"], &["ATB"]),
        ])
        .await;
        let engine = MatchingEngine::new(store.index().clone());

        let matches = engine.match_journey(&journey(&[], &["X"])).await.unwrap();

        assert_eq!(names(&ids, &matches), vec!["codespace", "line"]);
    }

    #[tokio::test]
    async fn ignore_situation_only_subscriptions() {
        let (store, _) = populated(vec![typed(
            directional("s1", &["A"], &["B"]),
            SubscriptionType::Sx,
        )])
        .await;
        let engine = MatchingEngine::new(store.index().clone());

        let matches = engine.match_journey(&journey(&[], &["A", "B"])).await.unwrap();

        assert!(matches.is_empty());
    }

    #[tokio::test]
    async fn list_each_subscription_once() {
        let (store, ids) = populated(vec![directional("s1", &["A", "B"], &["C", "D"])]).await;
        let engine = MatchingEngine::new(store.index().clone());

        let matches = engine
            .match_journey(&journey(&["A"], &["B", "C", "D", "A"]))
            .await
            .unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(names(&ids, &matches), vec!["s1"]);
    }
}
