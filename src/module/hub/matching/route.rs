use crate::domain::Subscription;

/// Whether one of the subscription's from stops occurs strictly before one of its to stops
///
/// Stops may repeat in the sequence. A stop contained in both sets only matches if it
/// occurs twice.
pub fn departs_before_arrival(sequence: &[&str], subscription: &Subscription) -> bool {
    let mut departed = false;

    for stop in sequence {
        if departed && subscription.to_stop_points.contains(*stop) {
            return true;
        }

        if subscription.from_stop_points.contains(*stop) {
            departed = true;
        }
    }

    false
}

#[cfg(test)]
mod does {
    use super::*;

    fn subscription(from: &[&str], to: &[&str]) -> Subscription {
        Subscription {
            from_stop_points: from.iter().map(|s| s.to_string()).collect(),
            to_stop_points: to.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn match_ordered_stops() {
        let s1 = subscription(&["2"], &["3"]);

        assert!(departs_before_arrival(&["2", "3", "4"], &s1));
        assert!(!departs_before_arrival(&["4", "3", "2"], &s1));
    }

    #[test]
    fn accept_any_pair_of_stops() {
        let subscription = subscription(&["X", "2"], &["Y", "4"]);

        assert!(departs_before_arrival(&["1", "2", "3", "4"], &subscription));
    }

    #[test]
    fn require_distinct_positions() {
        let subscription = subscription(&["2"], &["2"]);

        assert!(!departs_before_arrival(&["1", "2", "3"], &subscription));
        assert!(departs_before_arrival(&["2", "3", "2"], &subscription));
    }

    #[test]
    fn reject_partial_matches() {
        let subscription = subscription(&["2"], &["9"]);

        assert!(!departs_before_arrival(&["2", "3"], &subscription));
        assert!(!departs_before_arrival(&[], &subscription));
    }
}
