use serde::Serialize;
use std::collections::HashSet;

use crate::search_data::{Catalog, ServiceId, StopId, Trip};
use crate::time::Time;

/// Where a vehicle is along its trip at one instant: stationary at a stop
/// between its scheduled arrival and departure, or underway between two
/// consecutive stops with a progress fraction
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum TripState {
    #[serde(rename_all = "camelCase")]
    Dwell {
        stop_id: StopId,
        next_departure: Time,
    },
    #[serde(rename_all = "camelCase")]
    Move {
        from_stop: StopId,
        to_stop: StopId,
        /// 0 at the departure second, 1 at the arrival second
        progress: f64,
    },
}

/// Every trip in service at the instant, with its state. A trip is live for
/// the closed interval from its first departure to its last arrival.
pub fn active_trip_states<'r>(
    data: &'r Catalog,
    services: &HashSet<ServiceId>,
    at: Time,
) -> Vec<(&'r Trip, TripState)> {
    let mut live = Vec::new();
    for trip in data.trips() {
        if !services.contains(&trip.service_id) {
            continue;
        }
        let (first, last) = match (trip.stop_times.first(), trip.stop_times.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => continue,
        };
        if at < first.departure_time || last.arrival_time < at {
            continue;
        }
        if let Some(state) = trip_state_at(trip, at) {
            live.push((trip, state));
        }
    }
    live
}

/// The state of one trip at an instant, None outside its span.
///
/// Boundary seconds: `t == arrival` at a stop closes the Move into it
/// (progress 1); the dwell interval at an intermediate stop is
/// `(arrival, departure]`. Together the intervals cover every second of the
/// span with no gaps.
pub fn trip_state_at(trip: &Trip, at: Time) -> Option<TripState> {
    let stop_times = &trip.stop_times;
    let first = stop_times.first()?;
    if at < first.arrival_time {
        return None;
    }
    if at <= first.departure_time {
        return Some(TripState::Dwell {
            stop_id: first.stop_id.clone(),
            next_departure: first.departure_time,
        });
    }
    for pair in stop_times.windows(2) {
        let (prev, current) = (&pair[0], &pair[1]);
        if at <= current.arrival_time {
            let span = (current.arrival_time - prev.departure_time).as_secs();
            let progress = if span <= 0 {
                1.0
            } else {
                (at - prev.departure_time).as_secs() as f64 / span as f64
            };
            return Some(TripState::Move {
                from_stop: prev.stop_id.clone(),
                to_stop: current.stop_id.clone(),
                progress,
            });
        }
        if at <= current.departure_time {
            return Some(TripState::Dwell {
                stop_id: current.stop_id.clone(),
                next_departure: current.departure_time,
            });
        }
    }
    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::search_data::{Catalog, Route};

    fn time(s: &str) -> Time {
        s.parse().unwrap()
    }

    /// s1 arr 08:00 dep 08:01, s2 arr 08:05 dep 08:07, s3 arr 08:12 dep 08:12
    fn catalog() -> Catalog {
        let mut builder = Catalog::builder();
        builder.add_route(Route {
            route_id: "r1".into(),
            route_short_name: "1".into(),
            route_long_name: String::new(),
            route_color: "000000".into(),
            route_text_color: "FFFFFF".into(),
        });
        for id in &["s1", "s2", "s3"] {
            builder.add_stop(
                (*id).to_owned(),
                (*id).to_owned(),
                geo::Point::new(0.0, 0.0),
                None,
                false,
            );
        }
        builder.add_trip("t1".into(), "r1".into(), "svc".into(), None);
        builder.add_stop_time("t1", 1, time("08:00:00"), time("08:01:00"), "s1".into());
        builder.add_stop_time("t1", 2, time("08:05:00"), time("08:07:00"), "s2".into());
        builder.add_stop_time("t1", 3, time("08:12:00"), time("08:12:00"), "s3".into());
        builder.build()
    }

    fn state_at(data: &Catalog, s: &str) -> Option<TripState> {
        trip_state_at(data.trip_by_id("t1").unwrap(), time(s))
    }

    #[test]
    fn dwelling_at_the_first_stop() {
        let data = catalog();
        match state_at(&data, "08:00:30") {
            Some(TripState::Dwell {
                stop_id,
                next_departure,
            }) => {
                assert_eq!(stop_id, "s1");
                assert_eq!(next_departure, time("08:01:00"));
            }
            other => panic!("expected dwell at s1, got {:?}", other),
        }
    }

    #[test]
    fn moving_between_stops_with_progress() {
        let data = catalog();
        match state_at(&data, "08:03:00") {
            Some(TripState::Move {
                from_stop,
                to_stop,
                progress,
            }) => {
                assert_eq!(from_stop, "s1");
                assert_eq!(to_stop, "s2");
                // 120s into a 240s hop
                assert!((progress - 0.5).abs() < 1e-9);
            }
            other => panic!("expected move s1->s2, got {:?}", other),
        }
    }

    #[test]
    fn arrival_second_closes_the_move() {
        let data = catalog();
        match state_at(&data, "08:05:00") {
            Some(TripState::Move { to_stop, progress, .. }) => {
                assert_eq!(to_stop, "s2");
                assert!((progress - 1.0).abs() < 1e-9);
            }
            other => panic!("expected move arriving at s2, got {:?}", other),
        }
        // one second later the vehicle dwells
        match state_at(&data, "08:05:01") {
            Some(TripState::Dwell { stop_id, .. }) => assert_eq!(stop_id, "s2"),
            other => panic!("expected dwell at s2, got {:?}", other),
        }
    }

    #[test]
    fn departure_second_still_dwells_and_the_next_second_moves() {
        let data = catalog();
        match state_at(&data, "08:07:00") {
            Some(TripState::Dwell { stop_id, .. }) => assert_eq!(stop_id, "s2"),
            other => panic!("expected dwell at s2, got {:?}", other),
        }
        match state_at(&data, "08:07:01") {
            Some(TripState::Move {
                from_stop, to_stop, ..
            }) => {
                assert_eq!(from_stop, "s2");
                assert_eq!(to_stop, "s3");
            }
            other => panic!("expected move s2->s3, got {:?}", other),
        }
    }

    #[test]
    fn every_second_of_the_span_has_a_state() {
        let data = catalog();
        let trip = data.trip_by_id("t1").unwrap();
        let first_departure = trip.stop_times.first().unwrap().departure_time.seconds();
        let last_arrival = trip.stop_times.last().unwrap().arrival_time.seconds();
        for second in first_departure..=last_arrival {
            assert!(
                trip_state_at(trip, Time::from_seconds(second)).is_some(),
                "no state at {}",
                Time::from_seconds(second)
            );
        }
    }

    #[test]
    fn liveness_window_is_closed() {
        let data = catalog();
        let services: HashSet<ServiceId> = vec!["svc".to_owned()].into_iter().collect();
        assert_eq!(active_trip_states(&data, &services, time("08:01:00")).len(), 1);
        assert_eq!(active_trip_states(&data, &services, time("08:12:00")).len(), 1);
        assert!(active_trip_states(&data, &services, time("08:12:01")).is_empty());
        assert!(active_trip_states(&data, &services, time("08:00:59")).is_empty());
    }

    #[test]
    fn inactive_services_are_not_live() {
        let data = catalog();
        let services: HashSet<ServiceId> = vec!["other".to_owned()].into_iter().collect();
        assert!(active_trip_states(&data, &services, time("08:03:00")).is_empty());
    }
}
