use geo::algorithm::bearing::Bearing;
use geo::algorithm::haversine_distance::HaversineDistance;
use serde::Serialize;

use crate::search_data::{Catalog, LineGeometry, Trip};
use crate::trip_state::TripState;

/// An interpolated vehicle position for the map layer
#[derive(Debug, Clone, Copy, Serialize)]
pub struct VehiclePosition {
    pub lat: f64,
    pub lon: f64,
    /// forward azimuth in degrees, clockwise from north
    pub bearing: f64,
}

/// Project a trip state onto geographic coordinates.
///
/// A dwelling vehicle sits on its stop. A moving vehicle is placed along the
/// route's line geometry by arc length when one is known, otherwise on the
/// straight line between the two stops. Returns None when a referenced stop
/// is unknown to the catalog.
pub fn position_of(data: &Catalog, trip: &Trip, state: &TripState) -> Option<VehiclePosition> {
    match state {
        TripState::Dwell { stop_id, .. } => {
            let stop = data.stop_by_id(stop_id)?;
            let bearing = next_stop_bearing(data, trip, stop_id).unwrap_or(0.0);
            Some(VehiclePosition {
                lat: stop.location.y(),
                lon: stop.location.x(),
                bearing,
            })
        }
        TripState::Move {
            from_stop,
            to_stop,
            progress,
        } => {
            let from = data.stop_by_id(from_stop)?.location;
            let to = data.stop_by_id(to_stop)?.location;
            let point = data
                .geometry_for_route(&trip.route_id)
                .and_then(|geometry| along_geometry(geometry, from, to, *progress))
                .unwrap_or_else(|| lerp(from, to, *progress));
            Some(VehiclePosition {
                lat: point.y(),
                lon: point.x(),
                bearing: from.bearing(to),
            })
        }
    }
}

/// While dwelling, face the next stop of the trip if there is one
fn next_stop_bearing(data: &Catalog, trip: &Trip, stop_id: &str) -> Option<f64> {
    let index = trip
        .stop_times
        .iter()
        .position(|stop_time| stop_time.stop_id == stop_id)?;
    let next = trip.stop_times.get(index + 1)?;
    let here = data.stop_by_id(stop_id)?.location;
    let there = data.stop_by_id(&next.stop_id)?.location;
    Some(here.bearing(there))
}

/// Interpolate at `progress` of the arc length along the geometry between
/// the vertices nearest to the two stops. The stop coordinates themselves
/// anchor the ends of the arc, so progress 0 and 1 land on the stops.
/// Returns None for degenerate slices, which callers fall back from.
fn along_geometry(
    geometry: &LineGeometry,
    from: geo::Point<f64>,
    to: geo::Point<f64>,
    progress: f64,
) -> Option<geo::Point<f64>> {
    let points = &geometry.points;
    if points.len() < 2 {
        return None;
    }
    let from_index = nearest_vertex(points, from)?;
    let to_index = nearest_vertex(points, to)?;
    if from_index == to_index {
        return None;
    }

    let mut path = Vec::with_capacity(from_index.max(to_index) - from_index.min(to_index) + 3);
    path.push(from);
    if from_index < to_index {
        path.extend_from_slice(&points[from_index..=to_index]);
    } else {
        path.extend(points[to_index..=from_index].iter().rev());
    }
    path.push(to);

    let segment_lengths: Vec<f64> = path
        .windows(2)
        .map(|pair| pair[0].haversine_distance(&pair[1]))
        .collect();
    let total: f64 = segment_lengths.iter().sum();
    if total <= 0.0 {
        return None;
    }

    let target = progress.max(0.0).min(1.0) * total;
    let mut travelled = 0.0;
    for (pair, length) in path.windows(2).zip(&segment_lengths) {
        if travelled + length >= target && *length > 0.0 {
            let fraction = (target - travelled) / length;
            return Some(lerp(pair[0], pair[1], fraction));
        }
        travelled += length;
    }
    Some(*path.last().expect("path has at least two points"))
}

fn nearest_vertex(points: &[geo::Point<f64>], to: geo::Point<f64>) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            a.haversine_distance(&to)
                .partial_cmp(&b.haversine_distance(&to))
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(index, _)| index)
}

fn lerp(a: geo::Point<f64>, b: geo::Point<f64>, fraction: f64) -> geo::Point<f64> {
    geo::Point::new(
        a.x() + (b.x() - a.x()) * fraction,
        a.y() + (b.y() - a.y()) * fraction,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::search_data::{Catalog, LineGeometry, Route};
    use crate::time::Time;

    fn time(s: &str) -> Time {
        s.parse().unwrap()
    }

    fn builder_with_trip(geometry: Option<Vec<(f64, f64)>>) -> Catalog {
        let mut builder = Catalog::builder();
        builder.add_route(Route {
            route_id: "r1".into(),
            route_short_name: "1".into(),
            route_long_name: String::new(),
            route_color: "000000".into(),
            route_text_color: "FFFFFF".into(),
        });
        builder.add_stop("a".into(), "A".into(), geo::Point::new(0.0, 0.0), None, false);
        builder.add_stop("b".into(), "B".into(), geo::Point::new(0.01, 0.0), None, false);
        builder.add_trip("t1".into(), "r1".into(), "svc".into(), None);
        builder.add_stop_time("t1", 1, time("08:00:00"), time("08:00:00"), "a".into());
        builder.add_stop_time("t1", 2, time("08:10:00"), time("08:10:00"), "b".into());
        if let Some(points) = geometry {
            builder.add_geometry(LineGeometry {
                route_id: "r1".into(),
                points: points
                    .into_iter()
                    .map(|(lon, lat)| geo::Point::new(lon, lat))
                    .collect(),
            });
        }
        builder.build()
    }

    fn moving(progress: f64) -> TripState {
        TripState::Move {
            from_stop: "a".into(),
            to_stop: "b".into(),
            progress,
        }
    }

    fn meters_between(position: &VehiclePosition, lon: f64, lat: f64) -> f64 {
        geo::Point::new(position.lon, position.lat).haversine_distance(&geo::Point::new(lon, lat))
    }

    #[test]
    fn dwell_sits_on_the_stop() {
        let data = builder_with_trip(None);
        let trip = data.trip_by_id("t1").unwrap();
        let state = TripState::Dwell {
            stop_id: "a".into(),
            next_departure: time("08:00:00"),
        };
        let position = position_of(&data, trip, &state).unwrap();
        assert!(meters_between(&position, 0.0, 0.0) < 1.0);
        // facing the next stop, due east
        assert!((position.bearing - 90.0).abs() < 1.0);
    }

    #[test]
    fn move_endpoints_land_on_the_stops() {
        // a dog-legged geometry around the straight line
        let data = builder_with_trip(Some(vec![
            (-0.001, 0.0),
            (0.0, 0.0),
            (0.005, 0.004),
            (0.01, 0.0),
            (0.011, 0.0),
        ]));
        let trip = data.trip_by_id("t1").unwrap();
        let at_start = position_of(&data, trip, &moving(0.0)).unwrap();
        let at_end = position_of(&data, trip, &moving(1.0)).unwrap();
        assert!(meters_between(&at_start, 0.0, 0.0) < 1.0);
        assert!(meters_between(&at_end, 0.01, 0.0) < 1.0);
    }

    #[test]
    fn midway_follows_the_arc_not_the_chord() {
        let data = builder_with_trip(Some(vec![
            (0.0, 0.0),
            (0.005, 0.004), // detour north
            (0.01, 0.0),
        ]));
        let trip = data.trip_by_id("t1").unwrap();
        let halfway = position_of(&data, trip, &moving(0.5)).unwrap();
        // the chord midpoint is at latitude 0; the arc midpoint is displaced
        // towards the detour vertex
        assert!(halfway.lat > 0.001, "lat {}", halfway.lat);
    }

    #[test]
    fn missing_geometry_falls_back_to_the_chord() {
        let data = builder_with_trip(None);
        let trip = data.trip_by_id("t1").unwrap();
        let halfway = position_of(&data, trip, &moving(0.5)).unwrap();
        assert!(meters_between(&halfway, 0.005, 0.0) < 1.0);
        assert!((halfway.bearing - 90.0).abs() < 1.0);
    }

    #[test]
    fn degenerate_slice_falls_back_to_the_chord() {
        // a geometry nowhere near the stops: both nearest-vertex lookups
        // pick the same vertex
        let data = builder_with_trip(Some(vec![(5.0, 5.0), (5.001, 5.0)]));
        let trip = data.trip_by_id("t1").unwrap();
        let halfway = position_of(&data, trip, &moving(0.5)).unwrap();
        assert!(meters_between(&halfway, 0.005, 0.0) < 1.0);
    }

    #[test]
    fn reversed_geometry_is_walked_backwards() {
        let data = builder_with_trip(Some(vec![
            (0.01, 0.0), // listed end-to-start
            (0.005, 0.004),
            (0.0, 0.0),
        ]));
        let trip = data.trip_by_id("t1").unwrap();
        let at_start = position_of(&data, trip, &moving(0.0)).unwrap();
        let at_end = position_of(&data, trip, &moving(1.0)).unwrap();
        assert!(meters_between(&at_start, 0.0, 0.0) < 1.0);
        assert!(meters_between(&at_end, 0.01, 0.0) < 1.0);
    }
}
