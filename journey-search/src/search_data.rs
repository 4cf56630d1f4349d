use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::time::*;

pub type RouteId = String;
pub type TripId = String;
pub type StopId = String;
pub type ServiceId = String;

/// Parsed and indexed schedule data
/// * efficient lookups for searching
/// * built once at startup through [`Builder`], immutable afterwards
/// * shared by reference with every query
///
/// Routes, trips and stops are stored by id. Departures are indexed per stop
/// and reference back into the stop sequence of their trip, so that a query
/// standing at a stop can continue along the rest of the trip without a scan.
#[derive(Serialize, Deserialize)]
pub struct Catalog {
    routes: HashMap<RouteId, Route>,
    trips: HashMap<TripId, Trip>,
    stops: HashMap<StopId, Stop>,
    /// ids of master stops (stations and standalone stops), each mapping to
    /// its child stop ids, itself included
    children: HashMap<StopId, Vec<StopId>>,
    /// all scheduled arrivals/departures, indexed by the stop they happen at
    events: HashMap<StopId, Vec<StopEvent>>,
    geometries: HashMap<RouteId, LineGeometry>,
}

impl Catalog {
    pub fn builder() -> Builder {
        Builder {
            data: Catalog {
                routes: HashMap::new(),
                trips: HashMap::new(),
                stops: HashMap::new(),
                children: HashMap::new(),
                events: HashMap::new(),
                geometries: HashMap::new(),
            },
            pending_stop_times: HashMap::new(),
        }
    }

    pub fn route_by_id(&self, id: &str) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn stop_by_id(&self, id: &str) -> Option<&Stop> {
        self.stops.get(id)
    }

    pub fn trip_by_id(&self, id: &str) -> Option<&Trip> {
        self.trips.get(id)
    }

    /// The ordered stop sequence of a trip, empty if the trip is unknown
    pub fn stop_times_of_trip(&self, trip_id: &str) -> &[StopTime] {
        self.trips
            .get(trip_id)
            .map(|trip| trip.stop_times.as_slice())
            .unwrap_or_default()
    }

    /// All scheduled events at one child stop, in no particular order
    pub fn events_at_stop(&self, stop_id: &str) -> &[StopEvent] {
        self.events
            .get(stop_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// All scheduled events at a master stop: the union over its children
    pub fn events_at_master<'r>(
        &'r self,
        master_id: &str,
    ) -> impl Iterator<Item = &'r StopEvent> {
        self.children_of_master(master_id)
            .iter()
            .filter_map(move |child| self.events.get(child))
            .flatten()
    }

    /// Every master stop: stations plus stops with no parent station
    pub fn master_stops(&self) -> impl Iterator<Item = &Stop> {
        self.children
            .keys()
            .filter_map(move |id| self.stops.get(id))
    }

    /// Child stop ids of a master, the master itself included; empty if the
    /// id is not a master stop
    pub fn children_of_master(&self, master_id: &str) -> &[StopId] {
        self.children
            .get(master_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The master stop a stop aggregates under: its parent if present,
    /// otherwise itself
    pub fn master_of(&self, stop_id: &str) -> Option<&Stop> {
        let stop = self.stops.get(stop_id)?;
        match &stop.parent_station {
            Some(parent) => self.stops.get(parent.as_str()).or(Some(stop)),
            None => Some(stop),
        }
    }

    pub fn geometry_for_route(&self, route_id: &str) -> Option<&LineGeometry> {
        self.geometries.get(route_id)
    }

    pub fn stops(&self) -> impl Iterator<Item = &Stop> {
        self.stops.values()
    }

    pub fn trips(&self) -> impl Iterator<Item = &Trip> {
        self.trips.values()
    }

    pub fn has_geometries(&self) -> bool {
        !self.geometries.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    /// Identifies a route.
    pub route_id: RouteId,
    pub route_short_name: String,
    pub route_long_name: String,
    /// 6-hex background colour
    pub route_color: String,
    /// 6-hex text colour
    pub route_text_color: String,
}

impl PartialEq for Route {
    fn eq(&self, rhs: &Self) -> bool {
        self.route_id == rhs.route_id
    }
}

impl Eq for Route {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    /// Identifies a trip.
    pub trip_id: TripId,
    /// The route this trip belongs to.
    pub route_id: RouteId,
    /// Identifies a set of dates when service is available for one or more routes.
    pub service_id: ServiceId,
    /// Terminus label shown on the vehicle, when the feed provides one.
    pub headsign: Option<String>,
    pub stop_times: Vec<StopTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopTime {
    /// Arrival time at the stop. For times occurring after midnight on the
    /// service day the value is greater than 24:00:00.
    pub arrival_time: Time,
    /// Departure time from the stop, never before the arrival.
    pub departure_time: Time,
    /// Identifies the serviced stop. Always a stop, never a station.
    pub stop_id: StopId,
}

/// One scheduled arrival/departure at a stop, referencing back into the stop
/// sequence of its trip
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopEvent {
    pub trip_id: TripId,
    /// index into the trip's stop sequence
    pub stop_index: usize,
    pub arrival_time: Time,
    pub departure_time: Time,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Stop {
    pub stop_id: StopId,
    pub stop_name: String,
    /// x = longitude, y = latitude
    pub location: geo::Point<f64>,
    pub parent_station: Option<StopId>,
    /// true for station containers, false for boardable stops
    pub is_station: bool,
}

impl Stop {
    /// Id of the parent station, or own id if this is a master stop
    pub fn station_id(&self) -> &StopId {
        self.parent_station.as_ref().unwrap_or(&self.stop_id)
    }

    /// a station or a standalone stop with no parent
    pub fn is_master(&self) -> bool {
        self.is_station || self.parent_station.is_none()
    }
}

impl fmt::Debug for Stop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}{}]",
            self.stop_name,
            self.stop_id,
            if self.is_station { "*" } else { "" }
        )
    }
}

impl PartialEq for Stop {
    fn eq(&self, rhs: &Self) -> bool {
        self.stop_id == rhs.stop_id
    }
}

impl Eq for Stop {}

/// The physical path of a route, an ordered polyline of lon/lat vertices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineGeometry {
    pub route_id: RouteId,
    /// x = longitude, y = latitude
    pub points: Vec<geo::Point<f64>>,
}

pub struct Builder {
    data: Catalog,
    /// stop times arrive in any order, keyed by their sequence number until `build`
    pending_stop_times: HashMap<TripId, Vec<(u32, StopTime)>>,
}

impl Builder {
    pub fn add_route(&mut self, route: Route) {
        self.data.routes.insert(route.route_id.clone(), route);
    }

    pub fn add_stop(
        &mut self,
        stop_id: StopId,
        stop_name: String,
        location: geo::Point<f64>,
        parent_station: Option<StopId>,
        is_station: bool,
    ) {
        self.data.stops.insert(
            stop_id.clone(),
            Stop {
                stop_id,
                stop_name,
                location,
                parent_station,
                is_station,
            },
        );
    }

    pub fn add_trip(
        &mut self,
        trip_id: TripId,
        route_id: RouteId,
        service_id: ServiceId,
        headsign: Option<String>,
    ) {
        self.data.trips.insert(
            trip_id.clone(),
            Trip {
                trip_id,
                route_id,
                service_id,
                headsign,
                stop_times: Vec::new(),
            },
        );
    }

    /// Record one stop time; unknown trips are ignored with a warning
    pub fn add_stop_time(
        &mut self,
        trip_id: &str,
        stop_sequence: u32,
        arrival_time: Time,
        departure_time: Time,
        stop_id: StopId,
    ) {
        if !self.data.trips.contains_key(trip_id) {
            warn!("stop time for unknown trip {}", trip_id);
            return;
        }
        self.pending_stop_times
            .entry(trip_id.to_owned())
            .or_default()
            .push((
                stop_sequence,
                StopTime {
                    arrival_time,
                    departure_time,
                    stop_id,
                },
            ));
    }

    pub fn add_geometry(&mut self, geometry: LineGeometry) {
        self.data
            .geometries
            .insert(geometry.route_id.clone(), geometry);
    }

    /// Finish indexing: order stop sequences, drop trips with inconsistent
    /// schedules, group stops under their masters and build the per-stop
    /// event index
    pub fn build(mut self) -> Catalog {
        let mut dropped_trips = 0;
        for (trip_id, mut seq) in self.pending_stop_times {
            seq.sort_by_key(|(sequence, _)| *sequence);
            let stop_times: Vec<StopTime> = seq.into_iter().map(|(_, st)| st).collect();
            if !schedule_is_monotonic(&stop_times) {
                warn!("dropping trip {}: stop times are not monotonic", trip_id);
                self.data.trips.remove(&trip_id);
                dropped_trips += 1;
                continue;
            }
            for (stop_index, stop_time) in stop_times.iter().enumerate() {
                self.data
                    .events
                    .entry(stop_time.stop_id.clone())
                    .or_default()
                    .push(StopEvent {
                        trip_id: trip_id.clone(),
                        stop_index,
                        arrival_time: stop_time.arrival_time,
                        departure_time: stop_time.departure_time,
                    });
            }
            self.data
                .trips
                .get_mut(&trip_id)
                .expect("trip present for accepted stop times")
                .stop_times = stop_times;
        }
        // trips with no stop times at all cannot be ridden or resolved
        let before = self.data.trips.len();
        self.data.trips.retain(|_, trip| !trip.stop_times.is_empty());
        dropped_trips += before - self.data.trips.len();
        if dropped_trips > 0 {
            warn!("dropped {} trips with unusable schedules", dropped_trips);
        }

        // stop grouping: stations and parentless stops are masters and list
        // themselves as children; everything else attaches to its parent
        let mut children: HashMap<StopId, Vec<StopId>> = HashMap::new();
        for stop in self.data.stops.values() {
            match &stop.parent_station {
                Some(parent) if self.data.stops.contains_key(parent.as_str()) => {
                    children.entry(parent.clone()).or_default().push(stop.stop_id.clone());
                }
                Some(parent) => {
                    warn!(
                        "stop {} references missing parent {}, treating as standalone",
                        stop.stop_id, parent
                    );
                    children.entry(stop.stop_id.clone()).or_default();
                }
                None => {
                    children.entry(stop.stop_id.clone()).or_default();
                }
            }
        }
        for (master_id, child_ids) in children.iter_mut() {
            child_ids.insert(0, master_id.clone());
        }
        self.data.children = children;

        self.data
    }
}

/// departure never before arrival, and consecutive stops never go back in time
fn schedule_is_monotonic(stop_times: &[StopTime]) -> bool {
    for stop_time in stop_times {
        if stop_time.departure_time < stop_time.arrival_time {
            return false;
        }
    }
    stop_times
        .windows(2)
        .all(|pair| pair[0].departure_time <= pair[1].arrival_time)
}

#[cfg(test)]
mod test {
    use super::*;

    fn point() -> geo::Point<f64> {
        geo::Point::new(13.4, 52.5)
    }

    fn time(s: &str) -> Time {
        s.parse().unwrap()
    }

    fn sample_builder() -> Builder {
        let mut builder = Catalog::builder();
        builder.add_route(Route {
            route_id: "r1".into(),
            route_short_name: "M1".into(),
            route_long_name: "Main Line".into(),
            route_color: "FF0000".into(),
            route_text_color: "FFFFFF".into(),
        });
        builder.add_stop("station".into(), "Central".into(), point(), None, true);
        builder.add_stop(
            "platform-a".into(),
            "Central Platform A".into(),
            point(),
            Some("station".into()),
            false,
        );
        builder.add_stop("lone".into(), "Lone Stop".into(), point(), None, false);
        builder.add_trip("t1".into(), "r1".into(), "weekday".into(), None);
        builder.add_stop_time("t1", 1, time("08:00:00"), time("08:00:30"), "platform-a".into());
        builder.add_stop_time("t1", 2, time("08:10:00"), time("08:10:00"), "lone".into());
        builder
    }

    #[test]
    fn groups_stops_under_masters() {
        let data = sample_builder().build();
        let mut masters: Vec<&str> = data.master_stops().map(|s| s.stop_id.as_str()).collect();
        masters.sort_unstable();
        assert_eq!(masters, vec!["lone", "station"]);
        let children = data.children_of_master("station");
        assert_eq!(children[0], "station");
        assert!(children.contains(&"platform-a".to_owned()));
        assert_eq!(data.master_of("platform-a").unwrap().stop_id, "station");
        assert_eq!(data.master_of("lone").unwrap().stop_id, "lone");
    }

    #[test]
    fn stop_times_sorted_by_sequence() {
        let mut builder = sample_builder();
        builder.add_trip("t2".into(), "r1".into(), "weekday".into(), None);
        // inserted out of order
        builder.add_stop_time("t2", 20, time("09:10:00"), time("09:10:00"), "lone".into());
        builder.add_stop_time("t2", 3, time("09:00:00"), time("09:00:00"), "platform-a".into());
        let data = builder.build();
        let stop_times = data.stop_times_of_trip("t2");
        assert_eq!(stop_times[0].stop_id, "platform-a");
        assert_eq!(stop_times[1].stop_id, "lone");
    }

    #[test]
    fn events_indexed_at_each_stop_and_unioned_at_master() {
        let data = sample_builder().build();
        assert_eq!(data.events_at_stop("platform-a").len(), 1);
        assert_eq!(data.events_at_stop("station").len(), 0);
        let at_master: Vec<_> = data.events_at_master("station").collect();
        assert_eq!(at_master.len(), 1);
        assert_eq!(at_master[0].trip_id, "t1");
        assert_eq!(at_master[0].stop_index, 0);
    }

    #[test]
    fn non_monotonic_trip_is_dropped() {
        let mut builder = sample_builder();
        builder.add_trip("bad".into(), "r1".into(), "weekday".into(), None);
        builder.add_stop_time("bad", 1, time("10:00:00"), time("10:00:00"), "lone".into());
        builder.add_stop_time("bad", 2, time("09:00:00"), time("09:00:00"), "platform-a".into());
        let data = builder.build();
        assert!(data.trip_by_id("bad").is_none());
        assert!(data.trip_by_id("t1").is_some());
        // no events of the dropped trip survive either
        assert!(data
            .events_at_stop("lone")
            .iter()
            .all(|event| event.trip_id != "bad"));
    }

    #[test]
    fn departure_before_arrival_is_dropped() {
        let mut builder = sample_builder();
        builder.add_trip("bad".into(), "r1".into(), "weekday".into(), None);
        builder.add_stop_time("bad", 1, time("10:00:00"), time("09:59:00"), "lone".into());
        let data = builder.build();
        assert!(data.trip_by_id("bad").is_none());
    }
}
