use geo::algorithm::haversine_distance::HaversineDistance;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::search_data::*;
use crate::time::*;
use crate::transfers::TransferIndex;

/// A geographic coordinate as the query boundary speaks it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl LatLon {
    pub fn new(lat: f64, lon: f64) -> LatLon {
        LatLon { lat, lon }
    }

    /// As a geo point, x = longitude, y = latitude
    pub fn point(&self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

/// One homogeneous segment of a journey: entirely on foot or entirely on one
/// vehicle trip
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Leg {
    Walk(WalkLeg),
    Bus(BusLeg),
}

impl Leg {
    pub fn start_time(&self) -> Time {
        match self {
            Leg::Walk(leg) => leg.start_time,
            Leg::Bus(leg) => leg.start_time,
        }
    }

    pub fn end_time(&self) -> Time {
        match self {
            Leg::Walk(leg) => leg.end_time,
            Leg::Bus(leg) => leg.end_time,
        }
    }
}

/// A foot leg; either end is a stop (transfers) or a free coordinate
/// (access and egress)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkLeg {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_stop: Option<StopId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_coords: Option<LatLon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_stop: Option<StopId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_coords: Option<LatLon>,
    pub distance_m: f64,
    pub start_time: Time,
    pub end_time: Time,
    pub duration: Duration,
}

/// A ride on one trip from one scheduled stop to a later one
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusLeg {
    pub from_stop: StopId,
    pub to_stop: StopId,
    pub route_id: RouteId,
    pub route_short_name: String,
    pub route_color: String,
    pub trip_id: TripId,
    pub headsign: String,
    pub start_time: Time,
    pub end_time: Time,
    pub duration: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyStats {
    pub departure_time: Time,
    pub arrival_time: Time,
    pub duration: Duration,
    /// stops settled by the search; 0 for a journey that never boarded
    pub stops_settled: usize,
}

/// The result of an itinerary query. Absence of a journey is data, not an
/// error.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum PlanOutcome {
    Journey {
        legs: Vec<Leg>,
        stats: JourneyStats,
    },
    /// no service runs on the departure date
    NoService,
    /// no master stop within walking range of the origin
    NoStartStops,
    /// no master stop within walking range of the destination
    NoEndStops,
    /// the reachable network was exhausted without touching an end stop
    NoPathFound,
}

/// Earliest-arrival search over the time-expanded stop graph: scheduled
/// vehicle legs plus foot transfers, entered and left by access/egress walks.
///
/// Per-query state lives in [`Search`] and is discarded when the query
/// returns; the planner itself only borrows the immutable indexes.
pub struct JourneyPlanner<'r> {
    data: &'r Catalog,
    transfers: &'r TransferIndex,
    services: &'r HashSet<ServiceId>,
}

impl<'r> JourneyPlanner<'r> {
    pub fn new(
        data: &'r Catalog,
        transfers: &'r TransferIndex,
        services: &'r HashSet<ServiceId>,
    ) -> JourneyPlanner<'r> {
        JourneyPlanner {
            data,
            transfers,
            services,
        }
    }

    pub fn find_itinerary(&self, from: LatLon, to: LatLon, departure: Time) -> PlanOutcome {
        if self.services.is_empty() {
            return PlanOutcome::NoService;
        }

        let from_point = from.point();
        let to_point = to.point();
        let direct_distance = from_point.haversine_distance(&to_point);
        let direct_walk_arrival = if direct_distance <= self.transfers.max_walk_meters() {
            Some(departure + self.transfers.walk_time(direct_distance))
        } else {
            None
        };

        let start_stops = self.transfers.masters_within_radius(self.data, from_point);
        if start_stops.is_empty() {
            return match direct_walk_arrival {
                Some(arrival) => self.walk_only(from, to, direct_distance, departure, arrival, 0),
                None => PlanOutcome::NoStartStops,
            };
        }
        let end_stops: HashMap<&'r str, f64> = self
            .transfers
            .masters_within_radius(self.data, to_point)
            .into_iter()
            .map(|(stop, distance_m)| (stop.stop_id.as_str(), distance_m))
            .collect();
        if end_stops.is_empty() {
            return match direct_walk_arrival {
                Some(arrival) => self.walk_only(from, to, direct_distance, departure, arrival, 0),
                None => PlanOutcome::NoEndStops,
            };
        }

        let mut search = Search::default();
        for (stop, distance_m) in start_stops {
            let walk = self.transfers.walk_time(distance_m);
            let arrival = departure + walk;
            let leg = Leg::Walk(WalkLeg {
                from_stop: None,
                from_coords: Some(from),
                to_stop: Some(stop.stop_id.clone()),
                to_coords: None,
                distance_m,
                start_time: departure,
                end_time: arrival,
                duration: walk,
            });
            search.propose(stop, arrival, None, leg);
        }

        while let Some((stop, arrival)) = search.pop() {
            if let Some(&egress_distance) = end_stops.get(stop.stop_id.as_str()) {
                // first settled end stop; no earlier arrival at any end stop
                // is possible
                match self.assemble(&search, stop, arrival, to, egress_distance, departure) {
                    Some(outcome) => {
                        if let Some(walk_arrival) = direct_walk_arrival {
                            if walk_arrival <= final_arrival(&outcome) {
                                return self.walk_only(
                                    from,
                                    to,
                                    direct_distance,
                                    departure,
                                    walk_arrival,
                                    search.stops_settled,
                                );
                            }
                        }
                        return outcome;
                    }
                    // a broken back-link chain; treat the network as
                    // unreachable rather than crash
                    None => return PlanOutcome::NoPathFound,
                }
            }
            self.relax_rides(&mut search, stop, arrival);
            self.relax_transfers(&mut search, stop, arrival);
        }

        match direct_walk_arrival {
            Some(arrival) => {
                self.walk_only(from, to, direct_distance, departure, arrival, search.stops_settled)
            }
            None => PlanOutcome::NoPathFound,
        }
    }

    /// Board every serviced departure at this master stop and propose every
    /// later stop of the boarded trip
    fn relax_rides(&self, search: &mut Search<'r>, stop: &'r Stop, earliest: Time) {
        for event in self.data.events_at_master(stop.stop_id.as_str()) {
            if event.departure_time < earliest {
                continue;
            }
            let trip = match self.data.trip_by_id(&event.trip_id) {
                Some(trip) => trip,
                None => continue,
            };
            if !self.services.contains(&trip.service_id) {
                continue;
            }
            let route = match self.data.route_by_id(&trip.route_id) {
                Some(route) => route,
                None => continue,
            };
            for later in &trip.stop_times[event.stop_index + 1..] {
                let to_master = match self.data.master_of(&later.stop_id) {
                    Some(master) => master,
                    None => continue, // stop was dropped at load time
                };
                let leg = Leg::Bus(BusLeg {
                    from_stop: stop.stop_id.clone(),
                    to_stop: to_master.stop_id.clone(),
                    route_id: route.route_id.clone(),
                    route_short_name: route.route_short_name.clone(),
                    route_color: route.route_color.clone(),
                    trip_id: trip.trip_id.clone(),
                    headsign: self.headsign_of(trip),
                    start_time: event.departure_time,
                    end_time: later.arrival_time,
                    duration: later.arrival_time - event.departure_time,
                });
                search.propose(to_master, later.arrival_time, Some(stop.stop_id.as_str()), leg);
            }
        }
    }

    fn relax_transfers(&self, search: &mut Search<'r>, stop: &'r Stop, earliest: Time) {
        for transfer in self.transfers.from_stop(stop.stop_id.as_str()) {
            let to_stop = match self.data.stop_by_id(&transfer.to_stop_id) {
                Some(to_stop) => to_stop,
                None => continue,
            };
            let arrival = earliest + transfer.walk;
            let leg = Leg::Walk(WalkLeg {
                from_stop: Some(stop.stop_id.clone()),
                from_coords: None,
                to_stop: Some(to_stop.stop_id.clone()),
                to_coords: None,
                distance_m: transfer.distance_m,
                start_time: earliest,
                end_time: arrival,
                duration: transfer.walk,
            });
            search.propose(to_stop, arrival, Some(stop.stop_id.as_str()), leg);
        }
    }

    /// Follow back-links from the settled end stop to the origin, reverse,
    /// and append the egress walk
    fn assemble(
        &self,
        search: &Search<'r>,
        final_stop: &'r Stop,
        arrival: Time,
        to: LatLon,
        egress_distance: f64,
        departure: Time,
    ) -> Option<PlanOutcome> {
        let mut legs = Vec::new();
        let mut cursor = final_stop.stop_id.as_str();
        // the chain is acyclic by construction; bound it anyway so a stale
        // link cannot loop forever
        for _ in 0..=search.back_links.len() {
            let link = search.back_links.get(cursor)?;
            legs.push(link.leg.clone());
            match link.prev {
                Some(prev) => cursor = prev,
                None => {
                    legs.reverse();
                    let walk = self.transfers.walk_time(egress_distance);
                    let end = arrival + walk;
                    legs.push(Leg::Walk(WalkLeg {
                        from_stop: Some(final_stop.stop_id.clone()),
                        from_coords: None,
                        to_stop: None,
                        to_coords: Some(to),
                        distance_m: egress_distance,
                        start_time: arrival,
                        end_time: end,
                        duration: walk,
                    }));
                    return Some(PlanOutcome::Journey {
                        stats: JourneyStats {
                            departure_time: departure,
                            arrival_time: end,
                            duration: end - departure,
                            stops_settled: search.stops_settled,
                        },
                        legs,
                    });
                }
            }
        }
        None
    }

    fn walk_only(
        &self,
        from: LatLon,
        to: LatLon,
        distance_m: f64,
        departure: Time,
        arrival: Time,
        stops_settled: usize,
    ) -> PlanOutcome {
        PlanOutcome::Journey {
            legs: vec![Leg::Walk(WalkLeg {
                from_stop: None,
                from_coords: Some(from),
                to_stop: None,
                to_coords: Some(to),
                distance_m,
                start_time: departure,
                end_time: arrival,
                duration: arrival - departure,
            })],
            stats: JourneyStats {
                departure_time: departure,
                arrival_time: arrival,
                duration: arrival - departure,
                stops_settled,
            },
        }
    }

    /// The terminus label: the feed's headsign, or the last stop's name
    fn headsign_of(&self, trip: &Trip) -> String {
        if let Some(headsign) = &trip.headsign {
            if !headsign.is_empty() {
                return headsign.clone();
            }
        }
        trip.stop_times
            .last()
            .and_then(|last| self.data.stop_by_id(&last.stop_id))
            .map(|stop| stop.stop_name.clone())
            .unwrap_or_default()
    }
}

fn final_arrival(outcome: &PlanOutcome) -> Time {
    match outcome {
        PlanOutcome::Journey { stats, .. } => stats.arrival_time,
        _ => Time::from_seconds(u32::max_value()),
    }
}

/// Per-query search state: provisional arrival labels, back-links and the
/// frontier. Superseded queue entries are skipped at dequeue rather than
/// removed.
#[derive(Default)]
struct Search<'r> {
    labels: HashMap<&'r str, Time>,
    back_links: HashMap<&'r str, BackLink<'r>>,
    queue: BinaryHeap<QueueItem<'r>>,
    settled: HashSet<&'r str>,
    stops_settled: usize,
}

struct BackLink<'r> {
    prev: Option<&'r str>,
    leg: Leg,
}

impl<'r> Search<'r> {
    /// Accept the candidate only if it strictly improves the provisional
    /// arrival at the stop; ties keep the incumbent
    fn propose(&mut self, stop: &'r Stop, arrival: Time, prev: Option<&'r str>, leg: Leg) {
        let improves = self
            .labels
            .get(stop.stop_id.as_str())
            .map_or(true, |&best| arrival < best);
        if !improves {
            return;
        }
        self.labels.insert(stop.stop_id.as_str(), arrival);
        self.back_links
            .insert(stop.stop_id.as_str(), BackLink { prev, leg });
        self.queue.push(QueueItem {
            arrival_time: arrival,
            stop,
        });
    }

    /// Next unsettled stop in arrival order, skipping entries whose label
    /// has been superseded
    fn pop(&mut self) -> Option<(&'r Stop, Time)> {
        while let Some(item) = self.queue.pop() {
            let stop_id = item.stop.stop_id.as_str();
            match self.labels.get(stop_id) {
                Some(&best) if best == item.arrival_time => {
                    if !self.settled.insert(stop_id) {
                        continue;
                    }
                    self.stops_settled += 1;
                    return Some((item.stop, item.arrival_time));
                }
                _ => continue,
            }
        }
        None
    }
}

struct QueueItem<'r> {
    arrival_time: Time,
    stop: &'r Stop,
}

/// The ordering on the queue items puts those with the earliest arrival
/// times as the greatest, so that they are highest priority in the
/// BinaryHeap; the stop id completes the order
impl<'r> Ord for QueueItem<'r> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.arrival_time
            .cmp(&other.arrival_time)
            .reverse()
            .then_with(|| self.stop.stop_id.cmp(&other.stop.stop_id))
    }
}

impl<'r> PartialOrd for QueueItem<'r> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'r> PartialEq for QueueItem<'r> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<'r> Eq for QueueItem<'r> {}
