//! The core engine of a local, offline journey planner over a static GTFS
//! feed: earliest-arrival itineraries between two coordinates, live vehicle
//! states with interpolated positions, next departures per stop and
//! stop-name search. All queries are pure functions over the catalog built
//! at load time; the map and UI layers consume the serialisable results
//! downstream.

use std::path::PathBuf;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use lazysort::SortedBy;
use log::info;
use serde::Serialize;

pub mod gtfs;
pub mod name_index;

use name_index::NameIndex;

pub use journey_search::calendar::ServiceCalendar;
pub use journey_search::journey_graph::{JourneyPlanner, LatLon, Leg, PlanOutcome};
pub use journey_search::position::VehiclePosition;
pub use journey_search::search_data::{Catalog, Stop, StopId, TripId};
pub use journey_search::time::{Duration, Time};
pub use journey_search::transfers::TransferIndex;
pub use journey_search::trip_state::TripState;

pub use gtfs::FeedError;

/// Engine configuration, all fields defaulted. `data_dir` is the GTFS feed
/// directory.
#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub max_walk_meters: f64,
    pub walk_speed_mps: f64,
    pub max_departures_per_stop: usize,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            data_dir: PathBuf::from("gtfs"),
            max_walk_meters: 500.0,
            walk_speed_mps: 1.4,
            max_departures_per_stop: 5,
        }
    }
}

impl Config {
    /// Defaults, with the data directory taken from `DATA_DIR` if set
    pub fn from_env() -> Config {
        let mut config = Config::default();
        if let Ok(dir) = std::env::var("DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        config
    }
}

/// A vehicle in service at the queried instant
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveTrip {
    pub trip_id: TripId,
    pub route_short_name: String,
    pub route_color: String,
    pub destination: String,
    pub state: TripState,
}

/// One upcoming departure at a master stop, enriched for display
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub departure_time: Time,
    pub trip_id: String,
    pub route_short_name: String,
    pub route_color: String,
    pub route_text_color: String,
    pub destination: String,
}

/// The embedded query engine: owns the catalog and the derived indexes,
/// all built once by [`Engine::load`] and immutable afterwards. Conversion
/// between wall-clock timestamps and the service-day time scalar happens
/// here and nowhere deeper.
pub struct Engine {
    data: Catalog,
    calendar: ServiceCalendar,
    transfers: TransferIndex,
    station_search: NameIndex,
    master_ids: Vec<StopId>,
    config: Config,
}

impl Engine {
    pub fn load(config: Config) -> Result<Engine, FeedError> {
        let (data, calendar) = gtfs::load_data(&config.data_dir)?;
        let transfers =
            TransferIndex::build(&data, config.max_walk_meters, config.walk_speed_mps);

        let mut master_ids: Vec<StopId> =
            data.master_stops().map(|stop| stop.stop_id.clone()).collect();
        master_ids.sort_unstable();
        let mut station_search = NameIndex::new();
        for (index, master_id) in master_ids.iter().enumerate() {
            if let Some(stop) = data.stop_by_id(master_id) {
                station_search.insert(&stop.stop_name, index as u32);
            }
        }
        info!("indexed {} master stop names", station_search.len());

        Ok(Engine {
            data,
            calendar,
            transfers,
            station_search,
            master_ids,
            config,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.data
    }

    /// The earliest-arrival journey between two coordinates, departing at
    /// the given wall-clock instant
    pub fn find_itinerary(&self, from: LatLon, to: LatLon, depart: NaiveDateTime) -> PlanOutcome {
        let (date, time) = service_time(depart);
        let services = self.calendar.active_services(date);
        JourneyPlanner::new(&self.data, &self.transfers, &services).find_itinerary(from, to, time)
    }

    /// Every trip in service at the instant, with its dwell/move state
    pub fn active_trips(&self, at: NaiveDateTime) -> Vec<ActiveTrip> {
        let (date, time) = service_time(at);
        let services = self.calendar.active_services(date);
        journey_search::trip_state::active_trip_states(&self.data, &services, time)
            .into_iter()
            .map(|(trip, state)| {
                let route = self.data.route_by_id(&trip.route_id);
                ActiveTrip {
                    trip_id: trip.trip_id.clone(),
                    route_short_name: route
                        .map(|route| route.route_short_name.clone())
                        .unwrap_or_default(),
                    route_color: route
                        .map(|route| route.route_color.clone())
                        .unwrap_or_default(),
                    destination: self.destination_of(trip),
                    state,
                }
            })
            .collect()
    }

    /// Geographic position of a trip in the given state, None if the trip or
    /// a referenced stop is unknown
    pub fn position_of(&self, trip_id: &str, state: &TripState) -> Option<VehiclePosition> {
        let trip = self.data.trip_by_id(trip_id)?;
        journey_search::position::position_of(&self.data, trip, state)
    }

    /// The next departures at a master stop from the given instant, over all
    /// of its child stops, soonest first
    pub fn upcoming_departures(
        &self,
        master_id: &str,
        at: NaiveDateTime,
        limit: Option<usize>,
    ) -> Vec<Departure> {
        let (date, time) = service_time(at);
        let services = self.calendar.active_services(date);
        let limit = limit.unwrap_or(self.config.max_departures_per_stop);
        self.data
            .events_at_master(master_id)
            .filter(|event| event.departure_time >= time)
            .filter_map(|event| {
                let trip = self.data.trip_by_id(&event.trip_id)?;
                if !services.contains(&trip.service_id) {
                    return None;
                }
                let route = self.data.route_by_id(&trip.route_id)?;
                Some(Departure {
                    departure_time: event.departure_time,
                    trip_id: trip.trip_id.clone(),
                    route_short_name: route.route_short_name.clone(),
                    route_color: route.route_color.clone(),
                    route_text_color: route.route_text_color.clone(),
                    destination: self.destination_of(trip),
                })
            })
            .sorted_by(|a, b| a.departure_time.cmp(&b.departure_time))
            .take(limit)
            .collect()
    }

    /// Master stops whose name words start with the query's words
    pub fn search_stops_by_name_prefix(&self, query: &str, limit: usize) -> Vec<&Stop> {
        let mut results: Vec<&Stop> = self
            .station_search
            .search(query)
            .into_iter()
            .filter_map(|index| self.master_ids.get(index as usize))
            .filter_map(|master_id| self.data.stop_by_id(master_id))
            .collect();
        results.sort_by(|a, b| {
            a.stop_name
                .cmp(&b.stop_name)
                .then_with(|| a.stop_id.cmp(&b.stop_id))
        });
        results.truncate(limit);
        results
    }

    /// The terminus label of a trip: its headsign, or the last stop's name
    fn destination_of(&self, trip: &journey_search::search_data::Trip) -> String {
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

/// Wall-clock to service-day conversion: the date picks the calendar, the
/// time of day becomes the planner's scalar
fn service_time(at: NaiveDateTime) -> (NaiveDate, Time) {
    (at.date(), Time::from_hms(at.hour(), at.minute(), at.second()))
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    /// a miniature feed: two routes meeting at an interchange station with
    /// two platforms, running on weekdays in 2023
    fn write_fixture_feed(dir: &std::path::Path) {
        fs::write(
            dir.join("routes.txt"),
            "route_id,route_short_name,route_long_name,route_color,route_text_color\n\
             r1,M1,Eastbound Line,FF0000,FFFFFF\n\
             r2,M2,Northbound Line,00FF00,000000\n",
        )
        .unwrap();
        fs::write(
            dir.join("trips.txt"),
            "route_id,service_id,trip_id,trip_headsign\n\
             r1,weekday,t1,Harbour\n\
             r2,weekday,t2,\n",
        )
        .unwrap();
        // stops sit on the equator, 0.001 degrees is ~111m; the interchange
        // platforms p1/p2 group under station "hub"
        fs::write(
            dir.join("stops.txt"),
            "stop_id,stop_name,stop_lat,stop_lon,location_type,parent_station\n\
             origin,Origin Square,0.0,0.0,0,\n\
             hub,Interchange Hub,0.0,0.03,1,\n\
             p1,Interchange Platform 1,0.0,0.0301,0,hub\n\
             p2,Interchange Platform 2,0.0,0.0302,0,hub\n\
             harbour,Harbour,0.0,0.06,0,\n",
        )
        .unwrap();
        fs::write(
            dir.join("stop_times.txt"),
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
             t1,08:00:00,08:00:00,origin,1\n\
             t1,08:10:00,08:10:00,p1,2\n\
             t2,08:15:00,08:15:00,p2,1\n\
             t2,08:25:00,08:25:00,harbour,2\n",
        )
        .unwrap();
        fs::write(
            dir.join("calendar.txt"),
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
             weekday,1,1,1,1,1,0,0,20230101,20231231\n",
        )
        .unwrap();
        fs::write(
            dir.join("calendar_dates.txt"),
            "service_id,date,exception_type\n",
        )
        .unwrap();
    }

    fn engine() -> (Engine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        write_fixture_feed(dir.path());
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        (Engine::load(config).unwrap(), dir)
    }

    /// a weekday morning inside the calendar window
    fn monday_at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 6, 5)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn itinerary_changes_vehicles_at_the_interchange_station() {
        let (engine, _dir) = engine();
        let outcome = engine.find_itinerary(
            LatLon::new(0.0, 0.0),
            LatLon::new(0.0, 0.06),
            monday_at(8, 0),
        );
        let legs = match outcome {
            PlanOutcome::Journey { legs, .. } => legs,
            other => panic!("expected a journey, got {:?}", other),
        };
        // walk, ride to the hub, ride onward, walk
        assert_eq!(legs.len(), 4);
        match (&legs[1], &legs[2]) {
            (Leg::Bus(first), Leg::Bus(second)) => {
                assert_eq!(first.trip_id, "t1");
                assert_eq!(first.to_stop, "hub");
                assert_eq!(second.trip_id, "t2");
                assert_eq!(second.from_stop, "hub");
                assert_eq!(second.headsign, "Harbour");
            }
            other => panic!("unexpected legs {:?}", other),
        }
    }

    #[test]
    fn weekend_has_no_service() {
        let (engine, _dir) = engine();
        let saturday = NaiveDate::from_ymd_opt(2023, 6, 10)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        match engine.find_itinerary(LatLon::new(0.0, 0.0), LatLon::new(0.0, 0.06), saturday) {
            PlanOutcome::NoService => {}
            other => panic!("expected NoService, got {:?}", other),
        }
    }

    #[test]
    fn departures_at_the_station_union_its_platforms() {
        let (engine, _dir) = engine();
        let departures = engine.upcoming_departures("hub", monday_at(8, 0), None);
        assert_eq!(departures.len(), 2);
        assert_eq!(departures[0].route_short_name, "M1");
        assert_eq!(departures[0].destination, "Harbour");
        assert_eq!(departures[1].route_short_name, "M2");
        // t2 has an empty headsign; its destination falls back to the last
        // stop's name
        assert_eq!(departures[1].destination, "Harbour");

        let after = engine.upcoming_departures("hub", monday_at(8, 12), None);
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].trip_id, "t2");
    }

    #[test]
    fn departure_limit_truncates() {
        let (engine, _dir) = engine();
        let departures = engine.upcoming_departures("hub", monday_at(8, 0), Some(1));
        assert_eq!(departures.len(), 1);
        assert_eq!(departures[0].departure_time, Time::from_hms(8, 10, 0));
    }

    #[test]
    fn active_trips_and_positions() {
        let (engine, _dir) = engine();
        let active = engine.active_trips(monday_at(8, 5));
        assert_eq!(active.len(), 1);
        let vehicle = &active[0];
        assert_eq!(vehicle.trip_id, "t1");
        assert_eq!(vehicle.route_short_name, "M1");
        match &vehicle.state {
            TripState::Move {
                from_stop,
                to_stop,
                progress,
            } => {
                assert_eq!(from_stop, "origin");
                assert_eq!(to_stop, "p1");
                assert!((progress - 0.5).abs() < 1e-9);
            }
            other => panic!("expected a moving vehicle, got {:?}", other),
        }
        let position = engine.position_of(&vehicle.trip_id, &vehicle.state).unwrap();
        // halfway along the chord between origin and platform 1
        assert!((position.lon - 0.01505).abs() < 1e-4);
        assert!((position.bearing - 90.0).abs() < 1.0);
    }

    #[test]
    fn name_search_finds_master_stops_only() {
        let (engine, _dir) = engine();
        let hits = engine.search_stops_by_name_prefix("inter", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].stop_id, "hub");

        let limited = engine.search_stops_by_name_prefix("ha", 10);
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].stop_id, "harbour");
    }

    #[test]
    fn identical_queries_are_deterministic() {
        let (engine, _dir) = engine();
        let from = LatLon::new(0.0, 0.0);
        let to = LatLon::new(0.0, 0.06);
        let first = serde_json::to_string(&engine.find_itinerary(from, to, monday_at(8, 0))).unwrap();
        let second = serde_json::to_string(&engine.find_itinerary(from, to, monday_at(8, 0))).unwrap();
        assert_eq!(first, second);
    }
}
