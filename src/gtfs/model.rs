//! Record types for the six GTFS tables this planner consumes. Field sets
//! follow [https://developers.google.com/transit/gtfs/reference]; columns the
//! engine has no use for are simply not declared, the csv reader ignores
//! them.

use chrono::NaiveDate;
use serde::Deserialize;

use journey_search::time::Time;

use super::time::{date_format, time_format};

/// GTFS record
/// [https://developers.google.com/transit/gtfs/reference#routestxt]
#[derive(Debug, Deserialize)]
pub struct Route {
    /// Identifies a route.
    pub route_id: String,
    /// Short name of a route. This will often be a short, abstract identifier
    /// like "32", "100X", or "Green" that riders use to identify a route.
    pub route_short_name: String,
    /// Full name of a route, generally more descriptive than the short name
    /// and often including the route's destination or stop.
    #[serde(default)]
    pub route_long_name: String,
    /// Route color designation, as a 6-hex value. Defaults to white.
    #[serde(default)]
    pub route_color: Option<String>,
    /// Legible color for text drawn against route_color. Defaults to black.
    #[serde(default)]
    pub route_text_color: Option<String>,
}

/// GTFS record
/// [https://developers.google.com/transit/gtfs/reference#tripstxt]
#[derive(Debug, Deserialize)]
pub struct Trip {
    /// Identifies a route.
    pub route_id: String,
    /// Identifies a set of dates when service is available for one or more routes.
    pub service_id: String,
    /// Identifies a trip.
    pub trip_id: String,
    /// Text that appears on signage identifying the trip's destination to riders.
    #[serde(default)]
    pub trip_headsign: Option<String>,
}

/// GTFS record
/// [https://developers.google.com/transit/gtfs/reference#stop_timestxt]
#[derive(Debug, Deserialize)]
pub struct StopTime {
    /// Identifies a trip.
    pub trip_id: String,
    /// Arrival time at a specific stop for a specific trip on a route. For
    /// times occurring after midnight on the service day, the value is
    /// greater than 24:00:00 in HH:MM:SS local time for the day on which the
    /// trip schedule begins.
    #[serde(with = "time_format")]
    pub arrival_time: Time,
    /// Departure time from a specific stop for a specific trip on a route.
    #[serde(with = "time_format")]
    pub departure_time: Time,
    /// Identifies the serviced stop. Must be a stop, not a station.
    pub stop_id: String,
    /// Order of stops for a particular trip. The values must increase along
    /// the trip but do not need to be consecutive.
    pub stop_sequence: u32,
}

/// GTFS record
/// [https://developers.google.com/transit/gtfs/reference#stopstxt]
///
/// Coordinates are kept textual here: a stop whose latitude or longitude
/// does not parse is dropped by the loader rather than failing the build.
#[derive(Debug, Deserialize)]
pub struct Stop {
    /// Identifies a stop, station, or station entrance.
    pub stop_id: String,
    /// Name of the location. A name that people will understand in the local
    /// and tourist vernacular.
    pub stop_name: String,
    /// Latitude of the location.
    pub stop_lat: String,
    /// Longitude of the location.
    pub stop_lon: String,
    /// Type of the location: 0 (or empty) stop, 1 station, 2 entrance/exit,
    /// 3 generic node, 4 boarding area.
    #[serde(default)]
    pub location_type: Option<u8>,
    /// Defines hierarchy between the different locations: for a stop or
    /// platform, the ID of the parent station.
    #[serde(default)]
    pub parent_station: Option<String>,
}

/// GTFS record
/// [https://developers.google.com/transit/gtfs/reference#calendartxt]
/// Uniquely identifies a set of dates when service is available for one or
/// more routes. Each service_id value appears at most once.
#[derive(Debug, Deserialize)]
pub struct Calendar {
    pub service_id: String,
    /// Indicates whether the service operates on all Mondays in the date
    /// range specified by start_date and end_date; exceptions for particular
    /// dates are listed in calendar_dates.txt.
    pub monday: u8,
    pub tuesday: u8,
    pub wednesday: u8,
    pub thursday: u8,
    pub friday: u8,
    pub saturday: u8,
    pub sunday: u8,
    /// Start service day for the service interval.
    #[serde(with = "date_format")]
    pub start_date: NaiveDate,
    /// End service day for the service interval, included in the interval.
    #[serde(with = "date_format")]
    pub end_date: NaiveDate,
}

impl Calendar {
    /// Day-of-week flags indexed from Monday
    pub fn weekdays(&self) -> [bool; 7] {
        [
            self.monday > 0,
            self.tuesday > 0,
            self.wednesday > 0,
            self.thursday > 0,
            self.friday > 0,
            self.saturday > 0,
            self.sunday > 0,
        ]
    }
}

/// GTFS record
/// [https://developers.google.com/transit/gtfs/reference#calendar_datestxt]
/// Explicitly activates or disables a service by date, overriding
/// calendar.txt.
#[derive(Debug, Deserialize)]
pub struct CalendarDate {
    pub service_id: String,
    /// Date when the service exception occurs.
    #[serde(with = "date_format")]
    pub date: NaiveDate,
    /// 1 - service added for the date; 2 - service removed for the date.
    pub exception_type: u8,
}
