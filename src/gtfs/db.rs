use std::path::{Path, PathBuf};

use log::{info, warn};

use journey_search::calendar::{CalendarException, CalendarRule, ExceptionKind, ServiceCalendar};
use journey_search::search_data::{Builder, Catalog, Route};

use super::geometry;
use super::model;

/// Name of the optional line-geometry document inside the data directory
const GEOMETRY_FILE: &str = "map.geojson";

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("required feed file {0} is missing")]
    FeedMissing(String),
    #[error("feed file {file} is malformed: {source}")]
    FeedMalformed {
        file: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl FeedError {
    fn malformed(
        file: &str,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> FeedError {
        FeedError::FeedMalformed {
            file: file.to_owned(),
            source: source.into(),
        }
    }
}

/// A directory of GTFS files
pub struct GTFSSource {
    dir_path: PathBuf,
}

impl GTFSSource {
    pub fn new(dir_path: impl AsRef<Path>) -> GTFSSource {
        GTFSSource {
            dir_path: dir_path.as_ref().to_path_buf(),
        }
    }

    pub fn open_csv(&self, filename: &str) -> Result<csv::Reader<std::fs::File>, FeedError> {
        let path = self.dir_path.join(filename);
        if !path.is_file() {
            return Err(FeedError::FeedMissing(filename.to_owned()));
        }
        csv::Reader::from_path(&path).map_err(|err| FeedError::malformed(filename, err))
    }
}

/// Load and index a feed directory: the six required tables plus the
/// optional geometry document. Table-level problems are fatal; individual
/// stops with unparseable coordinates and trips with inconsistent schedules
/// are dropped with a warning.
pub fn load_data(gtfs_dir: &Path) -> Result<(Catalog, ServiceCalendar), FeedError> {
    let source = GTFSSource::new(gtfs_dir);

    let mut rules = Vec::new();
    for result in source.open_csv("calendar.txt")?.into_deserialize() {
        let record: model::Calendar = result.map_err(|err| FeedError::malformed("calendar.txt", err))?;
        rules.push(CalendarRule {
            weekdays: record.weekdays(),
            service_id: record.service_id,
            start_date: record.start_date,
            end_date: record.end_date,
        });
    }

    let mut exceptions = Vec::new();
    for result in source.open_csv("calendar_dates.txt")?.into_deserialize() {
        let record: model::CalendarDate =
            result.map_err(|err| FeedError::malformed("calendar_dates.txt", err))?;
        let kind = match record.exception_type {
            1 => ExceptionKind::Added,
            2 => ExceptionKind::Removed,
            other => {
                warn!(
                    "unknown exception type {} for service {} on {}",
                    other, record.service_id, record.date
                );
                continue;
            }
        };
        exceptions.push(CalendarException {
            service_id: record.service_id,
            date: record.date,
            kind,
        });
    }
    let calendar = ServiceCalendar::new(rules, exceptions);

    let mut builder = Catalog::builder();
    load_stops(&source, &mut builder)?;
    load_routes_and_trips(&source, &mut builder)?;
    load_stop_times(&source, &mut builder)?;
    load_geometries(&source, &mut builder);

    let data = builder.build();
    info!(
        "feed loaded: {} trips over {} stops",
        data.trips().count(),
        data.stops().count()
    );
    Ok((data, calendar))
}

fn load_stops(source: &GTFSSource, builder: &mut Builder) -> Result<(), FeedError> {
    let mut invalid_coordinates = 0;
    for result in source.open_csv("stops.txt")?.into_deserialize() {
        let record: model::Stop = result.map_err(|err| FeedError::malformed("stops.txt", err))?;
        let location_type = record.location_type.unwrap_or(0);
        if location_type > 1 {
            // entrances, generic nodes and boarding areas play no part in
            // planning
            continue;
        }
        let coordinates = (
            record.stop_lat.trim().parse::<f64>(),
            record.stop_lon.trim().parse::<f64>(),
        );
        let (lat, lon) = match coordinates {
            (Ok(lat), Ok(lon)) if lat.is_finite() && lon.is_finite() => (lat, lon),
            _ => {
                invalid_coordinates += 1;
                continue;
            }
        };
        builder.add_stop(
            record.stop_id,
            record.stop_name,
            geo::Point::new(lon, lat),
            record.parent_station.filter(|parent| !parent.is_empty()),
            location_type == 1,
        );
    }
    if invalid_coordinates > 0 {
        warn!(
            "dropped {} stops with invalid coordinates",
            invalid_coordinates
        );
    }
    Ok(())
}

fn load_routes_and_trips(source: &GTFSSource, builder: &mut Builder) -> Result<(), FeedError> {
    let mut route_ids = std::collections::HashSet::new();
    for result in source.open_csv("routes.txt")?.into_deserialize() {
        let record: model::Route = result.map_err(|err| FeedError::malformed("routes.txt", err))?;
        route_ids.insert(record.route_id.clone());
        builder.add_route(Route {
            route_id: record.route_id,
            route_short_name: record.route_short_name,
            route_long_name: record.route_long_name,
            route_color: record
                .route_color
                .filter(|color| !color.is_empty())
                .unwrap_or_else(|| "FFFFFF".to_owned()),
            route_text_color: record
                .route_text_color
                .filter(|color| !color.is_empty())
                .unwrap_or_else(|| "000000".to_owned()),
        });
    }

    for result in source.open_csv("trips.txt")?.into_deserialize() {
        let record: model::Trip = result.map_err(|err| FeedError::malformed("trips.txt", err))?;
        if !route_ids.contains(&record.route_id) {
            warn!(
                "trip {} references unknown route {}, skipped",
                record.trip_id, record.route_id
            );
            continue;
        }
        builder.add_trip(
            record.trip_id,
            record.route_id,
            record.service_id,
            record.trip_headsign.filter(|headsign| !headsign.is_empty()),
        );
    }
    Ok(())
}

fn load_stop_times(source: &GTFSSource, builder: &mut Builder) -> Result<(), FeedError> {
    for result in source.open_csv("stop_times.txt")?.into_deserialize() {
        let record: model::StopTime =
            result.map_err(|err| FeedError::malformed("stop_times.txt", err))?;
        builder.add_stop_time(
            &record.trip_id,
            record.stop_sequence,
            record.arrival_time,
            record.departure_time,
            record.stop_id,
        );
    }
    Ok(())
}

/// The geometry document is optional: absence or a parse failure only
/// disables arc-length interpolation
fn load_geometries(source: &GTFSSource, builder: &mut Builder) {
    let path = source.dir_path.join(GEOMETRY_FILE);
    if !path.is_file() {
        info!("no {} in feed directory, arc interpolation disabled", GEOMETRY_FILE);
        return;
    }
    match geometry::load_line_geometries(&path) {
        Ok(geometries) => {
            info!("loaded {} route geometries", geometries.len());
            for geometry in geometries {
                builder.add_geometry(geometry);
            }
        }
        Err(err) => {
            warn!(
                "{} could not be read ({}), arc interpolation disabled",
                GEOMETRY_FILE, err
            );
        }
    }
}
