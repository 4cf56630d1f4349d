use chrono::NaiveDateTime;

use transit_planner::{Config, Engine, TripState};

fn now_local() -> NaiveDateTime {
    let zone: chrono_tz::Tz = std::env::var("PLANNER_TZ")
        .ok()
        .and_then(|name| name.parse().ok())
        .unwrap_or(chrono_tz::Europe::Berlin);
    chrono::Utc::now().with_timezone(&zone).naive_local()
}

fn main() {
    env_logger::init();
    let engine = Engine::load(Config::from_env()).unwrap();

    let now = now_local();
    let active = engine.active_trips(now);
    eprintln!("{} vehicles in service at {}", active.len(), now);

    for vehicle in &active {
        let position = match engine.position_of(&vehicle.trip_id, &vehicle.state) {
            Some(position) => position,
            None => continue,
        };
        let state = match &vehicle.state {
            TripState::Dwell { stop_id, .. } => format!("dwelling at {}", stop_id),
            TripState::Move { progress, .. } => format!("moving ({:>3.0}%)", progress * 100.0),
        };
        println!(
            "{:<6} -> {:<28} {:9.5},{:9.5} bearing {:>4.0}  {}",
            vehicle.route_short_name,
            vehicle.destination,
            position.lat,
            position.lon,
            position.bearing,
            state
        );
    }
}
