use chrono::NaiveDateTime;

use transit_planner::{Config, Engine};

fn now_local() -> NaiveDateTime {
    let zone: chrono_tz::Tz = std::env::var("PLANNER_TZ")
        .ok()
        .and_then(|name| name.parse().ok())
        .unwrap_or(chrono_tz::Europe::Berlin);
    chrono::Utc::now().with_timezone(&zone).naive_local()
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("usage: departures <stop name prefix>");
        std::process::exit(2);
    }
    let query = args[1..].join(" ");

    let engine = Engine::load(Config::from_env()).unwrap();
    let matches = engine.search_stops_by_name_prefix(&query, 5);
    let stop = match matches.first() {
        Some(stop) => *stop,
        None => {
            eprintln!("no stops matching \"{}\"", query);
            std::process::exit(1);
        }
    };
    if matches.len() > 1 {
        eprintln!(
            "{} matches, showing {}",
            matches.len(),
            stop.stop_name
        );
    }

    println!("Departures at {}", stop.stop_name);
    for departure in engine.upcoming_departures(&stop.stop_id, now_local(), None) {
        println!(
            "{}  {:<6} {}",
            departure.departure_time, departure.route_short_name, departure.destination
        );
    }
}
