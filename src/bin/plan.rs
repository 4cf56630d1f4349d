use chrono::{NaiveDateTime, NaiveTime};

use transit_planner::{Config, Engine, LatLon};

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
    if args.len() < 5 {
        eprintln!("usage: plan <from-lat> <from-lon> <to-lat> <to-lon> [HH:MM:SS]");
        std::process::exit(2);
    }
    let from = LatLon::new(args[1].parse().unwrap(), args[2].parse().unwrap());
    let to = LatLon::new(args[3].parse().unwrap(), args[4].parse().unwrap());

    let engine = Engine::load(Config::from_env()).unwrap();
    let now = now_local();
    let depart = match args.get(5) {
        Some(text) => now
            .date()
            .and_time(NaiveTime::parse_from_str(text, "%H:%M:%S").unwrap()),
        None => now,
    };

    let outcome = engine.find_itinerary(from, to, depart);
    println!("{}", serde_json::to_string_pretty(&outcome).unwrap());
}
