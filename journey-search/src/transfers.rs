use geo::algorithm::haversine_distance::HaversineDistance;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::search_data::{Catalog, Stop, StopId};
use crate::time::Duration;

/// meters of latitude per degree, used to bound the candidate sweep
const METERS_PER_LAT_DEGREE: f64 = 111_320.0;

/// A foot connection from one master stop to another
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub to_stop_id: StopId,
    pub walk: Duration,
    pub distance_m: f64,
}

/// Pre-computed foot transfers between every pair of master stops within the
/// walking radius. Symmetric by construction, stored in both directions for
/// direct lookup.
#[derive(Serialize, Deserialize)]
pub struct TransferIndex {
    outgoing: HashMap<StopId, Vec<Transfer>>,
    max_walk_meters: f64,
    walk_speed_mps: f64,
}

impl TransferIndex {
    /// Scan all master-stop pairs within the radius. Candidates are pruned by
    /// a latitude sweep before the great-circle test, so the quadratic pair
    /// scan only touches stops that are vertically close.
    pub fn build(data: &Catalog, max_walk_meters: f64, walk_speed_mps: f64) -> TransferIndex {
        let mut masters: Vec<&Stop> = data.master_stops().collect();
        masters.sort_by(|a, b| {
            a.location
                .y()
                .partial_cmp(&b.location.y())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let lat_window = max_walk_meters / METERS_PER_LAT_DEGREE;

        let mut outgoing: HashMap<StopId, Vec<Transfer>> = HashMap::new();
        let mut transfer_count = 0;
        for (i, a) in masters.iter().enumerate() {
            for b in masters[i + 1..].iter() {
                if b.location.y() - a.location.y() > lat_window {
                    break;
                }
                let distance_m = a.location.haversine_distance(&b.location);
                if distance_m > max_walk_meters {
                    continue;
                }
                let walk = walk_duration(distance_m, walk_speed_mps);
                outgoing.entry(a.stop_id.clone()).or_default().push(Transfer {
                    to_stop_id: b.stop_id.clone(),
                    walk,
                    distance_m,
                });
                outgoing.entry(b.stop_id.clone()).or_default().push(Transfer {
                    to_stop_id: a.stop_id.clone(),
                    walk,
                    distance_m,
                });
                transfer_count += 2;
            }
        }
        info!(
            "{} foot transfers between {} master stops within {}m",
            transfer_count,
            masters.len(),
            max_walk_meters
        );
        TransferIndex {
            outgoing,
            max_walk_meters,
            walk_speed_mps,
        }
    }

    /// Outgoing transfers of a master stop, empty if it has none in range
    pub fn from_stop(&self, stop_id: &str) -> &[Transfer] {
        self.outgoing
            .get(stop_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn max_walk_meters(&self) -> f64 {
        self.max_walk_meters
    }

    /// Walking time for a distance at the configured speed
    pub fn walk_time(&self, distance_m: f64) -> Duration {
        walk_duration(distance_m, self.walk_speed_mps)
    }

    /// Every master stop within the walking radius of a free coordinate,
    /// with its great-circle distance
    pub fn masters_within_radius<'r>(
        &self,
        data: &'r Catalog,
        point: geo::Point<f64>,
    ) -> Vec<(&'r Stop, f64)> {
        data.master_stops()
            .filter_map(|stop| {
                let distance_m = point.haversine_distance(&stop.location);
                if distance_m <= self.max_walk_meters {
                    Some((stop, distance_m))
                } else {
                    None
                }
            })
            .collect()
    }
}

/// seconds to walk a distance, rounded up to whole seconds
fn walk_duration(distance_m: f64, walk_speed_mps: f64) -> Duration {
    Duration::seconds((distance_m / walk_speed_mps).ceil() as i32)
}
