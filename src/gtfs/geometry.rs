//! The optional line-geometry document: a GeoJSON feature collection whose
//! features carry a `route_id` property and a `LineString` geometry with
//! longitude-first vertices.

use std::path::Path;

use geojson::{GeoJson, Value};
use log::debug;

use journey_search::search_data::LineGeometry;

/// Parse every usable LineString feature of the document. Features without a
/// `route_id` or with a non-LineString geometry are skipped.
pub fn load_line_geometries(
    path: &Path,
) -> Result<Vec<LineGeometry>, Box<dyn std::error::Error + Send + Sync>> {
    let text = std::fs::read_to_string(path)?;
    let document: GeoJson = text.parse()?;
    let collection = match document {
        GeoJson::FeatureCollection(collection) => collection,
        _ => return Err("geometry document is not a feature collection".into()),
    };

    let mut geometries = Vec::new();
    for feature in collection.features {
        let route_id = feature
            .properties
            .as_ref()
            .and_then(|properties| properties.get("route_id"))
            .and_then(|value| value.as_str())
            .map(str::to_owned);
        let route_id = match route_id {
            Some(route_id) => route_id,
            None => {
                debug!("skipping geometry feature without a route_id");
                continue;
            }
        };
        let line = match feature.geometry.as_ref().map(|geometry| &geometry.value) {
            Some(Value::LineString(line)) => line,
            _ => {
                debug!("skipping non-LineString geometry for route {}", route_id);
                continue;
            }
        };
        let points: Vec<geo::Point<f64>> = line
            .iter()
            .filter(|position| position.len() >= 2)
            .map(|position| geo::Point::new(position[0], position[1]))
            .collect();
        if points.len() < 2 {
            debug!("skipping degenerate geometry for route {}", route_id);
            continue;
        }
        geometries.push(LineGeometry { route_id, points });
    }
    Ok(geometries)
}
