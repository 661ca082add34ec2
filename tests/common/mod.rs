//! Shared fixture: a slice of Belgium and the Netherlands as geoBoundaries
//! FeatureCollections, with rectangular shapes.

#![allow(dead_code)]

use geolocate::prelude::*;
use geolocate::{IngestReport, ingest_feature_collection};
use serde_json::{Value, json};

pub const LIEGE_LAT: f64 = 50.638793;
pub const LIEGE_LON: f64 = 5.563240;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn rect_feature(properties: Value, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Value {
    json!({
        "type": "Feature",
        "properties": properties,
        "geometry": {
            "type": "Polygon",
            "coordinates": [[
                [min_x, min_y], [max_x, min_y], [max_x, max_y], [min_x, max_y], [min_x, min_y]
            ]]
        }
    })
}

pub fn collection(features: Vec<Value>) -> String {
    json!({"type": "FeatureCollection", "features": features}).to_string()
}

pub fn countries() -> String {
    collection(vec![
        rect_feature(json!({"shapeName": "Belgium", "shapeGroup": "BEL"}), 2.5, 49.5, 6.4, 51.5),
        rect_feature(json!({"shapeName": "Netherlands", "shapeGroup": "NLD"}), 3.3, 51.5, 7.2, 53.5),
    ])
}

pub fn states() -> String {
    collection(vec![
        rect_feature(
            json!({"shapeName": "Liège", "shapeID": "BEL-ADM1-4", "shapeGroup": "BEL"}),
            5.0, 50.1, 6.4, 50.8,
        ),
        rect_feature(
            json!({"shapeName": "Limburg", "shapeID": "BEL-ADM1-2", "shapeGroup": "BEL"}),
            4.9, 50.8, 5.9, 51.3,
        ),
        rect_feature(
            json!({"shapeName": "Namur", "shapeID": "BEL-ADM1-7", "shapeGroup": "BEL"}),
            4.3, 50.0, 5.0, 50.6,
        ),
        rect_feature(
            json!({"shapeName": "Zeeland", "shapeID": "NLD-ADM1-11", "shapeGroup": "NLD"}),
            3.3, 51.5, 4.3, 51.8,
        ),
    ])
}

pub fn municipalities() -> String {
    collection(vec![
        rect_feature(
            json!({"shapeName": "Liège", "shapeID": "BEL-ADM2-1", "shapeGroup": "BEL"}),
            5.5, 50.58, 5.65, 50.69,
        ),
        rect_feature(
            json!({"shapeName": "Seraing", "shapeID": "BEL-ADM2-2", "shapeGroup": "BEL"}),
            5.45, 50.55, 5.5, 50.62,
        ),
        rect_feature(
            json!({"shapeName": "Hasselt", "shapeID": "BEL-ADM2-3", "shapeGroup": "BEL"}),
            5.28, 50.88, 5.4, 50.98,
        ),
        rect_feature(
            json!({"shapeName": "Namur", "shapeID": "BEL-ADM2-4", "shapeGroup": "BEL"}),
            4.78, 50.41, 4.93, 50.5,
        ),
        // Half inside Zeeland, half outside every state
        rect_feature(
            json!({"shapeName": "Middelburg", "shapeID": "NLD-ADM2-5", "shapeGroup": "NLD"}),
            3.55, 51.47, 3.66, 51.53,
        ),
        json!({
            "type": "Feature",
            "properties": {"shapeName": "Ghost", "shapeID": "BEL-ADM2-9"},
            "geometry": null
        }),
        // Overlaps no state at all
        rect_feature(
            json!({"shapeName": "Offshore", "shapeID": "BEL-ADM2-6", "shapeGroup": "BEL"}),
            3.0, 51.0, 3.1, 51.1,
        ),
    ])
}

/// Repository filled from the three collections, plus the ingestion reports
/// in level order.
pub fn fixture_repo(config: &Config) -> (MemoryRepository, Vec<IngestReport>) {
    let mut repo = MemoryRepository::new();
    let reports = [
        (Level::Country, countries()),
        (Level::State, states()),
        (Level::Municipality, municipalities()),
    ]
    .into_iter()
    .map(|(level, geojson)| {
        ingest_feature_collection(&mut repo, level, &geojson, config).expect("fixture ingests")
    })
    .collect();
    (repo, reports)
}
