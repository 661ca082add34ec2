//! GeoJSON ingestion of geoBoundaries-style FeatureCollections.
//!
//! Property conventions:
//! - `shapeName`: display name, the configured unnamed marker when absent
//! - `shapeGroup`: country code; it is the unit code at the country level
//!   and the group code below it
//! - `shapeID` (or `shapeId`): unit code below the country level

use crate::assign::FailureRecord;
use crate::config::Config;
use crate::error::{GeolocateError, Result};
use crate::storage::{Boundary, MemoryRepository, Properties};
use geo::{Area, Coord, LineString, MultiPolygon, Polygon, Simplify};
use geojson::{Feature, GeoJson, Value};
use geolocate_types::{Level, UnitId};
use std::path::Path;

/// Largest relative area change a simplified polygon may show. Beyond it
/// the raw polygon is kept.
const MAX_SIMPLIFY_AREA_CHANGE: f64 = 0.01;

/// Outcome of ingesting one collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub inserted: Vec<UnitId>,
    pub failures: Vec<FailureRecord>,
}

/// Parses a FeatureCollection and inserts every usable feature as a unit of
/// `level`.
///
/// Features without a polygonal geometry are reported as failures. Only a
/// document that is not a FeatureCollection at all is an error.
pub fn ingest_feature_collection(
    repo: &mut MemoryRepository,
    level: Level,
    geojson: &str,
    config: &Config,
) -> Result<IngestReport> {
    let parsed: GeoJson = geojson
        .parse()
        .map_err(|e| GeolocateError::InvalidInput(format!("Failed to parse GeoJSON: {}", e)))?;
    let GeoJson::FeatureCollection(collection) = parsed else {
        return Err(GeolocateError::InvalidInput(
            "GeoJSON document is not a FeatureCollection".to_string(),
        ));
    };

    let tolerance = config.simplify.tolerance(level);
    let total = collection.features.len();
    let interval = config.progress_interval;
    let mut report = IngestReport::default();

    for (idx, feature) in collection.features.into_iter().enumerate() {
        let properties = feature.properties.clone().unwrap_or_default();
        match boundary_from_feature(feature, level, tolerance, config) {
            Ok(boundary) => match repo.insert(level, boundary) {
                Ok(id) => report.inserted.push(id),
                Err(err) => report.failures.push(failure(level, idx, properties, &err)),
            },
            Err(err) => report.failures.push(failure(level, idx, properties, &err)),
        }
        if interval > 0 && (idx + 1) % interval == 0 {
            log::info!("Ingested {}/{} {} features", idx + 1, total, level);
        }
    }

    log::info!(
        "Ingested {} {} units ({} failed)",
        report.inserted.len(),
        level,
        report.failures.len()
    );
    Ok(report)
}

/// Reads a FeatureCollection from disk. See [`ingest_feature_collection`].
pub fn ingest_file(
    repo: &mut MemoryRepository,
    level: Level,
    path: impl AsRef<Path>,
    config: &Config,
) -> Result<IngestReport> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    ingest_feature_collection(repo, level, &contents, config)
}

fn failure(level: Level, idx: usize, properties: Properties, err: &GeolocateError) -> FailureRecord {
    log::warn!("Skipping {} feature {}: {}", level, idx, err);
    FailureRecord::new(properties, err)
}

fn boundary_from_feature(
    feature: Feature,
    level: Level,
    tolerance: Option<f64>,
    config: &Config,
) -> Result<Boundary> {
    let properties = feature.properties.unwrap_or_default();
    let text = |key: &str| {
        properties
            .get(key)
            .and_then(|value| value.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let name = text("shapeName").unwrap_or_else(|| config.unnamed_marker.clone());
    let group_code = text("shapeGroup");
    let code = match level {
        Level::Country => group_code.clone(),
        Level::State | Level::Municipality => text("shapeID").or_else(|| text("shapeId")),
    }
    .unwrap_or_default();

    let geometry = feature
        .geometry
        .ok_or_else(|| GeolocateError::MalformedGeometry("feature has no geometry".to_string()))?;
    let raw = multipolygon_from_value(geometry.value)?;
    let simplified = tolerance
        .filter(|tolerance| *tolerance > 0.0)
        .map(|tolerance| simplify_polygons(&raw, tolerance));

    let mut boundary = Boundary::new(code, name, raw)?.with_properties(properties);
    if let Some(simplified) = simplified {
        boundary = boundary.with_simplified(simplified)?;
    }
    if let Some(group_code) = group_code.filter(|_| level != Level::Country) {
        boundary = boundary.with_group_code(group_code);
    }
    Ok(boundary)
}

/// Douglas-Peucker per polygon. Polygons the tolerance would collapse or
/// visibly shrink stay as they are.
fn simplify_polygons(raw: &MultiPolygon<f64>, tolerance: f64) -> MultiPolygon<f64> {
    MultiPolygon::new(
        raw.0
            .iter()
            .map(|polygon| {
                let simplified = polygon.simplify(&tolerance);
                let area = polygon.unsigned_area();
                let change = (simplified.unsigned_area() - area).abs();
                if simplified.exterior().0.len() >= 4 && change <= area * MAX_SIMPLIFY_AREA_CHANGE {
                    simplified
                } else {
                    polygon.clone()
                }
            })
            .collect(),
    )
}

fn multipolygon_from_value(value: Value) -> Result<MultiPolygon<f64>> {
    match value {
        Value::Polygon(rings) => Ok(MultiPolygon::new(vec![polygon_from_rings(rings)?])),
        Value::MultiPolygon(polygons) => Ok(MultiPolygon::new(
            polygons
                .into_iter()
                .map(polygon_from_rings)
                .collect::<Result<Vec<_>>>()?,
        )),
        Value::GeometryCollection(geometries) => {
            let mut polygons = Vec::new();
            for geometry in geometries {
                polygons.extend(multipolygon_from_value(geometry.value)?.0);
            }
            Ok(MultiPolygon::new(polygons))
        }
        Value::Point(_) => Err(unsupported("Point")),
        Value::MultiPoint(_) => Err(unsupported("MultiPoint")),
        Value::LineString(_) => Err(unsupported("LineString")),
        Value::MultiLineString(_) => Err(unsupported("MultiLineString")),
    }
}

fn unsupported(kind: &str) -> GeolocateError {
    GeolocateError::MalformedGeometry(format!("unsupported geometry type: {}", kind))
}

fn polygon_from_rings(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon<f64>> {
    let mut rings = rings.into_iter().map(line_string);
    let exterior = rings
        .next()
        .ok_or_else(|| GeolocateError::MalformedGeometry("polygon has no rings".to_string()))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn line_string(positions: Vec<Vec<f64>>) -> Result<LineString<f64>> {
    positions
        .into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(GeolocateError::MalformedGeometry(
                "position must have at least 2 coordinates".to_string(),
            )),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}
