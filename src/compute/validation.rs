//! Validation for query coordinates and boundary geometry.

use crate::error::{GeolocateError, Result};
use geo::{CoordsIter, MultiPolygon};
use geolocate_types::BoundingBox;

/// Validates a query location given as latitude / longitude.
///
/// Longitude: [-180.0, 180.0], Latitude: [-90.0, 90.0]
///
/// # Examples
///
/// ```
/// use geolocate::compute::validation::validate_lat_lon;
///
/// assert!(validate_lat_lon(50.638793, 5.563240).is_ok());
/// assert!(validate_lat_lon(95.0, 5.0).is_err());
/// assert!(validate_lat_lon(50.0, f64::NAN).is_err());
/// ```
pub fn validate_lat_lon(lat: f64, lon: f64) -> Result<()> {
    if !lon.is_finite() {
        return Err(GeolocateError::InvalidInput(format!(
            "Longitude must be finite, got: {}",
            lon
        )));
    }

    if !lat.is_finite() {
        return Err(GeolocateError::InvalidInput(format!(
            "Latitude must be finite, got: {}",
            lat
        )));
    }

    if !(-180.0..=180.0).contains(&lon) {
        return Err(GeolocateError::InvalidInput(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            lon
        )));
    }

    if !(-90.0..=90.0).contains(&lat) {
        return Err(GeolocateError::InvalidInput(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            lat
        )));
    }

    Ok(())
}

/// Validates a bounding box destined for a spatial index.
pub fn validate_bbox(bbox: &BoundingBox) -> Result<()> {
    if !bbox.is_finite() {
        return Err(GeolocateError::InvalidInput(format!(
            "Bounding box coordinates must be finite, got: {:?}",
            bbox
        )));
    }
    if bbox.min_x > bbox.max_x || bbox.min_y > bbox.max_y {
        return Err(GeolocateError::InvalidInput(format!(
            "Bounding box min exceeds max: {:?}",
            bbox
        )));
    }
    Ok(())
}

/// Checks that a geometry can take part in predicate evaluation.
///
/// Empty geometries and non-finite coordinates are malformed. Zero-area and
/// self-intersecting rings pass: they are degenerate, not malformed.
///
/// # Examples
///
/// ```
/// use geolocate::compute::validation::validate_geometry;
/// use geo::{MultiPolygon, polygon};
///
/// let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
/// assert!(validate_geometry(&MultiPolygon::new(vec![square])).is_ok());
/// assert!(validate_geometry(&MultiPolygon::new(vec![])).is_err());
/// ```
pub fn validate_geometry(geometry: &MultiPolygon<f64>) -> Result<()> {
    if geometry.0.is_empty() || geometry.coords_count() == 0 {
        return Err(GeolocateError::MalformedGeometry(
            "geometry has no coordinates".to_string(),
        ));
    }

    for (poly_idx, polygon) in geometry.0.iter().enumerate() {
        if polygon.exterior().0.is_empty() {
            return Err(GeolocateError::MalformedGeometry(format!(
                "polygon {} has an empty exterior ring",
                poly_idx
            )));
        }

        for (idx, coord) in polygon.exterior().coords().enumerate() {
            if !coord.x.is_finite() || !coord.y.is_finite() {
                return Err(GeolocateError::MalformedGeometry(format!(
                    "polygon {} exterior ring point at index {} is not finite: ({}, {})",
                    poly_idx, idx, coord.x, coord.y
                )));
            }
        }

        for (ring_idx, interior) in polygon.interiors().iter().enumerate() {
            for (idx, coord) in interior.coords().enumerate() {
                if !coord.x.is_finite() || !coord.y.is_finite() {
                    return Err(GeolocateError::MalformedGeometry(format!(
                        "polygon {} interior ring {} point at index {} is not finite: ({}, {})",
                        poly_idx, ring_idx, idx, coord.x, coord.y
                    )));
                }
            }
        }
    }

    Ok(())
}
