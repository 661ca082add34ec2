//! Geometry wrapper with cached bounds for repeated predicate evaluation.

use crate::compute::validation::validate_geometry;
use crate::error::{GeolocateError, Result};
use geo::{Area, BooleanOps, BoundingRect, Intersects, MultiPolygon, Point, Polygon};
use geolocate_types::BoundingBox;

/// A validated multipolygon plus its overall and per-component bounds.
///
/// Predicates first reject on bounding boxes, then fall back to the exact
/// `geo` algorithms on the components whose boxes survive.
///
/// # Examples
///
/// ```
/// use geolocate::compute::PreparedGeometry;
/// use geo::{Point, polygon};
///
/// let square = polygon![(x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 2.0), (x: 0.0, y: 2.0)];
/// let prepared = PreparedGeometry::new(square).unwrap();
///
/// assert!(prepared.covers(&Point::new(1.0, 1.0)));
/// assert!(prepared.covers(&Point::new(2.0, 1.0)));
/// assert!(!prepared.covers(&Point::new(3.0, 1.0)));
/// assert_eq!(prepared.area(), 4.0);
/// ```
#[derive(Debug, Clone)]
pub struct PreparedGeometry {
    geometry: MultiPolygon<f64>,
    bbox: BoundingBox,
    component_bboxes: Vec<BoundingBox>,
    area: f64,
}

impl PreparedGeometry {
    pub fn new(geometry: impl Into<MultiPolygon<f64>>) -> Result<Self> {
        let geometry = geometry.into();
        validate_geometry(&geometry)?;

        let component_bboxes = geometry
            .0
            .iter()
            .map(polygon_bbox)
            .collect::<Result<Vec<_>>>()?;
        let bbox = component_bboxes
            .iter()
            .skip(1)
            .fold(component_bboxes[0], |acc, b| acc.union(b));
        let area = geometry.unsigned_area();

        Ok(Self {
            geometry,
            bbox,
            component_bboxes,
            area,
        })
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    /// Planar area. Zero for degenerate shapes.
    pub fn area(&self) -> f64 {
        self.area
    }

    /// True when `point` lies in the interior or on the boundary.
    pub fn covers(&self, point: &Point<f64>) -> bool {
        let (x, y) = (point.x(), point.y());
        if !self.bbox.contains_point(x, y) {
            return false;
        }
        self.components()
            .filter(|(bbox, _)| bbox.contains_point(x, y))
            .any(|(_, polygon)| polygon.intersects(point))
    }

    /// True when the two geometries share at least one point.
    pub fn intersects(&self, other: &PreparedGeometry) -> bool {
        if !self.bbox.intersects(&other.bbox) {
            return false;
        }
        self.components().any(|(bbox, polygon)| {
            bbox.intersects(&other.bbox)
                && other
                    .components()
                    .any(|(other_bbox, other_polygon)| {
                        bbox.intersects(other_bbox) && polygon.intersects(other_polygon)
                    })
        })
    }

    /// Area of the overlap between the two geometries. Boundary-only contact
    /// yields zero.
    pub fn intersection_area(&self, other: &PreparedGeometry) -> f64 {
        if !self.bbox.intersects(&other.bbox) {
            return 0.0;
        }

        let left = self.components_near(&other.bbox);
        let right = other.components_near(&self.bbox);
        if left.0.is_empty() || right.0.is_empty() {
            return 0.0;
        }

        let area = left.intersection(&right).unsigned_area();
        if area.is_finite() { area } else { 0.0 }
    }

    fn components(&self) -> impl Iterator<Item = (&BoundingBox, &Polygon<f64>)> {
        self.component_bboxes.iter().zip(self.geometry.0.iter())
    }

    fn components_near(&self, window: &BoundingBox) -> MultiPolygon<f64> {
        MultiPolygon::new(
            self.components()
                .filter(|(bbox, _)| bbox.intersects(window))
                .map(|(_, polygon)| polygon.clone())
                .collect(),
        )
    }
}

fn polygon_bbox(polygon: &Polygon<f64>) -> Result<BoundingBox> {
    polygon
        .bounding_rect()
        .map(BoundingBox::from_rect)
        .ok_or_else(|| GeolocateError::MalformedGeometry("polygon has no bounding box".to_string()))
}
