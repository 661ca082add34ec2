use geo::{Coord, Point, Rect};
use serde::{Deserialize, Serialize};

/// A 2D axis-aligned bounding box in decimal degrees.
///
/// The constructor normalizes swapped corners so that `min_x <= max_x` and
/// `min_y <= max_y` always hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum x (longitude)
    pub min_x: f64,
    /// Minimum y (latitude)
    pub min_y: f64,
    /// Maximum x (longitude)
    pub max_x: f64,
    /// Maximum y (latitude)
    pub max_y: f64,
}

impl BoundingBox {
    /// Create a new bounding box from minimum and maximum coordinates.
    ///
    /// # Examples
    ///
    /// ```
    /// use geolocate_types::bbox::BoundingBox;
    ///
    /// let bbox = BoundingBox::new(2.0, 3.0, 0.0, 1.0);
    /// assert_eq!(bbox.min_x, 0.0);
    /// assert_eq!(bbox.max_y, 3.0);
    /// ```
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// Degenerate box covering exactly one point.
    pub fn point(x: f64, y: f64) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
        }
    }

    /// Create a bounding box from a `geo::Rect`.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }

    /// Convert into a `geo::Rect`.
    pub fn to_rect(&self) -> Rect {
        Rect::new(
            Coord {
                x: self.min_x,
                y: self.min_y,
            },
            Coord {
                x: self.max_x,
                y: self.max_y,
            },
        )
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Get the center point of the bounding box.
    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// True when every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite()
            && self.min_y.is_finite()
            && self.max_x.is_finite()
            && self.max_y.is_finite()
    }

    /// Check if a point is contained within this bounding box (edges included).
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Check if `other` lies entirely inside this box.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Check if this bounding box intersects with another. Touching edges count.
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }

    /// Minimum Euclidean distance between the two boxes, zero when they overlap.
    pub fn distance(&self, other: &BoundingBox) -> f64 {
        let dx = (other.min_x - self.max_x).max(self.min_x - other.max_x).max(0.0);
        let dy = (other.min_y - self.max_y).max(self.min_y - other.max_y).max(0.0);
        dx.hypot(dy)
    }

    /// Smallest box enclosing both.
    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Expand the bounding box by a given amount in all directions.
    pub fn expand(&self, amount: f64) -> Self {
        Self::new(
            self.min_x - amount,
            self.min_y - amount,
            self.max_x + amount,
            self.max_y + amount,
        )
    }
}

impl From<Rect> for BoundingBox {
    fn from(rect: Rect) -> Self {
        Self::from_rect(rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bbox_creation_normalizes_corners() {
        let bbox = BoundingBox::new(10.0, 10.0, 0.0, 0.0);
        assert_eq!(bbox.min_x, 0.0);
        assert_eq!(bbox.min_y, 0.0);
        assert_eq!(bbox.max_x, 10.0);
        assert_eq!(bbox.max_y, 10.0);
    }

    #[test]
    fn test_bbox_dimensions() {
        let bbox = BoundingBox::new(0.0, 0.0, 10.0, 5.0);
        assert_eq!(bbox.width(), 10.0);
        assert_eq!(bbox.height(), 5.0);
        assert_eq!(bbox.area(), 50.0);
        assert_eq!(bbox.center(), Point::new(5.0, 2.5));
    }

    #[test]
    fn test_bbox_contains_point_includes_edges() {
        let bbox = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!(bbox.contains_point(0.5, 0.5));
        assert!(bbox.contains_point(1.0, 0.0));
        assert!(!bbox.contains_point(1.0001, 0.5));
    }

    #[test]
    fn test_bbox_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(1.0, 0.0, 2.0, 1.0);
        let c = BoundingBox::new(3.0, 3.0, 4.0, 4.0);

        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&BoundingBox::point(0.5, 0.5)));
    }

    #[test]
    fn test_bbox_distance() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(a.distance(&BoundingBox::new(0.5, 0.5, 2.0, 2.0)), 0.0);
        assert_eq!(a.distance(&BoundingBox::new(3.0, 0.0, 4.0, 1.0)), 2.0);
        assert_eq!(a.distance(&BoundingBox::new(4.0, 5.0, 6.0, 6.0)), 5.0);
    }

    #[test]
    fn test_bbox_union_and_expand() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let b = BoundingBox::new(2.0, -1.0, 3.0, 0.5);
        assert_eq!(a.union(&b), BoundingBox::new(0.0, -1.0, 3.0, 1.0));
        assert_eq!(a.expand(1.0), BoundingBox::new(-1.0, -1.0, 2.0, 2.0));
        assert!(a.union(&b).contains(&a));
    }

    #[test]
    fn test_bbox_rect_conversion() {
        let bbox = BoundingBox::new(-74.0479, 40.6829, -73.9067, 40.8820);
        assert_eq!(BoundingBox::from_rect(bbox.to_rect()), bbox);
    }
}
