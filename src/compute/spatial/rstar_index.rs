//! [`SpatialIndex`] backed by `rstar`.
//!
//! `rstar` answers nearest-neighbour queries for points, not boxes, so the
//! box-to-box nearest query widens an envelope around the reference box
//! until it captures a candidate whose distance lies inside the window.

use super::{BulkLoad, SpatialIndex, closer};
use crate::compute::validation::validate_bbox;
use crate::config::Config;
use crate::error::{GeolocateError, Result};
use geolocate_types::{BoundingBox, IndexedEntry, UnitId};
use rstar::{AABB, RTree, RTreeObject};

/// Indexed bounding box for the R*-tree.
#[derive(Debug, Clone, PartialEq)]
struct IndexedBBox {
    id: UnitId,
    bbox: BoundingBox,
}

impl RTreeObject for IndexedBBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        to_aabb(&self.bbox)
    }
}

fn to_aabb(bbox: &BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y])
}

/// R*-tree bulk-loaded once from the full entry set.
pub struct RStarIndex {
    tree: RTree<IndexedBBox>,
    bounds: BoundingBox,
    lowest_id: UnitId,
}

impl RStarIndex {
    pub fn new(entries: Vec<IndexedEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(GeolocateError::EmptyIndex);
        }
        for entry in &entries {
            validate_bbox(&entry.bbox).map_err(|e| {
                GeolocateError::InvalidInput(format!("entry {}: {}", entry.id, e))
            })?;
        }

        let mut items: Vec<IndexedBBox> = entries
            .into_iter()
            .map(|entry| IndexedBBox {
                id: entry.id,
                bbox: entry.bbox,
            })
            .collect();
        // bulk_load partitions by selection, so feed it a canonical order.
        items.sort_by_key(|item| item.id);

        let lowest_id = items[0].id;
        let bounds = items
            .iter()
            .skip(1)
            .fold(items[0].bbox, |acc, item| acc.union(&item.bbox));

        Ok(Self {
            tree: RTree::bulk_load(items),
            bounds,
            lowest_id,
        })
    }

    fn best_within(&self, window: &BoundingBox, reference: &BoundingBox) -> Option<(f64, UnitId)> {
        self.tree
            .locate_in_envelope_intersecting(&to_aabb(window))
            .map(|item| (item.bbox.distance(reference), item.id))
            .fold(None, |best, candidate| {
                if closer(candidate, best) {
                    Some(candidate)
                } else {
                    best
                }
            })
    }
}

impl BulkLoad for RStarIndex {
    /// `node_capacity` does not apply: `rstar` uses its default parameters.
    fn bulk_load(entries: Vec<IndexedEntry>, _config: &Config) -> Result<Self> {
        Self::new(entries)
    }
}

impl SpatialIndex for RStarIndex {
    fn range_query(&self, query: &BoundingBox) -> Vec<UnitId> {
        if !query.is_finite() {
            log::warn!("Rejecting bounding box query with non-finite coordinates");
            return Vec::new();
        }

        self.tree
            .locate_in_envelope_intersecting(&to_aabb(query))
            .map(|item| item.id)
            .collect()
    }

    fn nearest_query(&self, reference: &BoundingBox) -> UnitId {
        if !reference.is_finite() {
            log::warn!("Nearest query with non-finite coordinates, returning lowest id");
            return self.lowest_id;
        }

        // Any entry within Euclidean distance r of the reference intersects
        // the reference expanded by r, so a hit at distance <= r is final.
        let scale = 1.0 + self.bounds.width() + self.bounds.height();
        let mut radius = reference.distance(&self.bounds).max(scale * 1e-9);

        loop {
            let window = reference.expand(radius);
            match self.best_within(&window, reference) {
                Some((distance, id)) if distance <= radius => return id,
                Some((distance, _)) => radius = distance,
                None if window.contains(&self.bounds) => return self.lowest_id,
                None => radius *= 2.0,
            }
        }
    }

    fn len(&self) -> usize {
        self.tree.size()
    }

    fn bounds(&self) -> BoundingBox {
        self.bounds
    }
}
