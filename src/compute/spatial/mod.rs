//! Static spatial indexes over boundary bounding boxes.
//!
//! [`SpatialIndex`] is the capability the assigner and the geocoder rely on:
//! a bbox-level range query that never misses a true candidate, and a
//! nearest query with a deterministic lowest-id tie-break. Indexes are built
//! once through [`BulkLoad`] and never mutated afterwards.
//!
//! Two implementations are provided:
//! - [`StrTree`]: sort-tile-recursive packed R-tree with configurable fanout
//! - [`RStarIndex`]: backed by `rstar::RTree::bulk_load`

use crate::config::Config;
use crate::error::Result;
use geolocate_types::{BoundingBox, IndexedEntry, UnitId};

pub mod prepared;
pub mod rstar_index;
pub mod str_tree;

pub use prepared::PreparedGeometry;
pub use rstar_index::RStarIndex;
pub use str_tree::StrTree;

/// Read-only spatial index over `(id, bbox)` entries.
pub trait SpatialIndex: Send + Sync {
    /// Ids of every entry whose bbox overlaps `query` (touching counts).
    ///
    /// This is a bbox-level candidate set: it may contain false positives
    /// with respect to the real geometry, never false negatives.
    fn range_query(&self, query: &BoundingBox) -> Vec<UnitId>;

    /// Entry with the smallest box-to-box distance to `reference`, lowest id
    /// on ties. Never fails on a built index.
    fn nearest_query(&self, reference: &BoundingBox) -> UnitId;

    /// Number of indexed entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bounding box of all entries.
    fn bounds(&self) -> BoundingBox;
}

/// One-shot construction from a complete entry set.
pub trait BulkLoad: SpatialIndex + Sized {
    /// Fails with [`GeolocateError::EmptyIndex`](crate::GeolocateError::EmptyIndex)
    /// when `entries` is empty.
    fn bulk_load(entries: Vec<IndexedEntry>, config: &Config) -> Result<Self>;
}

/// Best `(distance, id)` so far, ordered by distance then id.
pub(crate) fn closer(candidate: (f64, UnitId), best: Option<(f64, UnitId)>) -> bool {
    match best {
        None => true,
        Some((best_dist, best_id)) => candidate
            .0
            .total_cmp(&best_dist)
            .then(candidate.1.cmp(&best_id))
            .is_lt(),
    }
}
