//! Repository and index-store abstractions.
//!
//! A [`GeometryRepository`] owns boundary metadata and geometry payloads; the
//! index and the assigner only ever see ids, bounding boxes and handles. A
//! [`PersistedIndexStore`] receives the bounding-box rows and parent
//! assignments produced by a build.

use crate::error::Result;
use geo::MultiPolygon;
use geolocate_types::{AdministrativeUnit, BoundingBox, GeometryHandle, IndexedEntry, Level, UnitId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod memory;

pub use memory::{Boundary, MemoryIndexStore, MemoryRepository};

/// Free-form feature properties carried alongside a boundary.
pub type Properties = serde_json::Map<String, serde_json::Value>;

/// Metadata row for one boundary, as loaded from a repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryRecord {
    pub id: UnitId,
    pub level: Level,
    pub code: String,
    pub name: String,
    /// Country code carried by lower-level features, used to link states
    /// to countries without a geometric test.
    #[serde(default)]
    pub group_code: Option<String>,
    pub bbox: BoundingBox,
    pub handle: GeometryHandle,
    #[serde(default)]
    pub properties: Properties,
}

impl BoundaryRecord {
    pub fn entry(&self) -> IndexedEntry {
        IndexedEntry::new(self.id, self.bbox)
    }

    /// Unit without a parent link.
    pub fn to_unit(&self) -> AdministrativeUnit {
        AdministrativeUnit::new(
            self.id,
            self.level,
            self.code.clone(),
            self.name.clone(),
            self.bbox,
            self.handle,
        )
    }
}

/// Bounding-box row written to the index store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBoxRow {
    pub id: UnitId,
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl BBoxRow {
    pub fn bbox(&self) -> BoundingBox {
        BoundingBox::new(self.min_x, self.min_y, self.max_x, self.max_y)
    }
}

impl From<IndexedEntry> for BBoxRow {
    fn from(entry: IndexedEntry) -> Self {
        Self {
            id: entry.id,
            min_x: entry.bbox.min_x,
            max_x: entry.bbox.max_x,
            min_y: entry.bbox.min_y,
            max_y: entry.bbox.max_y,
        }
    }
}

/// Source of boundary metadata and geometry.
pub trait GeometryRepository: Send + Sync {
    /// All boundaries of one level, in id order.
    fn load_all(&self, level: Level) -> Result<Vec<BoundaryRecord>>;

    /// Id of the unit of `level` registered under `code`, if any.
    fn lookup_id_by_code(&self, level: Level, code: &str) -> Result<Option<UnitId>>;

    /// Full geometry behind a handle.
    fn materialize(&self, handle: &GeometryHandle) -> Result<MultiPolygon<f64>>;

    /// Geometry used for point lookups. Repositories that keep a simplified
    /// copy return it here; the full geometry otherwise.
    fn materialize_simplified(&self, handle: &GeometryHandle) -> Result<MultiPolygon<f64>> {
        self.materialize(handle)
    }
}

impl<T: GeometryRepository + ?Sized> GeometryRepository for &T {
    fn load_all(&self, level: Level) -> Result<Vec<BoundaryRecord>> {
        (**self).load_all(level)
    }

    fn lookup_id_by_code(&self, level: Level, code: &str) -> Result<Option<UnitId>> {
        (**self).lookup_id_by_code(level, code)
    }

    fn materialize(&self, handle: &GeometryHandle) -> Result<MultiPolygon<f64>> {
        (**self).materialize(handle)
    }

    fn materialize_simplified(&self, handle: &GeometryHandle) -> Result<MultiPolygon<f64>> {
        (**self).materialize_simplified(handle)
    }
}

impl<T: GeometryRepository + ?Sized> GeometryRepository for Arc<T> {
    fn load_all(&self, level: Level) -> Result<Vec<BoundaryRecord>> {
        (**self).load_all(level)
    }

    fn lookup_id_by_code(&self, level: Level, code: &str) -> Result<Option<UnitId>> {
        (**self).lookup_id_by_code(level, code)
    }

    fn materialize(&self, handle: &GeometryHandle) -> Result<MultiPolygon<f64>> {
        (**self).materialize(handle)
    }

    fn materialize_simplified(&self, handle: &GeometryHandle) -> Result<MultiPolygon<f64>> {
        (**self).materialize_simplified(handle)
    }
}

/// Sink for build output.
pub trait PersistedIndexStore {
    /// Record that `child` (of `level`) belongs to `parent` one level up.
    fn write_assignment(&mut self, level: Level, child: UnitId, parent: UnitId) -> Result<()>;

    fn write_bbox_row(&mut self, level: Level, row: BBoxRow) -> Result<()>;

    /// Make every previous write durable.
    fn flush(&mut self) -> Result<()>;
}
