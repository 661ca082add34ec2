//! In-memory repository and index store.

use super::{BBoxRow, BoundaryRecord, GeometryRepository, PersistedIndexStore, Properties};
use crate::compute::validation::{validate_bbox, validate_geometry};
use crate::error::{GeolocateError, Result};
use geo::{BoundingRect, MultiPolygon};
use geolocate_types::{BoundingBox, GeometryHandle, Level, UnitId};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};

/// A boundary waiting to be inserted into a [`MemoryRepository`].
#[derive(Debug, Clone)]
pub struct Boundary {
    code: String,
    name: String,
    group_code: Option<String>,
    properties: Properties,
    bbox: BoundingBox,
    geometry: MultiPolygon<f64>,
    simplified: Option<MultiPolygon<f64>>,
}

impl Boundary {
    /// Fails with `MalformedGeometry` when the geometry is empty or has
    /// non-finite coordinates.
    pub fn new(
        code: impl Into<String>,
        name: impl Into<String>,
        geometry: impl Into<MultiPolygon<f64>>,
    ) -> Result<Self> {
        let geometry = geometry.into();
        validate_geometry(&geometry)?;
        let bbox = geometry
            .bounding_rect()
            .map(BoundingBox::from_rect)
            .ok_or_else(|| GeolocateError::MalformedGeometry("geometry has no bounding box".to_string()))?;

        Ok(Self {
            code: code.into(),
            name: name.into(),
            group_code: None,
            properties: Properties::new(),
            bbox,
            geometry,
            simplified: None,
        })
    }

    pub fn with_group_code(mut self, group_code: impl Into<String>) -> Self {
        self.group_code = Some(group_code.into());
        self
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Lighter copy served to point lookups. Assignment and the bbox keep
    /// using the full geometry.
    pub fn with_simplified(mut self, simplified: MultiPolygon<f64>) -> Result<Self> {
        validate_geometry(&simplified)?;
        self.simplified = Some(simplified);
        Ok(self)
    }
}

#[derive(Debug, Clone)]
struct StoredGeometry {
    full: MultiPolygon<f64>,
    simplified: Option<MultiPolygon<f64>>,
}

/// Boundaries and geometries held in memory.
///
/// Ids are assigned sequentially per level starting at 1. The first unit
/// registered under a code wins the code lookup.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    records: FxHashMap<Level, Vec<BoundaryRecord>>,
    geometries: FxHashMap<GeometryHandle, StoredGeometry>,
    codes: FxHashMap<(Level, String), UnitId>,
    next_handle: u64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, level: Level, boundary: Boundary) -> Result<UnitId> {
        validate_bbox(&boundary.bbox)?;

        let records = self.records.entry(level).or_default();
        let id = UnitId(records.len() as u64 + 1);
        self.next_handle += 1;
        let handle = GeometryHandle(self.next_handle);

        if !boundary.code.is_empty() {
            self.codes
                .entry((level, boundary.code.clone()))
                .or_insert(id);
        }
        self.geometries.insert(
            handle,
            StoredGeometry {
                full: boundary.geometry,
                simplified: boundary.simplified,
            },
        );
        records.push(BoundaryRecord {
            id,
            level,
            code: boundary.code,
            name: boundary.name,
            group_code: boundary.group_code,
            bbox: boundary.bbox,
            handle,
            properties: boundary.properties,
        });

        Ok(id)
    }

    pub fn len(&self, level: Level) -> usize {
        self.records.get(&level).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.records.values().all(Vec::is_empty)
    }

    pub fn record(&self, level: Level, id: UnitId) -> Option<&BoundaryRecord> {
        let index = usize::try_from(id.0).ok()?.checked_sub(1)?;
        self.records.get(&level)?.get(index)
    }
}

impl GeometryRepository for MemoryRepository {
    fn load_all(&self, level: Level) -> Result<Vec<BoundaryRecord>> {
        Ok(self.records.get(&level).cloned().unwrap_or_default())
    }

    fn lookup_id_by_code(&self, level: Level, code: &str) -> Result<Option<UnitId>> {
        Ok(self.codes.get(&(level, code.to_string())).copied())
    }

    fn materialize(&self, handle: &GeometryHandle) -> Result<MultiPolygon<f64>> {
        self.geometries
            .get(handle)
            .map(|stored| stored.full.clone())
            .ok_or(GeolocateError::GeometryNotFound(*handle))
    }

    fn materialize_simplified(&self, handle: &GeometryHandle) -> Result<MultiPolygon<f64>> {
        self.geometries
            .get(handle)
            .map(|stored| stored.simplified.as_ref().unwrap_or(&stored.full).clone())
            .ok_or(GeolocateError::GeometryNotFound(*handle))
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct LevelTables {
    rows: Vec<BBoxRow>,
    assignments: BTreeMap<UnitId, UnitId>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    levels: Vec<LevelSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct LevelSnapshot {
    level: Level,
    rows: Vec<BBoxRow>,
    assignments: Vec<AssignmentRow>,
}

#[derive(Serialize, Deserialize)]
struct AssignmentRow {
    child: UnitId,
    parent: UnitId,
}

/// Index store keeping rows and assignments in memory, with a JSON snapshot.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MemoryIndexStore {
    levels: BTreeMap<Level, LevelTables>,
    flushes: usize,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self, level: Level) -> &[BBoxRow] {
        self.levels
            .get(&level)
            .map(|tables| tables.rows.as_slice())
            .unwrap_or_default()
    }

    /// Parent recorded for `child`, if any.
    pub fn parent_of(&self, level: Level, child: UnitId) -> Option<UnitId> {
        self.levels.get(&level)?.assignments.get(&child).copied()
    }

    pub fn assignments(&self, level: Level) -> impl Iterator<Item = (UnitId, UnitId)> + '_ {
        self.levels
            .get(&level)
            .into_iter()
            .flat_map(|tables| tables.assignments.iter().map(|(c, p)| (*c, *p)))
    }

    /// Rows whose box overlaps `query`, touching included.
    pub fn rows_intersecting(&self, level: Level, query: &BoundingBox) -> Vec<BBoxRow> {
        self.rows(level)
            .iter()
            .filter(|row| row.bbox().intersects(query))
            .copied()
            .collect()
    }

    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    pub fn write_snapshot<W: Write>(&self, mut writer: W) -> Result<()> {
        let snapshot = Snapshot {
            levels: self
                .levels
                .iter()
                .map(|(level, tables)| LevelSnapshot {
                    level: *level,
                    rows: tables.rows.clone(),
                    assignments: tables
                        .assignments
                        .iter()
                        .map(|(child, parent)| AssignmentRow {
                            child: *child,
                            parent: *parent,
                        })
                        .collect(),
                })
                .collect(),
        };
        serde_json::to_writer(&mut writer, &snapshot)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read_snapshot<R: Read>(reader: R) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_reader(reader)?;
        let mut store = Self::new();
        for level in snapshot.levels {
            let tables = store.levels.entry(level.level).or_default();
            tables.rows = level.rows;
            tables.assignments = level
                .assignments
                .into_iter()
                .map(|row| (row.child, row.parent))
                .collect();
        }
        Ok(store)
    }
}

impl PersistedIndexStore for MemoryIndexStore {
    fn write_assignment(&mut self, level: Level, child: UnitId, parent: UnitId) -> Result<()> {
        if level.parent().is_none() {
            return Err(GeolocateError::InvalidInput(format!(
                "{} units cannot be assigned a parent",
                level
            )));
        }
        self.levels
            .entry(level)
            .or_default()
            .assignments
            .insert(child, parent);
        Ok(())
    }

    fn write_bbox_row(&mut self, level: Level, row: BBoxRow) -> Result<()> {
        validate_bbox(&row.bbox())?;
        self.levels.entry(level).or_default().rows.push(row);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.flushes += 1;
        Ok(())
    }
}
