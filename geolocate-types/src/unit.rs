use crate::bbox::BoundingBox;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable integer surrogate for an administrative unit, unique within a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u64);

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a geometry payload owned by a repository.
///
/// The index and the assigner never hold the geometry itself, only this handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeometryHandle(pub u64);

impl fmt::Display for GeometryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "geometry#{}", self.0)
    }
}

/// Administrative level, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    /// ADM0
    Country,
    /// ADM1: states, provinces, districts
    State,
    /// ADM2
    Municipality,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Country, Level::State, Level::Municipality];

    /// Level one step up, `None` for countries.
    pub fn parent(self) -> Option<Level> {
        match self {
            Level::Country => None,
            Level::State => Some(Level::Country),
            Level::Municipality => Some(Level::State),
        }
    }

    /// Level one step down, `None` for municipalities.
    pub fn child(self) -> Option<Level> {
        match self {
            Level::Country => Some(Level::State),
            Level::State => Some(Level::Municipality),
            Level::Municipality => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Level::Country => "country",
            Level::State => "state",
            Level::Municipality => "municipality",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit stored in a spatial index: an id and its bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexedEntry {
    pub id: UnitId,
    pub bbox: BoundingBox,
}

impl IndexedEntry {
    pub fn new(id: UnitId, bbox: BoundingBox) -> Self {
        Self { id, bbox }
    }
}

/// One country, state or municipality.
///
/// After hierarchy assignment every state and municipality carries the id of
/// its parent one level up; countries never have a parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdministrativeUnit {
    pub id: UnitId,
    pub level: Level,
    #[serde(default)]
    pub parent_id: Option<UnitId>,
    pub code: String,
    pub name: String,
    pub bbox: BoundingBox,
    pub geometry: GeometryHandle,
}

impl AdministrativeUnit {
    pub fn new(
        id: UnitId,
        level: Level,
        code: impl Into<String>,
        name: impl Into<String>,
        bbox: BoundingBox,
        geometry: GeometryHandle,
    ) -> Self {
        Self {
            id,
            level,
            parent_id: None,
            code: code.into(),
            name: name.into(),
            bbox,
            geometry,
        }
    }

    pub fn with_parent(mut self, parent_id: Option<UnitId>) -> Self {
        self.parent_id = parent_id;
        self
    }

    pub fn entry(&self) -> IndexedEntry {
        IndexedEntry::new(self.id, self.bbox)
    }
}
