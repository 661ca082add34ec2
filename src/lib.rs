//! Hierarchical administrative-boundary index and offline reverse geocoder.
//!
//! Boundaries are organized as country → state → municipality. A build
//! assigns every lower-level polygon to the parent polygon holding most of
//! its area, and the resulting hierarchy answers point queries.
//!
//! ```rust
//! use geolocate::prelude::*;
//! use geo::polygon;
//!
//! let mut repo = MemoryRepository::new();
//! let square = polygon![(x: 5.5, y: 50.58), (x: 5.65, y: 50.58), (x: 5.65, y: 50.69), (x: 5.5, y: 50.69)];
//! repo.insert(Level::Country, Boundary::new("BEL", "Belgium", square.clone())?)?;
//! repo.insert(Level::State, Boundary::new("BEL-ADM1-4", "Liège", square.clone())?.with_group_code("BEL"))?;
//! repo.insert(Level::Municipality, Boundary::new("BEL-ADM2-1", "Liège", square)?)?;
//!
//! let mut store = MemoryIndexStore::new();
//! let report = HierarchyBuilder::new(Config::default())?.build(&repo, &mut store)?;
//!
//! let geocoder: ReverseGeocoder<_> = ReverseGeocoder::new(report.hierarchy, &repo, Config::default())?;
//! let names = geocoder.geocode_names(50.638793, 5.563240)?;
//! assert_eq!(names.country_name, "Belgium");
//! # Ok::<(), geolocate::GeolocateError>(())
//! ```

pub mod assign;
pub mod builder;
pub mod compute;
pub mod config;
pub mod error;
pub mod geocode;
pub mod hierarchy;
pub mod ingest;
pub mod storage;

pub use assign::{
    AssignmentBatch, AssignmentMethod, AssignmentResult, FailureRecord, HierarchicalAssigner,
    ParentLevel,
};
pub use builder::{BuildReport, BuildStats, HierarchyBuilder, LookupMiss};
pub use compute::{BulkLoad, PreparedGeometry, RStarIndex, SpatialIndex, StrTree};
pub use config::{Config, SimplifyConfig, StateLinking};
pub use error::{GeolocateError, Result};
pub use geocode::{AdminNames, Location, Lookup, Resolved, ReverseGeocoder};
pub use hierarchy::Hierarchy;
pub use ingest::{IngestReport, ingest_feature_collection, ingest_file};
pub use storage::{
    BBoxRow, Boundary, BoundaryRecord, GeometryRepository, MemoryIndexStore, MemoryRepository,
    PersistedIndexStore,
};

pub use geolocate_types::{
    AdministrativeUnit, BoundingBox, GeometryHandle, IndexedEntry, Level, UnitId,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Common imports
pub mod prelude {

    pub use crate::{GeolocateError, HierarchyBuilder, Result};

    pub use crate::{AdminNames, Location, ReverseGeocoder};

    pub use crate::{Config, StateLinking};

    pub use crate::{
        Boundary, GeometryRepository, MemoryIndexStore, MemoryRepository, PersistedIndexStore,
    };

    pub use crate::{BoundingBox, Level, UnitId};

    pub use crate::{SpatialIndex, StrTree};
}
