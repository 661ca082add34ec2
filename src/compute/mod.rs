//! Compute layer: spatial indexing, prepared geometry and input validation.
//!
//! This module is independent of where boundaries come from or where index
//! rows end up; it only sees ids, bounding boxes and `geo` geometries.

pub mod spatial;
pub mod validation;

pub use spatial::{BulkLoad, PreparedGeometry, RStarIndex, SpatialIndex, StrTree};
