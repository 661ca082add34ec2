//! # geolocate-types
//!
//! Core value types shared by the geolocate index builder and query path:
//!
//! - **Bounding boxes**: `BoundingBox`, axis-aligned in decimal degrees
//! - **Identity**: `UnitId`, `GeometryHandle`, `Level`
//! - **Hierarchy records**: `IndexedEntry`, `AdministrativeUnit`
//!
//! All types are serializable with Serde and interoperate with the `geo`
//! crate's primitives.
//!
//! ## Examples
//!
//! ```rust
//! use geolocate_types::bbox::BoundingBox;
//! use geolocate_types::unit::{IndexedEntry, Level, UnitId};
//!
//! let liege = BoundingBox::new(5.50, 50.58, 5.65, 50.69);
//! assert!(liege.contains_point(5.563240, 50.638793));
//!
//! let entry = IndexedEntry::new(UnitId(1), liege);
//! assert_eq!(Level::Municipality.parent(), Some(Level::State));
//! # let _ = entry;
//! ```

pub mod bbox;
pub mod unit;

pub use bbox::BoundingBox;
pub use unit::{AdministrativeUnit, GeometryHandle, IndexedEntry, Level, UnitId};
