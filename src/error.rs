//! Error types for geolocate.

use geolocate_types::{GeometryHandle, Level, UnitId};
use thiserror::Error;

/// Errors raised while building or querying a boundary index.
#[derive(Debug, Error)]
pub enum GeolocateError {
    /// A spatial index was requested over zero entries.
    #[error("cannot build a spatial index from zero entries")]
    EmptyIndex,

    /// Geometry that cannot take part in predicate evaluation.
    #[error("malformed geometry: {0}")]
    MalformedGeometry(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} not found in repository")]
    GeometryNotFound(GeometryHandle),

    #[error("{level} {id} not found")]
    UnitNotFound { level: Level, id: UnitId },

    /// A parent link points at a unit that does not exist one level up.
    #[error("broken hierarchy: {0}")]
    BrokenHierarchy(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for GeolocateError {
    fn from(err: serde_json::Error) -> Self {
        GeolocateError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, GeolocateError>;
