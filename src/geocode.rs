//! Point-in-polygon reverse geocoding.
//!
//! A query point is matched against municipality bounding boxes first, then
//! against the exact geometry of each candidate. The first covering
//! municipality wins and its state and country come from the stored parent
//! links, without any geometric test on the ancestors.
//!
//! Overlapping municipality polygons are not disambiguated: the lowest
//! covering id is returned.
//!
//! The country always comes through the state. A municipality carrying its
//! own country code (`shapeGroup`) but linked to a state of another country,
//! as happens with nearest-parent fallbacks, reports that state's country.
//!
//! Lookups test the repository's simplified geometry when it keeps one.

use crate::compute::validation::validate_lat_lon;
use crate::compute::{BulkLoad, PreparedGeometry, SpatialIndex, StrTree};
use crate::config::Config;
use crate::error::Result;
use crate::hierarchy::Hierarchy;
use crate::storage::GeometryRepository;
use geo::Point;
use geolocate_types::{AdministrativeUnit, BoundingBox, Level, UnitId};
use parking_lot::RwLock;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A municipality and whatever ancestors its parent links resolve to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolved {
    pub municipality: AdministrativeUnit,
    pub state: Option<AdministrativeUnit>,
    pub country: Option<AdministrativeUnit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Location {
    Found(Resolved),
    /// No municipality covers the point.
    Unknown,
}

impl Location {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Location::Unknown)
    }

    pub fn resolved(&self) -> Option<&Resolved> {
        match self {
            Location::Found(resolved) => Some(resolved),
            Location::Unknown => None,
        }
    }
}

/// Result of one query plus the problems met along the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lookup {
    pub location: Location,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// The flat name triple of a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminNames {
    pub municipal_name: String,
    pub district_name: String,
    pub country_name: String,
}

impl AdminNames {
    pub fn unknown(marker: &str) -> Self {
        Self {
            municipal_name: marker.to_string(),
            district_name: marker.to_string(),
            country_name: marker.to_string(),
        }
    }

    /// Names of a lookup, with `marker` standing in for anything unresolved.
    pub fn from_location(location: &Location, marker: &str) -> Self {
        let Some(resolved) = location.resolved() else {
            return Self::unknown(marker);
        };
        let name = |unit: Option<&AdministrativeUnit>| {
            unit.map_or_else(|| marker.to_string(), |u| u.name.clone())
        };
        Self {
            municipal_name: resolved.municipality.name.clone(),
            district_name: name(resolved.state.as_ref()),
            country_name: name(resolved.country.as_ref()),
        }
    }
}

/// Reverse geocoder over the municipality level of a [`Hierarchy`].
///
/// Safe to share between threads. Prepared municipality geometries are
/// materialized on first use and cached for the geocoder's lifetime.
pub struct ReverseGeocoder<R, I = StrTree> {
    index: I,
    hierarchy: Hierarchy,
    repo: R,
    config: Config,
    cache: RwLock<FxHashMap<UnitId, Arc<PreparedGeometry>>>,
}

impl<R: GeometryRepository, I: BulkLoad> ReverseGeocoder<R, I> {
    /// Indexes the hierarchy's municipalities.
    pub fn new(hierarchy: Hierarchy, repo: R, config: Config) -> Result<Self> {
        config.validate()?;
        let entries = hierarchy
            .units(Level::Municipality)
            .map(AdministrativeUnit::entry)
            .collect();
        let index = I::bulk_load(entries, &config)?;
        log::info!(
            "Reverse geocoder ready over {} municipalities",
            index.len()
        );
        Ok(Self::with_index(index, hierarchy, repo, config))
    }
}

impl<R: GeometryRepository, I: SpatialIndex> ReverseGeocoder<R, I> {
    /// Uses an index built elsewhere. Its ids must be municipality ids of
    /// `hierarchy`.
    pub fn with_index(index: I, hierarchy: Hierarchy, repo: R, config: Config) -> Self {
        Self {
            index,
            hierarchy,
            repo,
            config,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of geometries materialized so far.
    pub fn cached_geometries(&self) -> usize {
        self.cache.read().len()
    }

    /// Finds the municipality covering `(lat, lon)` and its ancestors.
    ///
    /// Fails only on invalid coordinates. Geometry that cannot be
    /// materialized is skipped and reported in [`Lookup::warnings`].
    pub fn geocode(&self, lat: f64, lon: f64) -> Result<Lookup> {
        validate_lat_lon(lat, lon)?;
        let point = Point::new(lon, lat);

        let mut candidates = self.index.range_query(&BoundingBox::point(lon, lat));
        candidates.sort_unstable();

        let mut warnings = Vec::new();
        for id in candidates {
            let geometry = match self.prepared(id) {
                Ok(geometry) => geometry,
                Err(err) => {
                    log::warn!("Skipping municipality {}: {}", id, err);
                    warnings.push(format!("municipality {}: {}", id, err));
                    continue;
                }
            };
            if !geometry.covers(&point) {
                continue;
            }

            let municipality = self.hierarchy.get(Level::Municipality, id)?;
            let state = self.resolve_parent(municipality, &mut warnings);
            let country = state
                .as_ref()
                .and_then(|state| self.resolve_parent(state, &mut warnings));

            return Ok(Lookup {
                location: Location::Found(Resolved {
                    municipality: municipality.clone(),
                    state,
                    country,
                }),
                warnings,
            });
        }

        Ok(Lookup {
            location: Location::Unknown,
            warnings,
        })
    }

    /// Municipality, district and country names for `(lat, lon)`.
    pub fn geocode_names(&self, lat: f64, lon: f64) -> Result<AdminNames> {
        let lookup = self.geocode(lat, lon)?;
        Ok(AdminNames::from_location(
            &lookup.location,
            &self.config.unknown_marker,
        ))
    }

    /// Geocodes `(lat, lon)` pairs, in parallel when configured.
    /// Output order follows input order.
    pub fn geocode_batch(&self, points: &[(f64, f64)]) -> Vec<Result<Lookup>> {
        if self.config.parallel {
            points
                .par_iter()
                .map(|&(lat, lon)| self.geocode(lat, lon))
                .collect()
        } else {
            points
                .iter()
                .map(|&(lat, lon)| self.geocode(lat, lon))
                .collect()
        }
    }

    fn resolve_parent(
        &self,
        unit: &AdministrativeUnit,
        warnings: &mut Vec<String>,
    ) -> Option<AdministrativeUnit> {
        match self.hierarchy.parent(unit) {
            Ok(parent) => parent.cloned(),
            Err(err) => {
                log::warn!("{}", err);
                warnings.push(err.to_string());
                None
            }
        }
    }

    fn prepared(&self, id: UnitId) -> Result<Arc<PreparedGeometry>> {
        if let Some(geometry) = self.cache.read().get(&id) {
            return Ok(Arc::clone(geometry));
        }

        let unit = self.hierarchy.get(Level::Municipality, id)?;
        let geometry = Arc::new(PreparedGeometry::new(
            self.repo.materialize_simplified(&unit.geometry)?,
        )?);

        // Another thread may have won the race; keep its copy.
        let mut cache = self.cache.write();
        Ok(Arc::clone(cache.entry(id).or_insert(geometry)))
    }
}
