//! End-to-end hierarchy build against a repository and an index store.

use crate::assign::{AssignmentBatch, FailureRecord, HierarchicalAssigner, ParentLevel};
use crate::compute::{BulkLoad, StrTree};
use crate::config::{Config, StateLinking};
use crate::error::Result;
use crate::hierarchy::Hierarchy;
use crate::storage::{BBoxRow, BoundaryRecord, GeometryRepository, PersistedIndexStore};
use geolocate_types::{Level, UnitId};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use std::time::Instant;

/// A state whose group code matched no country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupMiss {
    pub level: Level,
    pub id: UnitId,
    /// `None` when the unit carried no group code at all.
    pub code: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub countries: usize,
    pub states: usize,
    pub municipalities: usize,
    /// States linked through their group code.
    pub linked_by_code: usize,
    /// Assignments that fell back to the nearest parent.
    pub nearest_fallbacks: usize,
    pub unassigned: usize,
}

/// Everything a build produced besides the store writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub hierarchy: Hierarchy,
    pub failures: Vec<FailureRecord>,
    pub lookup_misses: Vec<LookupMiss>,
    pub stats: BuildStats,
}

/// Loads all three levels, links every state and municipality to a parent
/// and writes bounding-box rows and assignments to the store.
///
/// # Examples
///
/// ```
/// use geolocate::prelude::*;
/// use geo::polygon;
///
/// let mut repo = MemoryRepository::new();
/// let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 1.0)];
/// repo.insert(Level::Country, Boundary::new("TST", "Testland", square.clone())?)?;
/// repo.insert(Level::State, Boundary::new("S1", "North", square.clone())?.with_group_code("TST"))?;
/// repo.insert(Level::Municipality, Boundary::new("M1", "Town", square)?)?;
///
/// let mut store = MemoryIndexStore::new();
/// let report = HierarchyBuilder::new(Config::default())?.build(&repo, &mut store)?;
///
/// assert!(report.hierarchy.validate().is_ok());
/// assert_eq!(store.parent_of(Level::Municipality, UnitId(1)), Some(UnitId(1)));
/// # Ok::<(), geolocate::GeolocateError>(())
/// ```
pub struct HierarchyBuilder<I = StrTree> {
    config: Config,
    _index: PhantomData<fn() -> I>,
}

impl HierarchyBuilder {
    pub fn new(config: Config) -> Result<Self> {
        Self::with_index(config)
    }
}

impl<I: BulkLoad> HierarchyBuilder<I> {
    /// Builder whose parent levels are indexed with `I`.
    pub fn with_index(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            _index: PhantomData,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn build<R, S>(&self, repo: &R, store: &mut S) -> Result<BuildReport>
    where
        R: GeometryRepository + ?Sized,
        S: PersistedIndexStore + ?Sized,
    {
        let started = Instant::now();
        let mut hierarchy = Hierarchy::new();
        let mut report = BuildReport {
            hierarchy: Hierarchy::new(),
            failures: Vec::new(),
            lookup_misses: Vec::new(),
            stats: BuildStats::default(),
        };

        let countries = self.load_level(Level::Country, repo, store, &mut hierarchy)?;
        let states = self.load_level(Level::State, repo, store, &mut hierarchy)?;
        let municipalities = self.load_level(Level::Municipality, repo, store, &mut hierarchy)?;
        report.stats = BuildStats {
            countries: countries.len(),
            states: states.len(),
            municipalities: municipalities.len(),
            ..BuildStats::default()
        };

        // States to countries
        let geometric_states: Vec<BoundaryRecord> = match self.config.state_linking {
            StateLinking::Geometric => states.clone(),
            StateLinking::ByCode => {
                let mut unlinked = Vec::new();
                for state in &states {
                    match self.country_by_code(state, repo)? {
                        Some(country) => {
                            hierarchy.set_parent(Level::State, state.id, country)?;
                            store.write_assignment(Level::State, state.id, country)?;
                            report.stats.linked_by_code += 1;
                        }
                        None => {
                            report.lookup_misses.push(LookupMiss {
                                level: Level::State,
                                id: state.id,
                                code: state.group_code.clone(),
                            });
                            unlinked.push(state.clone());
                        }
                    }
                }
                if !unlinked.is_empty() {
                    log::warn!(
                        "{} states matched no country code, assigning them geometrically",
                        unlinked.len()
                    );
                }
                unlinked
            }
        };
        let batch = self.assign_level(&countries, &geometric_states, repo, &mut report)?;
        self.apply(Level::State, batch, &mut hierarchy, store, &mut report)?;

        // Municipalities to states
        let batch = self.assign_level(&states, &municipalities, repo, &mut report)?;
        self.apply(Level::Municipality, batch, &mut hierarchy, store, &mut report)?;

        store.flush()?;

        report.stats.unassigned = [Level::State, Level::Municipality]
            .into_iter()
            .flat_map(|level| hierarchy.units(level))
            .filter(|unit| unit.parent_id.is_none())
            .count();
        report.hierarchy = hierarchy;

        log::info!(
            "Built hierarchy: {} countries, {} states, {} municipalities in {:.2?} ({} failures, {} lookup misses, {} unassigned)",
            report.stats.countries,
            report.stats.states,
            report.stats.municipalities,
            started.elapsed(),
            report.failures.len(),
            report.lookup_misses.len(),
            report.stats.unassigned
        );
        Ok(report)
    }

    fn load_level<R, S>(
        &self,
        level: Level,
        repo: &R,
        store: &mut S,
        hierarchy: &mut Hierarchy,
    ) -> Result<Vec<BoundaryRecord>>
    where
        R: GeometryRepository + ?Sized,
        S: PersistedIndexStore + ?Sized,
    {
        let records = repo.load_all(level)?;
        for record in &records {
            store.write_bbox_row(level, BBoxRow::from(record.entry()))?;
            hierarchy.insert(record.to_unit())?;
        }
        log::info!("Loaded {} {} boundaries", records.len(), level);
        Ok(records)
    }

    fn country_by_code<R>(&self, state: &BoundaryRecord, repo: &R) -> Result<Option<UnitId>>
    where
        R: GeometryRepository + ?Sized,
    {
        match state.group_code.as_deref() {
            Some(code) if !code.is_empty() => repo.lookup_id_by_code(Level::Country, code),
            _ => Ok(None),
        }
    }

    /// Assigns `children` to `parents`. Nothing to assign, or no parent
    /// with a usable geometry, yields an empty batch.
    fn assign_level<R>(
        &self,
        parents: &[BoundaryRecord],
        children: &[BoundaryRecord],
        repo: &R,
        report: &mut BuildReport,
    ) -> Result<AssignmentBatch>
    where
        R: GeometryRepository + ?Sized,
    {
        let (Some(child), Some(parent)) = (children.first(), parents.first()) else {
            if let Some(child) = children.first() {
                log::warn!(
                    "No {} boundaries to assign {} {} units to",
                    child.level.parent().map_or("parent", Level::as_str),
                    children.len(),
                    child.level
                );
            }
            return Ok(AssignmentBatch::default());
        };

        let (parent_level, failures) =
            ParentLevel::<I>::build(parent.level, parents, repo, &self.config)?;
        report.failures.extend(failures);
        let Some(parent_level) = parent_level else {
            log::warn!(
                "No usable {} geometry, leaving {} {} units unassigned",
                parent.level,
                children.len(),
                child.level
            );
            return Ok(AssignmentBatch::default());
        };

        log::info!(
            "Assigning {} {} units to {} {} boundaries",
            children.len(),
            child.level,
            parent_level.len(),
            parent.level
        );
        Ok(HierarchicalAssigner::new(&parent_level, &self.config).assign_all(children, repo))
    }

    fn apply<S>(
        &self,
        level: Level,
        batch: AssignmentBatch,
        hierarchy: &mut Hierarchy,
        store: &mut S,
        report: &mut BuildReport,
    ) -> Result<()>
    where
        S: PersistedIndexStore + ?Sized,
    {
        report.stats.nearest_fallbacks += batch.fallback_count();
        for result in &batch.results {
            hierarchy.set_parent(level, result.child_id, result.parent_id)?;
            store.write_assignment(level, result.child_id, result.parent_id)?;
        }
        report.failures.extend(batch.failures);
        Ok(())
    }
}
