//! Geometric parent assignment.
//!
//! Every child polygon goes to the parent polygon that holds the largest
//! share of its area. Children that touch no parent fall back to the parent
//! with the nearest bounding box.

use crate::compute::{BulkLoad, PreparedGeometry, SpatialIndex, StrTree};
use crate::config::Config;
use crate::error::{GeolocateError, Result};
use crate::storage::{BoundaryRecord, GeometryRepository, Properties};
use geolocate_types::{IndexedEntry, Level, UnitId};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Ratios closer than this are treated as equal.
pub const RATIO_EPSILON: f64 = 1e-9;

/// How a parent was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum AssignmentMethod {
    /// Share of the child's area inside the parent, in `[0, 1]`.
    Overlap { ratio: f64 },
    /// No parent overlapped the child; nearest bounding box.
    Nearest,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub child_id: UnitId,
    pub parent_id: UnitId,
    #[serde(flatten)]
    pub method: AssignmentMethod,
}

impl AssignmentResult {
    pub fn ratio(&self) -> Option<f64> {
        match self.method {
            AssignmentMethod::Overlap { ratio } => Some(ratio),
            AssignmentMethod::Nearest => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.method == AssignmentMethod::Nearest
    }
}

/// A record that could not be processed, with the properties it carried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub properties: Properties,
    pub error: String,
}

impl FailureRecord {
    pub fn new(properties: Properties, error: &GeolocateError) -> Self {
        Self {
            properties,
            error: error.to_string(),
        }
    }

    pub(crate) fn for_record(record: &BoundaryRecord, error: &GeolocateError) -> Self {
        let mut properties = record.properties.clone();
        properties
            .entry("level")
            .or_insert_with(|| record.level.as_str().into());
        properties
            .entry("id")
            .or_insert_with(|| record.id.0.into());
        properties
            .entry("name")
            .or_insert_with(|| record.name.clone().into());
        Self::new(properties, error)
    }
}

/// Outcome of a batch: every input ends up in exactly one of the two lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentBatch {
    pub results: Vec<AssignmentResult>,
    pub failures: Vec<FailureRecord>,
}

impl AssignmentBatch {
    pub fn fallback_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_fallback()).count()
    }
}

/// Spatial index plus prepared geometries for one parent level.
pub struct ParentLevel<I = StrTree> {
    level: Level,
    index: I,
    geometries: FxHashMap<UnitId, PreparedGeometry>,
}

impl<I: BulkLoad> ParentLevel<I> {
    /// Materializes and prepares every parent geometry, then bulk-loads the
    /// index over the records' bounding boxes.
    ///
    /// Parents whose geometry cannot be prepared are left out of the index
    /// and reported as failures. The level is `None` when no parent is left.
    pub fn build<R>(
        level: Level,
        records: &[BoundaryRecord],
        repo: &R,
        config: &Config,
    ) -> Result<(Option<Self>, Vec<FailureRecord>)>
    where
        R: GeometryRepository + ?Sized,
    {
        let prepare = |record: &BoundaryRecord| {
            repo.materialize(&record.handle)
                .and_then(PreparedGeometry::new)
                .map(|geometry| (record.entry(), geometry))
                .map_err(|err| {
                    log::warn!("Skipping {} {} ({}): {}", level, record.id, record.name, err);
                    FailureRecord::for_record(record, &err)
                })
        };

        let prepared: Vec<std::result::Result<(IndexedEntry, PreparedGeometry), FailureRecord>> =
            if config.parallel {
                records.par_iter().map(prepare).collect()
            } else {
                records.iter().map(prepare).collect()
            };

        let mut entries = Vec::with_capacity(prepared.len());
        let mut geometries = FxHashMap::default();
        let mut failures = Vec::new();
        for outcome in prepared {
            match outcome {
                Ok((entry, geometry)) => {
                    entries.push(entry);
                    geometries.insert(entry.id, geometry);
                }
                Err(failure) => failures.push(failure),
            }
        }

        log::debug!(
            "Prepared {} {} geometries ({} failed)",
            geometries.len(),
            level,
            failures.len()
        );
        if entries.is_empty() {
            return Ok((None, failures));
        }

        let index = I::bulk_load(entries, config)?;
        Ok((
            Some(Self {
                level,
                index,
                geometries,
            }),
            failures,
        ))
    }

    /// Builds from already prepared geometries, indexing their exact bounds.
    pub fn from_geometries(
        level: Level,
        parents: impl IntoIterator<Item = (UnitId, PreparedGeometry)>,
        config: &Config,
    ) -> Result<Self> {
        let geometries: FxHashMap<UnitId, PreparedGeometry> = parents.into_iter().collect();
        let entries = geometries
            .iter()
            .map(|(id, geometry)| IndexedEntry::new(*id, geometry.bbox()))
            .collect();
        let index = I::bulk_load(entries, config)?;
        Ok(Self {
            level,
            index,
            geometries,
        })
    }
}

impl<I: SpatialIndex> ParentLevel<I> {
    pub fn level(&self) -> Level {
        self.level
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn geometry(&self, id: UnitId) -> Option<&PreparedGeometry> {
        self.geometries.get(&id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }
}

/// Assigns children of one level to parents of the level above.
pub struct HierarchicalAssigner<'a, I = StrTree> {
    parents: &'a ParentLevel<I>,
    config: &'a Config,
}

impl<'a, I: SpatialIndex> HierarchicalAssigner<'a, I> {
    pub fn new(parents: &'a ParentLevel<I>, config: &'a Config) -> Self {
        Self { parents, config }
    }

    /// Best parent for one prepared child geometry.
    ///
    /// Never fails: a child overlapping no parent gets the nearest one.
    pub fn assign(&self, child_id: UnitId, child: &PreparedGeometry) -> AssignmentResult {
        let child_bbox = child.bbox();
        let child_area = child.area();

        let mut candidates = self.parents.index.range_query(&child_bbox);
        candidates.sort_unstable();

        let mut best: Option<(f64, UnitId)> = None;
        for parent_id in candidates {
            let Some(parent) = self.parents.geometries.get(&parent_id) else {
                continue;
            };
            if !parent.intersects(child) {
                continue;
            }
            let ratio = if child_area > 0.0 {
                (parent.intersection_area(child) / child_area).clamp(0.0, 1.0)
            } else {
                0.0
            };
            // Candidates arrive in id order, so ties keep the lower id.
            if best.is_none_or(|(best_ratio, _)| ratio > best_ratio + RATIO_EPSILON) {
                best = Some((ratio, parent_id));
            }
        }

        match best {
            Some((ratio, parent_id)) => AssignmentResult {
                child_id,
                parent_id,
                method: AssignmentMethod::Overlap { ratio },
            },
            None => {
                let parent_id = self.parents.index.nearest_query(&child_bbox);
                log::debug!(
                    "{} {} overlaps no {}, falling back to nearest {}",
                    self.parents.level.child().map_or("unit", Level::as_str),
                    child_id,
                    self.parents.level,
                    parent_id
                );
                AssignmentResult {
                    child_id,
                    parent_id,
                    method: AssignmentMethod::Nearest,
                }
            }
        }
    }

    /// Materializes and assigns one child record.
    pub fn assign_record<R>(&self, record: &BoundaryRecord, repo: &R) -> Result<AssignmentResult>
    where
        R: GeometryRepository + ?Sized,
    {
        let geometry = repo.materialize(&record.handle)?;
        let prepared = PreparedGeometry::new(geometry)?;
        Ok(self.assign(record.id, &prepared))
    }

    /// Assigns a batch. Per-record failures are collected, never raised.
    ///
    /// Results are sorted by child id regardless of processing order.
    pub fn assign_all<R>(&self, records: &[BoundaryRecord], repo: &R) -> AssignmentBatch
    where
        R: GeometryRepository + ?Sized,
    {
        let processed = AtomicUsize::new(0);
        let interval = self.config.progress_interval;
        let total = records.len();

        let process = |record: &BoundaryRecord| {
            let outcome = self.assign_record(record, repo).map_err(|err| {
                log::warn!(
                    "Failed to assign {} {} ({}): {}",
                    record.level,
                    record.id,
                    record.name,
                    err
                );
                FailureRecord::for_record(record, &err)
            });
            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            if interval > 0 && done % interval == 0 {
                log::info!("Assigned {}/{} {} records", done, total, record.level);
            }
            outcome
        };

        let outcomes: Vec<std::result::Result<AssignmentResult, FailureRecord>> =
            if self.config.parallel {
                records.par_iter().map(process).collect()
            } else {
                records.iter().map(process).collect()
            };

        let mut batch = AssignmentBatch::default();
        for outcome in outcomes {
            match outcome {
                Ok(result) => batch.results.push(result),
                Err(failure) => batch.failures.push(failure),
            }
        }
        batch.results.sort_by_key(|result| result.child_id);
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::RStarIndex;
    use crate::storage::{Boundary, MemoryRepository};
    use geo::{MultiPolygon, Polygon, polygon};

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Polygon<f64> {
        polygon![
            (x: min_x, y: min_y),
            (x: max_x, y: min_y),
            (x: max_x, y: max_y),
            (x: min_x, y: max_y),
        ]
    }

    fn prepared(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> PreparedGeometry {
        PreparedGeometry::new(rect(min_x, min_y, max_x, max_y)).unwrap()
    }

    /// Unit squares A = 1, B = 2, C = 3 side by side.
    fn abc<I: BulkLoad>(config: &Config) -> ParentLevel<I> {
        ParentLevel::from_geometries(
            Level::State,
            vec![
                (UnitId(1), prepared(0.0, 0.0, 1.0, 1.0)),
                (UnitId(2), prepared(1.0, 0.0, 2.0, 1.0)),
                (UnitId(3), prepared(2.0, 0.0, 3.0, 1.0)),
            ],
            config,
        )
        .unwrap()
    }

    #[test]
    fn test_child_inside_parent() {
        let config = Config::default();
        let parents: ParentLevel = abc(&config);
        let assigner = HierarchicalAssigner::new(&parents, &config);

        let result = assigner.assign(UnitId(10), &prepared(1.2, 0.2, 1.8, 0.8));
        assert_eq!(result.parent_id, UnitId(2));
        assert!((result.ratio().unwrap() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_equal_split_prefers_lowest_id() {
        let config = Config::default();
        let parents: ParentLevel = abc(&config);
        let assigner = HierarchicalAssigner::new(&parents, &config);

        let result = assigner.assign(UnitId(10), &prepared(0.8, 0.0, 1.2, 1.0));
        assert_eq!(result.parent_id, UnitId(1));
        assert!((result.ratio().unwrap() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_majority_overlap_wins() {
        let config = Config::default();
        let parents: ParentLevel = abc(&config);
        let assigner = HierarchicalAssigner::new(&parents, &config);

        let result = assigner.assign(UnitId(10), &prepared(0.3, 0.0, 1.3, 1.0));
        assert_eq!(result.parent_id, UnitId(1));
        assert!((result.ratio().unwrap() - 0.7).abs() < 1e-9);

        let result = assigner.assign(UnitId(11), &prepared(1.6, 0.0, 2.6, 1.0));
        assert_eq!(result.parent_id, UnitId(3));
    }

    #[test]
    fn test_no_overlap_falls_back_to_nearest() {
        let config = Config::default();
        let parents: ParentLevel = abc(&config);
        let assigner = HierarchicalAssigner::new(&parents, &config);

        let result = assigner.assign(UnitId(10), &prepared(5.0, 5.0, 6.0, 6.0));
        assert_eq!(result.parent_id, UnitId(3));
        assert_eq!(result.method, AssignmentMethod::Nearest);
        assert!(result.ratio().is_none());
    }

    #[test]
    fn test_bbox_overlap_without_geometric_overlap() {
        let config = Config::default();
        // L-shaped parent whose bbox covers the child but whose area does not
        let l_shape = polygon![
            (x: 0.0, y: 0.0),
            (x: 4.0, y: 0.0),
            (x: 4.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 4.0),
            (x: 0.0, y: 4.0),
        ];
        let parents: ParentLevel = ParentLevel::from_geometries(
            Level::State,
            vec![
                (UnitId(1), PreparedGeometry::new(l_shape).unwrap()),
                (UnitId(2), prepared(3.5, 3.5, 6.0, 6.0)),
            ],
            &config,
        )
        .unwrap();
        let assigner = HierarchicalAssigner::new(&parents, &config);

        let result = assigner.assign(UnitId(10), &prepared(2.0, 2.0, 3.0, 3.0));
        assert_eq!(result.method, AssignmentMethod::Nearest);
    }

    #[test]
    fn test_zero_area_child_gets_ratio_zero() {
        let config = Config::default();
        let parents: ParentLevel = abc(&config);
        let assigner = HierarchicalAssigner::new(&parents, &config);

        let sliver = PreparedGeometry::new(polygon![
            (x: 1.2, y: 0.5),
            (x: 1.4, y: 0.5),
            (x: 1.6, y: 0.5),
        ])
        .unwrap();
        let result = assigner.assign(UnitId(10), &sliver);
        assert_eq!(result.parent_id, UnitId(2));
        assert_eq!(result.ratio(), Some(0.0));
    }

    #[test]
    fn test_rstar_backed_level_agrees() {
        let config = Config::default();
        let parents: ParentLevel<RStarIndex> = abc(&config);
        let assigner = HierarchicalAssigner::new(&parents, &config);

        assert_eq!(
            assigner.assign(UnitId(1), &prepared(0.8, 0.0, 1.2, 1.0)).parent_id,
            UnitId(1)
        );
        assert_eq!(
            assigner.assign(UnitId(2), &prepared(5.0, 5.0, 6.0, 6.0)).parent_id,
            UnitId(3)
        );
    }

    fn repo_with_children() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        for (code, poly) in [
            ("S1", rect(0.0, 0.0, 1.0, 1.0)),
            ("S2", rect(1.0, 0.0, 2.0, 1.0)),
        ] {
            repo.insert(Level::State, Boundary::new(code, code, poly).unwrap())
                .unwrap();
        }
        for (index, x) in [0.1, 1.1, 0.5, 1.5, 7.0].into_iter().enumerate() {
            let code = format!("M{}", index + 1);
            repo.insert(
                Level::Municipality,
                Boundary::new(code.clone(), code, rect(x, 0.1, x + 0.3, 0.4)).unwrap(),
            )
            .unwrap();
        }
        repo
    }

    #[test]
    fn test_assign_all_sorted_and_parallel_matches_serial() {
        let repo = repo_with_children();
        let states = repo.load_all(Level::State).unwrap();
        let municipalities = repo.load_all(Level::Municipality).unwrap();

        let parallel = Config::default();
        let serial = Config::default().with_parallel(false);
        let (parents, failures) = ParentLevel::<StrTree>::build(Level::State, &states, &repo, &parallel).unwrap();
        let parents = parents.unwrap();
        assert!(failures.is_empty());

        let a = HierarchicalAssigner::new(&parents, &parallel).assign_all(&municipalities, &repo);
        let b = HierarchicalAssigner::new(&parents, &serial).assign_all(&municipalities, &repo);
        assert_eq!(a, b);

        let parent_ids: Vec<_> = a.results.iter().map(|r| (r.child_id.0, r.parent_id.0)).collect();
        assert_eq!(parent_ids, vec![(1, 1), (2, 2), (3, 1), (4, 2), (5, 2)]);
        assert_eq!(a.fallback_count(), 1);
    }

    #[test]
    fn test_assign_all_collects_failures() {
        let repo = repo_with_children();
        let states = repo.load_all(Level::State).unwrap();
        let mut municipalities = repo.load_all(Level::Municipality).unwrap();
        // Dangling handle: geometry cannot be materialized
        municipalities[1].handle = geolocate_types::GeometryHandle(404);

        let config = Config::default();
        let (parents, _) = ParentLevel::<StrTree>::build(Level::State, &states, &repo, &config).unwrap();
        let parents = parents.unwrap();
        let batch = HierarchicalAssigner::new(&parents, &config).assign_all(&municipalities, &repo);

        assert_eq!(batch.results.len(), 4);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].properties["name"], "M2");
        assert!(batch.failures[0].error.contains("not found"));
    }

    #[test]
    fn test_parent_level_requires_parents() {
        let config = Config::default();
        let result = ParentLevel::<StrTree>::from_geometries(Level::State, Vec::new(), &config);
        assert!(matches!(result, Err(GeolocateError::EmptyIndex)));

        let empty = MultiPolygon::<f64>::new(vec![]);
        assert!(PreparedGeometry::new(empty).is_err());
    }

    #[test]
    fn test_parent_level_without_usable_geometry() {
        let repo = repo_with_children();
        let mut states = repo.load_all(Level::State).unwrap();
        for state in &mut states {
            state.handle = geolocate_types::GeometryHandle(404);
        }

        let config = Config::default().with_progress_interval(0);
        let (parents, failures) = ParentLevel::<StrTree>::build(Level::State, &states, &repo, &config).unwrap();
        assert!(parents.is_none());
        assert_eq!(failures.len(), states.len());
    }

    #[test]
    fn test_assign_all_with_progress_logging_disabled() {
        let repo = repo_with_children();
        let states = repo.load_all(Level::State).unwrap();
        let municipalities = repo.load_all(Level::Municipality).unwrap();

        let config = Config::default().with_progress_interval(0);
        let (parents, _) = ParentLevel::<StrTree>::build(Level::State, &states, &repo, &config).unwrap();
        let batch = HierarchicalAssigner::new(&parents.unwrap(), &config).assign_all(&municipalities, &repo);

        assert_eq!(batch.results.len(), municipalities.len());
        assert!(batch.failures.is_empty());
    }
}
