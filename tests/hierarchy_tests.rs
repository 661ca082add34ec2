mod common;

use common::{fixture_repo, init_logging};
use geolocate::prelude::*;
use geolocate::{AssignmentMethod, HierarchicalAssigner, ParentLevel, PreparedGeometry, RStarIndex};
use geo::polygon;

fn names_by_parent(report: &geolocate::BuildReport, level: Level) -> Vec<(String, String)> {
    let parent_level = level.parent().expect("level has a parent");
    report
        .hierarchy
        .units(level)
        .map(|unit| {
            let parent = unit
                .parent_id
                .and_then(|id| report.hierarchy.unit(parent_level, id))
                .map_or("-".to_string(), |p| p.name.clone());
            (unit.name.clone(), parent)
        })
        .collect()
}

#[test]
fn test_ingest_reports_failures_without_aborting() {
    init_logging();
    let (repo, reports) = fixture_repo(&Config::default());

    assert_eq!(reports[0].inserted.len(), 2);
    assert_eq!(reports[1].inserted.len(), 4);
    assert_eq!(reports[2].inserted.len(), 6);
    assert_eq!(reports[2].failures.len(), 1);
    assert_eq!(reports[2].failures[0].properties["shapeName"], "Ghost");

    assert_eq!(
        repo.lookup_id_by_code(Level::Country, "NLD").unwrap(),
        Some(UnitId(2))
    );
}

#[test]
fn test_full_build() {
    init_logging();
    let config = Config::default();
    let (repo, _) = fixture_repo(&config);
    let mut store = MemoryIndexStore::new();

    let report = HierarchyBuilder::new(config)
        .unwrap()
        .build(&repo, &mut store)
        .unwrap();

    assert!(report.failures.is_empty());
    assert!(report.lookup_misses.is_empty());
    assert_eq!(report.stats.linked_by_code, 4);
    assert_eq!(report.stats.nearest_fallbacks, 1);
    assert!(report.hierarchy.validate().is_ok());

    let states = names_by_parent(&report, Level::State);
    assert_eq!(
        states,
        vec![
            ("Liège".to_string(), "Belgium".to_string()),
            ("Limburg".to_string(), "Belgium".to_string()),
            ("Namur".to_string(), "Belgium".to_string()),
            ("Zeeland".to_string(), "Netherlands".to_string()),
        ]
    );

    let municipalities = names_by_parent(&report, Level::Municipality);
    let expected = [
        ("Liège", "Liège"),
        ("Seraing", "Liège"),
        ("Hasselt", "Limburg"),
        ("Namur", "Namur"),
        ("Middelburg", "Zeeland"),
        ("Offshore", "Zeeland"),
    ];
    assert_eq!(municipalities.len(), expected.len());
    for ((name, parent), (want_name, want_parent)) in municipalities.iter().zip(expected) {
        assert_eq!((name.as_str(), parent.as_str()), (want_name, want_parent));
    }

    // Every loaded boundary got a bbox row
    assert_eq!(store.rows(Level::Country).len(), 2);
    assert_eq!(store.rows(Level::State).len(), 4);
    assert_eq!(store.rows(Level::Municipality).len(), 6);
}

#[test]
fn test_rebuild_is_idempotent() {
    let config = Config::default();
    let (repo, _) = fixture_repo(&config);

    let mut first = MemoryIndexStore::new();
    let mut second = MemoryIndexStore::new();
    let builder = HierarchyBuilder::new(config).unwrap();
    let a = builder.build(&repo, &mut first).unwrap();
    let b = builder.build(&repo, &mut second).unwrap();

    assert_eq!(first, second);
    assert_eq!(a.hierarchy, b.hierarchy);
}

#[test]
fn test_geometric_linking_agrees_with_codes() {
    let (repo, _) = fixture_repo(&Config::default());
    let mut by_code = MemoryIndexStore::new();
    let mut geometric = MemoryIndexStore::new();

    HierarchyBuilder::new(Config::default())
        .unwrap()
        .build(&repo, &mut by_code)
        .unwrap();
    HierarchyBuilder::<RStarIndex>::with_index(
        Config::default()
            .with_state_linking(StateLinking::Geometric)
            .with_parallel(false),
    )
    .unwrap()
    .build(&repo, &mut geometric)
    .unwrap();

    assert_eq!(by_code, geometric);
}

#[test]
fn test_three_squares_tie_goes_to_lowest_id() {
    let config = Config::default();
    let square = |x: f64| {
        PreparedGeometry::new(polygon![
            (x: x, y: 0.0),
            (x: x + 1.0, y: 0.0),
            (x: x + 1.0, y: 1.0),
            (x: x, y: 1.0),
        ])
        .unwrap()
    };
    let parents: ParentLevel = ParentLevel::from_geometries(
        Level::State,
        vec![(UnitId(1), square(0.0)), (UnitId(2), square(1.0)), (UnitId(3), square(2.0))],
        &config,
    )
    .unwrap();
    let assigner = HierarchicalAssigner::new(&parents, &config);

    let straddling = PreparedGeometry::new(polygon![
        (x: 0.8, y: 0.0),
        (x: 1.2, y: 0.0),
        (x: 1.2, y: 1.0),
        (x: 0.8, y: 1.0),
    ])
    .unwrap();
    let result = assigner.assign(UnitId(100), &straddling);
    assert_eq!(result.parent_id, UnitId(1));
    match result.method {
        AssignmentMethod::Overlap { ratio } => assert!((ratio - 0.5).abs() < 1e-9),
        AssignmentMethod::Nearest => panic!("expected an overlap assignment"),
    }

    let far = square(5.0);
    let result = assigner.assign(UnitId(101), &far);
    assert_eq!(result.parent_id, UnitId(3));
    assert_eq!(result.method, AssignmentMethod::Nearest);
}

#[test]
fn test_range_query_finds_every_entry() {
    let entries: Vec<_> = (0..500u64)
        .map(|i| {
            let x = (i % 25) as f64 * 2.0;
            let y = (i / 25) as f64 * 2.0;
            geolocate::IndexedEntry::new(UnitId(i + 1), BoundingBox::new(x, y, x + 1.0, y + 1.0))
        })
        .collect();
    let config = Config::default();
    let tree = <StrTree as geolocate::BulkLoad>::bulk_load(entries.clone(), &config).unwrap();

    for entry in &entries {
        let hits = tree.range_query(&entry.bbox);
        assert_eq!(hits, vec![entry.id], "entry {}", entry.id);
    }
}
