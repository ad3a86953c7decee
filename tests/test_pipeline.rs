mod common;

use std::fs;
use std::io::Write;
use std::str::FromStr;

use camino::Utf8PathBuf;
use hifitime::Epoch;

use common::{clustered_points, light_curves, uniform_points};
use skypart::coordinates::{angular_separation, SkyPoint};
use skypart::ingest::{IngestParams, IngestRouter};
use skypart::observations::csv_reader::read_observations_csv;
use skypart::observations::validation::{validate, validate_observations, ValidationRanges};
use skypart::observations::Observation;
use skypart::partitioning::{
    AdaptivePartitioner, EntityPartitionMap, PartitionLayout, PartitionParams,
};
use skypart::query::SkyQuery;
use skypart::skypart_errors::SkyPartError;
use skypart::store::{MemoryStore, TimeRange};

fn scratch_file(name: &str) -> Utf8PathBuf {
    let dir = Utf8PathBuf::from_path_buf(std::env::temp_dir()).unwrap();
    dir.join(format!("skypart-{}-{name}", std::process::id()))
}

fn write_csv(path: &Utf8PathBuf, rows: &[Observation]) {
    let mut file = fs::File::create(path).unwrap();
    writeln!(file, "source_id,ts,ra,dec,mag,jd_tcb").unwrap();
    for o in rows {
        writeln!(
            file,
            "{},{},{},{},{},{}",
            o.source_id,
            o.ts.to_unix_milliseconds().round() as i64,
            o.ra,
            o.dec,
            o.mag,
            o.jd_tcb
        )
        .unwrap();
    }
}

fn catalog() -> (Vec<Observation>, SkyPoint) {
    let cluster_center = SkyPoint::new(266.4, -29.0);
    let mut points = uniform_points(30, 1);
    points.extend(clustered_points(cluster_center, 0.2, 10, 2));
    (light_curves(&points, 73, 5.0), cluster_center)
}

#[test]
fn test_csv_to_queries() {
    let (rows, cluster_center) = catalog();
    let path = scratch_file("observations.csv");
    write_csv(&path, &rows);
    let loaded = read_observations_csv(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(loaded.len(), rows.len());

    let params = PartitionParams::builder()
        .density_threshold(100)
        .build()
        .unwrap();
    let assignment = AdaptivePartitioner::new(params).assign_observations(loaded);
    let report = validate(&assignment.records, &ValidationRanges::default().strict(true)).unwrap();
    assert!(report.is_clean());
    assert!(!assignment.layout.refined_cells().is_empty());

    let store = MemoryStore::new();
    let ingest = IngestParams::builder().batch_size(50).workers(3).build().unwrap();
    let summary = IngestRouter::new(&store, ingest)
        .ingest(&assignment.records)
        .unwrap();
    assert_eq!(summary.success as usize, rows.len());
    assert_eq!(summary.entities, 40);

    // Side files: entity map and refined cells, reloaded as a reader would.
    let map_path = scratch_file("entities.csv");
    assignment.entities.write_csv(&map_path).unwrap();
    let entities = EntityPartitionMap::read_csv(&map_path).unwrap();
    fs::remove_file(&map_path).unwrap();
    assert_eq!(entities.len(), 40);
    let layout = PartitionLayout::new(params, assignment.layout.refined_cells()).unwrap();
    assert_eq!(layout, assignment.layout);

    let query = SkyQuery::new(&store, layout).with_entities(entities);

    // Time windows ending 2024-12-30.
    let end = Epoch::from_str("2024-12-30T00:00:00 UTC").unwrap();
    for days in [30.0, 90.0, 180.0] {
        let window = TimeRange::last_days(end, days);
        let expected: Vec<_> = rows
            .iter()
            .filter(|o| o.source_id == 35 && window.contains(o.ts))
            .collect();
        let stats = query.entity_time_stats(35, Some(&window)).unwrap();
        assert_eq!(stats.count, expected.len());
        assert!(stats.count > 0);
        assert!(stats.first.unwrap() >= window.start);
        assert!(stats.last.unwrap() <= window.end);
    }

    // Every epoch of the ten clustered sources lies within 0.5 degree of the centre.
    let cone = query.cone(&cluster_center, 0.5f64.to_radians()).unwrap();
    let expected = rows
        .iter()
        .filter(|o| angular_separation(&cluster_center, &o.position()) <= 0.5f64.to_radians())
        .count();
    assert_eq!(cone.len(), expected);
    assert!(cone.len() >= 10 * 73);

    let target = rows.iter().find(|o| o.source_id == 12).unwrap();
    let hit = query.nearest(&target.position()).unwrap().unwrap();
    assert_eq!(hit.observation.source_id, 12);
    assert!(hit.separation < 1e-9);
}

#[test]
fn test_missing_column_file() {
    let path = scratch_file("no-mag.csv");
    fs::write(&path, "ts,ra,dec,jd_tcb,source_id\n1704067200000,1,2,2460310.5,7\n").unwrap();
    let err = read_observations_csv(&path).unwrap_err();
    fs::remove_file(&path).unwrap();
    assert_eq!(err, SkyPartError::MissingColumn("mag".into()));
}

#[test]
fn test_missing_file_is_an_error() {
    let path = scratch_file("does-not-exist.csv");
    assert!(read_observations_csv(&path).is_err());
}

#[test]
fn test_blank_positions_are_rejected_before_keying() {
    let path = scratch_file("blank-positions.csv");
    fs::write(
        &path,
        "source_id,ts,ra,dec,mag,jd_tcb\n\
         1,1704067200000,45.0,-80.0,15.1,2460310.5\n\
         2,1704067260000,,,15.2,2460310.5\n\
         3,1704067320000,,-80.0,15.3,2460310.5\n\
         4,1704067380000,200.0,10.0,,2460310.5\n",
    )
    .unwrap();
    let loaded = read_observations_csv(&path).unwrap();
    fs::remove_file(&path).unwrap();
    assert_eq!(loaded.len(), 4);

    let report = validate_observations(&loaded, &ValidationRanges::default()).unwrap();
    assert!(!report.is_clean());

    let params = PartitionParams::builder()
        .density_threshold(1)
        .build()
        .unwrap();
    let assignment = AdaptivePartitioner::new(params).assign_observations(loaded);
    assert_eq!(assignment.occupancy.total_points(), 2);
    assert!(assignment.layout.refined_cells().is_empty());
    assert_eq!(
        assignment.rejected.iter().map(|o| o.source_id).collect::<Vec<_>>(),
        [2, 3]
    );
    assert_eq!(assignment.entities.len(), 2);

    // The blank magnitude keeps its key and is dropped by the store as one row error.
    let store = MemoryStore::new();
    let summary = IngestRouter::new(&store, IngestParams::default())
        .ingest(&assignment.records)
        .unwrap();
    assert_eq!((summary.success, summary.errors), (1, 1));
}
