//! Behavioural tests for loading shapefiles through a recording executor.

use std::cell::RefCell;

use camino::Utf8PathBuf;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use shpload_core::test_support::RecordingExecutor;
use shpload_core::{BindValue, IngestError, SourceError};
use shpload_data::{LoadOptions, LoadReport, load_report};
use tempfile::TempDir;

mod support;

use support::{Column, ShapefileFixture, WGS84_PRJ, temp_dir};

type Outcome = Option<Result<LoadReport, IngestError>>;

#[fixture]
fn dataset() -> RefCell<Option<(TempDir, Utf8PathBuf)>> {
    RefCell::new(None)
}

#[fixture]
fn executor() -> RefCell<RecordingExecutor> {
    RefCell::new(RecordingExecutor::default())
}

#[fixture]
fn outcome() -> RefCell<Outcome> {
    RefCell::new(None)
}

fn parcels() -> ShapefileFixture {
    ShapefileFixture::new(&[
        Column::new("NAME", b'C', 16, 0),
        Column::new("AREA", b'N', 10, 2),
    ])
}

fn write(dataset: &RefCell<Option<(TempDir, Utf8PathBuf)>>, fixture: &ShapefileFixture) {
    let (dir, root) = temp_dir();
    let shp = fixture.write(&root, "parcels");
    *dataset.borrow_mut() = Some((dir, shp));
}

fn expect_report(outcome: &RefCell<Outcome>) -> LoadReport {
    outcome
        .borrow()
        .as_ref()
        .expect("load was attempted")
        .as_ref()
        .expect("expected a successful load")
        .clone()
}

fn run_load(
    dataset: &RefCell<Option<(TempDir, Utf8PathBuf)>>,
    executor: &RefCell<RecordingExecutor>,
    outcome: &RefCell<Outcome>,
) {
    let result = {
        let guard = dataset.borrow();
        let (_, path) = guard.as_ref().expect("dataset prepared");
        load_report(
            path,
            &mut *executor.borrow_mut(),
            &LoadOptions::new("parcels"),
        )
    };
    *outcome.borrow_mut() = Some(result);
}

#[given("a parcel shapefile with 3 polygons and 1 null shape")]
fn parcel_layer(#[from(dataset)] dataset: &RefCell<Option<(TempDir, Utf8PathBuf)>>) {
    let fixture = parcels()
        .row(Some([0.0, 0.0, 1.0, 1.0]), &[b"North", b"1.00"])
        .row(None, &[b"Vacant", b""])
        .row(Some([2.0, 0.0, 3.0, 1.0]), &[b"East", b"1.00"])
        .row(Some([0.0, 2.0, 2.0, 4.0]), &[b"South", b"4.00"]);
    write(dataset, &fixture);
}

#[given("a parcel shapefile with GBK names and no encoding hint")]
fn gbk_layer(#[from(dataset)] dataset: &RefCell<Option<(TempDir, Utf8PathBuf)>>) {
    let fixture = parcels()
        .row(Some([0.0, 0.0, 1.0, 1.0]), &[&[0xD6, 0xD0, 0xCE, 0xC4], b"1.00"])
        .row(Some([2.0, 0.0, 3.0, 1.0]), &[b"Plain", b"1.00"]);
    write(dataset, &fixture);
}

#[given("a parcel shapefile in WGS 84")]
fn wgs84_layer(#[from(dataset)] dataset: &RefCell<Option<(TempDir, Utf8PathBuf)>>) {
    let fixture = parcels()
        .row(Some([116.0, 39.0, 116.5, 39.5]), &[b"Core", b"0.25"])
        .with_prj(WGS84_PRJ)
        .with_cpg("UTF-8");
    write(dataset, &fixture);
}

#[given("a shapefile without its attribute table")]
fn missing_dbf(#[from(dataset)] dataset: &RefCell<Option<(TempDir, Utf8PathBuf)>>) {
    let (dir, root) = temp_dir();
    let shp = parcels()
        .row(Some([0.0, 0.0, 1.0, 1.0]), &[b"Lonely", b"1.00"])
        .write(&root, "parcels");
    std::fs::remove_file(root.join("parcels.dbf")).expect("remove dbf");
    *dataset.borrow_mut() = Some((dir, shp));
}

#[when("I load the shapefile into the parcels table")]
fn load_once(
    #[from(dataset)] dataset: &RefCell<Option<(TempDir, Utf8PathBuf)>>,
    #[from(executor)] executor: &RefCell<RecordingExecutor>,
    #[from(outcome)] outcome: &RefCell<Outcome>,
) {
    run_load(dataset, executor, outcome);
}

#[when("I load the shapefile into the parcels table twice")]
fn load_twice(
    #[from(dataset)] dataset: &RefCell<Option<(TempDir, Utf8PathBuf)>>,
    #[from(executor)] executor: &RefCell<RecordingExecutor>,
    #[from(outcome)] outcome: &RefCell<Outcome>,
) {
    run_load(dataset, executor, outcome);
    expect_report(outcome);
    run_load(dataset, executor, outcome);
}

#[then("4 rows are reported")]
fn four_rows(#[from(outcome)] outcome: &RefCell<Outcome>) {
    let report = expect_report(outcome);
    assert_eq!(report.rows, 4);
    assert_eq!(report.batches, 1);
}

#[then("the parcels sequence and table are created")]
fn schema_created(#[from(executor)] executor: &RefCell<RecordingExecutor>) {
    let executor = executor.borrow();
    assert!(executor.has_relation("parcels_seq"));
    assert!(executor.has_relation("parcels"));
    let create_table = executor
        .statements()
        .get(1)
        .expect("table DDL issued");
    assert!(
        create_table.contains("\"geom\" geometry, \"name\" varchar(16), \"area\" numeric(9,2)"),
        "unexpected DDL: {create_table}"
    );
}

#[then("the schema is created only once")]
fn schema_once(#[from(executor)] executor: &RefCell<RecordingExecutor>) {
    assert_eq!(executor.borrow().statements().len(), 2);
}

#[then("8 rows are inserted")]
fn eight_rows(#[from(executor)] executor: &RefCell<RecordingExecutor>) {
    assert_eq!(executor.borrow().row_count(), 8);
}

#[then("the first inserted name is the decoded Chinese text")]
fn decoded_name(#[from(executor)] executor: &RefCell<RecordingExecutor>) {
    let executor = executor.borrow();
    let name = executor
        .batches()
        .first()
        .and_then(|batch| batch.rows.first())
        .and_then(|row| row.get(1))
        .cloned();
    assert_eq!(name, Some(BindValue::Text("中文".into())));
}

#[then("the reported encoding is GBK")]
fn reported_gbk(#[from(outcome)] outcome: &RefCell<Outcome>) {
    assert_eq!(expect_report(outcome).encoding.as_deref(), Some("GBK"));
}

#[then("the insert reprojects from EPSG 4326")]
fn reprojects(
    #[from(outcome)] outcome: &RefCell<Outcome>,
    #[from(executor)] executor: &RefCell<RecordingExecutor>,
) {
    assert_eq!(expect_report(outcome).source_srid, Some(4326));
    let executor = executor.borrow();
    let sql = &executor.batches().first().expect("one batch").sql;
    assert!(
        sql.contains("ST_Transform(ST_GeomFromText(?, 4326), 4490)"),
        "unexpected insert: {sql}"
    );
}

#[then("a missing component error is returned")]
fn missing_component(#[from(outcome)] outcome: &RefCell<Outcome>) {
    let borrowed = outcome.borrow();
    match borrowed.as_ref().expect("load was attempted") {
        Err(IngestError::Io(SourceError::MissingComponent { component, .. })) => {
            assert_eq!(*component, "dbf");
        }
        other => panic!("expected a missing component error, got {other:?}"),
    }
}

#[scenario(path = "tests/features/shapefile_load.feature", index = 0)]
fn loading_a_parcel_layer(
    dataset: RefCell<Option<(TempDir, Utf8PathBuf)>>,
    executor: RefCell<RecordingExecutor>,
    outcome: RefCell<Outcome>,
) {
    let _ = (dataset, executor, outcome);
}

#[scenario(path = "tests/features/shapefile_load.feature", index = 1)]
fn loading_twice(
    dataset: RefCell<Option<(TempDir, Utf8PathBuf)>>,
    executor: RefCell<RecordingExecutor>,
    outcome: RefCell<Outcome>,
) {
    let _ = (dataset, executor, outcome);
}

#[scenario(path = "tests/features/shapefile_load.feature", index = 2)]
fn detecting_legacy_names(
    dataset: RefCell<Option<(TempDir, Utf8PathBuf)>>,
    executor: RefCell<RecordingExecutor>,
    outcome: RefCell<Outcome>,
) {
    let _ = (dataset, executor, outcome);
}

#[scenario(path = "tests/features/shapefile_load.feature", index = 3)]
fn reprojecting_wgs84(
    dataset: RefCell<Option<(TempDir, Utf8PathBuf)>>,
    executor: RefCell<RecordingExecutor>,
    outcome: RefCell<Outcome>,
) {
    let _ = (dataset, executor, outcome);
}

#[scenario(path = "tests/features/shapefile_load.feature", index = 4)]
fn reporting_missing_dbf(
    dataset: RefCell<Option<(TempDir, Utf8PathBuf)>>,
    executor: RefCell<RecordingExecutor>,
    outcome: RefCell<Outcome>,
) {
    let _ = (dataset, executor, outcome);
}
