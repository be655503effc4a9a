//! Reading shapefiles written to disk.

use camino::Utf8Path;
use geo::{Area, Geometry};
use rstest::rstest;
use shpload_core::{AttributeValue, FeatureSource, FieldKind, SourceError, SourceFeature};
use shpload_data::{ShapefileSource, read_layer};

mod support;

use support::{CGCS2000_PRJ, Column, ShapefileFixture, temp_dir};

fn roads() -> ShapefileFixture {
    ShapefileFixture::new(&[
        Column::new("NAME", b'C', 12, 0),
        Column::new("LANES", b'N', 3, 0),
        Column::new("OPENED", b'D', 8, 0),
    ])
    .row(Some([0.0, 0.0, 2.0, 1.0]), &[b"Ring Road", b"4", b"19990101"])
    .row(None, &[b"Planned", b"", b""])
}

fn read_all(source: &mut ShapefileSource) -> Vec<SourceFeature> {
    source
        .features()
        .expect("open stream")
        .collect::<Result<_, SourceError>>()
        .expect("read features")
}

#[rstest]
fn reads_header_sidecars_and_features() {
    let (_guard, root) = temp_dir();
    let shp = roads()
        .with_prj(CGCS2000_PRJ)
        .with_cpg("UTF-8")
        .write(&root, "roads");

    let mut source = ShapefileSource::open(&shp, None).expect("open source");
    let kinds: Vec<_> = source.fields().iter().map(|f| (f.name(), f.kind())).collect();
    assert_eq!(
        kinds,
        [
            ("NAME", FieldKind::Character),
            ("LANES", FieldKind::Numeric),
            ("OPENED", FieldKind::Date),
        ]
    );
    assert_eq!(source.crs_description(), Some(CGCS2000_PRJ));
    assert_eq!(source.encoding_hint(), Some("UTF-8"));

    let features = read_all(&mut source);
    assert_eq!(features.len(), 2);
    let first = features.first().expect("first feature");
    assert_eq!(
        first.attributes.get("NAME"),
        Some(&AttributeValue::Text("Ring Road".into()))
    );
    assert_eq!(first.attributes.get("LANES"), Some(&AttributeValue::number("4")));
    let geometry = first.geometry.as_ref().expect("polygon");
    assert!(matches!(geometry, Geometry::MultiPolygon(_)));
    assert!((geometry.unsigned_area() - 2.0).abs() < 1e-9);

    let second = features.get(1).expect("second feature");
    assert!(second.geometry.is_none());
    assert_eq!(second.attributes.get("LANES"), Some(&AttributeValue::Null));
    source.dispose();
}

#[rstest]
fn override_beats_cpg_and_streams_can_be_reopened() {
    let (_guard, root) = temp_dir();
    let shp = roads().with_cpg("UTF-8").write(&root, "roads");

    let mut source = ShapefileSource::open(&shp, Some("GBK")).expect("open source");
    assert_eq!(source.encoding_hint(), Some("GBK"));
    assert_eq!(source.crs_description(), None);
    assert_eq!(read_all(&mut source).len(), 2);
    assert_eq!(read_all(&mut source).len(), 2);
}

#[rstest]
fn unknown_override_is_rejected() {
    let (_guard, root) = temp_dir();
    let shp = roads().write(&root, "roads");

    let err = ShapefileSource::open(&shp, Some("martian")).expect_err("unknown label");
    assert!(matches!(err, SourceError::Encoding(_)));
}

#[rstest]
fn a_shape_without_a_record_fails_the_stream() {
    let (_guard, root) = temp_dir();
    let shp = roads()
        .with_extra_shape([5.0, 5.0, 6.0, 6.0])
        .write(&root, "roads");

    let mut source = ShapefileSource::open(&shp, None).expect("open source");
    let results: Vec<_> = source.features().expect("open stream").collect();
    assert_eq!(results.len(), 3);
    assert!(results.iter().take(2).all(Result::is_ok));
    match results.last() {
        Some(Err(SourceError::Malformed { message, .. })) => {
            assert_eq!(message, "2 attribute records but 3 shapes");
        }
        other => panic!("expected a malformed error, got {other:?}"),
    }
}

fn layer_srids(path: &Utf8Path) -> Vec<Option<i32>> {
    read_layer(path)
        .expect("read layer")
        .features
        .iter()
        .map(|feature| feature.srid)
        .collect()
}

#[rstest]
fn read_layer_tags_features_with_the_layer_srid() {
    let (_guard, root) = temp_dir();
    let tagged = roads().with_prj(CGCS2000_PRJ).write(&root, "tagged");
    let untagged = roads().write(&root, "untagged");

    assert_eq!(layer_srids(&tagged), [Some(4490), Some(4490)]);
    assert_eq!(layer_srids(&untagged), [None, None]);
}
