//! Behavioural tests for the polygon merge engine.

use std::cell::RefCell;

use geo::{Area, Geometry, Rect, coord};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use shpload_core::{Attributes, MergeSet, SourceFeature, SourceLayer, merge_all, merge_into};

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> SourceFeature {
    let rect = Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 });
    SourceFeature::new(Attributes::new(), Some(Geometry::Polygon(rect.to_polygon())))
}

#[fixture]
fn accumulator() -> RefCell<MergeSet> {
    RefCell::new(MergeSet::default())
}

#[fixture]
fn layers() -> RefCell<Vec<SourceLayer>> {
    RefCell::new(Vec::new())
}

#[given("an empty merge accumulator")]
fn given_empty(#[from(accumulator)] accumulator: &RefCell<MergeSet>) {
    *accumulator.borrow_mut() = MergeSet::default();
}

#[given("three layers where the second layer bridges two features of the first")]
fn given_bridge_layers(#[from(layers)] layers: &RefCell<Vec<SourceLayer>>) {
    *layers.borrow_mut() = vec![
        SourceLayer::new(
            vec![],
            vec![
                square(0.0, 0.0, 1.0, 1.0),
                square(3.0, 0.0, 4.0, 1.0),
                square(10.0, 10.0, 11.0, 11.0),
            ],
        ),
        SourceLayer::new(vec![], vec![square(0.5, 0.25, 3.5, 0.75)]),
        SourceLayer::new(vec![], vec![square(20.0, 20.0, 21.0, 21.0)]),
    ];
}

#[when("I merge the unit squares at 0,0 and 5,5")]
fn when_merge_disjoint(#[from(accumulator)] accumulator: &RefCell<MergeSet>) {
    merge_into(
        [square(0.0, 0.0, 1.0, 1.0), square(5.0, 5.0, 6.0, 6.0)],
        &mut accumulator.borrow_mut(),
    )
    .expect("merge succeeds");
}

#[when("I merge the squares 0,0 to 2,2 and 1,1 to 3,3")]
fn when_merge_overlapping(#[from(accumulator)] accumulator: &RefCell<MergeSet>) {
    merge_into(
        [square(0.0, 0.0, 2.0, 2.0), square(1.0, 1.0, 3.0, 3.0)],
        &mut accumulator.borrow_mut(),
    )
    .expect("merge succeeds");
}

#[when("I merge a feature without geometry")]
fn when_merge_null(#[from(accumulator)] accumulator: &RefCell<MergeSet>) {
    merge_into(
        [SourceFeature::new(Attributes::new(), None)],
        &mut accumulator.borrow_mut(),
    )
    .expect("merge succeeds");
}

#[when("I merge all layers")]
fn when_merge_all(
    #[from(layers)] layers: &RefCell<Vec<SourceLayer>>,
    #[from(accumulator)] accumulator: &RefCell<MergeSet>,
) {
    let input = std::mem::take(&mut *layers.borrow_mut());
    *accumulator.borrow_mut() = merge_all(input).expect("merge succeeds");
}

#[then("the accumulator holds {count} features")]
fn then_count(#[from(accumulator)] accumulator: &RefCell<MergeSet>, count: usize) {
    assert_eq!(accumulator.borrow().len(), count);
}

#[then("the only feature is a multi-polygon with area {area}")]
fn then_single_multipolygon(#[from(accumulator)] accumulator: &RefCell<MergeSet>, area: f64) {
    let set = accumulator.borrow();
    let feature = set.features().first().expect("one feature");
    let geometry = feature.geometry.as_ref().expect("geometry present");
    assert!(matches!(geometry, Geometry::MultiPolygon(_)));
    assert!((geometry.unsigned_area() - area).abs() < 1e-9);
}

#[then("the merged set is one smaller than the first layer plus the third layer")]
fn then_net_reduction(#[from(accumulator)] accumulator: &RefCell<MergeSet>) {
    // Three seeded features, two absorbed by the bridge, plus the third layer.
    assert_eq!(accumulator.borrow().len(), 3);
}

#[scenario(path = "tests/features/polygon_merge.feature", index = 0)]
fn scenario_disjoint(accumulator: RefCell<MergeSet>, layers: RefCell<Vec<SourceLayer>>) {
    let _ = (accumulator, layers);
}

#[scenario(path = "tests/features/polygon_merge.feature", index = 1)]
fn scenario_overlapping(accumulator: RefCell<MergeSet>, layers: RefCell<Vec<SourceLayer>>) {
    let _ = (accumulator, layers);
}

#[scenario(path = "tests/features/polygon_merge.feature", index = 2)]
fn scenario_bridge(accumulator: RefCell<MergeSet>, layers: RefCell<Vec<SourceLayer>>) {
    let _ = (accumulator, layers);
}

#[scenario(path = "tests/features/polygon_merge.feature", index = 3)]
fn scenario_null_geometry(accumulator: RefCell<MergeSet>, layers: RefCell<Vec<SourceLayer>>) {
    let _ = (accumulator, layers);
}
