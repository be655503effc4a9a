//! Property-based tests for the polygon merge engine.
//!
//! # Invariants tested
//!
//! - **Overlap-free:** no two accumulated geometries intersect after a pass.
//! - **Bounded growth:** the accumulator never holds more features than were
//!   merged into it.
//! - **Area conservation:** the merged area never exceeds the summed input
//!   area and never drops below the largest single input.

use geo::{Area, Geometry, Intersects, Rect, coord};
use proptest::prelude::*;
use shpload_core::{Attributes, MergeSet, SourceFeature, merge_into};

/// Axis-aligned squares on an integer grid, so touching edges are exact.
fn square_strategy() -> impl Strategy<Value = (i32, i32, i32)> {
    (0..12_i32, 0..12_i32, 1..4_i32)
}

fn square(x: i32, y: i32, size: i32) -> SourceFeature {
    let rect = Rect::new(
        coord! { x: f64::from(x), y: f64::from(y) },
        coord! { x: f64::from(x + size), y: f64::from(y + size) },
    );
    SourceFeature::new(Attributes::new(), Some(Geometry::Polygon(rect.to_polygon())))
}

fn geometries(set: &MergeSet) -> Vec<&Geometry<f64>> {
    set.features()
        .iter()
        .filter_map(|feature| feature.geometry.as_ref())
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: no pair of accumulated geometries intersects.
    #[test]
    fn merged_features_are_pairwise_disjoint(
        squares in prop::collection::vec(square_strategy(), 1..10)
    ) {
        let mut set = MergeSet::default();
        merge_into(squares.iter().map(|&(x, y, s)| square(x, y, s)), &mut set)
            .expect("polygon merge succeeds");

        let geoms = geometries(&set);
        for (i, a) in geoms.iter().enumerate() {
            for b in geoms.iter().skip(i + 1) {
                prop_assert!(!a.intersects(*b), "accumulated features intersect");
            }
        }
    }

    /// Property: merging never creates features.
    #[test]
    fn feature_count_never_exceeds_inputs(
        squares in prop::collection::vec(square_strategy(), 0..10)
    ) {
        let mut set = MergeSet::default();
        merge_into(squares.iter().map(|&(x, y, s)| square(x, y, s)), &mut set)
            .expect("polygon merge succeeds");
        prop_assert!(set.len() <= squares.len());
        prop_assert_eq!(set.is_empty(), squares.is_empty());
    }

    /// Property: union area lies between the largest input and the input sum.
    #[test]
    fn merged_area_is_bounded_by_inputs(
        squares in prop::collection::vec(square_strategy(), 1..8)
    ) {
        let mut set = MergeSet::default();
        merge_into(squares.iter().map(|&(x, y, s)| square(x, y, s)), &mut set)
            .expect("polygon merge succeeds");

        let total: f64 = geometries(&set).iter().map(|g| g.unsigned_area()).sum();
        let sum: f64 = squares.iter().map(|&(_, _, s)| f64::from(s * s)).sum();
        let largest = squares
            .iter()
            .map(|&(_, _, s)| f64::from(s * s))
            .fold(0.0, f64::max);
        prop_assert!(total <= sum + 1e-6, "area {total} exceeds input sum {sum}");
        prop_assert!(total + 1e-6 >= largest, "area {total} below largest input {largest}");
    }
}
