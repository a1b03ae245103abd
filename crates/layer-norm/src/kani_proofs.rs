//! Kani bounded proofs for shape resolution.
//!
//! All code here is behind `#[cfg(kani)]` and invisible to normal builds.

use crate::shape::{check_param_shapes, normalize_axis, total, GroupLayout};

/// Every accepted axis lands in `[0, rank)`, and every axis in
/// `[-rank, rank)` is accepted.
#[kani::proof]
fn verify_normalize_axis_range() {
    let rank: usize = kani::any();
    let axis: i64 = kani::any();
    kani::assume(rank <= 8);

    match normalize_axis(axis, rank) {
        Ok(resolved) => {
            assert!(resolved < rank);
            assert!(axis == resolved as i64 || axis == resolved as i64 - rank as i64);
        }
        Err(_) => assert!(axis < -(rank as i64) || axis >= rank as i64),
    }
}

/// `L * G` equals the element count for every split point.
#[kani::proof]
#[kani::unwind(5)]
fn verify_extents_cover_shape() {
    const RANK: usize = 4;
    let shape: [usize; RANK] = kani::any();
    kani::assume(shape.iter().all(|&d| d <= 4));
    let axis: usize = kani::any();
    kani::assume(axis < RANK);

    match (
        total(&shape, 0, axis),
        total(&shape, axis, RANK),
        total(&shape, 0, RANK),
    ) {
        (Ok(outer), Ok(inner), Ok(all)) => assert_eq!(outer * inner, all),
        _ => panic!("extents bounded by 4 cannot overflow"),
    }
}

/// A `[G, 1]` column is accepted exactly when the group is the last axis.
#[kani::proof]
#[kani::unwind(4)]
fn verify_column_scale_only_on_last_axis() {
    let g: usize = kani::any();
    kani::assume(g > 0 && g <= 4);
    let axis: usize = kani::any();
    kani::assume(axis < 2);

    let input = [3_usize, g];
    let layout = GroupLayout {
        axis,
        rank: 2,
        outer: if axis == 0 { 1 } else { 3 },
        inner: if axis == 0 { 3 * g } else { g },
    };
    let accepted = check_param_shapes(&input, &layout, &[g, 1], None).is_ok();
    if axis == 1 {
        assert!(accepted);
    }
    if axis == 0 && g != 1 {
        assert!(!accepted);
    }
}
