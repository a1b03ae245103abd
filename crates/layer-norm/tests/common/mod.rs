//! Shared helpers for the layer-norm integration tests.
#![allow(dead_code, clippy::cast_precision_loss)]

use std::path::{Path, PathBuf};

/// Asserts every element in a slice is finite (not NaN or infinite).
pub fn assert_all_finite(slice: &[f32]) {
    for (i, &val) in slice.iter().enumerate() {
        assert!(val.is_finite(), "Element [{i}] is not finite: {val}");
    }
}

/// Mean and population variance of one group, accumulated in f64.
pub fn moments(group: &[f32]) -> (f64, f64) {
    let n = group.len() as f64;
    let mean = group.iter().map(|&x| f64::from(x)).sum::<f64>() / n;
    let var = group
        .iter()
        .map(|&x| (f64::from(x) - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, var)
}

/// Deterministic pseudo-random values in `[-scale, scale)`.
pub fn lcg_values(n: usize, seed: u64, scale: f32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
    (0..n)
        .map(|_| {
            state = state
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            let unit = (state >> 40) as f32 / (1_u64 << 24) as f32;
            (unit * 2.0 - 1.0) * scale
        })
        .collect()
}

/// Whether a group has enough spread that epsilon is negligible.
pub fn well_spread(group: &[f32]) -> bool {
    moments(group).1 > 1e-2
}

/// Path to a YAML fixture under the workspace `cases/` directory.
pub fn case_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../cases")
        .join(name)
}
