//! Batched reductions for the data-parallel strategy.
//!
//! Both statistics passes are phrased as one primitive, a batched dot product
//! `out[r] = M[r, ..] . v`, followed by a division by the row length:
//!
//! - pass 1: `mean = (X . 1) / G`
//! - pass 2: `variance = (R . 1) / G` with `R[l][g] = (x[l][g] - mean[l])^2`
//!
//! Rows are independent and run in parallel on the rayon pool; each row is
//! reduced with fixed-width lane accumulators combined by a pairwise tree.
//! Accumulation is in `f64`; callers narrow the finished statistic.

use rayon::prelude::*;

/// Widest lane count that evenly divides `cols` (8, 4, or 1).
pub fn lane_width(cols: usize) -> usize {
    if cols % 8 == 0 {
        8
    } else if cols % 4 == 0 {
        4
    } else {
        1
    }
}

/// Pairwise (tree) sum of a small slice of partial sums.
pub fn tree_sum(partials: &[f64]) -> f64 {
    match partials.len() {
        0 => 0.0,
        1 => partials[0],
        n => {
            let (lo, hi) = partials.split_at(n / 2);
            tree_sum(lo) + tree_sum(hi)
        }
    }
}

/// Dot product with `lane_width(a.len())` independent `f64` accumulators.
#[inline]
#[allow(clippy::needless_range_loop)]
pub fn dot_lanes<T: Copy + Into<f64>>(a: &[T], b: &[T]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let width = lane_width(a.len());
    let mut acc = [0.0_f64; 8];
    for (lhs, rhs) in a.chunks_exact(width).zip(b.chunks_exact(width)) {
        for lane in 0..width {
            acc[lane] += lhs[lane].into() * rhs[lane].into();
        }
    }
    tree_sum(&acc[..width])
}

/// `out[r] = dot(matrix[r*cols..(r+1)*cols], vector)` for every row.
///
/// `matrix` is `out.len() x cols`, row-major.
///
/// # Panics
///
/// Panics if `cols == 0` or the buffer sizes disagree.
pub fn batched_dot<T>(matrix: &[T], cols: usize, vector: &[T], out: &mut [f64])
where
    T: Copy + Into<f64> + Send + Sync,
{
    assert!(cols > 0, "batched_dot requires cols > 0");
    assert_eq!(vector.len(), cols, "vector length must be cols");
    assert_eq!(matrix.len(), out.len() * cols, "matrix must be rows x cols");

    out.par_iter_mut()
        .zip(matrix.par_chunks_exact(cols))
        .for_each(|(slot, row)| *slot = dot_lanes(row, vector));
}

/// Pass 1: per-row mean.
///
/// # Panics
///
/// Panics if `cols == 0` or `input` is not `mean.len() x cols`.
#[allow(clippy::cast_precision_loss)]
pub fn mean_pass(input: &[f32], cols: usize, mean: &mut [f64]) {
    let ones = vec![1.0_f32; cols];
    batched_dot(input, cols, &ones, mean);
    let g = cols as f64;
    mean.par_iter_mut().for_each(|m| *m /= g);
}

/// Fill `residuals[l][g] = (input[l][g] - mean[l])^2`.
///
/// # Panics
///
/// Panics if `residuals` and `input` differ in length, or `input` is not
/// `mean.len() x cols`.
pub fn squared_residuals(input: &[f32], cols: usize, mean: &[f64], residuals: &mut [f64]) {
    assert_eq!(input.len(), residuals.len(), "residual scratch must match input");
    assert_eq!(input.len(), mean.len() * cols, "input must be rows x cols");

    residuals
        .par_chunks_exact_mut(cols)
        .zip(input.par_chunks_exact(cols))
        .zip(mean.par_iter())
        .for_each(|((dst, row), &m)| {
            for (d, &x) in dst.iter_mut().zip(row) {
                let diff = f64::from(x) - m;
                *d = diff * diff;
            }
        });
}

/// Pass 2: per-row population variance around `mean`.
///
/// Allocates one transient `rows x cols` scratch matrix.
///
/// # Panics
///
/// Same as [`squared_residuals`].
#[allow(clippy::cast_precision_loss)]
pub fn variance_pass(input: &[f32], cols: usize, mean: &[f64], variance: &mut [f64]) {
    let mut residuals = vec![0.0_f64; input.len()];
    squared_residuals(input, cols, mean, &mut residuals);
    let ones = vec![1.0_f64; cols];
    batched_dot(&residuals, cols, &ones, variance);
    let g = cols as f64;
    variance.par_iter_mut().for_each(|v| *v /= g);
}
