//! Fused normalize + scale + shift.
//!
//! `output[l][g] = (x[l][g] - mean[l]) * rsqrt(variance[l] + eps) * scale[g] + bias[g]`
//!
//! Epsilon is added inside the square root. The map is elementwise once the
//! statistics are known, so groups are processed independently.

#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;

use rayon::prelude::*;

use crate::backend::{avx2_available, Backend};
use crate::error::NormError;
use crate::shape::{check_len, AffineParams, GroupLayout};
use crate::stats::GroupStats;

/// Reciprocal standard deviation with epsilon inside the root.
#[inline]
pub fn inv_std(variance: f32, epsilon: f32) -> f32 {
    1.0 / (variance + epsilon).sqrt()
}

// ────────────────────────────────────────────────────────────────────────────
// Row kernels
// ────────────────────────────────────────────────────────────────────────────

#[inline]
#[allow(clippy::many_single_char_names)]
fn affine_row(x: &[f32], mean: f32, inv_std: f32, params: &AffineParams<'_>, out: &mut [f32]) {
    match params.bias {
        Some(bias) => {
            for (((o, &x), &s), &b) in out.iter_mut().zip(x).zip(params.scale).zip(bias) {
                *o = (x - mean) * inv_std * s + b;
            }
        }
        None => {
            for ((o, &x), &s) in out.iter_mut().zip(x).zip(params.scale) {
                *o = (x - mean) * inv_std * s;
            }
        }
    }
}

/// AVX2 row kernel, 8 lanes per step with a scalar tail.
///
/// # Safety
///
/// Requires AVX2 support. Caller must verify with `is_x86_feature_detected!("avx2")`.
///
/// # Panics
///
/// Panics if `scale`, `bias` (when present) or `out` differ in length from `x`.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[allow(clippy::needless_range_loop)]
unsafe fn affine_row_avx2(
    x: &[f32],
    mean: f32,
    inv_std: f32,
    scale: &[f32],
    bias: Option<&[f32]>,
    out: &mut [f32],
) {
    let n = x.len();
    assert_eq!(n, scale.len(), "row/scale length mismatch");
    assert_eq!(n, out.len(), "row/output length mismatch");
    if let Some(bias) = bias {
        assert_eq!(n, bias.len(), "row/bias length mismatch");
    }

    let chunks = n / 8;

    // SAFETY: caller guarantees AVX2; every load/store stays below chunks * 8 <= n.
    unsafe {
        let mean_vec = _mm256_set1_ps(mean);
        let inv_std_vec = _mm256_set1_ps(inv_std);
        for i in 0..chunks {
            let off = i * 8;
            let xv = _mm256_loadu_ps(x.as_ptr().add(off));
            let sv = _mm256_loadu_ps(scale.as_ptr().add(off));
            let centered = _mm256_sub_ps(xv, mean_vec);
            let normed = _mm256_mul_ps(centered, inv_std_vec);
            let mut result = _mm256_mul_ps(normed, sv);
            if let Some(bias) = bias {
                let bv = _mm256_loadu_ps(bias.as_ptr().add(off));
                result = _mm256_add_ps(result, bv);
            }
            _mm256_storeu_ps(out.as_mut_ptr().add(off), result);
        }
    }

    for i in chunks * 8..n {
        let normed = (x[i] - mean) * inv_std * scale[i];
        out[i] = match bias {
            Some(bias) => normed + bias[i],
            None => normed,
        };
    }
}

#[inline]
fn dispatch_row(
    use_avx2: bool,
    x: &[f32],
    mean: f32,
    inv_std: f32,
    params: &AffineParams<'_>,
    out: &mut [f32],
) {
    #[cfg(target_arch = "x86_64")]
    {
        if use_avx2 {
            // SAFETY: use_avx2 is only set after runtime AVX2 detection.
            unsafe { affine_row_avx2(x, mean, inv_std, params.scale, params.bias, out) };
            return;
        }
    }
    #[cfg(not(target_arch = "x86_64"))]
    let _ = use_avx2;
    affine_row(x, mean, inv_std, params, out);
}

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

/// Apply the fused transform to every group.
///
/// Every length is checked and the statistics verified before `output` is
/// touched, so a failed call leaves `output` unmodified.
///
/// # Errors
///
/// Returns [`NormError::Shape`] on a buffer length mismatch and
/// [`NormError::InternalInvariantFault`] if `stats` holds a negative variance.
#[allow(clippy::many_single_char_names)]
pub fn apply_affine(
    input: &[f32],
    layout: &GroupLayout,
    stats: &GroupStats,
    params: &AffineParams<'_>,
    epsilon: f32,
    backend: Backend,
    output: &mut [f32],
) -> Result<(), NormError> {
    check_len("input", input.len(), layout.len())?;
    check_len("output", output.len(), layout.len())?;
    check_len("mean", stats.mean.len(), layout.outer)?;
    check_len("variance", stats.variance.len(), layout.outer)?;
    check_len("scale", params.scale.len(), layout.inner)?;
    if let Some(bias) = params.bias {
        check_len("bias", bias.len(), layout.inner)?;
    }
    stats.verify()?;
    if layout.is_empty() {
        return Ok(());
    }

    let g = layout.inner;
    match backend {
        Backend::Scalar => {
            for (l, (out, x)) in output.chunks_exact_mut(g).zip(input.chunks_exact(g)).enumerate() {
                let r = inv_std(stats.variance[l], epsilon);
                affine_row(x, stats.mean[l], r, params, out);
            }
        }
        Backend::Parallel | Backend::Avx2 => {
            let use_avx2 = backend == Backend::Avx2 && avx2_available();
            output
                .par_chunks_exact_mut(g)
                .zip(input.par_chunks_exact(g))
                .zip(stats.mean.par_iter().zip(stats.variance.par_iter()))
                .for_each(|((out, x), (&mean, &variance))| {
                    dispatch_row(use_avx2, x, mean, inv_std(variance, epsilon), params, out);
                });
        }
    }
    Ok(())
}

/// Normalize only: `(x - mean) * rsqrt(variance + eps)` per group.
///
/// This is the first stage of the exported decomposition.
///
/// # Errors
///
/// Same as [`apply_affine`].
pub fn normalize(
    input: &[f32],
    layout: &GroupLayout,
    stats: &GroupStats,
    epsilon: f32,
    backend: Backend,
    output: &mut [f32],
) -> Result<(), NormError> {
    let unit = vec![1.0_f32; layout.inner];
    let params = AffineParams {
        scale: &unit,
        bias: None,
    };
    apply_affine(input, layout, stats, &params, epsilon, backend, output)
}

/// In place `data[l][g] *= factor[g]` for every group.
///
/// # Errors
///
/// Returns [`NormError::Shape`] on a length mismatch.
pub fn scale_rows(data: &mut [f32], layout: &GroupLayout, factor: &[f32]) -> Result<(), NormError> {
    check_len("data", data.len(), layout.len())?;
    check_len("scale", factor.len(), layout.inner)?;
    if layout.is_empty() {
        return Ok(());
    }
    data.par_chunks_exact_mut(layout.inner).for_each(|row| {
        for (v, &s) in row.iter_mut().zip(factor) {
            *v *= s;
        }
    });
    Ok(())
}

/// In place `data[l][g] += addend[g]` for every group.
///
/// # Errors
///
/// Returns [`NormError::Shape`] on a length mismatch.
pub fn shift_rows(data: &mut [f32], layout: &GroupLayout, addend: &[f32]) -> Result<(), NormError> {
    check_len("data", data.len(), layout.len())?;
    check_len("bias", addend.len(), layout.inner)?;
    if layout.is_empty() {
        return Ok(());
    }
    data.par_chunks_exact_mut(layout.inner).for_each(|row| {
        for (v, &b) in row.iter_mut().zip(addend) {
            *v += b;
        }
    });
    Ok(())
}
