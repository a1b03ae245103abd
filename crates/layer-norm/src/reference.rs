//! Reference path for any supported element type.
//!
//! Elements are widened to `f64` before accumulation and the results
//! narrowed on store. This is where a dispatcher sends reduced-precision
//! tensors refused by [`crate::capability`]; it is also the ground truth the
//! fast backends are checked against.

pub use half::{bf16, f16};

use crate::capability::ElementType;
use crate::error::{NormError, ShapeError};
use crate::shape::{check_len, AffineParams, GroupLayout};
use crate::stats::GroupStats;

/// Element types the reference path accepts.
pub trait Element: Copy + Send + Sync + 'static {
    /// Tag consulted by the capability gate.
    const TYPE: ElementType;

    fn widen(self) -> f64;

    fn narrow(value: f64) -> Self;
}

impl Element for f32 {
    const TYPE: ElementType = ElementType::F32;

    fn widen(self) -> f64 {
        f64::from(self)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn narrow(value: f64) -> Self {
        value as f32
    }
}

impl Element for f16 {
    const TYPE: ElementType = ElementType::F16;

    fn widen(self) -> f64 {
        self.to_f64()
    }

    fn narrow(value: f64) -> Self {
        f16::from_f64(value)
    }
}

impl Element for bf16 {
    const TYPE: ElementType = ElementType::BF16;

    fn widen(self) -> f64 {
        self.to_f64()
    }

    fn narrow(value: f64) -> Self {
        bf16::from_f64(value)
    }
}

/// Layer norm over `input` with `f64` accumulation.
///
/// Returns the per-group statistics narrowed to `f32`. All lengths are
/// checked before `output` is written.
///
/// # Errors
///
/// Returns [`NormError::Shape`] on a buffer length mismatch and
/// [`NormError::InternalInvariantFault`] on a negative variance.
#[allow(
    clippy::many_single_char_names,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]
pub fn layer_norm_reference<T: Element>(
    input: &[T],
    layout: &GroupLayout,
    params: &AffineParams<'_, T>,
    epsilon: f32,
    output: &mut [T],
) -> Result<GroupStats, NormError> {
    if layout.inner == 0 {
        return Err(ShapeError::EmptyGroup { dim: layout.axis }.into());
    }
    check_len("input", input.len(), layout.len())?;
    check_len("output", output.len(), layout.len())?;
    check_len("scale", params.scale.len(), layout.inner)?;
    if let Some(bias) = params.bias {
        check_len("bias", bias.len(), layout.inner)?;
    }

    let g = layout.inner;
    let n = g as f64;
    let mut moments = Vec::with_capacity(layout.outer);
    for (group, row) in input.chunks_exact(g).enumerate() {
        let mean = row.iter().map(|x| x.widen()).sum::<f64>() / n;
        let variance = row
            .iter()
            .map(|x| {
                let d = x.widen() - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        if variance < 0.0 {
            tracing::error!(group, variance, "negative group variance");
            return Err(NormError::InternalInvariantFault { group, variance });
        }
        moments.push((mean, variance));
    }

    let eps = f64::from(epsilon);
    for ((out, row), &(mean, variance)) in output
        .chunks_exact_mut(g)
        .zip(input.chunks_exact(g))
        .zip(&moments)
    {
        let r = 1.0 / (variance + eps).sqrt();
        for (i, (o, x)) in out.iter_mut().zip(row).enumerate() {
            let bias = params.bias.map_or(0.0, |b| b[i].widen());
            *o = T::narrow((x.widen() - mean) * r * params.scale[i].widen() + bias);
        }
    }

    let (mean, variance) = moments
        .iter()
        .map(|&(m, v)| (m as f32, v as f32))
        .unzip();
    Ok(GroupStats { mean, variance })
}
