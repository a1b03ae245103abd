//! Per-group mean and population variance.
//!
//! `mean[l] = (sum_g x[l][g]) / G`, then
//! `variance[l] = (sum_g (x[l][g] - mean[l])^2) / G`.
//! The second pass runs on centered values so precision does not collapse
//! when the mean is large relative to the spread. Sums are carried in `f64`
//! and divided by `G` before narrowing, so a constant group yields its
//! constant as the mean exactly.

use serde::Serialize;

use crate::backend::Backend;
use crate::error::{NormError, ShapeError};
use crate::reduce;
use crate::shape::{check_len, GroupLayout};

/// Statistics for one forward call, one entry per group.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupStats {
    pub mean: Vec<f32>,
    pub variance: Vec<f32>,
}

impl GroupStats {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Report the first negative variance as an invariant fault.
    ///
    /// # Errors
    ///
    /// Returns [`NormError::InternalInvariantFault`] naming the group.
    pub fn verify(&self) -> Result<(), NormError> {
        match self.variance.iter().position(|&v| v < 0.0) {
            Some(group) => {
                let variance = f64::from(self.variance[group]);
                tracing::error!(group, variance, "negative group variance");
                Err(NormError::InternalInvariantFault { group, variance })
            }
            None => Ok(()),
        }
    }
}

/// Sequential two-pass statistics for a single group.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn group_moments(group: &[f32]) -> (f32, f32) {
    let n = group.len() as f64;
    let mut sum = 0.0_f64;
    for &x in group {
        sum += f64::from(x);
    }
    let mean = sum / n;

    let mut var_sum = 0.0_f64;
    for &x in group {
        let diff = f64::from(x) - mean;
        var_sum += diff * diff;
    }
    (mean as f32, (var_sum / n) as f32)
}

/// Compute statistics for every group of `input`.
///
/// # Errors
///
/// Returns [`NormError::Shape`] if `input` does not hold `L * G` elements,
/// and [`NormError::InternalInvariantFault`] if a variance comes out negative.
#[allow(clippy::cast_possible_truncation)]
pub fn compute_statistics(
    input: &[f32],
    layout: &GroupLayout,
    backend: Backend,
) -> Result<GroupStats, NormError> {
    if layout.inner == 0 {
        return Err(ShapeError::EmptyGroup { dim: layout.axis }.into());
    }
    check_len("input", input.len(), layout.len())?;

    let stats = match backend {
        Backend::Scalar => {
            let (mean, variance) = input
                .chunks_exact(layout.inner)
                .map(group_moments)
                .unzip();
            GroupStats { mean, variance }
        }
        Backend::Parallel | Backend::Avx2 => {
            let mut mean = vec![0.0_f64; layout.outer];
            let mut variance = vec![0.0_f64; layout.outer];
            reduce::mean_pass(input, layout.inner, &mut mean);
            reduce::variance_pass(input, layout.inner, &mean, &mut variance);
            GroupStats {
                mean: mean.into_iter().map(|m| m as f32).collect(),
                variance: variance.into_iter().map(|v| v as f32).collect(),
            }
        }
    };
    stats.verify()?;
    Ok(stats)
}
