//! Shape resolution: axis normalization, group extents, parameter checks.
//!
//! Input `x` of shape `[d0, .., d(r-1)]` normalized from `axis` is viewed as
//! an `L x G` row-major matrix with `L = d0 * .. * d(axis-1)` independent
//! groups of `G = d(axis) * .. * d(r-1)` contiguous elements.

use serde::Serialize;

use crate::error::ShapeError;

/// Resolved partition of an input shape into groups.
///
/// Derived once per input shape and reused for every forward call on
/// tensors of that shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct GroupLayout {
    /// First dimension of the normalization group, in `[0, rank)`.
    pub axis: usize,
    /// Input rank.
    pub rank: usize,
    /// Number of independent groups (L).
    pub outer: usize,
    /// Elements per group (G); also the scale/bias length.
    pub inner: usize,
}

impl GroupLayout {
    /// Total element count, `L * G`.
    pub fn len(&self) -> usize {
        self.outer * self.inner
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the group consists of the last dimension only.
    pub fn is_last_axis(&self) -> bool {
        self.axis + 1 == self.rank
    }
}

/// Map `axis` from `[-rank, rank)` to `[0, rank)`.
///
/// # Errors
///
/// Returns [`ShapeError::AxisOutOfRange`] otherwise.
pub fn normalize_axis(axis: i64, rank: usize) -> Result<usize, ShapeError> {
    let out_of_range = ShapeError::AxisOutOfRange { axis, rank };
    let signed_rank = i64::try_from(rank).map_err(|_| out_of_range.clone())?;
    let resolved = if axis < 0 { axis + signed_rank } else { axis };
    if (0..signed_rank).contains(&resolved) {
        usize::try_from(resolved).map_err(|_| out_of_range)
    } else {
        Err(out_of_range)
    }
}

/// Product of `shape[start..end]`; 1 for an empty range, 0 if any extent is 0.
///
/// # Errors
///
/// Returns [`ShapeError::ExtentOverflow`] naming the first dimension at which
/// the running product leaves `usize`.
pub fn total(shape: &[usize], start: usize, end: usize) -> Result<usize, ShapeError> {
    let dims = &shape[start..end];
    if dims.contains(&0) {
        return Ok(0);
    }
    dims.iter().enumerate().try_fold(1_usize, |acc, (offset, &d)| {
        acc.checked_mul(d)
            .ok_or(ShapeError::ExtentOverflow { dim: start + offset })
    })
}

/// Partition `shape` into `(axis, L, G)`.
///
/// # Errors
///
/// Returns [`ShapeError::AxisOutOfRange`] for a bad axis,
/// [`ShapeError::EmptyGroup`] when a group dimension has extent 0, and
/// [`ShapeError::ExtentOverflow`] when `L`, `G` or `L * G` does not fit in
/// `usize`. Leading zero extents are allowed and give `L == 0`.
pub fn resolve(shape: &[usize], axis: i64) -> Result<GroupLayout, ShapeError> {
    let rank = shape.len();
    let axis = normalize_axis(axis, rank)?;
    if let Some(offset) = shape[axis..].iter().position(|&d| d == 0) {
        return Err(ShapeError::EmptyGroup { dim: axis + offset });
    }
    let outer = total(shape, 0, axis)?;
    let inner = total(shape, axis, rank)?;
    if outer.checked_mul(inner).is_none() {
        return Err(ShapeError::ExtentOverflow { dim: axis });
    }
    let layout = GroupLayout {
        axis,
        rank,
        outer,
        inner,
    };
    tracing::debug!(
        axis = layout.axis,
        outer = layout.outer,
        inner = layout.inner,
        "resolved normalization layout"
    );
    Ok(layout)
}

/// Check one affine parameter shape against the group dimensions.
///
/// The parameter must equal `input_shape[axis..]`. When the group is the
/// last dimension alone, a `[G, 1]` column is accepted as well.
fn check_param(
    param: &'static str,
    input_shape: &[usize],
    layout: &GroupLayout,
    shape: &[usize],
) -> Result<(), ShapeError> {
    let group_dims = &input_shape[layout.axis..];
    let column = layout.is_last_axis() && shape.len() == 2;
    let dims = if column { &shape[..1] } else { shape };

    if dims.len() != group_dims.len() {
        return Err(ShapeError::RankMismatch {
            param,
            expected: group_dims.len(),
            actual: shape.len(),
        });
    }
    for (dim, (&actual, &expected)) in dims.iter().zip(group_dims).enumerate() {
        if actual != expected {
            return Err(ShapeError::DimMismatch {
                param,
                dim,
                expected,
                actual,
            });
        }
    }
    if column && shape[1] != 1 {
        return Err(ShapeError::ColumnWidth {
            param,
            actual: shape[1],
        });
    }
    Ok(())
}

/// Validate scale and optional bias shapes for a resolved layout.
///
/// # Errors
///
/// Returns a [`ShapeError`] naming the parameter and the offending dimension.
pub fn check_param_shapes(
    input_shape: &[usize],
    layout: &GroupLayout,
    scale_shape: &[usize],
    bias_shape: Option<&[usize]>,
) -> Result<(), ShapeError> {
    if input_shape.len() != layout.rank {
        return Err(ShapeError::RankMismatch {
            param: "input",
            expected: layout.rank,
            actual: input_shape.len(),
        });
    }
    check_param("scale", input_shape, layout, scale_shape)?;

    let Some(bias_shape) = bias_shape else {
        return Ok(());
    };
    if bias_shape.len() != scale_shape.len() {
        return Err(ShapeError::RankMismatch {
            param: "bias",
            expected: scale_shape.len(),
            actual: bias_shape.len(),
        });
    }
    for (dim, (&actual, &expected)) in bias_shape.iter().zip(scale_shape).enumerate() {
        if actual != expected {
            return Err(ShapeError::DimMismatch {
                param: "bias",
                dim,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

/// Check that a flat buffer holds exactly `expected` elements.
pub(crate) fn check_len(
    buffer: &'static str,
    actual: usize,
    expected: usize,
) -> Result<(), ShapeError> {
    if actual == expected {
        Ok(())
    } else {
        Err(ShapeError::BufferLength {
            buffer,
            expected,
            actual,
        })
    }
}

/// Scale and optional bias, canonicalized to length-G vectors.
///
/// Row-major `[G, 1]` columns and flat `[G]` vectors share a memory layout, so
/// binding only checks lengths; shape forms are settled by
/// [`check_param_shapes`].
#[derive(Debug, Clone, Copy)]
pub struct AffineParams<'a, T = f32> {
    pub scale: &'a [T],
    pub bias: Option<&'a [T]>,
}

impl<'a, T> AffineParams<'a, T> {
    /// Bind parameter buffers to a layout.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::BufferLength`] if either buffer is not length G.
    pub fn bind(
        layout: &GroupLayout,
        scale: &'a [T],
        bias: Option<&'a [T]>,
    ) -> Result<Self, ShapeError> {
        check_len("scale", scale.len(), layout.inner)?;
        if let Some(bias) = bias {
            check_len("bias", bias.len(), layout.inner)?;
        }
        Ok(Self { scale, bias })
    }
}
