//! Backend capability gate.
//!
//! A pure table answering whether a given `(axis, element type, device class)`
//! combination may use this crate's fast paths. The numeric code never
//! consults it; an external dispatcher does, and falls back to
//! [`crate::reference`] (or another engine) when a combination is refused.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::NormError;
use crate::shape::normalize_axis;

/// Element type of the tensors handed to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    #[default]
    F32,
    F16,
    BF16,
}

impl ElementType {
    /// Whether the type is narrower than `f32`.
    pub fn is_reduced_precision(self) -> bool {
        matches!(self, Self::F16 | Self::BF16)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::F32 => "f32",
            Self::F16 => "f16",
            Self::BF16 => "bf16",
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "f32" => Ok(Self::F32),
            "f16" => Ok(Self::F16),
            "bf16" => Ok(Self::BF16),
            other => Err(format!(
                "unknown element type '{other}', expected 'f32', 'f16', or 'bf16'"
            )),
        }
    }
}

/// Class of execution target the dispatcher is choosing for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceClass {
    /// Host CPU, scalar or SIMD.
    Cpu,
    /// Wide data-parallel device running the batched-reduction strategy.
    DataParallel,
    /// Graph export into an NPU engine with a fused layer-norm node.
    NpuGraph,
    /// Graph export into an IR engine built from MVN + multiply + add.
    IrGraph,
}

impl DeviceClass {
    pub const ALL: [Self; 4] = [Self::Cpu, Self::DataParallel, Self::NpuGraph, Self::IrGraph];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::DataParallel => "data-parallel",
            Self::NpuGraph => "npu-graph",
            Self::IrGraph => "ir-graph",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown device class '{s}', expected 'cpu', 'data-parallel', 'npu-graph', or 'ir-graph'"
                )
            })
    }
}

/// What a device class's fast path can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Capability {
    reduced_precision: bool,
    last_axis: bool,
}

/// Capability row for `device`; the match is exhaustive, so a new device
/// class does not compile until it is given a row.
fn capability(device: DeviceClass) -> Capability {
    match device {
        DeviceClass::Cpu | DeviceClass::DataParallel => Capability {
            reduced_precision: false,
            last_axis: true,
        },
        // 1-D parameters are stored as 2-D columns there, so a last-axis norm
        // cannot be told apart from a norm over the last two dimensions.
        DeviceClass::NpuGraph => Capability {
            reduced_precision: true,
            last_axis: false,
        },
        DeviceClass::IrGraph => Capability {
            reduced_precision: true,
            last_axis: true,
        },
    }
}

/// Check a combination against the table, naming the reason on refusal.
///
/// `rank` is the input rank; it is needed to tell whether a non-negative
/// `axis` selects the last dimension. An axis outside `[-rank, rank)` is
/// refused as well, since no path can run it.
///
/// # Errors
///
/// Returns [`NormError::UnsupportedConfiguration`] when refused.
pub fn check_support(
    axis: i64,
    rank: usize,
    element: ElementType,
    device: DeviceClass,
) -> Result<(), NormError> {
    let refuse = |reason: &'static str| {
        tracing::debug!(axis, rank, %element, %device, reason, "capability gate refused");
        Err(NormError::UnsupportedConfiguration {
            axis,
            element,
            device,
            reason,
        })
    };

    let Ok(resolved) = normalize_axis(axis, rank) else {
        return refuse("axis out of range for input rank");
    };
    let cap = capability(device);
    if element.is_reduced_precision() && !cap.reduced_precision {
        return refuse("reduced-precision elements must use the reference path");
    }
    if resolved + 1 == rank && !cap.last_axis {
        return refuse("last-axis normalization is ambiguous for 1-D parameters");
    }
    Ok(())
}

/// Whether the fast path for `device` accepts this combination.
pub fn supports(axis: i64, rank: usize, element: ElementType, device: DeviceClass) -> bool {
    check_support(axis, rank, element, device).is_ok()
}
