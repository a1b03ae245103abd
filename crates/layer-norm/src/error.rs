use thiserror::Error;

use crate::capability::{DeviceClass, ElementType};

/// Shape incompatibilities detected before any buffer is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("axis {axis} is out of range for rank {rank} (expected -{rank} <= axis < {rank})")]
    AxisOutOfRange { axis: i64, rank: usize },

    #[error("{param}: expected {expected} dimension(s) from the normalization axis, got {actual}")]
    RankMismatch {
        param: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{param}: dimension {dim} is {actual}, expected {expected}")]
    DimMismatch {
        param: &'static str,
        dim: usize,
        expected: usize,
        actual: usize,
    },

    #[error("{param}: column form must have width 1, got {actual}")]
    ColumnWidth { param: &'static str, actual: usize },

    #[error("{buffer}: buffer holds {actual} element(s), expected {expected}")]
    BufferLength {
        buffer: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("normalization group is empty (dimension {dim} has extent 0)")]
    EmptyGroup { dim: usize },

    #[error("element count overflows usize at dimension {dim}")]
    ExtentOverflow { dim: usize },
}

#[derive(Debug, Error)]
pub enum NormError {
    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("Unsupported configuration: axis {axis}, {element} on {device}: {reason}")]
    UnsupportedConfiguration {
        axis: i64,
        element: ElementType,
        device: DeviceClass,
        reason: &'static str,
    },

    #[error("Internal invariant fault: group {group} produced variance {variance}")]
    InternalInvariantFault { group: usize, variance: f64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to read case file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl NormError {
    /// Whether the caller should route the call to a fallback path instead of failing.
    pub fn is_fallback_signal(&self) -> bool {
        matches!(self, Self::UnsupportedConfiguration { .. })
    }
}
