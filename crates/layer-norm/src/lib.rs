//! # layer-norm
//!
//! Layer normalization over row-major tensors: group statistics, the fused
//! normalize-scale-shift transform, and the capability table an external
//! dispatcher consults before choosing a path.
//!
//! `y[l][g] = (x[l][g] - mean[l]) * rsqrt(var[l] + eps) * scale[g] + bias[g]`
//!
//! ## Modules
//!
//! - [`shape`]: Axis normalization, `(axis, L, G)` resolution, parameter shape checks
//! - [`stats`]: Two-pass per-group mean and population variance
//! - [`affine`]: Fused normalize + scale + shift, and its split stages
//! - [`reduce`]: Batched dot-product reductions for the data-parallel strategy
//! - [`capability`]: `supports(axis, element, device)` table
//! - [`reference`]: Widening reference path for `f32`, `f16`, `bf16`
//! - [`export`]: Staged MVN/multiply/add plan and fused NPU node attributes
//! - [`layer`]: Operator facade tying configuration to the passes
//! - [`config`] / [`case`]: YAML operator parameters and case files
//! - [`ulp`]: Float comparison helpers for backend parity checks

pub mod affine;
pub mod backend;
pub mod capability;
pub mod case;
pub mod config;
pub mod error;
pub mod export;
pub mod layer;
pub mod reduce;
pub mod reference;
pub mod shape;
pub mod stats;
pub mod ulp;

#[cfg(kani)]
mod kani_proofs;

pub use backend::Backend;
pub use capability::{supports, DeviceClass, ElementType};
pub use config::LayerNormConfig;
pub use error::{NormError, ShapeError};
pub use layer::LayerNorm;
pub use shape::{AffineParams, GroupLayout};
pub use stats::GroupStats;
