//! YAML case files: one operator configuration plus concrete tensors.
//!
//! ```yaml
//! config:
//!   axis: -1
//!   epsilon: 1.0e-5
//! dtype: f32
//! input:
//!   shape: [2, 3]
//!   data: [1, 2, 3, 4, 4, 4]
//! scale:
//!   shape: [3]
//!   data: [1, 1, 1]
//! bias:            # optional
//!   shape: [3]
//!   data: [0, 0, 0]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capability::ElementType;
use crate::config::LayerNormConfig;
use crate::error::{NormError, ShapeError};
use crate::shape::total;

/// Shape plus row-major data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TensorData {
    pub shape: Vec<usize>,
    pub data: Vec<f32>,
}

impl TensorData {
    /// Product of the shape extents.
    ///
    /// # Errors
    ///
    /// Returns [`ShapeError::ExtentOverflow`] if the product leaves `usize`.
    pub fn element_count(&self) -> Result<usize, ShapeError> {
        total(&self.shape, 0, self.shape.len())
    }

    fn check(&self, buffer: &'static str) -> Result<(), ShapeError> {
        let expected = self.element_count()?;
        if self.data.len() == expected {
            Ok(())
        } else {
            Err(ShapeError::BufferLength {
                buffer,
                expected,
                actual: self.data.len(),
            })
        }
    }
}

/// A complete operator invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NormCase {
    #[serde(default)]
    pub config: LayerNormConfig,
    /// Element type the tensors are meant to be stored in.
    #[serde(default)]
    pub dtype: ElementType,
    pub input: TensorData,
    pub scale: TensorData,
    #[serde(default)]
    pub bias: Option<TensorData>,
}

impl NormCase {
    /// Check the configuration and that each tensor's data fills its shape.
    ///
    /// Compatibility between the tensors is left to the shape resolver.
    ///
    /// # Errors
    ///
    /// Returns [`NormError::Config`] or [`NormError::Shape`].
    pub fn validate(&self) -> Result<(), NormError> {
        self.config.validate()?;
        self.input.check("input")?;
        self.scale.check("scale")?;
        if let Some(bias) = &self.bias {
            bias.check("bias")?;
        }
        Ok(())
    }

    pub fn bias_shape(&self) -> Option<&[usize]> {
        self.bias.as_ref().map(|b| b.shape.as_slice())
    }

    pub fn bias_data(&self) -> Option<&[f32]> {
        self.bias.as_ref().map(|b| b.data.as_slice())
    }
}

/// Parse and validate a case file.
///
/// # Errors
///
/// Returns [`NormError::Io`] if the file cannot be read,
/// [`NormError::Yaml`] if the YAML is malformed, or a validation error.
pub fn parse_case(path: &Path) -> Result<NormCase, NormError> {
    let content = std::fs::read_to_string(path)?;
    parse_case_str(&content)
}

/// Parse and validate a case from a YAML string.
///
/// # Errors
///
/// Returns [`NormError::Yaml`] if the YAML is malformed, or a validation error.
pub fn parse_case_str(yaml: &str) -> Result<NormCase, NormError> {
    let case: NormCase = serde_yaml::from_str(yaml)?;
    case.validate()?;
    Ok(case)
}
