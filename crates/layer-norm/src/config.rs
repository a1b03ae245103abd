use serde::{Deserialize, Serialize};

use crate::error::NormError;

/// Default normalization axis: the last dimension.
pub const DEFAULT_AXIS: i64 = -1;

/// Default variance epsilon.
pub const DEFAULT_EPSILON: f32 = 1e-5;

fn default_axis() -> i64 {
    DEFAULT_AXIS
}

fn default_epsilon() -> f32 {
    DEFAULT_EPSILON
}

/// Construction parameters of one layer-norm operator instance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LayerNormConfig {
    /// First axis of the normalization group, in `[-rank, rank)`.
    #[serde(default = "default_axis")]
    pub axis: i64,
    /// Added to the variance inside the square root.
    #[serde(default = "default_epsilon")]
    pub epsilon: f32,
}

impl Default for LayerNormConfig {
    fn default() -> Self {
        Self {
            axis: DEFAULT_AXIS,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl LayerNormConfig {
    /// Build and validate a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NormError::Config`] if `epsilon` is not finite and positive.
    pub fn new(axis: i64, epsilon: f32) -> Result<Self, NormError> {
        let config = Self { axis, epsilon };
        config.validate()?;
        Ok(config)
    }

    /// Epsilon must be finite and strictly positive.
    ///
    /// # Errors
    ///
    /// Returns [`NormError::Config`] otherwise.
    pub fn validate(&self) -> Result<(), NormError> {
        if self.epsilon.is_finite() && self.epsilon > 0.0 {
            Ok(())
        } else {
            Err(NormError::Config(format!(
                "epsilon must be finite and > 0, got {}",
                self.epsilon
            )))
        }
    }
}
