//! Operator facade: finalize once per input shape, then run forward calls.

use crate::affine::apply_affine;
use crate::backend::Backend;
use crate::config::LayerNormConfig;
use crate::error::NormError;
use crate::export::{decompose, ExportPlan};
use crate::reference::{layer_norm_reference, Element};
use crate::shape::{check_param_shapes, resolve, AffineParams, GroupLayout};
use crate::stats::{compute_statistics, GroupStats};

/// A configured layer-norm operator.
#[derive(Debug, Clone, Copy)]
pub struct LayerNorm {
    config: LayerNormConfig,
    backend: Backend,
}

impl LayerNorm {
    /// # Errors
    ///
    /// Returns [`NormError::Config`] if epsilon is not finite and positive.
    pub fn new(config: LayerNormConfig) -> Result<Self, NormError> {
        config.validate()?;
        Ok(Self {
            config,
            backend: Backend::detect(),
        })
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &LayerNormConfig {
        &self.config
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Resolve the group layout for an input shape and validate parameter shapes.
    ///
    /// # Errors
    ///
    /// Returns [`NormError::Shape`] for a bad axis or incompatible scale/bias.
    pub fn finalize(
        &self,
        input_shape: &[usize],
        scale_shape: &[usize],
        bias_shape: Option<&[usize]>,
    ) -> Result<GroupLayout, NormError> {
        let layout = resolve(input_shape, self.config.axis)?;
        check_param_shapes(input_shape, &layout, scale_shape, bias_shape)?;
        Ok(layout)
    }

    /// Run the fast `f32` path.
    ///
    /// Statistics are computed and verified in full before `output` is
    /// written; on error `output` is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`NormError::Shape`] on buffer length mismatch and
    /// [`NormError::InternalInvariantFault`] on a negative variance.
    pub fn forward(
        &self,
        layout: &GroupLayout,
        input: &[f32],
        scale: &[f32],
        bias: Option<&[f32]>,
        output: &mut [f32],
    ) -> Result<GroupStats, NormError> {
        tracing::trace!(
            outer = layout.outer,
            inner = layout.inner,
            backend = %self.backend,
            "layer norm forward"
        );
        let params = AffineParams::bind(layout, scale, bias)?;
        let stats = compute_statistics(input, layout, self.backend)?;
        apply_affine(
            input,
            layout,
            &stats,
            &params,
            self.config.epsilon,
            self.backend,
            output,
        )?;
        Ok(stats)
    }

    /// Run the widening reference path for any [`Element`] type.
    ///
    /// # Errors
    ///
    /// Same as [`LayerNorm::forward`].
    pub fn forward_reference<T: Element>(
        &self,
        layout: &GroupLayout,
        input: &[T],
        scale: &[T],
        bias: Option<&[T]>,
        output: &mut [T],
    ) -> Result<GroupStats, NormError> {
        let element = T::TYPE;
        tracing::trace!(
            outer = layout.outer,
            inner = layout.inner,
            %element,
            "layer norm reference forward"
        );
        let params = AffineParams::bind(layout, scale, bias)?;
        layer_norm_reference(input, layout, &params, self.config.epsilon, output)
    }

    /// Export plan for engines that only offer MVN, multiply and add.
    pub fn export_plan(&self, layout: &GroupLayout, has_bias: bool) -> ExportPlan {
        decompose(layout, self.config.epsilon, has_bias)
    }
}
