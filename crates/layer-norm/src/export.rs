//! Graph-export forms of the operator.
//!
//! Engines without a fused layer-norm primitive receive a staged plan:
//! mean/variance normalization over the group axes, then a broadcast
//! multiply by scale, then a broadcast add of bias. Engines with a fused
//! node receive its attributes instead.

use serde::Serialize;

use crate::affine::{normalize, scale_rows, shift_rows};
use crate::backend::Backend;
use crate::capability::{check_support, DeviceClass, ElementType};
use crate::error::NormError;
use crate::shape::{check_len, AffineParams, GroupLayout};
use crate::stats::compute_statistics;

/// Where epsilon enters the variance term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EpsMode {
    /// `sqrt(variance + eps)`.
    InsideSqrt,
}

/// Which operator input a stage consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    Scale,
    Bias,
}

/// One node of the exported graph, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ExportStage {
    /// Mean/variance normalization over `axes`.
    Mvn {
        axes: Vec<usize>,
        normalize_variance: bool,
        epsilon: f32,
        eps_mode: EpsMode,
    },
    /// Reshape a 1-D parameter to `[1, .., 1, -1]` so it broadcasts over the
    /// last dimension of the input.
    Reshape { operand: Operand, target: Vec<i64> },
    /// Broadcast multiply by the scale parameter.
    Multiply { operand: Operand },
    /// Broadcast add of the bias parameter.
    Add { operand: Operand },
}

/// Ordered export plan for an IR-style engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportPlan {
    pub layout: GroupLayout,
    pub stages: Vec<ExportStage>,
}

/// Decompose the operator into MVN + multiply (+ add).
pub fn decompose(layout: &GroupLayout, epsilon: f32, has_bias: bool) -> ExportPlan {
    let mut stages = vec![ExportStage::Mvn {
        axes: (layout.axis..layout.rank).collect(),
        normalize_variance: true,
        epsilon,
        eps_mode: EpsMode::InsideSqrt,
    }];

    if layout.is_last_axis() {
        let mut target = vec![1_i64; layout.rank];
        if let Some(last) = target.last_mut() {
            *last = -1;
        }
        stages.push(ExportStage::Reshape {
            operand: Operand::Scale,
            target: target.clone(),
        });
        if has_bias {
            stages.push(ExportStage::Reshape {
                operand: Operand::Bias,
                target,
            });
        }
    }

    stages.push(ExportStage::Multiply {
        operand: Operand::Scale,
    });
    if has_bias {
        stages.push(ExportStage::Add {
            operand: Operand::Bias,
        });
    }
    ExportPlan {
        layout: *layout,
        stages,
    }
}

/// Gate-checked [`decompose`] for the IR graph target.
///
/// # Errors
///
/// Returns [`NormError::UnsupportedConfiguration`] if the gate refuses.
#[allow(clippy::cast_possible_wrap)]
pub fn ir_plan(
    layout: &GroupLayout,
    epsilon: f32,
    has_bias: bool,
    element: ElementType,
) -> Result<ExportPlan, NormError> {
    check_support(layout.axis as i64, layout.rank, element, DeviceClass::IrGraph)?;
    Ok(decompose(layout, epsilon, has_bias))
}

impl ExportPlan {
    /// Execute the plan stage by stage on host buffers.
    ///
    /// Reshape stages only change how a parameter is viewed and do not touch
    /// data. The result matches the fused operator within float tolerance.
    ///
    /// # Errors
    ///
    /// Returns [`NormError::Shape`] on a length mismatch, or
    /// [`NormError::Config`] if the plan references a missing bias.
    pub fn evaluate(
        &self,
        input: &[f32],
        params: &AffineParams<'_>,
        backend: Backend,
        output: &mut [f32],
    ) -> Result<(), NormError> {
        let layout = &self.layout;
        check_len("output", output.len(), layout.len())?;
        let needs_bias = self
            .stages
            .iter()
            .any(|s| matches!(s, ExportStage::Add { .. }));
        if needs_bias && params.bias.is_none() {
            return Err(NormError::Config("plan adds a bias but none was bound".into()));
        }

        for stage in &self.stages {
            match stage {
                ExportStage::Mvn { epsilon, .. } => {
                    let stats = compute_statistics(input, layout, backend)?;
                    normalize(input, layout, &stats, *epsilon, backend, output)?;
                }
                ExportStage::Reshape { .. } => {}
                ExportStage::Multiply { .. } => scale_rows(output, layout, params.scale)?,
                ExportStage::Add { .. } => {
                    if let Some(bias) = params.bias {
                        shift_rows(output, layout, bias)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Attributes of a fused layer-norm node on an NPU graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NpuLayerNormNode {
    pub begin_norm_axis: usize,
    pub begin_params_axis: usize,
    pub epsilon: f32,
    /// The node also yields mean and variance outputs.
    pub emits_statistics: bool,
}

/// Build the fused NPU node for a resolved layout.
///
/// # Errors
///
/// Returns [`NormError::UnsupportedConfiguration`] for a last-axis layout,
/// which that engine cannot represent.
#[allow(clippy::cast_possible_wrap)]
pub fn npu_node(
    layout: &GroupLayout,
    epsilon: f32,
    element: ElementType,
) -> Result<NpuLayerNormNode, NormError> {
    check_support(layout.axis as i64, layout.rank, element, DeviceClass::NpuGraph)?;
    Ok(NpuLayerNormNode {
        begin_norm_axis: layout.axis,
        begin_params_axis: layout.axis,
        epsilon,
        emits_statistics: true,
    })
}

#[cfg(test)]
#[allow(clippy::cast_precision_loss)]
mod tests {
    use super::*;
    use crate::affine::apply_affine;
    use crate::shape::resolve;

    #[test]
    fn last_axis_plan_reshapes_parameters() {
        let layout = resolve(&[2, 4, 8], -1).unwrap();
        let plan = decompose(&layout, 1e-5, true);
        assert_eq!(
            plan.stages,
            vec![
                ExportStage::Mvn {
                    axes: vec![2],
                    normalize_variance: true,
                    epsilon: 1e-5,
                    eps_mode: EpsMode::InsideSqrt,
                },
                ExportStage::Reshape {
                    operand: Operand::Scale,
                    target: vec![1, 1, -1],
                },
                ExportStage::Reshape {
                    operand: Operand::Bias,
                    target: vec![1, 1, -1],
                },
                ExportStage::Multiply {
                    operand: Operand::Scale
                },
                ExportStage::Add {
                    operand: Operand::Bias
                },
            ]
        );
    }

    #[test]
    fn interior_axis_plan_without_bias() {
        let layout = resolve(&[2, 4, 8], 1).unwrap();
        let plan = decompose(&layout, 1e-3, false);
        assert_eq!(plan.stages.len(), 2);
        assert!(matches!(&plan.stages[0], ExportStage::Mvn { axes, .. } if axes == &vec![1, 2]));
        assert!(matches!(plan.stages[1], ExportStage::Multiply { .. }));
    }

    #[test]
    fn plan_serializes_with_op_tags() {
        let layout = resolve(&[3, 5], -1).unwrap();
        let yaml = serde_yaml::to_string(&decompose(&layout, 1e-5, false)).unwrap();
        assert!(yaml.contains("op: mvn"));
        assert!(yaml.contains("eps_mode: inside_sqrt"));
        assert!(yaml.contains("op: reshape"));
        assert!(yaml.contains("op: multiply"));
        assert!(!yaml.contains("op: add"));
    }

    #[test]
    fn evaluated_plan_matches_fused() {
        for axis in [-1_i64, 1] {
            let shape = [2, 3, 4];
            let layout = resolve(&shape, axis).unwrap();
            let input: Vec<f32> = (0..24).map(|i| ((i * 7) % 11) as f32 - 5.0).collect();
            let scale: Vec<f32> = (0..layout.inner).map(|i| 0.5 + i as f32 * 0.1).collect();
            let bias: Vec<f32> = (0..layout.inner).map(|i| i as f32 * -0.05).collect();
            let params = AffineParams::bind(&layout, &scale, Some(&bias)).unwrap();

            let stats = compute_statistics(&input, &layout, Backend::Scalar).unwrap();
            let mut fused = vec![0.0_f32; 24];
            apply_affine(&input, &layout, &stats, &params, 1e-5, Backend::Scalar, &mut fused).unwrap();

            let mut staged = vec![0.0_f32; 24];
            decompose(&layout, 1e-5, true)
                .evaluate(&input, &params, Backend::Scalar, &mut staged)
                .unwrap();
            assert_eq!(fused, staged, "axis {axis}");
        }
    }

    #[test]
    fn evaluate_requires_bound_bias() {
        let layout = resolve(&[1, 2], -1).unwrap();
        let scale = [1.0_f32; 2];
        let params = AffineParams::bind(&layout, &scale, None).unwrap();
        let mut out = [0.0_f32; 2];
        let err = decompose(&layout, 1e-5, true)
            .evaluate(&[1.0, 2.0], &params, Backend::Scalar, &mut out)
            .unwrap_err();
        assert!(matches!(err, NormError::Config(_)));
    }

    #[test]
    fn npu_refuses_last_axis() {
        let layout = resolve(&[2, 3], -1).unwrap();
        let err = npu_node(&layout, 1e-5, ElementType::F32).unwrap_err();
        assert!(err.is_fallback_signal());
    }

    #[test]
    fn npu_node_attributes() {
        let layout = resolve(&[2, 3, 4], -2).unwrap();
        let node = npu_node(&layout, 1e-6, ElementType::F16).unwrap();
        assert_eq!(node.begin_norm_axis, 1);
        assert_eq!(node.begin_params_axis, 1);
        assert_eq!(node.epsilon, 1e-6);
        assert!(node.emits_statistics);
    }

    #[test]
    fn ir_plan_accepts_reduced_precision() {
        let layout = resolve(&[2, 3], -1).unwrap();
        assert!(ir_plan(&layout, 1e-5, false, ElementType::BF16).is_ok());
    }
}
