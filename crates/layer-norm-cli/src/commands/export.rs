use std::path::Path;

use layer_norm::case::parse_case;
use layer_norm::export::{ir_plan, npu_node};
use layer_norm::LayerNorm;

use super::{render, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// MVN + multiply + add stage plan.
    Ir,
    /// Single fused layer-norm node.
    Npu,
}

impl Target {
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s {
            "ir" => Ok(Self::Ir),
            "npu" => Ok(Self::Npu),
            other => Err(format!("unknown export target '{other}', expected 'ir' or 'npu'")),
        }
    }
}

pub fn run(
    path: &Path,
    target: Target,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let case = parse_case(path)?;
    let ln = LayerNorm::new(case.config)?;
    let layout = ln.finalize(&case.input.shape, &case.scale.shape, case.bias_shape())?;
    let epsilon = ln.config().epsilon;

    let rendered = match target {
        Target::Ir => render(&ir_plan(&layout, epsilon, case.bias.is_some(), case.dtype)?, format)?,
        Target::Npu => render(&npu_node(&layout, epsilon, case.dtype)?, format)?,
    };
    print!("{rendered}");
    if !rendered.ends_with('\n') {
        println!();
    }
    Ok(())
}
