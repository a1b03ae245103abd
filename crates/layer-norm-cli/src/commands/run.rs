use std::path::Path;

use layer_norm::capability::check_support;
use layer_norm::case::{parse_case, NormCase};
use layer_norm::reference::{bf16, f16, Element};
use layer_norm::{Backend, DeviceClass, ElementType, GroupLayout, GroupStats, LayerNorm, NormError};
use serde::Serialize;

use super::{render, OutputFormat};

/// Result of one case run, whichever path executed it.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub dtype: ElementType,
    /// `fast` or `reference`.
    pub path: &'static str,
    pub backend: Option<&'static str>,
    pub layout: GroupLayout,
    pub stats: GroupStats,
    pub output: Vec<f32>,
}

pub fn run(
    path: &Path,
    backend: Backend,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let case = parse_case(path)?;
    let report = execute(&case, backend)?;

    match format {
        OutputFormat::Text => print_text(path, &report),
        fmt => println!("{}", render(&report, fmt)?),
    }
    Ok(())
}

/// Consult the CPU gate, then run the fast path or the widening reference path.
pub fn execute(case: &NormCase, backend: Backend) -> Result<RunReport, NormError> {
    let ln = LayerNorm::new(case.config)?.with_backend(backend);
    let layout = ln.finalize(&case.input.shape, &case.scale.shape, case.bias_shape())?;

    match check_support(case.config.axis, layout.rank, case.dtype, DeviceClass::Cpu) {
        Ok(()) => {
            let mut output = vec![0.0_f32; layout.len()];
            let stats = ln.forward(
                &layout,
                &case.input.data,
                &case.scale.data,
                case.bias_data(),
                &mut output,
            )?;
            Ok(RunReport {
                dtype: case.dtype,
                path: "fast",
                backend: Some(backend.as_str()),
                layout,
                stats,
                output,
            })
        }
        Err(e) if e.is_fallback_signal() => {
            tracing::info!(dtype = %case.dtype, reason = %e, "running reference path");
            let (stats, output) = match case.dtype {
                // The CPU gate never refuses f32 for an axis that resolved.
                ElementType::F32 => return Err(e),
                ElementType::F16 => reference::<f16>(&ln, &layout, case)?,
                ElementType::BF16 => reference::<bf16>(&ln, &layout, case)?,
            };
            Ok(RunReport {
                dtype: case.dtype,
                path: "reference",
                backend: None,
                layout,
                stats,
                output,
            })
        }
        Err(e) => Err(e),
    }
}

/// Store the case tensors as `T`, run the reference path, and widen the result for display.
#[allow(clippy::cast_possible_truncation)]
fn reference<T: Element>(
    ln: &LayerNorm,
    layout: &GroupLayout,
    case: &NormCase,
) -> Result<(GroupStats, Vec<f32>), NormError> {
    let store = |data: &[f32]| -> Vec<T> { data.iter().map(|&x| T::narrow(f64::from(x))).collect() };

    let input = store(&case.input.data);
    let scale = store(&case.scale.data);
    let bias = case.bias_data().map(store);
    let mut output = vec![T::narrow(0.0); layout.len()];
    let stats = ln.forward_reference(layout, &input, &scale, bias.as_deref(), &mut output)?;
    Ok((stats, output.iter().map(|v| v.widen() as f32).collect()))
}

fn print_text(path: &Path, report: &RunReport) {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown");
    let layout = &report.layout;

    println!("Case: {name} ({})", report.dtype);
    match report.backend {
        Some(backend) => println!("Path: {} ({backend})", report.path),
        None => println!("Path: {}", report.path),
    }
    println!("Groups: {} x {} (axis {})", layout.outer, layout.inner, layout.axis);
    println!();

    for (l, (mean, variance)) in report.stats.mean.iter().zip(&report.stats.variance).enumerate() {
        let row = &report.output[l * layout.inner..(l + 1) * layout.inner];
        let cells: Vec<String> = row.iter().map(|v| format!("{v:.4}")).collect();
        println!("  [{l}] mean={mean:.4} var={variance:.4}  [{}]", cells.join(", "));
    }
}
