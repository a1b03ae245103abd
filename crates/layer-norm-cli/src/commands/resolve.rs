use layer_norm::shape::{check_param_shapes, resolve};

pub fn run(
    shape: &[usize],
    axis: i64,
    scale_shape: Option<&[usize]>,
    bias_shape: Option<&[usize]>,
) -> Result<(), Box<dyn std::error::Error>> {
    let layout = resolve(shape, axis)?;

    println!("Input shape: {shape:?}");
    println!("Axis: {axis} -> {}", layout.axis);
    println!("Groups (L): {}", layout.outer);
    println!("Group size (G): {}", layout.inner);
    if layout.is_last_axis() {
        println!("Parameters: [G] or [G, 1]");
    } else {
        println!("Parameters: {:?}", &shape[layout.axis..]);
    }

    if let Some(scale_shape) = scale_shape {
        check_param_shapes(shape, &layout, scale_shape, bias_shape)?;
        match bias_shape {
            Some(bias_shape) => println!("Scale {scale_shape:?} and bias {bias_shape:?} are compatible."),
            None => println!("Scale {scale_shape:?} is compatible."),
        }
    }

    Ok(())
}
