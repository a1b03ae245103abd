use layer_norm::capability::check_support;
use layer_norm::{DeviceClass, ElementType, NormError};

pub fn run(
    axis: i64,
    rank: usize,
    element: ElementType,
    device: DeviceClass,
) -> Result<(), Box<dyn std::error::Error>> {
    match check_support(axis, rank, element, device) {
        Ok(()) => println!("supported"),
        Err(NormError::UnsupportedConfiguration { reason, .. }) => {
            println!("unsupported: {reason}");
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
