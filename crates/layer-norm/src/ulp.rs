//! Float comparison helpers shared by backend parity checks.
//!
//! Backends that run the same operations in the same order must agree to
//! the bit; backends that reorder reductions are compared by absolute error.

/// Number of representable `f32` values between `a` and `b`.
///
/// `u32::MAX` if either is NaN or the signs differ (with `+0 == -0`).
#[must_use]
#[allow(clippy::float_cmp, clippy::cast_possible_wrap)]
pub fn ulp_distance(a: f32, b: f32) -> u32 {
    if a.is_nan() || b.is_nan() {
        return u32::MAX;
    }
    if a == b {
        return 0;
    }
    let (a_bits, b_bits) = (a.to_bits() as i32, b.to_bits() as i32);
    if (a_bits < 0) != (b_bits < 0) {
        return u32::MAX;
    }
    a_bits.abs_diff(b_bits)
}

/// Largest `|a[i] - b[i]|`, or `f32::INFINITY` if any pair contains a NaN.
#[must_use]
pub fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).fold(0.0_f32, |worst, (&x, &y)| {
        let d = (x - y).abs();
        if d.is_nan() {
            f32::INFINITY
        } else {
            worst.max(d)
        }
    })
}

/// Assert two outputs agree element-wise within `max_ulp`.
///
/// # Panics
///
/// Panics on a length mismatch or the first element over tolerance.
pub fn assert_ulp_eq(a: &[f32], b: &[f32], max_ulp: u32) {
    assert_eq!(
        a.len(),
        b.len(),
        "output length mismatch: {} vs {}",
        a.len(),
        b.len()
    );
    for (i, (&va, &vb)) in a.iter().zip(b).enumerate() {
        let dist = ulp_distance(va, vb);
        assert!(
            dist <= max_ulp,
            "element {i}: {va} vs {vb} differ by {dist} ULP (max {max_ulp})"
        );
    }
}
