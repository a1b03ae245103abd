//! Falsification tests for the layer-norm operator.
//!
//! Each test targets an invariant that breaks under a specific bug class:
//! wrong group partition, Bessel-corrected variance, epsilon outside the
//! root, mishandled column parameters, or partial writes on failure.

mod common;

use layer_norm::{
    supports, Backend, DeviceClass, ElementType, LayerNorm, LayerNormConfig, NormError,
    ShapeError,
};
use layer_norm::reference::f16;
use proptest::prelude::*;

const BACKENDS: [Backend; 3] = [Backend::Scalar, Backend::Parallel, Backend::Avx2];

fn layer(axis: i64, backend: Backend) -> LayerNorm {
    LayerNorm::new(LayerNormConfig::new(axis, 1e-5).unwrap())
        .unwrap()
        .with_backend(backend)
}

fn shape_and_axis() -> impl Strategy<Value = (Vec<usize>, i64)> {
    proptest::collection::vec(1_usize..6, 1..5).prop_flat_map(|shape| {
        let rank = i64::try_from(shape.len()).unwrap();
        (Just(shape), -rank..rank)
    })
}

// ============================================================================
// Concrete scenarios
// ============================================================================

#[test]
fn two_rows_one_constant() {
    let input = [1.0_f32, 2.0, 3.0, 4.0, 4.0, 4.0];
    for backend in BACKENDS {
        let ln = layer(1, backend);
        let layout = ln.finalize(&[2, 3], &[3], Some(&[3])).unwrap();
        assert_eq!((layout.axis, layout.outer, layout.inner), (1, 2, 3));

        let mut out = [f32::NAN; 6];
        let stats = ln
            .forward(&layout, &input, &[1.0; 3], Some(&[0.0; 3]), &mut out)
            .unwrap();

        assert!((stats.mean[0] - 2.0).abs() < 1e-6);
        assert!((stats.variance[0] - 0.6667).abs() < 1e-4);
        assert!((stats.mean[1] - 4.0).abs() < 1e-6);
        assert_eq!(stats.variance[1], 0.0);

        let expected = [-1.2247_f32, 0.0, 1.2247, 0.0, 0.0, 0.0];
        for (i, (&o, &e)) in out.iter().zip(&expected).enumerate() {
            assert!((o - e).abs() < 1e-3, "{backend}: out[{i}] = {o}, expected {e}");
        }
    }
}

#[test]
#[allow(clippy::float_cmp)]
fn large_constant_group_maps_to_bias() {
    // Any drift in the mean is amplified by rsqrt(eps) ~ 316.
    for c in [100.1_f32, 1234.567, 65000.3, 1.0e6 + 0.5] {
        for g in [7_usize, 102, 199] {
            let input = vec![c; 2 * g];
            let scale = vec![3.0_f32; g];
            let bias = vec![0.5_f32; g];
            for backend in BACKENDS {
                let ln = layer(-1, backend);
                let layout = ln.finalize(&[2, g], &[g], Some(&[g])).unwrap();
                let mut out = vec![f32::NAN; 2 * g];
                ln.forward(&layout, &input, &scale, Some(&bias), &mut out)
                    .unwrap();
                assert!(
                    out.iter().all(|&o| o == 0.5),
                    "{backend} c={c} g={g}: {:?}",
                    &out[..4]
                );
            }
        }
    }
}

#[test]
fn oversized_scale_is_shape_error() {
    let err = layer(1, Backend::Scalar)
        .finalize(&[2, 3], &[4], None)
        .unwrap_err();
    assert!(matches!(
        err,
        NormError::Shape(ShapeError::DimMismatch {
            param: "scale",
            expected: 3,
            actual: 4,
            ..
        })
    ));
}

#[test]
fn axis_out_of_range_is_shape_error() {
    let err = layer(5, Backend::Scalar)
        .finalize(&[2, 3], &[3], None)
        .unwrap_err();
    assert!(matches!(
        err,
        NormError::Shape(ShapeError::AxisOutOfRange { axis: 5, rank: 2 })
    ));
}

#[test]
fn failed_forward_writes_nothing() {
    let ln = layer(-1, Backend::Parallel);
    let layout = ln.finalize(&[2, 4], &[4], None).unwrap();
    let mut out = [42.0_f32; 8];
    // input one element short
    let err = ln
        .forward(&layout, &[1.0; 7], &[1.0; 4], None, &mut out)
        .unwrap_err();
    assert!(matches!(err, NormError::Shape(ShapeError::BufferLength { .. })));
    assert_eq!(out, [42.0; 8]);
}

#[test]
fn rebatch_reuses_group_size() {
    let ln = layer(-2, Backend::Parallel);
    let small = ln.finalize(&[1, 4, 6], &[4, 6], None).unwrap();
    let large = ln.finalize(&[8, 4, 6], &[4, 6], None).unwrap();
    assert_eq!(small.inner, large.inner);
    assert_eq!(small.outer, 1);
    assert_eq!(large.outer, 8);

    // The first group of the larger batch normalizes the same as the small batch.
    let data = common::lcg_values(8 * 24, 11, 3.0);
    let scale = vec![1.0_f32; 24];
    let mut small_out = vec![0.0_f32; 24];
    let mut large_out = vec![0.0_f32; 8 * 24];
    ln.forward(&small, &data[..24], &scale, None, &mut small_out).unwrap();
    ln.forward(&large, &data, &scale, None, &mut large_out).unwrap();
    assert_eq!(&large_out[..24], &small_out[..]);
}

#[test]
fn gate_routes_reduced_precision_to_reference() {
    // A dispatcher asking about f16 on the CPU is told to fall back...
    assert!(!supports(-1, 2, ElementType::F16, DeviceClass::Cpu));

    // ...and the reference path then produces the normalized result.
    let ln = layer(-1, Backend::Parallel);
    let layout = ln.finalize(&[2, 4], &[4], None).unwrap();
    let input: Vec<f16> = [1.0_f32, 2.0, 3.0, 4.0, -2.0, 0.0, 2.0, 4.0]
        .iter()
        .map(|&x| f16::from_f32(x))
        .collect();
    let scale = vec![f16::ONE; 4];
    let mut out = vec![f16::ZERO; 8];
    ln.forward_reference(&layout, &input, &scale, None, &mut out)
        .unwrap();
    let out: Vec<f32> = out.iter().map(|v| v.to_f32()).collect();
    let (mean, var) = common::moments(&out[..4]);
    assert!(mean.abs() < 1e-2);
    assert!((var - 1.0).abs() < 1e-2);
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Prediction: output length equals input length and L * G covers it.
    /// If fails: group partition drops or duplicates trailing elements.
    #[test]
    fn falsify_output_matches_input_shape(
        (shape, axis) in shape_and_axis(),
        seed in any::<u64>()
    ) {
        let ln = layer(axis, Backend::Parallel);
        let layout = ln.finalize(&shape, &shape[ln_axis(axis, shape.len())..], None).unwrap();
        let n: usize = shape.iter().product();
        prop_assert_eq!(layout.outer * layout.inner, n);

        let input = common::lcg_values(n, seed, 5.0);
        let scale = vec![1.0_f32; layout.inner];
        let mut out = vec![0.0_f32; n];
        let stats = ln.forward(&layout, &input, &scale, None, &mut out).unwrap();
        prop_assert_eq!(stats.len(), layout.outer);
        common::assert_all_finite(&out);
    }

    /// Prediction: with unit scale and zero bias every group has mean 0, variance 1.
    /// If fails: Bessel correction, epsilon outside the root, or wrong stride.
    #[test]
    fn falsify_groups_standardized(
        (shape, axis) in shape_and_axis(),
        seed in any::<u64>()
    ) {
        let ln = layer(axis, Backend::Parallel);
        let layout = ln.finalize(&shape, &shape[ln_axis(axis, shape.len())..], None).unwrap();
        let input = common::lcg_values(layout.len(), seed, 10.0);
        let mut out = vec![0.0_f32; layout.len()];
        ln.forward(&layout, &input, &vec![1.0; layout.inner], None, &mut out).unwrap();

        for (x, y) in input.chunks(layout.inner).zip(out.chunks(layout.inner)) {
            let (mean, var) = common::moments(y);
            prop_assert!(mean.abs() < 1e-4, "group mean {mean}");
            if layout.inner > 1 && common::well_spread(x) {
                prop_assert!((var - 1.0).abs() < 2e-3, "group variance {var}");
            }
        }
    }

    /// Prediction: with unit scale each group's output mean equals mean(bias).
    /// If fails: bias indexed by group instead of position.
    #[test]
    fn falsify_group_mean_is_bias_mean(
        rows in 1_usize..5,
        cols in 2_usize..24,
        seed in any::<u64>()
    ) {
        let ln = layer(-1, Backend::Parallel);
        let layout = ln.finalize(&[rows, cols], &[cols], Some(&[cols])).unwrap();
        let input = common::lcg_values(rows * cols, seed, 4.0);
        let bias = common::lcg_values(cols, seed ^ 0xa5a5, 2.0);
        let mut out = vec![0.0_f32; rows * cols];
        ln.forward(&layout, &input, &vec![1.0; cols], Some(&bias), &mut out).unwrap();

        let (bias_mean, _) = common::moments(&bias);
        for y in out.chunks(cols) {
            let (mean, _) = common::moments(y);
            prop_assert!((mean - bias_mean).abs() < 1e-4, "{mean} vs {bias_mean}");
        }
    }

    /// Prediction: scaling a group by c > 0 leaves the normalized output unchanged.
    /// If fails: statistics not recomputed per group, or variance not squared.
    #[test]
    fn falsify_positive_scale_invariance(
        cols in 2_usize..32,
        c in 0.5_f32..8.0,
        seed in any::<u64>()
    ) {
        let input = common::lcg_values(cols, seed, 5.0);
        let scaled: Vec<f32> = input.iter().map(|&x| x * c).collect();
        // epsilon must stay negligible against both variances
        prop_assume!(common::moments(&input).1 > 1.0 && common::moments(&scaled).1 > 1.0);

        let ln = layer(-1, Backend::Parallel);
        let layout = ln.finalize(&[1, cols], &[cols], None).unwrap();
        let scale = vec![1.0_f32; cols];
        let mut a = vec![0.0_f32; cols];
        let mut b = vec![0.0_f32; cols];
        ln.forward(&layout, &input, &scale, None, &mut a).unwrap();
        ln.forward(&layout, &scaled, &scale, None, &mut b).unwrap();
        for i in 0..cols {
            prop_assert!((a[i] - b[i]).abs() < 2e-3, "at {i}: {} vs {}", a[i], b[i]);
        }
    }

    /// Prediction: a `[G, 1]` column scale gives the same output as a flat `[G]` one.
    /// If fails: column form rejected or reinterpreted as a 2-D parameter.
    #[test]
    fn falsify_column_scale_equivalence(
        rows in 1_usize..5,
        cols in 1_usize..24,
        seed in any::<u64>()
    ) {
        let ln = layer(-1, Backend::Parallel);
        let input = common::lcg_values(rows * cols, seed, 3.0);
        let scale = common::lcg_values(cols, seed.rotate_left(7), 2.0);
        let bias = common::lcg_values(cols, seed.rotate_left(13), 1.0);

        let flat = ln.finalize(&[rows, cols], &[cols], Some(&[cols])).unwrap();
        let column = ln.finalize(&[rows, cols], &[cols, 1], Some(&[cols, 1])).unwrap();
        prop_assert_eq!(flat, column);

        let mut a = vec![0.0_f32; rows * cols];
        let mut b = vec![0.0_f32; rows * cols];
        ln.forward(&flat, &input, &scale, Some(&bias), &mut a).unwrap();
        ln.forward(&column, &input, &scale, Some(&bias), &mut b).unwrap();
        prop_assert_eq!(a, b);
    }

    /// Prediction: the fast backends agree with the f64 reference path.
    /// If fails: a reduction drops lanes or the tail of a tiled row.
    #[test]
    fn falsify_backends_match_reference(
        (shape, axis) in shape_and_axis(),
        seed in any::<u64>()
    ) {
        let reference = layer(axis, Backend::Scalar);
        let param_shape = &shape[ln_axis(axis, shape.len())..];
        let layout = reference.finalize(&shape, param_shape, Some(param_shape)).unwrap();
        let input = common::lcg_values(layout.len(), seed, 6.0);
        let scale = common::lcg_values(layout.inner, !seed, 2.0);
        let bias = common::lcg_values(layout.inner, seed.wrapping_add(3), 1.0);

        let mut want = vec![0.0_f32; layout.len()];
        reference.forward_reference(&layout, &input, &scale, Some(&bias), &mut want).unwrap();

        for backend in BACKENDS {
            let ln = layer(axis, backend);
            let mut got = vec![0.0_f32; layout.len()];
            ln.forward(&layout, &input, &scale, Some(&bias), &mut got).unwrap();
            let worst = layer_norm::ulp::max_abs_diff(&want, &got);
            prop_assert!(worst < 5e-3, "{backend}: max abs diff {worst}");
        }
    }
}

fn ln_axis(axis: i64, rank: usize) -> usize {
    layer_norm::shape::normalize_axis(axis, rank).unwrap()
}
