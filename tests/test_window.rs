// Tests for the im2col / col2im windowing transform.
// col2im must be the exact adjoint of im2col: non-overlapping windows
// reconstruct the input, overlapping windows add up.

use cnn_layers::utils::window::{col2im, im2col, window_count};
use cnn_layers::utils::SimpleRng;
use ndarray::{Array2, Array4};

fn random_tensor(rng: &mut SimpleRng, shape: (usize, usize, usize, usize)) -> Array4<f64> {
    Array4::from_shape_simple_fn(shape, || rng.next_gaussian())
}

fn out_shape(channels: usize, h: usize, w: usize, k: usize, stride: usize) -> [usize; 3] {
    [channels, window_count(h, k, stride), window_count(w, k, stride)]
}

#[test]
fn test_non_overlapping_roundtrip_reproduces_input() {
    let mut rng = SimpleRng::new(3);
    for &(k, h, w) in &[(2, 6, 6), (3, 6, 9), (1, 4, 5)] {
        let x = random_tensor(&mut rng, (2, 3, h, w));
        let cols = im2col(&x, k, k);
        let back = col2im(&cols, [3, h, w], out_shape(3, h, w, k, k), k, k).unwrap();
        assert_eq!(back, x, "window {} on {}x{}", k, h, w);
    }
}

#[test]
fn test_overlapping_windows_accumulate() {
    let mut rng = SimpleRng::new(5);
    let (h, w, k, stride) = (4, 5, 2, 1);
    let x = random_tensor(&mut rng, (2, 2, h, w));

    let cols = im2col(&x, k, stride);
    let back = col2im(&cols, [2, h, w], out_shape(2, h, w, k, stride), k, stride).unwrap();

    // Each pixel comes back once per window covering it.
    let cover = |extent: usize, p: usize| {
        (0..=extent - k)
            .step_by(stride)
            .filter(|&o| o <= p && p < o + k)
            .count() as f64
    };
    for ((b, c, y, xx), &v) in back.indexed_iter() {
        let expected = x[[b, c, y, xx]] * cover(h, y) * cover(w, xx);
        assert!((v - expected).abs() < 1e-12, "pixel ({}, {}) got {} expected {}", y, xx, v, expected);
    }
}

#[test]
fn test_remainder_pixels_are_dropped() {
    let x = Array4::from_elem((1, 1, 5, 5), 1.0);
    let cols = im2col(&x, 2, 2);
    assert_eq!(cols.nrows(), 4);

    let back = col2im(&cols, [1, 5, 5], [1, 2, 2], 2, 2).unwrap();
    assert_eq!(back.slice(ndarray::s![0, 0, 4, ..]).sum(), 0.0);
    assert_eq!(back.slice(ndarray::s![0, 0, .., 4]).sum(), 0.0);
    assert_eq!(back.sum(), 16.0);
}

#[test]
fn test_adjoint_inner_product() {
    // <im2col(X), Y> == <X, col2im(Y)> for any X, Y.
    let mut rng = SimpleRng::new(11);
    let (batch, channels, h, w, k, stride) = (3, 2, 7, 6, 3, 2);
    let x = random_tensor(&mut rng, (batch, channels, h, w));
    let cols = im2col(&x, k, stride);
    let y = Array2::from_shape_simple_fn(cols.dim(), || rng.next_gaussian());

    let lhs = (&cols * &y).sum();
    let back = col2im(&y, [channels, h, w], out_shape(channels, h, w, k, stride), k, stride).unwrap();
    let rhs = (&x * &back).sum();

    assert!((lhs - rhs).abs() < 1e-9 * lhs.abs().max(1.0));
}

#[test]
fn test_im2col_columns_follow_channel_then_row() {
    let mut x = Array4::zeros((1, 2, 2, 2));
    x[[0, 1, 0, 1]] = 7.0;
    let cols = im2col(&x, 2, 2);
    assert_eq!(cols.dim(), (1, 8));
    // channel 1, row 0, col 1 -> 1 * 4 + 0 * 2 + 1
    assert_eq!(cols[[0, 5]], 7.0);
}
