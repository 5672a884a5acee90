//! Sliding-window transforms (im2col / col2im).
//!
//! `im2col` flattens every `k × k` window of a `(batch, channel, height, width)`
//! tensor into one matrix row so that convolution and pooling become dense
//! matrix operations. `col2im` is its adjoint: it scatters rows back into
//! tensor form, *adding* where windows overlap.
//!
//! Row `r` of the column matrix belongs to window `r / batch` and batch
//! element `r % batch`. Windows are scanned row-major over output positions.
//! Only positions where a full window fits are generated; remainder pixels at
//! the far edges are dropped (no padding).

use crate::error::{NetError, Result};
use crate::utils::tensor::reshape;
use ndarray::{s, Array2, Array3, Array4, ArrayBase, Data, Ix2, Ix4};

/// Top-left offsets of every window along one axis.
pub fn window_offsets(extent: usize, window: usize, stride: usize) -> impl Iterator<Item = usize> {
    (0..(extent + 1).saturating_sub(window)).step_by(stride.max(1))
}

/// Number of windows along one axis.
pub fn window_count(extent: usize, window: usize, stride: usize) -> usize {
    window_offsets(extent, window, stride).count()
}

/// Expand a 4-D tensor into a `(windows * batch, channel * window²)` matrix.
pub fn im2col<S>(input: &ArrayBase<S, Ix4>, window: usize, stride: usize) -> Array2<f64>
where
    S: Data<Elem = f64>,
{
    let (batch, channel, height, width) = input.dim();
    let positions: Vec<(usize, usize)> = window_offsets(height, window, stride)
        .flat_map(|i| window_offsets(width, window, stride).map(move |j| (i, j)))
        .collect();

    let mut cols = Array2::zeros((positions.len() * batch, channel * window * window));
    for (w_idx, &(i, j)) in positions.iter().enumerate() {
        let patch = input.slice(s![.., .., i..i + window, j..j + window]);
        for (b, sample) in patch.outer_iter().enumerate() {
            let mut row = cols.row_mut(w_idx * batch + b);
            for (dst, &src) in row.iter_mut().zip(sample.iter()) {
                *dst = src;
            }
        }
    }
    cols
}

/// Accumulate a column matrix back into a `(batch, in_c, in_h, in_w)` tensor.
///
/// `in_shape` is `(channel, height, width)` of the original tensor and
/// `out_shape` is `(channel, out_height, out_width)` of the windowed output;
/// only its spatial extent is used, to decode window positions. The batch
/// size is recovered as `rows / (out_height * out_width)`.
pub fn col2im<S>(
    cols: &ArrayBase<S, Ix2>,
    in_shape: [usize; 3],
    out_shape: [usize; 3],
    window: usize,
    stride: usize,
) -> Result<Array4<f64>>
where
    S: Data<Elem = f64>,
{
    let [in_c, in_h, in_w] = in_shape;
    let [_, out_h, out_w] = out_shape;
    let windows = out_h * out_w;

    if cols.ncols() != in_c * window * window || windows == 0 || cols.nrows() % windows != 0 {
        return Err(NetError::ShapeMismatch {
            context: "col2im",
            expected: vec![windows, in_c * window * window],
            got: cols.shape().to_vec(),
        });
    }

    if (out_h - 1) * stride + window > in_h || (out_w - 1) * stride + window > in_w {
        return Err(NetError::ShapeMismatch {
            context: "col2im",
            expected: vec![in_c, (out_h - 1) * stride + window, (out_w - 1) * stride + window],
            got: in_shape.to_vec(),
        });
    }

    let batch = cols.nrows() / windows;
    let mut image = Array4::zeros((batch, in_c, in_h, in_w));
    for (r, row) in cols.outer_iter().enumerate() {
        let b = r % batch;
        let pos = r / batch;
        let i = pos / out_w * stride;
        let j = pos % out_w * stride;
        let patch: Array3<f64> = reshape(&row, (in_c, window, window))?;
        let mut target = image.slice_mut(s![b, .., i..i + window, j..j + window]);
        target += &patch;
    }
    Ok(image)
}
