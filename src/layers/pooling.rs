//! Max-pooling layer implementation
//!
//! Pooling folds the channel axis into the batch axis so every channel is
//! windowed independently, keeps the maximum of each window, and records a
//! one-hot routing mask at input resolution for the gradient pass.

use crate::error::{NetError, Result};
use crate::layers::{check_input, Layer, Stage};
use crate::utils::tensor::reshape;
use crate::utils::window::{col2im, im2col, window_count};
use crate::Tensor;
use ndarray::{Array2, Array4, Axis, Ix4};
use tracing::{debug, warn};

const NAME: &str = "max_pooling";

/// Max-pooling layer without parameters.
///
/// Output shape is `(channels, height / stride, width / stride)`. Only the
/// non-overlapping configuration (`stride == window_size`, the default) is
/// supported for gradients: the gradient pass replicates each upstream value
/// over its window and does not deduplicate overlaps.
pub struct MaxPoolingLayer {
    in_shape: [usize; 3],
    out_shape: [usize; 3],
    window_size: usize,
    stride: usize,
    mask: Stage<Array4<f64>>,
}

impl MaxPoolingLayer {
    /// Create a pooling layer; `stride` defaults to `window_size`.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidConfig`] if a size is zero, the stride is
    /// larger than the window (gradients are routed per window, so skipped
    /// pixels between windows cannot be addressed), or the window scan does
    /// not produce exactly `height / stride` by `width / stride` windows.
    pub fn new(in_shape: [usize; 3], window_size: usize, stride: Option<usize>) -> Result<Self> {
        let stride = stride.unwrap_or(window_size);
        let [channels, height, width] = in_shape;
        if channels == 0 || window_size == 0 || stride == 0 {
            return Err(NetError::InvalidConfig(
                "pooling sizes and stride must be greater than 0".to_string(),
            ));
        }
        if stride > window_size {
            return Err(NetError::InvalidConfig(format!(
                "pooling stride {} is larger than window {}",
                stride, window_size
            )));
        }
        let out_h = height / stride;
        let out_w = width / stride;
        if out_h == 0
            || out_w == 0
            || window_count(height, window_size, stride) != out_h
            || window_count(width, window_size, stride) != out_w
        {
            return Err(NetError::InvalidConfig(format!(
                "pooling window {} with stride {} does not tile input {}x{}",
                window_size, stride, height, width
            )));
        }
        if stride < window_size {
            warn!(window_size, stride, "overlapping max pooling: gradients are not deduplicated");
        }
        debug!(?in_shape, window_size, stride, "max pooling layer created");

        Ok(Self {
            in_shape,
            out_shape: [channels, out_h, out_w],
            window_size,
            stride,
            mask: Stage::default(),
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }
}

impl Layer for MaxPoolingLayer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        check_input(NAME, input, &self.in_shape)?;
        let x = input.view().into_dimensionality::<Ix4>()?;
        let (batch, channels, height, width) = x.dim();
        let k = self.window_size;

        let planes: Array4<f64> = reshape(&x, (batch * channels, 1, height, width))?;
        let cols = im2col(&planes, k, self.stride);

        // First maximum of each window wins ties.
        let mut one_hot = Array2::zeros(cols.dim());
        let mut maxima = Vec::with_capacity(cols.nrows());
        for (r, row) in cols.outer_iter().enumerate() {
            let (arg, max) = row
                .iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best });
            one_hot[[r, arg]] = 1.0;
            maxima.push(max);
        }

        let [_, out_h, out_w] = self.out_shape;
        let one_hot: Array2<f64> = reshape(&one_hot, (out_h * out_w * batch, channels * k * k))?;
        let mask = col2im(&one_hot, self.in_shape, self.out_shape, k, self.stride)?;

        let scanned = Array4::from_shape_vec((out_h, out_w, batch, channels), maxima)?;
        let out = scanned
            .permuted_axes([2, 3, 0, 1])
            .as_standard_layout()
            .into_owned();

        self.mask.store(NAME, mask);
        Ok(out.into_dyn())
    }

    /// Route each upstream value to the arg-max position of its window.
    ///
    /// The forward output is not needed; the cached mask carries the routing.
    fn gradient(&mut self, upstream: &Tensor, _output: &Tensor) -> Result<Tensor> {
        let mask = self.mask.consume(NAME)?;
        check_input(NAME, upstream, &self.out_shape)?;
        let upstream = upstream.view().into_dimensionality::<Ix4>()?;
        if upstream.len_of(Axis(0)) != mask.len_of(Axis(0)) {
            return Err(NetError::ShapeMismatch {
                context: NAME,
                expected: mask.shape().to_vec(),
                got: upstream.shape().to_vec(),
            });
        }

        // Replicate each upstream value over its window; pixels past the
        // last full window receive nothing.
        let k = self.window_size;
        let [_, out_h, out_w] = self.out_shape;
        let mut grad_in = mask;
        for ((b, c, y, x), m) in grad_in.indexed_iter_mut() {
            let (oy, ox) = (y / k, x / k);
            *m = if oy < out_h && ox < out_w {
                *m * upstream[[b, c, oy, ox]]
            } else {
                0.0
            };
        }
        Ok(grad_in.into_dyn())
    }

    fn input_shape(&self) -> Vec<usize> {
        self.in_shape.to_vec()
    }

    fn clear_cache(&mut self) {
        self.mask.clear();
    }

    fn output_shape(&self) -> Vec<usize> {
        self.out_shape.to_vec()
    }
}
