//! 2D Convolutional layer implementation
//!
//! This module provides a ConvLayer that performs valid (unpadded) 2D
//! convolution by expanding the input with im2col and multiplying by a
//! `(channels * k², kernel_count)` weight matrix.

use crate::config::Hyperparameters;
use crate::error::{NetError, Result};
use crate::layers::{check_input, HasParameters, Layer, Parameters, Stage};
use crate::utils::tensor::reshape;
use crate::utils::window::{col2im, im2col, window_count};
use crate::utils::{Activation, SimpleRng};
use crate::Tensor;
use ndarray::{Array2, Array4, Axis, Ix4};
use tracing::debug;

const NAME: &str = "convolution";

/// 2D Convolutional layer with learnable kernels.
///
/// Slides `kernel_count` square kernels over a `(channels, height, width)`
/// input with the given stride and no padding.
///
/// # Fields
///
/// * `in_shape` - Per-sample input shape (channels, height, width)
/// * `out_shape` - Per-sample output shape
///   (kernel_count, (height - k + 1) / stride, (width - k + 1) / stride)
/// * `params` - Weights `(channels * k * k, kernel_count)` and biases `(1, kernel_count)`
/// * `cache` - im2col expansion of the last forward input
///
/// # Example
///
/// ```
/// use cnn_layers::config::Hyperparameters;
/// use cnn_layers::layers::{ConvLayer, Layer};
/// use cnn_layers::utils::{Activation, SimpleRng};
///
/// let mut rng = SimpleRng::new(42);
/// let layer = ConvLayer::new([1, 28, 28], 3, 8, Activation::ReLU, 1, Hyperparameters::default(), &mut rng).unwrap();
/// assert_eq!(layer.output_shape(), vec![8, 26, 26]);
/// ```
pub struct ConvLayer {
    in_shape: [usize; 3],
    out_shape: [usize; 3],
    kernel_size: usize,
    stride: usize,
    activation: Activation,
    params: Parameters,
    hyper: Hyperparameters,
    cache: Stage<Array2<f64>>,
}

impl ConvLayer {
    /// Create a new ConvLayer with standard-normal weights and biases.
    ///
    /// # Arguments
    ///
    /// * `in_shape` - Input shape (channels, height, width)
    /// * `kernel_size` - Size of square kernel (e.g., 3 for 3×3)
    /// * `kernel_count` - Number of kernels (output channels)
    /// * `activation` - Activation applied to the convolution output
    /// * `stride` - Step between windows (usually 1)
    /// * `hyper` - Learning rate, weight decay and Adam constants
    /// * `rng` - Random number generator for weight initialization
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidConfig`] if a size is zero, the kernel does
    /// not fit the input, or the stride does not tile `height - k + 1`
    /// into the integer output size.
    pub fn new(
        in_shape: [usize; 3],
        kernel_size: usize,
        kernel_count: usize,
        activation: Activation,
        stride: usize,
        hyper: Hyperparameters,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        let [channels, height, width] = in_shape;
        if channels == 0 || kernel_size == 0 || kernel_count == 0 || stride == 0 {
            return Err(NetError::InvalidConfig(
                "convolution sizes and stride must be greater than 0".to_string(),
            ));
        }
        if kernel_size > height || kernel_size > width {
            return Err(NetError::InvalidConfig(format!(
                "kernel size {} does not fit input {}x{}",
                kernel_size, height, width
            )));
        }
        let out_h = (height - kernel_size + 1) / stride;
        let out_w = (width - kernel_size + 1) / stride;
        if out_h == 0
            || out_w == 0
            || window_count(height, kernel_size, stride) != out_h
            || window_count(width, kernel_size, stride) != out_w
        {
            return Err(NetError::InvalidConfig(format!(
                "stride {} with kernel {} does not tile input {}x{}",
                stride, kernel_size, height, width
            )));
        }

        let params = Parameters::random(channels * kernel_size * kernel_size, kernel_count, rng);
        debug!(
            ?in_shape,
            kernel_size,
            kernel_count,
            stride,
            %activation,
            params = params.count(),
            "convolution layer created"
        );

        Ok(Self {
            in_shape,
            out_shape: [kernel_count, out_h, out_w],
            kernel_size,
            stride,
            activation,
            params,
            hyper,
            cache: Stage::default(),
        })
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn kernel_count(&self) -> usize {
        self.out_shape[0]
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }
}

impl Layer for ConvLayer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        check_input(NAME, input, &self.in_shape)?;
        let x = input.view().into_dimensionality::<Ix4>()?;
        let batch = x.len_of(Axis(0));

        let cols = im2col(&x, self.kernel_size, self.stride);
        let mut z = cols.dot(&self.params.weights()) + &self.params.biases();
        self.activation.apply_inplace(&mut z);

        // Rows are ordered (out_y, out_x, batch); restore (batch, kernel, out_y, out_x).
        let [kernels, out_h, out_w] = self.out_shape;
        let scanned: Array4<f64> = reshape(&z, (out_h, out_w, batch, kernels))?;
        let out = scanned
            .permuted_axes([2, 3, 0, 1])
            .as_standard_layout()
            .into_owned();

        self.cache.store(NAME, cols);
        Ok(out.into_dyn())
    }

    fn gradient(&mut self, upstream: &Tensor, output: &Tensor) -> Result<Tensor> {
        let cols = self.cache.consume(NAME)?;
        check_input(NAME, upstream, &self.out_shape)?;
        let upstream = upstream.view().into_dimensionality::<Ix4>()?;
        let output = output.view().into_dimensionality::<Ix4>()?;
        let batch = upstream.len_of(Axis(0));

        let grad_act = self.activation.derivative(&upstream, &output)?;
        let [kernels, out_h, out_w] = self.out_shape;
        let grad_out: Array2<f64> = reshape(
            &grad_act.view().permuted_axes([2, 3, 0, 1]),
            (out_h * out_w * batch, kernels),
        )?;
        if grad_out.nrows() != cols.nrows() {
            return Err(NetError::ShapeMismatch {
                context: NAME,
                expected: vec![cols.nrows(), kernels],
                got: grad_out.shape().to_vec(),
            });
        }

        let scale = batch as f64;
        let grad_w = cols.t().dot(&grad_out) / scale;
        let grad_b = grad_out.sum_axis(Axis(0)).insert_axis(Axis(0)) / scale;
        self.params.set_gradients(grad_w, grad_b)?;

        let grad_cols = grad_out.dot(&self.params.weights().t());
        let grad_in = col2im(
            &grad_cols,
            self.in_shape,
            self.out_shape,
            self.kernel_size,
            self.stride,
        )?;
        Ok(grad_in.into_dyn())
    }

    fn input_shape(&self) -> Vec<usize> {
        self.in_shape.to_vec()
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn output_shape(&self) -> Vec<usize> {
        self.out_shape.to_vec()
    }

    fn parameter_count(&self) -> usize {
        self.params.count()
    }

    fn trainable(&mut self) -> Option<&mut dyn HasParameters> {
        Some(self)
    }
}

impl HasParameters for ConvLayer {
    fn parameters(&self) -> &Parameters {
        &self.params
    }

    fn parameters_mut(&mut self) -> &mut Parameters {
        &mut self.params
    }

    fn hyperparameters(&self) -> &Hyperparameters {
        &self.hyper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};

    fn conv(in_shape: [usize; 3], k: usize, n: usize, stride: usize) -> ConvLayer {
        let mut rng = SimpleRng::new(42);
        ConvLayer::new(in_shape, k, n, Activation::ReLU, stride, Hyperparameters::default(), &mut rng)
            .unwrap()
    }

    #[test]
    fn test_conv_initialization() {
        let layer = conv([3, 8, 8], 3, 4, 1);
        assert_eq!(layer.kernel_size(), 3);
        assert_eq!(layer.kernel_count(), 4);
        assert_eq!(layer.stride(), 1);
        assert_eq!(layer.parameters().weights().dim(), (27, 4));
        assert_eq!(layer.parameters().biases().dim(), (1, 4));
    }

    #[test]
    fn test_conv_parameter_count() {
        // weights: 1 * 3 * 3 * 8 = 72, biases: 8
        let layer = conv([1, 28, 28], 3, 8, 1);
        assert_eq!(layer.parameter_count(), 80);
    }

    #[test]
    fn test_conv_output_dimensions() {
        assert_eq!(conv([1, 28, 28], 3, 8, 1).output_shape(), vec![8, 26, 26]);
        assert_eq!(conv([2, 5, 7], 2, 3, 2).output_shape(), vec![3, 2, 3]);
    }

    #[test]
    fn test_conv_rejects_untileable_stride() {
        let mut rng = SimpleRng::new(1);
        let hp = Hyperparameters::default();
        // 4 - 2 + 1 = 3 positions, stride 2 gives 2 windows but 3 / 2 = 1 output row.
        assert!(ConvLayer::new([1, 4, 4], 2, 1, Activation::ReLU, 2, hp, &mut rng).is_err());
        assert!(ConvLayer::new([1, 2, 2], 3, 1, Activation::ReLU, 1, hp, &mut rng).is_err());
        assert!(ConvLayer::new([1, 4, 4], 2, 1, Activation::ReLU, 0, hp, &mut rng).is_err());
    }

    #[test]
    fn test_conv_deterministic_initialization() {
        let a = conv([3, 6, 6], 3, 2, 1);
        let b = conv([3, 6, 6], 3, 2, 1);
        assert_eq!(a.parameters().weights(), b.parameters().weights());
        assert_eq!(a.parameters().biases(), b.parameters().biases());
    }

    #[test]
    fn test_gradient_before_forward_fails() {
        let mut layer = conv([1, 4, 4], 2, 1, 1);
        let g = ArrayD::<f64>::ones(IxDyn(&[1, 1, 3, 3]));
        assert!(matches!(
            layer.gradient(&g, &g),
            Err(NetError::GradientBeforeForward { layer: "convolution" })
        ));
    }

    #[test]
    fn test_forward_rejects_wrong_input_shape() {
        let mut layer = conv([1, 4, 4], 2, 1, 1);
        let x = ArrayD::<f64>::ones(IxDyn(&[1, 2, 4, 4]));
        assert!(matches!(layer.forward(&x), Err(NetError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_forward_rejects_empty_batch() {
        let mut layer = conv([1, 4, 4], 2, 1, 1);
        let w0 = layer.parameters().weights().to_owned();
        let x = ArrayD::<f64>::zeros(IxDyn(&[0, 1, 4, 4]));
        assert!(matches!(layer.forward(&x), Err(NetError::ShapeMismatch { .. })));
        // nothing cached, so no update can pick up NaN gradients
        layer.backward(crate::optimizers::OptimizerKind::Sgd);
        assert!(layer.parameters().weights().iter().all(|v| v.is_finite()));
        assert_ne!(layer.parameters().weights(), w0.view());
    }

    #[test]
    fn test_forward_output_layout() {
        let mut layer = conv([1, 3, 3], 2, 2, 1);
        // Kernel 0 sums the window, kernel 1 picks its top-left pixel.
        let mut w = Array2::zeros((4, 2));
        w.column_mut(0).fill(1.0);
        w[[0, 1]] = 1.0;
        layer.parameters_mut().set_weights(w).unwrap();
        layer.parameters_mut().set_biases(Array2::zeros((1, 2))).unwrap();

        let x = ndarray::Array::range(1.0, 19.0, 1.0)
            .into_shape(IxDyn(&[2, 1, 3, 3]))
            .unwrap();
        let out = layer.forward(&x).unwrap();

        assert_eq!(out.shape(), &[2, 2, 2, 2]);
        // batch 0: [[1,2,3],[4,5,6],[7,8,9]]
        assert_eq!(out[[0, 0, 0, 0]], 1.0 + 2.0 + 4.0 + 5.0);
        assert_eq!(out[[0, 0, 1, 1]], 5.0 + 6.0 + 8.0 + 9.0);
        assert_eq!(out[[0, 1, 0, 1]], 2.0);
        // batch 1 starts at 10
        assert_eq!(out[[1, 1, 1, 0]], 13.0);
    }
}
