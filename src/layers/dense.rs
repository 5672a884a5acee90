//! Fully connected layer implementation
//!
//! This module provides a FullyConnectLayer that flattens its input of any
//! rank and performs: output = activation(input × weights + biases)

use crate::config::Hyperparameters;
use crate::error::{NetError, Result};
use crate::layers::{check_input, HasParameters, Layer, Parameters, Stage};
use crate::utils::tensor::reshape;
use crate::utils::{Activation, SimpleRng};
use crate::Tensor;
use ndarray::{Array2, Axis, Ix2, IxDyn};
use tracing::debug;

const NAME: &str = "fully_connect";

/// Fully connected layer with weights and biases.
///
/// Performs `y = act(xW + b)` where x is the flattened input
/// (batch_size × product(input_shape)), W is `(product(input_shape), output_dim)`
/// and b is `(1, output_dim)`.
///
/// # Example
///
/// ```
/// use cnn_layers::config::Hyperparameters;
/// use cnn_layers::layers::{FullyConnectLayer, Layer};
/// use cnn_layers::utils::{Activation, SimpleRng};
///
/// let mut rng = SimpleRng::new(42);
/// let layer = FullyConnectLayer::new(&[8, 4, 4], 10, Activation::Linear, Hyperparameters::default(), &mut rng).unwrap();
/// assert_eq!(layer.parameter_count(), 128 * 10 + 10);
/// ```
pub struct FullyConnectLayer {
    in_shape: Vec<usize>,
    output_dim: usize,
    activation: Activation,
    params: Parameters,
    hyper: Hyperparameters,
    cache: Stage<(Array2<f64>, IxDyn)>,
}

impl FullyConnectLayer {
    /// Create a new FullyConnectLayer with standard-normal weights and biases.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidConfig`] if the input shape is empty or any
    /// dimension (or `output_dim`) is zero.
    pub fn new(
        in_shape: &[usize],
        output_dim: usize,
        activation: Activation,
        hyper: Hyperparameters,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        if in_shape.is_empty() || in_shape.contains(&0) || output_dim == 0 {
            return Err(NetError::InvalidConfig(format!(
                "fully connected layer needs non-zero sizes, got input {:?} and output {}",
                in_shape, output_dim
            )));
        }
        let fan_in: usize = in_shape.iter().product();
        let params = Parameters::random(fan_in, output_dim, rng);
        debug!(?in_shape, output_dim, %activation, params = params.count(), "fully connected layer created");

        Ok(Self {
            in_shape: in_shape.to_vec(),
            output_dim,
            activation,
            params,
            hyper,
            cache: Stage::default(),
        })
    }

    /// Number of input features after flattening.
    pub fn input_size(&self) -> usize {
        self.in_shape.iter().product()
    }

    pub fn output_size(&self) -> usize {
        self.output_dim
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }
}

impl Layer for FullyConnectLayer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let batch = input.shape().first().copied().unwrap_or(0);
        if batch == 0 || input.ndim() < 2 || input.len() != batch * self.input_size() {
            let mut expected = vec![batch];
            expected.extend_from_slice(&self.in_shape);
            return Err(NetError::ShapeMismatch {
                context: NAME,
                expected,
                got: input.shape().to_vec(),
            });
        }
        let flat: Array2<f64> = reshape(input, (batch, self.input_size()))?;

        let mut z = flat.dot(&self.params.weights()) + &self.params.biases();
        self.activation.apply_inplace(&mut z);

        self.cache.store(NAME, (flat, input.raw_dim()));
        Ok(z.into_dyn())
    }

    fn gradient(&mut self, upstream: &Tensor, output: &Tensor) -> Result<Tensor> {
        let (flat, input_dim) = self.cache.consume(NAME)?;
        check_input(NAME, upstream, &[self.output_dim])?;
        let upstream = upstream.view().into_dimensionality::<Ix2>()?;
        let output = output.view().into_dimensionality::<Ix2>()?;
        let batch = upstream.nrows();
        if batch != flat.nrows() {
            return Err(NetError::ShapeMismatch {
                context: NAME,
                expected: vec![flat.nrows(), self.output_dim],
                got: upstream.shape().to_vec(),
            });
        }

        let grad_out = self.activation.derivative(&upstream, &output)?;
        let scale = batch as f64;
        let grad_w = flat.t().dot(&grad_out) / scale;
        let grad_b = grad_out.sum_axis(Axis(0)).insert_axis(Axis(0)) / scale;
        self.params.set_gradients(grad_w, grad_b)?;

        let grad_in = grad_out.dot(&self.params.weights().t());
        reshape(&grad_in, input_dim)
    }

    fn input_shape(&self) -> Vec<usize> {
        self.in_shape.clone()
    }

    fn clear_cache(&mut self) {
        self.cache.clear();
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.output_dim]
    }

    fn parameter_count(&self) -> usize {
        self.params.count()
    }

    fn trainable(&mut self) -> Option<&mut dyn HasParameters> {
        Some(self)
    }
}

impl HasParameters for FullyConnectLayer {
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
