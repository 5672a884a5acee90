//! Weight, bias, gradient and optimizer state owned by one layer.

use crate::error::{NetError, Result};
use crate::optimizers::{Moments, Optimizer};
use crate::utils::SimpleRng;
use ndarray::{Array2, ArrayView2, ArrayViewMut2};

/// Parameters of a layer computing `x · W + b`.
///
/// `W` is `(fan_in, fan_out)` and `b` is `(1, fan_out)`. Shapes are fixed at
/// construction: gradients and moments always match them, and the setters
/// reject anything else.
#[derive(Debug, Clone)]
pub struct Parameters {
    weights: Array2<f64>,
    biases: Array2<f64>,
    grad_weights: Array2<f64>,
    grad_biases: Array2<f64>,
    weight_moments: Moments,
    bias_moments: Moments,
}

impl Parameters {
    /// Standard-normal weights and biases, zero gradients and moments.
    pub fn random(fan_in: usize, fan_out: usize, rng: &mut SimpleRng) -> Self {
        let weights = rng.standard_normal(fan_in, fan_out);
        let biases = rng.standard_normal(1, fan_out);
        Self::from_arrays(weights, biases)
    }

    fn from_arrays(weights: Array2<f64>, biases: Array2<f64>) -> Self {
        let w_dim = weights.dim();
        let b_dim = biases.dim();
        Self {
            weights,
            biases,
            grad_weights: Array2::zeros(w_dim),
            grad_biases: Array2::zeros(b_dim),
            weight_moments: Moments::zeros(w_dim),
            bias_moments: Moments::zeros(b_dim),
        }
    }

    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.weights.view()
    }

    pub fn biases(&self) -> ArrayView2<'_, f64> {
        self.biases.view()
    }

    /// Mutable view of the weights; the shape cannot change through it.
    pub fn weights_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.weights.view_mut()
    }

    pub fn biases_mut(&mut self) -> ArrayViewMut2<'_, f64> {
        self.biases.view_mut()
    }

    pub fn grad_weights(&self) -> ArrayView2<'_, f64> {
        self.grad_weights.view()
    }

    pub fn grad_biases(&self) -> ArrayView2<'_, f64> {
        self.grad_biases.view()
    }

    pub fn weight_moments(&self) -> &Moments {
        &self.weight_moments
    }

    pub fn bias_moments(&self) -> &Moments {
        &self.bias_moments
    }

    /// Replace the weights with a matrix of the same shape.
    pub fn set_weights(&mut self, weights: Array2<f64>) -> Result<()> {
        check_dim("weights", self.weights.dim(), weights.dim())?;
        self.weights = weights;
        Ok(())
    }

    pub fn set_biases(&mut self, biases: Array2<f64>) -> Result<()> {
        check_dim("biases", self.biases.dim(), biases.dim())?;
        self.biases = biases;
        Ok(())
    }

    /// Store batch-averaged gradients computed by the owning layer.
    pub(crate) fn set_gradients(
        &mut self,
        grad_weights: Array2<f64>,
        grad_biases: Array2<f64>,
    ) -> Result<()> {
        check_dim("weight gradient", self.weights.dim(), grad_weights.dim())?;
        check_dim("bias gradient", self.biases.dim(), grad_biases.dim())?;
        self.grad_weights = grad_weights;
        self.grad_biases = grad_biases;
        Ok(())
    }

    /// Weight decay: scale weights and biases by `1 - decay`.
    pub fn decay(&mut self, decay: f64) {
        let keep = 1.0 - decay;
        self.weights *= keep;
        self.biases *= keep;
    }

    /// Run an update rule over both tensors with their own moments.
    pub fn apply<O: Optimizer>(&mut self, optimizer: &O) {
        optimizer.update(&mut self.weights, &self.grad_weights, &mut self.weight_moments);
        optimizer.update(&mut self.biases, &self.grad_biases, &mut self.bias_moments);
    }

    /// Weights plus biases.
    pub fn count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

fn check_dim(context: &'static str, expected: (usize, usize), got: (usize, usize)) -> Result<()> {
    if expected != got {
        return Err(NetError::ShapeMismatch {
            context,
            expected: vec![expected.0, expected.1],
            got: vec![got.0, got.1],
        });
    }
    Ok(())
}
