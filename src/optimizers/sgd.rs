//! Stochastic Gradient Descent (SGD) optimizer implementation
//!
//! This module provides a vanilla SGD optimizer that performs the basic
//! gradient descent update: `parameter = parameter - learning_rate * gradient`

use crate::optimizers::{Moments, Optimizer};
use ndarray::{Array2, Zip};

/// Stochastic Gradient Descent optimizer.
///
/// Implements the basic gradient descent update rule without momentum or
/// adaptive learning rates:
///
/// `w = w - η * ∇L/∂w`
///
/// where w is the parameter, η (eta) is the learning rate, and ∇L/∂w is the gradient.
/// The layer's [`Moments`] are left untouched.
///
/// # Example
///
/// ```
/// use cnn_layers::optimizers::{Moments, Optimizer, SGD};
/// use ndarray::array;
///
/// let optimizer = SGD::new(0.1);
/// let mut weights = array![[1.0, 2.0, 3.0]];
/// let gradients = array![[0.1, 0.2, 0.3]];
/// let mut moments = Moments::zeros((1, 3));
///
/// optimizer.update(&mut weights, &gradients, &mut moments);
/// assert!((weights[[0, 0]] - 0.99).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SGD {
    learning_rate: f64,
}

impl SGD {
    /// Creates a new SGD optimizer with the specified learning rate.
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for SGD {
    fn update(&self, parameter: &mut Array2<f64>, gradient: &Array2<f64>, _moments: &mut Moments) {
        let lr = self.learning_rate;
        Zip::from(parameter)
            .and(gradient)
            .for_each(|p, &g| *p -= lr * g);
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
