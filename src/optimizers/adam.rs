//! Adam (Adaptive Moment Estimation) optimizer implementation
//!
//! This module provides the Adam update used by the layers. It accumulates
//! the usual biased first and second moment estimates but does **not**
//! divide them by `1 - β^t`; the uncorrected form is what the layers have
//! always been trained with.

use crate::config::Hyperparameters;
use crate::optimizers::{Moments, Optimizer};
use ndarray::{Array2, Zip};

/// Adam optimizer without bias correction.
///
/// The update rule is:
///
/// ```text
/// m = β1 * m + (1 - β1) * gradient
/// v = β2 * v + (1 - β2) * gradient²
/// parameter = parameter - α * m / (√v + ε)
/// ```
///
/// where:
/// - α (alpha) is the learning rate
/// - β1 (beta1) is the exponential decay rate for first moment estimates
/// - β2 (beta2) is the exponential decay rate for second moment estimates
/// - ε (epsilon) is a small constant for numerical stability
///
/// `m` and `v` are the layer-owned [`Moments`], so the rule itself holds no
/// state and there is no step counter.
///
/// # Reference
///
/// Kingma, D. P., & Ba, J. (2014). Adam: A method for stochastic optimization.
/// arXiv preprint arXiv:1412.6980.
#[derive(Debug, Clone, Copy)]
pub struct Adam {
    learning_rate: f64,
    beta1: f64,
    beta2: f64,
    epsilon: f64,
}

impl Adam {
    /// Creates a new Adam optimizer with the specified hyperparameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use cnn_layers::optimizers::{Adam, Optimizer};
    ///
    /// let optimizer = Adam::new(1e-2, 0.9, 0.999, 1e-8);
    /// assert_eq!(optimizer.learning_rate(), 1e-2);
    /// ```
    pub fn new(learning_rate: f64, beta1: f64, beta2: f64, epsilon: f64) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        }
    }

    pub fn beta1(&self) -> f64 {
        self.beta1
    }

    pub fn beta2(&self) -> f64 {
        self.beta2
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }
}

impl From<&Hyperparameters> for Adam {
    fn from(hyper: &Hyperparameters) -> Self {
        Self::new(hyper.learning_rate, hyper.beta1, hyper.beta2, hyper.epsilon)
    }
}

impl Optimizer for Adam {
    fn update(&self, parameter: &mut Array2<f64>, gradient: &Array2<f64>, moments: &mut Moments) {
        let (alpha, beta1, beta2, eps) = (self.learning_rate, self.beta1, self.beta2, self.epsilon);
        Zip::from(parameter)
            .and(gradient)
            .and(&mut moments.first)
            .and(&mut moments.second)
            .for_each(|p, &g, m, v| {
                *m = beta1 * *m + (1.0 - beta1) * g;
                *v = beta2 * *v + (1.0 - beta2) * g * g;
                *p -= alpha * *m / (v.sqrt() + eps);
            });
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
