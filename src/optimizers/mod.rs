//! Optimizer abstractions for parameter updates
//!
//! This module provides the Optimizer trait and the two update rules a
//! parameterized layer can select per step.
//!
//! # Overview
//!
//! Optimizers are stateless rules: any moment estimates they need live in a
//! [`Moments`] value owned by the layer, so one rule instance can update any
//! number of layers without sharing state between them.
//!
//! # Available Optimizers
//!
//! - SGD: `w -= lr * grad`
//! - Adam: first/second moment accumulation *without* bias correction
//!
//! # Example
//!
//! ```ignore
//! use cnn_layers::optimizers::OptimizerKind;
//!
//! // after computing gradients for every layer in the stack
//! conv.backward(OptimizerKind::Adam);
//! ```

pub mod adam;
pub mod sgd;

pub use adam::Adam;
pub use sgd::SGD;

use crate::config::Hyperparameters;
use crate::error::{NetError, Result};
use crate::layers::Parameters;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Per-tensor optimizer state, shaped like the tensor it tracks.
///
/// Zero at layer construction and never reset afterwards. Only Adam reads or
/// writes it.
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    /// First-moment estimate (momentum).
    pub first: Array2<f64>,
    /// Second-moment estimate (squared-gradient cache).
    pub second: Array2<f64>,
}

impl Moments {
    pub fn zeros(shape: (usize, usize)) -> Self {
        Self {
            first: Array2::zeros(shape),
            second: Array2::zeros(shape),
        }
    }
}

/// Core trait for parameter update rules.
pub trait Optimizer {
    /// Update `parameter` in place from `gradient`, reading and writing the
    /// layer-owned `moments` if the rule keeps any.
    ///
    /// # Panics
    ///
    /// Panics if `parameter`, `gradient` and `moments` have different shapes.
    fn update(&self, parameter: &mut Array2<f64>, gradient: &Array2<f64>, moments: &mut Moments);

    /// Base learning rate of the rule.
    fn learning_rate(&self) -> f64;
}

/// Closed set of update rules a layer can be stepped with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    #[serde(rename = "SGD")]
    Sgd,
    Adam,
}

impl OptimizerKind {
    /// Apply this rule to a layer's weights and biases.
    pub fn step(self, parameters: &mut Parameters, hyper: &Hyperparameters) {
        match self {
            OptimizerKind::Sgd => parameters.apply(&SGD::new(hyper.learning_rate)),
            OptimizerKind::Adam => parameters.apply(&Adam::from(hyper)),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            OptimizerKind::Sgd => "SGD",
            OptimizerKind::Adam => "Adam",
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptimizerKind {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "SGD" => Ok(OptimizerKind::Sgd),
            "Adam" => Ok(OptimizerKind::Adam),
            other => Err(NetError::UnknownOptimizer(other.to_string())),
        }
    }
}
