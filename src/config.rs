//! Configuration structures for training
//!
//! This module provides the per-layer hyperparameters and the training
//! configuration (optimizer kind plus hyperparameters) loaded from JSON.

use crate::error::{NetError, Result};
use crate::optimizers::OptimizerKind;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Hyperparameters fixed for a parameterized layer at construction.
///
/// Every field has a default, so JSON may specify any subset:
///
/// ```json
/// { "learning_rate": 0.01, "weight_decay": 0.0001 }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Step size for both SGD and Adam (default 1e-2)
    pub learning_rate: f64,
    /// Multiplicative shrinkage applied before every update (default 1e-4)
    pub weight_decay: f64,
    /// Adam first-moment decay rate (default 0.9)
    pub beta1: f64,
    /// Adam second-moment decay rate (default 0.999)
    pub beta2: f64,
    /// Adam denominator guard (default 1e-8)
    pub epsilon: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            learning_rate: 1e-2,
            weight_decay: 1e-4,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

impl Hyperparameters {
    /// Checks that every value is in its usable range.
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0) {
            return Err(NetError::InvalidConfig(
                "learning_rate must be positive".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.weight_decay) {
            return Err(NetError::InvalidConfig(
                "weight_decay must be in [0, 1)".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.beta1) || !(0.0..1.0).contains(&self.beta2) {
            return Err(NetError::InvalidConfig(
                "beta1 and beta2 must be in [0, 1)".to_string(),
            ));
        }
        if !(self.epsilon > 0.0) {
            return Err(NetError::InvalidConfig("epsilon must be positive".to_string()));
        }
        Ok(())
    }
}

/// Configuration for a training run: which update rule to step layers with
/// and the hyperparameters layers are built with.
///
/// # Example
///
/// ```json
/// {
///   "optimizer": "Adam",
///   "hyperparameters": { "learning_rate": 0.01 }
/// }
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Update rule: "SGD" or "Adam"
    pub optimizer: OptimizerKind,

    /// Layer hyperparameters; omitted fields take their defaults
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a `TrainingConfig` and
/// validates the hyperparameters.
///
/// # Examples
///
/// ```no_run
/// use cnn_layers::config::load_config;
///
/// let cfg = load_config("config/train_adam.json").unwrap();
/// println!("{}", cfg.optimizer);
/// ```
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    config.hyperparameters.validate()?;
    Ok(config)
}
