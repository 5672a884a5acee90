//! Architecture configuration and the network step driver
//!
//! This module describes a linear stack of layers in JSON, validates that
//! consecutive layers fit together, builds the layers, and wraps them in a
//! [`Network`] that runs one forward/gradient/backward step.

use crate::config::Hyperparameters;
use crate::error::{NetError, Result};
use crate::layers::{
    ConvLayer, FullyConnectLayer, HasParameters, Layer, MaxPoolingLayer, SoftmaxLayer,
};
use crate::optimizers::OptimizerKind;
use crate::utils::{Activation, SimpleRng};
use crate::Tensor;
use ndarray::{Array2, Ix2};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

fn default_stride() -> usize {
    1
}

/// Configuration for a single layer in the stack.
///
/// # Examples
///
/// ```json
/// {
///   "layer_type": "conv",
///   "input_shape": [1, 28, 28],
///   "kernel_size": 3,
///   "kernel_count": 8,
///   "activation": "ReLU"
/// }
/// ```
///
/// ```json
/// { "layer_type": "max_pooling", "input_shape": [8, 26, 26], "window_size": 2 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layer_type", rename_all = "snake_case")]
pub enum LayerConfig {
    Conv {
        input_shape: [usize; 3],
        kernel_size: usize,
        kernel_count: usize,
        activation: Activation,
        #[serde(default = "default_stride")]
        stride: usize,
    },
    MaxPooling {
        input_shape: [usize; 3],
        window_size: usize,
        /// Defaults to `window_size`
        #[serde(default)]
        stride: Option<usize>,
    },
    FullyConnect {
        input_shape: Vec<usize>,
        output_dim: usize,
        activation: Activation,
    },
    Softmax {
        classes: usize,
    },
}

impl LayerConfig {
    fn kind(&self) -> &'static str {
        match self {
            LayerConfig::Conv { .. } => "conv",
            LayerConfig::MaxPooling { .. } => "max_pooling",
            LayerConfig::FullyConnect { .. } => "fully_connect",
            LayerConfig::Softmax { .. } => "softmax",
        }
    }

    /// Per-sample input shape.
    pub fn input_shape(&self) -> Vec<usize> {
        match self {
            LayerConfig::Conv { input_shape, .. } | LayerConfig::MaxPooling { input_shape, .. } => {
                input_shape.to_vec()
            }
            LayerConfig::FullyConnect { input_shape, .. } => input_shape.clone(),
            LayerConfig::Softmax { classes } => vec![*classes],
        }
    }

    /// Build the layer this entry describes.
    pub fn build(&self, hyper: Hyperparameters, rng: &mut SimpleRng) -> Result<Box<dyn Layer>> {
        let layer: Box<dyn Layer> = match self {
            LayerConfig::Conv {
                input_shape,
                kernel_size,
                kernel_count,
                activation,
                stride,
            } => Box::new(ConvLayer::new(
                *input_shape,
                *kernel_size,
                *kernel_count,
                *activation,
                *stride,
                hyper,
                rng,
            )?),
            LayerConfig::MaxPooling {
                input_shape,
                window_size,
                stride,
            } => Box::new(MaxPoolingLayer::new(*input_shape, *window_size, *stride)?),
            LayerConfig::FullyConnect {
                input_shape,
                output_dim,
                activation,
            } => Box::new(FullyConnectLayer::new(
                input_shape,
                *output_dim,
                *activation,
                hyper,
                rng,
            )?),
            LayerConfig::Softmax { classes } => Box::new(SoftmaxLayer::new(*classes)?),
        };
        Ok(layer)
    }
}

/// Configuration for the entire stack.
///
/// Layers are applied in the order they appear. A `softmax` entry may only
/// be the last one.
///
/// # Example
///
/// ```json
/// {
///   "layers": [
///     { "layer_type": "conv", "input_shape": [1, 6, 6], "kernel_size": 3,
///       "kernel_count": 2, "activation": "ReLU" },
///     { "layer_type": "max_pooling", "input_shape": [2, 4, 4], "window_size": 2 },
///     { "layer_type": "fully_connect", "input_shape": [2, 2, 2], "output_dim": 3,
///       "activation": "Linear" },
///     { "layer_type": "softmax", "classes": 3 }
///   ],
///   "hyperparameters": { "learning_rate": 0.01 }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitectureConfig {
    pub layers: Vec<LayerConfig>,

    /// Shared by every parameterized layer; omitted fields take defaults
    #[serde(default)]
    pub hyperparameters: Hyperparameters,
}

/// Loads and validates an architecture configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use cnn_layers::architecture::load_architecture;
///
/// let arch = load_architecture("config/lenet_small.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture<P: AsRef<Path>>(path: P) -> Result<ArchitectureConfig> {
    let contents = fs::read_to_string(path)?;
    let config: ArchitectureConfig = serde_json::from_str(&contents)?;
    validate_architecture(&config)?;
    Ok(config)
}

/// Checks the stack without building it:
/// - at least one layer, and `softmax` only in last position
/// - hyperparameters in range
/// - consecutive layers connect (fully connected layers need only the
///   element count, every other layer the exact shape)
///
/// Per-layer size checks happen in the layer constructors.
pub fn validate_architecture(config: &ArchitectureConfig) -> Result<()> {
    if config.layers.is_empty() {
        return Err(NetError::InvalidConfig(
            "architecture must have at least one layer".to_string(),
        ));
    }
    config.hyperparameters.validate()?;

    let last = config.layers.len() - 1;
    for (i, layer) in config.layers.iter().enumerate() {
        if matches!(layer, LayerConfig::Softmax { .. }) && i != last {
            return Err(NetError::InvalidConfig(format!(
                "layer {}: softmax must be the last layer",
                i
            )));
        }
    }

    let mut rng = SimpleRng::new(1);
    let mut previous: Option<Vec<usize>> = None;
    for (i, layer_config) in config.layers.iter().enumerate() {
        let layer = layer_config
            .build(config.hyperparameters, &mut rng)
            .map_err(|e| NetError::InvalidConfig(format!("layer {}: {}", i, e)))?;
        let input = layer_config.input_shape();
        if let Some(prev) = previous {
            let connects = match layer_config {
                LayerConfig::FullyConnect { .. } => {
                    prev.iter().product::<usize>() == input.iter().product::<usize>()
                }
                _ => prev == input,
            };
            if !connects {
                return Err(NetError::InvalidConfig(format!(
                    "layer {} ({}) expects input {:?} but layer {} produces {:?}",
                    i,
                    layer_config.kind(),
                    input,
                    i - 1,
                    prev
                )));
            }
        }
        previous = Some(layer.output_shape());
    }
    Ok(())
}

/// Build every layer of a validated configuration, in order.
pub fn build_model(config: &ArchitectureConfig, rng: &mut SimpleRng) -> Result<Vec<Box<dyn Layer>>> {
    validate_architecture(config)?;
    config
        .layers
        .iter()
        .map(|layer| layer.build(config.hyperparameters, rng))
        .collect()
}

/// A linear stack of hidden layers ending in a softmax head.
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
    head: SoftmaxLayer,
}

/// Build a [`Network`]; the configuration must end with a `softmax` entry.
pub fn build_network(config: &ArchitectureConfig, rng: &mut SimpleRng) -> Result<Network> {
    let (head, hidden) = match config.layers.split_last() {
        Some((LayerConfig::Softmax { classes }, hidden)) => (SoftmaxLayer::new(*classes)?, hidden),
        _ => {
            return Err(NetError::InvalidConfig(
                "network must end with a softmax layer".to_string(),
            ))
        }
    };
    validate_architecture(config)?;

    let layers = hidden
        .iter()
        .map(|layer| layer.build(config.hyperparameters, rng))
        .collect::<Result<Vec<_>>>()?;
    let network = Network { layers, head };
    info!(
        layers = network.layers.len() + 1,
        parameters = network.parameter_count(),
        "network built"
    );
    Ok(network)
}

impl Network {
    pub fn new(layers: Vec<Box<dyn Layer>>, head: SoftmaxLayer) -> Self {
        Self { layers, head }
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Box<dyn Layer>] {
        &mut self.layers
    }

    pub fn head(&self) -> &SoftmaxLayer {
        &self.head
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|l| l.parameter_count()).sum()
    }

    /// Forward through every layer, returning each layer's output in order.
    fn forward_all(&mut self, input: &Tensor) -> Result<Vec<Tensor>> {
        let mut outputs: Vec<Tensor> = Vec::with_capacity(self.layers.len() + 1);
        for layer in self.layers.iter_mut() {
            let next = layer.forward(outputs.last().unwrap_or(input))?;
            outputs.push(next);
        }
        let logits = outputs.last().unwrap_or(input).clone();
        outputs.push(self.head.forward(&logits)?);
        Ok(outputs)
    }

    /// Class probabilities for a batch.
    ///
    /// Inference only: the forward caches are dropped again, so a following
    /// `train_step` starts from a clean state.
    pub fn predict(&mut self, input: &Tensor) -> Result<Array2<f64>> {
        let outputs = self.forward_all(input);
        for layer in self.layers.iter_mut() {
            layer.clear_cache();
        }
        let probs = outputs?.pop().unwrap_or_default();
        Ok(probs.into_dimensionality::<Ix2>()?)
    }

    /// Mean cross-entropy of the current parameters on a batch.
    pub fn loss(&mut self, input: &Tensor, labels: &Array2<f64>) -> Result<f64> {
        let probs = self.predict(input)?;
        self.head.loss(&probs, labels)
    }

    /// One training step: forward, loss, gradients in reverse order, then
    /// weight decay and an `optimizer` update on every parameterized layer.
    ///
    /// Returns the loss measured before the update.
    pub fn train_step(
        &mut self,
        input: &Tensor,
        labels: &Array2<f64>,
        optimizer: OptimizerKind,
    ) -> Result<f64> {
        let mut outputs = self.forward_all(input)?;
        let probs = outputs
            .pop()
            .unwrap_or_default()
            .into_dimensionality::<Ix2>()?;
        let loss = self.head.loss(&probs, labels)?;

        let mut grad = self.head.loss_gradient(&probs, labels)?.into_dyn();
        for (layer, output) in self.layers.iter_mut().zip(outputs.iter()).rev() {
            grad = layer.gradient(&grad, output)?;
        }

        for layer in self.layers.iter_mut() {
            if let Some(trainable) = layer.trainable() {
                trainable.backward(optimizer);
            }
        }
        debug!(loss, optimizer = optimizer.name(), "training step");
        Ok(loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ArchitectureConfig {
        ArchitectureConfig {
            layers: vec![
                LayerConfig::Conv {
                    input_shape: [1, 6, 6],
                    kernel_size: 3,
                    kernel_count: 2,
                    activation: Activation::ReLU,
                    stride: 1,
                },
                LayerConfig::MaxPooling {
                    input_shape: [2, 4, 4],
                    window_size: 2,
                    stride: None,
                },
                LayerConfig::FullyConnect {
                    input_shape: vec![2, 2, 2],
                    output_dim: 3,
                    activation: Activation::Linear,
                },
                LayerConfig::Softmax { classes: 3 },
            ],
            hyperparameters: Hyperparameters::default(),
        }
    }

    #[test]
    fn test_validate_small_config() {
        assert!(validate_architecture(&small_config()).is_ok());
    }

    #[test]
    fn test_validate_empty_architecture() {
        let config = ArchitectureConfig {
            layers: vec![],
            hyperparameters: Hyperparameters::default(),
        };
        assert!(validate_architecture(&config).is_err());
    }

    #[test]
    fn test_validate_connection_mismatch() {
        let mut config = small_config();
        config.layers[1] = LayerConfig::MaxPooling {
            input_shape: [2, 6, 6],
            window_size: 2,
            stride: None,
        };
        let err = validate_architecture(&config).unwrap_err();
        assert!(err.to_string().contains("layer 1"));
    }

    #[test]
    fn test_fully_connect_accepts_any_matching_rank() {
        let mut config = small_config();
        config.layers[2] = LayerConfig::FullyConnect {
            input_shape: vec![8],
            output_dim: 3,
            activation: Activation::Linear,
        };
        assert!(validate_architecture(&config).is_ok());
    }

    #[test]
    fn test_softmax_must_be_last() {
        let mut config = small_config();
        config.layers.insert(0, LayerConfig::Softmax { classes: 36 });
        assert!(validate_architecture(&config).is_err());
    }

    #[test]
    fn test_invalid_layer_sizes_are_reported() {
        let mut config = small_config();
        config.layers[0] = LayerConfig::Conv {
            input_shape: [1, 6, 6],
            kernel_size: 0,
            kernel_count: 2,
            activation: Activation::ReLU,
            stride: 1,
        };
        assert!(matches!(
            validate_architecture(&config),
            Err(NetError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_build_model() {
        let mut rng = SimpleRng::new(42);
        let layers = build_model(&small_config(), &mut rng).unwrap();
        assert_eq!(layers.len(), 4);
        assert_eq!(layers[0].name(), "convolution");
        assert_eq!(layers[3].output_shape(), vec![3]);
        // conv: 9 * 2 + 2, dense: 8 * 3 + 3
        let params: usize = layers.iter().map(|l| l.parameter_count()).sum();
        assert_eq!(params, 20 + 27);
    }

    #[test]
    fn test_predict_leaves_no_pending_gradient() {
        let mut rng = SimpleRng::new(3);
        let mut network = build_network(&small_config(), &mut rng).unwrap();
        let x = Tensor::from_elem(ndarray::IxDyn(&[2, 1, 6, 6]), 0.5);
        let labels = Array2::from_shape_vec((2, 3), vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0]).unwrap();

        network.loss(&x, &labels).unwrap();
        let up = Tensor::zeros(ndarray::IxDyn(&[2, 2, 4, 4]));
        assert!(matches!(
            network.layers_mut()[0].gradient(&up, &up),
            Err(NetError::GradientBeforeForward { layer: "convolution" })
        ));
        assert!(network.train_step(&x, &labels, OptimizerKind::Sgd).is_ok());
    }

    #[test]
    fn test_build_network_requires_softmax_head() {
        let mut config = small_config();
        config.layers.pop();
        let mut rng = SimpleRng::new(42);
        assert!(build_network(&config, &mut rng).is_err());
    }

    #[test]
    fn test_layer_config_json_shape() {
        let json = r#"{"layer_type": "max_pooling", "input_shape": [2, 4, 4], "window_size": 2}"#;
        let cfg: LayerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(
            cfg,
            LayerConfig::MaxPooling {
                input_shape: [2, 4, 4],
                window_size: 2,
                stride: None
            }
        );

        let json = r#"{"layer_type": "conv", "input_shape": [1, 4, 4], "kernel_size": 2,
                       "kernel_count": 1, "activation": "Tanh"}"#;
        let cfg: LayerConfig = serde_json::from_str(json).unwrap();
        assert!(matches!(cfg, LayerConfig::Conv { stride: 1, activation: Activation::Tanh, .. }));
    }
}
