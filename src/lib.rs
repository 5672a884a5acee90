//! Convolutional network layer library
//!
//! This library provides composable layers for small feed-forward and
//! convolutional networks. Every layer exposes a forward pass and a gradient
//! pass; layers that own parameters additionally apply weight decay and an
//! optimizer step in place.
//!
//! # Modules
//!
//! - `layers`: Layer trait, parameter capability and the concrete layers
//!   (Convolution, MaxPooling, FullyConnect, Softmax)
//! - `optimizers`: Optimizer trait and implementations (SGD, Adam)
//! - `utils`: Activations, im2col/col2im windowing, reshaping, RNG
//! - `config`: Hyperparameters and training configuration
//! - `architecture`: Declarative layer stacks and the `Network` step driver
//! - `error`: Crate error type

pub mod architecture;
pub mod config;
pub mod error;
pub mod layers;
pub mod optimizers;
pub mod utils;

pub use error::{NetError, Result};

/// N-dimensional array of 64-bit floats exchanged between layers.
///
/// Spatial activations are `(batch, channel, height, width)`; activations
/// after the flatten point are `(batch, features)`.
pub type Tensor = ndarray::ArrayD<f64>;
