//! Shared utilities for the layer implementations
//!
//! This module provides the activation functions, the im2col/col2im
//! windowing transform, a layout-independent reshape and a small seeded
//! random number generator used for weight initialization.

pub mod activations;
pub mod rng;
pub mod tensor;
pub mod window;

pub use activations::Activation;
pub use rng::SimpleRng;
pub use window::{col2im, im2col};
