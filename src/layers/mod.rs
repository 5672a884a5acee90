//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait, the parameter capability and the
//! concrete layers used to build a linear stack: convolution, max-pooling,
//! fully-connected and the terminal softmax.

mod r#trait;
pub mod conv2d;
pub mod dense;
pub mod params;
pub mod pooling;
pub mod softmax;

pub use conv2d::ConvLayer;
pub use dense::FullyConnectLayer;
pub use params::Parameters;
pub use pooling::MaxPoolingLayer;
pub use r#trait::{HasParameters, Layer, Stage};
pub use softmax::SoftmaxLayer;

pub(crate) use r#trait::check_input;
