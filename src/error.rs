//! Error types shared by every module of the crate.

use thiserror::Error;

/// Errors raised by layers, configuration loading and network building.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("{layer}: gradient requested without a preceding forward pass")]
    GradientBeforeForward { layer: &'static str },

    #[error("{context}: shape mismatch, expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        context: &'static str,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    #[error("Array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("Unknown activation '{0}'. Must be one of: ReLU, Sigmoid, Tanh, Linear")]
    UnknownActivation(String),

    #[error("Unknown optimizer '{0}'. Must be one of: SGD, Adam")]
    UnknownOptimizer(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NetError>;
