//! Activation functions for neural networks
//!
//! Each activation pairs an elementwise forward transform with a derivative
//! expressed in terms of the *forward output* rather than the pre-activation
//! input:
//! - ReLU: `max(x, 0)`, derivative zeroes the gradient where the output is <= 0
//! - Sigmoid: `1 / (1 + exp(-x))`, derivative `grad * (out - out²)`
//! - Tanh: `tanh(x)`, derivative `grad * (1 - out²)`
//! - Linear: identity, derivative passes the gradient through
//!
//! Any new activation must be expressible this way, since layers only cache
//! their outputs.

use crate::error::{NetError, Result};
use ndarray::{Array, ArrayBase, Data, DataMut, Dimension, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of activation kinds, resolved when a layer is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    ReLU,
    Sigmoid,
    Tanh,
    Linear,
}

impl Activation {
    /// Apply the activation to a single value.
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::ReLU => x.max(0.0),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Linear => x,
        }
    }

    /// Derivative of a single element given the upstream gradient and the
    /// forward output at the same position.
    pub fn derivative_from_output(self, grad: f64, out: f64) -> f64 {
        match self {
            Activation::ReLU => {
                if out <= 0.0 {
                    0.0
                } else {
                    grad
                }
            }
            Activation::Sigmoid => grad * (out - out * out),
            Activation::Tanh => grad * (1.0 - out * out),
            Activation::Linear => grad,
        }
    }

    /// Apply the activation to every element in place.
    pub fn apply_inplace<S, D>(self, values: &mut ArrayBase<S, D>)
    where
        S: DataMut<Elem = f64>,
        D: Dimension,
    {
        if self != Activation::Linear {
            values.mapv_inplace(|x| self.apply(x));
        }
    }

    /// Gradient with respect to the pre-activation input.
    ///
    /// `output` must be the tensor this activation produced in the matching
    /// forward pass; it has to share the shape of `grad`.
    pub fn derivative<S1, S2, D>(
        self,
        grad: &ArrayBase<S1, D>,
        output: &ArrayBase<S2, D>,
    ) -> Result<Array<f64, D>>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
        D: Dimension,
    {
        if grad.shape() != output.shape() {
            return Err(NetError::ShapeMismatch {
                context: "activation derivative",
                expected: output.shape().to_vec(),
                got: grad.shape().to_vec(),
            });
        }
        let mut result = grad.to_owned();
        Zip::from(&mut result)
            .and(output)
            .for_each(|g, &out| *g = self.derivative_from_output(*g, out));
        Ok(result)
    }

    /// Name accepted by `FromStr` and serde.
    pub fn name(self) -> &'static str {
        match self {
            Activation::ReLU => "ReLU",
            Activation::Sigmoid => "Sigmoid",
            Activation::Tanh => "Tanh",
            Activation::Linear => "Linear",
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Activation {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ReLU" => Ok(Activation::ReLU),
            "Sigmoid" => Ok(Activation::Sigmoid),
            "Tanh" => Ok(Activation::Tanh),
            "Linear" => Ok(Activation::Linear),
            other => Err(NetError::UnknownActivation(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const EPSILON: f64 = 1e-12;

    #[test]
    fn test_sigmoid_zero() {
        assert!((Activation::Sigmoid.apply(0.0) - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_relu_mixed() {
        let mut data = array![-2.0, -1.0, 0.0, 1.0, 2.0];
        Activation::ReLU.apply_inplace(&mut data);
        assert_eq!(data, array![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_linear_is_identity() {
        let mut data = array![[-3.5, 0.0], [1.25, 8.0]];
        let before = data.clone();
        Activation::Linear.apply_inplace(&mut data);
        assert_eq!(data, before);
    }

    #[test]
    fn test_relu_derivative_masks_non_positive_outputs() {
        let grad = array![1.0, 2.0, 3.0, 4.0];
        let out = array![0.0, -0.0, 0.5, 2.0];
        let d = Activation::ReLU.derivative(&grad, &out).unwrap();
        assert_eq!(d, array![0.0, 0.0, 3.0, 4.0]);
    }

    #[test]
    fn test_sigmoid_derivative_at_half() {
        let d = Activation::Sigmoid.derivative(&array![1.0], &array![0.5]).unwrap();
        assert!((d[0] - 0.25).abs() < EPSILON);
    }

    #[test]
    fn test_tanh_derivative_from_output() {
        let out = 0.3f64.tanh();
        let d = Activation::Tanh.derivative(&array![2.0], &array![out]).unwrap();
        assert!((d[0] - 2.0 * (1.0 - out * out)).abs() < EPSILON);
    }

    #[test]
    fn test_derivative_shape_mismatch() {
        let err = Activation::Linear
            .derivative(&array![1.0, 2.0], &array![1.0])
            .unwrap_err();
        assert!(matches!(err, NetError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_parse_names() {
        for kind in [
            Activation::ReLU,
            Activation::Sigmoid,
            Activation::Tanh,
            Activation::Linear,
        ] {
            assert_eq!(kind.name().parse::<Activation>().unwrap(), kind);
        }
        assert!("relu".parse::<Activation>().is_err());
    }
}
