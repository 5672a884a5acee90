//! Softmax output layer with cross-entropy loss.

use crate::error::{NetError, Result};
use crate::layers::Layer;
use crate::Tensor;
use ndarray::{Array2, ArrayBase, Axis, Data, Ix2};

const NAME: &str = "softmax";

/// Guard added to the softmax denominator and inside the loss logarithm.
pub const EPSILON: f64 = 1e-8;

/// Terminal softmax layer over `(batch, classes)` logits.
///
/// As a [`Layer`], `forward` is [`SoftmaxLayer::predict`] and `gradient`
/// takes the *label distribution* as its upstream argument, returning the
/// combined softmax + cross-entropy gradient `predicted - label`.
#[derive(Debug, Clone)]
pub struct SoftmaxLayer {
    classes: usize,
}

impl SoftmaxLayer {
    pub fn new(classes: usize) -> Result<Self> {
        if classes == 0 {
            return Err(NetError::InvalidConfig(
                "softmax needs at least one class".to_string(),
            ));
        }
        Ok(Self { classes })
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    /// Row-wise softmax with the row maximum subtracted before `exp`.
    pub fn predict<S: Data<Elem = f64>>(&self, logits: &ArrayBase<S, Ix2>) -> Array2<f64> {
        let mut out = logits.to_owned();
        for mut row in out.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum() + EPSILON;
            row.mapv_inplace(|v| v / sum);
        }
        out
    }

    /// Cross-entropy averaged over the batch: `mean_b(-Σ_c y log(p + ε))`.
    pub fn loss<S1, S2>(
        &self,
        predicted: &ArrayBase<S1, Ix2>,
        labels: &ArrayBase<S2, Ix2>,
    ) -> Result<f64>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        check_pair(predicted.shape(), labels.shape())?;
        let batch = predicted.nrows().max(1) as f64;
        let total: f64 = predicted
            .iter()
            .zip(labels.iter())
            .map(|(&p, &y)| -y * (p + EPSILON).ln())
            .sum();
        Ok(total / batch)
    }

    /// Combined softmax + cross-entropy gradient, `predicted - labels`.
    pub fn loss_gradient<S1, S2>(
        &self,
        predicted: &ArrayBase<S1, Ix2>,
        labels: &ArrayBase<S2, Ix2>,
    ) -> Result<Array2<f64>>
    where
        S1: Data<Elem = f64>,
        S2: Data<Elem = f64>,
    {
        check_pair(predicted.shape(), labels.shape())?;
        Ok(predicted - labels)
    }
}

fn check_pair(predicted: &[usize], labels: &[usize]) -> Result<()> {
    if predicted != labels {
        return Err(NetError::ShapeMismatch {
            context: NAME,
            expected: predicted.to_vec(),
            got: labels.to_vec(),
        });
    }
    Ok(())
}

impl Layer for SoftmaxLayer {
    fn name(&self) -> &'static str {
        NAME
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        crate::layers::check_input(NAME, input, &[self.classes])?;
        let logits = input.view().into_dimensionality::<Ix2>()?;
        Ok(self.predict(&logits).into_dyn())
    }

    fn gradient(&mut self, labels: &Tensor, output: &Tensor) -> Result<Tensor> {
        let labels = labels.view().into_dimensionality::<Ix2>()?;
        let predicted = output.view().into_dimensionality::<Ix2>()?;
        Ok(self.loss_gradient(&predicted, &labels)?.into_dyn())
    }

    fn input_shape(&self) -> Vec<usize> {
        vec![self.classes]
    }

    fn output_shape(&self) -> Vec<usize> {
        vec![self.classes]
    }
}
