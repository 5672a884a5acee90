//! Layer trait definitions
//!
//! This module defines the [`Layer`] trait every layer implements, the
//! [`HasParameters`] capability implemented only by layers that own weights,
//! and the two-stage forward cache that pairs each forward pass with exactly
//! one gradient pass.

use crate::config::Hyperparameters;
use crate::error::{NetError, Result};
use crate::layers::Parameters;
use crate::optimizers::OptimizerKind;
use crate::Tensor;
use tracing::{debug, warn};

/// Core trait for network layers.
///
/// A training step drives a stack of layers as follows:
///
/// ```ignore
/// // forward, keeping every layer's own output
/// let mut outputs = Vec::new();
/// let mut x = input;
/// for layer in layers.iter_mut() {
///     x = layer.forward(&x)?;
///     outputs.push(x.clone());
/// }
/// // gradient in reverse, each layer gets the output it produced
/// for (layer, out) in layers.iter_mut().zip(&outputs).rev() {
///     grad = layer.gradient(&grad, out)?;
/// }
/// // then update every parameterized layer once
/// for layer in layers.iter_mut() {
///     if let Some(p) = layer.trainable() {
///         p.backward(OptimizerKind::Adam);
///     }
/// }
/// ```
pub trait Layer {
    /// Short layer name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Forward propagation through the layer.
    ///
    /// Caches whatever the matching [`Layer::gradient`] call needs. Calling
    /// `forward` again before `gradient` replaces the cache.
    ///
    /// # Errors
    ///
    /// Returns an error if the input does not match the constructor shape.
    fn forward(&mut self, input: &Tensor) -> Result<Tensor>;

    /// Gradient with respect to the layer input.
    ///
    /// `upstream` is the gradient with respect to this layer's output and
    /// `output` is the tensor this layer returned from the matching
    /// `forward`. Layers with parameters also store their batch-averaged
    /// weight and bias gradients. The forward cache is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::GradientBeforeForward`] if no forward pass is
    /// pending, or a shape error if the tensors do not fit the layer.
    fn gradient(&mut self, upstream: &Tensor, output: &Tensor) -> Result<Tensor>;

    /// Per-sample input shape (without the batch axis).
    fn input_shape(&self) -> Vec<usize>;

    /// Per-sample output shape (without the batch axis).
    fn output_shape(&self) -> Vec<usize>;

    /// Number of trainable scalars.
    fn parameter_count(&self) -> usize {
        0
    }

    /// Parameter capability, if this layer owns weights.
    fn trainable(&mut self) -> Option<&mut dyn HasParameters> {
        None
    }

    /// Drop any pending forward cache, for forward passes that will not be
    /// followed by `gradient`.
    fn clear_cache(&mut self) {}
}

/// Capability of layers that own a weight matrix and a bias row.
pub trait HasParameters {
    fn parameters(&self) -> &Parameters;

    fn parameters_mut(&mut self) -> &mut Parameters;

    fn hyperparameters(&self) -> &Hyperparameters;

    /// Apply weight decay, then one step of `optimizer` using the gradients
    /// stored by the last `gradient` call.
    fn backward(&mut self, optimizer: OptimizerKind) {
        let hyper = *self.hyperparameters();
        let params = self.parameters_mut();
        params.decay(hyper.weight_decay);
        optimizer.step(params, &hyper);
        debug!(
            optimizer = optimizer.name(),
            weights = ?params.weights().dim(),
            "parameters updated"
        );
    }
}

/// Forward cache modelled as a two-stage state machine.
#[derive(Debug, Clone)]
pub enum Stage<C> {
    /// No cached forward state; the next call must be `forward`.
    ReadyForForward,
    /// A forward pass ran; its cache waits for the matching `gradient`.
    AwaitingGradient(C),
}

impl<C> Default for Stage<C> {
    fn default() -> Self {
        Stage::ReadyForForward
    }
}

impl<C> Stage<C> {
    /// Store a fresh forward cache. An unconsumed cache is replaced.
    pub fn store(&mut self, layer: &'static str, cache: C) {
        if self.is_awaiting_gradient() {
            warn!(layer, "forward called twice without gradient; replacing cache");
        }
        *self = Stage::AwaitingGradient(cache);
    }

    /// Take the cache, returning the layer to `ReadyForForward`.
    pub fn consume(&mut self, layer: &'static str) -> Result<C> {
        match std::mem::take(self) {
            Stage::AwaitingGradient(cache) => Ok(cache),
            Stage::ReadyForForward => Err(NetError::GradientBeforeForward { layer }),
        }
    }

    /// Return to `ReadyForForward`, discarding any pending cache.
    pub fn clear(&mut self) {
        *self = Stage::ReadyForForward;
    }

    pub fn is_awaiting_gradient(&self) -> bool {
        matches!(self, Stage::AwaitingGradient(_))
    }
}

/// Check a batched tensor against a per-sample shape. Empty batches are
/// rejected: gradients are averaged over the batch.
pub(crate) fn check_input(context: &'static str, input: &Tensor, expected: &[usize]) -> Result<()> {
    let shape = input.shape();
    let batch = shape.first().copied().unwrap_or(0);
    if batch == 0 || shape.len() != expected.len() + 1 || &shape[1..] != expected {
        let mut want = vec![batch.max(1)];
        want.extend_from_slice(expected);
        return Err(NetError::ShapeMismatch {
            context,
            expected: want,
            got: shape.to_vec(),
        });
    }
    Ok(())
}
