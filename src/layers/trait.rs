//! Layer trait definition for the network chain
//!
//! This module defines the core Layer trait that all layer kinds implement.
//! The trait covers binding to a predecessor, forward propagation and backward
//! propagation with an immediate update of the successor's parameters.

use crate::error::Result;
use crate::layers::{Kernel, LayerInfo, LayerKind};
use crate::parameters::ParameterBlock;
use crate::tensor::{Shape, Tensor};
use crate::utils::SimpleRng;

/// Core trait for layers in a network chain.
///
/// A layer never owns the weights feeding into it. The network keeps one
/// [`ParameterBlock`] per edge and hands the right block to each call:
/// the layer's own incoming block during [`forward`](Layer::forward), and its
/// successor's block during [`backward`](Layer::backward).
///
/// # Example
///
/// ```ignore
/// // Forward pass through a bound layer
/// let output = layer.forward(&input, parameters.as_ref())?;
///
/// // Backward pass; updates the successor's block in place
/// let error_to_previous = layer.backward(&output, &error, next_block, 0.01)?;
/// ```
pub trait Layer {
    /// Kind tag used for pairing rules.
    fn kind(&self) -> LayerKind;

    /// Shape of this layer's activation. Layers whose size depends on the
    /// predecessor report their final shape only after [`bind`](Layer::bind).
    fn shape(&self) -> Shape;

    /// Kernel size for convolutional and pooling layers.
    fn kernel(&self) -> Option<Kernel> {
        None
    }

    /// Snapshot handed to neighbours when they are linked.
    fn info(&self) -> LayerInfo {
        LayerInfo {
            kind: self.kind(),
            shape: self.shape(),
            kernel: self.kernel(),
        }
    }

    /// Bind this layer after `previous`.
    ///
    /// Records the predecessor, derives this layer's dimensions if they depend
    /// on it, and allocates the parameter block for the edge
    /// `previous -> self` when this kind has one.
    ///
    /// # Errors
    ///
    /// Fails if the pairing is incompatible, the layer is already bound, or a
    /// derived dimension is unusable.
    fn bind(
        &mut self,
        previous: &LayerInfo,
        rng: &mut SimpleRng,
    ) -> Result<Option<ParameterBlock>>;

    /// Record the layer that was bound directly after this one.
    fn link_next(&mut self, next: &LayerInfo) -> Result<()>;

    /// Forward propagation.
    ///
    /// # Arguments
    ///
    /// * `input` - Predecessor's activated output (the raw sample for input layers)
    /// * `parameters` - The block of the edge feeding this layer, if any
    ///
    /// # Errors
    ///
    /// Fails with a shape mismatch if `input` does not have the expected shape.
    fn forward(&self, input: &Tensor, parameters: Option<&ParameterBlock>) -> Result<Tensor>;

    /// Backward propagation and update.
    ///
    /// # Arguments
    ///
    /// * `activated` - This layer's output from the forward pass
    /// * `error` - Error arriving from the successor (the target for output layers)
    /// * `downstream` - The successor's parameter block, updated in place
    /// * `learning_rate` - SGD step size
    ///
    /// # Returns
    ///
    /// The error for the predecessor, or `None` once the pass reaches an input layer.
    fn backward(
        &self,
        activated: &Tensor,
        error: &Tensor,
        downstream: Option<&mut ParameterBlock>,
        learning_rate: f64,
    ) -> Result<Option<Tensor>>;
}
