//! Dense (fully connected) layers
//!
//! [`FullyConnected`] and [`Output`] compute `tanh(b + Σ w·x)` over the whole
//! flattened predecessor activation, whether the predecessor is a vector or a
//! stack of feature maps. The output layer additionally turns the target into
//! the initial error of the backward pass.

use crate::error::{Error, Result};
use crate::layers::{
    backward_through_edge, check_pairing, link_once, unbound, unlinked, Layer, LayerInfo,
    LayerKind, ShapeFamily,
};
use crate::parameters::ParameterBlock;
use crate::tensor::{Shape, Tensor};
use crate::utils::{output_error, tanh_inplace, SimpleRng};

/// Hidden dense layer of `size` tanh units.
///
/// # Example
///
/// ```
/// use rust_conv_networks::layers::{FullyConnected, Input1D, Output};
/// use rust_conv_networks::Network;
///
/// let mut network = Network::new(42);
/// network.add_layer(Input1D::new(3)).unwrap();
/// network.add_layer(FullyConnected::new(4)).unwrap();
/// network.add_layer(Output::new(2)).unwrap();
/// assert_eq!(network.len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct FullyConnected {
    size: usize,
    previous: Option<LayerInfo>,
    next: Option<LayerInfo>,
}

impl FullyConnected {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            previous: None,
            next: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Terminal dense layer; one unit per class.
#[derive(Debug, Clone)]
pub struct Output {
    size: usize,
    previous: Option<LayerInfo>,
}

impl Output {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            previous: None,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

fn bind_dense(
    kind: LayerKind,
    size: usize,
    slot: &mut Option<LayerInfo>,
    previous: &LayerInfo,
    rng: &mut SimpleRng,
) -> Result<Option<ParameterBlock>> {
    if slot.is_some() {
        return Err(Error::AlreadyBound(kind));
    }
    check_pairing(previous, kind)?;
    if size == 0 {
        return Err(Error::InvalidDimension(format!("{} size must be greater than 0", kind)));
    }
    let current = LayerInfo {
        kind,
        shape: Shape::vector(size),
        kernel: None,
    };
    let block = ParameterBlock::new(previous, &current, rng)?;
    *slot = Some(*previous);
    Ok(Some(block))
}

fn forward_dense(
    kind: LayerKind,
    previous: Option<&LayerInfo>,
    input: &Tensor,
    parameters: Option<&ParameterBlock>,
) -> Result<Tensor> {
    let previous = previous.ok_or_else(|| unbound(kind))?;
    input.expect_shape(previous.shape)?;
    let block = parameters.ok_or_else(|| {
        Error::InvalidLayer(format!("{} layer needs its parameter block", kind))
    })?;

    let mut output = block.weighted_input(input)?;
    tanh_inplace(output.as_mut_slice());
    Ok(output)
}

impl Layer for FullyConnected {
    fn kind(&self) -> LayerKind {
        LayerKind::FullyConnected
    }

    fn shape(&self) -> Shape {
        Shape::vector(self.size)
    }

    fn bind(&mut self, previous: &LayerInfo, rng: &mut SimpleRng) -> Result<Option<ParameterBlock>> {
        bind_dense(LayerKind::FullyConnected, self.size, &mut self.previous, previous, rng)
    }

    fn link_next(&mut self, next: &LayerInfo) -> Result<()> {
        if next.kind.family() != ShapeFamily::Dense1D {
            return Err(Error::IncompatibleLayers {
                previous: self.kind(),
                kind: next.kind,
            });
        }
        link_once(&mut self.next, LayerKind::FullyConnected, next)
    }

    fn forward(&self, input: &Tensor, parameters: Option<&ParameterBlock>) -> Result<Tensor> {
        forward_dense(self.kind(), self.previous.as_ref(), input, parameters)
    }

    fn backward(
        &self,
        activated: &Tensor,
        error: &Tensor,
        downstream: Option<&mut ParameterBlock>,
        learning_rate: f64,
    ) -> Result<Option<Tensor>> {
        let next = self.next.as_ref().ok_or_else(|| unlinked(self.kind()))?;
        if next.kind.family() != ShapeFamily::Dense1D {
            return Err(Error::IncompatibleLayers {
                previous: self.kind(),
                kind: next.kind,
            });
        }
        backward_through_edge(activated, error, next, downstream, learning_rate).map(Some)
    }
}

impl Layer for Output {
    fn kind(&self) -> LayerKind {
        LayerKind::Output
    }

    fn shape(&self) -> Shape {
        Shape::vector(self.size)
    }

    fn bind(&mut self, previous: &LayerInfo, rng: &mut SimpleRng) -> Result<Option<ParameterBlock>> {
        bind_dense(LayerKind::Output, self.size, &mut self.previous, previous, rng)
    }

    fn link_next(&mut self, next: &LayerInfo) -> Result<()> {
        Err(Error::IncompatibleLayers {
            previous: self.kind(),
            kind: next.kind,
        })
    }

    fn forward(&self, input: &Tensor, parameters: Option<&ParameterBlock>) -> Result<Tensor> {
        forward_dense(self.kind(), self.previous.as_ref(), input, parameters)
    }

    /// `error` is the target vector; the returned error starts the backward pass.
    fn backward(
        &self,
        activated: &Tensor,
        error: &Tensor,
        _downstream: Option<&mut ParameterBlock>,
        _learning_rate: f64,
    ) -> Result<Option<Tensor>> {
        activated.expect_shape(self.shape())?;
        error.expect_shape(self.shape())?;

        let initial: Vec<f64> = activated
            .as_slice()
            .iter()
            .zip(error.as_slice())
            .map(|(&a, &target)| output_error(a, target))
            .collect();
        Ok(Some(Tensor::from(initial)))
    }
}
