//! Input layers
//!
//! Input layers start a chain. They pass the sample through unchanged and, on
//! the way back, apply the update for the edge leading into their successor
//! before ending the backward pass.

use crate::error::{Error, Result};
use crate::layers::{backward_through_edge, link_once, unlinked, Layer, LayerInfo, LayerKind};
use crate::parameters::ParameterBlock;
use crate::tensor::{Shape, Tensor};
use crate::utils::SimpleRng;

/// Flat input of `size` values, shape (1, 1, size).
#[derive(Debug, Clone)]
pub struct Input1D {
    size: usize,
    next: Option<LayerInfo>,
}

impl Input1D {
    pub fn new(size: usize) -> Self {
        Self { size, next: None }
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

/// Spatial input of shape (depth, width, height).
#[derive(Debug, Clone)]
pub struct Input2D {
    shape: Shape,
    next: Option<LayerInfo>,
}

impl Input2D {
    pub fn new(depth: usize, width: usize, height: usize) -> Self {
        Self {
            shape: Shape::new(depth, width, height),
            next: None,
        }
    }
}

fn no_predecessor(kind: LayerKind, previous: &LayerInfo) -> Error {
    Error::IncompatibleLayers {
        previous: previous.kind,
        kind,
    }
}

impl Layer for Input1D {
    fn kind(&self) -> LayerKind {
        LayerKind::Input1D
    }

    fn shape(&self) -> Shape {
        Shape::vector(self.size)
    }

    // Input layers never have a previous layer.
    fn bind(&mut self, previous: &LayerInfo, _rng: &mut SimpleRng) -> Result<Option<ParameterBlock>> {
        Err(no_predecessor(self.kind(), previous))
    }

    fn link_next(&mut self, next: &LayerInfo) -> Result<()> {
        link_once(&mut self.next, LayerKind::Input1D, next)
    }

    fn forward(&self, input: &Tensor, _parameters: Option<&ParameterBlock>) -> Result<Tensor> {
        input.expect_shape(self.shape())?;
        Ok(input.clone())
    }

    fn backward(
        &self,
        activated: &Tensor,
        error: &Tensor,
        downstream: Option<&mut ParameterBlock>,
        learning_rate: f64,
    ) -> Result<Option<Tensor>> {
        let next = self.next.as_ref().ok_or_else(|| unlinked(self.kind()))?;
        match next.kind {
            LayerKind::FullyConnected | LayerKind::Output => {
                backward_through_edge(activated, error, next, downstream, learning_rate)?;
                Ok(None)
            }
            _ => Err(Error::IncompatibleLayers {
                previous: self.kind(),
                kind: next.kind,
            }),
        }
    }
}

impl Layer for Input2D {
    fn kind(&self) -> LayerKind {
        LayerKind::Input2D
    }

    fn shape(&self) -> Shape {
        self.shape
    }

    fn bind(&mut self, previous: &LayerInfo, _rng: &mut SimpleRng) -> Result<Option<ParameterBlock>> {
        Err(no_predecessor(self.kind(), previous))
    }

    fn link_next(&mut self, next: &LayerInfo) -> Result<()> {
        link_once(&mut self.next, LayerKind::Input2D, next)
    }

    fn forward(&self, input: &Tensor, _parameters: Option<&ParameterBlock>) -> Result<Tensor> {
        input.expect_shape(self.shape)?;
        Ok(input.clone())
    }

    fn backward(
        &self,
        activated: &Tensor,
        error: &Tensor,
        downstream: Option<&mut ParameterBlock>,
        learning_rate: f64,
    ) -> Result<Option<Tensor>> {
        let next = self.next.as_ref().ok_or_else(|| unlinked(self.kind()))?;
        match next.kind {
            LayerKind::FullyConnected | LayerKind::Output | LayerKind::Convolutional => {
                backward_through_edge(activated, error, next, downstream, learning_rate)?;
            }
            // Pooling has no weights to update.
            LayerKind::MaxPooling | LayerKind::MeanPooling => {}
            LayerKind::Input1D | LayerKind::Input2D => {
                return Err(Error::IncompatibleLayers {
                    previous: self.kind(),
                    kind: next.kind,
                })
            }
        }
        Ok(None)
    }
}
