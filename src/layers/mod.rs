//! Layer abstractions for the network chain
//!
//! This module provides the [`Layer`] trait, the closed set of layer kinds and
//! the compatibility rules between adjacent kinds. Concrete layers live in the
//! submodules:
//!
//! - `input`: [`Input1D`], [`Input2D`]
//! - `dense`: [`FullyConnected`], [`Output`]
//! - `conv2d`: [`Convolutional`]
//! - `pooling`: [`MaxPooling`], [`MeanPooling`]

mod r#trait;
pub mod conv2d;
pub mod dense;
pub mod input;
pub mod pooling;

pub use conv2d::Convolutional;
pub use dense::{FullyConnected, Output};
pub use input::{Input1D, Input2D};
pub use pooling::{MaxPooling, MeanPooling};
pub use r#trait::Layer;

use crate::error::{Error, Result};
use crate::parameters::ParameterBlock;
use crate::tensor::{Shape, Tensor};
use std::fmt;

/// Shape family of a layer's activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeFamily {
    /// Flat vector, shape (1, 1, size).
    Dense1D,
    /// Feature maps, shape (depth, width, height).
    Spatial2D,
}

/// Every layer kind the engine knows how to pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKind {
    Input1D,
    FullyConnected,
    Output,
    Input2D,
    Convolutional,
    MaxPooling,
    MeanPooling,
}

impl LayerKind {
    pub fn family(self) -> ShapeFamily {
        match self {
            LayerKind::Input1D | LayerKind::FullyConnected | LayerKind::Output => {
                ShapeFamily::Dense1D
            }
            LayerKind::Input2D
            | LayerKind::Convolutional
            | LayerKind::MaxPooling
            | LayerKind::MeanPooling => ShapeFamily::Spatial2D,
        }
    }

    pub fn is_input(self) -> bool {
        matches!(self, LayerKind::Input1D | LayerKind::Input2D)
    }

    pub fn is_pooling(self) -> bool {
        matches!(self, LayerKind::MaxPooling | LayerKind::MeanPooling)
    }

    /// Whether binding this kind allocates a [`ParameterBlock`].
    pub fn has_parameters(self) -> bool {
        !self.is_input() && !self.is_pooling()
    }

    /// Whether `self` may be bound directly after `previous`.
    ///
    /// Input layers never have a predecessor, nothing follows an output layer,
    /// spatial-only layers need a spatial predecessor and pooling cannot feed
    /// pooling.
    pub fn can_follow(self, previous: LayerKind) -> bool {
        if self.is_input() || previous == LayerKind::Output {
            return false;
        }
        match self {
            LayerKind::FullyConnected | LayerKind::Output => true,
            LayerKind::Convolutional => previous.family() == ShapeFamily::Spatial2D,
            LayerKind::MaxPooling | LayerKind::MeanPooling => {
                previous.family() == ShapeFamily::Spatial2D && !previous.is_pooling()
            }
            LayerKind::Input1D | LayerKind::Input2D => false,
        }
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LayerKind::Input1D => "Input1D",
            LayerKind::FullyConnected => "FullyConnected",
            LayerKind::Output => "Output",
            LayerKind::Input2D => "Input2D",
            LayerKind::Convolutional => "Convolutional",
            LayerKind::MaxPooling => "MaxPooling",
            LayerKind::MeanPooling => "MeanPooling",
        };
        f.write_str(name)
    }
}

/// Kernel (window) size of a convolutional or pooling layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Kernel {
    pub width: usize,
    pub height: usize,
}

impl Kernel {
    pub fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> usize {
        self.width * self.height
    }
}

/// Snapshot of a neighbouring layer, recorded once at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerInfo {
    pub kind: LayerKind,
    pub shape: Shape,
    pub kernel: Option<Kernel>,
}

/// Checks `kind` may follow `previous`, reporting the pairing error otherwise.
pub(crate) fn check_pairing(previous: &LayerInfo, kind: LayerKind) -> Result<()> {
    if kind.can_follow(previous.kind) {
        Ok(())
    } else {
        Err(Error::IncompatibleLayers {
            previous: previous.kind,
            kind,
        })
    }
}

/// Records a neighbour in a slot that may only be written once.
pub(crate) fn link_once(
    slot: &mut Option<LayerInfo>,
    owner: LayerKind,
    neighbour: &LayerInfo,
) -> Result<()> {
    if slot.is_some() {
        return Err(Error::AlreadyBound(owner));
    }
    *slot = Some(*neighbour);
    Ok(())
}

/// The successor of a layer during a backward pass, with its parameter block
/// when it owns one.
pub(crate) fn downstream_block<'a>(
    next: &LayerInfo,
    downstream: Option<&'a mut ParameterBlock>,
) -> Result<&'a mut ParameterBlock> {
    downstream.ok_or_else(|| {
        Error::InvalidLayer(format!(
            "{} successor has no parameter block to update",
            next.kind
        ))
    })
}

/// Backward step through a weighted edge (dense or convolution successor).
///
/// Computes the error for the current layer with the successor's weights as
/// they are, then applies the SGD update to the successor's block.
pub(crate) fn backward_through_edge(
    activated: &Tensor,
    error: &Tensor,
    next: &LayerInfo,
    downstream: Option<&mut ParameterBlock>,
    learning_rate: f64,
) -> Result<Tensor> {
    let block = downstream_block(next, downstream)?;
    let propagated = block.propagate_error(activated, error)?;
    block.update(activated, error, learning_rate)?;
    Ok(propagated)
}

/// Backward step for convolutional and pooling layers.
///
/// Dense and convolutional successors go through their parameter block.
/// Pooling successors (only reachable from a convolutional layer) have no
/// weights: the error is routed to the window maximum or spread over the
/// window, without a tanh derivative.
pub(crate) fn backward_spatial(
    kind: LayerKind,
    activated: &Tensor,
    error: &Tensor,
    next: &LayerInfo,
    downstream: Option<&mut ParameterBlock>,
    learning_rate: f64,
) -> Result<Tensor> {
    match next.kind {
        LayerKind::FullyConnected | LayerKind::Output | LayerKind::Convolutional => {
            backward_through_edge(activated, error, next, downstream, learning_rate)
        }
        LayerKind::MaxPooling | LayerKind::MeanPooling if kind == LayerKind::Convolutional => {
            let kernel = next.kernel.ok_or_else(|| {
                Error::InvalidLayer(format!("{} successor has no kernel", next.kind))
            })?;
            if next.kind == LayerKind::MaxPooling {
                pooling::route_max(activated, error, kernel)
            } else {
                pooling::distribute_mean(activated.shape(), error, kernel)
            }
        }
        _ => Err(Error::IncompatibleLayers {
            previous: kind,
            kind: next.kind,
        }),
    }
}

/// Successor slot of a layer that has not been linked forward yet.
pub(crate) fn unlinked(kind: LayerKind) -> Error {
    Error::InvalidLayer(format!("{} layer has no successor to propagate to", kind))
}

/// Predecessor slot of a layer that has not been bound yet.
pub(crate) fn unbound(kind: LayerKind) -> Error {
    Error::InvalidLayer(format!("{} layer has not been bound to a predecessor", kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_families() {
        assert_eq!(LayerKind::Output.family(), ShapeFamily::Dense1D);
        assert_eq!(LayerKind::MeanPooling.family(), ShapeFamily::Spatial2D);
    }

    #[test]
    fn test_spatial_layers_reject_dense_predecessor() {
        assert!(!LayerKind::Convolutional.can_follow(LayerKind::FullyConnected));
        assert!(!LayerKind::MaxPooling.can_follow(LayerKind::Input1D));
        assert!(LayerKind::Convolutional.can_follow(LayerKind::MaxPooling));
    }

    #[test]
    fn test_dense_layers_accept_both_families() {
        assert!(LayerKind::FullyConnected.can_follow(LayerKind::Input1D));
        assert!(LayerKind::FullyConnected.can_follow(LayerKind::MeanPooling));
        assert!(LayerKind::Output.can_follow(LayerKind::Convolutional));
    }

    #[test]
    fn test_structural_restrictions() {
        assert!(!LayerKind::Input2D.can_follow(LayerKind::Convolutional));
        assert!(!LayerKind::FullyConnected.can_follow(LayerKind::Output));
        assert!(!LayerKind::MaxPooling.can_follow(LayerKind::MeanPooling));
    }

    #[test]
    fn test_parameter_ownership() {
        assert!(LayerKind::Convolutional.has_parameters());
        assert!(!LayerKind::MaxPooling.has_parameters());
        assert!(!LayerKind::Input2D.has_parameters());
    }
}
