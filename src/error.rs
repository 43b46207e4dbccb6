//! Error type shared by every module of the crate.

use crate::layers::LayerKind;
use crate::tensor::Shape;

/// All errors that can occur while building, running or configuring a network.
///
/// Every variant describes structural misuse of the API: incompatible layer
/// pairings, tensors of the wrong shape, out-of-range targets or malformed
/// configuration. None of them are recoverable by retrying the same call.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A layer kind cannot be bound after the given predecessor kind.
    #[error("invalid layer pairing: {kind} cannot follow {previous}")]
    IncompatibleLayers { previous: LayerKind, kind: LayerKind },

    /// A layer was used in a position or state it does not support.
    #[error("invalid layer: {0}")]
    InvalidLayer(String),

    /// A declared or derived dimension is unusable (zero, or larger than its input).
    #[error("invalid dimension: {0}")]
    InvalidDimension(String),

    /// A tensor's shape disagrees with the shape a layer expects.
    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: Shape, got: Shape },

    /// Element count mismatch when creating a tensor from a vec.
    #[error("element count mismatch: shape {shape} requires {expected} elements, got {got}")]
    ElementCountMismatch {
        shape: Shape,
        expected: usize,
        got: usize,
    },

    /// `bind` or a successor link was attempted a second time.
    #[error("{0} layer is already bound")]
    AlreadyBound(LayerKind),

    /// The network has no layers to propagate through.
    #[error("network has no layers")]
    EmptyNetwork,

    /// Training and prediction need an output layer at the end of the chain.
    #[error("terminal layer is {0}, expected an output layer")]
    MissingOutputLayer(LayerKind),

    /// The target class index does not address a unit of the output layer.
    #[error("target class {target} out of range for output size {size}")]
    TargetOutOfRange { target: usize, size: usize },

    /// Learning rates must be positive and finite.
    #[error("learning rate must be positive and finite, got {0}")]
    InvalidLearningRate(f64),

    /// Configuration file contents failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
