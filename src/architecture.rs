//! Architecture configuration structures
//!
//! This module provides configuration structures for defining a layer chain
//! via JSON files, so architectures can be changed without code changes.

use crate::config::NetworkConfig;
use crate::error::{Error, Result};
use crate::layers::{
    Convolutional, FullyConnected, Input1D, Input2D, Layer, LayerKind, MaxPooling, MeanPooling,
    Output,
};
use crate::network::Network;
use serde::Deserialize;
use std::fs;

/// Configuration for a single layer in the chain.
///
/// The `layer_type` tag selects the kind; each kind has its own fields:
///
/// - **input1d**: `size`
/// - **fully_connected** / **output**: `size`
/// - **input2d**: `depth`, `width`, `height`
/// - **convolutional**: `depth`, `kernel_width`, `kernel_height`
/// - **max_pooling** / **mean_pooling**: `kernel_width`, `kernel_height`
///
/// Convolutional and pooling layers derive their width and height from the
/// layer before them.
///
/// # Examples
///
/// ```json
/// { "layer_type": "input2d", "depth": 1, "width": 28, "height": 28 }
/// ```
///
/// ```json
/// { "layer_type": "convolutional", "depth": 8, "kernel_width": 5, "kernel_height": 5 }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "layer_type", rename_all = "snake_case")]
pub enum LayerConfig {
    #[serde(rename = "input1d")]
    Input1D { size: usize },
    FullyConnected { size: usize },
    Output { size: usize },
    #[serde(rename = "input2d")]
    Input2D {
        depth: usize,
        width: usize,
        height: usize,
    },
    Convolutional {
        depth: usize,
        kernel_width: usize,
        kernel_height: usize,
    },
    MaxPooling {
        kernel_width: usize,
        kernel_height: usize,
    },
    MeanPooling {
        kernel_width: usize,
        kernel_height: usize,
    },
}

impl LayerConfig {
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerConfig::Input1D { .. } => LayerKind::Input1D,
            LayerConfig::FullyConnected { .. } => LayerKind::FullyConnected,
            LayerConfig::Output { .. } => LayerKind::Output,
            LayerConfig::Input2D { .. } => LayerKind::Input2D,
            LayerConfig::Convolutional { .. } => LayerKind::Convolutional,
            LayerConfig::MaxPooling { .. } => LayerKind::MaxPooling,
            LayerConfig::MeanPooling { .. } => LayerKind::MeanPooling,
        }
    }

    /// Construct the (unbound) layer this entry describes.
    pub fn build(&self) -> Box<dyn Layer> {
        match *self {
            LayerConfig::Input1D { size } => Box::new(Input1D::new(size)),
            LayerConfig::FullyConnected { size } => Box::new(FullyConnected::new(size)),
            LayerConfig::Output { size } => Box::new(Output::new(size)),
            LayerConfig::Input2D {
                depth,
                width,
                height,
            } => Box::new(Input2D::new(depth, width, height)),
            LayerConfig::Convolutional {
                depth,
                kernel_width,
                kernel_height,
            } => Box::new(Convolutional::new(depth, kernel_width, kernel_height)),
            LayerConfig::MaxPooling {
                kernel_width,
                kernel_height,
            } => Box::new(MaxPooling::new(kernel_width, kernel_height)),
            LayerConfig::MeanPooling {
                kernel_width,
                kernel_height,
            } => Box::new(MeanPooling::new(kernel_width, kernel_height)),
        }
    }

    fn dimensions(&self) -> Vec<(&'static str, usize)> {
        match *self {
            LayerConfig::Input1D { size }
            | LayerConfig::FullyConnected { size }
            | LayerConfig::Output { size } => vec![("size", size)],
            LayerConfig::Input2D {
                depth,
                width,
                height,
            } => vec![("depth", depth), ("width", width), ("height", height)],
            LayerConfig::Convolutional {
                depth,
                kernel_width,
                kernel_height,
            } => vec![
                ("depth", depth),
                ("kernel_width", kernel_width),
                ("kernel_height", kernel_height),
            ],
            LayerConfig::MaxPooling {
                kernel_width,
                kernel_height,
            }
            | LayerConfig::MeanPooling {
                kernel_width,
                kernel_height,
            } => vec![
                ("kernel_width", kernel_width),
                ("kernel_height", kernel_height),
            ],
        }
    }
}

/// Configuration for the entire layer chain.
///
/// # Example
///
/// ```json
/// {
///   "layers": [
///     { "layer_type": "input2d", "depth": 1, "width": 12, "height": 12 },
///     { "layer_type": "convolutional", "depth": 4, "kernel_width": 3, "kernel_height": 3 },
///     { "layer_type": "max_pooling", "kernel_width": 2, "kernel_height": 2 },
///     { "layer_type": "fully_connected", "size": 16 },
///     { "layer_type": "output", "size": 10 }
///   ]
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ArchitectureConfig {
    /// Layers from input to output.
    pub layers: Vec<LayerConfig>,
}

/// Loads an architecture configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use rust_conv_networks::architecture::load_architecture;
///
/// let arch = load_architecture("config/architectures/lenet.json").unwrap();
/// assert!(!arch.layers.is_empty());
/// ```
pub fn load_architecture(path: &str) -> Result<ArchitectureConfig> {
    let contents = fs::read_to_string(path)?;
    parse_architecture(&contents)
}

/// Parses and validates an architecture from a JSON string.
pub fn parse_architecture(contents: &str) -> Result<ArchitectureConfig> {
    let config: ArchitectureConfig = serde_json::from_str(contents)?;
    validate_architecture(&config)?;
    Ok(config)
}

/// Validates an architecture configuration.
///
/// Checks that:
/// - Architecture has at least one layer
/// - It starts with an input layer and ends with an output layer
/// - Every size and kernel dimension is positive
/// - Each layer kind may follow the one before it
fn validate_architecture(config: &ArchitectureConfig) -> Result<()> {
    let first = config
        .layers
        .first()
        .ok_or_else(|| Error::Config("architecture must have at least one layer".to_string()))?;
    if !first.kind().is_input() {
        return Err(Error::Config(format!(
            "layer 0: chain must start with an input layer, got {}",
            first.kind()
        )));
    }
    if let Some(last) = config.layers.last() {
        if last.kind() != LayerKind::Output {
            return Err(Error::Config(format!(
                "layer {}: chain must end with an output layer, got {}",
                config.layers.len() - 1,
                last.kind()
            )));
        }
    }

    for (i, layer) in config.layers.iter().enumerate() {
        if let Some((name, _)) = layer.dimensions().into_iter().find(|&(_, v)| v == 0) {
            return Err(Error::Config(format!(
                "layer {}: {} must be greater than 0",
                i, name
            )));
        }
    }

    for (i, pair) in config.layers.windows(2).enumerate() {
        let (previous, current) = (pair[0].kind(), pair[1].kind());
        if !current.can_follow(previous) {
            return Err(Error::Config(format!(
                "layer {}: {} cannot follow {}",
                i + 1,
                current,
                previous
            )));
        }
    }

    Ok(())
}

/// Builds a network from an architecture and network configuration.
///
/// Layers are added in order, so every layer is bound to the one before it and
/// weights are drawn from a generator seeded with `network.seed`.
///
/// # Errors
///
/// Returns an error if the architecture or network configuration is invalid,
/// or a derived dimension (kernel larger than its input) cannot be built.
pub fn build_network(config: &ArchitectureConfig, network: &NetworkConfig) -> Result<Network> {
    validate_architecture(config)?;
    let mut built = Network::with_config(network)?;
    for layer in &config.layers {
        built.push_layer(layer.build())?;
    }
    log::debug!(
        "built network with {} layers and {} parameters",
        built.len(),
        built.parameter_count()
    );
    Ok(built)
}
