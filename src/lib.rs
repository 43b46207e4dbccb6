//! Rust Convolutional Networks Library
//!
//! A small neural network engine built around a chain of heterogeneous layers.
//! Each layer is bound to its predecessor when it is added to a [`Network`],
//! activations flow forward through the chain, and errors flow backward with
//! immediate per-sample gradient descent updates.
//!
//! # Modules
//!
//! - `tensor`: 3-axis activation/error buffers
//! - `parameters`: weight/bias blocks connecting adjacent layers
//! - `layers`: Layer trait and implementations (Input, Dense, Conv, Pooling)
//! - `network`: chain orchestration and running statistics
//! - `utils`: Shared utilities (RNG, activation functions)
//! - `config`: Network configuration
//! - `architecture`: Architecture configuration and network building

pub mod architecture;
pub mod config;
pub mod error;
pub mod layers;
pub mod network;
pub mod parameters;
pub mod tensor;
pub mod utils;

pub use error::{Error, Result};
pub use network::{Network, TrainingStats};
pub use parameters::{Connection, ParameterBlock};
pub use tensor::{Shape, Tensor};
