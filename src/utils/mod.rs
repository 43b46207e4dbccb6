//! Shared utilities for the network engine
//!
//! This module provides the seeded random number generator used for weight
//! initialization and the tanh activation helpers shared by every layer.

pub mod activations;
pub mod rng;

pub use activations::{argmax, output_error, tanh, tanh_derivative, tanh_inplace};
pub use rng::SimpleRng;
