//! Activation functions for the network
//!
//! Every weighted layer uses tanh. The derivative helpers take the already
//! activated value, which is what the backward pass has at hand.

/// Added to the output-layer derivative so that saturated units still receive
/// a non-zero error.
pub const OUTPUT_EPSILON: f64 = 1e-8;

/// Hyperbolic tangent activation.
pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

/// Tanh applied in-place to every element.
pub fn tanh_inplace(data: &mut [f64]) {
    for value in data.iter_mut() {
        *value = value.tanh();
    }
}

/// Tanh derivative assuming `activated = tanh(z)`.
///
/// Returns: 1 - activated²
pub fn tanh_derivative(activated: f64) -> f64 {
    1.0 - activated * activated
}

/// Error of a single output unit for squared loss against `target`.
///
/// Returns: (activated - target) * (1 - activated² + ε)
pub fn output_error(activated: f64, target: f64) -> f64 {
    (activated - target) * (tanh_derivative(activated) + OUTPUT_EPSILON)
}

/// Index of the largest value; ties keep the first maximum. Empty input yields 0.
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &value) in values.iter().enumerate().skip(1) {
        if value > values[best] {
            best = i;
        }
    }
    best
}
