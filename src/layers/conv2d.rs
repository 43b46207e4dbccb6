//! 2D Convolutional layer implementation
//!
//! This module provides a Convolutional layer that applies a valid (unpadded,
//! stride 1) cross-correlation to its predecessor's feature maps followed by
//! tanh. Its width and height are derived from the predecessor when bound.

use crate::error::{Error, Result};
use crate::layers::{
    backward_spatial, check_pairing, link_once, unbound, unlinked, Kernel, Layer, LayerInfo,
    LayerKind,
};
use crate::parameters::ParameterBlock;
use crate::tensor::{Shape, Tensor};
use crate::utils::{tanh_inplace, SimpleRng};

/// 2D Convolutional layer with `depth` learnable filters.
///
/// # Fields
///
/// * `depth` - Number of output feature maps (number of filters)
/// * `kernel` - Filter size (width × height)
/// * `shape` - Output shape, `(depth, prev_width - kernel_width + 1, prev_height - kernel_height + 1)`
///   once bound
///
/// # Example
///
/// ```
/// use rust_conv_networks::layers::{Convolutional, Input2D, Layer};
/// use rust_conv_networks::tensor::Shape;
/// use rust_conv_networks::utils::SimpleRng;
///
/// let mut layer = Convolutional::new(8, 3, 3);
/// let block = layer
///     .bind(&Input2D::new(1, 28, 28).info(), &mut SimpleRng::new(42))
///     .unwrap()
///     .unwrap();
///
/// assert_eq!(layer.shape(), Shape::new(8, 26, 26));
/// assert_eq!(block.dims(), [1, 8, 3, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct Convolutional {
    depth: usize,
    kernel: Kernel,
    shape: Shape,
    previous: Option<LayerInfo>,
    next: Option<LayerInfo>,
}

impl Convolutional {
    pub fn new(depth: usize, kernel_width: usize, kernel_height: usize) -> Self {
        Self {
            depth,
            kernel: Kernel::new(kernel_width, kernel_height),
            shape: Shape::new(depth, 0, 0),
            previous: None,
            next: None,
        }
    }

    /// Number of filters.
    pub fn depth(&self) -> usize {
        self.depth
    }
}

/// Output shape of a valid convolution: `input - kernel + 1` per axis.
pub fn convolved_shape(input: Shape, depth: usize, kernel: Kernel) -> Result<Shape> {
    if depth == 0 || kernel.width == 0 || kernel.height == 0 {
        return Err(Error::InvalidDimension(
            "convolution needs at least one 1x1 filter".to_string(),
        ));
    }
    if kernel.width > input.width || kernel.height > input.height {
        return Err(Error::InvalidDimension(format!(
            "convolution kernel {}x{} larger than input {}",
            kernel.width, kernel.height, input
        )));
    }
    Ok(Shape::new(
        depth,
        input.width - kernel.width + 1,
        input.height - kernel.height + 1,
    ))
}

impl Layer for Convolutional {
    fn kind(&self) -> LayerKind {
        LayerKind::Convolutional
    }

    fn shape(&self) -> Shape {
        self.shape
    }

    fn kernel(&self) -> Option<Kernel> {
        Some(self.kernel)
    }

    fn bind(&mut self, previous: &LayerInfo, rng: &mut SimpleRng) -> Result<Option<ParameterBlock>> {
        if self.previous.is_some() {
            return Err(Error::AlreadyBound(self.kind()));
        }
        check_pairing(previous, self.kind())?;

        self.shape = convolved_shape(previous.shape, self.depth, self.kernel)?;
        let block = ParameterBlock::new(previous, &self.info(), rng)?;
        self.previous = Some(*previous);
        Ok(Some(block))
    }

    fn link_next(&mut self, next: &LayerInfo) -> Result<()> {
        if !next.kind.can_follow(self.kind()) {
            return Err(Error::IncompatibleLayers {
                previous: self.kind(),
                kind: next.kind,
            });
        }
        link_once(&mut self.next, LayerKind::Convolutional, next)
    }

    fn forward(&self, input: &Tensor, parameters: Option<&ParameterBlock>) -> Result<Tensor> {
        let previous = self.previous.as_ref().ok_or_else(|| unbound(self.kind()))?;
        input.expect_shape(previous.shape)?;
        let block = parameters.ok_or_else(|| {
            Error::InvalidLayer("Convolutional layer needs its parameter block".to_string())
        })?;

        let mut output = block.weighted_input(input)?;
        tanh_inplace(output.as_mut_slice());
        Ok(output)
    }

    fn backward(
        &self,
        activated: &Tensor,
        error: &Tensor,
        downstream: Option<&mut ParameterBlock>,
        learning_rate: f64,
    ) -> Result<Option<Tensor>> {
        let next = self.next.as_ref().ok_or_else(|| unlinked(self.kind()))?;
        backward_spatial(self.kind(), activated, error, next, downstream, learning_rate).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{FullyConnected, Input2D, MaxPooling, MeanPooling};
    use approx::assert_relative_eq;

    fn bound_conv(depth: usize, kernel: usize, input: Shape) -> (Convolutional, ParameterBlock) {
        let mut layer = Convolutional::new(depth, kernel, kernel);
        let block = layer
            .bind(
                &Input2D::new(input.depth, input.width, input.height).info(),
                &mut SimpleRng::new(42),
            )
            .unwrap()
            .unwrap();
        (layer, block)
    }

    #[test]
    fn test_output_shape_law() {
        for (size, kernel) in [(28, 3), (5, 5), (10, 4), (7, 1)] {
            let (layer, _) = bound_conv(2, kernel, Shape::new(1, size, size));
            assert_eq!(layer.shape(), Shape::new(2, size - kernel + 1, size - kernel + 1));
        }
    }

    #[test]
    fn test_rectangular_kernel() {
        let mut layer = Convolutional::new(3, 2, 4);
        layer
            .bind(&Input2D::new(2, 6, 6).info(), &mut SimpleRng::new(1))
            .unwrap();
        assert_eq!(layer.shape(), Shape::new(3, 5, 3));
    }

    #[test]
    fn test_kernel_larger_than_input_rejected() {
        let mut layer = Convolutional::new(1, 5, 5);
        let err = layer
            .bind(&Input2D::new(1, 4, 4).info(), &mut SimpleRng::new(1))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidDimension(_)));
    }

    #[test]
    fn test_dense_predecessor_rejected() {
        let mut layer = Convolutional::new(1, 1, 1);
        let err = layer
            .bind(&FullyConnected::new(9).info(), &mut SimpleRng::new(1))
            .unwrap_err();
        assert!(matches!(err, Error::IncompatibleLayers { .. }));
    }

    #[test]
    fn test_forward_is_tanh_of_correlation() {
        let (layer, block) = bound_conv(2, 2, Shape::new(1, 3, 3));
        let input = Tensor::from_vec(
            Shape::new(1, 3, 3),
            vec![0.1, -0.2, 0.3, 0.4, -0.5, 0.6, 0.7, -0.8, 0.9],
        )
        .unwrap();
        let out = layer.forward(&input, Some(&block)).unwrap();
        let raw = block.weighted_input(&input).unwrap();

        assert_eq!(out.shape(), Shape::new(2, 2, 2));
        for (o, r) in out.as_slice().iter().zip(raw.as_slice()) {
            assert_relative_eq!(*o, r.tanh());
        }
    }

    #[test]
    fn test_backward_into_max_pooling_routes_to_maximum() {
        let (mut layer, _) = bound_conv(1, 1, Shape::new(1, 4, 4));
        let mut pool = MaxPooling::new(2, 2);
        pool.bind(&layer.info(), &mut SimpleRng::new(1)).unwrap();
        layer.link_next(&pool.info()).unwrap();

        let mut data = vec![0.0; 16];
        data[5] = 0.8; // (0, 1, 1), window (0, 0)
        data[2] = 0.6; // (0, 0, 2), window (0, 1)
        data[8] = 0.3; // (0, 2, 0), window (1, 0)
        data[15] = 0.9; // (0, 3, 3), window (1, 1)
        let activated = Tensor::from_vec(Shape::new(1, 4, 4), data).unwrap();
        let error =
            Tensor::from_vec(Shape::new(1, 2, 2), vec![1.0, 2.0, 3.0, 4.0]).unwrap();

        let back = layer
            .backward(&activated, &error, None, 0.1)
            .unwrap()
            .unwrap();
        let mut expected = vec![0.0; 16];
        expected[5] = 1.0;
        expected[2] = 2.0;
        expected[8] = 3.0;
        expected[15] = 4.0;
        assert_eq!(back.as_slice(), expected.as_slice());
    }

    #[test]
    fn test_backward_into_mean_pooling_spreads_error() {
        let (mut layer, _) = bound_conv(1, 1, Shape::new(1, 2, 2));
        let mut pool = MeanPooling::new(2, 2);
        pool.bind(&layer.info(), &mut SimpleRng::new(1)).unwrap();
        layer.link_next(&pool.info()).unwrap();

        let activated = Tensor::filled(Shape::new(1, 2, 2), 0.5);
        let error = Tensor::from_vec(Shape::new(1, 1, 1), vec![0.8]).unwrap();
        let back = layer
            .backward(&activated, &error, None, 0.1)
            .unwrap()
            .unwrap();

        for &cell in back.as_slice() {
            assert_relative_eq!(cell, 0.2);
        }
    }

    #[test]
    fn test_backward_into_convolution_uses_full_correlation() {
        let (mut first, _) = bound_conv(1, 1, Shape::new(1, 3, 3));
        let mut second = Convolutional::new(1, 2, 2);
        let mut block = second
            .bind(&first.info(), &mut SimpleRng::new(2))
            .unwrap()
            .unwrap();
        first.link_next(&second.info()).unwrap();
        block.weights_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        // zero activation keeps the tanh derivative at 1
        let activated = Tensor::zeros(Shape::new(1, 3, 3));
        let mut error = Tensor::zeros(Shape::new(1, 2, 2));
        error.set(0, 0, 0, 1.0);
        let back = first
            .backward(&activated, &error, Some(&mut block), 0.1)
            .unwrap()
            .unwrap();

        assert_relative_eq!(back.get(0, 0, 0), 1.0);
        assert_relative_eq!(back.get(0, 0, 1), 2.0);
        assert_relative_eq!(back.get(0, 1, 0), 3.0);
        assert_relative_eq!(back.get(0, 1, 1), 4.0);
        assert_relative_eq!(back.get(0, 2, 2), 0.0);
        // zero activation leaves the weights alone, the bias still moves
        assert_eq!(block.weights(), &[1.0, 2.0, 3.0, 4.0]);
        assert_relative_eq!(block.biases()[0], -0.1);
    }
}
