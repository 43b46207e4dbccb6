//! Parameter blocks connecting adjacent layers
//!
//! A [`ParameterBlock`] holds the weight tensor and bias vector of one edge of
//! the chain. Its layout depends on which kinds of layers the edge connects:
//!
//! | predecessor -> layer        | weights                                   | biases  |
//! |-----------------------------|-------------------------------------------|---------|
//! | Spatial2D -> Convolutional  | (prev depth, depth, kernel w, kernel h)   | depth   |
//! | Spatial2D -> Dense1D        | (prev depth, prev width, prev height, size) | size  |
//! | Dense1D -> Dense1D          | (1, 1, prev size, size)                   | size    |
//!
//! Both dense layouts are a row-major `[fan_in x size]` matrix over the
//! flattened predecessor activation, so they share one code path.

use crate::error::{Error, Result};
use crate::layers::{LayerInfo, LayerKind, ShapeFamily};
use crate::tensor::{Shape, Tensor};
use crate::utils::{tanh_derivative, SimpleRng};

/// How a block maps its predecessor's activation onto its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    /// Valid cross-correlation between feature maps.
    Convolution,
    /// Spatial predecessor flattened into a dense layer.
    Flatten,
    /// Dense predecessor into a dense layer.
    Dense,
}

/// Weights and biases of one edge of the chain.
///
/// Weights are drawn once at construction from a zero-mean Gaussian with
/// standard deviation `1 / sqrt(fan_in)`; biases start at zero. Afterwards
/// they only change through [`update`](ParameterBlock::update).
///
/// # Example
///
/// ```
/// use rust_conv_networks::layers::{LayerInfo, LayerKind};
/// use rust_conv_networks::parameters::{Connection, ParameterBlock};
/// use rust_conv_networks::tensor::Shape;
/// use rust_conv_networks::utils::SimpleRng;
///
/// let prev = LayerInfo { kind: LayerKind::Input1D, shape: Shape::vector(3), kernel: None };
/// let curr = LayerInfo { kind: LayerKind::Output, shape: Shape::vector(2), kernel: None };
/// let block = ParameterBlock::new(&prev, &curr, &mut SimpleRng::new(42)).unwrap();
///
/// assert_eq!(block.connection(), Connection::Dense);
/// assert_eq!(block.dims(), [1, 1, 3, 2]);
/// assert_eq!(block.biases().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterBlock {
    connection: Connection,
    dims: [usize; 4],
    weights: Vec<f64>,
    biases: Vec<f64>,
    input_shape: Shape,
    output_shape: Shape,
    fan_in: usize,
}

impl ParameterBlock {
    /// Allocate and initialize the block for the edge `previous -> current`.
    ///
    /// `current` must already carry its derived shape (convolution output size).
    ///
    /// # Errors
    ///
    /// Fails for pairings without weights (pooling, input layers), for a dense
    /// predecessor feeding a spatial layer, and for an empty fan-in.
    pub fn new(previous: &LayerInfo, current: &LayerInfo, rng: &mut SimpleRng) -> Result<Self> {
        if !current.kind.has_parameters() {
            return Err(Error::InvalidLayer(format!(
                "{} layers carry no parameter block",
                current.kind
            )));
        }

        let prev = previous.shape;
        let curr = current.shape;
        let (connection, dims, fan_in, bias_len) =
            match (previous.kind.family(), current.kind.family()) {
                (ShapeFamily::Spatial2D, ShapeFamily::Spatial2D) => {
                    let kernel = match (current.kind, current.kernel) {
                        (LayerKind::Convolutional, Some(kernel)) => kernel,
                        _ => {
                            return Err(Error::InvalidLayer(format!(
                                "{} layer cannot own a convolution block",
                                current.kind
                            )))
                        }
                    };
                    (
                        Connection::Convolution,
                        [prev.depth, curr.depth, kernel.width, kernel.height],
                        prev.depth * kernel.area(),
                        curr.depth,
                    )
                }
                (ShapeFamily::Spatial2D, ShapeFamily::Dense1D) => (
                    Connection::Flatten,
                    [prev.depth, prev.width, prev.height, curr.volume()],
                    prev.volume(),
                    curr.volume(),
                ),
                (ShapeFamily::Dense1D, ShapeFamily::Dense1D) => (
                    Connection::Dense,
                    [1, 1, prev.volume(), curr.volume()],
                    prev.volume(),
                    curr.volume(),
                ),
                (ShapeFamily::Dense1D, ShapeFamily::Spatial2D) => {
                    return Err(Error::IncompatibleLayers {
                        previous: previous.kind,
                        kind: current.kind,
                    })
                }
            };

        if fan_in == 0 || bias_len == 0 {
            return Err(Error::InvalidDimension(format!(
                "edge {} -> {} has no weights (fan-in {}, outputs {})",
                previous.kind, current.kind, fan_in, bias_len
            )));
        }

        let std_dev = 1.0 / (fan_in as f64).sqrt();
        let weights = (0..dims.iter().product::<usize>())
            .map(|_| rng.gaussian(std_dev))
            .collect();

        Ok(Self {
            connection,
            dims,
            weights,
            biases: vec![0.0; bias_len],
            input_shape: prev,
            output_shape: curr,
            fan_in,
        })
    }

    pub fn connection(&self) -> Connection {
        self.connection
    }

    /// Rank-4 weight dimensions, see the module table.
    pub fn dims(&self) -> [usize; 4] {
        self.dims
    }

    /// Number of inputs contributing to one output unit.
    pub fn fan_in(&self) -> usize {
        self.fan_in
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Mutable access for collaborators that load or probe weights.
    pub fn weights_mut(&mut self) -> &mut [f64] {
        &mut self.weights
    }

    pub fn biases(&self) -> &[f64] {
        &self.biases
    }

    pub fn biases_mut(&mut self) -> &mut [f64] {
        &mut self.biases
    }

    /// Shape of the activation feeding this edge.
    pub fn input_shape(&self) -> Shape {
        self.input_shape
    }

    /// Shape of the activation this edge produces.
    pub fn output_shape(&self) -> Shape {
        self.output_shape
    }

    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Weight at rank-4 index `(a, b, c, d)`.
    pub fn weight(&self, a: usize, b: usize, c: usize, d: usize) -> f64 {
        self.weights[self.weight_offset(a, b, c, d)]
    }

    #[inline]
    fn weight_offset(&self, a: usize, b: usize, c: usize, d: usize) -> usize {
        ((a * self.dims[1] + b) * self.dims[2] + c) * self.dims[3] + d
    }

    /// Bias plus weighted input for every output unit, before activation.
    pub fn weighted_input(&self, input: &Tensor) -> Result<Tensor> {
        input.expect_shape(self.input_shape)?;
        Ok(match self.connection {
            Connection::Dense | Connection::Flatten => self.dense_sum(input),
            Connection::Convolution => self.correlate(input),
        })
    }

    fn dense_sum(&self, input: &Tensor) -> Tensor {
        let size = self.dims[3];
        let mut out = self.biases.clone();
        for (row, &x) in self.weights.chunks_exact(size).zip(input.as_slice()) {
            for (sum, &w) in out.iter_mut().zip(row) {
                *sum += w * x;
            }
        }
        Tensor::from(out)
    }

    fn correlate(&self, input: &Tensor) -> Tensor {
        let [prev_depth, depth, kernel_w, kernel_h] = self.dims;
        let out_shape = self.output_shape;
        let mut out = Tensor::zeros(out_shape);

        for d in 0..depth {
            for m in 0..out_shape.width {
                for n in 0..out_shape.height {
                    let mut sum = self.biases[d];
                    for pd in 0..prev_depth {
                        for i in 0..kernel_w {
                            for j in 0..kernel_h {
                                sum += input.get(pd, i + m, j + n) * self.weight(pd, d, i, j);
                            }
                        }
                    }
                    out.set(d, m, n, sum);
                }
            }
        }
        out
    }

    /// Error for the predecessor of this edge.
    ///
    /// `activated` is the predecessor's output and `error` the error at this
    /// edge's layer. The result is scaled by the tanh derivative of
    /// `activated`.
    pub fn propagate_error(&self, activated: &Tensor, error: &Tensor) -> Result<Tensor> {
        activated.expect_shape(self.input_shape)?;
        error.expect_shape(self.output_shape)?;

        let mut back = Tensor::zeros(self.input_shape);
        match self.connection {
            Connection::Dense | Connection::Flatten => {
                let size = self.dims[3];
                let rows = self.weights.chunks_exact(size);
                let cells = back.as_mut_slice().iter_mut().zip(activated.as_slice());
                for ((cell, &a), row) in cells.zip(rows) {
                    let sum: f64 = row.iter().zip(error.as_slice()).map(|(w, e)| w * e).sum();
                    *cell = sum * tanh_derivative(a);
                }
            }
            Connection::Convolution => {
                let [prev_depth, depth, kernel_w, kernel_h] = self.dims;
                let out = self.output_shape;
                for d in 0..prev_depth {
                    for i in 0..kernel_w {
                        for j in 0..kernel_h {
                            for nd in 0..depth {
                                let w = self.weight(d, nd, i, j);
                                for m in 0..out.width {
                                    for n in 0..out.height {
                                        let a = activated.get(d, i + m, j + n);
                                        back.add(
                                            d,
                                            i + m,
                                            j + n,
                                            w * error.get(nd, m, n) * tanh_derivative(a),
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(back)
    }

    /// Plain SGD step for this edge.
    ///
    /// `weight -= learning_rate * activation * error` and
    /// `bias -= learning_rate * error`; convolution edges sum both over every
    /// output position that shares the weight.
    pub fn update(&mut self, activation: &Tensor, error: &Tensor, learning_rate: f64) -> Result<()> {
        activation.expect_shape(self.input_shape)?;
        error.expect_shape(self.output_shape)?;

        match self.connection {
            Connection::Dense | Connection::Flatten => {
                let size = self.dims[3];
                let rows = self.weights.chunks_exact_mut(size);
                for (row, &a) in rows.zip(activation.as_slice()) {
                    for (w, &e) in row.iter_mut().zip(error.as_slice()) {
                        *w -= learning_rate * a * e;
                    }
                }
                for (b, &e) in self.biases.iter_mut().zip(error.as_slice()) {
                    *b -= learning_rate * e;
                }
            }
            Connection::Convolution => {
                let [prev_depth, depth, kernel_w, kernel_h] = self.dims;
                let out = self.output_shape;
                for d in 0..prev_depth {
                    for nd in 0..depth {
                        for i in 0..kernel_w {
                            for j in 0..kernel_h {
                                let mut gradient = 0.0;
                                for m in 0..out.width {
                                    for n in 0..out.height {
                                        gradient += error.get(nd, m, n) * activation.get(d, i + m, j + n);
                                    }
                                }
                                let offset = self.weight_offset(d, nd, i, j);
                                self.weights[offset] -= learning_rate * gradient;
                            }
                        }
                    }
                }
                for (nd, b) in self.biases.iter_mut().enumerate() {
                    let mut gradient = 0.0;
                    for m in 0..out.width {
                        for n in 0..out.height {
                            gradient += error.get(nd, m, n);
                        }
                    }
                    *b -= learning_rate * gradient;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::Kernel;
    use approx::assert_relative_eq;

    fn info(kind: LayerKind, shape: Shape, kernel: Option<Kernel>) -> LayerInfo {
        LayerInfo {
            kind,
            shape,
            kernel,
        }
    }

    fn dense_block(prev: usize, size: usize) -> ParameterBlock {
        let mut rng = SimpleRng::new(7);
        ParameterBlock::new(
            &info(LayerKind::Input1D, Shape::vector(prev), None),
            &info(LayerKind::Output, Shape::vector(size), None),
            &mut rng,
        )
        .unwrap()
    }

    #[test]
    fn test_convolution_block_shape() {
        let mut rng = SimpleRng::new(42);
        let block = ParameterBlock::new(
            &info(LayerKind::Input2D, Shape::new(3, 8, 8), None),
            &info(
                LayerKind::Convolutional,
                Shape::new(4, 6, 5),
                Some(Kernel::new(3, 4)),
            ),
            &mut rng,
        )
        .unwrap();

        assert_eq!(block.connection(), Connection::Convolution);
        assert_eq!(block.dims(), [3, 4, 3, 4]);
        assert_eq!(block.biases().len(), 4);
        assert_eq!(block.fan_in(), 3 * 3 * 4);
        assert_eq!(block.parameter_count(), 3 * 4 * 3 * 4 + 4);
    }

    #[test]
    fn test_flatten_block_shape() {
        let mut rng = SimpleRng::new(42);
        let block = ParameterBlock::new(
            &info(LayerKind::MaxPooling, Shape::new(2, 3, 3), Some(Kernel::new(2, 2))),
            &info(LayerKind::FullyConnected, Shape::vector(5), None),
            &mut rng,
        )
        .unwrap();

        assert_eq!(block.connection(), Connection::Flatten);
        assert_eq!(block.dims(), [2, 3, 3, 5]);
        assert_eq!(block.biases().len(), 5);
        assert_eq!(block.fan_in(), 18);
    }

    #[test]
    fn test_dense_to_spatial_is_rejected() {
        let mut rng = SimpleRng::new(42);
        let err = ParameterBlock::new(
            &info(LayerKind::FullyConnected, Shape::vector(4), None),
            &info(
                LayerKind::Convolutional,
                Shape::new(1, 1, 1),
                Some(Kernel::new(1, 1)),
            ),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, Error::IncompatibleLayers { .. }));
    }

    #[test]
    fn test_pooling_has_no_block() {
        let mut rng = SimpleRng::new(42);
        let err = ParameterBlock::new(
            &info(LayerKind::Input2D, Shape::new(1, 4, 4), None),
            &info(LayerKind::MaxPooling, Shape::new(1, 2, 2), Some(Kernel::new(2, 2))),
            &mut rng,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidLayer(_)));
    }

    #[test]
    fn test_biases_start_at_zero() {
        let block = dense_block(10, 6);
        assert!(block.biases().iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_dense_weighted_input() {
        let mut block = dense_block(2, 2);
        // rows are inputs, columns outputs
        block.weights_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);
        block.biases_mut().copy_from_slice(&[0.5, -0.5]);

        let out = block.weighted_input(&Tensor::from_vector(&[1.0, -1.0])).unwrap();
        assert_relative_eq!(out.as_slice()[0], 0.5 + 1.0 - 3.0);
        assert_relative_eq!(out.as_slice()[1], -0.5 + 2.0 - 4.0);
    }

    #[test]
    fn test_weighted_input_rejects_wrong_shape() {
        let block = dense_block(3, 2);
        let err = block
            .weighted_input(&Tensor::from_vector(&[1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_dense_update_rule() {
        let mut block = dense_block(2, 1);
        block.weights_mut().copy_from_slice(&[0.2, -0.4]);

        let activation = Tensor::from_vector(&[0.5, -1.0]);
        let error = Tensor::from_vector(&[0.1]);
        block.update(&activation, &error, 0.5).unwrap();

        assert_relative_eq!(block.weights()[0], 0.2 - 0.5 * 0.5 * 0.1);
        assert_relative_eq!(block.weights()[1], -0.4 - 0.5 * -1.0 * 0.1);
        assert_relative_eq!(block.biases()[0], -0.05);
    }

    #[test]
    fn test_dense_propagate_error_applies_tanh_derivative() {
        let mut block = dense_block(2, 2);
        block.weights_mut().copy_from_slice(&[1.0, 2.0, 3.0, 4.0]);

        let activated = Tensor::from_vector(&[0.5, 0.0]);
        let error = Tensor::from_vector(&[1.0, -1.0]);
        let back = block.propagate_error(&activated, &error).unwrap();

        assert_relative_eq!(back.as_slice()[0], (1.0 - 2.0) * 0.75);
        assert_relative_eq!(back.as_slice()[1], 3.0 - 4.0);
    }

    #[test]
    fn test_convolution_known_values() {
        let mut rng = SimpleRng::new(1);
        let mut block = ParameterBlock::new(
            &info(LayerKind::Input2D, Shape::new(1, 3, 3), None),
            &info(
                LayerKind::Convolutional,
                Shape::new(1, 2, 2),
                Some(Kernel::new(2, 2)),
            ),
            &mut rng,
        )
        .unwrap();
        block.weights_mut().copy_from_slice(&[1.0, 0.0, 0.0, 1.0]);
        block.biases_mut()[0] = 0.25;

        let input = Tensor::from_vec(
            Shape::new(1, 3, 3),
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
        )
        .unwrap();
        let out = block.weighted_input(&input).unwrap();

        // kernel picks the main diagonal of each 2x2 window
        assert_relative_eq!(out.get(0, 0, 0), 0.25 + 1.0 + 5.0);
        assert_relative_eq!(out.get(0, 0, 1), 0.25 + 2.0 + 6.0);
        assert_relative_eq!(out.get(0, 1, 0), 0.25 + 4.0 + 8.0);
        assert_relative_eq!(out.get(0, 1, 1), 0.25 + 5.0 + 9.0);
    }
}
