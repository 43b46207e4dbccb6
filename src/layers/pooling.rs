//! Max and mean pooling layers
//!
//! Pooling layers downsample each feature map with non-overlapping windows
//! (stride equals the kernel size). Trailing rows or columns that do not fill
//! a whole window are dropped. Pooling owns no parameters, so the edge into a
//! pooling layer has no [`ParameterBlock`].

use crate::error::{Error, Result};
use crate::layers::{
    backward_spatial, check_pairing, link_once, unbound, unlinked, Kernel, Layer, LayerInfo,
    LayerKind,
};
use crate::parameters::ParameterBlock;
use crate::tensor::{Shape, Tensor};
use crate::utils::SimpleRng;

/// Window maximum, keeping the first maximum in scan order.
#[derive(Debug, Clone)]
pub struct MaxPooling {
    core: PoolingCore,
}

/// Window average.
#[derive(Debug, Clone)]
pub struct MeanPooling {
    core: PoolingCore,
}

impl MaxPooling {
    pub fn new(kernel_width: usize, kernel_height: usize) -> Self {
        Self {
            core: PoolingCore::new(kernel_width, kernel_height),
        }
    }
}

impl MeanPooling {
    pub fn new(kernel_width: usize, kernel_height: usize) -> Self {
        Self {
            core: PoolingCore::new(kernel_width, kernel_height),
        }
    }
}

#[derive(Debug, Clone)]
struct PoolingCore {
    kernel: Kernel,
    shape: Shape,
    previous: Option<LayerInfo>,
    next: Option<LayerInfo>,
}

impl PoolingCore {
    fn new(kernel_width: usize, kernel_height: usize) -> Self {
        Self {
            kernel: Kernel::new(kernel_width, kernel_height),
            shape: Shape::new(0, 0, 0),
            previous: None,
            next: None,
        }
    }

    fn bind(&mut self, kind: LayerKind, previous: &LayerInfo) -> Result<Option<ParameterBlock>> {
        if self.previous.is_some() {
            return Err(Error::AlreadyBound(kind));
        }
        check_pairing(previous, kind)?;
        self.shape = pooled_shape(previous.shape, self.kernel)?;
        self.previous = Some(*previous);
        Ok(None)
    }

    fn link_next(&mut self, kind: LayerKind, next: &LayerInfo) -> Result<()> {
        if !next.kind.can_follow(kind) {
            return Err(Error::IncompatibleLayers {
                previous: kind,
                kind: next.kind,
            });
        }
        link_once(&mut self.next, kind, next)
    }

    fn check_input(&self, kind: LayerKind, input: &Tensor) -> Result<()> {
        let previous = self.previous.as_ref().ok_or_else(|| unbound(kind))?;
        input.expect_shape(previous.shape)
    }

    fn backward(
        &self,
        kind: LayerKind,
        activated: &Tensor,
        error: &Tensor,
        downstream: Option<&mut ParameterBlock>,
        learning_rate: f64,
    ) -> Result<Option<Tensor>> {
        let next = self.next.as_ref().ok_or_else(|| unlinked(kind))?;
        backward_spatial(kind, activated, error, next, downstream, learning_rate).map(Some)
    }
}

/// Output shape of pooling `input` with `kernel`: `input / kernel` per axis.
pub fn pooled_shape(input: Shape, kernel: Kernel) -> Result<Shape> {
    if kernel.width == 0 || kernel.height == 0 {
        return Err(Error::InvalidDimension(
            "pooling kernel must be at least 1x1".to_string(),
        ));
    }
    if kernel.width > input.width || kernel.height > input.height {
        return Err(Error::InvalidDimension(format!(
            "pooling kernel {}x{} larger than input {}",
            kernel.width, kernel.height, input
        )));
    }
    Ok(Shape::new(
        input.depth,
        input.width / kernel.width,
        input.height / kernel.height,
    ))
}

/// Position of the largest value in the window of pooled cell `(i, j)`.
///
/// Uses strict `>` so the first maximum in scan order wins.
pub fn window_max(input: &Tensor, d: usize, i: usize, j: usize, kernel: Kernel) -> (usize, usize) {
    let mut best = (i * kernel.width, j * kernel.height);
    for m in 0..kernel.width {
        for n in 0..kernel.height {
            let (w, h) = (i * kernel.width + m, j * kernel.height + n);
            if input.get(d, w, h) > input.get(d, best.0, best.1) {
                best = (w, h);
            }
        }
    }
    best
}

/// Error for the layer feeding a max-pooling layer: each pooled cell's error
/// goes unchanged to its window maximum, every other cell receives zero.
pub fn route_max(activated: &Tensor, error: &Tensor, kernel: Kernel) -> Result<Tensor> {
    let pooled = pooled_shape(activated.shape(), kernel)?;
    error.expect_shape(pooled)?;

    let mut back = Tensor::zeros(activated.shape());
    for d in 0..pooled.depth {
        for i in 0..pooled.width {
            for j in 0..pooled.height {
                let (w, h) = window_max(activated, d, i, j, kernel);
                back.set(d, w, h, error.get(d, i, j));
            }
        }
    }
    Ok(back)
}

/// Error for the layer feeding a mean-pooling layer: each pooled cell's error
/// is split evenly across its window.
pub fn distribute_mean(input_shape: Shape, error: &Tensor, kernel: Kernel) -> Result<Tensor> {
    let pooled = pooled_shape(input_shape, kernel)?;
    error.expect_shape(pooled)?;

    let area = kernel.area() as f64;
    let mut back = Tensor::zeros(input_shape);
    for d in 0..pooled.depth {
        for i in 0..pooled.width {
            for j in 0..pooled.height {
                let share = error.get(d, i, j) / area;
                for m in 0..kernel.width {
                    for n in 0..kernel.height {
                        back.set(d, i * kernel.width + m, j * kernel.height + n, share);
                    }
                }
            }
        }
    }
    Ok(back)
}

impl Layer for MaxPooling {
    fn kind(&self) -> LayerKind {
        LayerKind::MaxPooling
    }

    fn shape(&self) -> Shape {
        self.core.shape
    }

    fn kernel(&self) -> Option<Kernel> {
        Some(self.core.kernel)
    }

    fn bind(&mut self, previous: &LayerInfo, _rng: &mut SimpleRng) -> Result<Option<ParameterBlock>> {
        self.core.bind(LayerKind::MaxPooling, previous)
    }

    fn link_next(&mut self, next: &LayerInfo) -> Result<()> {
        self.core.link_next(LayerKind::MaxPooling, next)
    }

    fn forward(&self, input: &Tensor, _parameters: Option<&ParameterBlock>) -> Result<Tensor> {
        self.core.check_input(self.kind(), input)?;
        let shape = self.core.shape;
        let kernel = self.core.kernel;

        let mut output = Tensor::zeros(shape);
        for d in 0..shape.depth {
            for i in 0..shape.width {
                for j in 0..shape.height {
                    let (w, h) = window_max(input, d, i, j, kernel);
                    output.set(d, i, j, input.get(d, w, h));
                }
            }
        }
        Ok(output)
    }

    fn backward(
        &self,
        activated: &Tensor,
        error: &Tensor,
        downstream: Option<&mut ParameterBlock>,
        learning_rate: f64,
    ) -> Result<Option<Tensor>> {
        self.core
            .backward(self.kind(), activated, error, downstream, learning_rate)
    }
}

impl Layer for MeanPooling {
    fn kind(&self) -> LayerKind {
        LayerKind::MeanPooling
    }

    fn shape(&self) -> Shape {
        self.core.shape
    }

    fn kernel(&self) -> Option<Kernel> {
        Some(self.core.kernel)
    }

    fn bind(&mut self, previous: &LayerInfo, _rng: &mut SimpleRng) -> Result<Option<ParameterBlock>> {
        self.core.bind(LayerKind::MeanPooling, previous)
    }

    fn link_next(&mut self, next: &LayerInfo) -> Result<()> {
        self.core.link_next(LayerKind::MeanPooling, next)
    }

    fn forward(&self, input: &Tensor, _parameters: Option<&ParameterBlock>) -> Result<Tensor> {
        self.core.check_input(self.kind(), input)?;
        let shape = self.core.shape;
        let kernel = self.core.kernel;
        let area = kernel.area() as f64;

        let mut output = Tensor::zeros(shape);
        for d in 0..shape.depth {
            for i in 0..shape.width {
                for j in 0..shape.height {
                    let mut sum = 0.0;
                    for m in 0..kernel.width {
                        for n in 0..kernel.height {
                            sum += input.get(d, i * kernel.width + m, j * kernel.height + n);
                        }
                    }
                    output.set(d, i, j, sum / area);
                }
            }
        }
        Ok(output)
    }

    fn backward(
        &self,
        activated: &Tensor,
        error: &Tensor,
        downstream: Option<&mut ParameterBlock>,
        learning_rate: f64,
    ) -> Result<Option<Tensor>> {
        self.core
            .backward(self.kind(), activated, error, downstream, learning_rate)
    }
}
