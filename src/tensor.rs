//! Three-axis tensors used for activations and error signals
//!
//! Every value passed between layers is a [`Tensor`] with axes
//! (depth, width, height). Flat vectors use the degenerate shape (1, 1, N),
//! single-channel grids use (1, W, H).

use crate::error::{Error, Result};
use std::fmt;

/// Dimensions of a [`Tensor`] or of a layer's activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shape {
    pub depth: usize,
    pub width: usize,
    pub height: usize,
}

impl Shape {
    pub fn new(depth: usize, width: usize, height: usize) -> Self {
        Self {
            depth,
            width,
            height,
        }
    }

    /// Shape of a flat vector of `size` values.
    pub fn vector(size: usize) -> Self {
        Self::new(1, 1, size)
    }

    /// Total number of elements.
    pub fn volume(&self) -> usize {
        self.depth * self.width * self.height
    }

    /// Row-major offset of `(d, w, h)`; height varies fastest.
    #[inline]
    pub fn offset(&self, d: usize, w: usize, h: usize) -> usize {
        (d * self.width + w) * self.height + h
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.depth, self.width, self.height)
    }
}

/// Dense rank-3 buffer of `f64` values.
///
/// # Example
///
/// ```
/// use rust_conv_networks::tensor::{Shape, Tensor};
///
/// let mut t = Tensor::zeros(Shape::new(2, 3, 3));
/// t.set(1, 2, 0, 0.5);
/// assert_eq!(t.get(1, 2, 0), 0.5);
/// assert_eq!(t.len(), 18);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f64>,
}

impl Tensor {
    /// Create a tensor filled with zeros.
    pub fn zeros(shape: Shape) -> Self {
        Self::filled(shape, 0.0)
    }

    /// Create a tensor with every element set to `value`.
    pub fn filled(shape: Shape, value: f64) -> Self {
        Self {
            shape,
            data: vec![value; shape.volume()],
        }
    }

    /// Wrap `data` (row-major, height fastest) with the given shape.
    pub fn from_vec(shape: Shape, data: Vec<f64>) -> Result<Self> {
        if data.len() != shape.volume() {
            return Err(Error::ElementCountMismatch {
                shape,
                expected: shape.volume(),
                got: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// Flat vector as a (1, 1, N) tensor.
    pub fn from_vector(values: &[f64]) -> Self {
        Self {
            shape: Shape::vector(values.len()),
            data: values.to_vec(),
        }
    }

    /// Single-channel grid as a (1, W, H) tensor, where `rows[w][h]` is the cell
    /// at width `w` and height `h`. Ragged grids are rejected.
    pub fn from_grid(rows: &[Vec<f64>]) -> Result<Self> {
        let width = rows.len();
        let height = rows.first().map_or(0, Vec::len);
        if let Some((w, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != height) {
            return Err(Error::InvalidDimension(format!(
                "grid row {} has {} cells, expected {}",
                w,
                row.len(),
                height
            )));
        }

        let data = rows.iter().flat_map(|row| row.iter().copied()).collect();
        Ok(Self {
            shape: Shape::new(1, width, height),
            data,
        })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, d: usize, w: usize, h: usize) -> f64 {
        self.data[self.shape.offset(d, w, h)]
    }

    #[inline]
    pub fn set(&mut self, d: usize, w: usize, h: usize, value: f64) {
        let offset = self.shape.offset(d, w, h);
        self.data[offset] = value;
    }

    #[inline]
    pub fn add(&mut self, d: usize, w: usize, h: usize, value: f64) {
        let offset = self.shape.offset(d, w, h);
        self.data[offset] += value;
    }

    /// Elements in row-major order; for vectors this is the natural index.
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Error unless the tensor has exactly `expected` shape.
    pub fn expect_shape(&self, expected: Shape) -> Result<()> {
        if self.shape != expected {
            return Err(Error::ShapeMismatch {
                expected,
                got: self.shape,
            });
        }
        Ok(())
    }
}

impl From<Vec<f64>> for Tensor {
    fn from(values: Vec<f64>) -> Self {
        Self {
            shape: Shape::vector(values.len()),
            data: values,
        }
    }
}
