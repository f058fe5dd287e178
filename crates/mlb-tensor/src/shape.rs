use std::fmt;

use crate::data::TensorData;
use crate::dtype::Dtype;
use crate::error::Result;

/// A tensor shape, wrapping a vector of dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from a vector of dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Create a shape from a slice of dimensions.
    pub fn from_slice(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    pub fn numel(&self) -> usize {
        self.dims.iter().product()
    }

    /// Returns the size of dimension `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// Returns a reference to the underlying dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Computes row-major contiguous strides for this shape.
    ///
    /// For a shape [d0, d1, d2], the strides are [d1*d2, d2, 1].
    pub fn strides(&self) -> Vec<usize> {
        if self.dims.is_empty() {
            return vec![];
        }
        let mut strides = vec![0usize; self.dims.len()];
        strides[self.dims.len() - 1] = 1;
        for i in (0..self.dims.len() - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}

/// Computes the dimension vector of a nested construction source.
///
/// Descends through first elements only: each nested level contributes its
/// child count, and a numeric-sequence or buffer leaf contributes its element
/// count (for a raw byte buffer, derived from the target dtype's element
/// width) and stops the descent. A bare scalar contributes nothing.
///
/// Sibling lengths are deliberately not verified; ragged input produces a
/// shape that only describes the leftmost spine of the structure.
pub fn infer_shape(data: &TensorData, dtype: Dtype) -> Result<Shape> {
    let mut dims = Vec::new();
    let mut node = data;

    loop {
        match node {
            TensorData::Nested(children) => {
                dims.push(children.len());
                match children.first() {
                    Some(child) => node = child,
                    None => break,
                }
            }
            TensorData::Numbers(values) => {
                dims.push(values.len());
                break;
            }
            TensorData::Buffer(buffer) => {
                dims.push(buffer.element_count(dtype)?);
                break;
            }
            TensorData::Scalar(_) => break,
        }
    }

    Ok(Shape::new(dims))
}
