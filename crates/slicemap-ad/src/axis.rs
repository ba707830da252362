//! Generic-axis adapter
//!
//! Maps a function over the 1-D fibers of an N-D array along any axis by
//! reducing to the column mapper: the chosen axis is moved innermost, so each
//! fiber becomes one contiguous column, and the remaining axes are flattened
//! into the batch. The output is reshaped back with the mapped axis resized to
//! the function's output length.
//!
//! # Examples
//!
//! ```
//! use scirs2_core::ndarray_ext::{ArrayD, IxDyn};
//! use slicemap_ad::slice_map;
//! use slicemap_core::{Scalar, SliceFn};
//!
//! struct Total;
//!
//! impl SliceFn<f64> for Total {
//!     fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
//!         Ok(vec![x.iter().fold(S::constant(0.0), |acc, v| acc + v.clone())])
//!     }
//! }
//!
//! let a = ArrayD::from_shape_fn(IxDyn(&[2, 3, 4]), |ix| (ix[0] + ix[1] + ix[2]) as f64);
//! let (sums, pullback) = slice_map(&Total, &a, 1).unwrap();
//! assert_eq!(sums.shape(), &[2, 1, 4]);
//!
//! let grad = pullback.backward(&ArrayD::ones(IxDyn(&[2, 1, 4]))).unwrap();
//! assert_eq!(grad, ArrayD::<f64>::ones(IxDyn(&[2, 3, 4])));
//! ```

use scirs2_core::ndarray_ext::{ArrayD, ArrayViewD, IxDyn};
use slicemap_core::{Element, Matrix, SliceFn, SliceMapError, SliceMapResult};

use crate::dynamic::{map_cols_with, ColumnPullback};
use crate::hooks::PullbackProvider;
use crate::tape::ReverseTape;

/// Axis permutation moving `axis` innermost
#[derive(Debug, Clone)]
struct AxisLayout {
    /// `order[k]` is the source axis placed at position `k`
    order: Vec<usize>,
    /// Inverse of `order`
    inverse: Vec<usize>,
    /// Extents of the non-mapped axes, in order
    outer: Vec<usize>,
}

impl AxisLayout {
    fn new(shape: &[usize], axis: usize) -> SliceMapResult<Self> {
        let rank = shape.len();
        if axis >= rank {
            return Err(SliceMapError::Axis { axis, rank });
        }

        let mut order: Vec<usize> = (0..rank).filter(|&a| a != axis).collect();
        order.push(axis);

        let mut inverse = vec![0; rank];
        for (position, &source) in order.iter().enumerate() {
            inverse[source] = position;
        }

        let outer = order[..rank - 1].iter().map(|&a| shape[a]).collect();
        Ok(Self {
            order,
            inverse,
            outer,
        })
    }

    fn batch(&self) -> usize {
        self.outer.iter().product()
    }

    /// Gather the fibers of `array` as the columns of a `len × batch` matrix
    fn to_matrix<T: Element>(&self, array: ArrayViewD<'_, T>, len: usize) -> SliceMapResult<Matrix<T>> {
        let permuted = array.permuted_axes(IxDyn(&self.order));
        let data: Vec<T> = permuted.iter().copied().collect();
        Matrix::from_column_major(len, self.batch(), data)
    }

    /// Scatter the columns of `matrix` back into an array with the mapped axis restored
    fn to_array<T: Element>(&self, matrix: Matrix<T>, len: usize) -> SliceMapResult<ArrayD<T>> {
        let mut shape = self.outer.clone();
        shape.push(len);
        let permuted = ArrayD::from_shape_vec(IxDyn(&shape), matrix.into_vec())
            .map_err(|e| SliceMapError::invalid(e.to_string()))?;
        let restored = permuted.permuted_axes(IxDyn(&self.inverse));
        let array = restored.as_standard_layout().into_owned();
        Ok(array)
    }

    fn shape_with(&self, len: usize) -> Vec<usize> {
        let mut shape = vec![0; self.order.len()];
        for (position, &source) in self.order.iter().enumerate() {
            shape[source] = self.outer.get(position).copied().unwrap_or(len);
        }
        shape
    }
}

/// Backward handle of [`slice_map`]
#[derive(Debug)]
pub struct AxisPullback<T> {
    axis: usize,
    layout: AxisLayout,
    output_shape: Vec<usize>,
    columns: ColumnPullback<T>,
}

impl<T: Element> AxisPullback<T> {
    /// Axis the function was mapped along
    pub fn axis(&self) -> usize {
        self.axis
    }

    /// Shape of the forward output (and of the expected upstream gradient)
    pub fn output_shape(&self) -> &[usize] {
        &self.output_shape
    }

    /// Pull an upstream gradient shaped like the forward output back to the input
    pub fn backward(self, grad: &ArrayD<T>) -> SliceMapResult<ArrayD<T>> {
        if grad.shape() != self.output_shape.as_slice() {
            return Err(SliceMapError::GradientShape {
                expected: self.output_shape,
                got: grad.shape().to_vec(),
            });
        }

        let output_len = self.columns.output_dim();
        let input_len = self.columns.input_dim();
        let grad_matrix = self.layout.to_matrix(grad.view(), output_len)?;
        let input_grad = self.columns.backward(&grad_matrix)?;
        self.layout.to_array(input_grad, input_len)
    }
}

/// Differentiable map of `f` over the fibers of `array` along `axis`
///
/// Fails with [`SliceMapError::Axis`] if `axis >= array.ndim()`.
pub fn slice_map<T, F>(
    f: &F,
    array: &ArrayD<T>,
    axis: usize,
) -> SliceMapResult<(ArrayD<T>, AxisPullback<T>)>
where
    T: Element,
    F: SliceFn<T>,
{
    slice_map_with(f, array, axis, &ReverseTape)
}

/// [`slice_map`] with a custom pullback provider
pub fn slice_map_with<T, F, P>(
    f: &F,
    array: &ArrayD<T>,
    axis: usize,
    provider: &P,
) -> SliceMapResult<(ArrayD<T>, AxisPullback<T>)>
where
    T: Element,
    F: SliceFn<T>,
    P: PullbackProvider<T>,
{
    let layout = AxisLayout::new(array.shape(), axis)?;
    let len = array.shape()[axis];
    tracing::debug!(
        axis,
        rank = array.ndim(),
        len,
        batch = layout.batch(),
        "slice_map: mapping along axis"
    );

    let matrix = layout.to_matrix(array.view(), len)?;
    let (output, columns) = map_cols_with(f, &matrix, provider)?;

    let output_len = output.dim();
    let output_shape = layout.shape_with(output_len);
    let result = layout.to_array(output, output_len)?;

    Ok((
        result,
        AxisPullback {
            axis,
            layout,
            output_shape,
            columns,
        },
    ))
}
