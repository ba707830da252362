//! Column-major matrix type
//!
//! A [`Matrix`] has shape `(dim × batch)`: `dim` is the slice length and
//! `batch` the number of slices. Storage is column-major, so every column is
//! one contiguous run of `dim` elements. This is what lets the static slice
//! extractor reinterpret a column as a `&[T; D]` without copying.

use scirs2_core::ndarray_ext::{Array2, ArrayView1, ArrayView2};
use std::ops::{Index, IndexMut};

use crate::error::{SliceMapError, SliceMapResult};
use crate::slices::{Columns, StaticColumns};
use crate::types::Element;

/// Dense column-major matrix
///
/// # Examples
///
/// ```
/// use slicemap_core::Matrix;
///
/// // 3 × 4 matrix holding 1..=12 column by column
/// let m = Matrix::from_column_major(3, 4, (1..=12).map(f64::from).collect()).unwrap();
/// assert_eq!(m.shape(), (3, 4));
/// assert_eq!(m.column(1), &[4.0, 5.0, 6.0]);
/// assert_eq!(m[(2, 3)], 12.0);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix<T> {
    /// Column-major buffer of `dim * batch` elements
    pub(crate) data: Vec<T>,
    pub(crate) dim: usize,
    pub(crate) batch: usize,
}

impl<T: Element> Matrix<T> {
    /// Create a `dim × batch` matrix of zeros
    pub fn zeros(dim: usize, batch: usize) -> Self {
        Self {
            data: vec![T::zero(); dim * batch],
            dim,
            batch,
        }
    }

    /// Create a matrix from a column-major buffer
    ///
    /// Fails if `data.len() != dim * batch`.
    pub fn from_column_major(dim: usize, batch: usize, data: Vec<T>) -> SliceMapResult<Self> {
        if data.len() != dim * batch {
            return Err(SliceMapError::invalid(format!(
                "shape ({dim} × {batch}) requires {} elements, but got {}",
                dim * batch,
                data.len()
            )));
        }
        Ok(Self { data, dim, batch })
    }

    /// Create a matrix whose column `i` is `columns[i]`
    ///
    /// All columns must have the same length. An empty input yields a `0 × 0` matrix.
    pub fn from_columns(columns: &[Vec<T>]) -> SliceMapResult<Self> {
        let dim = columns.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(dim * columns.len());
        for (index, column) in columns.iter().enumerate() {
            SliceMapError::check_len(index, dim, column.len())?;
            data.extend_from_slice(column);
        }
        Ok(Self {
            data,
            dim,
            batch: columns.len(),
        })
    }

    /// Create a matrix by evaluating `f(row, col)` for every element
    pub fn from_fn<F>(dim: usize, batch: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> T,
    {
        let mut data = Vec::with_capacity(dim * batch);
        for col in 0..batch {
            for row in 0..dim {
                data.push(f(row, col));
            }
        }
        Self { data, dim, batch }
    }

    /// Copy a `dim × batch` ndarray view (any memory layout) into a matrix
    pub fn from_array(array: ArrayView2<'_, T>) -> Self {
        let (dim, batch) = array.dim();
        Self::from_fn(dim, batch, |row, col| array[[row, col]])
    }

    /// Leading dimension (slice length)
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of columns (batch count)
    pub fn batch(&self) -> usize {
        self.batch
    }

    /// `(dim, batch)`
    pub fn shape(&self) -> (usize, usize) {
        (self.dim, self.batch)
    }

    /// Total number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the matrix holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Column `col` as a contiguous slice
    ///
    /// # Panics
    ///
    /// Panics if `col >= batch`.
    pub fn column(&self, col: usize) -> &[T] {
        assert!(col < self.batch, "column {col} out of range ({})", self.batch);
        &self.data[col * self.dim..(col + 1) * self.dim]
    }

    /// Mutable column `col`
    ///
    /// # Panics
    ///
    /// Panics if `col >= batch`.
    pub fn column_mut(&mut self, col: usize) -> &mut [T] {
        assert!(col < self.batch, "column {col} out of range ({})", self.batch);
        &mut self.data[col * self.dim..(col + 1) * self.dim]
    }

    /// Column `col`, or `None` when out of range
    pub fn get_column(&self, col: usize) -> Option<&[T]> {
        (col < self.batch).then(|| self.column(col))
    }

    /// Column `col` as an ndarray view
    pub fn column_view(&self, col: usize) -> ArrayView1<'_, T> {
        ArrayView1::from(self.column(col))
    }

    /// Element at `(row, col)`, or `None` when out of range
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row < self.dim && col < self.batch {
            self.data.get(col * self.dim + row)
        } else {
            None
        }
    }

    /// Column-major buffer
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable column-major buffer
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Consume the matrix and return its column-major buffer
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Copy into a `dim × batch` ndarray
    pub fn to_array(&self) -> Array2<T> {
        Array2::from_shape_fn((self.dim, self.batch), |(row, col)| {
            self.data[col * self.dim + row]
        })
    }

    /// Lazy sequence of dynamic column views
    pub fn columns(&self) -> Columns<'_, T> {
        Columns::new(&self.data, self.dim, self.batch)
    }

    /// Lazy sequence of columns reinterpreted as `&[T; D]`
    ///
    /// Fails with [`SliceMapError::Dimension`] unless `D == dim`.
    pub fn static_columns<const D: usize>(&self) -> SliceMapResult<StaticColumns<'_, T, D>> {
        if D != self.dim {
            return Err(SliceMapError::Dimension {
                expected: D,
                got: self.dim,
            });
        }
        Ok(StaticColumns::new(&self.data, self.batch))
    }

    /// Largest element-wise absolute difference, or `None` if the shapes differ
    pub fn max_abs_diff(&self, other: &Matrix<T>) -> Option<T> {
        if self.shape() != other.shape() {
            return None;
        }
        Some(
            self.data
                .iter()
                .zip(&other.data)
                .fold(T::zero(), |acc, (a, b)| acc.max((*a - *b).abs())),
        )
    }

    /// Check whether both matrices have the same shape and agree within `tol`
    pub fn approx_eq(&self, other: &Matrix<T>, tol: T) -> bool {
        self.max_abs_diff(other).is_some_and(|diff| diff <= tol)
    }
}

impl<T: Element> Index<(usize, usize)> for Matrix<T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &T {
        assert!(
            row < self.dim && col < self.batch,
            "index ({row}, {col}) out of range for shape ({}, {})",
            self.dim,
            self.batch
        );
        &self.data[col * self.dim + row]
    }
}

impl<T: Element> IndexMut<(usize, usize)> for Matrix<T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut T {
        assert!(
            row < self.dim && col < self.batch,
            "index ({row}, {col}) out of range for shape ({}, {})",
            self.dim,
            self.batch
        );
        &mut self.data[col * self.dim + row]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scirs2_core::ndarray_ext::array;

    fn sample() -> Matrix<f64> {
        Matrix::from_column_major(3, 4, (1..=12).map(f64::from).collect()).unwrap()
    }

    #[test]
    fn test_column_major_layout() {
        let m = sample();
        assert_eq!(m.shape(), (3, 4));
        assert_eq!(m.column(0), &[1.0, 2.0, 3.0]);
        assert_eq!(m.column(3), &[10.0, 11.0, 12.0]);
        assert_eq!(m[(1, 2)], 8.0);
        assert_eq!(m.get(3, 0), None);
        assert_eq!(m.get_column(4), None);
    }

    #[test]
    fn test_from_column_major_length_check() {
        let result = Matrix::<f64>::from_column_major(3, 4, vec![0.0; 11]);
        assert!(matches!(result, Err(SliceMapError::InvalidArgument(_))));
    }

    #[test]
    fn test_from_columns() {
        let m = Matrix::from_columns(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]]).unwrap();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

        let ragged = Matrix::from_columns(&[vec![1.0, 2.0], vec![3.0]]);
        assert!(matches!(
            ragged,
            Err(SliceMapError::Shape {
                index: 1,
                expected: 2,
                got: 1
            })
        ));

        let empty = Matrix::<f64>::from_columns(&[]).unwrap();
        assert_eq!(empty.shape(), (0, 0));
    }

    #[test]
    fn test_from_array_round_trip() {
        let a = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let m = Matrix::from_array(a.view());
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.column(1), &[2.0, 5.0]);
        assert_eq!(m.to_array(), a);
    }

    #[test]
    fn test_from_array_transposed_view() {
        let a = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let m = Matrix::from_array(a.t());
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m.column(2), &[5.0, 6.0]);
    }

    #[test]
    fn test_column_mut_and_index_mut() {
        let mut m = Matrix::<f64>::zeros(2, 2);
        m.column_mut(1).copy_from_slice(&[7.0, 8.0]);
        m[(0, 0)] = 1.0;
        assert_eq!(m.as_slice(), &[1.0, 0.0, 7.0, 8.0]);
    }

    #[test]
    fn test_approx_eq() {
        let a = sample();
        let mut b = sample();
        b[(0, 0)] += 1e-12;
        assert!(a.approx_eq(&b, 1e-10));
        assert!(!a.approx_eq(&Matrix::zeros(3, 3), 1.0));
    }

    #[test]
    fn test_column_view() {
        let m = sample();
        let v = m.column_view(2);
        assert_eq!(v.len(), 3);
        assert_eq!(v[0], 7.0);
    }

    #[test]
    #[should_panic]
    fn test_column_out_of_range_panics() {
        let m = sample();
        let _ = m.column(4);
    }
}
