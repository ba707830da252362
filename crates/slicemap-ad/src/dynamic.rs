//! Differentiable column mapping with per-slice pullbacks
//!
//! The forward pass obtains `(value, rule)` for every column from a
//! [`PullbackProvider`] and keeps the rules as [`GradientRecord`]s inside the
//! returned [`ColumnPullback`]. The backward pass feeds column `i` of the
//! upstream gradient to rule `i` and assembles the input gradient.
//!
//! # Examples
//!
//! ```
//! use slicemap_ad::map_cols;
//! use slicemap_core::{Matrix, Scalar, SliceFn};
//!
//! struct SumOfSquares;
//!
//! impl SliceFn<f64> for SumOfSquares {
//!     fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
//!         let total = x
//!             .iter()
//!             .fold(S::constant(0.0), |acc, v| acc + v.clone() * v.clone());
//!         Ok(vec![total])
//!     }
//! }
//!
//! let m = Matrix::from_column_major(3, 4, (1..=12).map(f64::from).collect()).unwrap();
//! let (y, pullback) = map_cols(&SumOfSquares, &m).unwrap();
//! assert_eq!(y.as_slice(), &[14.0, 77.0, 194.0, 365.0]);
//!
//! let grad = pullback.backward(&Matrix::from_fn(1, 4, |_, _| 1.0)).unwrap();
//! let twice: Vec<f64> = m.as_slice().iter().map(|v| 2.0 * v).collect();
//! assert_eq!(grad.as_slice(), twice.as_slice());
//! ```

use std::fmt;

use slicemap_core::{Element, Matrix, SliceFn, SliceMapError, SliceMapResult};
use slicemap_exec::map_columns;

use crate::hooks::{BackwardRule, PullbackProvider, Recorder, SliceRule, Tracked};
use crate::tape::ReverseTape;

/// Backward rule of one column, recorded during the forward pass
pub struct GradientRecord<T> {
    /// Column the rule belongs to
    pub column: usize,
    rule: SliceRule<T>,
}

impl<T> fmt::Debug for GradientRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GradientRecord")
            .field("column", &self.column)
            .finish_non_exhaustive()
    }
}

/// Backward handle of a dynamic mapping
///
/// Owns one [`GradientRecord`] per column. The records are released when
/// [`backward`](Self::backward) consumes the handle, or when it is dropped.
#[derive(Debug)]
pub struct ColumnPullback<T> {
    input_dim: usize,
    output_dim: usize,
    records: Vec<GradientRecord<T>>,
}

impl<T: Element> ColumnPullback<T> {
    /// Slice length `d` of the forward input
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Slice length `e` of the forward output
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Number of columns
    pub fn batch(&self) -> usize {
        self.records.len()
    }

    /// Pull the upstream gradient `grad` (`e × batch`) back to the input (`d × batch`)
    ///
    /// # Errors
    ///
    /// - [`SliceMapError::GradientShape`] if `grad` is not `e × batch`
    /// - [`SliceMapError::Function`] if a column rule fails
    /// - [`SliceMapError::Shape`] if a column rule returns the wrong length
    pub fn backward(self, grad: &Matrix<T>) -> SliceMapResult<Matrix<T>> {
        let expected = (self.output_dim, self.batch());
        if grad.shape() != expected {
            return Err(SliceMapError::GradientShape {
                expected: vec![expected.0, expected.1],
                got: vec![grad.dim(), grad.batch()],
            });
        }

        tracing::debug!(
            input_dim = self.input_dim,
            output_dim = self.output_dim,
            batch = self.batch(),
            "map_cols: backward"
        );

        let mut input_grad = Matrix::zeros(self.input_dim, self.batch());
        for record in self.records.into_iter().rev() {
            let column = record.column;
            let dx = (record.rule)(grad.column(column))
                .map_err(|source| SliceMapError::Function { column, source })?;
            SliceMapError::check_len(column, self.input_dim, dx.len())?;
            input_grad.column_mut(column).copy_from_slice(&dx);
        }

        Ok(input_grad)
    }
}

impl<T: Element> BackwardRule<T> for ColumnPullback<T> {
    fn backward(self: Box<Self>, grad: &Matrix<T>) -> SliceMapResult<Matrix<T>> {
        (*self).backward(grad)
    }

    fn name(&self) -> &str {
        "map_cols"
    }
}

/// Differentiable map of `f` over the columns of `matrix`
///
/// Uses the bundled reverse-mode tape. See [`map_cols_with`].
pub fn map_cols<T, F>(f: &F, matrix: &Matrix<T>) -> SliceMapResult<(Matrix<T>, ColumnPullback<T>)>
where
    T: Element,
    F: SliceFn<T>,
{
    map_cols_with(f, matrix, &ReverseTape)
}

/// Differentiable map of `f` over the columns of `matrix` using `provider`
///
/// The output has the sequential mapper's semantics: column `i` is
/// `f(column_i)`, the first column fixes the output length.
pub fn map_cols_with<T, F, P>(
    f: &F,
    matrix: &Matrix<T>,
    provider: &P,
) -> SliceMapResult<(Matrix<T>, ColumnPullback<T>)>
where
    T: Element,
    F: SliceFn<T>,
    P: PullbackProvider<T>,
{
    let mut records = Vec::with_capacity(matrix.batch());
    let output = map_columns(
        |x: &[T]| {
            let (value, rule) = provider.pullback(f, x)?;
            records.push(GradientRecord {
                column: records.len(),
                rule,
            });
            Ok(value)
        },
        matrix,
    )?;

    let pullback = ColumnPullback {
        input_dim: matrix.dim(),
        output_dim: output.dim(),
        records,
    };
    Ok((output, pullback))
}

/// Differentiable map registered with an external recorder
///
/// The whole mapping becomes one operation whose backward rule is the
/// [`ColumnPullback`].
pub fn map_cols_recorded<T, F, P, R>(
    f: &F,
    matrix: &Matrix<T>,
    provider: &P,
    recorder: &mut R,
) -> SliceMapResult<Tracked<T>>
where
    T: Element,
    F: SliceFn<T>,
    P: PullbackProvider<T>,
    R: Recorder<T>,
{
    let (output, pullback) = map_cols_with(f, matrix, provider)?;
    Ok(recorder.record(output, Box::new(pullback)))
}
