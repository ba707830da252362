//! Sequential slice mapper
//!
//! Applies a function to every column in order and writes each result into the
//! matching column of a freshly allocated output matrix. The output row count
//! is fixed by the first column; a later disagreement is a shape error.
//!
//! An empty batch produces a `0 × 0` output without calling the function.

use slicemap_core::{Element, Matrix, SliceMapError, SliceMapResult};

/// Map `f` over the columns of `matrix`
///
/// `f` may carry state (`FnMut`); it is called exactly once per column, in
/// column order, and never after the first error.
///
/// # Errors
///
/// - [`SliceMapError::Shape`] if a column's output length differs from the first
/// - [`SliceMapError::Function`] wrapping any error returned by `f`
///
/// # Examples
///
/// ```
/// use slicemap_core::Matrix;
/// use slicemap_exec::map_columns;
///
/// let m = Matrix::from_column_major(2, 3, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
/// let sums = map_columns(|x: &[f64]| Ok(vec![x.iter().sum()]), &m).unwrap();
/// assert_eq!(sums.as_slice(), &[3.0, 7.0, 11.0]);
/// ```
pub fn map_columns<T, F>(f: F, matrix: &Matrix<T>) -> SliceMapResult<Matrix<T>>
where
    T: Element,
    F: FnMut(&[T]) -> anyhow::Result<Vec<T>>,
{
    tracing::debug!(
        dim = matrix.dim(),
        batch = matrix.batch(),
        "map_columns: sequential dynamic mapping"
    );
    assemble(matrix.batch(), matrix.columns(), f)
}

/// Map `f` over the columns of `matrix`, viewed as fixed-length arrays
///
/// Fails with [`SliceMapError::Dimension`] before calling `f` if `D` differs
/// from the matrix leading dimension.
///
/// # Examples
///
/// ```
/// use slicemap_core::Matrix;
/// use slicemap_exec::map_static_columns;
///
/// let m = Matrix::from_column_major(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// let swapped = map_static_columns(|x: &[f64; 2]| Ok(vec![x[1], x[0]]), &m).unwrap();
/// assert_eq!(swapped.as_slice(), &[2.0, 1.0, 4.0, 3.0]);
/// ```
pub fn map_static_columns<T, F, const D: usize>(
    mut f: F,
    matrix: &Matrix<T>,
) -> SliceMapResult<Matrix<T>>
where
    T: Element,
    F: FnMut(&[T; D]) -> anyhow::Result<Vec<T>>,
{
    let columns = matrix.static_columns::<D>()?;
    tracing::debug!(
        dim = D,
        batch = matrix.batch(),
        "map_static_columns: sequential static mapping"
    );
    assemble(matrix.batch(), columns, |x: &[T; D]| f(x))
}

/// Evaluate `f` on each slice and write the results column by column
fn assemble<T, I, S, F>(batch: usize, slices: I, mut f: F) -> SliceMapResult<Matrix<T>>
where
    T: Element,
    I: Iterator<Item = S>,
    F: FnMut(S) -> anyhow::Result<Vec<T>>,
{
    let mut output: Option<Matrix<T>> = None;

    for (column, slice) in slices.enumerate() {
        let values = f(slice).map_err(|source| SliceMapError::Function { column, source })?;
        let out = output.get_or_insert_with(|| Matrix::zeros(values.len(), batch));
        SliceMapError::check_len(column, out.dim(), values.len())?;
        out.column_mut(column).copy_from_slice(&values);
    }

    Ok(output.unwrap_or_else(|| Matrix::zeros(0, 0)))
}
