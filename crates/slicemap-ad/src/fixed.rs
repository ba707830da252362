//! Differentiable column mapping over fixed-length slices
//!
//! The forward pass is the static mapper with plain elements. Nothing is
//! recorded per column: the [`StaticPullback`] handle only borrows the input
//! matrix and the mapped function. On the backward pass every column's
//! Jacobian is recomputed by a [`JacobianProvider`] and contracted with the
//! upstream gradient, `dx_i = J_iᵀ · g_i`.
//!
//! Columns are independent on the backward pass too, so the threaded variant
//! reuses the parallel mapper's partitioned fill and produces the same bits.

use scirs2_core::ndarray_ext::ArrayView1;
use slicemap_core::{Element, Matrix, SliceFn, SliceMapError, SliceMapResult};
use slicemap_exec::{fill_columns_parallel, map_static_columns, par_map_static_columns, ParallelConfig};

use crate::dual::ForwardDual;
use crate::hooks::JacobianProvider;

/// Backward handle of a static mapping
///
/// Borrows the forward input and the mapped function; holds no per-column
/// state.
#[derive(Debug)]
pub struct StaticPullback<'a, T, F, P, const D: usize> {
    input: &'a Matrix<T>,
    f: &'a F,
    provider: P,
    output_dim: usize,
    parallel: Option<ParallelConfig>,
}

impl<'a, T, F, P, const D: usize> StaticPullback<'a, T, F, P, D>
where
    T: Element,
    F: SliceFn<T> + Sync,
    P: JacobianProvider<T> + Sync,
{
    /// Slice length `e` of the forward output
    pub fn output_dim(&self) -> usize {
        self.output_dim
    }

    /// Parallel configuration used by [`backward`](Self::backward), if any
    pub fn parallel_config(&self) -> Option<&ParallelConfig> {
        self.parallel.as_ref()
    }

    /// Pull the upstream gradient `grad` (`e × batch`) back to the input (`D × batch`)
    ///
    /// Runs in parallel when the handle was produced by
    /// [`map_cols_parallel`], sequentially otherwise.
    pub fn backward(&self, grad: &Matrix<T>) -> SliceMapResult<Matrix<T>> {
        match &self.parallel {
            Some(config) => self.backward_parallel(grad, config),
            None => self.backward_sequential(grad),
        }
    }

    /// Column-by-column backward pass on the calling thread
    pub fn backward_sequential(&self, grad: &Matrix<T>) -> SliceMapResult<Matrix<T>> {
        self.check_grad(grad)?;
        tracing::debug!(
            dim = D,
            output_dim = self.output_dim,
            batch = self.input.batch(),
            "map_cols_static: sequential backward"
        );

        let mut input_grad = Matrix::zeros(D, self.input.batch());
        for (column, x) in self.input.static_columns::<D>()?.enumerate() {
            let dx = self.column_vjp(column, x, grad.column(column))?;
            input_grad.column_mut(column).copy_from_slice(&dx);
        }
        Ok(input_grad)
    }

    /// Backward pass partitioned across `config`'s workers
    ///
    /// Bitwise identical to [`backward_sequential`](Self::backward_sequential).
    pub fn backward_parallel(
        &self,
        grad: &Matrix<T>,
        config: &ParallelConfig,
    ) -> SliceMapResult<Matrix<T>> {
        self.check_grad(grad)?;
        let batch = self.input.batch();
        let workers = config.resolve_workers(batch)?;
        tracing::debug!(
            dim = D,
            output_dim = self.output_dim,
            batch,
            workers,
            "map_cols_static: parallel backward"
        );

        let columns = self.input.static_columns::<D>()?;
        let mut input_grad = Matrix::zeros(D, batch);
        fill_columns_parallel(input_grad.as_mut_slice(), D, 0..batch, workers, |column, target| {
            let x = columns
                .get(column)
                .ok_or_else(|| SliceMapError::invalid(format!("column {column} out of range")))?;
            let dx = self.column_vjp(column, x, grad.column(column))?;
            target.copy_from_slice(&dx);
            Ok(())
        })?;
        Ok(input_grad)
    }

    fn check_grad(&self, grad: &Matrix<T>) -> SliceMapResult<()> {
        let expected = (self.output_dim, self.input.batch());
        if grad.shape() != expected {
            return Err(SliceMapError::GradientShape {
                expected: vec![expected.0, expected.1],
                got: vec![grad.dim(), grad.batch()],
            });
        }
        Ok(())
    }

    /// `J(x)ᵀ · cotangent` for one column
    fn column_vjp(&self, column: usize, x: &[T; D], cotangent: &[T]) -> SliceMapResult<Vec<T>> {
        let jacobian = self
            .provider
            .jacobian(self.f, x)
            .map_err(|source| SliceMapError::Function { column, source })?;

        let (rows, cols) = jacobian.dim();
        SliceMapError::check_len(column, self.output_dim, rows)?;
        if cols != D {
            return Err(SliceMapError::invalid(format!(
                "Jacobian of column {column} has {cols} columns, expected {D}"
            )));
        }

        Ok(jacobian.t().dot(&ArrayView1::from(cotangent)).to_vec())
    }
}

/// Differentiable static map using forward-mode Jacobians
///
/// # Examples
///
/// ```
/// use slicemap_ad::map_cols_static;
/// use slicemap_core::{Matrix, Scalar, SliceFn};
///
/// struct Cross;
///
/// impl SliceFn<f64> for Cross {
///     fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
///         Ok(vec![x[0].clone() * x[1].clone()])
///     }
/// }
///
/// let m = Matrix::from_column_major(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// let (y, pullback) = map_cols_static::<2, _, _>(&Cross, &m).unwrap();
/// assert_eq!(y.as_slice(), &[2.0, 12.0]);
///
/// let dx = pullback.backward(&Matrix::from_fn(1, 2, |_, _| 1.0)).unwrap();
/// assert_eq!(dx.as_slice(), &[2.0, 1.0, 4.0, 3.0]);
/// ```
pub fn map_cols_static<'a, const D: usize, T, F>(
    f: &'a F,
    matrix: &'a Matrix<T>,
) -> SliceMapResult<(Matrix<T>, StaticPullback<'a, T, F, ForwardDual, D>)>
where
    T: Element,
    F: SliceFn<T> + Sync,
{
    map_cols_static_with(f, matrix, ForwardDual)
}

/// Differentiable static map using `provider` for Jacobians
///
/// Fails with [`SliceMapError::Dimension`] before evaluating `f` if `D`
/// differs from the matrix leading dimension.
pub fn map_cols_static_with<'a, const D: usize, T, F, P>(
    f: &'a F,
    matrix: &'a Matrix<T>,
    provider: P,
) -> SliceMapResult<(Matrix<T>, StaticPullback<'a, T, F, P, D>)>
where
    T: Element,
    F: SliceFn<T> + Sync,
    P: JacobianProvider<T> + Sync,
{
    let output = map_static_columns(|x: &[T; D]| f.apply(x.as_slice()), matrix)?;
    let pullback = StaticPullback {
        input: matrix,
        f,
        provider,
        output_dim: output.dim(),
        parallel: None,
    };
    Ok((output, pullback))
}

/// Differentiable static map evaluated on `workers` threads
///
/// Forward and backward both use the parallel engine with the same worker
/// count; results are identical to [`map_cols_static`].
///
/// # Examples
///
/// ```
/// use slicemap_ad::{map_cols_parallel, map_cols_static};
/// use slicemap_core::{Matrix, Scalar, SliceFn};
///
/// struct Norm;
///
/// impl SliceFn<f64> for Norm {
///     fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
///         let sq = x.iter().fold(S::constant(0.0), |acc, v| acc + v.powi(2));
///         Ok(vec![sq.sqrt()])
///     }
/// }
///
/// let m = Matrix::from_fn(3, 50, |row, col| 1.0 + (row * 50 + col) as f64);
/// let g = Matrix::from_fn(1, 50, |_, col| col as f64);
///
/// let (y_seq, pb_seq) = map_cols_static::<3, _, _>(&Norm, &m).unwrap();
/// let (y_par, pb_par) = map_cols_parallel::<3, _, _>(&Norm, &m, 4).unwrap();
/// assert_eq!(y_seq, y_par);
/// assert_eq!(pb_seq.backward(&g).unwrap(), pb_par.backward(&g).unwrap());
/// ```
pub fn map_cols_parallel<'a, const D: usize, T, F>(
    f: &'a F,
    matrix: &'a Matrix<T>,
    workers: usize,
) -> SliceMapResult<(Matrix<T>, StaticPullback<'a, T, F, ForwardDual, D>)>
where
    T: Element,
    F: SliceFn<T> + Sync,
{
    let config = ParallelConfig::new().with_workers(workers);
    let output = par_map_static_columns(|x: &[T; D]| f.apply(x.as_slice()), matrix, &config)?;
    let pullback = StaticPullback {
        input: matrix,
        f,
        provider: ForwardDual,
        output_dim: output.dim(),
        parallel: Some(config),
    };
    Ok((output, pullback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamic::map_cols;
    use slicemap_core::Scalar;

    struct SumOfSquares;

    impl SliceFn<f64> for SumOfSquares {
        fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
            let total = x
                .iter()
                .fold(S::constant(0.0), |acc, v| acc + v.clone() * v.clone());
            Ok(vec![total])
        }
    }

    struct Mix;

    impl SliceFn<f64> for Mix {
        fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
            Ok(vec![
                x[0].sin() * x[1].clone(),
                x[2].exp() - x[0].clone(),
                x[1].tanh(),
                x[0].clone() * x[1].clone() * x[2].clone(),
            ])
        }
    }

    fn sample() -> Matrix<f64> {
        Matrix::from_column_major(3, 4, (1..=12).map(f64::from).collect()).unwrap()
    }

    fn small_sample(batch: usize) -> Matrix<f64> {
        Matrix::from_fn(3, batch, |row, col| 0.1 * (row as f64 + 1.0) + 0.05 * col as f64)
    }

    #[test]
    fn test_sum_of_squares_gradient() {
        let m = sample();
        let (y, pullback) = map_cols_static::<3, _, _>(&SumOfSquares, &m).unwrap();
        assert_eq!(y.as_slice(), &[14.0, 77.0, 194.0, 365.0]);

        let dx = pullback.backward(&Matrix::from_fn(1, 4, |_, _| 1.0)).unwrap();
        let expected = Matrix::from_fn(3, 4, |row, col| 2.0 * m[(row, col)]);
        assert_eq!(dx, expected);
    }

    #[test]
    fn test_dimension_mismatch() {
        let m = sample();
        let result = map_cols_static::<2, _, _>(&SumOfSquares, &m);
        assert!(matches!(
            result,
            Err(SliceMapError::Dimension {
                expected: 2,
                got: 3
            })
        ));
    }

    #[test]
    fn test_static_agrees_with_dynamic() {
        let m = small_sample(6);
        let (y_static, pb_static) = map_cols_static::<3, _, _>(&Mix, &m).unwrap();
        let (y_dynamic, pb_dynamic) = map_cols(&Mix, &m).unwrap();
        assert_eq!(y_static, y_dynamic);

        let g = Matrix::from_fn(4, 6, |row, col| 1.0 - 0.3 * row as f64 + 0.1 * col as f64);
        let dx_static = pb_static.backward(&g).unwrap();
        let dx_dynamic = pb_dynamic.backward(&g).unwrap();
        assert!(
            dx_static.approx_eq(&dx_dynamic, 1e-12),
            "max diff {:?}",
            dx_static.max_abs_diff(&dx_dynamic)
        );
    }

    #[test]
    fn test_parallel_backward_is_bitwise_identical() {
        let m = small_sample(23);
        let g = Matrix::from_fn(4, 23, |row, col| (row * 23 + col) as f64 * 0.01);
        let (_, pb) = map_cols_static::<3, _, _>(&Mix, &m).unwrap();
        let expected = pb.backward(&g).unwrap();

        for workers in [1, 2, 4, 7] {
            let config = ParallelConfig::new().with_workers(workers);
            assert_eq!(pb.backward_parallel(&g, &config).unwrap(), expected);

            let (_, pb_par) = map_cols_parallel::<3, _, _>(&Mix, &m, workers).unwrap();
            assert_eq!(pb_par.parallel_config(), Some(&config));
            assert_eq!(pb_par.backward(&g).unwrap(), expected);
        }
    }

    #[test]
    fn test_gradient_shape_checked() {
        let m = sample();
        let (_, pb) = map_cols_static::<3, _, _>(&SumOfSquares, &m).unwrap();
        assert!(matches!(
            pb.backward(&Matrix::zeros(2, 4)),
            Err(SliceMapError::GradientShape { .. })
        ));
        assert!(matches!(
            pb.backward_parallel(&Matrix::zeros(1, 5), &ParallelConfig::new().with_workers(2)),
            Err(SliceMapError::GradientShape { .. })
        ));
    }

    #[test]
    fn test_backward_is_repeatable() {
        let m = sample();
        let (_, pb) = map_cols_static::<3, _, _>(&SumOfSquares, &m).unwrap();
        let g = Matrix::from_fn(1, 4, |_, col| col as f64);
        assert_eq!(pb.backward(&g).unwrap(), pb.backward(&g).unwrap());
    }

    #[test]
    fn test_empty_batch() {
        let m = Matrix::<f64>::zeros(3, 0);
        let (y, pb) = map_cols_static::<3, _, _>(&SumOfSquares, &m).unwrap();
        assert_eq!(y.shape(), (0, 0));
        assert_eq!(pb.backward(&Matrix::zeros(0, 0)).unwrap().shape(), (3, 0));

        let (_, pb) = map_cols_parallel::<3, _, _>(&SumOfSquares, &m, 3).unwrap();
        assert_eq!(pb.backward(&Matrix::zeros(0, 0)).unwrap().shape(), (3, 0));
    }
}
