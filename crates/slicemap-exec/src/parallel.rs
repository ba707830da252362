//! Parallel slice mapper
//!
//! Same contract as the sequential mapper, with the column range partitioned
//! across a worker pool.
//!
//! # Execution model
//!
//! - The first column is evaluated on the calling thread to learn the output
//!   length, then a single output matrix is allocated.
//! - The remaining columns are split by a [`PartitionPlan`] into contiguous
//!   ranges. The output buffer is split into matching disjoint `&mut` chunks
//!   and each chunk is moved into exactly one worker, so no locks or atomics
//!   are involved.
//! - Workers run on a rayon pool built for this call and joined before it
//!   returns. There is no work-stealing between ranges.
//! - A worker stops at its first failure. After the join, the error of the
//!   lowest-indexed failing worker is returned and the output is dropped.
//!
//! Because every column is computed by the same function on the same input,
//! the result is bitwise identical to the sequential mapper for any worker
//! count.
//!
//! The mapped function must be safe to call concurrently (`Sync`) and must not
//! depend on hidden shared mutable state. This is a precondition, not checked.

use std::ops::Range;

use anyhow::anyhow;
use slicemap_core::{Element, Matrix, SliceMapError, SliceMapResult};

use crate::config::ParallelConfig;
use crate::partition::PartitionPlan;

/// Fill a block of columns in parallel
///
/// `buffer` holds `columns.len()` consecutive columns of `rows` elements each
/// (column-major). `work(column, target)` must write column `column` into
/// `target`. Failures of the mapped function should be returned as
/// [`SliceMapError::Function`]; they are re-attributed to the worker as
/// [`SliceMapError::Worker`].
pub fn fill_columns_parallel<T, W>(
    buffer: &mut [T],
    rows: usize,
    columns: Range<usize>,
    workers: usize,
    work: W,
) -> SliceMapResult<()>
where
    T: Send,
    W: Fn(usize, &mut [T]) -> SliceMapResult<()> + Sync,
{
    if buffer.len() != rows * columns.len() {
        return Err(SliceMapError::invalid(format!(
            "buffer of {} elements cannot hold {} columns of {} rows",
            buffer.len(),
            columns.len(),
            rows
        )));
    }

    let plan = PartitionPlan::new(columns, workers)?;

    let mut chunks: Vec<&mut [T]> = Vec::with_capacity(plan.len());
    let mut rest = buffer;
    for range in plan.ranges() {
        let (head, tail) = rest.split_at_mut(range.len() * rows);
        chunks.push(head);
        rest = tail;
    }

    let run = |worker: usize, range: Range<usize>, chunk: &mut [T]| -> SliceMapResult<()> {
        tracing::trace!(worker, start = range.start, end = range.end, "worker started");
        for (offset, column) in range.enumerate() {
            let target = &mut chunk[offset * rows..(offset + 1) * rows];
            work(column, target).map_err(|err| err.in_worker(worker))?;
        }
        Ok(())
    };

    let mut outcomes: Vec<SliceMapResult<()>> = (0..plan.len()).map(|_| Ok(())).collect();

    if plan.len() <= 1 {
        for (worker, (range, chunk)) in plan.ranges().iter().zip(chunks).enumerate() {
            outcomes[worker] = run(worker, range.clone(), chunk);
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(plan.len())
            .thread_name(|index| format!("slicemap-worker-{index}"))
            .build()
            .map_err(|e| SliceMapError::ThreadPool(e.to_string()))?;

        let run = &run;
        pool.scope(|scope| {
            for (worker, ((range, chunk), outcome)) in plan
                .ranges()
                .iter()
                .zip(chunks)
                .zip(outcomes.iter_mut())
                .enumerate()
            {
                scope.spawn(move |_| {
                    *outcome = run(worker, range.clone(), chunk);
                });
            }
        });
    }

    outcomes.into_iter().collect()
}

/// Map `f` over the columns of `matrix` in parallel
///
/// Dynamic-length counterpart of [`par_map_static_columns`].
pub fn par_map_columns<T, F>(
    f: F,
    matrix: &Matrix<T>,
    config: &ParallelConfig,
) -> SliceMapResult<Matrix<T>>
where
    T: Element,
    F: Fn(&[T]) -> anyhow::Result<Vec<T>> + Sync,
{
    let columns = matrix.columns();
    par_map_indexed(matrix.batch(), matrix.dim(), config, |column| {
        let x = columns
            .get(column)
            .ok_or_else(|| anyhow!("column {column} out of range"))?;
        f(x)
    })
}

/// Map `f` over the columns of `matrix`, viewed as `&[T; D]`, in parallel
///
/// Fails with [`SliceMapError::Dimension`] before calling `f` if `D` differs
/// from the matrix leading dimension.
///
/// # Errors
///
/// - [`SliceMapError::Dimension`] on a slice length mismatch
/// - [`SliceMapError::Shape`] if output lengths disagree
/// - [`SliceMapError::Worker`] wrapping the first failure of `f`
/// - [`SliceMapError::InvalidArgument`] for a zero worker count
///
/// # Examples
///
/// ```
/// use slicemap_core::Matrix;
/// use slicemap_exec::{map_static_columns, par_map_static_columns, ParallelConfig};
///
/// let m = Matrix::from_fn(3, 64, |row, col| (row * 64 + col) as f64);
/// let f = |x: &[f64; 3]| Ok(vec![x[0] * x[1] - x[2]]);
///
/// let config = ParallelConfig::new().with_workers(4);
/// let parallel = par_map_static_columns(f, &m, &config).unwrap();
/// let sequential = map_static_columns(f, &m).unwrap();
/// assert_eq!(parallel, sequential);
/// ```
pub fn par_map_static_columns<T, F, const D: usize>(
    f: F,
    matrix: &Matrix<T>,
    config: &ParallelConfig,
) -> SliceMapResult<Matrix<T>>
where
    T: Element,
    F: Fn(&[T; D]) -> anyhow::Result<Vec<T>> + Sync,
{
    let columns = matrix.static_columns::<D>()?;
    par_map_indexed(matrix.batch(), D, config, |column| {
        let x = columns
            .get(column)
            .ok_or_else(|| anyhow!("column {column} out of range"))?;
        f(x)
    })
}

fn par_map_indexed<T, E>(
    batch: usize,
    dim: usize,
    config: &ParallelConfig,
    eval: E,
) -> SliceMapResult<Matrix<T>>
where
    T: Element,
    E: Fn(usize) -> anyhow::Result<Vec<T>> + Sync,
{
    let workers = config.resolve_workers(batch)?;
    tracing::debug!(dim, batch, workers, "par_map: parallel column mapping");

    if batch == 0 {
        return Ok(Matrix::zeros(0, 0));
    }

    let first = eval(0).map_err(|source| SliceMapError::Worker {
        worker: 0,
        column: 0,
        source,
    })?;
    let rows = first.len();

    let mut output = Matrix::zeros(rows, batch);
    output.column_mut(0).copy_from_slice(&first);

    let (_, rest) = output.as_mut_slice().split_at_mut(rows);
    fill_columns_parallel(rest, rows, 1..batch, workers, |column, target| {
        let values = eval(column).map_err(|source| SliceMapError::Function { column, source })?;
        SliceMapError::check_len(column, rows, values.len())?;
        target.copy_from_slice(&values);
        Ok(())
    })?;

    Ok(output)
}
