//! Unified error types for slice mapping
//!
//! Every public operation in the SliceMap stack returns [`SliceMapResult`].
//! Failures raised by a user-supplied mapped function are carried as
//! [`anyhow::Error`] inside [`SliceMapError::Function`] (sequential path) or
//! [`SliceMapError::Worker`] (parallel path) so the original cause is never lost.
//!
//! # Examples
//!
//! ```
//! use slicemap_core::error::SliceMapError;
//!
//! let err = SliceMapError::shape(1, 3, 4);
//! assert_eq!(
//!     err.to_string(),
//!     "Shape mismatch: slice 1 produced 4 values, expected 3"
//! );
//! ```

use thiserror::Error;

/// Top-level error type for all slice mapping operations
#[derive(Error, Debug)]
pub enum SliceMapError {
    /// Static slice length does not match the matrix leading dimension
    #[error("Dimension mismatch: static slice length {expected} does not match leading dimension {got}")]
    Dimension { expected: usize, got: usize },

    /// A slice produced an output whose length disagrees with the first slice
    #[error("Shape mismatch: slice {index} produced {got} values, expected {expected}")]
    Shape {
        index: usize,
        expected: usize,
        got: usize,
    },

    /// Axis adapter given an axis outside `0..rank`
    #[error("Axis {axis} out of range for array of rank {rank}")]
    Axis { axis: usize, rank: usize },

    /// The mapped function failed inside a parallel worker
    #[error("Worker {worker} failed on column {column}: {source}")]
    Worker {
        worker: usize,
        column: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The mapped function failed on the calling thread
    #[error("Mapped function failed on column {column}: {source}")]
    Function {
        column: usize,
        #[source]
        source: anyhow::Error,
    },

    /// Upstream gradient does not have the shape of the forward output
    #[error("Gradient shape mismatch: expected {expected:?}, got {got:?}")]
    GradientShape {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Invalid construction argument (buffer length, worker count, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The per-call worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

/// Result type alias for slice mapping operations
pub type SliceMapResult<T> = Result<T, SliceMapError>;

impl SliceMapError {
    /// Create a shape mismatch error for slice `index`
    pub fn shape(index: usize, expected: usize, got: usize) -> Self {
        SliceMapError::Shape {
            index,
            expected,
            got,
        }
    }

    /// Create an invalid argument error with a message
    pub fn invalid(msg: impl Into<String>) -> Self {
        SliceMapError::InvalidArgument(msg.into())
    }

    /// Fail with [`SliceMapError::Shape`] unless `got == expected`
    pub fn check_len(index: usize, expected: usize, got: usize) -> SliceMapResult<()> {
        if got == expected {
            Ok(())
        } else {
            Err(Self::shape(index, expected, got))
        }
    }

    /// Re-attribute a mapped-function failure to the worker that observed it.
    ///
    /// Every other variant is returned unchanged.
    pub fn in_worker(self, worker: usize) -> Self {
        match self {
            SliceMapError::Function { column, source } => SliceMapError::Worker {
                worker,
                column,
                source,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_error_display() {
        let err = SliceMapError::Dimension {
            expected: 3,
            got: 5,
        };
        assert_eq!(
            err.to_string(),
            "Dimension mismatch: static slice length 3 does not match leading dimension 5"
        );
    }

    #[test]
    fn test_axis_error_display() {
        let err = SliceMapError::Axis { axis: 4, rank: 3 };
        assert_eq!(err.to_string(), "Axis 4 out of range for array of rank 3");
    }

    #[test]
    fn test_check_len() {
        assert!(SliceMapError::check_len(0, 3, 3).is_ok());
        let err = SliceMapError::check_len(2, 3, 4).unwrap_err();
        assert!(matches!(
            err,
            SliceMapError::Shape {
                index: 2,
                expected: 3,
                got: 4
            }
        ));
    }

    #[test]
    fn test_in_worker_wraps_function_failure() {
        let err = SliceMapError::Function {
            column: 7,
            source: anyhow::anyhow!("boom"),
        }
        .in_worker(2);

        match err {
            SliceMapError::Worker {
                worker,
                column,
                source,
            } => {
                assert_eq!(worker, 2);
                assert_eq!(column, 7);
                assert_eq!(source.to_string(), "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_in_worker_keeps_shape_errors() {
        let err = SliceMapError::shape(1, 2, 3).in_worker(5);
        assert!(matches!(err, SliceMapError::Shape { index: 1, .. }));
    }

    #[test]
    fn test_worker_error_source_chain() {
        let err = SliceMapError::Worker {
            worker: 0,
            column: 3,
            source: anyhow::anyhow!("negative input"),
        };
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("negative input"));
    }
}
