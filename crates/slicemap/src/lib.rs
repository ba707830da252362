//! # SliceMap
//!
//! Differentiable, parallel mapping of a function over the columns of a matrix
//! or the fibers of an N-D array.
//!
//! This is the **meta crate** that re-exports all SliceMap components for
//! convenient access.
//!
//! ## Quick Start
//!
//! ```
//! use slicemap::prelude::*;
//!
//! /// x / (1 + x²), elementwise
//! struct Damped;
//!
//! impl SliceFn<f64> for Damped {
//!     fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
//!         Ok(x.iter()
//!             .map(|v| v.clone() / (S::constant(1.0) + v.clone() * v.clone()))
//!             .collect())
//!     }
//! }
//!
//! let m = Matrix::from_fn(3, 100, |row, col| (row as f64 - 1.0) * 0.01 * col as f64);
//! let g = Matrix::from_fn(3, 100, |_, _| 1.0);
//!
//! // Reverse mode, one recorded pullback per column
//! let (y, pullback) = map_cols(&Damped, &m)?;
//! let dx = pullback.backward(&g)?;
//!
//! // Forward-mode Jacobians, 4 worker threads
//! let (y_par, pullback_par) = map_cols_parallel::<3, _, _>(&Damped, &m, 4)?;
//! assert_eq!(y, y_par);
//! assert!(dx.approx_eq(&pullback_par.backward(&g)?, 1e-12));
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! ## Components
//!
//! ### Core Types ([`core`])
//!
//! Column-major [`Matrix`](core::Matrix), slice extractors, the scalar
//! abstraction and the error taxonomy.
//!
//! ### Mappers ([`exec`])
//!
//! Sequential and parallel forward mappers for dynamic and fixed slice lengths.
//!
//! ### Differentiation ([`ad`])
//!
//! Dynamic and static differentiable wrappers, the generic-axis adapter,
//! tape and dual-number collaborators, recorder hooks and gradient checking.
//!
//! ## Features
//!
//! - `tracing`: install a `tracing-subscriber` pipeline via
//!   [`tracing_support::init_tracing`]

pub use slicemap_ad as ad;
pub use slicemap_core as core;
pub use slicemap_exec as exec;

pub mod tracing_support;

pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! # Example
    //!
    //! ```
    //! use slicemap::prelude::*;
    //!
    //! let m = Matrix::<f64>::zeros(3, 4);
    //! assert_eq!(m.columns().len(), 4);
    //! ```

    // Core types
    pub use crate::core::{Element, Matrix, Scalar, SliceFn, SliceMapError, SliceMapResult};

    // Mappers
    pub use crate::exec::{
        map_columns, map_static_columns, par_map_columns, par_map_static_columns, ParallelConfig,
    };

    // Differentiable wrappers
    pub use crate::ad::{
        map_cols, map_cols_parallel, map_cols_static, slice_map, AxisPullback, ColumnPullback,
        StaticPullback,
    };
}
