//! # slicemap-core
//!
//! Core types for the SliceMap stack: a column-major [`Matrix`], lazy slice
//! extractors, the scalar abstraction mapped functions are written against, and
//! the shared error taxonomy.
//!
//! ## Memory Layout
//!
//! A matrix has shape `(dim × batch)`. Columns are stored contiguously, so
//! column extraction is a contiguous-stride operation and a column can be
//! reinterpreted as a fixed-length array `&[T; D]` without copying.
//!
//! ## Quick Start
//!
//! ```
//! use slicemap_core::Matrix;
//!
//! let m = Matrix::from_column_major(3, 4, (1..=12).map(f64::from).collect()).unwrap();
//!
//! // Dynamic views
//! for column in m.columns() {
//!     assert_eq!(column.len(), 3);
//! }
//!
//! // Fixed-length reinterpretation, checked against the leading dimension
//! let fixed = m.static_columns::<3>().unwrap();
//! assert_eq!(fixed.len(), 4);
//! assert!(m.static_columns::<2>().is_err());
//! ```
//!
//! ## Error Handling
//!
//! Operations return [`SliceMapResult`]; see [`error::SliceMapError`] for the
//! taxonomy. Mapped functions report their own failures with `anyhow::Error`.

pub mod error;
pub mod matrix;
pub mod slices;
pub mod types;

pub use error::{SliceMapError, SliceMapResult};
pub use matrix::Matrix;
pub use slices::{Columns, StaticColumns};
pub use types::{Element, Scalar, SliceFn};
