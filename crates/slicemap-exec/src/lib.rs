//! # slicemap-exec
//!
//! Forward-pass column mappers: a sequential mapper for dynamic and fixed
//! slice lengths, and a parallel mapper that partitions the batch across a
//! rayon worker pool.
//!
//! Both mappers produce the same output for the same function and input; the
//! parallel mapper is bitwise identical to the sequential one for any worker
//! count.
//!
//! ```
//! use slicemap_core::Matrix;
//! use slicemap_exec::{map_columns, par_map_columns, ParallelConfig};
//!
//! let m = Matrix::from_fn(2, 100, |row, col| (row + col) as f64);
//! let norm = |x: &[f64]| Ok(vec![x.iter().map(|v| v * v).sum::<f64>().sqrt()]);
//!
//! let seq = map_columns(norm, &m).unwrap();
//! let par = par_map_columns(norm, &m, &ParallelConfig::new().with_workers(4)).unwrap();
//! assert_eq!(seq, par);
//! ```

pub mod config;
pub mod parallel;
pub mod partition;
pub mod sequential;

pub use config::ParallelConfig;
pub use parallel::{fill_columns_parallel, par_map_columns, par_map_static_columns};
pub use partition::PartitionPlan;
pub use sequential::{map_columns, map_static_columns};
