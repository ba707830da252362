//! # slicemap-ad
//!
//! Differentiation support for SliceMap.
//!
//! This crate provides:
//! - A dynamic differentiable wrapper recording one pullback per column ([`map_cols`])
//! - A static differentiable wrapper that recomputes per-column Jacobians on
//!   the backward pass ([`map_cols_static`], [`map_cols_parallel`])
//! - A generic-axis adapter for N-D arrays ([`slice_map`])
//! - Reference collaborators: reverse-mode tape variables and forward-mode
//!   dual numbers
//! - Integration hooks for external differentiation frameworks
//! - Gradient checking against finite differences

pub mod axis;
pub mod dual;
pub mod dynamic;
pub mod fixed;
pub mod gradcheck;
pub mod hooks;
pub mod tape;

// Re-exports
pub use axis::{slice_map, slice_map_with, AxisPullback};
pub use dual::{Dual, ForwardDual};
pub use dynamic::{map_cols, map_cols_recorded, map_cols_with, ColumnPullback, GradientRecord};
pub use fixed::{map_cols_parallel, map_cols_static, map_cols_static_with, StaticPullback};
pub use hooks::{
    BackwardRule, JacobianProvider, OperationId, PullbackProvider, Recorder, SliceRule,
    TapeRecorder, Tracked,
};
pub use tape::{ReverseTape, Tape, TapeVar};
