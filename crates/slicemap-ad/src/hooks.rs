//! Collaborator traits and recorder integration
//!
//! The differentiable wrappers never differentiate a mapped function
//! themselves. They consume two collaborators:
//!
//! - a [`PullbackProvider`], which evaluates a slice and returns its value
//!   together with a backward rule (reverse mode, used by the dynamic wrapper);
//! - a [`JacobianProvider`], which returns the `e × D` Jacobian of a slice
//!   (forward mode, used by the static wrapper).
//!
//! A whole mapping can in turn be handed to an external differentiation
//! framework through the [`Recorder`] trait, which stores a boxed
//! [`BackwardRule`] per operation. [`TapeRecorder`] is a reference recorder
//! for linear chains of mappings.
//!
//! # Example
//!
//! ```
//! use slicemap_ad::{map_cols_recorded, Recorder, ReverseTape, TapeRecorder};
//! use slicemap_core::{Matrix, Scalar, SliceFn};
//!
//! struct Square;
//!
//! impl SliceFn<f64> for Square {
//!     fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
//!         Ok(x.iter().map(|v| v.powi(2)).collect())
//!     }
//! }
//!
//! let m = Matrix::from_column_major(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
//! let mut recorder = TapeRecorder::new();
//!
//! let y = map_cols_recorded(&Square, &m, &ReverseTape, &mut recorder).unwrap();
//! let z = map_cols_recorded(&Square, &y.value, &ReverseTape, &mut recorder).unwrap();
//!
//! // d(x^4)/dx = 4x^3
//! let ones = Matrix::from_fn(2, 2, |_, _| 1.0);
//! let grad = recorder.backward(z.id.unwrap(), &ones).unwrap();
//! assert_eq!(grad.as_slice(), &[4.0, 32.0, 108.0, 256.0]);
//! ```

use std::collections::HashMap;

use scirs2_core::ndarray_ext::Array2;
use slicemap_core::{Element, Matrix, SliceFn, SliceMapError, SliceMapResult};

/// Backward rule of one slice: output cotangent to input gradient
pub type SliceRule<T> = Box<dyn Fn(&[T]) -> anyhow::Result<Vec<T>>>;

/// Reverse-mode collaborator
///
/// Evaluates `f` on one slice and returns the value together with a rule
/// mapping a cotangent of length `e` to a gradient of length `d`.
pub trait PullbackProvider<T: Element> {
    fn pullback<F: SliceFn<T>>(&self, f: &F, x: &[T]) -> anyhow::Result<(Vec<T>, SliceRule<T>)>;
}

/// Forward-mode collaborator
///
/// Returns the `e × D` Jacobian of `f` at `x`. Must be deterministic for the
/// parallel backward pass to match the sequential one.
pub trait JacobianProvider<T: Element> {
    fn jacobian<const D: usize, F: SliceFn<T>>(&self, f: &F, x: &[T; D]) -> anyhow::Result<Array2<T>>;
}

/// Unique identifier for operations registered with a [`Recorder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OperationId(pub u64);

/// Backward half of a recorded operation
///
/// Consumed by the backward pass; whatever it holds is released afterwards.
pub trait BackwardRule<T: Element> {
    /// Map the gradient of the operation output to the gradient of its input
    fn backward(self: Box<Self>, grad: &Matrix<T>) -> SliceMapResult<Matrix<T>>;

    /// Name for diagnostics
    fn name(&self) -> &str;
}

/// Value produced by a recorded operation
#[derive(Debug, Clone)]
pub struct Tracked<T> {
    /// Operation that produced the value, `None` if recording was off
    pub id: Option<OperationId>,

    /// Forward output
    pub value: Matrix<T>,
}

/// Generic differentiation recorder
pub trait Recorder<T: Element> {
    /// Register an operation's output and backward rule
    fn record(&mut self, value: Matrix<T>, rule: Box<dyn BackwardRule<T>>) -> Tracked<T>;

    /// Run the backward pass from `op` with upstream gradient `grad`
    ///
    /// # Returns
    ///
    /// The gradient with respect to the input of the earliest recorded operation
    fn backward(&mut self, op: OperationId, grad: &Matrix<T>) -> SliceMapResult<Matrix<T>>;

    /// Drop every recorded operation
    fn clear(&mut self);
}

/// Reference recorder for a linear chain of operations
///
/// Each operation is assumed to consume the output of the previous one.
/// Backward walks the chain in reverse registration order, starting at the
/// requested operation, and releases every rule it consumes. The upstream
/// gradient is checked against the recorded output shape first, so a
/// mismatched gradient leaves the chain intact for a retry.
///
/// Gradients are kept only for the operations visited by the most recent
/// backward pass.
pub struct TapeRecorder<T: Element> {
    /// Recorded operations in forward order
    operations: Vec<RecordedOperation<T>>,

    /// Input gradient of every operation visited by the last backward pass
    gradients: HashMap<OperationId, Matrix<T>>,

    next_op_id: u64,
    recording: bool,
}

struct RecordedOperation<T: Element> {
    id: OperationId,
    output_shape: (usize, usize),
    rule: Box<dyn BackwardRule<T>>,
}

impl<T: Element> TapeRecorder<T> {
    /// Create a recorder that is recording
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
            gradients: HashMap::new(),
            next_op_id: 0,
            recording: true,
        }
    }

    /// Start recording operations
    pub fn start_recording(&mut self) {
        self.recording = true;
    }

    /// Stop recording operations
    pub fn stop_recording(&mut self) {
        self.recording = false;
    }

    /// Check if currently recording
    pub fn is_recording(&self) -> bool {
        self.recording
    }

    /// Number of operations still held
    pub fn num_operations(&self) -> usize {
        self.operations.len()
    }

    /// Gradient with respect to the input of `op`, after a backward pass through it
    pub fn gradient(&self, op: OperationId) -> Option<&Matrix<T>> {
        self.gradients.get(&op)
    }
}

impl<T: Element> Default for TapeRecorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Recorder<T> for TapeRecorder<T> {
    fn record(&mut self, value: Matrix<T>, rule: Box<dyn BackwardRule<T>>) -> Tracked<T> {
        if !self.recording {
            return Tracked { id: None, value };
        }

        let id = OperationId(self.next_op_id);
        self.next_op_id += 1;
        tracing::trace!(op = id.0, name = rule.name(), "recorded operation");
        self.operations.push(RecordedOperation {
            id,
            output_shape: value.shape(),
            rule,
        });
        Tracked {
            id: Some(id),
            value,
        }
    }

    fn backward(&mut self, op: OperationId, grad: &Matrix<T>) -> SliceMapResult<Matrix<T>> {
        let position = self
            .operations
            .iter()
            .position(|recorded| recorded.id == op)
            .ok_or_else(|| SliceMapError::invalid(format!("operation {} is not recorded", op.0)))?;

        let (rows, cols) = self.operations[position].output_shape;
        if grad.shape() != (rows, cols) {
            return Err(SliceMapError::GradientShape {
                expected: vec![rows, cols],
                got: vec![grad.dim(), grad.batch()],
            });
        }

        self.gradients.clear();
        let chain: Vec<_> = self.operations.drain(..=position).collect();
        let mut current = grad.clone();
        for recorded in chain.into_iter().rev() {
            tracing::debug!(op = recorded.id.0, name = recorded.rule.name(), "backward");
            current = recorded.rule.backward(&current)?;
            self.gradients.insert(recorded.id, current.clone());
        }

        Ok(current)
    }

    fn clear(&mut self) {
        self.operations.clear();
        self.gradients.clear();
        self.next_op_id = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Multiplies the gradient by a constant
    struct Scale(f64);

    impl BackwardRule<f64> for Scale {
        fn backward(self: Box<Self>, grad: &Matrix<f64>) -> SliceMapResult<Matrix<f64>> {
            Ok(Matrix::from_fn(grad.dim(), grad.batch(), |r, c| grad[(r, c)] * self.0))
        }

        fn name(&self) -> &str {
            "scale"
        }
    }

    fn ones() -> Matrix<f64> {
        Matrix::from_fn(1, 2, |_, _| 1.0)
    }

    #[test]
    fn test_recorder_creation() {
        let recorder = TapeRecorder::<f64>::new();
        assert!(recorder.is_recording());
        assert_eq!(recorder.num_operations(), 0);
    }

    #[test]
    fn test_recording_toggle() {
        let mut recorder = TapeRecorder::<f64>::new();
        recorder.stop_recording();
        let tracked = recorder.record(ones(), Box::new(Scale(2.0)));
        assert!(tracked.id.is_none());
        assert_eq!(recorder.num_operations(), 0);

        recorder.start_recording();
        let tracked = recorder.record(ones(), Box::new(Scale(2.0)));
        assert_eq!(tracked.id, Some(OperationId(0)));
        assert_eq!(recorder.num_operations(), 1);
    }

    #[test]
    fn test_chain_backward_releases_operations() {
        let mut recorder = TapeRecorder::<f64>::new();
        let a = recorder.record(ones(), Box::new(Scale(2.0)));
        let b = recorder.record(ones(), Box::new(Scale(3.0)));
        let c = recorder.record(ones(), Box::new(Scale(5.0)));

        // Backward from the middle leaves the last operation in place
        let grad = recorder.backward(b.id.unwrap(), &ones()).unwrap();
        assert_eq!(grad.as_slice(), &[6.0, 6.0]);
        assert_eq!(recorder.num_operations(), 1);
        assert_eq!(recorder.gradient(b.id.unwrap()).unwrap().as_slice(), &[3.0, 3.0]);
        assert_eq!(recorder.gradient(a.id.unwrap()).unwrap().as_slice(), &[6.0, 6.0]);

        // Consumed operations cannot be replayed
        assert!(recorder.backward(a.id.unwrap(), &ones()).is_err());

        let grad = recorder.backward(c.id.unwrap(), &ones()).unwrap();
        assert_eq!(grad.as_slice(), &[5.0, 5.0]);
        assert_eq!(recorder.num_operations(), 0);

        // Only the last pass keeps gradients
        assert!(recorder.gradient(a.id.unwrap()).is_none());
        assert!(recorder.gradient(b.id.unwrap()).is_none());
        assert_eq!(recorder.gradient(c.id.unwrap()).unwrap().as_slice(), &[5.0, 5.0]);
    }

    #[test]
    fn test_mismatched_gradient_keeps_chain() {
        let mut recorder = TapeRecorder::<f64>::new();
        recorder.record(ones(), Box::new(Scale(2.0)));
        let b = recorder.record(ones(), Box::new(Scale(3.0)));

        let wrong = Matrix::from_fn(1, 3, |_, _| 1.0);
        match recorder.backward(b.id.unwrap(), &wrong) {
            Err(SliceMapError::GradientShape { expected, got }) => {
                assert_eq!(expected, vec![1, 2]);
                assert_eq!(got, vec![1, 3]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(recorder.num_operations(), 2);

        let grad = recorder.backward(b.id.unwrap(), &ones()).unwrap();
        assert_eq!(grad.as_slice(), &[6.0, 6.0]);
        assert_eq!(recorder.num_operations(), 0);
    }

    #[test]
    fn test_clear() {
        let mut recorder = TapeRecorder::<f64>::new();
        recorder.record(ones(), Box::new(Scale(2.0)));
        recorder.clear();
        assert_eq!(recorder.num_operations(), 0);
        let tracked = recorder.record(ones(), Box::new(Scale(2.0)));
        assert_eq!(tracked.id, Some(OperationId(0)));
    }
}
