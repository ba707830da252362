//! Reverse-mode tape
//!
//! A [`Tape`] is a Wengert list: every arithmetic operation on a [`TapeVar`]
//! appends one node holding the indices of its operands and the local partial
//! derivative with respect to each. A reverse sweep over the list turns an
//! output cotangent into input adjoints.
//!
//! A tape lives for one slice evaluation. [`ReverseTape`] creates a fresh tape
//! per slice, evaluates the mapped function on it, and hands the tape to the
//! returned backward rule, so the tape is released with the rule.
//!
//! Tapes are single-threaded (`Rc`), which matches the dynamic wrapper's
//! sequential forward pass.

use std::cell::RefCell;
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::rc::Rc;

use scirs2_core::numeric::NumCast;
use slicemap_core::{Element, Scalar, SliceFn};

use crate::hooks::{PullbackProvider, SliceRule};

#[derive(Debug, Clone)]
struct Node<T> {
    parents: Vec<(usize, T)>,
}

/// Shared, growable list of recorded operations
#[derive(Clone)]
pub struct Tape<T> {
    nodes: Rc<RefCell<Vec<Node<T>>>>,
}

impl<T: Element> Tape<T> {
    /// Create an empty tape
    pub fn new() -> Self {
        Self {
            nodes: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Register an independent variable
    pub fn var(&self, value: T) -> TapeVar<T> {
        let index = self.push(Vec::new());
        TapeVar {
            value,
            slot: Some((index, self.clone())),
        }
    }

    /// Number of recorded nodes (inputs included)
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index of `var` on this tape, `None` for constants
    ///
    /// Fails if `var` was recorded on a different tape.
    pub fn index_of(&self, var: &TapeVar<T>) -> anyhow::Result<Option<usize>> {
        match &var.slot {
            None => Ok(None),
            Some((index, tape)) if tape.same_as(self) => Ok(Some(*index)),
            Some(_) => anyhow::bail!("variable was recorded on a different tape"),
        }
    }

    /// Reverse sweep
    ///
    /// Seeds node `outputs[k]` with `cotangent[k]` and returns the adjoints of
    /// the first `inputs` nodes.
    pub fn adjoints(&self, outputs: &[Option<usize>], cotangent: &[T], inputs: usize) -> Vec<T> {
        let nodes = self.nodes.borrow();
        let mut adjoint = vec![T::zero(); nodes.len()];

        for (slot, &seed) in outputs.iter().zip(cotangent) {
            if let Some(index) = slot {
                adjoint[*index] = adjoint[*index] + seed;
            }
        }

        for index in (0..nodes.len()).rev() {
            let a = adjoint[index];
            for &(parent, partial) in &nodes[index].parents {
                adjoint[parent] = adjoint[parent] + partial * a;
            }
        }

        adjoint.truncate(inputs);
        adjoint
    }

    fn push(&self, parents: Vec<(usize, T)>) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(Node { parents });
        nodes.len() - 1
    }

    fn same_as(&self, other: &Tape<T>) -> bool {
        Rc::ptr_eq(&self.nodes, &other.nodes)
    }
}

impl<T: Element> Default for Tape<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Tape<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tape")
            .field("nodes", &self.nodes.borrow().len())
            .finish()
    }
}

/// Scalar recorded on a [`Tape`]
///
/// Constants carry no slot and never reach the tape.
#[derive(Clone)]
pub struct TapeVar<T> {
    value: T,
    slot: Option<(usize, Tape<T>)>,
}

impl<T: Element> TapeVar<T> {
    fn unary(&self, value: T, partial: T) -> Self {
        match &self.slot {
            None => Self::constant(value),
            Some((index, tape)) => {
                let node = tape.push(vec![(*index, partial)]);
                Self {
                    value,
                    slot: Some((node, tape.clone())),
                }
            }
        }
    }

    fn binary(lhs: &Self, rhs: &Self, value: T, d_lhs: T, d_rhs: T) -> Self {
        let tape = match (&lhs.slot, &rhs.slot) {
            (None, None) => return Self::constant(value),
            (Some((_, tape)), _) | (None, Some((_, tape))) => tape,
        };

        let mut parents = Vec::with_capacity(2);
        for (var, partial) in [(lhs, d_lhs), (rhs, d_rhs)] {
            if let Some((index, owner)) = &var.slot {
                debug_assert!(owner.same_as(tape), "operands recorded on different tapes");
                if owner.same_as(tape) {
                    parents.push((*index, partial));
                }
            }
        }

        let node = tape.push(parents);
        Self {
            value,
            slot: Some((node, tape.clone())),
        }
    }

    /// Whether this value carries derivative information
    pub fn is_tracked(&self) -> bool {
        self.slot.is_some()
    }
}

impl<T: fmt::Debug> fmt::Debug for TapeVar<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TapeVar")
            .field("value", &self.value)
            .field("index", &self.slot.as_ref().map(|(index, _)| *index))
            .finish()
    }
}

impl<T: Element> Add for TapeVar<T> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        let value = self.value + rhs.value;
        Self::binary(&self, &rhs, value, T::one(), T::one())
    }
}

impl<T: Element> Sub for TapeVar<T> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        let value = self.value - rhs.value;
        Self::binary(&self, &rhs, value, T::one(), -T::one())
    }
}

impl<T: Element> Mul for TapeVar<T> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        let value = self.value * rhs.value;
        Self::binary(&self, &rhs, value, rhs.value, self.value)
    }
}

impl<T: Element> Div for TapeVar<T> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let value = self.value / rhs.value;
        let d_rhs = -value / rhs.value;
        Self::binary(&self, &rhs, value, rhs.value.recip(), d_rhs)
    }
}

impl<T: Element> Neg for TapeVar<T> {
    type Output = Self;

    fn neg(self) -> Self {
        self.unary(-self.value, -T::one())
    }
}

impl<T: Element> Scalar<T> for TapeVar<T> {
    fn constant(value: T) -> Self {
        Self { value, slot: None }
    }

    fn value(&self) -> T {
        self.value
    }

    fn exp(&self) -> Self {
        let e = self.value.exp();
        self.unary(e, e)
    }

    fn ln(&self) -> Self {
        self.unary(self.value.ln(), self.value.recip())
    }

    fn sin(&self) -> Self {
        self.unary(self.value.sin(), self.value.cos())
    }

    fn cos(&self) -> Self {
        self.unary(self.value.cos(), -self.value.sin())
    }

    fn tanh(&self) -> Self {
        let t = self.value.tanh();
        self.unary(t, T::one() - t * t)
    }

    fn sqrt(&self) -> Self {
        let s = self.value.sqrt();
        self.unary(s, (s + s).recip())
    }

    fn powi(&self, n: i32) -> Self {
        if n == 0 {
            return Self::constant(T::one());
        }
        let factor = <T as NumCast>::from(n).unwrap_or_else(T::nan);
        self.unary(self.value.powi(n), factor * self.value.powi(n - 1))
    }
}

/// Pullback provider backed by a per-slice reverse-mode tape
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseTape;

impl<T: Element> PullbackProvider<T> for ReverseTape {
    fn pullback<F: SliceFn<T>>(&self, f: &F, x: &[T]) -> anyhow::Result<(Vec<T>, SliceRule<T>)> {
        let tape = Tape::new();
        let inputs: Vec<TapeVar<T>> = x.iter().map(|&v| tape.var(v)).collect();
        let outputs = f.apply(&inputs)?;

        let values: Vec<T> = outputs.iter().map(|o| o.value).collect();
        let slots = outputs
            .iter()
            .map(|o| tape.index_of(o))
            .collect::<anyhow::Result<Vec<_>>>()?;
        let input_dim = x.len();

        let rule: SliceRule<T> = Box::new(move |cotangent: &[T]| {
            if cotangent.len() != slots.len() {
                anyhow::bail!(
                    "cotangent has {} entries, slice output has {}",
                    cotangent.len(),
                    slots.len()
                );
            }
            Ok(tape.adjoints(&slots, cotangent, input_dim))
        });

        Ok((values, rule))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mixed;

    impl SliceFn<f64> for Mixed {
        fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
            // (x0 * x1 + sin x0, x1 / x0, 3)
            Ok(vec![
                x[0].clone() * x[1].clone() + x[0].sin(),
                x[1].clone() / x[0].clone(),
                S::from_f64(3.0),
            ])
        }
    }

    #[test]
    fn test_shared_subexpression_accumulates() {
        let tape = Tape::new();
        let x = tape.var(3.0_f64);
        // y = x * x + x
        let y = x.clone() * x.clone() + x;
        let slot = tape.index_of(&y).unwrap();
        let adj = tape.adjoints(&[slot], &[1.0], 1);
        assert_eq!(adj, vec![7.0]);
    }

    #[test]
    fn test_constants_stay_off_tape() {
        let tape = Tape::<f64>::new();
        let x = tape.var(2.0);
        let before = tape.len();
        let c = <TapeVar<f64> as Scalar<f64>>::constant(4.0) * TapeVar::constant(0.5);
        assert!(!c.is_tracked());
        assert_eq!(tape.len(), before);

        let y = x * c;
        assert!(y.is_tracked());
        assert_eq!(tape.len(), before + 1);
    }

    #[test]
    fn test_foreign_tape_rejected() {
        let a = Tape::<f64>::new();
        let b = Tape::<f64>::new();
        let v = b.var(1.0);
        assert!(a.index_of(&v).is_err());
    }

    #[test]
    fn test_reverse_tape_pullback() {
        let x = [0.5, 2.0];
        let (values, rule) = ReverseTape.pullback(&Mixed, &x).unwrap();
        assert!((values[0] - (1.0 + 0.5_f64.sin())).abs() < 1e-12);
        assert!((values[1] - 4.0).abs() < 1e-12);
        assert_eq!(values[2], 3.0);

        // Cotangent on the first output: (x1 + cos x0, x0)
        let g = rule(&[1.0, 0.0, 0.0]).unwrap();
        assert!((g[0] - (2.0 + 0.5_f64.cos())).abs() < 1e-12);
        assert!((g[1] - 0.5).abs() < 1e-12);

        // Cotangent on the second output: (-x1 / x0^2, 1 / x0)
        let g = rule(&[0.0, 1.0, 0.0]).unwrap();
        assert!((g[0] + 8.0).abs() < 1e-12);
        assert!((g[1] - 2.0).abs() < 1e-12);

        // The constant output contributes nothing
        let g = rule(&[0.0, 0.0, 5.0]).unwrap();
        assert_eq!(g, vec![0.0, 0.0]);
    }

    #[test]
    fn test_rule_rejects_wrong_cotangent_length() {
        let (_, rule) = ReverseTape.pullback(&Mixed, &[1.0, 1.0]).unwrap();
        assert!(rule(&[1.0]).is_err());
    }

    #[test]
    fn test_matches_forward_mode() {
        use crate::dual::ForwardDual;
        use crate::hooks::JacobianProvider;

        let x = [1.3, -0.4];
        let jacobian = ForwardDual.jacobian(&Mixed, &x).unwrap();
        let (_, rule) = ReverseTape.pullback(&Mixed, &x).unwrap();
        for k in 0..3 {
            let mut cotangent = [0.0; 3];
            cotangent[k] = 1.0;
            let row = rule(&cotangent).unwrap();
            for j in 0..2 {
                assert!((row[j] - jacobian[[k, j]]).abs() < 1e-12);
            }
        }
    }
}
