//! Element and scalar abstractions shared by every mapper
//!
//! - [`Element`] is the storage type of a [`Matrix`](crate::Matrix) (`f32` or `f64`).
//! - [`Scalar`] is the number type a mapped function is evaluated on. Plain
//!   elements are scalars of themselves; the AD crate adds forward-mode dual
//!   numbers and reverse-mode tape variables.
//! - [`SliceFn`] is a mapped function written once, generically over the scalar,
//!   so the same body can be evaluated, pushed forward and pulled back.

use scirs2_core::numeric::{Float, NumCast};
use std::fmt::{Debug, Display};
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Number type a mapped function is evaluated on
///
/// `T` is the underlying element type. Arithmetic is by value; clone operands
/// that are used more than once.
pub trait Scalar<T: Float>:
    Clone
    + Debug
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
{
    /// Lift a constant (no derivative information)
    fn constant(value: T) -> Self;

    /// Primal value
    fn value(&self) -> T;

    fn exp(&self) -> Self;
    fn ln(&self) -> Self;
    fn sin(&self) -> Self;
    fn cos(&self) -> Self;
    fn tanh(&self) -> Self;
    fn sqrt(&self) -> Self;
    fn powi(&self, n: i32) -> Self;

    /// Lift an `f64` literal
    fn from_f64(value: f64) -> Self {
        Self::constant(<T as NumCast>::from(value).unwrap_or_else(T::nan))
    }

    /// Multiply by a constant factor
    fn scale(&self, factor: T) -> Self {
        self.clone() * Self::constant(factor)
    }
}

/// Numeric element stored in a matrix
pub trait Element: Float + Scalar<Self> + Debug + Display + Send + Sync + 'static {}

macro_rules! impl_element {
    ($($t:ty),*) => {
        $(
            impl Scalar<$t> for $t {
                fn constant(value: $t) -> Self {
                    value
                }

                fn value(&self) -> $t {
                    *self
                }

                fn exp(&self) -> Self {
                    <$t>::exp(*self)
                }

                fn ln(&self) -> Self {
                    <$t>::ln(*self)
                }

                fn sin(&self) -> Self {
                    <$t>::sin(*self)
                }

                fn cos(&self) -> Self {
                    <$t>::cos(*self)
                }

                fn tanh(&self) -> Self {
                    <$t>::tanh(*self)
                }

                fn sqrt(&self) -> Self {
                    <$t>::sqrt(*self)
                }

                fn powi(&self, n: i32) -> Self {
                    <$t>::powi(*self, n)
                }
            }

            impl Element for $t {}
        )*
    };
}

impl_element!(f32, f64);

/// A function mapped over slices
///
/// Implementors describe `f: Slice[d] -> Slice[e]` once, generically over the
/// scalar type. The mappers never inspect the body; they only evaluate it.
///
/// Implementations used with the parallel mappers must be safe to call from
/// several threads at once and must not rely on hidden shared mutable state.
///
/// # Examples
///
/// ```
/// use slicemap_core::{Scalar, SliceFn};
///
/// struct SumOfSquares;
///
/// impl SliceFn<f64> for SumOfSquares {
///     fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
///         let total = x
///             .iter()
///             .fold(S::constant(0.0), |acc, v| acc + v.clone() * v.clone());
///         Ok(vec![total])
///     }
/// }
///
/// let out = SumOfSquares.apply(&[1.0_f64, 2.0, 3.0]).unwrap();
/// assert_eq!(out, vec![14.0]);
/// ```
pub trait SliceFn<T: Element> {
    /// Evaluate the function on one slice
    fn apply<S: Scalar<T>>(&self, x: &[S]) -> anyhow::Result<Vec<S>>;
}

impl<T: Element, F: SliceFn<T> + ?Sized> SliceFn<T> for &F {
    fn apply<S: Scalar<T>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
        (**self).apply(x)
    }
}
