//! Forward-mode dual numbers
//!
//! A [`Dual<T, N>`] carries a primal value and `N` directional derivatives.
//! Evaluating a [`SliceFn`] once on inputs seeded with the `D` unit directions
//! yields the full `e × D` Jacobian of that slice, which is what
//! [`ForwardDual`] does for the static differentiable wrapper.
//!
//! # Examples
//!
//! ```
//! use slicemap_ad::dual::Dual;
//! use slicemap_core::Scalar;
//!
//! // d/dx (x * sin x) at x = 1
//! let x = Dual::<f64, 1>::seeded(1.0, 0);
//! let y = x * Scalar::sin(&x);
//! assert!((y.partials[0] - (1.0_f64.sin() + 1.0_f64.cos())).abs() < 1e-12);
//! ```

use scirs2_core::ndarray_ext::Array2;
use scirs2_core::numeric::NumCast;
use std::ops::{Add, Div, Mul, Neg, Sub};

use slicemap_core::{Element, Scalar, SliceFn};

use crate::hooks::JacobianProvider;

/// Dual number with `N` tangent directions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dual<T, const N: usize> {
    /// Primal value
    pub value: T,

    /// Derivative along each seeded direction
    pub partials: [T; N],
}

impl<T: Element, const N: usize> Dual<T, N> {
    /// A constant: all partials zero
    pub fn constant(value: T) -> Self {
        Self {
            value,
            partials: [T::zero(); N],
        }
    }

    /// An input seeded along direction `direction`
    ///
    /// A direction outside `0..N` yields a constant.
    pub fn seeded(value: T, direction: usize) -> Self {
        let mut partials = [T::zero(); N];
        if let Some(slot) = partials.get_mut(direction) {
            *slot = T::one();
        }
        Self { value, partials }
    }

    /// Apply a function with derivative `derivative` at the primal value
    fn chain(&self, value: T, derivative: T) -> Self {
        Self {
            value,
            partials: self.partials.map(|p| p * derivative),
        }
    }
}

impl<T: Element, const N: usize> Add for Dual<T, N> {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            value: self.value + rhs.value,
            partials: std::array::from_fn(|i| self.partials[i] + rhs.partials[i]),
        }
    }
}

impl<T: Element, const N: usize> Sub for Dual<T, N> {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            value: self.value - rhs.value,
            partials: std::array::from_fn(|i| self.partials[i] - rhs.partials[i]),
        }
    }
}

impl<T: Element, const N: usize> Mul for Dual<T, N> {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        Self {
            value: self.value * rhs.value,
            partials: std::array::from_fn(|i| {
                self.partials[i] * rhs.value + self.value * rhs.partials[i]
            }),
        }
    }
}

impl<T: Element, const N: usize> Div for Dual<T, N> {
    type Output = Self;

    fn div(self, rhs: Self) -> Self {
        let denom = rhs.value * rhs.value;
        Self {
            value: self.value / rhs.value,
            partials: std::array::from_fn(|i| {
                (self.partials[i] * rhs.value - self.value * rhs.partials[i]) / denom
            }),
        }
    }
}

impl<T: Element, const N: usize> Neg for Dual<T, N> {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            value: -self.value,
            partials: self.partials.map(|p| -p),
        }
    }
}

impl<T: Element, const N: usize> Scalar<T> for Dual<T, N> {
    fn constant(value: T) -> Self {
        Dual::constant(value)
    }

    fn value(&self) -> T {
        self.value
    }

    fn exp(&self) -> Self {
        let e = self.value.exp();
        self.chain(e, e)
    }

    fn ln(&self) -> Self {
        self.chain(self.value.ln(), self.value.recip())
    }

    fn sin(&self) -> Self {
        self.chain(self.value.sin(), self.value.cos())
    }

    fn cos(&self) -> Self {
        self.chain(self.value.cos(), -self.value.sin())
    }

    fn tanh(&self) -> Self {
        let t = self.value.tanh();
        self.chain(t, T::one() - t * t)
    }

    fn sqrt(&self) -> Self {
        let s = self.value.sqrt();
        self.chain(s, (s + s).recip())
    }

    fn powi(&self, n: i32) -> Self {
        if n == 0 {
            return Dual::constant(T::one());
        }
        let factor = <T as NumCast>::from(n).unwrap_or_else(T::nan);
        self.chain(self.value.powi(n), factor * self.value.powi(n - 1))
    }
}

/// Jacobian provider backed by forward-mode dual numbers
///
/// One evaluation of the mapped function with `D` seeded directions produces
/// the full Jacobian of a slice.
#[derive(Debug, Clone, Copy, Default)]
pub struct ForwardDual;

impl<T: Element> JacobianProvider<T> for ForwardDual {
    fn jacobian<const D: usize, F: SliceFn<T>>(&self, f: &F, x: &[T; D]) -> anyhow::Result<Array2<T>> {
        let seeded: Vec<Dual<T, D>> = x
            .iter()
            .enumerate()
            .map(|(direction, &value)| Dual::seeded(value, direction))
            .collect();
        let out = f.apply(&seeded)?;
        Ok(Array2::from_shape_fn((out.len(), D), |(k, j)| {
            out[k].partials[j]
        }))
    }
}
