//! Gradient checking utilities
//!
//! Verifies a pullback against finite differences of the forward mapping.
//! For an upstream gradient `G`, the numerical gradient at element `x[r, c]`
//! is the directional derivative of `<G, f(x)>`:
//!
//! - **Central difference**: `[<G, f(x+h)> - <G, f(x-h)>] / (2h)` (default)
//! - **Forward difference**: `[<G, f(x+h)> - <G, f(x)>] / h`
//!
//! # Example
//!
//! ```
//! use slicemap_ad::gradcheck::{check_pullback, GradCheckConfig};
//! use slicemap_core::{Matrix, Scalar, SliceFn};
//!
//! struct Softplus;
//!
//! impl SliceFn<f64> for Softplus {
//!     fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
//!         Ok(x.iter().map(|v| (v.exp() + S::constant(1.0)).ln()).collect())
//!     }
//! }
//!
//! let x = Matrix::from_fn(2, 3, |r, c| 0.3 * r as f64 - 0.2 * c as f64);
//! let g = Matrix::from_fn(2, 3, |_, _| 1.0);
//! let result = check_pullback(&Softplus, &x, &g, &GradCheckConfig::default()).unwrap();
//! assert!(result.passed);
//! ```

use anyhow::{anyhow, Result};
use scirs2_core::numeric::NumCast;
use slicemap_core::{Element, Matrix, SliceFn};
use slicemap_exec::map_columns;

use crate::dynamic::map_cols;
use crate::fixed::map_cols_static;

/// Gradient checking configuration
#[derive(Debug, Clone)]
pub struct GradCheckConfig {
    /// Step size for finite differences (default: 1e-5)
    pub epsilon: f64,

    /// Relative tolerance for gradient comparison (default: 1e-3)
    pub rtol: f64,

    /// Absolute tolerance for gradient comparison (default: 1e-5)
    pub atol: f64,

    /// Use central difference (more accurate but 2x slower)
    pub use_central_diff: bool,

    /// Log every mismatching element
    pub verbose: bool,
}

impl Default for GradCheckConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            rtol: 1e-3,
            atol: 1e-5,
            use_central_diff: true,
            verbose: false,
        }
    }
}

/// Result of gradient checking
#[derive(Debug)]
pub struct GradCheckResult {
    /// Maximum absolute difference between analytical and numerical gradients
    pub max_abs_diff: f64,

    /// Maximum relative difference
    pub max_rel_diff: f64,

    /// Whether the gradient check passed
    pub passed: bool,

    /// Number of elements checked
    pub num_elements: usize,

    /// Number of elements that failed the check
    pub num_failures: usize,
}

/// Check an analytical gradient against finite differences
///
/// # Arguments
///
/// * `f` - Forward mapping: x -> y
/// * `df` - Gradient function: (x, grad_y) -> grad_x
/// * `x` - Input matrix to check gradients at
/// * `grad_y` - Upstream gradient (∂L/∂y)
/// * `config` - Gradient checking configuration
pub fn check_gradient<T, F, G>(
    f: F,
    df: G,
    x: &Matrix<T>,
    grad_y: &Matrix<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Element,
    F: Fn(&Matrix<T>) -> Result<Matrix<T>>,
    G: Fn(&Matrix<T>, &Matrix<T>) -> Result<Matrix<T>>,
{
    let analytical = df(x, grad_y)?;
    if analytical.shape() != x.shape() {
        return Err(anyhow!(
            "Gradient shape {:?} doesn't match input shape {:?}",
            analytical.shape(),
            x.shape()
        ));
    }

    let numerical = numerical_gradient(f, x, grad_y, config)?;
    compare_gradients(&analytical, &numerical, config)
}

/// Check the reverse-mode pullback of [`map_cols`] for `f` at `x`
pub fn check_pullback<T, F>(
    f: &F,
    x: &Matrix<T>,
    grad_y: &Matrix<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Element,
    F: SliceFn<T>,
{
    check_gradient(
        |m: &Matrix<T>| evaluate(f, m),
        |m: &Matrix<T>, g: &Matrix<T>| {
            let (_, pullback) = map_cols(f, m)?;
            Ok(pullback.backward(g)?)
        },
        x,
        grad_y,
        config,
    )
}

/// Check the Jacobian-based pullback of [`map_cols_static`] for `f` at `x`
pub fn check_static_pullback<const D: usize, T, F>(
    f: &F,
    x: &Matrix<T>,
    grad_y: &Matrix<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult>
where
    T: Element,
    F: SliceFn<T> + Sync,
{
    check_gradient(
        |m: &Matrix<T>| evaluate(f, m),
        |m: &Matrix<T>, g: &Matrix<T>| {
            let (_, pullback) = map_cols_static::<D, _, _>(f, m)?;
            Ok(pullback.backward(g)?)
        },
        x,
        grad_y,
        config,
    )
}

/// Plain forward evaluation of `f` over every column
fn evaluate<T: Element, F: SliceFn<T>>(f: &F, m: &Matrix<T>) -> Result<Matrix<T>> {
    Ok(map_columns(|column: &[T]| f.apply(column), m)?)
}

fn numerical_gradient<T, F>(
    f: F,
    x: &Matrix<T>,
    grad_y: &Matrix<T>,
    config: &GradCheckConfig,
) -> Result<Matrix<T>>
where
    T: Element,
    F: Fn(&Matrix<T>) -> Result<Matrix<T>>,
{
    let epsilon =
        <T as NumCast>::from(config.epsilon).ok_or_else(|| anyhow!("Failed to convert epsilon"))?;
    let mut numerical = Matrix::zeros(x.dim(), x.batch());

    let base = if config.use_central_diff {
        None
    } else {
        Some(dot(grad_y, &f(x)?)?)
    };

    for idx in 0..x.len() {
        let mut x_plus = x.clone();
        x_plus.as_mut_slice()[idx] = x.as_slice()[idx] + epsilon;
        let plus = dot(grad_y, &f(&x_plus)?)?;

        numerical.as_mut_slice()[idx] = match base {
            Some(base) => (plus - base) / epsilon,
            None => {
                let mut x_minus = x.clone();
                x_minus.as_mut_slice()[idx] = x.as_slice()[idx] - epsilon;
                let minus = dot(grad_y, &f(&x_minus)?)?;
                (plus - minus) / (epsilon + epsilon)
            }
        };
    }

    Ok(numerical)
}

/// Frobenius inner product
fn dot<T: Element>(a: &Matrix<T>, b: &Matrix<T>) -> Result<T> {
    if a.shape() != b.shape() {
        return Err(anyhow!(
            "Shape mismatch: {:?} vs {:?}",
            a.shape(),
            b.shape()
        ));
    }
    Ok(a.as_slice()
        .iter()
        .zip(b.as_slice())
        .fold(T::zero(), |acc, (&p, &q)| acc + p * q))
}

fn compare_gradients<T: Element>(
    analytical: &Matrix<T>,
    numerical: &Matrix<T>,
    config: &GradCheckConfig,
) -> Result<GradCheckResult> {
    let rtol = <T as NumCast>::from(config.rtol).ok_or_else(|| anyhow!("Failed to convert rtol"))?;
    let atol = <T as NumCast>::from(config.atol).ok_or_else(|| anyhow!("Failed to convert atol"))?;

    let mut max_abs_diff = 0.0_f64;
    let mut max_rel_diff = 0.0_f64;
    let mut num_failures = 0;

    for (idx, (&a_val, &n_val)) in analytical
        .as_slice()
        .iter()
        .zip(numerical.as_slice())
        .enumerate()
    {
        let abs_diff = (a_val - n_val).abs();
        let rel_diff = if n_val.abs() > T::epsilon() {
            abs_diff / n_val.abs()
        } else {
            abs_diff
        };

        max_abs_diff = max_abs_diff.max(abs_diff.to_f64().ok_or_else(|| anyhow!("Conversion error"))?);
        max_rel_diff = max_rel_diff.max(rel_diff.to_f64().ok_or_else(|| anyhow!("Conversion error"))?);

        if abs_diff > atol && rel_diff > rtol {
            num_failures += 1;
            if config.verbose {
                let (row, col) = (idx % analytical.dim().max(1), idx / analytical.dim().max(1));
                tracing::warn!(
                    row,
                    col,
                    analytical = %a_val,
                    numerical = %n_val,
                    abs_diff = %abs_diff,
                    rel_diff = %rel_diff,
                    "gradient mismatch"
                );
            }
        }
    }

    let passed = num_failures == 0;
    if config.verbose {
        tracing::info!(
            passed,
            num_failures,
            num_elements = analytical.len(),
            max_abs_diff,
            max_rel_diff,
            "gradient check finished"
        );
    }

    Ok(GradCheckResult {
        max_abs_diff,
        max_rel_diff,
        passed,
        num_elements: analytical.len(),
        num_failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use slicemap_core::Scalar;

    struct Trig;

    impl SliceFn<f64> for Trig {
        fn apply<S: Scalar<f64>>(&self, x: &[S]) -> anyhow::Result<Vec<S>> {
            Ok(vec![
                x[0].sin() * x[1].cos(),
                (x[0].clone() * x[1].clone()).tanh(),
                x[1].sqrt(),
            ])
        }
    }

    fn sample() -> Matrix<f64> {
        Matrix::from_fn(2, 5, |r, c| 0.4 + 0.3 * r as f64 + 0.15 * c as f64)
    }

    #[test]
    fn test_gradcheck_identity() {
        let f = |x: &Matrix<f64>| Ok(x.clone());
        let df = |_x: &Matrix<f64>, grad_y: &Matrix<f64>| Ok(grad_y.clone());

        let x = Matrix::from_fn(2, 3, |_, _| 1.0);
        let grad_y = Matrix::from_fn(2, 3, |_, _| 1.0);

        let result = check_gradient(f, df, &x, &grad_y, &GradCheckConfig::default()).unwrap();
        assert!(result.passed, "Gradient check should pass for identity");
        assert!(result.max_abs_diff < 1e-6);
        assert_eq!(result.num_elements, 6);
    }

    #[test]
    fn test_gradcheck_detects_wrong_gradient() {
        let f = |x: &Matrix<f64>| Ok(Matrix::from_fn(x.dim(), x.batch(), |r, c| x[(r, c)].powi(2)));
        // Missing factor 2
        let df = |x: &Matrix<f64>, g: &Matrix<f64>| {
            Ok(Matrix::from_fn(x.dim(), x.batch(), |r, c| x[(r, c)] * g[(r, c)]))
        };

        let x = sample();
        let g = Matrix::from_fn(2, 5, |_, _| 1.0);
        let result = check_gradient(f, df, &x, &g, &GradCheckConfig::default()).unwrap();
        assert!(!result.passed);
        assert_eq!(result.num_failures, 10);
    }

    #[test]
    fn test_gradcheck_forward_difference() {
        let config = GradCheckConfig {
            epsilon: 1e-7,
            rtol: 1e-3,
            atol: 1e-4,
            use_central_diff: false,
            verbose: false,
        };
        let x = sample();
        let g = Matrix::from_fn(3, 5, |r, c| 1.0 + r as f64 - 0.1 * c as f64);
        let result = check_pullback(&Trig, &x, &g, &config).unwrap();
        assert!(result.passed, "max rel diff {}", result.max_rel_diff);
    }

    #[test]
    fn test_pullbacks_pass_gradcheck() {
        let x = sample();
        let g = Matrix::from_fn(3, 5, |r, c| 0.5 - 0.2 * r as f64 + 0.3 * c as f64);
        let config = GradCheckConfig::default();

        let dynamic = check_pullback(&Trig, &x, &g, &config).unwrap();
        assert!(dynamic.passed, "max rel diff {}", dynamic.max_rel_diff);

        let fixed = check_static_pullback::<2, _, _>(&Trig, &x, &g, &config).unwrap();
        assert!(fixed.passed, "max rel diff {}", fixed.max_rel_diff);
    }

    #[test]
    fn test_gradcheck_shape_error() {
        let f = |x: &Matrix<f64>| Ok(x.clone());
        let df = |_x: &Matrix<f64>, _g: &Matrix<f64>| Ok(Matrix::zeros(1, 1));
        let x = sample();
        assert!(check_gradient(f, df, &x, &x, &GradCheckConfig::default()).is_err());
    }

    #[test]
    fn test_gradcheck_config_default() {
        let config = GradCheckConfig::default();
        assert_eq!(config.epsilon, 1e-5);
        assert_eq!(config.rtol, 1e-3);
        assert!(config.use_central_diff);
    }
}
