//! The core module
pub mod estimators;

/// A real function of one real variable, used for densities, priors and inverse CDFs.
///
/// Implemented for every `Fn(f64) -> f64` that can be shared between threads, so closures can
/// be registered directly.
pub trait ScalarFunction: Send + Sync {
    /// Evaluate the function at `x`.
    fn apply(&self, x: f64) -> f64;
}

impl<F> ScalarFunction for F
where
    F: Fn(f64) -> f64 + Send + Sync,
{
    fn apply(&self, x: f64) -> f64 {
        self(x)
    }
}

/// Trait which every integrand must implement.
///
/// An integrand is evaluated on a whole batch of points at once. Each point holds one value per
/// integrated parameter, in the order the parameters were named when calling the integrator. The
/// returned vector must have one value per point.
pub trait Integrand {
    /// Evaluate the integrand on every point of `points`.
    fn call(&self, points: &[Vec<f64>]) -> Vec<f64>;
}

impl<F> Integrand for F
where
    F: Fn(&[Vec<f64>]) -> Vec<f64> + ?Sized,
{
    fn call(&self, points: &[Vec<f64>]) -> Vec<f64> {
        self(points)
    }
}

/// Adapts a function of a single point into an [`Integrand`].
///
/// ```
/// use mcsampler::core::{Integrand, Pointwise};
///
/// let integrand = Pointwise(|x: &[f64]| x[0] * x[1]);
/// assert_eq!(integrand.call(&[vec![2.0, 3.0], vec![1.0, 0.5]]), vec![6.0, 0.5]);
/// ```
pub struct Pointwise<F>(pub F);

impl<F> Integrand for Pointwise<F>
where
    F: Fn(&[f64]) -> f64,
{
    fn call(&self, points: &[Vec<f64>]) -> Vec<f64> {
        points.iter().map(|x| (self.0)(x)).collect()
    }
}
