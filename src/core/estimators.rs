//! This module contains everything related to estimators.
use num_traits::{Float, FromPrimitive};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Basic estimators, like the mean, variance, and the standard deviation.
pub trait BasicEstimators<T: Float> {
    /// Returns the mean value.
    fn mean(&self) -> T;

    /// Returns the variance, $V$.
    fn var(&self) -> T;

    /// Returns the standard deviation, $\sigma = \sqrt{V}$.
    fn std(&self) -> T {
        self.var().sqrt()
    }
}

/// More estimators.
pub trait Estimators<T: Float>: BasicEstimators<T> {
    /// Returns the number of times $N$, the integrand has been called.
    fn calls(&self) -> usize;

    /// Returns the number of times, $N_\mathrm{nf}$, the integrand has been called
    /// and its weighted value was non-finite.
    fn non_finite_calls(&self) -> usize;

    /// Returns the number of times, $N_\mathrm{nz}$, the integrand has been called
    /// and its weighted value was non-zero.
    fn non_zero_calls(&self) -> usize;
}

/// A struct implementing the `BasicEstimator<T>` trait.
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MeanVar<T> {
    mean: T,
    var: T,
}

impl<T: std::ops::Add<Output = T>> Add for MeanVar<T> {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            mean: self.mean + other.mean,
            var: self.var + other.var,
        }
    }
}

impl<T: std::ops::Add<Output = T> + AddAssign> AddAssign for MeanVar<T> {
    fn add_assign(&mut self, other: Self) {
        self.mean += other.mean;
        self.var += other.var;
    }
}

impl<T> MeanVar<T> {
    /// Constructor.
    pub const fn new(mean: T, var: T) -> Self {
        Self { mean, var }
    }
}

impl<T: Float> BasicEstimators<T> for MeanVar<T> {
    fn mean(&self) -> T {
        self.mean
    }

    fn var(&self) -> T {
        self.var
    }
}

/// Running state of one importance-sampling integration.
///
/// Every sample contributes its weighted value $z = f(x)\, \pi(x) / q(x)$, where $f$ is the
/// integrand, $\pi$ the target density and $q$ the proposal density. The estimate of the integral
/// is the mean of $z$, and the effective sample size is
///
/// $$ n_\mathrm{eff} = \frac{\left(\sum_j z_j\right)^2}{\sum_j z_j^2} $$
///
/// which never exceeds the number of calls. Non-finite values are counted and contribute zero.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportanceEstimators<T> {
    sum: T,
    sumsq: T,
    calls: usize,
    non_finite_calls: usize,
    non_zero_calls: usize,
}

impl<T: Float> Default for ImportanceEstimators<T> {
    fn default() -> Self {
        Self {
            sum: T::zero(),
            sumsq: T::zero(),
            calls: 0,
            non_finite_calls: 0,
            non_zero_calls: 0,
        }
    }
}

impl<T> ImportanceEstimators<T>
where
    T: Float + AddAssign,
{
    /// Fold the weighted value of one sample into the estimators.
    pub fn update(&mut self, value: T) {
        self.calls += 1;

        if value != T::zero() {
            self.non_zero_calls += 1;

            if value.is_finite() {
                self.sum += value;
                self.sumsq += value * value;
            } else {
                self.non_finite_calls += 1;
            }
        }
    }
}

impl<T> ImportanceEstimators<T>
where
    T: Float + FromPrimitive,
{
    /// Returns the effective sample size. It is zero as long as every weighted value was zero.
    pub fn neff(&self) -> T {
        if self.sumsq > T::zero() {
            self.sum * self.sum / self.sumsq
        } else {
            T::zero()
        }
    }

    fn calls_as_float(&self) -> T {
        T::from_usize(self.calls).unwrap_or_else(T::max_value)
    }
}

impl<T> BasicEstimators<T> for ImportanceEstimators<T>
where
    T: Float + FromPrimitive,
{
    fn mean(&self) -> T {
        if self.calls == 0 {
            return T::zero();
        }

        self.sum / self.calls_as_float()
    }

    /// Variance of the estimate of the mean. Infinite with fewer than two calls.
    fn var(&self) -> T {
        if self.calls < 2 {
            return T::infinity();
        }

        let calls = self.calls_as_float();
        let var = (self.sumsq - self.sum * self.sum / calls) / calls / (calls - T::one());

        // rounding can make the difference slightly negative for constant values
        var.max(T::zero())
    }
}

impl<T> Estimators<T> for ImportanceEstimators<T>
where
    T: Float + FromPrimitive,
{
    fn calls(&self) -> usize {
        self.calls
    }

    fn non_finite_calls(&self) -> usize {
        self.non_finite_calls
    }

    fn non_zero_calls(&self) -> usize {
        self.non_zero_calls
    }
}
