//! Tests whether two independently produced sample sets describe the same distribution.
//!
//! The outcome of a test maps to a process exit status with an inverted convention: a test that
//! passes, meaning the samples agree, exits with `1` so that a pipeline driving repeated runs
//! stops, and a failing test exits with `0`.

use crate::error::Error;
use crate::io::SampleTable;
use crate::Result;
use nalgebra as na;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Default threshold of the Gaussian KL divergence.
pub const DEFAULT_KL_THRESHOLD: f64 = 0.01;

/// Coefficient of the 5% critical value of the two-sample KS statistic.
pub const KS_CRITICAL_COEFFICIENT: f64 = 1.36;

fn to_matrix(samples: &[Vec<f64>]) -> Result<na::DMatrix<f64>> {
    let dim = samples.first().map_or(0, Vec::len);

    if dim == 0 {
        return Err(Error::Statistics("samples have no parameters".to_string()));
    }
    if samples.len() <= dim {
        return Err(Error::Statistics(format!(
            "{} samples are not enough to estimate a covariance in {} dimensions",
            samples.len(),
            dim
        )));
    }
    if samples.iter().any(|row| row.len() != dim) {
        return Err(Error::Statistics("samples differ in dimension".to_string()));
    }

    Ok(na::DMatrix::from_fn(samples.len(), dim, |i, j| samples[i][j]))
}

/// Sample mean (as a column vector) and unbiased sample covariance of the rows of `samples`.
fn moments(samples: &na::DMatrix<f64>) -> (na::DVector<f64>, na::DMatrix<f64>) {
    let n = samples.nrows() as f64;
    let mean = samples.row_mean().transpose();

    let centered =
        na::DMatrix::from_fn(samples.nrows(), samples.ncols(), |i, j| samples[(i, j)] - mean[j]);
    let cov = centered.transpose() * &centered / (n - 1.0);

    (mean, cov)
}

/// KL divergence $D(P_1 \| P_2)$ between the multivariate Gaussians fitted to the rows of
/// `first` and `second`, each row being one sample.
pub fn gaussian_kl_divergence(first: &[Vec<f64>], second: &[Vec<f64>]) -> Result<f64> {
    let (mu_1, sigma_1) = moments(&to_matrix(first)?);
    let (mu_2, sigma_2) = moments(&to_matrix(second)?);

    if mu_1.len() != mu_2.len() {
        return Err(Error::Statistics("samples differ in dimension".to_string()));
    }

    let det_1 = sigma_1.determinant();
    let det_2 = sigma_2.determinant();
    if !(det_1 > 0.0 && det_2 > 0.0) {
        return Err(Error::Statistics(
            "sample covariance is not positive definite".to_string(),
        ));
    }

    let sigma_2_inv = sigma_2
        .clone()
        .try_inverse()
        .ok_or_else(|| Error::Statistics("sample covariance is singular".to_string()))?;

    let delta = &mu_2 - &mu_1;
    let trace = (&sigma_2_inv * &sigma_1).trace();
    let mahalanobis = (delta.transpose() * &sigma_2_inv * &delta)[(0, 0)];

    Ok(0.5 * (trace + mahalanobis - mu_1.len() as f64 + (det_2 / det_1).ln()))
}

/// NaN sorts after every other value.
fn cmp_f64(a: &f64, b: &f64) -> Ordering {
    a.partial_cmp(b).unwrap_or_else(|| b.is_nan().cmp(&a.is_nan()).reverse())
}

/// Two-sample Kolmogorov-Smirnov statistic: the largest distance between the empirical
/// distribution functions of `first` and `second`.
pub fn ks_statistic(first: &[f64], second: &[f64]) -> Result<f64> {
    if first.is_empty() || second.is_empty() {
        return Err(Error::Statistics(
            "KS statistic of an empty sample".to_string(),
        ));
    }

    let mut first = first.to_vec();
    let mut second = second.to_vec();
    first.sort_unstable_by(cmp_f64);
    second.sort_unstable_by(cmp_f64);

    let (n, m) = (first.len(), second.len());
    let (mut i, mut j) = (0, 0);
    let mut max_diff: f64 = 0.0;

    while i < n && j < m {
        let x = first[i].min(second[j]);

        while i < n && first[i] <= x {
            i += 1;
        }
        while j < m && second[j] <= x {
            j += 1;
        }

        max_diff = max_diff.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }

    Ok(max_diff)
}

/// Statistic used to compare two sample sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TestMethod {
    /// KL divergence of Gaussians fitted to the samples.
    Lame,
    /// Largest one-dimensional KS statistic over all parameters.
    Ks1d,
}

impl FromStr for TestMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lame" => Ok(Self::Lame),
            "ks1d" => Ok(Self::Ks1d),
            _ => Err(Error::Statistics(format!("unknown test method '{}'", s))),
        }
    }
}

impl fmt::Display for TestMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lame => write!(f, "lame"),
            Self::Ks1d => write!(f, "ks1d"),
        }
    }
}

/// Result of a [`ConvergenceTest`].
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct TestOutcome {
    /// Value of the test statistic.
    pub statistic: f64,
    /// Threshold the statistic was compared to.
    pub threshold: f64,
    /// `true` if the statistic is below the threshold.
    pub passed: bool,
}

impl TestOutcome {
    /// Process exit status: `1` if the test passed, `0` otherwise.
    pub fn exit_code(&self) -> i32 {
        i32::from(self.passed)
    }
}

/// Compares two sample tables on a set of parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvergenceTest {
    method: TestMethod,
    threshold: Option<f64>,
}

impl ConvergenceTest {
    /// A test with the default threshold of `method`.
    pub fn new(method: TestMethod) -> Self {
        Self {
            method,
            threshold: None,
        }
    }

    /// Replace the default threshold.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// The statistic this test computes.
    pub fn method(&self) -> TestMethod {
        self.method
    }

    /// Compare the columns `parameters` of `first` and `second`.
    pub fn run<S: AsRef<str>>(
        &self,
        first: &SampleTable,
        second: &SampleTable,
        parameters: &[S],
    ) -> Result<TestOutcome> {
        if parameters.is_empty() {
            return Err(crate::error::ConfigurationError::EmptyParameterList.into());
        }

        let (statistic, default_threshold) = match self.method {
            TestMethod::Lame => {
                let statistic =
                    gaussian_kl_divergence(&first.select(parameters)?, &second.select(parameters)?)?;
                (statistic, DEFAULT_KL_THRESHOLD)
            }
            TestMethod::Ks1d => {
                let mut statistic: f64 = 0.0;
                for parameter in parameters {
                    let d = ks_statistic(
                        &first.column(parameter.as_ref())?,
                        &second.column(parameter.as_ref())?,
                    )?;
                    statistic = statistic.max(d);
                }

                let (n, m) = (first.len() as f64, second.len() as f64);
                (statistic, KS_CRITICAL_COEFFICIENT * ((n + m) / (n * m)).sqrt())
            }
        };

        let threshold = self.threshold.unwrap_or(default_threshold);

        Ok(TestOutcome {
            statistic,
            threshold,
            passed: statistic < threshold,
        })
    }
}
