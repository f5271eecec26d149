//! The sample trace of an integration and the convergence series derived from it.
//!
//! Everything in here is computed from a finished [`SampleTrace`]; nothing feeds back into the
//! integration that produced it.

use crate::core::estimators::{BasicEstimators, Estimators, ImportanceEstimators};
use crate::error::ConfigurationError;
use crate::histograms::{HistogramEstimators, HistogramSpecification};
use serde::{Deserialize, Serialize};

/// One point drawn during an integration.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Sample {
    /// Values of the integrated parameters.
    pub point: Vec<f64>,
    /// Value of the integrand at `point`.
    pub value: f64,
    /// Importance weight, the ratio of target to proposal density at `point`.
    pub weight: f64,
}

impl Sample {
    /// Natural logarithm of the integrand value.
    pub fn ln_l(&self) -> f64 {
        self.value.ln()
    }

    /// Contribution of this sample to the integral estimate.
    pub fn weighted_value(&self) -> f64 {
        self.weight * self.value
    }
}

/// Estimates after a batch of samples, accumulated over all batches so far.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BatchSummary {
    /// Number of samples drawn so far.
    pub calls: usize,
    /// Estimate of the integral.
    pub integral: f64,
    /// Variance of the estimate.
    pub variance: f64,
    /// Effective sample size.
    pub neff: f64,
}

impl From<&ImportanceEstimators<f64>> for BatchSummary {
    fn from(estimators: &ImportanceEstimators<f64>) -> Self {
        Self {
            calls: estimators.calls(),
            integral: estimators.mean(),
            variance: estimators.var(),
            neff: estimators.neff(),
        }
    }
}

/// Every sample of an integration in the order it was drawn, split into batches.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(try_from = "TraceData")]
pub struct SampleTrace {
    names: Vec<String>,
    samples: Vec<Sample>,
    batch_ends: Vec<usize>,
}

#[derive(Deserialize)]
struct TraceData {
    names: Vec<String>,
    samples: Vec<Sample>,
    batch_ends: Vec<usize>,
}

impl TryFrom<TraceData> for SampleTrace {
    type Error = String;

    fn try_from(data: TraceData) -> Result<Self, Self::Error> {
        if let Some(sample) = data
            .samples
            .iter()
            .find(|sample| sample.point.len() != data.names.len())
        {
            return Err(format!(
                "sample with {} components in a trace over {} parameters",
                sample.point.len(),
                data.names.len()
            ));
        }

        let mut start = 0;
        for &end in &data.batch_ends {
            if end <= start || end > data.samples.len() {
                return Err(format!(
                    "batch end {} is not in ({}, {}]",
                    end,
                    start,
                    data.samples.len()
                ));
            }
            start = end;
        }

        Ok(Self {
            names: data.names,
            samples: data.samples,
            batch_ends: data.batch_ends,
        })
    }
}

impl SampleTrace {
    /// Creates an empty trace over the parameters `names`.
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|name| name.to_string()).collect(),
            samples: Vec::new(),
            batch_ends: Vec::new(),
        }
    }

    /// Appends a sample to the current batch.
    pub fn push(&mut self, sample: Sample) {
        debug_assert_eq!(sample.point.len(), self.names.len());
        self.samples.push(sample);
    }

    /// Closes the current batch. Empty batches are not recorded.
    pub fn end_batch(&mut self) {
        if self.batch_ends.last().copied().unwrap_or(0) < self.samples.len() {
            self.batch_ends.push(self.samples.len());
        }
    }

    /// Names of the parameters, in the order of the components of every point.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// All samples.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// Number of samples after each batch.
    pub fn batch_ends(&self) -> &[usize] {
        &self.batch_ends
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if the trace holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The importance weight of every sample.
    pub fn weights(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.weight).collect()
    }

    /// Rows `(param_1, ..., param_k, lnL)`, one per sample.
    pub fn rows(&self) -> impl Iterator<Item = Vec<f64>> + '_ {
        self.samples.iter().map(|sample| {
            let mut row = Vec::with_capacity(sample.point.len() + 1);
            row.extend_from_slice(&sample.point);
            row.push(sample.ln_l());
            row
        })
    }

    /// Derived convergence series of this trace.
    pub fn diagnostics(&self) -> Diagnostics<'_> {
        Diagnostics { trace: self }
    }
}

/// Convergence series computed from a [`SampleTrace`]. Every method replays the trace from the
/// start and can be called any number of times.
#[derive(Clone, Copy, Debug)]
pub struct Diagnostics<'a> {
    trace: &'a SampleTrace,
}

impl<'a> Diagnostics<'a> {
    /// Running maximum of lnL, one value per sample. Samples with an undefined lnL do not change
    /// the maximum.
    pub fn running_max_ln_l(&self) -> impl Iterator<Item = f64> + 'a {
        self.trace
            .samples
            .iter()
            .scan(f64::NEG_INFINITY, |max, sample| {
                *max = max.max(sample.ln_l());
                Some(*max)
            })
    }

    /// Logarithm of the running integral estimate, one value per sample. This is the marginal
    /// lnL after each sample.
    pub fn running_ln_integral(&self) -> impl Iterator<Item = f64> + 'a {
        self.trace.samples.iter().scan(
            ImportanceEstimators::<f64>::default(),
            |estimators, sample| {
                estimators.update(sample.weighted_value());
                Some(estimators.mean().ln())
            },
        )
    }

    /// The estimates after each batch, computed with the same estimators as the integrator.
    pub fn cumulative_integral(&self) -> Vec<BatchSummary> {
        let mut estimators = ImportanceEstimators::<f64>::default();
        let mut start = 0;

        self.trace
            .batch_ends
            .iter()
            .map(|&end| {
                for sample in &self.trace.samples[start..end] {
                    estimators.update(sample.weighted_value());
                }
                start = end;
                BatchSummary::from(&estimators)
            })
            .collect()
    }

    /// Weighted marginal histogram of the parameter `name`. The means of all bins add up to the
    /// part of the integral estimate that falls into the binned range.
    pub fn marginal_histogram(
        &self,
        name: &str,
        specification: HistogramSpecification,
    ) -> Result<HistogramEstimators, ConfigurationError> {
        let index = self
            .trace
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| ConfigurationError::UnknownParameter(name.to_string()))?;

        let mut accumulator = specification.get_accumulator();
        for sample in &self.trace.samples {
            accumulator.fill(sample.point[index], sample.weighted_value());
        }

        Ok(accumulator.to_histogram_estimator(self.trace.len()))
    }
}
