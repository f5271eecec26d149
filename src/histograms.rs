//! This module contains everything related to histograms.
use crate::core::estimators::{BasicEstimators, MeanVar};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Define a one-dimensional histogram of a parameter.
///
/// The range from `left` to `right` (both inclusive) is subdivided into `bins` bins of equal
/// width. The histogram carries the `label` of the parameter on its axis.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct HistogramSpecification {
    left: f64,
    right: f64,
    bins: usize,
    label: String,
}

impl HistogramSpecification {
    /// Construct a histogram with `bins` bins between `left` and `right`.
    pub fn new(left: f64, right: f64, bins: usize, label: &str) -> Self {
        debug_assert!(left < right);
        debug_assert!(bins > 0);
        Self {
            left,
            right,
            bins,
            label: label.to_string(),
        }
    }

    /// Returns the left boundary of the binned range.
    pub fn left(&self) -> f64 {
        self.left
    }

    /// Returns the right boundary of the binned range.
    pub fn right(&self) -> f64 {
        self.right
    }

    /// Returns the number of bins.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Returns the label of the axis.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the `bins + 1` edges of the bins.
    pub fn edges(&self) -> Vec<f64> {
        let width = (self.right - self.left) / self.bins as f64;
        (0..=self.bins)
            .map(|i| self.left + width * i as f64)
            .collect()
    }

    /// Get an empty accumulator for the histogram.
    pub(crate) fn get_accumulator(&self) -> HistogramAccumulator {
        HistogramAccumulator {
            sums: vec![(0.0, 0.0); self.bins],
            specification: self.clone(),
        }
    }

    /// Compute the index of the bin into which `x` belongs. The right boundary belongs to the
    /// last bin.
    fn compute_bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.left && x <= self.right) {
            return None;
        }

        let index = ((x - self.left) / (self.right - self.left) * self.bins as f64) as usize;

        Some(index.min(self.bins - 1))
    }
}

/// Intermediate representation of a histogram.
///
/// For each bin, the sum and the sum of the squares of the values filled into it are stored.
/// Accumulators of the same specification can be combined using the `Add` trait before
/// converting them to [`HistogramEstimators`].
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct HistogramAccumulator {
    sums: Vec<(f64, f64)>,
    specification: HistogramSpecification,
}

impl HistogramAccumulator {
    /// Add `value` to the bin containing `x`. Zero and non-finite values are ignored.
    pub fn fill(&mut self, x: f64, value: f64) {
        if !value.is_finite() || value == 0.0 {
            return;
        }

        if let Some(bin) = self.specification.compute_bin(x) {
            self.sums[bin].0 += value;
            self.sums[bin].1 += value * value;
        }
    }

    /// Convert an accumulator to a `HistogramEstimators`, normalizing by the total number of
    /// `calls` that were made, including those that fell outside of the histogram.
    pub fn to_histogram_estimator(self, calls: usize) -> HistogramEstimators {
        HistogramEstimators::new(calls, self)
    }
}

impl Add for HistogramAccumulator {
    type Output = Self;

    fn add(mut self, other: Self) -> Self {
        self += other;
        self
    }
}

impl AddAssign for HistogramAccumulator {
    fn add_assign(&mut self, other: Self) {
        debug_assert!(self.specification == other.specification);

        for (lhs, rhs) in self.sums.iter_mut().zip(other.sums) {
            lhs.0 += rhs.0;
            lhs.1 += rhs.1;
        }
    }
}

/// Estimators for histograms.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HistogramEstimators {
    specification: HistogramSpecification,
    calls: usize,
    mean_var: Vec<MeanVar<f64>>,
}

impl HistogramEstimators {
    fn new(calls: usize, accumulator: HistogramAccumulator) -> Self {
        let n = calls as f64;

        Self {
            specification: accumulator.specification,
            calls,
            mean_var: accumulator
                .sums
                .into_iter()
                .map(|(sum, sumsq)| {
                    if calls < 2 {
                        MeanVar::new(sum / n.max(1.0), f64::INFINITY)
                    } else {
                        MeanVar::new(sum / n, (sumsq - sum * sum / n) / n / (n - 1.0))
                    }
                })
                .collect(),
        }
    }

    /// Returns the estimators for all bins.
    pub fn bins(&self) -> &[MeanVar<f64>] {
        &self.mean_var
    }

    /// Returns the specification of the histogram.
    pub fn specification(&self) -> &HistogramSpecification {
        &self.specification
    }

    /// Returns the number of calls the histogram is normalized to.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl BasicEstimators<f64> for HistogramEstimators {
    fn mean(&self) -> f64 {
        self.mean_var.iter().map(|mv| mv.mean()).sum()
    }

    fn var(&self) -> f64 {
        self.mean_var.iter().map(|mv| mv.var()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_accumulator() {
        let specification = HistogramSpecification::new(0.0, 3.0, 3, "x");

        assert_eq!(specification.label(), "x");
        assert_eq!(specification.edges(), vec![0.0, 1.0, 2.0, 3.0]);

        let mut accumulator_1 = specification.get_accumulator();
        assert_eq!(&accumulator_1.sums, &vec![(0.0, 0.0); 3]);

        accumulator_1.fill(2.5, 1.0);
        accumulator_1.fill(3.0, 1.0);
        accumulator_1.fill(3.5, 1.0);
        accumulator_1.fill(0.5, 0.0);
        assert_eq!(accumulator_1.sums, vec![(0.0, 0.0), (0.0, 0.0), (2.0, 2.0)]);

        let mut accumulator_2 = specification.get_accumulator();
        accumulator_2.fill(1.5, 2.0);
        assert_eq!(accumulator_2.sums[1], (2.0, 4.0));

        let accumulator_sum = accumulator_1 + accumulator_2;
        assert_eq!(accumulator_sum.sums[1], (2.0, 4.0));
        assert_eq!(accumulator_sum.sums[2], (2.0, 2.0));
    }

    #[test]
    fn test_histogram_estimators() {
        let specification = HistogramSpecification::new(0.0, 2.0, 2, "y");
        let mut accumulator = specification.get_accumulator();
        accumulator.fill(0.5, 3.0);
        accumulator.fill(1.5, 1.0);

        let estimators = accumulator.to_histogram_estimator(4);
        assert_eq!(estimators.calls(), 4);
        assert_eq!(estimators.bins()[0].mean(), 0.75);
        assert_eq!(estimators.bins()[1].mean(), 0.25);
        assert_eq!(estimators.mean(), 1.0);
    }
}
