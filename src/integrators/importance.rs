//! Adaptive importance-sampling integrator
use crate::callbacks::{Callback, SimpleCallback, SinkCallback};
use crate::core::estimators::*;
use crate::core::Integrand;
use crate::diagnostics::{BatchSummary, Sample, SampleTrace};
use crate::error::ConfigurationError;
use crate::registry::{ParameterRegistry, ProposalMetadata};
use crate::sampler::ProposalSampler;
use crate::Result;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Number of samples drawn per batch unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Identifiers that name columns of the integrator output and therefore cannot be used as
/// parameter names unless `no_protect_names` is set.
pub const RESERVED_NAMES: [&str; 6] = [
    "lnL",
    "weights",
    "integral",
    "neff",
    "joint_prior",
    "joint_s_prior",
];

/// Options of a single integration.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct IntegrationOptions {
    /// Maximum number of samples to draw.
    pub nmax: usize,
    /// Stop as soon as the effective sample size reaches this value.
    pub neff: Option<f64>,
    /// Number of samples drawn between two checks of the stopping criteria.
    pub batch_size: usize,
    /// Return estimates and extras instead of only the sample trace.
    pub full_output: bool,
    /// Allow parameter names from [`RESERVED_NAMES`].
    pub no_protect_names: bool,
    /// Log every batch and a warning if the `neff` target is missed.
    pub verbose: bool,
}

impl Default for IntegrationOptions {
    fn default() -> Self {
        Self {
            nmax: 1_000_000,
            neff: None,
            batch_size: DEFAULT_BATCH_SIZE,
            full_output: false,
            no_protect_names: false,
            verbose: false,
        }
    }
}

impl IntegrationOptions {
    /// Options drawing at most `nmax` samples.
    pub fn new(nmax: usize) -> Self {
        Self {
            nmax,
            ..Self::default()
        }
    }

    /// Stop once the effective sample size reaches `neff`.
    pub fn with_neff(mut self, neff: f64) -> Self {
        self.neff = Some(neff);
        self
    }

    /// Draw `batch_size` samples per batch.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Return [`FullOutput`] instead of the sample trace.
    pub fn with_full_output(mut self, full_output: bool) -> Self {
        self.full_output = full_output;
        self
    }

    /// Allow reserved parameter names.
    pub fn with_no_protect_names(mut self, no_protect_names: bool) -> Self {
        self.no_protect_names = no_protect_names;
        self
    }

    /// Log progress.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn validate(&self) -> std::result::Result<(), ConfigurationError> {
        if self.nmax == 0 {
            return Err(ConfigurationError::ZeroSamples);
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::ZeroBatchSize);
        }
        match self.neff {
            Some(neff) if !(neff.is_finite() && neff > 0.0) => {
                Err(ConfigurationError::InvalidNeffTarget(neff))
            }
            _ => Ok(()),
        }
    }
}

/// The requested effective sample size was not reached within `nmax` samples.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ConvergenceWarning {
    /// Requested effective sample size.
    pub requested: f64,
    /// Effective sample size reached.
    pub achieved: f64,
    /// Number of samples drawn.
    pub calls: usize,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "effective sample size {:.1} after {} samples is below the requested {:.1}",
            self.achieved, self.calls, self.requested
        )
    }
}

/// Everything besides the estimates that an integration produces.
#[derive(Clone, Debug)]
pub struct Extras {
    /// All samples in the order they were drawn.
    pub trace: SampleTrace,
    /// The importance weight of every sample.
    pub weights: Vec<f64>,
    /// The proposal of every integrated parameter.
    pub proposals: BTreeMap<String, ProposalMetadata>,
    /// The estimates after every batch.
    pub batches: Vec<BatchSummary>,
    /// Number of samples whose weighted value was not finite and was dropped.
    pub non_finite_calls: usize,
    /// Set if a requested effective sample size was not reached.
    pub convergence_warning: Option<ConvergenceWarning>,
}

/// Estimates of an integration together with its [`Extras`].
#[derive(Clone, Debug)]
pub struct FullOutput {
    /// Estimate of the integral.
    pub estimate: f64,
    /// Variance of the estimate.
    pub variance: f64,
    /// Effective sample size.
    pub neff: f64,
    /// Trace, weights and proposal metadata.
    pub extras: Extras,
}

/// Result of [`IntegrationEngine::integrate`].
#[derive(Clone, Debug)]
pub enum IntegrationOutput {
    /// The sample trace, returned unless `full_output` was requested.
    Trace(SampleTrace),
    /// Estimates and extras.
    Full(FullOutput),
}

impl IntegrationOutput {
    /// The sample trace, which both variants carry.
    pub fn trace(&self) -> &SampleTrace {
        match self {
            Self::Trace(trace) => trace,
            Self::Full(full) => &full.extras.trace,
        }
    }

    /// Consumes the output and returns the sample trace.
    pub fn into_trace(self) -> SampleTrace {
        match self {
            Self::Trace(trace) => trace,
            Self::Full(full) => full.extras.trace,
        }
    }

    /// Returns the full output if it was requested.
    pub fn into_full(self) -> Option<FullOutput> {
        match self {
            Self::Trace(_) => None,
            Self::Full(full) => Some(full),
        }
    }
}

/// Integrates functions over parameters of a [`ParameterRegistry`] by importance sampling.
///
/// Every sample is drawn from the joint proposal $q$ of the integrated parameters and contributes
/// the weighted value $f(x)\, \pi(x) / q(x)$, where $\pi$ is the product of the priors of the
/// parameters (one for parameters without a prior). The integral estimate is the mean of these
/// values; see [`ImportanceEstimators`] for the variance and the effective sample size.
#[derive(Clone, Copy, Debug)]
pub struct IntegrationEngine<'a> {
    registry: &'a ParameterRegistry,
}

impl<'a> IntegrationEngine<'a> {
    /// Creates an integrator over the parameters of `registry`.
    pub fn new(registry: &'a ParameterRegistry) -> Self {
        Self { registry }
    }

    /// Integrate `integrand` over the parameters `names` with random numbers from `rng`.
    ///
    /// Batches are drawn until `options.nmax` samples were drawn or the effective sample size
    /// reaches `options.neff`. If `options.verbose` is set, every batch is logged.
    pub fn integrate<I, R>(
        &self,
        integrand: &I,
        names: &[&str],
        options: &IntegrationOptions,
        rng: &mut R,
    ) -> Result<IntegrationOutput>
    where
        I: Integrand + ?Sized,
        R: Rng,
    {
        if options.verbose {
            self.integrate_with_callback(integrand, names, options, rng, &SimpleCallback {})
        } else {
            self.integrate_with_callback(integrand, names, options, rng, &SinkCallback {})
        }
    }

    /// Like [`integrate`](Self::integrate), but calls `callback` after every batch.
    pub fn integrate_with_callback<I, R, C>(
        &self,
        integrand: &I,
        names: &[&str],
        options: &IntegrationOptions,
        rng: &mut R,
        callback: &C,
    ) -> Result<IntegrationOutput>
    where
        I: Integrand + ?Sized,
        R: Rng,
        C: Callback + ?Sized,
    {
        options.validate()?;
        self.check_names(names, options.no_protect_names)?;

        let parameters = names
            .iter()
            .map(|name| self.registry.get(name))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let sampler = ProposalSampler::new(self.registry);

        let mut estimators = ImportanceEstimators::<f64>::default();
        let mut trace = SampleTrace::new(names);
        let mut batches = Vec::new();

        debug!(
            "integrating over {:?} with nmax={} neff={:?} batch_size={}",
            names, options.nmax, options.neff, options.batch_size
        );

        while estimators.calls() < options.nmax {
            let size = options.batch_size.min(options.nmax - estimators.calls());
            let batch = sampler.draw(names, size, rng)?;
            let values = integrand.call(&batch.points);

            if values.len() != batch.len() {
                return Err(ConfigurationError::IntegrandLength {
                    expected: batch.len(),
                    found: values.len(),
                }
                .into());
            }

            for ((point, proposal), value) in batch
                .points
                .into_iter()
                .zip(batch.proposal_density)
                .zip(values)
            {
                let target: f64 = parameters
                    .iter()
                    .zip(&point)
                    .map(|(parameter, x)| parameter.target_density(*x))
                    .product();
                let weight = target / proposal;

                estimators.update(weight * value);
                trace.push(Sample {
                    point,
                    value,
                    weight,
                });
            }

            trace.end_batch();
            batches.push(BatchSummary::from(&estimators));
            callback.print(&batches);

            if options
                .neff
                .map_or(false, |target| estimators.neff() >= target)
            {
                debug!(
                    "reached neff={:.1} after {} samples",
                    estimators.neff(),
                    estimators.calls()
                );
                break;
            }
        }

        let convergence_warning = options
            .neff
            .filter(|&requested| estimators.neff() < requested)
            .map(|requested| ConvergenceWarning {
                requested,
                achieved: estimators.neff(),
                calls: estimators.calls(),
            });

        if options.verbose {
            if let Some(warning) = &convergence_warning {
                warn!("{}", warning);
            }
        }

        if !options.full_output {
            return Ok(IntegrationOutput::Trace(trace));
        }

        let proposals = names
            .iter()
            .map(|name| Ok((name.to_string(), self.registry.proposal_metadata(name)?)))
            .collect::<Result<BTreeMap<_, _>>>()?;

        Ok(IntegrationOutput::Full(FullOutput {
            estimate: estimators.mean(),
            variance: estimators.var(),
            neff: estimators.neff(),
            extras: Extras {
                weights: trace.weights(),
                trace,
                proposals,
                batches,
                non_finite_calls: estimators.non_finite_calls(),
                convergence_warning,
            },
        }))
    }

    fn check_names(
        &self,
        names: &[&str],
        no_protect_names: bool,
    ) -> std::result::Result<(), ConfigurationError> {
        if names.is_empty() {
            return Err(ConfigurationError::EmptyParameterList);
        }

        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                return Err(ConfigurationError::DuplicateParameter(name.to_string()));
            }
            if !no_protect_names && RESERVED_NAMES.contains(name) {
                return Err(ConfigurationError::ReservedName(name.to_string()));
            }
            if !self.registry.contains(name) {
                return Err(ConfigurationError::UnknownParameter(name.to_string()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Parameter;
    use crate::Error;
    use assert_approx_eq::assert_approx_eq;
    use rand_pcg::Pcg64;
    use serde::Serialize;

    fn assert_eq_rng<R>(lhs: &R, rhs: &R)
    where
        R: Rng + Serialize,
    {
        assert_eq!(
            serde_json::to_string(lhs).unwrap(),
            serde_json::to_string(rhs).unwrap()
        );
    }

    fn rng() -> Pcg64 {
        Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7ac28fa16a64abf96)
    }

    fn ones(points: &[Vec<f64>]) -> Vec<f64> {
        vec![1.0; points.len()]
    }

    fn registry() -> ParameterRegistry {
        let mut registry = ParameterRegistry::new();
        registry
            .add_parameter(Parameter::new("x", |_: f64| 1.3, -1.5, 1.0))
            .unwrap();
        registry
            .add_parameter(Parameter::new("lnL", |_: f64| 1.0, 0.0, 1.0))
            .unwrap();
        registry
    }

    #[test]
    fn trace_is_returned_by_default() {
        let registry = registry();
        let engine = IntegrationEngine::new(&registry);
        let output = engine
            .integrate(&ones, &["x"], &IntegrationOptions::new(2500), &mut rng())
            .unwrap();

        let trace = output.into_trace();
        assert_eq!(trace.len(), 2500);
        assert_eq!(trace.batch_ends(), &[1000, 2000, 2500]);
        assert!(trace.rows().all(|row| row.len() == 2 && row[1] == 0.0));
    }

    #[test]
    fn flat_proposal_measures_the_interval() {
        let registry = registry();
        let engine = IntegrationEngine::new(&registry);
        let options = IntegrationOptions::new(1000).with_full_output(true);
        let full = engine
            .integrate(&ones, &["x"], &options, &mut rng())
            .unwrap()
            .into_full()
            .unwrap();

        // every weight is 1 / 0.4 up to the accuracy of the quadrature
        assert_approx_eq!(full.estimate, 2.5, 1e-9);
        assert_approx_eq!(full.neff, 1000.0, 1e-6);
        assert!(full.variance < 1e-12);
        assert_eq!(full.extras.weights.len(), 1000);
        assert_eq!(full.extras.proposals["x"].left, -1.5);
        assert!(full.extras.convergence_warning.is_none());
    }

    #[test]
    fn stops_once_neff_is_reached() {
        let registry = registry();
        let engine = IntegrationEngine::new(&registry);
        let options = IntegrationOptions::new(100_000)
            .with_neff(150.0)
            .with_batch_size(100)
            .with_full_output(true);
        let full = engine
            .integrate(&ones, &["x"], &options, &mut rng())
            .unwrap()
            .into_full()
            .unwrap();

        assert_eq!(full.extras.trace.len(), 200);
        assert!(full.neff >= 150.0);
        assert_eq!(full.extras.batches.len(), 2);
    }

    #[test]
    fn missed_neff_target_is_reported() {
        let registry = registry();
        let engine = IntegrationEngine::new(&registry);
        let options = IntegrationOptions::new(300)
            .with_neff(1000.0)
            .with_full_output(true)
            .with_verbose(true);
        let full = engine
            .integrate(&ones, &["x"], &options, &mut rng())
            .unwrap()
            .into_full()
            .unwrap();

        let warning = full.extras.convergence_warning.unwrap();
        assert_eq!(warning.calls, 300);
        assert_eq!(warning.requested, 1000.0);
        assert!(warning.achieved <= 300.0 + 1e-6);
    }

    #[test]
    fn reserved_names_are_protected() {
        let registry = registry();
        let engine = IntegrationEngine::new(&registry);
        let options = IntegrationOptions::new(10);

        let result = engine.integrate(&ones, &["lnL"], &options, &mut rng());
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::ReservedName(_)))
        ));

        let options = options.with_no_protect_names(true);
        assert!(engine
            .integrate(&ones, &["lnL"], &options, &mut rng())
            .is_ok());
    }

    #[test]
    fn invalid_arguments() {
        let registry = registry();
        let engine = IntegrationEngine::new(&registry);

        let zero = IntegrationOptions::new(0);
        assert!(matches!(
            engine.integrate(&ones, &["x"], &zero, &mut rng()),
            Err(Error::Configuration(ConfigurationError::ZeroSamples))
        ));

        let no_batch = IntegrationOptions::new(10).with_batch_size(0);
        assert!(matches!(
            engine.integrate(&ones, &["x"], &no_batch, &mut rng()),
            Err(Error::Configuration(ConfigurationError::ZeroBatchSize))
        ));

        let bad_neff = IntegrationOptions::new(10).with_neff(-1.0);
        assert!(matches!(
            engine.integrate(&ones, &["x"], &bad_neff, &mut rng()),
            Err(Error::Configuration(ConfigurationError::InvalidNeffTarget(_)))
        ));

        let options = IntegrationOptions::new(10);
        assert!(matches!(
            engine.integrate(&ones, &[], &options, &mut rng()),
            Err(Error::Configuration(ConfigurationError::EmptyParameterList))
        ));
        assert!(matches!(
            engine.integrate(&ones, &["y"], &options, &mut rng()),
            Err(Error::Configuration(ConfigurationError::UnknownParameter(_)))
        ));
    }

    #[test]
    fn parameters_are_integrated_over_once() {
        let registry = registry();
        let engine = IntegrationEngine::new(&registry);
        let options = IntegrationOptions::new(10).with_no_protect_names(true);

        assert_eq!(
            engine
                .integrate(&ones, &["x", "lnL", "x"], &options, &mut rng())
                .unwrap_err()
                .to_string(),
            "duplicate parameter `x`"
        );
        assert!(matches!(
            engine.integrate(&ones, &["x", "x"], &options, &mut rng()),
            Err(Error::Configuration(ConfigurationError::DuplicateParameter(name))) if name == "x"
        ));
    }

    #[test]
    fn integrand_must_return_one_value_per_point() {
        let registry = registry();
        let engine = IntegrationEngine::new(&registry);
        let short = |points: &[Vec<f64>]| vec![1.0; points.len() - 1];

        let result = engine.integrate(&short, &["x"], &IntegrationOptions::new(10), &mut rng());
        assert!(matches!(
            result,
            Err(Error::Configuration(ConfigurationError::IntegrandLength {
                expected: 10,
                found: 9
            }))
        ));
    }

    #[test]
    fn integrations_are_reproducible() {
        let registry = registry();
        let engine = IntegrationEngine::new(&registry);
        let options = IntegrationOptions::new(500);
        let integrand = |points: &[Vec<f64>]| points.iter().map(|p| p[0] * p[0]).collect::<Vec<_>>();

        let mut rng_1 = rng();
        let mut rng_2 = rng();
        let trace_1 = engine
            .integrate(&integrand, &["x"], &options, &mut rng_1)
            .unwrap()
            .into_trace();
        let trace_2 = engine
            .integrate(&integrand, &["x"], &options, &mut rng_2)
            .unwrap()
            .into_trace();

        assert_eq!(trace_1, trace_2);
        assert_eq_rng(&rng_1, &rng_2);
    }

    #[test]
    fn options_from_json() {
        let options: IntegrationOptions =
            serde_json::from_str(r#"{ "nmax": 50000, "neff": 100.0 }"#).unwrap();

        assert_eq!(options.nmax, 50_000);
        assert_eq!(options.neff, Some(100.0));
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
        assert!(!options.full_output);
    }
}
