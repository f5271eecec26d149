use assert_approx_eq::assert_approx_eq;
use mcsampler::core::estimators::BasicEstimators;
use mcsampler::diagnostics::BatchSummary;
use mcsampler::histograms::HistogramSpecification;
use mcsampler::integrators::importance::FullOutput;
use mcsampler::registry::ProposalKind;
use mcsampler::{
    ConfigurationError, Error, IntegrationEngine, IntegrationOptions, Parameter,
    ParameterRegistry, Pointwise, SamplingError,
};
use rand_pcg::Pcg64;

fn rng() -> Pcg64 {
    Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7ac28fa16a64abf96)
}

fn ones(points: &[Vec<f64>]) -> Vec<f64> {
    vec![1.0; points.len()]
}

fn integrate_full(
    registry: &ParameterRegistry,
    integrand: &dyn Fn(&[Vec<f64>]) -> Vec<f64>,
    names: &[&str],
    options: IntegrationOptions,
) -> FullOutput {
    IntegrationEngine::new(registry)
        .integrate(integrand, names, &options.with_full_output(true), &mut rng())
        .unwrap()
        .into_full()
        .unwrap()
}

fn flat_registry() -> ParameterRegistry {
    let mut registry = ParameterRegistry::new();
    registry
        .add_parameter(Parameter::new("x", |_: f64| 1.3, -1.5, 1.0))
        .unwrap();
    registry
}

fn gaussian_registry() -> ParameterRegistry {
    let mut registry = ParameterRegistry::new();
    registry
        .add_parameter(Parameter::new("y", |x: f64| (-x * x / 2.0).exp(), -1.0, 1.0))
        .unwrap();
    registry
        .add_parameter(
            Parameter::new("p", |x: f64| (-x * x / 2.0).exp(), -1.0, 1.0)
                .with_prior(|_: f64| 0.5),
        )
        .unwrap();
    registry
        .add_parameter(
            Parameter::new("r", |x: f64| (-x * x / 2.0).exp(), -1.0, 1.0)
                .with_rejection_sampling(None),
        )
        .unwrap();
    registry
}

#[test]
fn constant_over_flat_proposal_measures_the_interval() {
    let full = integrate_full(&flat_registry(), &ones, &["x"], IntegrationOptions::new(10_000));

    assert_approx_eq!(full.estimate, 2.5, 1e-9);
    assert_eq!(full.extras.trace.len(), 10_000);
    assert_eq!(full.extras.proposals["x"].method, ProposalKind::TabulatedInverseCdf);
    assert_approx_eq!(full.extras.proposals["x"].normalization, 3.25, 1e-10);
}

#[test]
fn constant_over_gaussian_proposal_measures_the_interval() {
    let full = integrate_full(&gaussian_registry(), &ones, &["y"], IntegrationOptions::new(20_000));

    assert_approx_eq!(full.estimate, 2.0, 0.02);
    assert!((full.estimate - 2.0).abs() < 5.0 * full.variance.sqrt());
    assert!(full.neff > 15_000.0);
}

#[test]
fn rejection_sampled_proposal_measures_the_interval() {
    let full = integrate_full(&gaussian_registry(), &ones, &["r"], IntegrationOptions::new(20_000));

    assert_approx_eq!(full.estimate, 2.0, 0.02);
    assert_eq!(full.extras.proposals["r"].method, ProposalKind::Rejection);
}

#[test]
fn normalized_prior_integrates_to_one() {
    let full = integrate_full(
        &gaussian_registry(),
        &ones,
        &["p"],
        IntegrationOptions::new(10_000).with_no_protect_names(true),
    );

    assert_approx_eq!(full.estimate, 1.0, 0.01);
    assert!(full.extras.proposals["p"].has_prior);
}

#[test]
fn supplied_inverse_cdf() {
    let mut registry = ParameterRegistry::new();
    registry
        .add_parameter(Parameter::new("u", |_: f64| 1.0, 0.0, 2.0).with_cdf_inv(|u: f64| 2.0 * u))
        .unwrap();

    // the integral of u over [0, 2]
    let integrand = |points: &[Vec<f64>]| points.iter().map(|p| p[0]).collect::<Vec<_>>();
    let full = integrate_full(&registry, &integrand, &["u"], IntegrationOptions::new(20_000));

    assert_approx_eq!(full.estimate, 2.0, 0.05);
    assert_eq!(full.extras.proposals["u"].method, ProposalKind::InverseCdf);
    assert_eq!(registry.cdf("u", 1.0).unwrap(), None);
}

#[test]
fn effective_sample_size_is_bounded_by_the_calls() {
    let integrand = |points: &[Vec<f64>]| {
        points
            .iter()
            .map(|p| (-p[0] * p[0] / 0.02).exp())
            .collect::<Vec<_>>()
    };
    let full = integrate_full(&flat_registry(), &integrand, &["x"], IntegrationOptions::new(5000));

    assert!(full
        .extras
        .batches
        .iter()
        .all(|batch| batch.neff <= batch.calls as f64 + 1e-6));
    assert!(full.neff < 5000.0);
}

#[test]
fn effective_sample_size_grows_for_constant_weights() {
    let full = integrate_full(&flat_registry(), &ones, &["x"], IntegrationOptions::new(5000));
    let neffs: Vec<f64> = full.extras.batches.iter().map(|b| b.neff).collect();

    assert_eq!(neffs.len(), 5);
    assert!(neffs.windows(2).all(|w| w[0] <= w[1]));
    assert_approx_eq!(neffs[4], 5000.0, 1e-6);
}

#[test]
fn running_maximum_of_a_real_trace() {
    let integrand = Pointwise(|x: &[f64]| (-x[0] * x[0] / 0.02).exp());
    let output = IntegrationEngine::new(&flat_registry())
        .integrate(&integrand, &["x"], &IntegrationOptions::new(3000), &mut rng())
        .unwrap();

    let trace = output.trace();
    let max: Vec<f64> = trace.diagnostics().running_max_ln_l().collect();
    let ln_l: Vec<f64> = trace.rows().map(|row| row[1]).collect();

    assert_eq!(max.len(), 3000);
    assert!(max.windows(2).all(|w| w[0] <= w[1]));
    assert!(max.iter().zip(&ln_l).all(|(m, l)| m >= l));
    assert_approx_eq!(
        *max.last().unwrap(),
        ln_l.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    );
}

#[test]
fn gaussian_integrand_stops_at_the_requested_neff() {
    let sigma: f64 = 0.1;
    let integrand = |points: &[Vec<f64>]| {
        points
            .iter()
            .map(|p| (-p[0] * p[0] / (2.0 * sigma * sigma)).exp())
            .collect::<Vec<_>>()
    };
    let full = integrate_full(
        &flat_registry(),
        &integrand,
        &["x"],
        IntegrationOptions::new(50_000).with_neff(100.0),
    );

    let expected = (2.0 * std::f64::consts::PI).sqrt() * sigma;

    assert!(full.extras.trace.len() <= 50_000);
    assert!(full.neff >= 100.0);
    assert!(full.extras.convergence_warning.is_none());
    assert!(((full.estimate - expected) / expected).abs() < 4.0 / full.neff.sqrt());
}

#[test]
fn diagnostics_replay_the_engine_estimates() {
    let integrand = |points: &[Vec<f64>]| {
        points
            .iter()
            .map(|p| 1.0 + p[0] * p[0])
            .collect::<Vec<_>>()
    };
    let full = integrate_full(&flat_registry(), &integrand, &["x"], IntegrationOptions::new(2500));
    let replayed: Vec<BatchSummary> = full.extras.trace.diagnostics().cumulative_integral();

    assert_eq!(replayed, full.extras.batches);
    assert_eq!(replayed.last().map(|b| b.integral), Some(full.estimate));

    let ln_integral: Vec<f64> = full.extras.trace.diagnostics().running_ln_integral().collect();
    assert_eq!(ln_integral.len(), 2500);
    assert_approx_eq!(*ln_integral.last().unwrap(), full.estimate.ln());
}

#[test]
fn marginal_histogram_of_two_parameters() {
    let mut registry = flat_registry();
    registry
        .add_parameter(Parameter::new("u", |_: f64| 1.0, 0.0, 2.0).with_cdf_inv(|u: f64| 2.0 * u))
        .unwrap();

    let integrand = Pointwise(|x: &[f64]| x[1]);
    let output = IntegrationEngine::new(&registry)
        .integrate(
            &integrand,
            &["x", "u"],
            &IntegrationOptions::new(20_000).with_full_output(true),
            &mut rng(),
        )
        .unwrap();
    let full = output.into_full().unwrap();

    // the integrand is x-independent, so each of the 5 bins in x holds a fifth of the integral
    let histogram = full
        .extras
        .trace
        .diagnostics()
        .marginal_histogram("x", HistogramSpecification::new(-1.5, 1.0, 5, "x"))
        .unwrap();

    assert_approx_eq!(full.estimate, 5.0, 0.1);
    for bin in histogram.bins() {
        assert_approx_eq!(bin.mean(), 1.0, 0.1);
    }
}

#[test]
fn non_finite_values_are_dropped() {
    let mut registry = ParameterRegistry::new();
    registry
        .add_parameter(Parameter::new("x", |_: f64| 1.0, -1.0, 1.0))
        .unwrap();

    let integrand = Pointwise(|x: &[f64]| if x[0] < 0.0 { f64::NAN } else { 1.0 });
    let output = IntegrationEngine::new(&registry)
        .integrate(
            &integrand,
            &["x"],
            &IntegrationOptions::new(10_000).with_full_output(true),
            &mut rng(),
        )
        .unwrap();
    let full = output.into_full().unwrap();

    assert_approx_eq!(full.estimate, 1.0, 0.05);
    assert!(full.extras.non_finite_calls > 4500 && full.extras.non_finite_calls < 5500);
    assert!(full.estimate.is_finite() && full.variance.is_finite());
}

#[test]
fn sampling_failures_abort_the_integration() {
    let mut registry = ParameterRegistry::new();
    registry
        .add_parameter(Parameter::new("z", |_: f64| 0.0, 0.0, 1.0))
        .unwrap();
    registry
        .add_parameter(Parameter::new("w", |_: f64| 1.0, 0.0, 1.0).with_cdf_inv(|u: f64| 1.0 - u * u))
        .unwrap();

    let engine = IntegrationEngine::new(&registry);
    let options = IntegrationOptions::new(100);

    assert!(matches!(
        engine.integrate(&ones, &["z"], &options, &mut rng()),
        Err(Error::Sampling(SamplingError::NotIntegrable { .. }))
    ));
    assert!(matches!(
        engine.integrate(&ones, &["w"], &options, &mut rng()),
        Err(Error::Sampling(SamplingError::NonMonotonicInverse(_)))
    ));
}

#[test]
fn reserved_names_need_the_bypass() {
    let mut registry = ParameterRegistry::new();
    for name in ["weights", "neff"] {
        registry
            .add_parameter(Parameter::new(name, |_: f64| 1.0, 0.0, 1.0))
            .unwrap();
    }
    let engine = IntegrationEngine::new(&registry);

    assert!(matches!(
        engine.integrate(&ones, &["weights"], &IntegrationOptions::new(10), &mut rng()),
        Err(Error::Configuration(ConfigurationError::ReservedName(name))) if name == "weights"
    ));

    let options = IntegrationOptions::new(10).with_no_protect_names(true);
    let trace = engine
        .integrate(&ones, &["weights", "neff"], &options, &mut rng())
        .unwrap()
        .into_trace();
    assert_eq!(trace.names(), &["weights", "neff"]);
}

#[test]
fn same_seed_same_estimate() {
    let registry = gaussian_registry();
    let options = IntegrationOptions::new(3000).with_batch_size(700);

    let first = integrate_full(&registry, &ones, &["y", "r"], options.clone());
    let second = integrate_full(&registry, &ones, &["y", "r"], options);

    assert_eq!(first.estimate, second.estimate);
    assert_eq!(first.extras.weights, second.extras.weights);
    assert_eq!(first.extras.trace.batch_ends(), &[700, 1400, 2100, 2800, 3000]);
}
