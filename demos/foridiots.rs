use anyhow::Result;
use mcsampler::io::{save_trace, write_summary_json};
use mcsampler::{IntegrationEngine, IntegrationOptions, Parameter, ParameterRegistry};
use rand_pcg::Pcg64;
use std::f64::consts::PI;

fn ones(points: &[Vec<f64>]) -> Vec<f64> {
    vec![1.0; points.len()]
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    // Initialize the random number generator.
    let mut rng = Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7ac28fa16a64abf96);

    // Integrate a constant function. The proposal is not normalized, the registry does that, and
    // since no inverse CDF is given, one is tabulated.
    let mut prior = ParameterRegistry::new();
    prior.add_parameter(Parameter::new("x", |_: f64| 1.3, -1.5, 1.0))?;

    let engine = IntegrationEngine::new(&prior);
    let options = IntegrationOptions::new(10_000)
        .with_full_output(true)
        .with_verbose(true);
    let full = engine
        .integrate(&ones, &["x"], &options, &mut rng)?
        .into_full()
        .expect("full output was requested");
    let (left, right) = prior.bounds("x")?;
    println!(
        "Integral of 1 over [{}, {}] is {} +- {}, needs to be {}",
        left,
        right,
        full.estimate,
        full.variance.sqrt(),
        right - left
    );

    // A Gaussian proposal with a normalized prior.
    let mut new_prior = ParameterRegistry::new();
    new_prior.add_parameter(
        Parameter::new("y", |x: f64| (-x * x / 2.0).exp(), -1.0, 1.0).with_prior(|_: f64| 0.5),
    )?;
    let options = IntegrationOptions::new(10_000)
        .with_full_output(true)
        .with_no_protect_names(true);
    if let Some(full) = IntegrationEngine::new(&new_prior)
        .integrate(&ones, &["y"], &options, &mut rng)?
        .into_full()
    {
        println!("Integral of 1 over a normalized prior is {}, needs to be 1", full.estimate);
    }

    // Raw access to the densities of the proposal.
    for x in [-1.0, -0.5, 0.0, 0.5, 1.0] {
        println!(
            "x = {:5.2}: pdf shape {:.4}, pdf {:.4}, cdf {:?}",
            x,
            (-x * x / 2.0_f64).exp(),
            new_prior.density("y", x)?,
            new_prior.cdf("y", x)?
        );
    }

    // A narrow Gaussian, stopping after reaching neff = 100.
    let sigma = 0.1;
    let gaussian = |points: &[Vec<f64>]| {
        points
            .iter()
            .map(|p| (-p[0] * p[0] / (2.0 * sigma * sigma)).exp())
            .collect::<Vec<_>>()
    };
    println!(" -- Performing integral, stopping after neff = 100 points -- ");
    let options = IntegrationOptions::new(50_000)
        .with_neff(100.0)
        .with_full_output(true);
    let full = engine
        .integrate(&gaussian, &["x"], &options, &mut rng)?
        .into_full()
        .expect("full output was requested");
    let expected = (2.0 * PI).sqrt() * sigma;
    println!(
        "integral answer is {} with expected error {}; compare to {}",
        full.estimate,
        full.variance.sqrt(),
        expected
    );
    println!(
        "note neff is {}; compare neff^(-1/2) = {} to relative predicted and actual errors: {}, {}",
        full.neff,
        1.0 / full.neff.sqrt(),
        full.variance.sqrt() / full.estimate,
        (full.estimate - expected) / full.estimate
    );

    // Save the sampled points and the estimates.
    let dir = std::env::temp_dir();
    save_trace(dir.join("sampler-foridiots-example.dat"), &full.extras.trace)?;
    write_summary_json(
        std::fs::File::create(dir.join("sampler-foridiots-example.json"))?,
        &full,
    )?;
    println!("trace and summary written to {}", dir.display());

    // The running-maximum and marginal lnL illustrate the convergence.
    println!(" -- Integral convergence --- ");
    let diagnostics = full.extras.trace.diagnostics();
    let step = (full.extras.trace.len() / 10).max(1);
    for (i, (ln_l_max, ln_l_marg)) in diagnostics
        .running_max_ln_l()
        .zip(diagnostics.running_ln_integral())
        .enumerate()
        .step_by(step)
    {
        println!("{:6} lnLmax = {:9.4} lnLmarg = {:9.4}", i, ln_l_max, ln_l_marg);
    }

    Ok(())
}
