use anyhow::Result;
use mcsampler::ejecta::{ConstantRadius, EjectaModel};
use mcsampler::{
    IntegrationEngine, IntegrationOptions, Integrand, Parameter, ParameterRegistry, Pointwise,
};
use rand_pcg::Pcg64;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    let mut rng = Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7ac28fa16a64abf96);

    // every neutron star has a radius of 12 km
    let model = EjectaModel::new(ConstantRadius(12_000.0));

    // flat, normalized priors on both component masses
    let mut registry = ParameterRegistry::new();
    for name in ["m1", "m2"] {
        registry.add_parameter(
            Parameter::new(name, |_: f64| 1.0, 1.2, 1.6)
                .with_cdf_inv(|u: f64| 1.2 + 0.4 * u)
                .with_prior(|_: f64| 2.5),
        )?;
    }

    let options = IntegrationOptions::new(100_000)
        .with_batch_size(10_000)
        .with_full_output(true)
        .with_verbose(true);
    let engine = IntegrationEngine::new(&registry);

    let mass = Pointwise(|x: &[f64]| model.mass_dynamical(x[0], x[1], None, None));
    let velocity = Pointwise(|x: &[f64]| model.velocity_dynamical(x[0], x[1], None, None));

    let integrands: [(&str, &dyn Integrand); 2] = [
        ("dynamical ejecta mass", &mass),
        ("dynamical ejecta velocity", &velocity),
    ];

    for (label, integrand) in integrands {
        let full = engine
            .integrate(integrand, &["m1", "m2"], &options, &mut rng)?
            .into_full()
            .expect("full output was requested");

        println!(
            "average {}: {:.6e} +- {:.1e} (neff = {:.0})",
            label,
            full.estimate,
            full.variance.sqrt(),
            full.neff
        );
    }

    println!(
        "disk mass and velocity of an equal-mass 1.4 + 1.4 binary: {:.4e}, {}",
        model.mass_disk(1.4, 1.4, None, None),
        model.velocity_disk(1.4, 1.4, None, None)
    );

    Ok(())
}
