#![warn(clippy::all, clippy::cargo, clippy::nursery, clippy::pedantic)]
#![warn(missing_docs)]

//! The crate `mcsampler` provides adaptive [importance sampling] for the [Monte Carlo integration]
//! of likelihood-like functions over named physical parameters, together with the tools that
//! usually surround such integrations in gravitational-wave parameter estimation: convergence
//! diagnostics, sample tables, a two-sample convergence test and fits of merger ejecta.
//!
//! # Features
//!
//! - **Registered proposals**. Every parameter is registered once with an unnormalized proposal
//! density on a bounded interval, an optional prior and optionally an inverse CDF. Densities are
//! normalized numerically; parameters without an inverse CDF are sampled from a tabulated one, or
//! by rejection sampling.
//! - **Generic random number generator**. Every random number generator that implements the `Rng`
//! trait from the `rand` crate can be used. Random numbers are never drawn from a global
//! generator.
//! - **Reproducibility**. The samples and therefore all results only depend on the random number
//! generator and the chosen seed.
//! - **Early termination**. An integration can stop as soon as the effective sample size reaches
//! a requested value. If `nmax` samples do not suffice, the best estimate is returned together
//! with a warning.
//! - **Non-finite number filtering**. Integrands sometimes produce `inf` or `nan` in extreme
//! regions of the parameter space. Such samples contribute zero to the estimate and a counter
//! keeps track of how often this happened.
//! - **Diagnostics**. The full trace of samples is kept and the running maximum of the
//! log-likelihood, the running integral and weighted marginal histograms can be derived from it
//! without evaluating the integrand again.
//!
//! # How do I get started?
//!
//! ```
//! use mcsampler::{IntegrationEngine, IntegrationOptions, Parameter, ParameterRegistry};
//! use rand_pcg::Pcg64;
//!
//! let mut registry = ParameterRegistry::new();
//! registry.add_parameter(Parameter::new("x", |_: f64| 1.0, -1.5, 1.0))?;
//!
//! let engine = IntegrationEngine::new(&registry);
//! let options = IntegrationOptions::new(10_000).with_full_output(true);
//! let mut rng = Pcg64::new(0xcafef00dd15ea5e5, 0xa02bdbf7bb3c0a7ac28fa16a64abf96);
//!
//! let ones = |points: &[Vec<f64>]| vec![1.0; points.len()];
//! let output = engine.integrate(&ones, &["x"], &options, &mut rng)?;
//!
//! let full = output.into_full().unwrap();
//! assert!((full.estimate - 2.5).abs() < 1e-6);
//! # Ok::<(), mcsampler::Error>(())
//! ```
//!
//! # What is ...?
//!
//! This section is a dictionary of terms that are used in this documentation. Given
//!
//! $$ I = \int \mathrm{d} x \, f(x) \, \pi(x) $$
//!
//! with a prior $\pi$, we draw $N$ samples $x_j$ from a proposal density $q$ and approximate
//!
//! $$ I \approx \frac{1}{N} \sum_{j=1}^N z_j \, , \quad z_j = f(x_j) \frac{\pi(x_j)}{q(x_j)} $$
//!
//! We use the following terms:
//!
//! - the number of *calls* or the *sample size* is $N$, which is the number of times the integrand
//! is evaluated. We assume that this is the expensive operation,
//! - the *integrand* is the function $f$, often a likelihood,
//! - the *weight* of a sample is the ratio $\pi(x_j) / q(x_j)$,
//! - the *effective sample size* is $(\sum_j z_j)^2 / \sum_j z_j^2$. It equals $N$ when every
//! sample contributes the same and is small when a few samples dominate the estimate,
//! - *lnL* is the natural logarithm of the integrand value of a sample.
//!
//! [importance sampling]: https://en.wikipedia.org/wiki/Importance_sampling
//! [Monte Carlo integration]: https://en.wikipedia.org/wiki/Monte_Carlo_integration

pub mod callbacks;
pub mod convergence;
pub mod core;
pub mod diagnostics;
pub mod ejecta;
pub mod error;
pub mod histograms;
pub mod integrators;
pub mod io;
pub mod quadrature;
pub mod registry;
pub mod sampler;

pub use crate::core::*;
pub use crate::error::{ConfigurationError, Error, Result, SamplingError};
pub use crate::integrators::importance::{
    IntegrationEngine, IntegrationOptions, IntegrationOutput,
};
pub use crate::registry::{Parameter, ParameterRegistry};
pub use crate::sampler::ProposalSampler;
