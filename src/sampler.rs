//! Drawing batches of points from the registered proposal distributions.

use crate::error::SamplingError;
use crate::registry::{Parameter, ParameterRegistry, SamplingPlan};
use crate::Result;
use rand::Rng;

/// Maximum number of rejection sampling attempts for a single value.
pub const REJECTION_ATTEMPTS: usize = 1000;

/// A batch of points drawn from the joint proposal.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    /// One point per draw, with one value per sampled parameter.
    pub points: Vec<Vec<f64>>,
    /// Normalized joint proposal density of every point.
    pub proposal_density: Vec<f64>,
}

impl Batch {
    /// Number of points in the batch.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns `true` if the batch holds no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Draws independent values for each parameter from its proposal distribution.
#[derive(Clone, Copy, Debug)]
pub struct ProposalSampler<'a> {
    registry: &'a ParameterRegistry,
}

impl<'a> ProposalSampler<'a> {
    /// Creates a sampler that draws from the parameters of `registry`.
    pub fn new(registry: &'a ParameterRegistry) -> Self {
        Self { registry }
    }

    /// Draws `batch_size` points for the parameters `names`.
    ///
    /// Random numbers are consumed parameter by parameter: first all values of `names[0]`, then
    /// all values of `names[1]`, and so on. The joint proposal density of each point is the
    /// product of the normalized densities of its components.
    pub fn draw<R: Rng>(&self, names: &[&str], batch_size: usize, rng: &mut R) -> Result<Batch> {
        let mut points = vec![Vec::with_capacity(names.len()); batch_size];
        let mut proposal_density = vec![1.0; batch_size];

        for name in names {
            let parameter = self.registry.get(name)?;
            let norm = parameter.normalization()?;

            for (point, density) in points.iter_mut().zip(proposal_density.iter_mut()) {
                let x = draw_one(parameter, rng)?;
                *density *= parameter.pdf(x) / norm;
                point.push(x);
            }
        }

        Ok(Batch {
            points,
            proposal_density,
        })
    }
}

fn draw_one<R: Rng>(parameter: &Parameter, rng: &mut R) -> std::result::Result<f64, SamplingError> {
    match parameter.plan()? {
        SamplingPlan::Tabulated(table) => Ok(table.inverse(rng.gen())),
        SamplingPlan::Inverse => {
            let u: f64 = rng.gen();
            let x = parameter.cdf_inv(u).unwrap_or(f64::NAN);
            parameter.check_in_bounds(x)?;
            Ok(x)
        }
        SamplingPlan::Rejection { envelope } => {
            let (left, right) = parameter.bounds();

            for _ in 0..REJECTION_ATTEMPTS {
                let x = left + (right - left) * rng.gen::<f64>();
                let y = *envelope * rng.gen::<f64>();

                if y < parameter.pdf(x) {
                    return Ok(x);
                }
            }

            Err(SamplingError::RejectionBudgetExhausted {
                name: parameter.name().to_string(),
                attempts: REJECTION_ATTEMPTS,
            })
        }
    }
}
