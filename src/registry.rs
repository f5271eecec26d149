//! Registration of the parameters an integral runs over.
//!
//! Each [`Parameter`] carries a proposal density on a closed interval, and optionally an inverse
//! CDF for sampling and a prior density that defines the target measure. The normalization of the
//! proposal and, when no inverse CDF is given, a tabulated inverse are computed on first use and
//! cached in the parameter for the lifetime of the registry.

use crate::core::ScalarFunction;
use crate::error::{ConfigurationError, SamplingError};
use crate::quadrature::{self, TabulatedCdf, CDF_CELLS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

/// Number of points on which a supplied inverse CDF is probed before its first use.
const INVERSE_PROBES: usize = 64;

/// Factor applied to the observed maximum of a density when estimating a rejection envelope.
const ENVELOPE_PADDING: f64 = 1.1;

/// How values of a parameter are drawn.
enum SamplingMethod {
    /// Tabulate and invert the CDF of the proposal density.
    Tabulated,
    /// Apply a user supplied inverse CDF to uniform random numbers.
    InverseCdf(Box<dyn ScalarFunction>),
    /// Rejection sampling under a constant envelope, estimated from the density if `None`.
    Rejection(Option<f64>),
}

/// The kind of sampling plan used for a parameter, as reported in [`ProposalMetadata`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProposalKind {
    /// A supplied inverse CDF.
    InverseCdf,
    /// An inverse CDF tabulated from the density.
    TabulatedInverseCdf,
    /// Rejection sampling.
    Rejection,
}

impl fmt::Display for ProposalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InverseCdf => write!(f, "inverse-cdf"),
            Self::TabulatedInverseCdf => write!(f, "tabulated-inverse-cdf"),
            Self::Rejection => write!(f, "rejection"),
        }
    }
}

/// A validated, ready-to-use way of drawing values of one parameter.
pub(crate) enum SamplingPlan {
    Inverse,
    Tabulated(TabulatedCdf),
    Rejection { envelope: f64 },
}

/// Description of the proposal used for one parameter.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ProposalMetadata {
    /// Left bound of the domain.
    pub left: f64,
    /// Right bound of the domain.
    pub right: f64,
    /// Integral of the unnormalized proposal density over the domain.
    pub normalization: f64,
    /// How values were drawn.
    pub method: ProposalKind,
    /// Whether a prior density defines the target measure.
    pub has_prior: bool,
}

/// A named parameter with its proposal density on `[left, right]`.
pub struct Parameter {
    name: String,
    pdf: Box<dyn ScalarFunction>,
    prior_pdf: Option<Box<dyn ScalarFunction>>,
    method: SamplingMethod,
    left: f64,
    right: f64,
    pdf_norm: OnceLock<f64>,
    plan: OnceLock<SamplingPlan>,
}

impl Parameter {
    /// Creates a parameter named `name` whose proposal density `pdf` is defined on the closed
    /// interval from `left` to `right`. The density does not need to be normalized.
    pub fn new(
        name: impl Into<String>,
        pdf: impl ScalarFunction + 'static,
        left: f64,
        right: f64,
    ) -> Self {
        Self {
            name: name.into(),
            pdf: Box::new(pdf),
            prior_pdf: None,
            method: SamplingMethod::Tabulated,
            left,
            right,
            pdf_norm: OnceLock::new(),
            plan: OnceLock::new(),
        }
    }

    /// Sample with the inverse CDF `cdf_inv` instead of a tabulated one. It must be
    /// non-decreasing and map `[0, 1]` onto `[left, right]`.
    pub fn with_cdf_inv(mut self, cdf_inv: impl ScalarFunction + 'static) -> Self {
        self.method = SamplingMethod::InverseCdf(Box::new(cdf_inv));
        self
    }

    /// Use `prior_pdf` as the target density of this parameter. Without a prior the target is
    /// the flat measure on `[left, right]`.
    pub fn with_prior(mut self, prior_pdf: impl ScalarFunction + 'static) -> Self {
        self.prior_pdf = Some(Box::new(prior_pdf));
        self
    }

    /// Sample by rejection under a constant `envelope` that bounds the density from above. If
    /// `None`, the envelope is estimated from the density on a grid.
    pub fn with_rejection_sampling(mut self, envelope: Option<f64>) -> Self {
        self.method = SamplingMethod::Rejection(envelope);
        self
    }

    /// Returns the name of the parameter.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `(left, right)`.
    pub fn bounds(&self) -> (f64, f64) {
        (self.left, self.right)
    }

    /// Returns whether a prior density was supplied.
    pub fn has_prior(&self) -> bool {
        self.prior_pdf.is_some()
    }

    /// Evaluates the unnormalized proposal density.
    pub fn pdf(&self, x: f64) -> f64 {
        self.pdf.apply(x)
    }

    /// Returns the integral of the proposal density over the bounds, computing it on first use.
    pub fn normalization(&self) -> Result<f64, SamplingError> {
        if let Some(norm) = self.pdf_norm.get() {
            return Ok(*norm);
        }

        let norm = quadrature::integrate(&self.name, self.pdf.as_ref(), self.left, self.right)?;

        Ok(*self.pdf_norm.get_or_init(|| norm))
    }

    /// Evaluates the normalized proposal density; zero outside of the bounds.
    pub fn density(&self, x: f64) -> Result<f64, SamplingError> {
        if x < self.left || x > self.right {
            return Ok(0.0);
        }

        Ok(self.pdf.apply(x) / self.normalization()?)
    }

    /// Evaluates the target density: the prior if one was supplied, one otherwise.
    pub fn target_density(&self, x: f64) -> f64 {
        self.prior_pdf.as_ref().map_or(1.0, |prior| prior.apply(x))
    }

    pub(crate) fn kind(&self) -> ProposalKind {
        match self.method {
            SamplingMethod::Tabulated => ProposalKind::TabulatedInverseCdf,
            SamplingMethod::InverseCdf(_) => ProposalKind::InverseCdf,
            SamplingMethod::Rejection(_) => ProposalKind::Rejection,
        }
    }

    /// Applies the supplied inverse CDF, if there is one.
    pub(crate) fn cdf_inv(&self, u: f64) -> Option<f64> {
        match &self.method {
            SamplingMethod::InverseCdf(cdf_inv) => Some(cdf_inv.apply(u)),
            _ => None,
        }
    }

    /// Returns the sampling plan, constructing and validating it on first use.
    pub(crate) fn plan(&self) -> Result<&SamplingPlan, SamplingError> {
        if let Some(plan) = self.plan.get() {
            return Ok(plan);
        }

        let plan = match &self.method {
            SamplingMethod::Tabulated => SamplingPlan::Tabulated(TabulatedCdf::new(
                &self.name,
                self.pdf.as_ref(),
                self.left,
                self.right,
                CDF_CELLS,
            )?),
            SamplingMethod::InverseCdf(cdf_inv) => {
                self.validate_inverse(cdf_inv.as_ref())?;
                SamplingPlan::Inverse
            }
            SamplingMethod::Rejection(envelope) => {
                let envelope = match envelope {
                    Some(envelope) => *envelope,
                    None => {
                        ENVELOPE_PADDING
                            * TabulatedCdf::grid_maximum(
                                &self.name,
                                self.pdf.as_ref(),
                                self.left,
                                self.right,
                                CDF_CELLS,
                            )?
                    }
                };

                if !(envelope.is_finite() && envelope > 0.0) {
                    return Err(SamplingError::InvalidEnvelope {
                        name: self.name.clone(),
                        envelope,
                    });
                }

                SamplingPlan::Rejection { envelope }
            }
        };

        Ok(self.plan.get_or_init(|| plan))
    }

    fn validate_inverse(&self, cdf_inv: &dyn ScalarFunction) -> Result<(), SamplingError> {
        let mut previous = f64::NEG_INFINITY;

        for i in 0..=INVERSE_PROBES {
            let value = cdf_inv.apply(i as f64 / INVERSE_PROBES as f64);
            self.check_in_bounds(value)?;

            if value < previous {
                return Err(SamplingError::NonMonotonicInverse(self.name.clone()));
            }
            previous = value;
        }

        Ok(())
    }

    pub(crate) fn check_in_bounds(&self, value: f64) -> Result<(), SamplingError> {
        if value >= self.left && value <= self.right {
            Ok(())
        } else {
            Err(SamplingError::InverseOutOfBounds {
                name: self.name.clone(),
                value,
                left: self.left,
                right: self.right,
            })
        }
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("left", &self.left)
            .field("right", &self.right)
            .field("method", &self.kind())
            .field("has_prior", &self.has_prior())
            .field("pdf_norm", &self.pdf_norm.get())
            .finish()
    }
}

/// Holds the parameters that integrals can run over.
///
/// The registry is only read once the parameters are registered, so it can be shared by any
/// number of concurrent integrations.
#[derive(Debug, Default)]
pub struct ParameterRegistry {
    parameters: BTreeMap<String, Parameter>,
}

impl ParameterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `parameter`.
    pub fn add_parameter(&mut self, parameter: Parameter) -> Result<(), ConfigurationError> {
        let (left, right) = parameter.bounds();

        if !(left.is_finite() && right.is_finite() && left < right) {
            return Err(ConfigurationError::InvalidBounds {
                name: parameter.name,
                left,
                right,
            });
        }

        if self.parameters.contains_key(parameter.name()) {
            return Err(ConfigurationError::DuplicateParameter(parameter.name));
        }

        self.parameters.insert(parameter.name.clone(), parameter);

        Ok(())
    }

    /// Returns the parameter registered as `name`.
    pub fn get(&self, name: &str) -> Result<&Parameter, ConfigurationError> {
        self.parameters
            .get(name)
            .ok_or_else(|| ConfigurationError::UnknownParameter(name.to_string()))
    }

    /// Returns whether a parameter named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.parameters.contains_key(name)
    }

    /// Names of all registered parameters in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.keys().map(String::as_str)
    }

    /// Number of registered parameters.
    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    /// Returns `true` if no parameter is registered.
    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// Returns the integral of the proposal density of `name` over its bounds.
    pub fn normalization(&self, name: &str) -> crate::Result<f64> {
        Ok(self.get(name)?.normalization()?)
    }

    /// Returns the bounds `(left, right)` of `name`.
    pub fn bounds(&self, name: &str) -> Result<(f64, f64), ConfigurationError> {
        Ok(self.get(name)?.bounds())
    }

    /// Normalized proposal density of `name` at `x`.
    pub fn density(&self, name: &str, x: f64) -> crate::Result<f64> {
        Ok(self.get(name)?.density(x)?)
    }

    /// Target density of `name` at `x`.
    pub fn target_density(&self, name: &str, x: f64) -> Result<f64, ConfigurationError> {
        Ok(self.get(name)?.target_density(x))
    }

    /// The CDF of the proposal of `name` at `x`, if it is known.
    ///
    /// Only parameters sampled from a tabulated inverse CDF know their CDF; for all other
    /// parameters this returns `Ok(None)`.
    pub fn cdf(&self, name: &str, x: f64) -> crate::Result<Option<f64>> {
        match self.get(name)?.plan()? {
            SamplingPlan::Tabulated(table) => Ok(Some(table.cdf(x))),
            _ => Ok(None),
        }
    }

    /// Describes the proposal of `name`.
    pub fn proposal_metadata(&self, name: &str) -> crate::Result<ProposalMetadata> {
        let parameter = self.get(name)?;
        let (left, right) = parameter.bounds();

        Ok(ProposalMetadata {
            left,
            right,
            normalization: parameter.normalization()?,
            method: parameter.kind(),
            has_prior: parameter.has_prior(),
        })
    }
}
