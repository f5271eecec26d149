//! Deterministic one-dimensional quadrature used to normalize densities and to build inverse
//! cumulative distribution functions from them.

use crate::core::ScalarFunction;
use crate::error::SamplingError;

/// Number of cells of a tabulated CDF.
pub const CDF_CELLS: usize = 1000;

const SIMPSON_TOLERANCE: f64 = 1e-10;
const SIMPSON_MAX_DEPTH: u32 = 40;

/// Evaluate `pdf` at `x`, rejecting negative and non-finite values.
pub(crate) fn checked_density(
    name: &str,
    pdf: &dyn ScalarFunction,
    x: f64,
) -> Result<f64, SamplingError> {
    let value = pdf.apply(x);

    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(SamplingError::InvalidDensity {
            name: name.to_string(),
            x,
            value,
        })
    }
}

/// Integrates `pdf` over `[left, right]` with adaptive Simpson quadrature and returns the result
/// if it is positive and finite.
pub fn integrate(
    name: &str,
    pdf: &dyn ScalarFunction,
    left: f64,
    right: f64,
) -> Result<f64, SamplingError> {
    // a coarse composite rule first, so that narrow peaks are not missed by the first estimate
    let panels = 64;
    let width = (right - left) / panels as f64;
    let mut integral = 0.0;

    for panel in 0..panels {
        let a = left + width * panel as f64;
        let b = if panel + 1 == panels { right } else { a + width };
        let m = 0.5 * (a + b);
        let fa = checked_density(name, pdf, a)?;
        let fm = checked_density(name, pdf, m)?;
        let fb = checked_density(name, pdf, b)?;
        let whole = (b - a) / 6.0 * (fa + 4.0 * fm + fb);

        integral += adaptive_simpson(
            name,
            pdf,
            (a, fa),
            (m, fm),
            (b, fb),
            whole,
            SIMPSON_TOLERANCE / panels as f64,
            SIMPSON_MAX_DEPTH,
        )?;
    }

    if integral.is_finite() && integral > 0.0 {
        Ok(integral)
    } else {
        Err(SamplingError::NotIntegrable {
            name: name.to_string(),
            integral,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn adaptive_simpson(
    name: &str,
    pdf: &dyn ScalarFunction,
    (a, fa): (f64, f64),
    (m, fm): (f64, f64),
    (b, fb): (f64, f64),
    whole: f64,
    tolerance: f64,
    depth: u32,
) -> Result<f64, SamplingError> {
    let lm = 0.5 * (a + m);
    let rm = 0.5 * (m + b);
    let flm = checked_density(name, pdf, lm)?;
    let frm = checked_density(name, pdf, rm)?;
    let left = (m - a) / 6.0 * (fa + 4.0 * flm + fm);
    let right = (b - m) / 6.0 * (fm + 4.0 * frm + fb);
    let delta = left + right - whole;

    if depth == 0 || delta.abs() <= 15.0 * tolerance {
        return Ok(left + right + delta / 15.0);
    }

    Ok(adaptive_simpson(
        name,
        pdf,
        (a, fa),
        (lm, flm),
        (m, fm),
        left,
        0.5 * tolerance,
        depth - 1,
    )? + adaptive_simpson(
        name,
        pdf,
        (m, fm),
        (rm, frm),
        (b, fb),
        right,
        0.5 * tolerance,
        depth - 1,
    )?)
}

/// Cumulative distribution function of a density, tabulated on an equidistant grid.
///
/// The table is normalized by its own total, so that it rises from exactly zero to exactly one
/// and is non-decreasing by construction. Between grid points it is linearly interpolated, which
/// makes the inverse well defined even across intervals where the density vanishes.
#[derive(Debug, Clone)]
pub struct TabulatedCdf {
    left: f64,
    right: f64,
    cumulative: Vec<f64>,
}

impl TabulatedCdf {
    /// Tabulate the CDF of `pdf` on `[left, right]` using `cells` Simpson cells.
    pub fn new(
        name: &str,
        pdf: &dyn ScalarFunction,
        left: f64,
        right: f64,
        cells: usize,
    ) -> Result<Self, SamplingError> {
        let cells = cells.max(1);
        let width = (right - left) / cells as f64;
        let mut cumulative = Vec::with_capacity(cells + 1);
        cumulative.push(0.0);

        let mut total = 0.0;
        let mut fa = checked_density(name, pdf, left)?;

        for cell in 0..cells {
            let a = left + width * cell as f64;
            let b = if cell + 1 == cells { right } else { a + width };
            let fm = checked_density(name, pdf, 0.5 * (a + b))?;
            let fb = checked_density(name, pdf, b)?;
            total += (b - a) / 6.0 * (fa + 4.0 * fm + fb);
            cumulative.push(total);
            fa = fb;
        }

        if !(total.is_finite() && total > 0.0) {
            return Err(SamplingError::NotIntegrable {
                name: name.to_string(),
                integral: total,
            });
        }

        cumulative.iter_mut().for_each(|c| *c /= total);

        Ok(Self {
            left,
            right,
            cumulative,
        })
    }

    fn width(&self) -> f64 {
        (self.right - self.left) / (self.cumulative.len() - 1) as f64
    }

    /// Value of the CDF at `x`; zero left of the domain and one right of it.
    pub fn cdf(&self, x: f64) -> f64 {
        if x <= self.left {
            return 0.0;
        }
        if x >= self.right {
            return 1.0;
        }

        let position = (x - self.left) / self.width();
        let cell = (position.floor() as usize).min(self.cumulative.len() - 2);
        let fraction = position - cell as f64;

        self.cumulative[cell] + fraction * (self.cumulative[cell + 1] - self.cumulative[cell])
    }

    /// Inverse of the CDF for `u` in `[0, 1]`. The result always lies in `[left, right]`.
    pub fn inverse(&self, u: f64) -> f64 {
        let u = u.max(0.0).min(1.0);
        let last = self.cumulative.len() - 1;

        // first grid point whose cumulative value reaches `u`
        let upper = self.cumulative.partition_point(|&c| c < u).max(1).min(last);
        let lower = upper - 1;
        let (c0, c1) = (self.cumulative[lower], self.cumulative[upper]);
        let fraction = if c1 > c0 { (u - c0) / (c1 - c0) } else { 0.0 };
        let x = self.left + self.width() * (lower as f64 + fraction);

        x.max(self.left).min(self.right)
    }

    /// Largest density value observed on the grid, including cell midpoints.
    pub(crate) fn grid_maximum(
        name: &str,
        pdf: &dyn ScalarFunction,
        left: f64,
        right: f64,
        cells: usize,
    ) -> Result<f64, SamplingError> {
        let points = 2 * cells.max(1);
        let width = (right - left) / points as f64;

        (0..=points).try_fold(0.0_f64, |max, i| {
            let x = if i == points {
                right
            } else {
                left + width * i as f64
            };
            Ok(max.max(checked_density(name, pdf, x)?))
        })
    }
}
