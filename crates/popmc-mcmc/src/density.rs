use std::cell::Cell;

use popmc_core::{ErrorInfo, LogDensity, ObservedData, ParameterBounds, ParameterVector, PopmcError};
use popmc_ode::{OdeSystem, Trajectory};
use tracing::debug;

use crate::config::PriorKind;

const LN_SQRT_2PI: f64 = 0.918_938_533_204_672_8;

/// Fraction of a coordinate's bound width used as the truncated-normal
/// standard deviation.
const TRUNCATED_NORMAL_WIDTH_FRACTION: f64 = 0.125;

/// Log-density of `Normal(mean, sd)` at `x`; `-inf` for a non-positive scale.
pub fn gaussian_log_pdf(x: f64, mean: f64, sd: f64) -> f64 {
    if !(sd > 0.0) {
        return f64::NEG_INFINITY;
    }
    let z = (x - mean) / sd;
    -LN_SQRT_2PI - sd.ln() - 0.5 * z * z
}

/// Prior over the bounded box: `-inf` outside, uniform or truncated-normal inside.
#[derive(Debug, Clone, PartialEq)]
pub struct LogPrior {
    bounds: ParameterBounds,
    kind: PriorKind,
}

impl LogPrior {
    /// Builds a prior of the given kind over `bounds`.
    pub fn new(bounds: ParameterBounds, kind: PriorKind) -> Self {
        Self { bounds, kind }
    }

    /// Box the prior is supported on.
    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    /// Prior family.
    pub fn kind(&self) -> PriorKind {
        self.kind
    }

    /// Unnormalized log-prior at `params`.
    pub fn evaluate(&self, params: &ParameterVector) -> f64 {
        if !self.bounds.contains(params) {
            return f64::NEG_INFINITY;
        }
        match self.kind {
            PriorKind::Uniform => 0.0,
            PriorKind::TruncatedNormal => params
                .iter()
                .enumerate()
                .filter(|(index, _)| self.bounds.width(*index) > 0.0)
                .map(|(index, value)| {
                    let sd = self.bounds.width(index) * TRUNCATED_NORMAL_WIDTH_FRACTION;
                    gaussian_log_pdf(*value, self.bounds.midpoint(index), sd)
                })
                .sum(),
        }
    }
}

/// Independent Gaussian log-likelihood of `observed` around `trajectory`, with
/// `sigma[var]` the noise scale of state variable `var`.
///
/// Shapes must agree; a mismatch yields `-inf`.
pub fn log_likelihood(observed: &ObservedData, trajectory: &Trajectory, sigma: &[f64]) -> f64 {
    let values = observed.matrix();
    if values.shape() != trajectory.shape() || sigma.len() != values.ncols() {
        return f64::NEG_INFINITY;
    }
    let mut total = 0.0;
    for (var, &scale) in sigma.iter().enumerate() {
        for t in 0..values.nrows() {
            total += gaussian_log_pdf(values[(t, var)], trajectory[(t, var)], scale);
        }
    }
    total
}

/// Unnormalized posterior of an ODE model: `log prior + log likelihood`.
///
/// The parameter vector is `theta` (the ODE parameters) followed by one noise
/// scale per state variable. Solver failures evaluate to `-inf` and are counted.
#[derive(Debug)]
pub struct OdePosterior {
    system: OdeSystem,
    data: ObservedData,
    prior: LogPrior,
    solver_failures: Cell<usize>,
}

impl OdePosterior {
    /// Validates that `data` and `prior` are compatible with `system`.
    pub fn new(system: OdeSystem, data: ObservedData, prior: LogPrior) -> Result<Self, PopmcError> {
        if data.num_timesteps() != system.times().len() || data.num_variables() != system.dim() {
            return Err(PopmcError::Data(
                ErrorInfo::new("dimension-mismatch", "observed data must be times x state variables")
                    .with_context("expected_rows", system.times().len())
                    .with_context("expected_cols", system.dim())
                    .with_context("rows", data.num_timesteps())
                    .with_context("cols", data.num_variables()),
            ));
        }
        let expected = system.num_params() + system.dim();
        if prior.bounds().len() != expected {
            return Err(PopmcError::Config(
                ErrorInfo::new("dimension-mismatch", "bounds must cover theta and one sigma per variable")
                    .with_context("expected", expected)
                    .with_context("found", prior.bounds().len()),
            ));
        }
        Ok(Self {
            system,
            data,
            prior,
            solver_failures: Cell::new(0),
        })
    }

    /// The ODE model.
    pub fn system(&self) -> &OdeSystem {
        &self.system
    }

    /// The observations conditioned on.
    pub fn data(&self) -> &ObservedData {
        &self.data
    }

    /// The prior.
    pub fn prior(&self) -> &LogPrior {
        &self.prior
    }

}

impl LogDensity for OdePosterior {
    fn log_density(&self, params: &ParameterVector) -> f64 {
        let log_prior = self.prior.evaluate(params);
        if log_prior == f64::NEG_INFINITY {
            return log_prior;
        }
        let (theta, sigma) = params.split(self.system.num_params());
        match self.system.solve(theta) {
            Ok(trajectory) => log_prior + log_likelihood(&self.data, &trajectory, sigma),
            Err(err) => {
                self.solver_failures.set(self.solver_failures.get() + 1);
                debug!(model = self.system.title(), ?theta, error = %err, "ode solve failed");
                f64::NEG_INFINITY
            }
        }
    }

    fn solver_failures(&self) -> usize {
        self.solver_failures.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_normal_peak() {
        assert!((gaussian_log_pdf(0.0, 0.0, 1.0) + LN_SQRT_2PI).abs() < 1e-15);
        assert_eq!(gaussian_log_pdf(1.0, 0.0, 0.0), f64::NEG_INFINITY);
        assert_eq!(gaussian_log_pdf(1.0, 0.0, -1.0), f64::NEG_INFINITY);
    }

    #[test]
    fn uniform_prior_is_flat_inside() {
        let bounds = ParameterBounds::new(vec![0.0, 1.0], vec![1.0, 2.0]).unwrap();
        let prior = LogPrior::new(bounds, PriorKind::Uniform);
        assert_eq!(prior.evaluate(&ParameterVector::new(vec![0.5, 1.5])), 0.0);
        assert_eq!(prior.evaluate(&ParameterVector::new(vec![1.0, 1.0])), 0.0);
        assert_eq!(
            prior.evaluate(&ParameterVector::new(vec![1.5, 1.5])),
            f64::NEG_INFINITY
        );
    }

    #[test]
    fn truncated_normal_peaks_at_midpoint_and_skips_pinned() {
        let bounds = ParameterBounds::new(vec![0.0, 3.0], vec![8.0, 3.0]).unwrap();
        let prior = LogPrior::new(bounds, PriorKind::TruncatedNormal);
        let centre = prior.evaluate(&ParameterVector::new(vec![4.0, 3.0]));
        let off = prior.evaluate(&ParameterVector::new(vec![5.0, 3.0]));
        assert!((centre - gaussian_log_pdf(0.0, 0.0, 1.0)).abs() < 1e-12);
        assert!((centre - off - 0.5).abs() < 1e-12);
    }
}
