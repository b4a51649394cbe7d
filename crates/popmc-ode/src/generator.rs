//! Synthetic observed data for demos and tests.

use popmc_core::{ErrorInfo, ObservedData, PopmcError, RngHandle};
use rand::Rng;
use rand_distr::StandardNormal;
use tracing::debug;

use crate::system::OdeSystem;

/// Generates noisy observations of an [`OdeSystem`] solved at ground-truth
/// parameters.
#[derive(Debug, Clone)]
pub struct DataGenerator<'a> {
    system: &'a OdeSystem,
    true_theta: Vec<f64>,
    sigma: Vec<f64>,
}

impl<'a> DataGenerator<'a> {
    /// `sigma` holds one standard deviation per state variable; a single value
    /// is applied to every variable.
    pub fn new(
        system: &'a OdeSystem,
        true_theta: Vec<f64>,
        sigma: Vec<f64>,
    ) -> Result<Self, PopmcError> {
        if true_theta.len() != system.num_params() {
            return Err(PopmcError::Model(
                ErrorInfo::new("dimension-mismatch", "ground truth has the wrong length")
                    .with_context("expected", system.num_params())
                    .with_context("found", true_theta.len()),
            ));
        }
        let sigma = match sigma.len() {
            1 => vec![sigma[0]; system.dim()],
            len if len == system.dim() => sigma,
            len => {
                return Err(PopmcError::Model(
                    ErrorInfo::new("dimension-mismatch", "one noise scale per state variable")
                        .with_context("expected", system.dim())
                        .with_context("found", len),
                ))
            }
        };
        if let Some(index) = sigma.iter().position(|s| !s.is_finite() || *s < 0.0) {
            return Err(PopmcError::Model(
                ErrorInfo::new("sigma-invalid", "noise scales must be finite and non-negative")
                    .with_context("index", index),
            ));
        }
        Ok(Self {
            system,
            true_theta,
            sigma,
        })
    }

    /// Ground-truth ODE parameters.
    pub fn true_theta(&self) -> &[f64] {
        &self.true_theta
    }

    /// Per-variable noise scales.
    pub fn sigma(&self) -> &[f64] {
        &self.sigma
    }

    /// Solves at the ground truth and perturbs every entry with independent
    /// Gaussian noise.
    pub fn generate(&self, rng: &mut RngHandle) -> Result<ObservedData, PopmcError> {
        let mut values = self.system.solve(&self.true_theta).map_err(|err| {
            PopmcError::Model(
                ErrorInfo::new("ground-truth-solve", err.to_string())
                    .with_context("title", self.system.title()),
            )
        })?;
        for t in 0..values.nrows() {
            for var in 0..values.ncols() {
                let z: f64 = rng.sample(StandardNormal);
                values[(t, var)] += self.sigma[var] * z;
            }
        }
        debug!(
            model = self.system.title(),
            timesteps = values.nrows(),
            variables = values.ncols(),
            "generated synthetic observations"
        );
        ObservedData::from_matrix(values)
    }
}
