//! Reference models with known ground truth.

use std::fmt;
use std::str::FromStr;

use popmc_core::{ErrorInfo, ParameterBounds, PopmcError};
use serde::{Deserialize, Serialize};

use crate::system::{linspace, OdeSystem};

/// `y' = -theta * y`, `y(0) = y0`.
pub fn exponential_decay(y0: f64, times: Vec<f64>) -> Result<OdeSystem, PopmcError> {
    OdeSystem::new("exponential_decay", 1, vec![y0], times, |y, _t, theta, dy| {
        dy[0] = -theta[0] * y[0];
    })
}

/// `y' = r y (1 - y / k)`.
pub fn logistic_growth(y0: f64, times: Vec<f64>) -> Result<OdeSystem, PopmcError> {
    OdeSystem::new("logistic_growth", 2, vec![y0], times, |y, _t, theta, dy| {
        let (r, k) = (theta[0], theta[1]);
        dy[0] = r * y[0] * (1.0 - y[0] / k);
    })
}

/// `y1' = a y2`, `y2' = -b y1`.
pub fn oscillator(y0: [f64; 2], times: Vec<f64>) -> Result<OdeSystem, PopmcError> {
    OdeSystem::new("oscillator", 2, y0.to_vec(), times, |y, _t, theta, dy| {
        dy[0] = theta[0] * y[1];
        dy[1] = -theta[1] * y[0];
    })
}

/// Built-in demo problems with ground truth, noise level and search box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceModel {
    /// Exponential decay at rate 0.5 observed with noise 0.1.
    ExpDecay,
    /// Logistic growth with `r = 3`, `k = 7`.
    Logistic,
    /// Harmonic oscillator with `a = 2`, `b = 1`.
    Oscillator,
}

impl ReferenceModel {
    /// All built-in models.
    pub const ALL: [ReferenceModel; 3] = [
        ReferenceModel::ExpDecay,
        ReferenceModel::Logistic,
        ReferenceModel::Oscillator,
    ];

    /// Stable identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceModel::ExpDecay => "exp-decay",
            ReferenceModel::Logistic => "logistic",
            ReferenceModel::Oscillator => "oscillator",
        }
    }

    /// The ODE system on its default time grid.
    pub fn system(&self) -> Result<OdeSystem, PopmcError> {
        match self {
            ReferenceModel::ExpDecay => exponential_decay(1.0, linspace(0.0, 5.0, 100)),
            ReferenceModel::Logistic => logistic_growth(5.0, linspace(0.0, 10.0, 100)),
            ReferenceModel::Oscillator => oscillator([0.0, 1.0], linspace(0.0, 10.0, 100)),
        }
    }

    /// Ground-truth ODE parameters.
    pub fn true_theta(&self) -> Vec<f64> {
        match self {
            ReferenceModel::ExpDecay => vec![0.5],
            ReferenceModel::Logistic => vec![3.0, 7.0],
            ReferenceModel::Oscillator => vec![2.0, 1.0],
        }
    }

    /// Noise standard deviation per state variable.
    pub fn true_sigma(&self) -> Vec<f64> {
        match self {
            ReferenceModel::ExpDecay => vec![0.1],
            ReferenceModel::Logistic => vec![0.01],
            ReferenceModel::Oscillator => vec![0.01, 0.01],
        }
    }

    /// Search box over `theta` followed by `sigma`.
    pub fn bounds(&self) -> Result<ParameterBounds, PopmcError> {
        match self {
            ReferenceModel::ExpDecay => ParameterBounds::new(vec![0.0, 0.01], vec![1.0, 0.41]),
            ReferenceModel::Logistic => {
                ParameterBounds::new(vec![0.0, 5.0, 0.001], vec![10.0, 10.0, 2.0])
            }
            ReferenceModel::Oscillator => ParameterBounds::new(
                vec![0.0, 0.0, 0.001, 0.001],
                vec![10.0, 10.0, 2.0, 2.0],
            ),
        }
    }

    /// Parameter labels matching [`ReferenceModel::bounds`].
    pub fn param_names(&self) -> Vec<String> {
        let names: &[&str] = match self {
            ReferenceModel::ExpDecay => &["theta", "sigma"],
            ReferenceModel::Logistic => &["r", "k", "sigma"],
            ReferenceModel::Oscillator => &["a", "b", "sigma_1", "sigma_2"],
        };
        names.iter().map(|name| name.to_string()).collect()
    }
}

impl fmt::Display for ReferenceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferenceModel {
    type Err = PopmcError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ReferenceModel::ALL
            .into_iter()
            .find(|model| model.as_str() == value)
            .ok_or_else(|| {
                PopmcError::Config(
                    ErrorInfo::new("unknown-model", "no built-in model with that name")
                        .with_context("model", value)
                        .with_hint("expected one of exp-decay, logistic, oscillator"),
                )
            })
    }
}
