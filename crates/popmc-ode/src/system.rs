//! ODE systems and trajectory solving.

use std::fmt;
use std::sync::Arc;

use nalgebra::{DMatrix, DVector};
use ode_solvers::dop_shared::{IntegrationError, OutputType};
use ode_solvers::{Dopri5, Rk4, System};
use popmc_core::{ErrorInfo, PopmcError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Right-hand side `f(y, t; theta)` writing the derivative into its last argument.
pub type Rhs = dyn Fn(&[f64], f64, &[f64], &mut [f64]) + Send + Sync;

/// Simulated states: row `k` holds the state at `times[k]`.
pub type Trajectory = DMatrix<f64>;

/// Error returned by [`OdeSystem::solve`].
#[derive(Debug, Error)]
pub enum SolveError {
    /// The integrator gave up (step size underflow, stiffness, step limit).
    #[error(transparent)]
    Integration(#[from] IntegrationError),

    /// `theta` has the wrong length for the right-hand side.
    #[error("expected {expected} ODE parameters, got {found}")]
    ParameterCount {
        /// Parameters the system was built with.
        expected: usize,
        /// Parameters passed to [`OdeSystem::solve`].
        found: usize,
    },

    /// The state or its derivative stopped being finite.
    #[error("state became non-finite at t = {time}")]
    NonFinite {
        /// Output time at which the check failed.
        time: f64,
    },

    /// The integrator returned without any state for a segment.
    #[error("integrator produced no output for the segment ending at t = {time}")]
    EmptySegment {
        /// End of the segment.
        time: f64,
    },
}

/// Supported numerical integration methods.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Method {
    /// Adaptive Dormand–Prince 5(4) Runge–Kutta method.
    Dopri5 {
        /// Absolute error tolerance.
        abs_tol: f64,
        /// Relative error tolerance.
        rel_tol: f64,
    },

    /// Classic fixed-step 4th-order Runge–Kutta method.
    ///
    /// Each segment between output times is split into equal steps no longer
    /// than `max_step`.
    Rk4 {
        /// Upper bound on the step length.
        max_step: f64,
    },
}

impl Default for Method {
    fn default() -> Self {
        Method::Dopri5 {
            abs_tol: 1e-8,
            rel_tol: 1e-6,
        }
    }
}

/// `y'(t) = f(y, t; theta), y(times[0]) = y_init`, observed on `times`.
#[derive(Clone)]
pub struct OdeSystem {
    title: String,
    rhs: Arc<Rhs>,
    num_params: usize,
    y_init: Vec<f64>,
    times: Vec<f64>,
    method: Method,
}

impl fmt::Debug for OdeSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdeSystem")
            .field("title", &self.title)
            .field("num_params", &self.num_params)
            .field("y_init", &self.y_init)
            .field("num_times", &self.times.len())
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl OdeSystem {
    /// Creates a system from its right-hand side.
    ///
    /// `num_params` is the number of ODE parameters `theta` the right-hand side
    /// reads; noise scales are not part of it.
    pub fn new<F>(
        title: impl Into<String>,
        num_params: usize,
        y_init: Vec<f64>,
        times: Vec<f64>,
        rhs: F,
    ) -> Result<Self, PopmcError>
    where
        F: Fn(&[f64], f64, &[f64], &mut [f64]) + Send + Sync + 'static,
    {
        let title = title.into();
        if y_init.is_empty() {
            return Err(PopmcError::Model(
                ErrorInfo::new("state-empty", "initial state must have at least one variable")
                    .with_context("title", &title),
            ));
        }
        if let Some(index) = y_init.iter().position(|value| !value.is_finite()) {
            return Err(PopmcError::Model(
                ErrorInfo::new("state-non-finite", "initial state must be finite")
                    .with_context("index", index),
            ));
        }
        if times.is_empty() {
            return Err(PopmcError::Model(
                ErrorInfo::new("times-empty", "at least one output time is required")
                    .with_context("title", &title),
            ));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(PopmcError::Model(ErrorInfo::new(
                "times-non-finite",
                "output times must be finite",
            )));
        }
        if let Some(index) = times.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(PopmcError::Model(
                ErrorInfo::new("times-order", "output times must be strictly increasing")
                    .with_context("index", index + 1),
            ));
        }
        Ok(Self {
            title,
            rhs: Arc::new(rhs),
            num_params,
            y_init,
            times,
            method: Method::default(),
        })
    }

    /// Replaces the integration method.
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Title of the system.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of ODE parameters `m`.
    pub fn num_params(&self) -> usize {
        self.num_params
    }

    /// Dimension `n` of the state.
    pub fn dim(&self) -> usize {
        self.y_init.len()
    }

    /// Output times.
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// Initial state.
    pub fn y_init(&self) -> &[f64] {
        &self.y_init
    }

    /// Integration method in use.
    pub fn method(&self) -> Method {
        self.method
    }

    /// Evaluates the right-hand side once.
    pub fn derivative(&self, y: &[f64], t: f64, theta: &[f64]) -> Vec<f64> {
        let mut dy = vec![0.0; y.len()];
        (self.rhs)(y, t, theta, &mut dy);
        dy
    }

    /// Solves the system at `theta`, returning a `p x n` trajectory.
    pub fn solve(&self, theta: &[f64]) -> Result<Trajectory, SolveError> {
        if theta.len() != self.num_params {
            return Err(SolveError::ParameterCount {
                expected: self.num_params,
                found: theta.len(),
            });
        }
        let mut trajectory = DMatrix::zeros(self.times.len(), self.dim());
        let mut state = DVector::from_column_slice(&self.y_init);
        trajectory.row_mut(0).copy_from(&state.transpose());

        for (row, segment) in self.times.windows(2).enumerate() {
            let (start, end) = (segment[0], segment[1]);
            let slope = self.derivative(state.as_slice(), start, theta);
            if slope.iter().any(|value| !value.is_finite()) {
                return Err(SolveError::NonFinite { time: start });
            }
            state = self.integrate_segment(theta, start, end, state)?;
            if state.iter().any(|value| !value.is_finite()) {
                return Err(SolveError::NonFinite { time: end });
            }
            trajectory.row_mut(row + 1).copy_from(&state.transpose());
        }
        Ok(trajectory)
    }

    fn integrate_segment(
        &self,
        theta: &[f64],
        start: f64,
        end: f64,
        state: DVector<f64>,
    ) -> Result<DVector<f64>, SolveError> {
        let adapter = RhsAdapter {
            rhs: self.rhs.as_ref(),
            theta,
        };
        let last = match self.method {
            Method::Dopri5 { abs_tol, rel_tol } => {
                let span = end - start;
                // Sparse output records every accepted step; the last one lands on `end`.
                let mut stepper = Dopri5::from_param(
                    adapter,
                    start,
                    end,
                    span,
                    state,
                    rel_tol,
                    abs_tol,
                    0.9,
                    0.04,
                    0.2,
                    10.0,
                    span,
                    0.0,
                    100_000,
                    1000,
                    OutputType::Sparse,
                );
                stepper.integrate()?;
                stepper.y_out().last().cloned()
            }
            Method::Rk4 { max_step } => {
                let span = end - start;
                let steps = (span / max_step.max(f64::EPSILON)).ceil().max(1.0);
                let mut stepper = Rk4::new(adapter, start, state, end, span / steps);
                stepper.integrate()?;
                stepper.y_out().last().cloned()
            }
        };
        last.ok_or(SolveError::EmptySegment { time: end })
    }
}

struct RhsAdapter<'a> {
    rhs: &'a Rhs,
    theta: &'a [f64],
}

impl System<f64, DVector<f64>> for RhsAdapter<'_> {
    fn system(&self, t: f64, y: &DVector<f64>, dy: &mut DVector<f64>) {
        (self.rhs)(y.as_slice(), t, self.theta, dy.as_mut_slice());
    }
}

/// `n` evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            (0..n).map(|i| start + step * i as f64).collect()
        }
    }
}
