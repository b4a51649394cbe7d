use std::ops::Index;

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, PopmcError};
use crate::hash::float_slice_hash;
use crate::rng::RngHandle;

/// Ordered parameter values: `m` ODE parameters followed by `n` noise scales.
///
/// A vector held as a chain's current state is never edited in place; moves
/// replace it wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterVector(Vec<f64>);

impl ParameterVector {
    /// Wraps raw parameter values.
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// Number of coordinates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the vector has no coordinates.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrowed view over the coordinates.
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Splits into the ODE parameters `theta` (first `num_theta` entries) and the
    /// observation-noise scales `sigma` (the rest).
    pub fn split(&self, num_theta: usize) -> (&[f64], &[f64]) {
        self.0.split_at(num_theta.min(self.0.len()))
    }

    /// Iterates over the coordinates.
    pub fn iter(&self) -> std::slice::Iter<'_, f64> {
        self.0.iter()
    }

    /// Consumes the vector and returns the raw values.
    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for ParameterVector {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl Index<usize> for ParameterVector {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.0[index]
    }
}

/// Closed box `[lower, upper]` constraining initial sampling and proposals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterBounds {
    lower: ParameterVector,
    upper: ParameterVector,
}

impl ParameterBounds {
    /// Builds bounds from matching lower and upper vectors.
    ///
    /// Equal lower and upper values are allowed and pin that coordinate.
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, PopmcError> {
        if lower.is_empty() {
            return Err(PopmcError::Config(
                ErrorInfo::new("bounds-empty", "parameter bounds must have at least one column")
                    .with_hint("provide bounds for every ODE parameter and noise scale"),
            ));
        }
        if lower.len() != upper.len() {
            return Err(PopmcError::Config(
                ErrorInfo::new("dimension-mismatch", "lower and upper bounds differ in length")
                    .with_context("lower", lower.len())
                    .with_context("upper", upper.len()),
            ));
        }
        for (index, (lo, hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(PopmcError::Config(
                    ErrorInfo::new("bounds-non-finite", "parameter bounds must be finite")
                        .with_context("index", index),
                ));
            }
            if lo > hi {
                return Err(PopmcError::Config(
                    ErrorInfo::new("bounds-order", "lower bound exceeds upper bound")
                        .with_context("index", index)
                        .with_context("lower", lo)
                        .with_context("upper", hi)
                        .with_hint("lower bounds belong in the first row"),
                ));
            }
        }
        Ok(Self {
            lower: ParameterVector::new(lower),
            upper: ParameterVector::new(upper),
        })
    }

    /// Builds bounds from a `2 x k` row layout (lower row first).
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, PopmcError> {
        match rows {
            [lower, upper] => Self::new(lower.clone(), upper.clone()),
            _ => Err(PopmcError::Config(
                ErrorInfo::new("bounds-shape", "parameter bounds must have exactly 2 rows")
                    .with_context("rows", rows.len()),
            )),
        }
    }

    /// Number of bounded coordinates.
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    /// Always `false`; construction rejects empty bounds.
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Lower corner of the box.
    pub fn lower(&self) -> &ParameterVector {
        &self.lower
    }

    /// Upper corner of the box.
    pub fn upper(&self) -> &ParameterVector {
        &self.upper
    }

    /// Width of coordinate `index`.
    pub fn width(&self, index: usize) -> f64 {
        self.upper[index] - self.lower[index]
    }

    /// Midpoint of coordinate `index`.
    pub fn midpoint(&self, index: usize) -> f64 {
        0.5 * (self.upper[index] + self.lower[index])
    }

    /// Whether `params` lies inside the closed box. Length mismatches and
    /// non-finite coordinates are outside.
    pub fn contains(&self, params: &ParameterVector) -> bool {
        params.len() == self.len()
            && params
                .iter()
                .zip(self.lower.iter().zip(self.upper.iter()))
                .all(|(value, (lo, hi))| value.is_finite() && lo <= value && value <= hi)
    }

    /// Draws a point uniformly from the box.
    pub fn sample_uniform(&self, rng: &mut RngHandle) -> ParameterVector {
        let values = self
            .lower
            .iter()
            .zip(self.upper.iter())
            .map(|(lo, hi)| {
                let u = rng.uniform();
                if lo == hi {
                    *lo
                } else {
                    lo + u * (hi - lo)
                }
            })
            .collect();
        ParameterVector::new(values)
    }
}

/// Observed trajectories: a `p x n` matrix of `p` timesteps and `n` state
/// variables, read-only once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedData {
    values: DMatrix<f64>,
}

impl ObservedData {
    /// Builds observed data from timestep rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, PopmcError> {
        let num_rows = rows.len();
        let num_cols = rows.first().map(Vec::len).unwrap_or(0);
        if num_rows == 0 || num_cols == 0 {
            return Err(PopmcError::Data(ErrorInfo::new(
                "observed-empty",
                "observed data must contain at least one timestep and one variable",
            )));
        }
        if let Some(row) = rows.iter().position(|row| row.len() != num_cols) {
            return Err(PopmcError::Data(
                ErrorInfo::new("observed-ragged", "observed rows differ in length")
                    .with_context("row", row)
                    .with_context("expected", num_cols)
                    .with_context("found", rows[row].len()),
            ));
        }
        let matrix = DMatrix::from_fn(num_rows, num_cols, |r, c| rows[r][c]);
        Self::from_matrix(matrix)
    }

    /// Wraps an existing matrix (rows are timesteps).
    pub fn from_matrix(values: DMatrix<f64>) -> Result<Self, PopmcError> {
        if values.nrows() == 0 || values.ncols() == 0 {
            return Err(PopmcError::Data(ErrorInfo::new(
                "observed-empty",
                "observed data must contain at least one timestep and one variable",
            )));
        }
        if let Some(index) = values.iter().position(|value| !value.is_finite()) {
            return Err(PopmcError::Data(
                ErrorInfo::new("observed-non-finite", "observed data contains NaN or infinity")
                    .with_context("row", index % values.nrows())
                    .with_context("column", index / values.nrows()),
            ));
        }
        Ok(Self { values })
    }

    /// Number of timesteps `p`.
    pub fn num_timesteps(&self) -> usize {
        self.values.nrows()
    }

    /// Number of state variables `n`.
    pub fn num_variables(&self) -> usize {
        self.values.ncols()
    }

    /// Observation at timestep `t` for variable `var`.
    pub fn get(&self, t: usize, var: usize) -> f64 {
        self.values[(t, var)]
    }

    /// Borrowed matrix view.
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.values
    }

    /// Copies out timestep `t`.
    pub fn row(&self, t: usize) -> Vec<f64> {
        self.values.row(t).iter().copied().collect()
    }

    /// Stable hash of the shape and exact values.
    pub fn content_hash(&self) -> String {
        let mut flat = vec![self.num_timesteps() as f64, self.num_variables() as f64];
        flat.extend(self.values.iter().copied());
        float_slice_hash(&flat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_separates_theta_and_sigma() {
        let params = ParameterVector::new(vec![1.0, 2.0, 0.1]);
        let (theta, sigma) = params.split(2);
        assert_eq!(theta, &[1.0, 2.0]);
        assert_eq!(sigma, &[0.1]);
    }

    #[test]
    fn contains_is_closed() {
        let bounds = ParameterBounds::new(vec![0.0, 1.0], vec![1.0, 1.0]).unwrap();
        assert!(bounds.contains(&ParameterVector::new(vec![0.0, 1.0])));
        assert!(bounds.contains(&ParameterVector::new(vec![1.0, 1.0])));
        assert!(!bounds.contains(&ParameterVector::new(vec![1.0 + 1e-12, 1.0])));
        assert!(!bounds.contains(&ParameterVector::new(vec![0.5, f64::NAN])));
        assert!(!bounds.contains(&ParameterVector::new(vec![0.5])));
    }

    #[test]
    fn uniform_samples_stay_inside() {
        let bounds = ParameterBounds::new(vec![-2.0, 3.0, 0.0], vec![2.0, 3.0, 0.5]).unwrap();
        let mut rng = RngHandle::from_seed(99);
        for _ in 0..200 {
            let sample = bounds.sample_uniform(&mut rng);
            assert!(bounds.contains(&sample));
            assert_eq!(sample[1], 3.0);
        }
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = ObservedData::from_rows(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert_eq!(err.info().code, "observed-ragged");
    }

    #[test]
    fn observed_rows_are_timesteps() {
        let data = ObservedData::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0, 6.0]])
            .unwrap();
        assert_eq!(data.num_timesteps(), 3);
        assert_eq!(data.num_variables(), 2);
        assert_eq!(data.get(2, 0), 5.0);
        assert_eq!(data.row(1), vec![3.0, 4.0]);
    }
}
