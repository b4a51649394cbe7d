#![deny(missing_docs)]
#![doc = "Core data model, error surface and deterministic randomness shared by the popmc crates."]

pub mod errors;
pub mod hash;
pub mod provenance;
pub mod rng;
mod types;

pub use errors::{ErrorInfo, PopmcError};
pub use hash::{float_slice_hash, stable_hash_string};
pub use provenance::{RunProvenance, SchemaVersion};
pub use rng::{derive_substream_seed, RngHandle};
pub use types::{ObservedData, ParameterBounds, ParameterVector};

/// Unnormalized log-density over parameter vectors.
///
/// Implementations must return `f64::NEG_INFINITY` for infeasible points
/// instead of failing, so that infeasibility takes part in acceptance-ratio
/// arithmetic as a certain rejection.
pub trait LogDensity {
    /// Evaluates `log prior + log likelihood` at `params`.
    fn log_density(&self, params: &ParameterVector) -> f64;

    /// Number of evaluations so far that were infeasible because the model
    /// itself failed (as opposed to leaving the prior's support).
    fn solver_failures(&self) -> usize {
        0
    }
}

impl<F> LogDensity for F
where
    F: Fn(&ParameterVector) -> f64,
{
    fn log_density(&self, params: &ParameterVector) -> f64 {
        self(params)
    }
}
