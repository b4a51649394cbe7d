//! ODE model boundary for popmc.
//!
//! The sampler only ever calls [`OdeSystem::solve`]; everything numerical about
//! integration lives here.

#![deny(missing_docs)]

pub mod generator;
pub mod models;
pub mod system;

pub use generator::DataGenerator;
pub use models::ReferenceModel;
pub use system::{linspace, Method, OdeSystem, Rhs, SolveError, Trajectory};
