#![deny(missing_docs)]

//! Population MCMC over tempered chains with replica exchange, for Bayesian
//! calibration of ODE models.
//!
//! A [`Simulator`] owns `N` [`Chain`]s with tempering exponents
//! `T_i = (i - 1) / N`. Each iteration mutates one chain with a Gaussian
//! random-walk Metropolis step, proposes one state exchange between two
//! chains, and appends every chain's state to its trace. Chain 1 samples the
//! untempered posterior.

/// Posterior summaries and convergence diagnostics over traces.
pub mod analysis;
/// Chain state, proposals and the Metropolis mutation step.
pub mod chain;
/// Checkpoint payloads and file naming.
pub mod checkpoint;
/// YAML configuration schema and defaults.
pub mod config;
/// Priors, the Gaussian likelihood and the ODE posterior.
pub mod density;
/// Run manifest serialization helpers.
pub mod manifest;
/// The population sampler state machine.
pub mod simulator;
/// Tempering ladder and acceptance arithmetic.
pub mod tempering;
/// Trace CSV export and import.
pub mod trace;

pub use analysis::{ChainSummary, ParameterSummary};
pub use chain::{Chain, ChainCounters, MutationOutcome};
pub use checkpoint::CheckpointPayload;
pub use config::{
    CheckpointConfig, ExchangePairing, OutputConfig, PriorKind, ProposalConfig, RunConfig,
    SeedPolicy,
};
pub use density::{LogPrior, OdePosterior};
pub use manifest::RunManifest;
pub use simulator::{IterationReport, Phase, RunSummary, Simulator};
