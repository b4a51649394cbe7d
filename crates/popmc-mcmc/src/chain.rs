use popmc_core::{ErrorInfo, LogDensity, ParameterBounds, ParameterVector, PopmcError, RngHandle};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::tempering;

/// Per-chain acceptance bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainCounters {
    /// Mutation proposals made by this chain, including out-of-bounds ones.
    pub mutations_proposed: usize,
    /// Mutation proposals accepted.
    pub mutations_accepted: usize,
    /// Mutation proposals rejected for leaving the bounds.
    pub out_of_bounds: usize,
    /// Exchanges this chain took part in.
    pub exchanges_proposed: usize,
    /// Exchanges accepted.
    pub exchanges_accepted: usize,
}

impl ChainCounters {
    /// Accepted over proposed mutations, 0 when nothing was proposed.
    pub fn mutation_acceptance(&self) -> f64 {
        ratio(self.mutations_accepted, self.mutations_proposed)
    }

    /// Accepted over proposed exchanges, 0 when nothing was proposed.
    pub fn exchange_acceptance(&self) -> f64 {
        ratio(self.exchanges_accepted, self.exchanges_proposed)
    }
}

fn ratio(accepted: usize, proposed: usize) -> f64 {
    if proposed == 0 {
        0.0
    } else {
        accepted as f64 / proposed as f64
    }
}

/// Result of one Metropolis mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MutationOutcome {
    /// The proposal replaced the current state.
    Accepted,
    /// The proposal was inside the bounds but lost the Metropolis draw.
    Rejected,
    /// The proposal left the bounds and was never evaluated.
    OutOfBounds,
}

impl MutationOutcome {
    /// Whether the chain moved.
    pub fn is_accepted(self) -> bool {
        self == MutationOutcome::Accepted
    }
}

/// One tempered random-walk sampler of the population.
///
/// The untempered log-density of the current state is cached so that neither
/// mutation nor exchange re-solves the ODE for a state that was already
/// evaluated.
#[derive(Debug, Clone)]
pub struct Chain {
    id: usize,
    tempering: f64,
    current: ParameterVector,
    log_density: f64,
    trace: Vec<ParameterVector>,
    counters: ChainCounters,
}

impl Chain {
    /// Creates chain `id` (1-based) of a population of `num_chains`, starting at
    /// `initial`.
    pub fn new<D: LogDensity + ?Sized>(
        id: usize,
        num_chains: usize,
        initial: ParameterVector,
        target: &D,
    ) -> Result<Self, PopmcError> {
        if id == 0 || id > num_chains {
            return Err(PopmcError::Config(
                ErrorInfo::new("chain-id-range", "chain ids run from 1 to num_chains")
                    .with_context("id", id)
                    .with_context("num_chains", num_chains),
            ));
        }
        let log_density = target.log_density(&initial);
        Ok(Self {
            id,
            tempering: tempering::tempering_exponent(id, num_chains),
            current: initial,
            log_density,
            trace: Vec::new(),
            counters: ChainCounters::default(),
        })
    }

    pub(crate) fn restore(
        id: usize,
        tempering: f64,
        current: ParameterVector,
        log_density: f64,
        trace: Vec<ParameterVector>,
        counters: ChainCounters,
    ) -> Self {
        Self {
            id,
            tempering,
            current,
            log_density,
            trace,
            counters,
        }
    }

    /// 1-based chain id; chain 1 is the untempered target chain.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Tempering exponent `T`.
    pub fn tempering(&self) -> f64 {
        self.tempering
    }

    /// Current state.
    pub fn current(&self) -> &ParameterVector {
        &self.current
    }

    /// Untempered log-density `L` of the current state.
    pub fn log_density(&self) -> f64 {
        self.log_density
    }

    /// Tempered log-density `(1 - T) * L` of the current state.
    pub fn tempered_log_density(&self) -> f64 {
        tempering::tempered(self.log_density, self.tempering)
    }

    /// Recorded states, one per completed iteration.
    pub fn trace(&self) -> &[ParameterVector] {
        &self.trace
    }

    /// Acceptance counters.
    pub fn counters(&self) -> &ChainCounters {
        &self.counters
    }

    /// Gaussian random-walk proposal with per-coordinate standard deviation
    /// `scale * width`.
    pub fn propose(
        &self,
        bounds: &ParameterBounds,
        scale: f64,
        rng: &mut RngHandle,
    ) -> ParameterVector {
        let values = self
            .current
            .iter()
            .enumerate()
            .map(|(index, value)| {
                let z: f64 = rng.sample(StandardNormal);
                value + scale * bounds.width(index) * z
            })
            .collect();
        ParameterVector::new(values)
    }

    /// Metropolis mutation against the chain's tempered density.
    ///
    /// Out-of-bounds proposals are rejected before the density is touched.
    pub fn mutate<D: LogDensity + ?Sized>(
        &mut self,
        target: &D,
        bounds: &ParameterBounds,
        scale: f64,
        rng: &mut RngHandle,
    ) -> MutationOutcome {
        self.counters.mutations_proposed += 1;
        let proposal = self.propose(bounds, scale, rng);
        if !bounds.contains(&proposal) {
            self.counters.out_of_bounds += 1;
            return MutationOutcome::OutOfBounds;
        }
        let proposed_density = target.log_density(&proposal);
        let accepted = tempering::metropolis_accept(
            tempering::tempered(proposed_density, self.tempering),
            self.tempered_log_density(),
            rng,
        );
        if accepted {
            self.current = proposal;
            self.log_density = proposed_density;
            self.counters.mutations_accepted += 1;
            MutationOutcome::Accepted
        } else {
            MutationOutcome::Rejected
        }
    }

    /// Appends the current state to the trace.
    pub fn record(&mut self) {
        self.trace.push(self.current.clone());
    }

    pub(crate) fn note_exchange(&mut self, accepted: bool) {
        self.counters.exchanges_proposed += 1;
        if accepted {
            self.counters.exchanges_accepted += 1;
        }
    }

    /// Swaps current states (and their cached densities) between two chains;
    /// ids, tempering and traces stay put.
    pub(crate) fn swap_states(a: &mut Chain, b: &mut Chain) {
        std::mem::swap(&mut a.current, &mut b.current);
        std::mem::swap(&mut a.log_density, &mut b.log_density);
    }
}
