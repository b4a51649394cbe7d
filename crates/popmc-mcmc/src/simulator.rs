use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use popmc_core::{
    derive_substream_seed, stable_hash_string, ErrorInfo, LogDensity, ObservedData,
    ParameterBounds, ParameterVector, PopmcError, RngHandle, RunProvenance, SchemaVersion,
};
use popmc_ode::OdeSystem;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analysis::{self, ParameterSummary};
use crate::chain::{Chain, MutationOutcome};
use crate::checkpoint::{self, ChainCheckpoint, CheckpointPayload};
use crate::config::{ExchangePairing, RunConfig};
use crate::density::{LogPrior, OdePosterior};
use crate::manifest::RunManifest;
use crate::tempering;
use crate::trace;

/// Stage of the iteration schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    /// Iterations `1..=init_phase_its`, excluded from posterior summaries.
    Initial,
    /// Iterations `init_phase_its + 1..=max_its`.
    Sampling,
}

/// What happened during one iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationReport {
    /// 1-based iteration that just completed.
    pub iteration: usize,
    /// Phase the iteration belonged to.
    pub phase: Phase,
    /// Id of the chain that attempted a mutation.
    pub mutated_chain: usize,
    /// Outcome of that mutation.
    pub mutation: MutationOutcome,
    /// Ids of the chains that attempted an exchange, ascending.
    pub exchange_pair: (usize, usize),
    /// Whether the exchange was accepted.
    pub exchange_accepted: bool,
    /// Log acceptance ratio of the exchange.
    pub exchange_log_acceptance: f64,
}

/// Summary returned to callers after a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Completed iterations.
    pub iterations: usize,
    /// Population size.
    pub num_chains: usize,
    /// Tempering exponent per chain, by id.
    pub tempering: Vec<f64>,
    /// Mutation acceptance rate per chain.
    pub mutation_acceptance: Vec<f64>,
    /// Exchange acceptance rate per chain.
    pub exchange_acceptance: Vec<f64>,
    /// Out-of-bounds proposals per chain.
    pub out_of_bounds: Vec<usize>,
    /// Density evaluations that failed inside the model.
    pub solver_failures: usize,
    /// Posterior summary of the target chain after the initial phase.
    pub posterior: Vec<ParameterSummary>,
    /// Trace CSV, if written.
    pub traces_path: Option<PathBuf>,
    /// Manifest, if written.
    pub manifest_path: Option<PathBuf>,
    /// Retained checkpoint files.
    pub checkpoints: Vec<PathBuf>,
}

/// Population sampler over `N` tempered chains.
///
/// Every iteration mutates one uniformly chosen chain, attempts one exchange
/// between two distinct chains, then appends each chain's current state to its
/// trace. All randomness comes from a single stream seeded by
/// `config.seed_policy.master_seed`.
#[derive(Debug)]
pub struct Simulator<D = OdePosterior> {
    target: D,
    bounds: ParameterBounds,
    config: RunConfig,
    param_names: Vec<String>,
    chains: Vec<Chain>,
    rng: RngHandle,
    master_seed: u64,
    iteration: usize,
    provenance: RunProvenance,
    checkpoints: Vec<PathBuf>,
}

impl Simulator<OdePosterior> {
    /// Builds a sampler for the posterior of `system` given `data`.
    ///
    /// `bounds` covers the ODE parameters followed by one noise scale per
    /// state variable.
    pub fn new(
        system: OdeSystem,
        data: ObservedData,
        bounds: ParameterBounds,
        config: RunConfig,
    ) -> Result<Self, PopmcError> {
        config.validate()?;
        let model_title = system.title().to_string();
        let data_hash = data.content_hash();
        let prior = LogPrior::new(bounds.clone(), config.prior);
        let target = OdePosterior::new(system, data, prior)?;
        let mut simulator = Self::with_target(target, bounds, config)?;
        simulator.provenance.model_title = model_title;
        simulator.provenance.data_hash = data_hash;
        Ok(simulator)
    }

    /// Resumes an ODE run from a checkpoint written by a sampler over the same
    /// `system` and `data`.
    pub fn resume(path: &Path, system: OdeSystem, data: ObservedData) -> Result<Self, PopmcError> {
        let payload = CheckpointPayload::load(path)?;
        let bounds = revalidate_bounds(&payload.bounds)?;
        let model_title = system.title().to_string();
        let data_hash = data.content_hash();
        let prior = LogPrior::new(bounds, payload.config.prior);
        let target = OdePosterior::new(system, data, prior)?;
        let mut simulator = Self::from_payload(payload, target, path)?;
        simulator.provenance.model_title = model_title;
        simulator.provenance.data_hash = data_hash;
        Ok(simulator)
    }
}

impl<D: LogDensity> Simulator<D> {
    /// Builds a sampler over an arbitrary log-density supported on `bounds`.
    ///
    /// Chains are initialised in id order with independent uniform draws from
    /// the bounds.
    pub fn with_target(
        target: D,
        bounds: ParameterBounds,
        config: RunConfig,
    ) -> Result<Self, PopmcError> {
        config.validate()?;
        let param_names = config.resolve_param_names(bounds.len())?;
        let master_seed = config.seed_policy.master_seed;
        let mut rng = RngHandle::from_seed(master_seed);
        let num_chains = config.num_chains;
        let chains = (1..=num_chains)
            .map(|id| {
                let initial = bounds.sample_uniform(&mut rng);
                Chain::new(id, num_chains, initial, &target)
            })
            .collect::<Result<Vec<_>, _>>()?;
        let provenance = build_provenance(&config)?;
        Ok(Self {
            target,
            bounds,
            config,
            param_names,
            chains,
            rng,
            master_seed,
            iteration: 0,
            provenance,
            checkpoints: Vec::new(),
        })
    }

    /// Resumes a run over `target` from the checkpoint at `path`.
    pub fn resume_with_target(path: &Path, target: D) -> Result<Self, PopmcError> {
        let payload = CheckpointPayload::load(path)?;
        Self::from_payload(payload, target, path)
    }

    fn from_payload(
        payload: CheckpointPayload,
        target: D,
        source: &Path,
    ) -> Result<Self, PopmcError> {
        let config = payload.config;
        config.validate()?;
        let bounds = revalidate_bounds(&payload.bounds)?;
        if payload.param_names.len() != bounds.len() || payload.iteration > config.max_its {
            return Err(PopmcError::Serde(corrupt_checkpoint(
                source,
                "header does not match its bounds",
            )));
        }
        let num_chains = config.num_chains;
        let mut chains = Vec::with_capacity(num_chains);
        for (index, saved) in payload.chains.into_iter().enumerate() {
            let ChainCheckpoint {
                id,
                tempering: _,
                current,
                trace,
                counters,
            } = saved;
            if id != index + 1
                || current.len() != bounds.len()
                || trace.len() != payload.iteration
                || trace.iter().any(|state| state.len() != bounds.len())
            {
                return Err(PopmcError::Serde(
                    corrupt_checkpoint(source, "chain state is inconsistent")
                        .with_context("chain", index + 1),
                ));
            }
            let log_density = target.log_density(&current);
            chains.push(Chain::restore(
                id,
                tempering::tempering_exponent(id, num_chains),
                current,
                log_density,
                trace,
                counters,
            ));
        }
        let provenance = build_provenance(&config)?;
        let mut simulator = Self {
            target,
            bounds,
            config,
            param_names: payload.param_names,
            chains,
            rng: RngHandle::from_seed(payload.master_seed),
            master_seed: payload.master_seed,
            iteration: payload.iteration,
            provenance,
            checkpoints: Vec::new(),
        };
        simulator.provenance.seed = simulator.master_seed;
        if let Some(root) = simulator.checkpoint_root() {
            simulator.checkpoints = checkpoint::existing_checkpoints(&root, simulator.iteration)?;
        }
        simulator.rekey();
        info!(
            iteration = simulator.iteration,
            path = %source.display(),
            "resumed from checkpoint"
        );
        Ok(simulator)
    }

    /// Completed iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Phase of the next iteration to run.
    pub fn phase(&self) -> Phase {
        self.phase_of(self.iteration + 1)
    }

    fn phase_of(&self, iteration: usize) -> Phase {
        if iteration <= self.config.init_phase_its {
            Phase::Initial
        } else {
            Phase::Sampling
        }
    }

    /// Whether `max_its` iterations have completed.
    pub fn is_finished(&self) -> bool {
        self.iteration >= self.config.max_its
    }

    /// All chains ordered by id.
    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    /// Chain with 1-based `id`.
    pub fn chain(&self, id: usize) -> Option<&Chain> {
        id.checked_sub(1).and_then(|index| self.chains.get(index))
    }

    /// Trace of chain `id`.
    pub fn trace(&self, id: usize) -> Option<&[ParameterVector]> {
        self.chain(id).map(Chain::trace)
    }

    /// Trace of the untempered chain 1: the posterior sample sequence.
    pub fn target_trace(&self) -> &[ParameterVector] {
        self.chains[0].trace()
    }

    /// Parameter labels.
    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Parameter bounds.
    pub fn bounds(&self) -> &ParameterBounds {
        &self.bounds
    }

    /// Run configuration.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Target log-density.
    pub fn target(&self) -> &D {
        &self.target
    }

    /// Master seed of the sampler stream.
    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Hashes and versions identifying the run inputs.
    pub fn provenance(&self) -> &RunProvenance {
        &self.provenance
    }

    /// Checkpoint files written so far and still retained.
    pub fn checkpoints(&self) -> &[PathBuf] {
        &self.checkpoints
    }

    /// Executes exactly one iteration.
    pub fn step(&mut self) -> Result<IterationReport, PopmcError> {
        if self.is_finished() {
            return Err(PopmcError::Config(
                ErrorInfo::new("run-finished", "max_its iterations already completed")
                    .with_context("max_its", self.config.max_its),
            ));
        }
        let iteration = self.iteration + 1;
        let phase = self.phase_of(iteration);
        let num_chains = self.chains.len();

        let mutated = self.rng.index(num_chains);
        let mutation = self.chains[mutated].mutate(
            &self.target,
            &self.bounds,
            self.config.proposal.scale,
            &mut self.rng,
        );
        debug!(iteration, chain = mutated + 1, outcome = ?mutation, "mutation");

        let (first, second) = match self.config.exchange {
            ExchangePairing::UniformPair => self.rng.distinct_pair(num_chains),
            ExchangePairing::MutatedChain => {
                (mutated, self.rng.distinct_from(mutated, num_chains))
            }
        };
        let (lo, hi) = (first.min(second), first.max(second));
        let (exchange_accepted, exchange_log_acceptance) = self.exchange(lo, hi);
        debug!(
            iteration,
            chain = lo + 1,
            with = hi + 1,
            accepted = exchange_accepted,
            log_acceptance = exchange_log_acceptance,
            "exchange"
        );

        for chain in &mut self.chains {
            chain.record();
        }
        self.iteration = iteration;

        if iteration == self.config.init_phase_its {
            info!(iteration, "initial phase complete, sampling");
        }
        self.checkpoint_boundary()?;

        Ok(IterationReport {
            iteration,
            phase,
            mutated_chain: mutated + 1,
            mutation,
            exchange_pair: (lo + 1, hi + 1),
            exchange_accepted,
            exchange_log_acceptance,
        })
    }

    fn exchange(&mut self, lo: usize, hi: usize) -> (bool, f64) {
        let (head, tail) = self.chains.split_at_mut(hi);
        let (a, b) = (&mut head[lo], &mut tail[0]);
        let (accepted, log_acceptance) = tempering::attempt_exchange(
            a.log_density(),
            a.tempering(),
            b.log_density(),
            b.tempering(),
            &mut self.rng,
        );
        a.note_exchange(accepted);
        b.note_exchange(accepted);
        if accepted {
            Chain::swap_states(a, b);
        }
        (accepted, log_acceptance)
    }

    fn checkpoint_boundary(&mut self) -> Result<(), PopmcError> {
        let interval = self.config.checkpoint.interval;
        if interval == 0 || self.iteration % interval != 0 {
            return Ok(());
        }
        if let Some(root) = self.checkpoint_root() {
            let path = checkpoint::checkpoint_path(&root, self.iteration);
            self.payload().store(&path)?;
            info!(iteration = self.iteration, path = %path.display(), "checkpoint written");
            self.checkpoints.push(path);
            checkpoint::enforce_retention(&mut self.checkpoints, self.config.checkpoint.max_to_keep)?;
        }
        self.rekey();
        Ok(())
    }

    fn checkpoint_root(&self) -> Option<PathBuf> {
        self.config
            .output
            .run_directory
            .as_ref()
            .map(|dir| dir.join(&self.config.output.checkpoint_dir))
    }

    /// Re-seeds the stream from `(master_seed, iteration)` so that a run
    /// resumed from this boundary continues with the same draws.
    fn rekey(&mut self) {
        self.rng = RngHandle::from_seed(derive_substream_seed(
            self.master_seed,
            self.iteration as u64,
        ));
    }

    /// Snapshot of the current state.
    pub fn payload(&self) -> CheckpointPayload {
        CheckpointPayload {
            schema_version: SchemaVersion::default(),
            iteration: self.iteration,
            config: self.config.clone(),
            master_seed: self.master_seed,
            bounds: self.bounds.clone(),
            param_names: self.param_names.clone(),
            chains: self.chains.iter().map(ChainCheckpoint::from).collect(),
        }
    }

    /// Writes a checkpoint to `path` now and re-keys the stream, so that
    /// resuming from it reproduces the rest of this run.
    pub fn checkpoint_now(&mut self, path: &Path) -> Result<(), PopmcError> {
        self.payload().store(path)?;
        info!(iteration = self.iteration, path = %path.display(), "checkpoint written");
        self.rekey();
        Ok(())
    }

    /// Writes every chain's trace as CSV.
    pub fn write_traces_csv(&self, path: &Path) -> Result<(), PopmcError> {
        trace::write_traces_csv(path, &self.param_names, &self.chains)
    }

    /// Runs until `max_its`.
    pub fn run(&mut self) -> Result<RunSummary, PopmcError> {
        self.run_with(|_| ControlFlow::Continue(()))
    }

    /// Runs until `max_its` or until `observer` breaks after an iteration.
    ///
    /// When `output.run_directory` is set, the trace CSV and manifest are
    /// written on return.
    pub fn run_with<F>(&mut self, mut observer: F) -> Result<RunSummary, PopmcError>
    where
        F: FnMut(&IterationReport) -> ControlFlow<()>,
    {
        info!(
            num_chains = self.chains.len(),
            start = self.iteration,
            max_its = self.config.max_its,
            "run started"
        );
        while !self.is_finished() {
            let report = self.step()?;
            if observer(&report).is_break() {
                info!(iteration = self.iteration, "run stopped by observer");
                break;
            }
        }

        let mut summary = self.summary();
        if let Some(run_dir) = self.config.output.run_directory.clone() {
            let traces_path = run_dir.join(&self.config.output.traces_file);
            self.write_traces_csv(&traces_path)?;
            let manifest_path = run_dir.join(&self.config.output.manifest_file);
            summary.traces_path = Some(traces_path);
            summary.manifest_path = Some(manifest_path.clone());
            self.manifest(&run_dir, &summary).write(&manifest_path)?;
        }

        if summary.solver_failures > 0 {
            warn!(
                failures = summary.solver_failures,
                "some density evaluations hit ode solver failures and were treated as infeasible"
            );
        }
        info!(iteration = self.iteration, "run finished");
        Ok(summary)
    }

    fn manifest(&self, run_dir: &Path, summary: &RunSummary) -> RunManifest {
        let relative = |path: &PathBuf| {
            path.strip_prefix(run_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone())
        };
        RunManifest {
            schema_version: SchemaVersion::default(),
            config: self.config.clone(),
            master_seed: self.master_seed,
            seed_label: self.config.seed_policy.label.clone(),
            provenance: self.provenance.clone(),
            param_names: self.param_names.clone(),
            traces_file: summary.traces_path.as_ref().map(relative),
            checkpoints: self.checkpoints.iter().map(relative).collect(),
            summary: summary.clone(),
        }
    }

    /// Statistics for the iterations completed so far.
    pub fn summary(&self) -> RunSummary {
        let counters: Vec<_> = self.chains.iter().map(Chain::counters).collect();
        RunSummary {
            iterations: self.iteration,
            num_chains: self.chains.len(),
            tempering: self.chains.iter().map(Chain::tempering).collect(),
            mutation_acceptance: counters.iter().map(|c| c.mutation_acceptance()).collect(),
            exchange_acceptance: counters.iter().map(|c| c.exchange_acceptance()).collect(),
            out_of_bounds: counters.iter().map(|c| c.out_of_bounds).collect(),
            solver_failures: self.target.solver_failures(),
            posterior: analysis::posterior_summary(
                self.target_trace(),
                &self.param_names,
                self.config.init_phase_its,
            ),
            traces_path: None,
            manifest_path: None,
            checkpoints: self.checkpoints.clone(),
        }
    }
}

fn build_provenance(config: &RunConfig) -> Result<RunProvenance, PopmcError> {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(
        "popmc-mcmc".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    );
    Ok(RunProvenance {
        config_hash: stable_hash_string(config)?,
        data_hash: String::new(),
        model_title: String::new(),
        seed: config.seed_policy.master_seed,
        tool_versions,
    })
}

fn revalidate_bounds(bounds: &ParameterBounds) -> Result<ParameterBounds, PopmcError> {
    ParameterBounds::new(
        bounds.lower().as_slice().to_vec(),
        bounds.upper().as_slice().to_vec(),
    )
}

fn corrupt_checkpoint(path: &Path, message: &str) -> ErrorInfo {
    ErrorInfo::new("checkpoint-corrupt", message).with_context("path", path.display())
}
