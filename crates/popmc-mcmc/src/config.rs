use std::path::PathBuf;

use popmc_core::{ErrorInfo, PopmcError};
use serde::{Deserialize, Serialize};

/// YAML-configurable parameters governing a population MCMC run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Number of tempered chains `N` (at least 2).
    #[serde(default = "default_num_chains")]
    pub num_chains: usize,
    /// Total number of iterations.
    #[serde(default = "default_max_its")]
    pub max_its: usize,
    /// Iterations belonging to the initial phase; must be below `max_its`.
    #[serde(default = "default_init_phase_its")]
    pub init_phase_its: usize,
    /// Labels for the `m + n` parameters. Defaults to `param_1..`.
    #[serde(default)]
    pub param_names: Option<Vec<String>>,
    /// Random-walk proposal settings.
    #[serde(default)]
    pub proposal: ProposalConfig,
    /// Prior placed inside the parameter bounds.
    #[serde(default)]
    pub prior: PriorKind,
    /// How the exchange pair is chosen each iteration.
    #[serde(default)]
    pub exchange: ExchangePairing,
    /// Checkpointing behaviour.
    #[serde(default)]
    pub checkpoint: CheckpointConfig,
    /// Master seed and substream policy.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    /// Output directory configuration.
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_num_chains() -> usize {
    4
}

fn default_max_its() -> usize {
    1000
}

fn default_init_phase_its() -> usize {
    500
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_chains: default_num_chains(),
            max_its: default_max_its(),
            init_phase_its: default_init_phase_its(),
            param_names: None,
            proposal: ProposalConfig::default(),
            prior: PriorKind::default(),
            exchange: ExchangePairing::default(),
            checkpoint: CheckpointConfig::default(),
            seed_policy: SeedPolicy::default(),
            output: OutputConfig::default(),
        }
    }
}

impl RunConfig {
    /// Parses a YAML document.
    pub fn from_yaml(text: &str) -> Result<Self, PopmcError> {
        serde_yaml::from_str(text)
            .map_err(|err| PopmcError::Serde(ErrorInfo::new("config-parse", err.to_string())))
    }

    /// Renders the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, PopmcError> {
        serde_yaml::to_string(self)
            .map_err(|err| PopmcError::Serde(ErrorInfo::new("config-serialize", err.to_string())))
    }

    /// Checks the settings that do not depend on the model.
    pub fn validate(&self) -> Result<(), PopmcError> {
        if self.num_chains < 2 {
            return Err(PopmcError::Config(
                ErrorInfo::new("too-few-chains", "population MCMC needs at least two chains")
                    .with_context("num_chains", self.num_chains),
            ));
        }
        if self.init_phase_its >= self.max_its {
            return Err(PopmcError::Config(
                ErrorInfo::new(
                    "init-phase-too-long",
                    "init_phase_its must be smaller than max_its",
                )
                .with_context("init_phase_its", self.init_phase_its)
                .with_context("max_its", self.max_its),
            ));
        }
        if !self.proposal.scale.is_finite() || self.proposal.scale < 0.0 {
            return Err(PopmcError::Config(
                ErrorInfo::new("proposal-scale", "proposal scale must be finite and non-negative")
                    .with_context("scale", self.proposal.scale),
            ));
        }
        if self.checkpoint.interval > 0 && self.checkpoint.max_to_keep == 0 {
            return Err(PopmcError::Config(
                ErrorInfo::new("checkpoint-retention", "max_to_keep must be at least 1")
                    .with_hint("set checkpoint.interval to 0 to disable checkpoints"),
            ));
        }
        Ok(())
    }

    /// Resolves parameter labels for `len` coordinates.
    pub fn resolve_param_names(&self, len: usize) -> Result<Vec<String>, PopmcError> {
        match &self.param_names {
            None => Ok((1..=len).map(|k| format!("param_{k}")).collect()),
            Some(names) if names.len() == len => Ok(names.clone()),
            Some(names) => Err(PopmcError::Config(
                ErrorInfo::new("dimension-mismatch", "one name per bounded parameter")
                    .with_context("expected", len)
                    .with_context("found", names.len()),
            )),
        }
    }
}

/// Gaussian random-walk proposal settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalConfig {
    /// Jitter standard deviation as a fraction of each coordinate's bound width.
    #[serde(default = "default_proposal_scale")]
    pub scale: f64,
}

fn default_proposal_scale() -> f64 {
    0.125
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            scale: default_proposal_scale(),
        }
    }
}

/// Prior density inside the bounds; both are `-inf` outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriorKind {
    /// Flat: log-prior 0 inside the box.
    #[default]
    Uniform,
    /// Independent normals centred on the bound midpoints with standard
    /// deviation one eighth of the bound width.
    TruncatedNormal,
}

/// Exchange pair selection policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExchangePairing {
    /// Unordered pair of distinct chains, uniformly at random.
    #[default]
    UniformPair,
    /// The chain that just mutated, paired with a uniformly drawn other chain.
    MutatedChain,
}

/// Checkpointing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Interval in iterations between checkpoints (0 disables checkpoints).
    #[serde(default)]
    pub interval: usize,
    /// Maximum number of checkpoints to retain.
    #[serde(default = "default_checkpoint_retention")]
    pub max_to_keep: usize,
}

fn default_checkpoint_retention() -> usize {
    4
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            interval: 0,
            max_to_keep: default_checkpoint_retention(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed of the sampler's random stream.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional label recorded in manifests.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Output directory layout configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Root directory for run artefacts. Nothing is written when unset.
    #[serde(default)]
    pub run_directory: Option<PathBuf>,
    /// Trace CSV filename relative to `run_directory`.
    #[serde(default = "default_traces_filename")]
    pub traces_file: PathBuf,
    /// Manifest filename relative to `run_directory`.
    #[serde(default = "default_manifest_filename")]
    pub manifest_file: PathBuf,
    /// Subdirectory used for checkpoint files.
    #[serde(default = "default_checkpoint_dir")]
    pub checkpoint_dir: PathBuf,
}

fn default_traces_filename() -> PathBuf {
    PathBuf::from("traces.csv")
}

fn default_manifest_filename() -> PathBuf {
    PathBuf::from("manifest.json")
}

fn default_checkpoint_dir() -> PathBuf {
    PathBuf::from("checkpoints")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            run_directory: None,
            traces_file: default_traces_filename(),
            manifest_file: default_manifest_filename(),
            checkpoint_dir: default_checkpoint_dir(),
        }
    }
}
