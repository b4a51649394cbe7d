use std::fs;
use std::path::{Path, PathBuf};

use popmc_core::{ErrorInfo, ParameterBounds, ParameterVector, PopmcError, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::chain::{Chain, ChainCounters};
use crate::config::RunConfig;

/// Serialized state of a single chain.
///
/// The cached log-density is not stored: it may be `-inf`, which JSON cannot
/// represent, and it is recomputed on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainCheckpoint {
    /// 1-based chain id.
    pub id: usize,
    /// Tempering exponent of the chain.
    pub tempering: f64,
    /// Current state.
    pub current: ParameterVector,
    /// Trace recorded so far.
    pub trace: Vec<ParameterVector>,
    /// Acceptance counters.
    pub counters: ChainCounters,
}

impl From<&Chain> for ChainCheckpoint {
    fn from(chain: &Chain) -> Self {
        Self {
            id: chain.id(),
            tempering: chain.tempering(),
            current: chain.current().clone(),
            trace: chain.trace().to_vec(),
            counters: *chain.counters(),
        }
    }
}

/// Aggregated checkpoint payload, written at the end of an iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    /// Schema of this payload.
    pub schema_version: SchemaVersion,
    /// Number of completed iterations.
    pub iteration: usize,
    /// Configuration snapshot associated with the run.
    pub config: RunConfig,
    /// Master seed of the run.
    pub master_seed: u64,
    /// Parameter bounds of the run.
    pub bounds: ParameterBounds,
    /// Parameter labels.
    pub param_names: Vec<String>,
    /// Chain states ordered by id.
    pub chains: Vec<ChainCheckpoint>,
}

impl CheckpointPayload {
    /// Restores the payload from disk.
    pub fn load(path: &Path) -> Result<Self, PopmcError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| PopmcError::serde_at("checkpoint-read", err, path))?;
        let payload: Self = serde_json::from_str(&contents)
            .map_err(|err| PopmcError::serde_at("checkpoint-parse", err, path))?;
        if !SchemaVersion::default().is_compatible_with(&payload.schema_version) {
            return Err(PopmcError::Serde(
                ErrorInfo::new("checkpoint-schema", "unsupported checkpoint schema version")
                    .with_context("path", path.display())
                    .with_context("major", payload.schema_version.major),
            ));
        }
        if payload.chains.len() != payload.config.num_chains {
            return Err(PopmcError::Serde(
                ErrorInfo::new("checkpoint-chains", "chain count does not match the configuration")
                    .with_context("path", path.display())
                    .with_context("expected", payload.config.num_chains)
                    .with_context("found", payload.chains.len()),
            ));
        }
        Ok(payload)
    }

    /// Writes the payload to disk.
    pub fn store(&self, path: &Path) -> Result<(), PopmcError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| PopmcError::serde_at("checkpoint-mkdir", err, parent))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| PopmcError::serde_at("checkpoint-serialize", err, path))?;
        fs::write(path, json).map_err(|err| PopmcError::serde_at("checkpoint-write", err, path))
    }
}

/// Checkpoint file for `iteration` under `root`.
pub fn checkpoint_path(root: &Path, iteration: usize) -> PathBuf {
    root.join(format!("ckpt_{iteration:06}.json"))
}

/// Checkpoint files under `root` written at or before `iteration`, oldest first.
///
/// Files written after `iteration` are left out; a resumed run rewrites them.
pub(crate) fn existing_checkpoints(
    root: &Path,
    iteration: usize,
) -> Result<Vec<PathBuf>, PopmcError> {
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let entries =
        fs::read_dir(root).map_err(|err| PopmcError::serde_at("checkpoint-list", err, root))?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| PopmcError::serde_at("checkpoint-list", err, root))?;
        let name = entry.file_name();
        let written_at = name
            .to_str()
            .and_then(|name| name.strip_prefix("ckpt_"))
            .and_then(|rest| rest.strip_suffix(".json"))
            .and_then(|digits| digits.parse::<usize>().ok());
        if let Some(written_at) = written_at.filter(|&at| at <= iteration) {
            found.push((written_at, entry.path()));
        }
    }
    found.sort();
    Ok(found.into_iter().map(|(_, path)| path).collect())
}

/// Deletes the oldest entries of `written` until at most `max_to_keep` remain.
pub(crate) fn enforce_retention(
    written: &mut Vec<PathBuf>,
    max_to_keep: usize,
) -> Result<(), PopmcError> {
    while written.len() > max_to_keep {
        let oldest = written.remove(0);
        if oldest.exists() {
            fs::remove_file(&oldest)
                .map_err(|err| PopmcError::serde_at("checkpoint-prune", err, &oldest))?;
        }
    }
    Ok(())
}
