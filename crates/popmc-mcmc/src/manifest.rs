use std::fs;
use std::path::{Path, PathBuf};

use popmc_core::{PopmcError, RunProvenance, SchemaVersion};
use serde::{Deserialize, Serialize};

use crate::config::RunConfig;
use crate::simulator::RunSummary;

/// Structured manifest describing a completed or interrupted run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Schema of this manifest.
    pub schema_version: SchemaVersion,
    /// Configuration used for the run.
    pub config: RunConfig,
    /// Master seed of the sampler stream.
    pub master_seed: u64,
    /// Optional seed label captured from the configuration.
    pub seed_label: Option<String>,
    /// Hashes and versions identifying the run inputs.
    pub provenance: RunProvenance,
    /// Parameter labels in trace column order.
    pub param_names: Vec<String>,
    /// Trace CSV produced by the run.
    pub traces_file: Option<PathBuf>,
    /// Retained checkpoint files, oldest first.
    pub checkpoints: Vec<PathBuf>,
    /// Summary statistics at the time the manifest was written.
    pub summary: RunSummary,
}

impl RunManifest {
    /// Writes the manifest to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), PopmcError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| PopmcError::serde_at("manifest-mkdir", err, parent))?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|err| PopmcError::serde_at("manifest-serialize", err, path))?;
        fs::write(path, json).map_err(|err| PopmcError::serde_at("manifest-write", err, path))
    }

    /// Loads a manifest from disk.
    pub fn load(path: &Path) -> Result<Self, PopmcError> {
        let contents = fs::read_to_string(path)
            .map_err(|err| PopmcError::serde_at("manifest-read", err, path))?;
        serde_json::from_str(&contents)
            .map_err(|err| PopmcError::serde_at("manifest-parse", err, path))
    }
}
