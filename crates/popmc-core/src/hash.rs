//! Stable content hashes for configuration and data provenance.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::{ErrorInfo, PopmcError};

/// Computes a stable hexadecimal hash for the provided serializable payload.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, PopmcError> {
    let bytes = serde_json::to_vec(value).map_err(|err| {
        PopmcError::Serde(ErrorInfo::new("hash-serialize", err.to_string()))
    })?;
    let digest = Sha256::digest(bytes);
    Ok(format!("{:x}", digest))
}

/// Hashes a slice of floats by their exact bit patterns.
pub fn float_slice_hash(values: &[f64]) -> String {
    let mut hasher = Sha256::new();
    for value in values {
        hasher.update(value.to_bits().to_le_bytes());
    }
    format!("{:x}", hasher.finalize())
}
