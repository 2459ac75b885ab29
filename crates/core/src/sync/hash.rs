//! Content hashing of resolved configurations

use costsync_domain::{CostSyncError, ResolvedCostConfiguration, Result};

/// Hex-encoded BLAKE3 digest of the configuration's canonical JSON.
///
/// Field order is fixed by the struct definitions and every map is a
/// `BTreeMap`, so equal configurations always hash equally.
///
/// # Errors
/// [`CostSyncError::Internal`] if serialization fails.
pub fn content_hash(config: &ResolvedCostConfiguration) -> Result<String> {
    let bytes = serde_json::to_vec(config)
        .map_err(|e| CostSyncError::Internal(format!("Failed to serialize configuration: {e}")))?;
    Ok(hex::encode(blake3::hash(&bytes).as_bytes()))
}
