use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// What the previous run saw for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentState {
    pub timestamp: String,
    pub total: u64,
    pub filename: String,
}

/// Persisted between runs. `timestamp` is the `updated` value of the last
/// annotation observed, `None` before the first successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub timestamp: Option<String>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub details: BTreeMap<String, DocumentState>,
}

impl SyncState {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("no sync state at {:?}, starting from scratch", path);
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read sync state {:?}", path))?;
        let state: SyncState = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse sync state {:?}", path))?;

        tracing::debug!(
            documents = state.details.len(),
            timestamp = ?state.timestamp,
            "loaded sync state"
        );
        Ok(state)
    }

    /// Overwrites the file wholesale.
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string(self)?;
        fs::write(path, raw).with_context(|| format!("failed to write sync state {:?}", path))?;
        Ok(())
    }
}
