//! Engine configuration.

use constants::DEFAULT_CHUNK_POINTS;
use serde::{Deserialize, Serialize};

/// Decode configuration supplied by the embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeConfig {
    /// Memory budget for decoded positions, in megabytes.
    pub max_budget_mb: f64,
    /// Record-size fallback when the format does not declare one.
    pub bytes_per_point_hint: Option<u32>,
    /// Accepted points per emitted chunk.
    pub chunk_points: usize,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            max_budget_mb: 64.0,
            bytes_per_point_hint: None,
            chunk_points: DEFAULT_CHUNK_POINTS,
        }
    }
}

impl DecodeConfig {
    /// Parse a configuration from JSON, filling omitted fields with
    /// defaults.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
