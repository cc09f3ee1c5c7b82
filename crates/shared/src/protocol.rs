use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{HowSolvedStatus, SolvedKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HowSolvedRequest {
    pub howsolved: SolvedKind,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HowSolvedResponse {
    #[serde(default)]
    pub howsolved: HowSolvedStatus,
}

/// Aggregate progress for the current filter, as computed by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressPayload {
    #[serde(deserialize_with = "deserialize_percent")]
    pub percent: u8,
    pub level: i64,
    #[serde(default)]
    pub level_progress: f64,
    #[serde(default)]
    pub experience: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_solved: Option<u64>,
}

// The server rounds to whole percent but still sends a float (`50.0`).
fn deserialize_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Err(serde::de::Error::custom("percent must be a finite number"));
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}
