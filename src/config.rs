use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analyzers::types::KnowledgeOrder;
use crate::ingest::SubmissionColumns;

/// Environment variable naming a JSON config file.
pub const CONFIG_ENV: &str = "DASHBOARD_CONFIG";

/// Dataset locations and display settings for the dashboard.
///
/// Stored as JSON on disk; every field is optional:
/// ```json
/// {
///   "mastery": "./data/new_data.csv",
///   "mastery_fallback": "./data.csv",
///   "submissions": "https://example.org/submit_records.csv",
///   "knowledge": {
///     "codes": ["t5V9e", "m3D1v"],
///     "labels": { "t5V9e": "Fractions" }
///   }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub mastery: String,
    pub mastery_fallback: Option<String>,
    pub submissions: String,
    pub knowledge: KnowledgeOrder,
    pub submission_columns: SubmissionColumns,
    pub radar_mount: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            mastery: "./data/new_data.csv".to_string(),
            mastery_fallback: Some("./data.csv".to_string()),
            submissions: "./data/submit_records.csv".to_string(),
            knowledge: KnowledgeOrder::default(),
            submission_columns: SubmissionColumns::default(),
            radar_mount: "radarChart".to_string(),
        }
    }
}

impl DashboardConfig {
    /// Loads the config from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{path}'"))?;
        serde_json::from_str(&content).with_context(|| format!("invalid config file '{path}'"))
    }

    /// Uses `path`, then `DASHBOARD_CONFIG`, then built-in defaults.
    pub fn resolve(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => match std::env::var(CONFIG_ENV) {
                Ok(p) if !p.is_empty() => Self::load(&p),
                _ => Ok(Self::default()),
            },
        }
    }
}
