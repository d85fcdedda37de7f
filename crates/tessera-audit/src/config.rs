//! TOML configuration for an audit trail.
//!
//! ```toml
//! [chain]
//! custom_event_types = ["model-retrained", "consent-withdrawn"]
//!
//! [store]
//! path = "/var/lib/tessera/audit.jsonl"
//!
//! [report]
//! bucket = "hour"
//! ```
//!
//! Every section is optional.  Without `[store] path` the trail is kept in
//! memory; without `[report] bucket` histograms are per day.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tessera_contracts::{
    error::{TesseraError, TesseraResult},
    event::EventType,
    report::BucketSize,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSection {
    /// Organisation-specific event type names (without the `custom:`
    /// prefix) the recorder should accept.
    #[serde(default)]
    pub custom_event_types: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreSection {
    /// JSONL log file.  `None` keeps the chain in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportSection {
    #[serde(default)]
    pub bucket: BucketSize,
}

/// Top-level trail configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TrailConfig {
    #[serde(default)]
    pub chain: ChainSection,
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub report: ReportSection,
}

impl TrailConfig {
    /// Parse `s` as TOML.
    ///
    /// Returns `TesseraError::Config` if the TOML is malformed, does not
    /// match the schema, or names an invalid custom event type.
    pub fn from_toml_str(s: &str) -> TesseraResult<Self> {
        let config: TrailConfig = toml::from_str(s).map_err(|e| TesseraError::Config {
            reason: format!("failed to parse trail TOML: {}", e),
        })?;
        config.custom_event_types()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as TOML trail configuration.
    pub fn from_file(path: &Path) -> TesseraResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TesseraError::Config {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    /// The configured custom types as `EventType::Custom` values.
    pub fn custom_event_types(&self) -> TesseraResult<Vec<EventType>> {
        self.chain
            .custom_event_types
            .iter()
            .map(|name| {
                EventType::custom(name.as_str()).map_err(|e| TesseraError::Config {
                    reason: format!("invalid custom event type '{}': {}", name, e),
                })
            })
            .collect()
    }
}
