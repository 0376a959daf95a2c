use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration for vecbench
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Targets to bulk-load
    #[serde(default)]
    pub load_config: Option<Vec<TargetDescriptor>>,
    /// Targets to replay recorded queries against
    #[serde(default)]
    pub search_config: Option<Vec<TargetDescriptor>>,
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_str(&contents)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load targets in file order; empty when the section is absent
    pub fn load_targets(&self) -> &[TargetDescriptor] {
        self.load_config.as_deref().unwrap_or_default()
    }

    /// Search targets in file order; empty when the section is absent
    pub fn search_targets(&self) -> &[TargetDescriptor] {
        self.search_config.as_deref().unwrap_or_default()
    }
}

/// One entry of `load_config` or `search_config`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDescriptor {
    /// Backend tag, e.g. `qdrant` or `chroma`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub db_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub collection: String,
    /// Vector dimensionality (load mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_to_vectors: Option<PathBuf>,
    /// Newline-delimited JSON payloads (load mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_to_payload: Option<PathBuf>,
    /// Newline-delimited JSON queries (search mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_to_tests: Option<PathBuf>,
    /// Overrides the backend's natural upsert batch size
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// What to do with a trailing batch smaller than `batch_size`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partial_batch: Option<PartialBatchPolicy>,
    /// Number of neighbours requested per query (search mode)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Chroma tenant (defaults to `default_tenant`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    /// Chroma database (defaults to `default_database`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Any other keys are carried through to the result record untouched
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl TargetDescriptor {
    /// Resolve `db_type`, failing for tags no backend is registered under
    pub fn backend_kind(&self) -> Result<BackendKind> {
        self.db_type.parse()
    }

    /// `url` and `collection` are only checked once a target is run, so a
    /// sparse entry for an unknown backend does not reject the whole file
    pub(crate) fn require_endpoint(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(Error::Config(format!(
                "'url' is required for {} target '{}'",
                self.db_type, self.collection
            )));
        }
        if self.collection.is_empty() {
            return Err(Error::Config(format!(
                "'collection' is required for {} target at {}",
                self.db_type, self.url
            )));
        }
        Ok(())
    }

    pub(crate) fn require_path(&self, path: &Option<PathBuf>, field: &str) -> Result<PathBuf> {
        path.clone().ok_or_else(|| {
            Error::Config(format!(
                "'{}' is required for collection '{}'",
                field, self.collection
            ))
        })
    }
}

/// Supported vector databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Qdrant,
    Chroma,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Qdrant => "qdrant",
            BackendKind::Chroma => "chroma",
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "qdrant" => Ok(BackendKind::Qdrant),
            "chroma" => Ok(BackendKind::Chroma),
            other => Err(Error::UnrecognizedBackend(other.to_string())),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handling of the last batch when the payload count is not a multiple of
/// the batch size
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartialBatchPolicy {
    /// Upsert the remainder as a short batch
    #[default]
    Flush,
    /// Discard the remainder (matches the historical batch loader)
    Drop,
}

impl FromStr for PartialBatchPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "flush" => Ok(PartialBatchPolicy::Flush),
            "drop" => Ok(PartialBatchPolicy::Drop),
            other => Err(Error::Config(format!(
                "unknown partial batch policy '{other}', expected 'flush' or 'drop'"
            ))),
        }
    }
}
