//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::{OpenAlexConfig, RorConfig};
use crate::health::HealthConfig;
use crate::io::{FieldMappings, FileFormat};
use crate::matcher::{MatchMode, MatchingConfig};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Which pipeline records are dispatched to.
    #[serde(default)]
    pub mode: MatchMode,
    pub input: InputConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

/// Input file location and field mappings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: FileFormat,
    /// Dotted path to the record array inside a JSON document.
    #[serde(default)]
    pub records_path: Option<String>,
    #[serde(default)]
    pub field_mappings: FieldMappings,
}

/// Output file location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub format: FileFormat,
}

/// External endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub openalex: OpenAlexConfig,
    #[serde(default)]
    pub ror: RorConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

/// Which affiliation scorer the broad matcher uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScorerKind {
    #[default]
    Fuzzy,
    Embedding,
}

/// Run-level processing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Records in flight at once. 1 means strictly sequential.
    pub concurrency: usize,
    /// Stop after this many records; unset processes everything.
    pub limit: Option<usize>,
    pub scorer: ScorerKind,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            limit: None,
            scorer: ScorerKind::Fuzzy,
        }
    }
}
