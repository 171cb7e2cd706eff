//! Record input and row output.
//!
//! Readers apply configured field mappings (dotted paths into nested
//! JSON, author-list flattening) and produce [`InputRecord`]s; writers
//! emit one stable column set per mode, CSV or JSON.

mod reader;
mod writer;

pub use reader::{read_records, RecordReader};
pub use writer::RowWriter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from record reading and row writing.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no records found at path '{0}'")]
    NoRecords(String),

    #[error("record is missing required field '{0}'")]
    MissingField(String),
}

/// Supported file formats, shared by input and output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    #[default]
    Csv,
    Json,
}

/// Source paths for each standard input field.
///
/// Paths are dotted for nested JSON (`"grant.award.id"`); for CSV they
/// are plain column names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldMappings {
    pub award_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub authors: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub affiliation: Option<String>,
    #[serde(default)]
    pub doi: Option<String>,
}

impl Default for FieldMappings {
    fn default() -> Self {
        Self {
            award_id: "award_id".to_string(),
            title: Some("title".to_string()),
            authors: Some("authors".to_string()),
            year: Some("year".to_string()),
            affiliation: Some("affiliation".to_string()),
            doi: None,
        }
    }
}
