//! Row output with one stable column set per mode.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use crate::matcher::{AuthorAffiliationRow, InputRecord, MatchMode, TitleMatch};

use super::{FileFormat, IoError};

const TITLE_COLUMNS: &[&str] = &[
    "award_id",
    "title",
    "authors",
    "year",
    "match_status",
    "match_ratio",
    "search_method",
    "cleaned_title",
    "extracted_date",
    "date_format",
    "work_id",
    "matched_title",
    "publication_year",
    "publication_date",
    "doi",
    "type",
    "journal",
    "issn",
    "cited_by_count",
    "is_retracted",
    "oa_status",
    "matched_authors",
    "matched_authors_count",
    "matched_authors_list",
    "year_match",
    "year_difference",
    "award_id_match",
    "award_id_match_type",
    "award_id_match_score",
    "matched_grant_award_id",
    "matched_grant_funder",
    "has_target_funder",
    "matched_target_funder_names",
    "failure_reason",
];

const AUTHOR_COLUMNS: &[&str] = &[
    "award_id",
    "input_author",
    "matched_author",
    "matched_author_id",
    "matched_affiliation",
    "matched_affiliation_id",
    "matched_affiliation_ror",
    "work_id",
    "work_title",
    "publication_year",
    "doi",
    "author_match_score",
    "affiliation_match_score",
    "combined_match_score",
    "year_match",
    "year_difference",
];

enum WriterKind {
    Csv(csv::Writer<File>),
    Json { path: PathBuf, rows: Vec<Value> },
}

/// Writes result rows as CSV (streamed) or JSON (collected, one array).
///
/// Rows come out in exactly the order they are written; callers keep
/// one record's rows together.
pub struct RowWriter {
    kind: WriterKind,
    mode: MatchMode,
}

impl RowWriter {
    pub fn create(path: &Path, format: FileFormat, mode: MatchMode) -> Result<Self, IoError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let kind = match format {
            FileFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;
                let columns = match mode {
                    MatchMode::Title => TITLE_COLUMNS,
                    MatchMode::AuthorAffiliation => AUTHOR_COLUMNS,
                };
                writer.write_record(columns)?;
                WriterKind::Csv(writer)
            }
            FileFormat::Json => WriterKind::Json {
                path: path.to_path_buf(),
                rows: Vec::new(),
            },
        };

        Ok(Self { kind, mode })
    }

    pub fn write_title_match(
        &mut self,
        record: &InputRecord,
        result: &TitleMatch,
    ) -> Result<(), IoError> {
        debug_assert_eq!(self.mode, MatchMode::Title);
        let row = title_row(record, result);
        self.write_row(&row, TITLE_COLUMNS)
    }

    pub fn write_author_row(&mut self, row: &AuthorAffiliationRow) -> Result<(), IoError> {
        debug_assert_eq!(self.mode, MatchMode::AuthorAffiliation);
        let row = serde_json::to_value(row)?;
        self.write_row(&row, AUTHOR_COLUMNS)
    }

    fn write_row(&mut self, row: &Value, columns: &[&str]) -> Result<(), IoError> {
        match &mut self.kind {
            WriterKind::Csv(writer) => {
                let fields: Vec<String> = columns
                    .iter()
                    .map(|c| cell(row.get(*c).unwrap_or(&Value::Null)))
                    .collect();
                writer.write_record(&fields)?;
                writer.flush()?;
                Ok(())
            }
            WriterKind::Json { rows, .. } => {
                rows.push(row.clone());
                Ok(())
            }
        }
    }

    pub fn finalize(self) -> Result<(), IoError> {
        match self.kind {
            WriterKind::Csv(mut writer) => {
                writer.flush()?;
                Ok(())
            }
            WriterKind::Json { path, rows } => {
                let file = File::create(path)?;
                serde_json::to_writer_pretty(file, &rows)?;
                Ok(())
            }
        }
    }
}

/// Render a JSON value as one CSV cell.
fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(cell)
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(_) => value.to_string(),
    }
}

/// Flatten a title result (plus input echo) into one row object.
fn title_row(record: &InputRecord, result: &TitleMatch) -> Value {
    let work = result.work.as_ref();
    let funding = result.funding.as_ref();

    json!({
        "award_id": result.award_id,
        "title": record.title,
        "authors": record.authors,
        "year": record.year,
        "match_status": result.status.to_string(),
        "match_ratio": result.match_ratio,
        "search_method": result.search_method,
        "cleaned_title": result.cleaned_title,
        "extracted_date": result.extracted_date,
        "date_format": result.date_format,
        "work_id": work.map(|w| w.id.clone()),
        "matched_title": work.map(|w| w.title.clone()),
        "publication_year": work.and_then(|w| w.publication_year),
        "publication_date": work.and_then(|w| w.publication_date.clone()),
        "doi": work.and_then(|w| w.doi.clone()),
        "type": work.and_then(|w| w.work_type.clone()),
        "journal": work.and_then(|w| w.venue.as_ref()).and_then(|v| v.journal.clone()),
        "issn": work.and_then(|w| w.venue.as_ref()).and_then(|v| v.issn.clone()),
        "cited_by_count": work.map(|w| w.cited_by_count),
        "is_retracted": work.map(|w| w.is_retracted),
        "oa_status": work
            .and_then(|w| w.open_access.as_ref())
            .and_then(|oa| oa.oa_status.clone()),
        "matched_authors": result.matched_authors,
        "matched_authors_count": result.matched_authors_count,
        "matched_authors_list": result.matched_authors_list,
        "year_match": result.year_match,
        "year_difference": result.year_difference,
        "award_id_match": funding.map(|f| f.award_id_match),
        "award_id_match_type": funding.and_then(|f| f.award_id_match_type),
        "award_id_match_score": funding.map(|f| f.award_id_match_score),
        "matched_grant_award_id": funding.and_then(|f| f.matched_grant_award_id.clone()),
        "matched_grant_funder": funding.and_then(|f| f.matched_grant_funder.clone()),
        "has_target_funder": funding.map(|f| f.has_target_funder),
        "matched_target_funder_names": funding.map(|f| f.matched_target_funder_names.clone()),
        "failure_reason": result.failure_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{MatchStatus, SearchMethod};

    fn sample_row() -> AuthorAffiliationRow {
        AuthorAffiliationRow {
            award_id: "G-1".into(),
            input_author: "Mitchell, G".into(),
            matched_author: "Grace Mitchell".into(),
            matched_author_id: "A1".into(),
            matched_affiliation: "University of Somewhere".into(),
            matched_affiliation_id: "I1".into(),
            matched_affiliation_ror: None,
            work_id: "W1".into(),
            work_title: "Drought Modeling".into(),
            publication_year: Some(2019),
            doi: Some("10.1000/xyz".into()),
            author_match_score: 0.93,
            affiliation_match_score: 0.97,
            combined_match_score: 0.958,
            year_match: Some(true),
            year_difference: Some(0),
        }
    }

    #[test]
    fn test_csv_author_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut writer =
            RowWriter::create(&path, FileFormat::Csv, MatchMode::AuthorAffiliation).unwrap();
        writer.write_author_row(&sample_row()).unwrap();
        writer.finalize().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert!(lines.next().unwrap().starts_with("award_id,input_author"));
        let data = lines.next().unwrap();
        assert!(data.contains("Grace Mitchell"));
        assert!(data.contains("0.93"));
    }

    #[test]
    fn test_json_title_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");

        let record = InputRecord {
            award_id: "G-1".into(),
            title: Some("Climate Change Report".into()),
            year: Some(2019),
            ..Default::default()
        };
        let mut result = TitleMatch::empty("G-1");
        result.status = MatchStatus::Matched;
        result.match_ratio = 97;
        result.search_method = Some(SearchMethod::Exact);

        let mut writer = RowWriter::create(&path, FileFormat::Json, MatchMode::Title).unwrap();
        writer.write_title_match(&record, &result).unwrap();
        writer.finalize().unwrap();

        let parsed: Vec<Value> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["match_status"], "matched");
        assert_eq!(parsed[0]["match_ratio"], 97);
        assert_eq!(parsed[0]["title"], "Climate Change Report");
    }
}
