//! Field-mapped record reading from CSV and JSON files.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::matcher::InputRecord;

use super::{FieldMappings, FileFormat, IoError};

/// Walk a dotted path into a JSON value. `"."` or the empty path
/// returns the value itself; numeric segments index into arrays.
pub(super) fn get_nested<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() || path == "." {
        return Some(data);
    }

    let mut current = data;
    for key in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(key)?,
            Value::Array(items) => {
                let idx: usize = key.parse().ok()?;
                items.get(idx)?
            }
            _ => return None,
        };
        if current.is_null() {
            return None;
        }
    }
    Some(current)
}

/// Flatten a structured author list into one `"Last, First; ..."` field.
fn flatten_authors(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Array(items) => {
            let mut authors = Vec::new();
            for item in items {
                match item {
                    Value::String(s) if !s.is_empty() => authors.push(s.clone()),
                    Value::Object(map) => {
                        let surname = ["last_name", "name", "display_name"]
                            .iter()
                            .find_map(|k| map.get(*k).and_then(Value::as_str))
                            .filter(|s| !s.is_empty());
                        let Some(surname) = surname else { continue };

                        let given = ["first_name", "initials"]
                            .iter()
                            .find_map(|k| map.get(*k).and_then(Value::as_str))
                            .filter(|s| !s.is_empty());

                        match given {
                            Some(given) => authors.push(format!("{}, {}", surname, given)),
                            None => authors.push(surname.to_string()),
                        }
                    }
                    _ => {}
                }
            }
            (!authors.is_empty()).then(|| authors.join("; "))
        }
        _ => None,
    }
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn value_to_year(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().map(|y| y as i32),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Applies field mappings to raw JSON-shaped records.
pub struct RecordReader {
    mappings: FieldMappings,
}

impl RecordReader {
    pub fn new(mappings: FieldMappings) -> Self {
        Self { mappings }
    }

    /// Map one raw record. Records without an award id are rejected.
    pub fn map_record(&self, raw: &Value) -> Result<InputRecord, IoError> {
        let award_id = get_nested(raw, &self.mappings.award_id)
            .and_then(value_to_string)
            .ok_or_else(|| IoError::MissingField(self.mappings.award_id.clone()))?;

        let lookup = |path: &Option<String>| {
            path.as_deref()
                .and_then(|p| get_nested(raw, p))
                .and_then(value_to_string)
        };

        let authors = self
            .mappings
            .authors
            .as_deref()
            .and_then(|p| get_nested(raw, p))
            .and_then(flatten_authors);

        let year = self
            .mappings
            .year
            .as_deref()
            .and_then(|p| get_nested(raw, p))
            .and_then(value_to_year);

        Ok(InputRecord {
            award_id,
            title: lookup(&self.mappings.title),
            authors,
            year,
            affiliation: lookup(&self.mappings.affiliation),
            doi: lookup(&self.mappings.doi),
        })
    }
}

/// Read and field-map every record in a file.
///
/// For JSON, `records_path` selects the array to iterate (dotted, `"."`
/// for the document root); a single object is treated as one record.
/// Unmappable records are skipped with a warning rather than failing
/// the run.
pub fn read_records(
    path: &Path,
    format: FileFormat,
    mappings: FieldMappings,
    records_path: Option<&str>,
) -> Result<Vec<InputRecord>, IoError> {
    let reader = RecordReader::new(mappings);

    let raw_records: Vec<Value> = match format {
        FileFormat::Csv => {
            let mut csv_reader = csv::Reader::from_path(path)?;
            let headers = csv_reader.headers()?.clone();
            let mut records = Vec::new();
            for row in csv_reader.records() {
                let row = row?;
                let object: serde_json::Map<String, Value> = headers
                    .iter()
                    .zip(row.iter())
                    .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
                    .collect();
                records.push(Value::Object(object));
            }
            records
        }
        FileFormat::Json => {
            let file = File::open(path)?;
            let document: Value = serde_json::from_reader(BufReader::new(file))?;
            let records_path = records_path.unwrap_or(".");
            match get_nested(&document, records_path) {
                Some(Value::Array(items)) => items.clone(),
                Some(obj @ Value::Object(_)) => vec![obj.clone()],
                _ => return Err(IoError::NoRecords(records_path.to_string())),
            }
        }
    };

    let mut records = Vec::with_capacity(raw_records.len());
    for (index, raw) in raw_records.iter().enumerate() {
        match reader.map_record(raw) {
            Ok(record) => records.push(record),
            Err(e) => warn!("skipping record {}: {}", index, e),
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mappings() -> FieldMappings {
        FieldMappings {
            award_id: "grant.id".to_string(),
            title: Some("title".to_string()),
            authors: Some("contributors".to_string()),
            year: Some("grant.year".to_string()),
            affiliation: Some("org".to_string()),
            doi: None,
        }
    }

    #[test]
    fn test_nested_paths() {
        let data = json!({"grant": {"id": "G-1", "year": "2019"}, "title": "T"});
        assert_eq!(
            get_nested(&data, "grant.id").and_then(Value::as_str),
            Some("G-1")
        );
        assert_eq!(get_nested(&data, "grant.missing"), None);
        assert!(get_nested(&data, ".").is_some());
    }

    #[test]
    fn test_array_index_path() {
        let data = json!({"items": [{"id": "first"}, {"id": "second"}]});
        assert_eq!(
            get_nested(&data, "items.1.id").and_then(Value::as_str),
            Some("second")
        );
        assert_eq!(get_nested(&data, "items.5.id"), None);
    }

    #[test]
    fn test_map_record_with_structured_authors() {
        let raw = json!({
            "grant": {"id": "G-1", "year": 2019},
            "title": "Drought Modeling",
            "contributors": [
                {"last_name": "Mitchell", "first_name": "Grace"},
                {"name": "Okafor", "initials": "C"},
                "Jane Doe"
            ],
            "org": "University of Somewhere"
        });

        let record = RecordReader::new(mappings()).map_record(&raw).unwrap();
        assert_eq!(record.award_id, "G-1");
        assert_eq!(record.year, Some(2019));
        assert_eq!(
            record.authors.as_deref(),
            Some("Mitchell, Grace; Okafor, C; Jane Doe")
        );
        assert_eq!(record.affiliation.as_deref(), Some("University of Somewhere"));
    }

    #[test]
    fn test_missing_award_id_rejected() {
        let raw = json!({"title": "No id here"});
        let err = RecordReader::new(mappings()).map_record(&raw).unwrap_err();
        assert!(matches!(err, IoError::MissingField(f) if f == "grant.id"));
    }

    #[test]
    fn test_read_csv_records() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "award_id,title,authors,year,affiliation").unwrap();
        writeln!(
            file,
            "G-1,Climate Report,\"Mitchell, G\",2019,University of Somewhere"
        )
        .unwrap();
        writeln!(file, ",Missing award id,,2020,").unwrap();

        let records = read_records(
            &path,
            FileFormat::Csv,
            FieldMappings::default(),
            None,
        )
        .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].award_id, "G-1");
        assert_eq!(records[0].year, Some(2019));
    }

    #[test]
    fn test_read_json_records_at_path() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        let mut file = File::create(&path).unwrap();
        let doc = json!({
            "data": {
                "grants": [
                    {"grant": {"id": "G-1", "year": 2019}, "title": "A", "org": "X"},
                    {"grant": {"id": "G-2", "year": 2020}, "title": "B", "org": "Y"}
                ]
            }
        });
        write!(file, "{}", doc).unwrap();

        let records =
            read_records(&path, FileFormat::Json, mappings(), Some("data.grants")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].award_id, "G-2");
    }
}
