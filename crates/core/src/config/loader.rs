use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

/// Load configuration from file with environment variable overrides
/// (`GRANTMATCH_MATCHING__SIMILARITY_THRESHOLD=90` style).
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(Env::prefixed("GRANTMATCH_").split("__"))
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::FileFormat;
    use crate::matcher::MatchMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config_from_str_valid() {
        let toml = r#"
mode = "author_affiliation"

[input]
path = "records.csv"

[output]
path = "rows.json"
format = "json"

[matching]
similarity_threshold = 90
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.mode, MatchMode::AuthorAffiliation);
        assert_eq!(config.output.format, FileFormat::Json);
        assert_eq!(config.matching.similarity_threshold, 90);
        // Untouched sections keep their defaults
        assert_eq!(config.matching.year_search_window, 5);
        assert_eq!(config.processing.concurrency, 1);
    }

    #[test]
    fn test_load_config_from_str_missing_input() {
        let toml = r#"
[output]
path = "rows.csv"
"#;
        let result = load_config_from_str(toml);
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(
            temp_file,
            r#"
[input]
path = "grants.csv"

[input.field_mappings]
award_id = "grant_number"
title = "publication_title"

[output]
path = "out/matched.csv"

[api.openalex]
mailto = "ops@example.org"
"#
        )
        .unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.input.field_mappings.award_id, "grant_number");
        assert_eq!(config.api.openalex.mailto.as_deref(), Some("ops@example.org"));
        assert_eq!(config.mode, MatchMode::Title);
    }
}
